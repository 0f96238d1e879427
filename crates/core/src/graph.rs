//! Workflow graph construction.
//!
//! [`GraphBuilder`] allocates node and link ids, lays nodes out on the
//! canvas, and keeps both endpoints of every link in sync. [`build_graph`]
//! drives it through the fixed A1111 → ComfyUI topology:
//!
//! ```text
//! checkpoint ─► [LoRA]* ─► positive/negative encode ─┐
//! empty latent ──────────────────────────────────────┴► sampler
//!   ─► [decode ─► upscale ─► encode ─► sampler]? ─► decode ─► save
//! ```
//!
//! A builder is created per conversion call; nothing here is shared.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::node_kinds::{slots, NodeKind, SlotType, DEFAULT_FILENAME_PREFIX};
use crate::params::GenerationParameters;
use crate::types::{LinkId, NodeId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Node-registry identifier stored in every node's properties.
pub const NODE_REGISTRY_ID: &str = "comfy-core";

/// Node-registry version stored in every node's properties.
pub const NODE_REGISTRY_VERSION: &str = "0.3.40";

/// Canvas position of the first node.
const LAYOUT_ORIGIN: [f64; 2] = [50.0, 50.0];

/// Horizontal gap between neighbouring nodes.
const LAYOUT_GAP: f64 = 50.0;

/// The cursor wraps to a new row once it passes this x coordinate.
const LAYOUT_MAX_X: f64 = 1800.0;

/// Vertical distance between rows.
const LAYOUT_ROW_HEIGHT: f64 = 350.0;

/// Denoise strength of the first sampling pass.
const PRIMARY_DENOISE: f64 = 1.0;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// An input slot on a node. `link` is set once something is wired into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub link: Option<LinkId>,
}

/// An output slot on a node, with every link leaving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub links: Vec<LinkId>,
    pub slot_index: usize,
}

/// Registry metadata ComfyUI attaches to each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    pub cnr_id: String,
    pub ver: String,
    #[serde(rename = "Node name for S&R")]
    pub node_name: String,
}

/// A node in the ComfyUI UI graph format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    #[serde(default)]
    pub flags: serde_json::Map<String, serde_json::Value>,
    pub order: u32,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
    #[serde(default)]
    pub outputs: Vec<NodeOutput>,
    pub properties: NodeProperties,
    #[serde(default)]
    pub widgets_values: Vec<serde_json::Value>,
}

/// A typed connection from an output slot to an input slot.
///
/// Serialized as the 6-element array
/// `[id, source_node, source_slot, target_node, target_slot, type]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LinkTuple", from = "LinkTuple")]
pub struct GraphLink {
    pub id: LinkId,
    pub source_node: NodeId,
    pub source_slot: usize,
    pub target_node: NodeId,
    pub target_slot: usize,
    pub data_type: SlotType,
}

#[derive(Serialize, Deserialize)]
struct LinkTuple(LinkId, NodeId, usize, NodeId, usize, SlotType);

impl From<GraphLink> for LinkTuple {
    fn from(link: GraphLink) -> Self {
        LinkTuple(
            link.id,
            link.source_node,
            link.source_slot,
            link.target_node,
            link.target_slot,
            link.data_type,
        )
    }
}

impl From<LinkTuple> for GraphLink {
    fn from(t: LinkTuple) -> Self {
        GraphLink {
            id: t.0,
            source_node: t.1,
            source_slot: t.2,
            target_node: t.3,
            target_slot: t.4,
            data_type: t.5,
        }
    }
}

/// An output slot reference: `(node id, output slot index)`.
pub type SlotRef = (NodeId, usize);

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LayoutCursor {
    x: f64,
    y: f64,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            x: LAYOUT_ORIGIN[0],
            y: LAYOUT_ORIGIN[1],
        }
    }

    /// Return the current position and advance past a node of `width`.
    fn place(&mut self, width: f64) -> [f64; 2] {
        let pos = [self.x, self.y];
        self.x += width + LAYOUT_GAP;
        if self.x > LAYOUT_MAX_X {
            self.x = LAYOUT_ORIGIN[0];
            self.y += LAYOUT_ROW_HEIGHT;
        }
        pos
    }
}

/// Incremental node/link allocator for a single workflow.
#[derive(Debug)]
pub struct GraphBuilder {
    starting_node_id: NodeId,
    next_node_id: NodeId,
    next_link_id: LinkId,
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    cursor: LayoutCursor,
}

impl GraphBuilder {
    /// Create a builder whose first node gets `starting_node_id`.
    pub fn new(starting_node_id: NodeId) -> Result<Self, CoreError> {
        if starting_node_id == 0 {
            return Err(CoreError::Validation(
                "Starting node id must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            starting_node_id,
            next_node_id: starting_node_id,
            next_link_id: 1,
            nodes: Vec::new(),
            links: Vec::new(),
            cursor: LayoutCursor::new(),
        })
    }

    /// Instantiate a node of `kind` and return its id.
    pub fn create_node(&mut self, kind: &NodeKind) -> Result<NodeId, CoreError> {
        let id = self.next_node_id;
        self.next_node_id = id
            .checked_add(1)
            .ok_or_else(|| CoreError::Internal("Node id space exhausted".to_string()))?;

        let size = kind.default_size();
        let node_type = kind.class_type().to_string();

        self.nodes.push(GraphNode {
            id,
            pos: self.cursor.place(size[0]),
            size,
            flags: serde_json::Map::new(),
            order: id - self.starting_node_id,
            mode: 0,
            inputs: kind
                .inputs()
                .iter()
                .map(|spec| NodeInput {
                    name: spec.name.to_string(),
                    slot_type: spec.slot_type,
                    link: None,
                })
                .collect(),
            outputs: kind
                .outputs()
                .iter()
                .enumerate()
                .map(|(slot_index, spec)| NodeOutput {
                    name: spec.name.to_string(),
                    slot_type: spec.slot_type,
                    links: Vec::new(),
                    slot_index,
                })
                .collect(),
            properties: NodeProperties {
                cnr_id: NODE_REGISTRY_ID.to_string(),
                ver: NODE_REGISTRY_VERSION.to_string(),
                node_name: node_type.clone(),
            },
            node_type,
            widgets_values: kind.widget_values(),
        });

        Ok(id)
    }

    /// Wire `source`'s output slot into `target`'s input slot.
    ///
    /// Both slots must exist and carry `data_type`, and the input must be
    /// free. On success the link id is recorded on both endpoints.
    pub fn create_link(
        &mut self,
        source: SlotRef,
        target: NodeId,
        target_slot: usize,
        data_type: SlotType,
    ) -> Result<LinkId, CoreError> {
        let (source_node, source_slot) = source;
        let source_idx = self.node_index(source_node)?;
        let target_idx = self.node_index(target)?;

        let output = self.nodes[source_idx]
            .outputs
            .get(source_slot)
            .ok_or(CoreError::SlotNotFound {
                node_id: source_node,
                direction: "output",
                slot: source_slot,
            })?;
        let input = self.nodes[target_idx]
            .inputs
            .get(target_slot)
            .ok_or(CoreError::SlotNotFound {
                node_id: target,
                direction: "input",
                slot: target_slot,
            })?;

        let id = self.next_link_id;
        if output.slot_type != data_type || input.slot_type != data_type {
            return Err(CoreError::InconsistentLink {
                link_id: id,
                reason: format!(
                    "{data_type} link between {} output and {} input",
                    output.slot_type, input.slot_type
                ),
            });
        }
        if let Some(existing) = input.link {
            return Err(CoreError::InconsistentLink {
                link_id: id,
                reason: format!(
                    "input {target_slot} of node {target} is already fed by link {existing}"
                ),
            });
        }

        self.next_link_id = id
            .checked_add(1)
            .ok_or_else(|| CoreError::Internal("Link id space exhausted".to_string()))?;
        self.links.push(GraphLink {
            id,
            source_node,
            source_slot,
            target_node: target,
            target_slot,
            data_type,
        });
        self.nodes[source_idx].outputs[source_slot].links.push(id);
        self.nodes[target_idx].inputs[target_slot].link = Some(id);

        Ok(id)
    }

    /// Look up a node created by this builder.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Consume the builder, returning nodes and links in creation order.
    pub fn finish(self) -> (Vec<GraphNode>, Vec<GraphLink>) {
        (self.nodes, self.links)
    }

    fn node_index(&self, id: NodeId) -> Result<usize, CoreError> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(CoreError::NodeNotFound(id))
    }

    /// Create a sampler node and wire its four inputs.
    fn add_sampler(
        &mut self,
        kind: NodeKind,
        model: SlotRef,
        positive: NodeId,
        negative: NodeId,
        latent: SlotRef,
    ) -> Result<NodeId, CoreError> {
        let sampler = self.create_node(&kind)?;
        self.create_link(model, sampler, slots::SAMPLER_MODEL, SlotType::Model)?;
        self.create_link(
            (positive, slots::SINGLE),
            sampler,
            slots::SAMPLER_POSITIVE,
            SlotType::Conditioning,
        )?;
        self.create_link(
            (negative, slots::SINGLE),
            sampler,
            slots::SAMPLER_NEGATIVE,
            SlotType::Conditioning,
        )?;
        self.create_link(latent, sampler, slots::SAMPLER_LATENT, SlotType::Latent)?;
        Ok(sampler)
    }

    /// Create a VAE decode node fed by `samples` and the checkpoint VAE.
    fn add_decode(&mut self, samples: SlotRef, vae: SlotRef) -> Result<NodeId, CoreError> {
        let decode = self.create_node(&NodeKind::VaeDecode)?;
        self.create_link(samples, decode, slots::VAE_DECODE_SAMPLES, SlotType::Latent)?;
        self.create_link(vae, decode, slots::VAE_DECODE_VAE, SlotType::Vae)?;
        Ok(decode)
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Build the full node/link graph for one generation request.
pub fn build_graph(
    params: &GenerationParameters,
    starting_node_id: NodeId,
) -> Result<(Vec<GraphNode>, Vec<GraphLink>), CoreError> {
    let mut b = GraphBuilder::new(starting_node_id)?;

    let ckpt = b.create_node(&NodeKind::CheckpointLoader {
        ckpt_name: params.model.clone(),
    })?;
    let vae = (ckpt, slots::CHECKPOINT_VAE);
    let mut model_src = (ckpt, slots::CHECKPOINT_MODEL);
    let mut clip_src = (ckpt, slots::CHECKPOINT_CLIP);

    for lora in &params.loras {
        let node = b.create_node(&NodeKind::LoraLoader {
            lora_name: lora.path.clone(),
            strength_model: lora.strength,
            strength_clip: lora.strength,
        })?;
        b.create_link(model_src, node, slots::LORA_MODEL, SlotType::Model)?;
        b.create_link(clip_src, node, slots::LORA_CLIP, SlotType::Clip)?;
        model_src = (node, slots::LORA_MODEL);
        clip_src = (node, slots::LORA_CLIP);
    }

    let positive = b.create_node(&NodeKind::TextEncode {
        text: params.positive_prompt.clone(),
    })?;
    b.create_link(clip_src, positive, slots::SINGLE, SlotType::Clip)?;

    let negative = b.create_node(&NodeKind::TextEncode {
        text: params.negative_prompt.clone(),
    })?;
    b.create_link(clip_src, negative, slots::SINGLE, SlotType::Clip)?;

    let empty_latent = b.create_node(&NodeKind::EmptyLatent {
        width: params.width,
        height: params.height,
    })?;

    let sampler = b.add_sampler(
        NodeKind::Sampler {
            seed: params.seed,
            steps: params.steps,
            cfg: params.cfg,
            sampler_name: params.sampler.clone(),
            denoise: PRIMARY_DENOISE,
        },
        model_src,
        positive,
        negative,
        (empty_latent, slots::SINGLE),
    )?;
    let mut final_latent = (sampler, slots::SINGLE);

    if let Some(upscale) = &params.upscale {
        let loader = b.create_node(&NodeKind::UpscaleModelLoader {
            model_name: upscale.model.clone(),
        })?;
        let decode = b.add_decode(final_latent, vae)?;

        let apply = b.create_node(&NodeKind::ImageUpscale)?;
        b.create_link(
            (loader, slots::SINGLE),
            apply,
            slots::IMAGE_UPSCALE_MODEL,
            SlotType::UpscaleModel,
        )?;
        b.create_link(
            (decode, slots::SINGLE),
            apply,
            slots::IMAGE_UPSCALE_IMAGE,
            SlotType::Image,
        )?;

        let encode = b.create_node(&NodeKind::VaeEncode)?;
        b.create_link(
            (apply, slots::SINGLE),
            encode,
            slots::VAE_ENCODE_PIXELS,
            SlotType::Image,
        )?;
        b.create_link(vae, encode, slots::VAE_ENCODE_VAE, SlotType::Vae)?;

        let second = b.add_sampler(
            NodeKind::Sampler {
                seed: params.seed,
                steps: upscale.steps,
                cfg: params.cfg,
                sampler_name: params.sampler.clone(),
                denoise: upscale.denoising,
            },
            model_src,
            positive,
            negative,
            (encode, slots::SINGLE),
        )?;
        final_latent = (second, slots::SINGLE);
    }

    let decode = b.add_decode(final_latent, vae)?;
    let save = b.create_node(&NodeKind::SaveImage {
        filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
    })?;
    b.create_link((decode, slots::SINGLE), save, slots::SINGLE, SlotType::Image)?;

    Ok(b.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
