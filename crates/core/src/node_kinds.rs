//! ComfyUI node vocabulary used by the workflow synthesizer.
//!
//! Each [`NodeKind`] variant carries its literal parameters; the lookup
//! methods supply the class type, slot layout, default size and the
//! `widgets_values` array the ComfyUI front end expects for that class.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Slot types
// ---------------------------------------------------------------------------

/// Data types that flow through links between node slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotType {
    Model,
    Clip,
    Vae,
    Conditioning,
    Latent,
    Image,
    UpscaleModel,
}

impl SlotType {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotType::Model => "MODEL",
            SlotType::Clip => "CLIP",
            SlotType::Vae => "VAE",
            SlotType::Conditioning => "CONDITIONING",
            SlotType::Latent => "LATENT",
            SlotType::Image => "IMAGE",
            SlotType::UpscaleModel => "UPSCALE_MODEL",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed connection point on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub slot_type: SlotType,
}

const fn slot(name: &'static str, slot_type: SlotType) -> SlotSpec {
    SlotSpec { name, slot_type }
}

// ---------------------------------------------------------------------------
// Class types and fixed literals
// ---------------------------------------------------------------------------

/// ComfyUI class type names emitted by the synthesizer.
pub mod class_types {
    pub const CHECKPOINT_LOADER: &str = "CheckpointLoaderSimple";
    pub const LORA_LOADER: &str = "LoraLoader";
    pub const TEXT_ENCODE: &str = "CLIPTextEncode";
    pub const EMPTY_LATENT: &str = "EmptyLatentImage";
    pub const SAMPLER: &str = "KSampler";
    pub const UPSCALE_MODEL_LOADER: &str = "UpscaleModelLoader";
    pub const IMAGE_UPSCALE: &str = "ImageUpscaleWithModel";
    pub const VAE_DECODE: &str = "VAEDecode";
    pub const VAE_ENCODE: &str = "VAEEncode";
    pub const SAVE_IMAGE: &str = "SaveImage";
}

/// Seed-control widget literal on sampler nodes.
pub const SEED_CONTROL: &str = "randomize";

/// Scheduler widget literal on sampler nodes.
pub const SCHEDULER: &str = "normal";

/// Output filename prefix on the save node.
pub const DEFAULT_FILENAME_PREFIX: &str = "ComfyUI";

/// Latent batch size.
pub const LATENT_BATCH_SIZE: u32 = 1;

// ---------------------------------------------------------------------------
// Slot layouts
// ---------------------------------------------------------------------------

const NO_SLOTS: &[SlotSpec] = &[];

const CHECKPOINT_OUTPUTS: &[SlotSpec] = &[
    slot("MODEL", SlotType::Model),
    slot("CLIP", SlotType::Clip),
    slot("VAE", SlotType::Vae),
];

const LORA_INPUTS: &[SlotSpec] = &[slot("model", SlotType::Model), slot("clip", SlotType::Clip)];

const LORA_OUTPUTS: &[SlotSpec] = &[slot("MODEL", SlotType::Model), slot("CLIP", SlotType::Clip)];

const TEXT_ENCODE_INPUTS: &[SlotSpec] = &[slot("clip", SlotType::Clip)];

const TEXT_ENCODE_OUTPUTS: &[SlotSpec] = &[slot("CONDITIONING", SlotType::Conditioning)];

const LATENT_OUTPUTS: &[SlotSpec] = &[slot("LATENT", SlotType::Latent)];

const SAMPLER_INPUTS: &[SlotSpec] = &[
    slot("model", SlotType::Model),
    slot("positive", SlotType::Conditioning),
    slot("negative", SlotType::Conditioning),
    slot("latent_image", SlotType::Latent),
];

const UPSCALE_LOADER_OUTPUTS: &[SlotSpec] = &[slot("UPSCALE_MODEL", SlotType::UpscaleModel)];

const VAE_DECODE_INPUTS: &[SlotSpec] = &[slot("samples", SlotType::Latent), slot("vae", SlotType::Vae)];

const IMAGE_OUTPUTS: &[SlotSpec] = &[slot("IMAGE", SlotType::Image)];

const IMAGE_UPSCALE_INPUTS: &[SlotSpec] = &[
    slot("upscale_model", SlotType::UpscaleModel),
    slot("image", SlotType::Image),
];

const VAE_ENCODE_INPUTS: &[SlotSpec] = &[slot("pixels", SlotType::Image), slot("vae", SlotType::Vae)];

const SAVE_IMAGE_INPUTS: &[SlotSpec] = &[slot("images", SlotType::Image)];

/// Slot indices the graph builder wires against.
pub mod slots {
    pub const CHECKPOINT_MODEL: usize = 0;
    pub const CHECKPOINT_CLIP: usize = 1;
    pub const CHECKPOINT_VAE: usize = 2;

    pub const LORA_MODEL: usize = 0;
    pub const LORA_CLIP: usize = 1;

    pub const SAMPLER_MODEL: usize = 0;
    pub const SAMPLER_POSITIVE: usize = 1;
    pub const SAMPLER_NEGATIVE: usize = 2;
    pub const SAMPLER_LATENT: usize = 3;

    pub const VAE_DECODE_SAMPLES: usize = 0;
    pub const VAE_DECODE_VAE: usize = 1;

    pub const IMAGE_UPSCALE_MODEL: usize = 0;
    pub const IMAGE_UPSCALE_IMAGE: usize = 1;

    pub const VAE_ENCODE_PIXELS: usize = 0;
    pub const VAE_ENCODE_VAE: usize = 1;

    /// Every node kind with exactly one input or output uses slot 0.
    pub const SINGLE: usize = 0;
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// A node the synthesizer knows how to emit, with its literal parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    CheckpointLoader {
        ckpt_name: String,
    },
    LoraLoader {
        lora_name: String,
        strength_model: f64,
        strength_clip: f64,
    },
    TextEncode {
        text: String,
    },
    EmptyLatent {
        width: u32,
        height: u32,
    },
    Sampler {
        seed: i64,
        steps: u32,
        cfg: f64,
        sampler_name: String,
        denoise: f64,
    },
    UpscaleModelLoader {
        model_name: String,
    },
    ImageUpscale,
    VaeDecode,
    VaeEncode,
    SaveImage {
        filename_prefix: String,
    },
}

impl NodeKind {
    pub fn class_type(&self) -> &'static str {
        match self {
            NodeKind::CheckpointLoader { .. } => class_types::CHECKPOINT_LOADER,
            NodeKind::LoraLoader { .. } => class_types::LORA_LOADER,
            NodeKind::TextEncode { .. } => class_types::TEXT_ENCODE,
            NodeKind::EmptyLatent { .. } => class_types::EMPTY_LATENT,
            NodeKind::Sampler { .. } => class_types::SAMPLER,
            NodeKind::UpscaleModelLoader { .. } => class_types::UPSCALE_MODEL_LOADER,
            NodeKind::ImageUpscale => class_types::IMAGE_UPSCALE,
            NodeKind::VaeDecode => class_types::VAE_DECODE,
            NodeKind::VaeEncode => class_types::VAE_ENCODE,
            NodeKind::SaveImage { .. } => class_types::SAVE_IMAGE,
        }
    }

    pub fn inputs(&self) -> &'static [SlotSpec] {
        match self {
            NodeKind::CheckpointLoader { .. }
            | NodeKind::EmptyLatent { .. }
            | NodeKind::UpscaleModelLoader { .. } => NO_SLOTS,
            NodeKind::LoraLoader { .. } => LORA_INPUTS,
            NodeKind::TextEncode { .. } => TEXT_ENCODE_INPUTS,
            NodeKind::Sampler { .. } => SAMPLER_INPUTS,
            NodeKind::ImageUpscale => IMAGE_UPSCALE_INPUTS,
            NodeKind::VaeDecode => VAE_DECODE_INPUTS,
            NodeKind::VaeEncode => VAE_ENCODE_INPUTS,
            NodeKind::SaveImage { .. } => SAVE_IMAGE_INPUTS,
        }
    }

    pub fn outputs(&self) -> &'static [SlotSpec] {
        match self {
            NodeKind::CheckpointLoader { .. } => CHECKPOINT_OUTPUTS,
            NodeKind::LoraLoader { .. } => LORA_OUTPUTS,
            NodeKind::TextEncode { .. } => TEXT_ENCODE_OUTPUTS,
            NodeKind::EmptyLatent { .. } | NodeKind::Sampler { .. } | NodeKind::VaeEncode => {
                LATENT_OUTPUTS
            }
            NodeKind::UpscaleModelLoader { .. } => UPSCALE_LOADER_OUTPUTS,
            NodeKind::ImageUpscale | NodeKind::VaeDecode => IMAGE_OUTPUTS,
            NodeKind::SaveImage { .. } => NO_SLOTS,
        }
    }

    /// Canvas size `[width, height]` matching the ComfyUI defaults.
    pub fn default_size(&self) -> [f64; 2] {
        match self {
            NodeKind::CheckpointLoader { .. } => [315.0, 98.0],
            NodeKind::LoraLoader { .. } => [315.0, 126.0],
            NodeKind::TextEncode { .. } => [400.0, 200.0],
            NodeKind::EmptyLatent { .. } => [315.0, 106.0],
            NodeKind::Sampler { .. } => [315.0, 262.0],
            NodeKind::UpscaleModelLoader { .. } => [315.0, 58.0],
            NodeKind::ImageUpscale => [226.0, 46.0],
            NodeKind::VaeDecode | NodeKind::VaeEncode => [210.0, 46.0],
            NodeKind::SaveImage { .. } => [315.0, 270.0],
        }
    }

    pub fn widget_values(&self) -> Vec<serde_json::Value> {
        use serde_json::json;

        match self {
            NodeKind::CheckpointLoader { ckpt_name } => vec![json!(ckpt_name)],
            NodeKind::LoraLoader {
                lora_name,
                strength_model,
                strength_clip,
            } => vec![json!(lora_name), json!(strength_model), json!(strength_clip)],
            NodeKind::TextEncode { text } => vec![json!(text)],
            NodeKind::EmptyLatent { width, height } => {
                vec![json!(width), json!(height), json!(LATENT_BATCH_SIZE)]
            }
            NodeKind::Sampler {
                seed,
                steps,
                cfg,
                sampler_name,
                denoise,
            } => vec![
                json!(seed),
                json!(SEED_CONTROL),
                json!(steps),
                json!(cfg),
                json!(sampler_name),
                json!(SCHEDULER),
                json!(denoise),
            ],
            NodeKind::UpscaleModelLoader { model_name } => vec![json!(model_name)],
            NodeKind::ImageUpscale | NodeKind::VaeDecode | NodeKind::VaeEncode => Vec::new(),
            NodeKind::SaveImage { filename_prefix } => vec![json!(filename_prefix)],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
