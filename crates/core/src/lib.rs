//! A1111 → ComfyUI workflow synthesis.
//!
//! Parses Automatic1111 generation parameters, normalizes them, and builds
//! a ComfyUI UI-format workflow graph (checkpoint, optional LoRA chain,
//! text encoders, sampler, optional upscale pass, decode and save). Also
//! recognises existing ComfyUI workflow and prompt JSON.

pub mod a1111;
pub mod convert;
pub mod document;
pub mod error;
pub mod graph;
pub mod lora;
pub mod node_kinds;
pub mod params;
pub mod types;
pub mod upscale;
pub mod workflow_check;

pub use convert::{convert, ConversionOptions, ConversionResult};
pub use error::CoreError;
