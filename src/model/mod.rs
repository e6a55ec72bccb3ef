//! Model client module for AI inference.

mod client;
pub mod parse;
mod traits;

pub use client::{
    MessageBuilder, ModelClient, ModelConfig, ModelError, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
pub use parse::{parse_json, Parsed};
pub use traits::{PlanningModel, VisionModel};
