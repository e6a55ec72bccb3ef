use async_trait::async_trait;

use super::client::ModelError;
use crate::adb::ScreenCapture;

/// A model that answers a text query about a screenshot.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn infer(&self, image: &ScreenCapture, prompt: &str) -> Result<String, ModelError>;
}

/// A text-only model used to turn task descriptions into step plans.
#[async_trait]
pub trait PlanningModel: Send + Sync {
    async fn infer(&self, prompt: &str) -> Result<String, ModelError>;
}
