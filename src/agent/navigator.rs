//! Turns a step description into a tap on the matching element.

use std::sync::Arc;

use crate::actions::{ActionExecutor, ActionResult, FailureKind};
use crate::adb::DeviceClient;
use crate::config::{find_element_prompt, TASKER_PACKAGE};
use crate::perception::PerceptionService;

#[derive(Clone)]
pub struct NavigationStepRunner {
    device: Arc<dyn DeviceClient>,
    perception: PerceptionService,
    executor: ActionExecutor,
    target_package: String,
}

impl NavigationStepRunner {
    pub fn new(
        device: Arc<dyn DeviceClient>,
        perception: PerceptionService,
        executor: ActionExecutor,
    ) -> Self {
        Self {
            device,
            perception,
            executor,
            target_package: TASKER_PACKAGE.to_string(),
        }
    }

    /// App that must be in the foreground before each step.
    pub fn with_target_package(mut self, package: impl Into<String>) -> Self {
        self.target_package = package.into();
        self
    }

    pub fn target_package(&self) -> &str {
        &self.target_package
    }

    /// Launch the target app unless it already has focus.
    pub async fn ensure_foreground(&self) -> ActionResult {
        match self.device.foreground_package().await {
            Ok(Some(current)) if current == self.target_package => {
                return ActionResult::success(format!("{} already in foreground", current));
            }
            Ok(current) => {
                tracing::debug!("Foreground is {:?}, launching {}", current, self.target_package);
            }
            Err(e) => {
                tracing::warn!("Foreground check failed, launching anyway: {}", e);
            }
        }
        self.executor.launch(&self.target_package).await
    }

    /// Find the element `description` refers to and tap it.
    ///
    /// The first element in model order is used; a failed tap is reported,
    /// never retried on another candidate.
    pub async fn execute_step(&self, description: &str) -> ActionResult {
        let foreground = self.ensure_foreground().await;
        if !foreground.success {
            return foreground;
        }

        let analysis = self
            .perception
            .observe(Some(&find_element_prompt(description)))
            .await;

        if !analysis.success {
            return ActionResult::failure(
                "capture/analysis failed",
                analysis.failure.unwrap_or(FailureKind::Capture),
                analysis.error.unwrap_or_default(),
            );
        }

        let Some(element) = analysis.first_element() else {
            tracing::info!("No element matching '{}'", description);
            return ActionResult::failure(
                "element not found",
                FailureKind::NotFound,
                format!("no element matching '{}'", description),
            );
        };

        match element.click_point() {
            Some(point) => {
                tracing::debug!("Tapping '{}' for step '{}'", element.label(), description);
                self.executor.tap(point.x, point.y).await
            }
            None => ActionResult::failure(
                "element not found",
                FailureKind::NotFound,
                format!("element '{}' has no bounding box", element.label()),
            ),
        }
    }

    /// Tap the field `description` refers to, then type `text` into it.
    pub async fn type_into(&self, description: &str, text: &str) -> ActionResult {
        let focused = self.execute_step(description).await;
        if !focused.success {
            return focused;
        }
        self.executor.type_text(text).await
    }
}
