//! Primitive device actions with fixed settle delays.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::result::ActionResult;
use crate::adb::DeviceClient;
use crate::config::resolve_package;

/// Waits applied after an action so the UI can finish transitioning before
/// the next observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTiming {
    /// After taps and text input.
    pub action: Duration,
    /// After launching an app.
    pub launch: Duration,
}

impl Default for SettleTiming {
    fn default() -> Self {
        Self {
            action: Duration::from_secs(1),
            launch: Duration::from_secs(2),
        }
    }
}

impl SettleTiming {
    /// No waiting at all.
    pub fn none() -> Self {
        Self {
            action: Duration::ZERO,
            launch: Duration::ZERO,
        }
    }
}

/// Dispatches taps, text input and app launches.
///
/// Device errors never escape: every call returns an [`ActionResult`].
#[derive(Clone)]
pub struct ActionExecutor {
    device: Arc<dyn DeviceClient>,
    settle: SettleTiming,
}

impl ActionExecutor {
    pub fn new(device: Arc<dyn DeviceClient>) -> Self {
        Self::with_settle(device, SettleTiming::default())
    }

    pub fn with_settle(device: Arc<dyn DeviceClient>, settle: SettleTiming) -> Self {
        Self { device, settle }
    }

    pub fn settle(&self) -> SettleTiming {
        self.settle
    }

    /// Tap at pixel coordinates.
    pub async fn tap(&self, x: u32, y: u32) -> ActionResult {
        match self.device.tap(x, y).await {
            Ok(()) => {
                sleep(self.settle.action).await;
                ActionResult::success(format!("Clicked at ({}, {})", x, y))
            }
            Err(e) => {
                tracing::warn!("Tap at ({}, {}) failed: {}", x, y, e);
                ActionResult::from_adb_error(format!("Tap at ({}, {}) failed", x, y), &e)
            }
        }
    }

    /// Type literal text into the focused field.
    pub async fn type_text(&self, text: &str) -> ActionResult {
        match self.device.type_text(text).await {
            Ok(()) => {
                sleep(self.settle.action).await;
                ActionResult::success(format!("Input text: {}", text))
            }
            Err(e) => {
                tracing::warn!("Text input failed: {}", e);
                ActionResult::from_adb_error("Text input failed", &e)
            }
        }
    }

    /// Launch an app by name or package identifier.
    pub async fn launch(&self, app: &str) -> ActionResult {
        let package = resolve_package(app);
        match self.device.launch(&package).await {
            Ok(()) => {
                sleep(self.settle.launch).await;
                ActionResult::success(format!("Launched {}", package))
            }
            Err(e) => {
                tracing::warn!("Launching {} failed: {}", package, e);
                ActionResult::from_adb_error(format!("Launch of {} failed", package), &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::FailureKind;
    use crate::config::TASKER_PACKAGE;
    use crate::test_support::{DeviceCall, FakeDevice};
    use std::time::Instant;

    fn executor(device: &Arc<FakeDevice>) -> ActionExecutor {
        ActionExecutor::with_settle(device.clone(), SettleTiming::none())
    }

    #[test]
    fn test_default_settle_intervals() {
        let settle = SettleTiming::default();
        assert_eq!(settle.action, Duration::from_secs(1));
        assert_eq!(settle.launch, 2 * settle.action);
    }

    #[tokio::test]
    async fn test_tap_success() {
        let device = Arc::new(FakeDevice::new());
        let result = executor(&device).tap(540, 1200).await;

        assert!(result.success);
        assert_eq!(result.status, "Clicked at (540, 1200)");
        assert_eq!(device.calls(), vec![DeviceCall::Tap(540, 1200)]);
    }

    #[tokio::test]
    async fn test_tap_transport_failure_is_a_value() {
        let device = Arc::new(FakeDevice::new().failing_taps());
        let result = executor(&device).tap(1, 2).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Transport));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_timeout() {
        let device = Arc::new(FakeDevice::new().timing_out_taps());
        let result = executor(&device).tap(1, 2).await;
        assert_eq!(result.failure, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_type_text_passes_text_through() {
        let device = Arc::new(FakeDevice::new());
        let result = executor(&device).type_text("Wake \"up\"").await;

        assert!(result.success);
        assert_eq!(
            device.calls(),
            vec![DeviceCall::TypeText("Wake \"up\"".to_string())]
        );
    }

    #[tokio::test]
    async fn test_launch_resolves_alias() {
        let device = Arc::new(FakeDevice::new());
        let result = executor(&device).launch("Tasker").await;

        assert!(result.success);
        assert_eq!(device.calls(), vec![DeviceCall::Launch(TASKER_PACKAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_settle_wait_elapses_after_tap() {
        let device = Arc::new(FakeDevice::new());
        let settle = SettleTiming {
            action: Duration::from_millis(30),
            launch: Duration::from_millis(60),
        };
        let executor = ActionExecutor::with_settle(device.clone(), settle);

        let started = Instant::now();
        executor.tap(1, 1).await;
        assert!(started.elapsed() >= Duration::from_millis(30));

        let started = Instant::now();
        executor.launch("tasker").await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
