//! Device-control seam used by perception, actions and verification.

use async_trait::async_trait;

use super::connection::AdbError;
use super::screenshot::ScreenCapture;

/// Primitive operations against one physical device.
///
/// Implementations do not validate coordinates or text; callers do.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Capture the current screen.
    async fn screenshot(&self) -> Result<ScreenCapture, AdbError>;

    /// Start an application by package identifier.
    async fn launch(&self, package: &str) -> Result<(), AdbError>;

    /// Tap at pixel coordinates.
    async fn tap(&self, x: u32, y: u32) -> Result<(), AdbError>;

    /// Send literal text to the focused field.
    async fn type_text(&self, text: &str) -> Result<(), AdbError>;

    /// Run a named task by broadcast and return the command output.
    async fn run_task(&self, task_name: &str) -> Result<String, AdbError>;

    /// Package of the focused window, if it can be determined.
    async fn foreground_package(&self) -> Result<Option<String>, AdbError>;
}
