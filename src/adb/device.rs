//! ADB-backed device client.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::client::DeviceClient;
use super::connection::{get_adb_prefix, run_with_timeout, AdbError};
use super::input::{input_text_args, single_quote};
use super::screenshot::{decode_capture, ScreenCapture};
use crate::settings::{AppSettings, ConfigError};

/// Broadcast action Tasker listens on for external task runs.
pub const DEFAULT_TASK_ACTION: &str = "net.dinglisch.android.tasker.ACTION_TASK";

static FOCUS_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z][\w]*(?:\.[\w]+)+)/").expect("valid focus regex"));

/// Controls a single device through the `adb` executable.
///
/// All commands against the device go through one lock, so at most one is in
/// flight at a time even when the client is shared between tasks.
pub struct AdbDevice {
    adb_path: String,
    device_id: String,
    screenshot_path: PathBuf,
    task_action: String,
    timeout: Duration,
    lock: Mutex<()>,
}

impl AdbDevice {
    /// Create a client for the device with the given serial.
    ///
    /// A blank serial is rejected: adb would otherwise pick whatever single
    /// device happens to be attached.
    pub fn new(device_id: impl Into<String>) -> Result<Self, ConfigError> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(ConfigError::MissingDeviceId);
        }
        Ok(Self {
            adb_path: "adb".to_string(),
            device_id,
            screenshot_path: PathBuf::from("current_screen.png"),
            task_action: DEFAULT_TASK_ACTION.to_string(),
            timeout: Duration::from_secs(15),
            lock: Mutex::new(()),
        })
    }

    /// Build a client from settings, rejecting a missing device serial.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(&settings.device_id)?
            .with_screenshot_path(&settings.screenshot_path)
            .with_task_action(&settings.task_action)
            .with_timeout(Duration::from_secs(settings.command_timeout_secs)))
    }

    /// Use a custom `adb` executable.
    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Set where captures are written.
    pub fn with_screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = path.into();
        self
    }

    /// Set the broadcast action used by `run_task`.
    pub fn with_task_action(mut self, action: impl Into<String>) -> Self {
        self.task_action = action.into();
        self
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The device serial this client targets.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Run `adb -s <id> <args>` and return stdout as raw bytes.
    async fn exec(&self, args: &[&str]) -> Result<Vec<u8>, AdbError> {
        let prefix = get_adb_prefix(&self.adb_path, Some(&self.device_id));
        let mut cmd = Command::new(&prefix[0]);
        cmd.args(&prefix[1..]).args(args);

        let _guard = self.lock.lock().await;
        tracing::debug!(device = %self.device_id, ?args, "adb");
        let output = run_with_timeout(cmd, self.timeout).await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") && stderr.contains(&self.device_id) {
            return Err(AdbError::DeviceNotFound(self.device_id.clone()));
        }
        if stderr.contains("device offline") || stderr.contains("no devices") {
            return Err(AdbError::Connection(stderr.trim().to_string()));
        }
        if !output.status.success() {
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(output.stdout)
    }

    /// Run a device shell command and return stdout as text.
    async fn shell(&self, command: &str) -> Result<String, AdbError> {
        let stdout = self.exec(&["shell", command]).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

#[async_trait]
impl DeviceClient for AdbDevice {
    async fn screenshot(&self) -> Result<ScreenCapture, AdbError> {
        // exec-out streams the PNG over stdout, skipping a file on the device
        let png_data = self.exec(&["exec-out", "screencap", "-p"]).await?;
        let capture = decode_capture(png_data, &self.screenshot_path)?;
        tokio::fs::write(&capture.path, &capture.png_data).await?;
        Ok(capture)
    }

    async fn launch(&self, package: &str) -> Result<(), AdbError> {
        let output = self
            .shell(&format!(
                "monkey -p {} -c android.intent.category.LAUNCHER 1",
                package
            ))
            .await?;

        if output.contains("No activities found") {
            return Err(AdbError::CommandFailed(format!(
                "no launchable activity for {}",
                package
            )));
        }
        Ok(())
    }

    async fn tap(&self, x: u32, y: u32) -> Result<(), AdbError> {
        self.shell(&format!("input tap {} {}", x, y)).await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), AdbError> {
        for command in type_text_commands(text) {
            self.shell(&command).await?;
        }
        Ok(())
    }

    async fn run_task(&self, task_name: &str) -> Result<String, AdbError> {
        self.shell(&task_broadcast_command(&self.task_action, task_name))
            .await
    }

    async fn foreground_package(&self) -> Result<Option<String>, AdbError> {
        let output = self.shell("dumpsys window").await?;
        Ok(parse_foreground_package(&output))
    }
}

/// Build the `input text` commands that type `text` verbatim.
pub(crate) fn type_text_commands(text: &str) -> Vec<String> {
    input_text_args(text)
        .into_iter()
        .map(|arg| format!("input text {}", arg))
        .collect()
}

/// Build the `am broadcast` command that runs a named task.
pub(crate) fn task_broadcast_command(action: &str, task_name: &str) -> String {
    format!(
        "am broadcast -a {} -e task_name {}",
        action,
        single_quote(task_name)
    )
}

/// Extract the focused package from `dumpsys window` output.
pub(crate) fn parse_foreground_package(dumpsys: &str) -> Option<String> {
    dumpsys
        .lines()
        .filter(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
        .find_map(|line| {
            FOCUS_PACKAGE
                .captures(line)
                .map(|caps| caps[1].to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_foreground_package() {
        let dumpsys = "  mLastFocus=null\n  \
            mCurrentFocus=Window{3f2a1b u0 net.dinglisch.android.taskerm/net.dinglisch.android.taskerm.Tasker}\n  \
            mFocusedApp=ActivityRecord{9c1 u0 net.dinglisch.android.taskerm/.Tasker t42}\n";
        assert_eq!(
            parse_foreground_package(dumpsys).as_deref(),
            Some("net.dinglisch.android.taskerm")
        );
    }

    #[test]
    fn test_parse_foreground_package_none() {
        assert_eq!(parse_foreground_package("mCurrentFocus=null"), None);
        assert_eq!(parse_foreground_package(""), None);
    }

    #[test]
    fn test_task_broadcast_command() {
        assert_eq!(
            task_broadcast_command(DEFAULT_TASK_ACTION, "WiFi Toggle"),
            "am broadcast -a net.dinglisch.android.tasker.ACTION_TASK -e task_name 'WiFi Toggle'"
        );
    }

    #[test]
    fn test_type_text_commands_keep_text_in_one_argument() {
        assert_eq!(
            type_text_commands("Night\nreboot"),
            vec!["input text 'Night\nreboot'"]
        );
        assert_eq!(
            type_text_commands("Night\r\treboot"),
            vec!["input text 'Night\r\treboot'"]
        );
        assert_eq!(
            type_text_commands("50%sale now"),
            vec!["input text '50%'", "input text 'sale%snow'"]
        );
    }

    #[test]
    fn test_from_settings() {
        let settings = AppSettings {
            device_id: "emulator-5554".to_string(),
            command_timeout_secs: 3,
            ..AppSettings::default()
        };
        let device = AdbDevice::from_settings(&settings).unwrap();
        assert_eq!(device.device_id(), "emulator-5554");
        assert_eq!(device.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_blank_serial_is_rejected() {
        assert!(matches!(AdbDevice::new(""), Err(ConfigError::MissingDeviceId)));
        assert!(matches!(AdbDevice::new("  "), Err(ConfigError::MissingDeviceId)));
        assert!(matches!(
            AdbDevice::from_settings(&AppSettings::default()),
            Err(ConfigError::MissingDeviceId)
        ));
    }

    #[tokio::test]
    async fn test_missing_adb_is_reported_not_panicked() {
        let device = AdbDevice::new("emulator-5554")
            .unwrap()
            .with_adb_path("/nonexistent/adb-binary");
        let err = device.tap(10, 20).await.unwrap_err();
        assert!(matches!(err, AdbError::Connection(_)));
    }
}
