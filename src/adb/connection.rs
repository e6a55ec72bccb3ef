//! ADB process plumbing and device discovery.

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Command timed out after {0}s")]
    Timeout(u64),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Invalid screenshot: {0}")]
    InvalidScreenshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdbError {
    /// Whether this error came from a command deadline rather than the device.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdbError::Timeout(_))
    }
}

/// Lists and connects ADB devices.
///
/// # Example
/// ```rust,no_run
/// use vision_tasker::adb::ADBConnection;
///
/// # async fn demo() -> Result<(), vision_tasker::adb::AdbError> {
/// let conn = ADBConnection::new();
/// conn.connect("192.168.1.100:5555").await?;
/// for device in conn.list_devices().await? {
///     println!("{} {}", device.device_id, device.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ADBConnection {
    adb_path: String,
    timeout: Duration,
}

impl Default for ADBConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ADBConnection {
    /// Create a new ADB connection manager with default path.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Create a new ADB connection manager with custom ADB path.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            ..Self::new()
        }
    }

    /// Connect to a remote device via TCP/IP.
    ///
    /// # Arguments
    /// * `address` - Device address in format "host:port". Port defaults to 5555.
    pub async fn connect(&self, address: &str) -> Result<String, AdbError> {
        let address = if !address.contains(':') {
            format!("{}:5555", address)
        } else {
            address.to_string()
        };

        let mut cmd = Command::new(&self.adb_path);
        cmd.args(["connect", &address]);
        let output = run_with_timeout(cmd, self.timeout).await?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if combined.to_lowercase().contains("connected") {
            Ok(format!("Connected to {}", address))
        } else {
            Err(AdbError::Connection(combined.trim().to_string()))
        }
    }

    /// List all connected devices.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let mut cmd = Command::new(&self.adb_path);
        cmd.args(["devices", "-l"]);
        let output = run_with_timeout(cmd, self.timeout).await?;

        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the output of `adb devices -l`.
pub(crate) fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in stdout.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let device_id = parts[0].to_string();
        let connection_type = if device_id.contains(':') {
            ConnectionType::Remote
        } else if parts.iter().any(|p| p.starts_with("usb:")) {
            ConnectionType::Usb
        } else {
            ConnectionType::Wifi
        };

        let model = parts
            .iter()
            .find(|p| p.starts_with("model:"))
            .map(|m| m.trim_start_matches("model:").to_string());

        devices.push(DeviceInfo {
            device_id,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(adb_path: &str, device_id: Option<&str>) -> Vec<String> {
    match device_id {
        Some(id) => vec![adb_path.to_string(), "-s".to_string(), id.to_string()],
        None => vec![adb_path.to_string()],
    }
}

/// Run a command, killing it if it outlives `timeout`.
pub(crate) async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Output, AdbError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AdbError::Connection(format!("adb executable not found: {}", e))
            } else {
                AdbError::Io(e)
            }
        }),
        Err(_) => Err(AdbError::Timeout(timeout.as_secs())),
    }
}
