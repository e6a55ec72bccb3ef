//! ADB (Android Debug Bridge) module for device interaction.

mod client;
mod connection;
mod device;
pub mod input;
mod screenshot;

pub use client::DeviceClient;
pub use connection::{ADBConnection, AdbError, ConnectionType, DeviceInfo};
pub use device::{AdbDevice, DEFAULT_TASK_ACTION};
pub use screenshot::{decode_capture, ScreenCapture};
