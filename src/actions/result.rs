//! Result shape shared by every device action and navigation step.

use serde::Serialize;

use crate::adb::AdbError;
use crate::model::ModelError;

/// Why an action or observation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Device unreachable or command rejected.
    Transport,
    /// A device command or model request ran past its deadline.
    Timeout,
    /// The screenshot could not be taken.
    Capture,
    /// The model answered, but not with usable structured data.
    InvalidResponse,
    /// No matching element on screen.
    NotFound,
    /// The task ran but its output reported a failure.
    TaskFailed,
}

impl From<&AdbError> for FailureKind {
    fn from(error: &AdbError) -> Self {
        if error.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Transport
        }
    }
}

impl From<&ModelError> for FailureKind {
    fn from(error: &ModelError) -> Self {
        if error.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Transport
        }
    }
}

/// Result of an action execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub status: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ActionResult {
    /// Create a successful result.
    pub fn success(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            success: true,
            error: None,
            failure: None,
        }
    }

    /// Create a failure result.
    pub fn failure(status: impl Into<String>, kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
        }
    }

    /// Create a failure result from a device error.
    pub fn from_adb_error(status: impl Into<String>, error: &AdbError) -> Self {
        Self::failure(status, FailureKind::from(error), error.to_string())
    }
}
