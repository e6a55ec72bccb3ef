//! Runs a task on the device and judges its output.

use std::sync::Arc;

use serde::Serialize;

use crate::actions::FailureKind;
use crate::adb::DeviceClient;

/// Output substrings that mark a run as failed, matched case-insensitively.
const FAILURE_MARKERS: [&str; 2] = ["error", "exception"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub task_name: String,
    /// Textual output of the task invocation.
    pub result: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// True when the output mentions none of the failure markers.
///
/// Output that says "error" in a harmless context still fails.
pub fn output_passes(output: &str) -> bool {
    let lowered = output.to_lowercase();
    !FAILURE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[derive(Clone)]
pub struct TaskVerifier {
    device: Arc<dyn DeviceClient>,
}

impl TaskVerifier {
    pub fn new(device: Arc<dyn DeviceClient>) -> Self {
        Self { device }
    }

    pub async fn verify(&self, task_name: &str) -> VerificationResult {
        match self.device.run_task(task_name).await {
            Ok(output) => {
                let passed = output_passes(&output);
                if !passed {
                    tracing::warn!("Task '{}' reported a failure", task_name);
                }
                VerificationResult {
                    task_name: task_name.to_string(),
                    failure: (!passed).then_some(FailureKind::TaskFailed),
                    result: output,
                    passed,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Running task '{}' failed: {}", task_name, e);
                VerificationResult {
                    task_name: task_name.to_string(),
                    result: String::new(),
                    passed: false,
                    error: Some(e.to_string()),
                    failure: Some(FailureKind::from(&e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DeviceCall, FakeDevice};

    #[test]
    fn test_output_heuristic() {
        assert!(output_passes("Broadcast completed: result=0"));
        assert!(!output_passes("java.lang.NullPointerException"));
        assert!(!output_passes("ERROR: task not found"));
    }

    #[test]
    fn test_known_false_negative() {
        // A successful run that merely mentions the word still fails.
        assert!(!output_passes("Cleared 3 error notifications, done"));
    }

    #[tokio::test]
    async fn test_verify_runs_named_task() {
        let device = Arc::new(FakeDevice::new().with_task_outputs(vec![Ok("result=0")]));
        let result = TaskVerifier::new(device.clone()).verify("WiFi toggle").await;

        assert!(result.passed);
        assert_eq!(result.result, "result=0");
        assert!(result.failure.is_none());
        assert_eq!(device.calls(), vec![DeviceCall::RunTask("WiFi toggle".to_string())]);
    }

    #[tokio::test]
    async fn test_failing_output() {
        let device = Arc::new(FakeDevice::new().with_task_outputs(vec![Ok("Exception in task")]));
        let result = TaskVerifier::new(device).verify("x").await;

        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::TaskFailed));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_a_pass() {
        let device = Arc::new(FakeDevice::new().with_task_outputs(vec![Err("device offline")]));
        let result = TaskVerifier::new(device).verify("x").await;

        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::Transport));
        assert!(result.error.unwrap().contains("device offline"));
    }
}
