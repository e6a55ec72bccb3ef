//! Creation, testing and analysis workflows.
//!
//! Every workflow returns a [`WorkflowReport`]. Step outcomes are appended as
//! they happen and are kept when a later step fails, the workflow deadline
//! passes, or a collaborator panics.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::intent::{
    extract_task_name, IntentClassifier, IntentDetection, IntentType, ANALYSIS_WORKFLOW,
    CREATION_WORKFLOW, TESTING_WORKFLOW,
};
use super::navigator::NavigationStepRunner;
use super::planner::{PlanOutcome, Planner};
use super::verifier::{TaskVerifier, VerificationResult};
use crate::actions::{ActionExecutor, ActionResult, SettleTiming};
use crate::adb::{AdbDevice, DeviceClient};
use crate::config::{ANALYSIS_QUERIES, CUSTOM_QUERY_LABEL, TASKER_PACKAGE};
use crate::model::{ModelClient, PlanningModel, VisionModel};
use crate::perception::{AnalysisResult, PerceptionService};
use crate::settings::{AppSettings, ConfigError};

/// Verifier runs per testing workflow.
pub const MAX_TEST_ITERATIONS: u32 = 3;

/// Faults contained at the workflow boundary.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("workflow timed out after {0:?}")]
    Timeout(Duration),

    #[error("workflow panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initiated,
    Completed,
    Passed,
    Failed,
    Error,
}

/// Payload recorded for one workflow step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Planning {
        plan: PlanOutcome,
    },
    Perception {
        result: AnalysisResult,
    },
    Navigation {
        step_number: u32,
        description: String,
        result: ActionResult,
    },
    Verification {
        iteration: u32,
        result: VerificationResult,
    },
    Analysis {
        query: String,
        result: AnalysisResult,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub id: Uuid,
    pub workflow: String,
    pub input: String,
    pub status: WorkflowStatus,
    pub steps_completed: Vec<String>,
    pub results: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowReport {
    pub fn new(workflow: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow: workflow.into(),
            input: input.into(),
            status: WorkflowStatus::Initiated,
            steps_completed: Vec::new(),
            results: Vec::new(),
            error: None,
            message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, label: impl Into<String>, outcome: StepOutcome) {
        self.steps_completed.push(label.into());
        self.results.push(outcome);
    }

    fn conclude(&mut self, status: WorkflowStatus, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
    }

    fn finish(mut self, outcome: Result<(), WorkflowError>) -> Self {
        if let Err(e) = outcome {
            tracing::error!("Workflow {} aborted: {}", self.workflow, e);
            self.status = WorkflowStatus::Error;
            self.error = Some(e.to_string());
        }
        self.finished_at = Some(Utc::now());
        self
    }

    /// Completed or passed.
    pub fn is_success(&self) -> bool {
        matches!(self.status, WorkflowStatus::Completed | WorkflowStatus::Passed)
    }
}

/// A routed request: the classification and the report of the workflow it ran.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    pub intent: IntentDetection,
    pub report: WorkflowReport,
}

/// Knobs for building a [`WorkflowEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub target_package: String,
    pub settle: SettleTiming,
    /// Deadline for a whole workflow run.
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_width: 1080,
            screen_height: 2400,
            target_package: TASKER_PACKAGE.to_string(),
            settle: SettleTiming::default(),
            timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            screen_width: settings.screen_width,
            screen_height: settings.screen_height,
            target_package: settings.target_package.clone(),
            settle: SettleTiming::default(),
            timeout: (settings.workflow_timeout_secs > 0)
                .then(|| Duration::from_secs(settings.workflow_timeout_secs)),
        }
    }

    pub fn with_screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self
    }

    pub fn with_target_package(mut self, package: impl Into<String>) -> Self {
        self.target_package = package.into();
        self
    }

    pub fn with_settle(mut self, settle: SettleTiming) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub struct WorkflowEngine {
    classifier: IntentClassifier,
    planner: Planner,
    perception: PerceptionService,
    navigator: NavigationStepRunner,
    verifier: TaskVerifier,
    timeout: Option<Duration>,
}

impl WorkflowEngine {
    /// Wire an engine from explicit clients. No settings are checked here;
    /// [`WorkflowEngine::from_settings`] is the validated entry point.
    pub fn new(
        device: Arc<dyn DeviceClient>,
        vision: Arc<dyn VisionModel>,
        planning: Arc<dyn PlanningModel>,
        config: EngineConfig,
    ) -> Self {
        let perception = PerceptionService::new(
            device.clone(),
            vision,
            config.screen_width,
            config.screen_height,
        );
        let executor = ActionExecutor::with_settle(device.clone(), config.settle);
        let navigator = NavigationStepRunner::new(device.clone(), perception.clone(), executor)
            .with_target_package(config.target_package);

        Self {
            classifier: IntentClassifier::new(),
            planner: Planner::new(planning),
            perception,
            navigator,
            verifier: TaskVerifier::new(device),
            timeout: config.timeout,
        }
    }

    /// Build the production engine: ADB device plus vision and planner
    /// model clients. Settings are validated before anything is created.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let vision = settings.vision_model_config();
        let planner = settings.planner_model_config();

        tracing::info!(
            device = %settings.device_id,
            vision = %vision.model_name,
            planner = %planner.model_name,
            "Starting engine"
        );

        Self::with_clients(
            settings,
            Arc::new(AdbDevice::from_settings(settings)?),
            Arc::new(ModelClient::new(vision)),
            Arc::new(ModelClient::new(planner)),
        )
    }

    /// Like [`WorkflowEngine::new`], configured from settings that must pass
    /// [`AppSettings::validate`].
    pub fn with_clients(
        settings: &AppSettings,
        device: Arc<dyn DeviceClient>,
        vision: Arc<dyn VisionModel>,
        planning: Arc<dyn PlanningModel>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::new(
            device,
            vision,
            planning,
            EngineConfig::from_settings(settings),
        ))
    }

    pub fn perception(&self) -> &PerceptionService {
        &self.perception
    }

    pub fn classify(&self, query: &str) -> IntentDetection {
        self.classifier.classify(query)
    }

    /// Classify `query` and run the workflow it maps to.
    pub async fn dispatch(&self, query: &str) -> Dispatch {
        let intent = self.classify(query);
        tracing::info!(
            "Routing {:?} to {}",
            query,
            intent.recommended_workflow.as_deref().unwrap_or("nothing")
        );

        let report = match intent.detected_type {
            IntentType::Creation => self.run_creation(query).await,
            IntentType::Testing => self.run_testing(&extract_task_name(query)).await,
            IntentType::Analysis => self.run_analysis(query).await,
            IntentType::Unknown => {
                let mut report = WorkflowReport::new("none", query);
                report.conclude(
                    WorkflowStatus::Failed,
                    "Could not tell whether to create, test or analyze. \
                     Please rephrase, e.g. \"create a task that...\" or \"test the ... task\".",
                );
                report.finish(Ok(()))
            }
        };

        Dispatch { intent, report }
    }

    /// Plan, observe once, then run every planned step in order.
    pub async fn run_creation(&self, query: &str) -> WorkflowReport {
        let mut report = WorkflowReport::new(CREATION_WORKFLOW, query);
        let outcome = self.contain(self.creation_steps(query, &mut report)).await;
        report.finish(outcome)
    }

    /// Run the task until it passes, at most [`MAX_TEST_ITERATIONS`] times.
    pub async fn run_testing(&self, task_name: &str) -> WorkflowReport {
        let mut report = WorkflowReport::new(TESTING_WORKFLOW, task_name);
        let outcome = self.contain(self.testing_steps(task_name, &mut report)).await;
        report.finish(outcome)
    }

    /// Capture once and run the canned queries plus `query` against it.
    pub async fn run_analysis(&self, query: &str) -> WorkflowReport {
        let mut report = WorkflowReport::new(ANALYSIS_WORKFLOW, query);
        let outcome = self.contain(self.analysis_steps(query, &mut report)).await;
        report.finish(outcome)
    }

    async fn contain<F>(&self, body: F) -> Result<(), WorkflowError>
    where
        F: Future<Output = ()>,
    {
        let guarded = AssertUnwindSafe(body).catch_unwind();
        let caught = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| WorkflowError::Timeout(limit))?,
            None => guarded.await,
        };
        caught.map_err(|payload| WorkflowError::Panicked(panic_message(payload)))
    }

    async fn creation_steps(&self, query: &str, report: &mut WorkflowReport) {
        let plan = self.planner.generate_plan(query).await;
        if let PlanOutcome::Failed { error, .. } = &plan {
            let message = format!("Planning failed: {}", error);
            report.record("planning", StepOutcome::Planning { plan: plan.clone() });
            report.conclude(WorkflowStatus::Failed, message);
            return;
        }
        let steps = plan.steps().map(<[_]>::to_vec);
        report.record("planning", StepOutcome::Planning { plan });

        let screen = self.perception.observe(None).await;
        if !screen.success {
            tracing::warn!(
                "Initial screen analysis failed: {}",
                screen.error.as_deref().unwrap_or("unknown")
            );
        }
        report.record("screen_analysis", StepOutcome::Perception { result: screen });

        let Some(steps) = steps else {
            report.conclude(
                WorkflowStatus::Completed,
                "Plan was not structured; no steps were executed. The raw plan is attached.",
            );
            return;
        };

        let mut succeeded = 0;
        for step in &steps {
            let description = step.target().to_string();
            tracing::info!("Step {}: {}", step.step_number, description);

            let result = self.navigator.execute_step(&description).await;
            if result.success {
                succeeded += 1;
            } else {
                tracing::warn!("Step {} failed: {}", step.step_number, result.status);
            }
            report.record(
                format!("step_{}", step.step_number),
                StepOutcome::Navigation {
                    step_number: step.step_number,
                    description,
                    result,
                },
            );
        }

        report.conclude(
            WorkflowStatus::Completed,
            format!("{} of {} steps succeeded", succeeded, steps.len()),
        );
    }

    async fn testing_steps(&self, task_name: &str, report: &mut WorkflowReport) {
        for iteration in 1..=MAX_TEST_ITERATIONS {
            let result = self.verifier.verify(task_name).await;
            let passed = result.passed;
            report.record(
                format!("iteration_{}", iteration),
                StepOutcome::Verification { iteration, result },
            );

            if passed {
                tracing::info!("Task '{}' passed on iteration {}", task_name, iteration);
                report.conclude(
                    WorkflowStatus::Passed,
                    format!("Task '{}' passed on iteration {}", task_name, iteration),
                );
                return;
            }
        }

        report.conclude(
            WorkflowStatus::Failed,
            format!(
                "Task '{}' failed all {} iterations",
                task_name, MAX_TEST_ITERATIONS
            ),
        );
    }

    async fn analysis_steps(&self, query: &str, report: &mut WorkflowReport) {
        let capture = match self.perception.capture().await {
            Ok(capture) => capture,
            Err(e) => {
                let result = AnalysisResult::capture_failed(&e);
                report.record("screen_capture", StepOutcome::Perception { result });
                report.conclude(WorkflowStatus::Failed, format!("Screen capture failed: {}", e));
                return;
            }
        };

        let mut queries: Vec<(&str, &str)> = ANALYSIS_QUERIES.to_vec();
        queries.push((CUSTOM_QUERY_LABEL, query));

        let results = join_all(
            queries
                .iter()
                .map(|(_, prompt)| self.perception.analyze(&capture, Some(*prompt))),
        )
        .await;

        let mut succeeded = 0;
        for ((label, _), result) in queries.iter().zip(results) {
            if result.success {
                succeeded += 1;
            }
            report.record(
                *label,
                StepOutcome::Analysis {
                    query: label.to_string(),
                    result,
                },
            );
        }

        report.conclude(
            WorkflowStatus::Completed,
            format!("{} of {} analyses succeeded", succeeded, queries.len()),
        );
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
