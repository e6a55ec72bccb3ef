//! Navigation, planning, verification and the workflows that drive them.

mod intent;
mod navigator;
mod planner;
mod verifier;
mod workflow;

pub use intent::{
    extract_task_name, IntentClassifier, IntentDetection, IntentType, ANALYSIS_WORKFLOW,
    CREATION_WORKFLOW, TESTING_WORKFLOW,
};
pub use navigator::NavigationStepRunner;
pub use planner::{Plan, PlanOutcome, Planner, Step};
pub use verifier::{output_passes, TaskVerifier, VerificationResult};
pub use workflow::{
    Dispatch, EngineConfig, StepOutcome, WorkflowEngine, WorkflowError, WorkflowReport,
    WorkflowStatus, MAX_TEST_ITERATIONS,
};
