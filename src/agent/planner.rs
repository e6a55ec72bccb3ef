//! Plan generation with the planning model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::FailureKind;
use crate::config::plan_prompt;
use crate::model::{parse_json, Parsed, PlanningModel};

/// One UI step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub step_number: u32,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub ui_element: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Step {
    /// What the navigator should look for: the UI element, else the action.
    pub fn target(&self) -> &str {
        match self.ui_element.as_deref().map(str::trim) {
            Some(element) if !element.is_empty() => element,
            _ => self.action.trim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    Bare(Vec<Step>),
    Wrapped { steps: Vec<Step> },
}

/// What planning produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Structured steps ready for automatic execution.
    Planned { plan: Plan },
    /// The model answered, but not with a usable plan.
    Unparsed { raw: String, reason: String },
    /// The model could not be reached.
    Failed { error: String, failure: FailureKind },
}

impl PlanOutcome {
    pub fn steps(&self) -> Option<&[Step]> {
        match self {
            PlanOutcome::Planned { plan } => Some(&plan.steps),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Planner {
    model: Arc<dyn PlanningModel>,
}

impl Planner {
    pub fn new(model: Arc<dyn PlanningModel>) -> Self {
        Self { model }
    }

    pub async fn generate_plan(&self, description: &str) -> PlanOutcome {
        let raw = match self.model.infer(&plan_prompt(description)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Planning request failed: {}", e);
                return PlanOutcome::Failed {
                    error: e.to_string(),
                    failure: FailureKind::from(&e),
                };
            }
        };

        match parse_json::<PlanPayload>(&raw) {
            Parsed::Structured { value } => {
                let mut steps = match value {
                    PlanPayload::Bare(steps) | PlanPayload::Wrapped { steps } => steps,
                };
                for (index, step) in steps.iter_mut().enumerate() {
                    if step.step_number == 0 {
                        step.step_number = index as u32 + 1;
                    }
                }
                tracing::info!("Planned {} steps", steps.len());
                PlanOutcome::Planned { plan: Plan { steps } }
            }
            Parsed::Unparsed { raw, reason } => {
                tracing::warn!("Plan is not structured: {}", reason);
                PlanOutcome::Unparsed { raw, reason }
            }
        }
    }
}
