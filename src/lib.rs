// Copyright 2025 The vision-tasker Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Vision Tasker
//!
//! Vision-guided automation of Tasker on an Android device.
//!
//! A screenshot is taken over ADB, a vision model reports the elements it
//! sees as boxes normalized to 0-1000, and those boxes are mapped to device
//! pixels so the agent can tap them. On top of that loop sit three
//! workflows: creating a task from a plan, testing a task by running it, and
//! analyzing the current screen with several queries at once.
//!
//! ```rust,no_run
//! use vision_tasker::{AppSettings, WorkflowEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // fails with ConfigError before any device or model call
//!     let settings = AppSettings::load().apply_env();
//!     let engine = WorkflowEngine::from_settings(&settings)?;
//!
//!     let dispatch = engine.dispatch("test the WiFi toggle task").await;
//!
//!     println!("{}", serde_json::to_string_pretty(&dispatch.report)?);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod model;
pub mod perception;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

pub use actions::{ActionExecutor, ActionResult, FailureKind, SettleTiming};
pub use adb::{AdbDevice, AdbError, DeviceClient, ScreenCapture};
pub use agent::{
    Dispatch, EngineConfig, IntentClassifier, IntentDetection, IntentType,
    NavigationStepRunner, PlanOutcome, Planner, TaskVerifier, WorkflowEngine, WorkflowReport,
    WorkflowStatus,
};
pub use model::{ModelClient, ModelConfig, ModelError, PlanningModel, VisionModel};
pub use perception::{AnalysisResult, DetectedElement, PerceptionService};
pub use settings::{AppSettings, ConfigError};
