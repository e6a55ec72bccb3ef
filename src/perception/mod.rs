//! Screen perception: coordinate mapping and vision analysis.

pub mod coords;
mod service;

pub use coords::{map_box, ClickPoint, NormalizedBox, PixelBox, NORMALIZED_MAX};
pub use service::{AnalysisResult, DetectedElement, PerceptionService};
