//! Screenshot + vision model as a single "observe" operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coords::{map_box, ClickPoint, NormalizedBox, PixelBox};
use crate::actions::FailureKind;
use crate::adb::{AdbError, DeviceClient, ScreenCapture};
use crate::config::DEFAULT_VISION_PROMPT;
use crate::model::{parse_json, Parsed, VisionModel};

/// An element the vision model reported on screen.
///
/// The pixel box and click point are always derived from the normalized box
/// and the configured screen size; they cannot be set directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedElement {
    label: String,
    normalized_box: Option<NormalizedBox>,
    absolute_box: Option<PixelBox>,
    click_point: Option<ClickPoint>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl DetectedElement {
    pub fn new(
        label: impl Into<String>,
        normalized_box: Option<NormalizedBox>,
        screen_width: u32,
        screen_height: u32,
    ) -> Self {
        let mapped = normalized_box.map(|b| map_box(&b, screen_width, screen_height));
        Self {
            label: label.into(),
            normalized_box,
            absolute_box: mapped.map(|(abs, _)| abs),
            click_point: mapped.map(|(_, click)| click),
            extra: Map::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn normalized_box(&self) -> Option<NormalizedBox> {
        self.normalized_box
    }

    pub fn absolute_box(&self) -> Option<PixelBox> {
        self.absolute_box
    }

    pub fn click_point(&self) -> Option<ClickPoint> {
        self.click_point
    }

    /// Fields the model reported beyond label and box.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Outcome of one observation. Parse failures are reported here, not raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub elements: Vec<DetectedElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl AnalysisResult {
    fn found(elements: Vec<DetectedElement>, description: Option<String>) -> Self {
        Self {
            success: true,
            elements,
            description,
            error: None,
            failure: None,
            raw_response: None,
        }
    }

    fn failed(kind: FailureKind, error: impl Into<String>, raw_response: Option<String>) -> Self {
        Self {
            success: false,
            elements: Vec::new(),
            description: None,
            error: Some(error.into()),
            failure: Some(kind),
            raw_response,
        }
    }

    /// Screenshot could not be taken.
    pub fn capture_failed(error: &AdbError) -> Self {
        let kind = match FailureKind::from(error) {
            FailureKind::Timeout => FailureKind::Timeout,
            _ => FailureKind::Capture,
        };
        Self::failed(kind, format!("capture failed: {}", error), None)
    }

    /// First element in model order.
    pub fn first_element(&self) -> Option<&DetectedElement> {
        self.elements.first()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VisionPayload {
    Elements(Vec<RawElement>),
    Screen(ScreenPayload),
}

#[derive(Deserialize)]
struct ScreenPayload {
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    description: Option<Value>,
}

#[derive(Deserialize)]
struct RawElement {
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    box_2d: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Keys of [`DetectedElement`] that model-supplied extras must not shadow.
const DERIVED_KEYS: [&str; 4] = ["label", "normalized_box", "absolute_box", "click_point"];

fn label_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Captures the screen and asks the vision model about it.
#[derive(Clone)]
pub struct PerceptionService {
    device: Arc<dyn DeviceClient>,
    vision: Arc<dyn VisionModel>,
    screen_width: u32,
    screen_height: u32,
}

impl PerceptionService {
    pub fn new(
        device: Arc<dyn DeviceClient>,
        vision: Arc<dyn VisionModel>,
        screen_width: u32,
        screen_height: u32,
    ) -> Self {
        Self {
            device,
            vision,
            screen_width,
            screen_height,
        }
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    /// Take a screenshot. No retry.
    pub async fn capture(&self) -> Result<ScreenCapture, AdbError> {
        let capture = self.device.screenshot().await?;
        if (capture.width, capture.height) != (self.screen_width, self.screen_height) {
            tracing::debug!(
                "Capture is {}x{}, mapping to configured {}x{}",
                capture.width,
                capture.height,
                self.screen_width,
                self.screen_height
            );
        }
        Ok(capture)
    }

    /// Capture the screen and analyze it with `query`, or the default prompt.
    pub async fn observe(&self, query: Option<&str>) -> AnalysisResult {
        match self.capture().await {
            Ok(capture) => self.analyze(&capture, query).await,
            Err(e) => {
                tracing::warn!("Screen capture failed: {}", e);
                AnalysisResult::capture_failed(&e)
            }
        }
    }

    /// Analyze an existing capture. Several analyses may share one capture.
    pub async fn analyze(&self, capture: &ScreenCapture, query: Option<&str>) -> AnalysisResult {
        let prompt = query.unwrap_or(DEFAULT_VISION_PROMPT);
        match self.vision.infer(capture, prompt).await {
            Ok(raw) => self.interpret(&raw),
            Err(e) => {
                tracing::warn!("Vision model request failed: {}", e);
                AnalysisResult::failed(
                    FailureKind::from(&e),
                    format!("analysis failed: {}", e),
                    None,
                )
            }
        }
    }

    /// Turn raw model text into elements with pixel coordinates.
    pub fn interpret(&self, raw: &str) -> AnalysisResult {
        let (raw_elements, description) = match parse_json::<VisionPayload>(raw) {
            Parsed::Structured { value: VisionPayload::Elements(elements) } => (elements, None),
            Parsed::Structured { value: VisionPayload::Screen(screen) } => {
                let description = screen.description.map(|d| match d {
                    Value::String(s) => s,
                    other => other.to_string(),
                });
                (screen.elements, description)
            }
            Parsed::Unparsed { raw, reason } => {
                tracing::warn!("Vision model returned unparseable output: {}", reason);
                return AnalysisResult::failed(FailureKind::InvalidResponse, reason, Some(raw));
            }
        };

        let elements = raw_elements
            .into_iter()
            .map(|raw| self.to_element(raw))
            .collect();

        AnalysisResult::found(elements, description)
    }

    fn to_element(&self, raw: RawElement) -> DetectedElement {
        let RawElement { label, box_2d, mut extra } = raw;

        let label = label
            .and_then(label_text)
            .filter(|l| !l.is_empty())
            .or_else(|| {
                ["text", "name"]
                    .iter()
                    .find_map(|k| extra.get(*k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_default();

        let normalized = box_2d.and_then(|value| match NormalizedBox::from_value(&value) {
            Ok(b) => Some(b),
            Err(reason) => {
                tracing::warn!("Ignoring box for '{}': {}", label, reason);
                extra.insert("box_2d".to_string(), value);
                None
            }
        });

        for key in DERIVED_KEYS {
            if extra.remove(key).is_some() {
                tracing::debug!("Dropping model-supplied '{}' for '{}'", key, label);
            }
        }

        let mut element =
            DetectedElement::new(label, normalized, self.screen_width, self.screen_height);
        element.extra = extra;
        element
    }
}
