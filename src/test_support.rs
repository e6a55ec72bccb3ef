//! Scripted fakes for the device and model seams.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adb::{AdbError, DeviceClient, ScreenCapture};
use crate::model::{ModelError, PlanningModel, VisionModel};

/// A call received by [`FakeDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeviceCall {
    Screenshot,
    Launch(String),
    Tap(u32, u32),
    TypeText(String),
    RunTask(String),
    ForegroundPackage,
}

/// How a scripted model call answers.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Text(String),
    Fail(String),
    Timeout,
}

impl Reply {
    pub(crate) fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    fn into_result(self) -> Result<String, ModelError> {
        match self {
            Reply::Text(s) => Ok(s),
            Reply::Fail(msg) => Err(ModelError::ApiError(msg)),
            Reply::Timeout => Err(ModelError::Timeout(60)),
        }
    }
}

pub(crate) fn fake_capture() -> ScreenCapture {
    ScreenCapture {
        path: PathBuf::from("fake_screen.png"),
        width: 1080,
        height: 2400,
        png_data: vec![0x89, b'P', b'N', b'G'],
    }
}

/// Device that records every call and answers from a script.
pub(crate) struct FakeDevice {
    calls: Mutex<Vec<DeviceCall>>,
    screenshot_error: Option<fn() -> AdbError>,
    tap_error: Option<fn() -> AdbError>,
    foreground: Option<String>,
    task_outputs: Mutex<VecDeque<Result<String, String>>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            screenshot_error: None,
            tap_error: None,
            foreground: None,
            task_outputs: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn failing_screenshot(mut self) -> Self {
        self.screenshot_error = Some(|| AdbError::Connection("device offline".to_string()));
        self
    }

    pub(crate) fn failing_taps(mut self) -> Self {
        self.tap_error = Some(|| AdbError::CommandFailed("input: permission denied".to_string()));
        self
    }

    pub(crate) fn timing_out_taps(mut self) -> Self {
        self.tap_error = Some(|| AdbError::Timeout(15));
        self
    }

    pub(crate) fn with_foreground(mut self, package: &str) -> Self {
        self.foreground = Some(package.to_string());
        self
    }

    /// Outputs returned by successive `run_task` calls; `Err` is a transport failure.
    /// Once exhausted, `run_task` returns an empty broadcast result.
    pub(crate) fn with_task_outputs(self, outputs: Vec<Result<&str, &str>>) -> Self {
        *self.task_outputs.lock().unwrap() = outputs
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        self
    }

    pub(crate) fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeviceClient for FakeDevice {
    async fn screenshot(&self) -> Result<ScreenCapture, AdbError> {
        self.record(DeviceCall::Screenshot);
        match self.screenshot_error {
            Some(make) => Err(make()),
            None => Ok(fake_capture()),
        }
    }

    async fn launch(&self, package: &str) -> Result<(), AdbError> {
        self.record(DeviceCall::Launch(package.to_string()));
        Ok(())
    }

    async fn tap(&self, x: u32, y: u32) -> Result<(), AdbError> {
        self.record(DeviceCall::Tap(x, y));
        match self.tap_error {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    async fn type_text(&self, text: &str) -> Result<(), AdbError> {
        self.record(DeviceCall::TypeText(text.to_string()));
        Ok(())
    }

    async fn run_task(&self, task_name: &str) -> Result<String, AdbError> {
        self.record(DeviceCall::RunTask(task_name.to_string()));
        match self.task_outputs.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(msg)) => Err(AdbError::Connection(msg)),
            None => Ok("Broadcasting: Intent { act=net.dinglisch.android.tasker.ACTION_TASK }\nBroadcast completed: result=0".to_string()),
        }
    }

    async fn foreground_package(&self) -> Result<Option<String>, AdbError> {
        self.record(DeviceCall::ForegroundPackage);
        Ok(self.foreground.clone())
    }
}

/// Vision model answering from a queue, then from prompt rules, then a default.
pub(crate) struct ScriptedVision {
    queue: Mutex<VecDeque<Reply>>,
    rules: Vec<(String, Reply)>,
    default: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVision {
    pub(crate) fn new(default: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            default,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `needle` with `reply`.
    pub(crate) fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    /// Answer the next unanswered call with `reply`, ahead of any rule.
    pub(crate) fn then(self, reply: Reply) -> Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn infer(&self, _image: &ScreenCapture, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(reply) = self.queue.lock().unwrap().pop_front() {
            return reply.into_result();
        }
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone())
            .into_result()
    }
}

/// Planning model with a single fixed answer.
pub(crate) struct ScriptedPlanner {
    reply: Reply,
}

impl ScriptedPlanner {
    pub(crate) fn new(reply: Reply) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl PlanningModel for ScriptedPlanner {
    async fn infer(&self, _prompt: &str) -> Result<String, ModelError> {
        self.reply.clone().into_result()
    }
}

/// Planning model that panics, for fault-containment tests.
pub(crate) struct PanickingPlanner;

#[async_trait]
impl PlanningModel for PanickingPlanner {
    async fn infer(&self, _prompt: &str) -> Result<String, ModelError> {
        panic!("planner backend crashed")
    }
}
