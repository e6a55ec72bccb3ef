//! Keyword-based intent classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{ANALYSIS_KEYWORDS, CREATION_KEYWORDS, TESTING_KEYWORDS};

pub const CREATION_WORKFLOW: &str = "creation_workflow";
pub const TESTING_WORKFLOW: &str = "testing_workflow";
pub const ANALYSIS_WORKFLOW: &str = "parallel_analysis";

/// Category of a user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Creation,
    Testing,
    Analysis,
    Unknown,
}

impl IntentType {
    pub fn workflow(self) -> Option<&'static str> {
        match self {
            IntentType::Creation => Some(CREATION_WORKFLOW),
            IntentType::Testing => Some(TESTING_WORKFLOW),
            IntentType::Analysis => Some(ANALYSIS_WORKFLOW),
            IntentType::Unknown => None,
        }
    }

    pub fn action(self) -> Option<&'static str> {
        match self {
            IntentType::Creation => Some("plan_and_create_task"),
            IntentType::Testing => Some("run_task_tests"),
            IntentType::Analysis => Some("analyze_screen"),
            IntentType::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentDetection {
    pub query: String,
    pub detected_type: IntentType,
    pub confidence: f64,
    pub recommended_workflow: Option<String>,
    pub action: Option<String>,
}

/// Rule table in precedence order. A later rule wins only with a strictly
/// higher match count than every earlier one.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<(IntentType, &'static [&'static str])>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                (IntentType::Creation, CREATION_KEYWORDS),
                (IntentType::Testing, TESTING_KEYWORDS),
                (IntentType::Analysis, ANALYSIS_KEYWORDS),
            ],
        }
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, query: &str) -> IntentDetection {
        let lowered = query.to_lowercase();

        let mut best: Option<(IntentType, usize, usize)> = None;
        for (category, keywords) in &self.rules {
            let count = keywords.iter().filter(|k| lowered.contains(*k)).count();
            let wins = match best {
                None => count > 0,
                Some((_, best_count, _)) => count > best_count,
            };
            if wins {
                best = Some((*category, count, keywords.len()));
            }
        }

        let (detected_type, confidence) = match best {
            Some((category, count, size)) => (category, (count as f64 / size as f64).min(1.0)),
            None => (IntentType::Unknown, 0.0),
        };

        tracing::debug!(
            "Classified {:?} as {:?} ({:.2})",
            query,
            detected_type,
            confidence
        );

        IntentDetection {
            query: query.to_string(),
            detected_type,
            confidence,
            recommended_workflow: detected_type.workflow().map(str::to_string),
            action: detected_type.action().map(str::to_string),
        }
    }
}

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”|(?:^|\s)'([^']+)'"#).expect("valid regex")
});

/// Pull a task name out of a free-text testing request.
///
/// Quoted text wins. Otherwise a leading testing verb, a leading "the" and a
/// trailing "task" are stripped: `test the WiFi toggle task` -> `WiFi toggle`.
pub fn extract_task_name(query: &str) -> String {
    if let Some(caps) = QUOTED.captures(query) {
        if let Some(m) = caps.iter().skip(1).flatten().next() {
            return m.as_str().trim().to_string();
        }
    }

    let mut words: Vec<&str> = query.split_whitespace().collect();
    if let Some(first) = words.first() {
        let first = first.to_lowercase();
        if TESTING_KEYWORDS.iter().any(|k| first.starts_with(k)) {
            words.remove(0);
        }
    }
    if words.first().is_some_and(|w| w.eq_ignore_ascii_case("the")) {
        words.remove(0);
    }
    if words.len() > 1 && words.last().is_some_and(|w| w.eq_ignore_ascii_case("task")) {
        words.pop();
    }

    let name = words.join(" ");
    if name.is_empty() {
        query.trim().to_string()
    } else {
        name
    }
}
