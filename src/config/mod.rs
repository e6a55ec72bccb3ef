//! Static configuration tables.

mod apps;
mod intents;
mod prompts;

pub use apps::{resolve_package, APP_PACKAGES, TASKER_PACKAGE};
pub use intents::{ANALYSIS_KEYWORDS, CREATION_KEYWORDS, TESTING_KEYWORDS};
pub use prompts::{
    find_element_prompt, plan_prompt, ANALYSIS_QUERIES, CUSTOM_QUERY_LABEL, DEFAULT_VISION_PROMPT,
};
