//! Keyword table used for intent classification.
//!
//! Matching is substring-based on the lower-cased query, so a keyword also
//! matches inside longer words ("add" in "address").

pub const CREATION_KEYWORDS: &[&str] = &[
    "create", "make", "build", "new", "add", "set up", "setup", "generate",
];

pub const TESTING_KEYWORDS: &[&str] = &["test", "verify", "check", "run", "validate", "try"];

pub const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze", "analyse", "analysis", "describe", "inspect", "examine", "identify", "screen",
];
