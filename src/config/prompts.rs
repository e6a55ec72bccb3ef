//! Prompts sent to the vision and planning models.

/// Default query when the caller does not supply one.
pub const DEFAULT_VISION_PROMPT: &str = r#"Describe this Android screen. Detect buttons, text fields and visible text.
Return JSON only, in this shape:
{"elements": [{"label": "<visible text or short description>", "box_2d": [ymin, xmin, ymax, xmax]}]}
Coordinates are integers normalized to 0-1000 relative to the screenshot."#;

/// Canned queries run by the analysis workflow, paired with their report labels.
pub const ANALYSIS_QUERIES: [(&str, &str); 3] = [
    (
        "clickable_buttons",
        "List every clickable button on this Android screen. Return JSON {\"elements\": [{\"label\", \"box_2d\": [ymin, xmin, ymax, xmax]}]} with coordinates normalized to 0-1000.",
    ),
    (
        "input_fields",
        "List every text input field on this Android screen. Return JSON {\"elements\": [{\"label\", \"box_2d\": [ymin, xmin, ymax, xmax]}]} with coordinates normalized to 0-1000.",
    ),
    (
        "navigation_elements",
        "List the navigation elements (tabs, back/up arrows, menus, drawers) on this Android screen. Return JSON {\"elements\": [{\"label\", \"box_2d\": [ymin, xmin, ymax, xmax]}]} with coordinates normalized to 0-1000.",
    ),
];

/// Label used in reports for the caller-supplied analysis query.
pub const CUSTOM_QUERY_LABEL: &str = "custom_query";

/// Build the query that locates the element a step refers to.
pub fn find_element_prompt(description: &str) -> String {
    format!(
        "Find the element matching: {}. Report its box.\n\
         Return JSON only: {{\"elements\": [{{\"label\": \"...\", \"box_2d\": [ymin, xmin, ymax, xmax]}}]}} \
         with coordinates normalized to 0-1000, best match first. \
         Return {{\"elements\": []}} if nothing matches.",
        description
    )
}

/// Build the planning prompt for a task description.
pub fn plan_prompt(description: &str) -> String {
    format!(
        "Plan the UI steps to create this Tasker task on an Android phone: {}\n\
         Return JSON only, in this shape:\n\
         {{\"steps\": [{{\"step_number\": 1, \"action\": \"tap\", \"ui_element\": \"<visible label to tap>\", \"description\": \"<what this step does>\"}}]}}",
        description
    )
}
