use crate::clamp::clamp_value;
use crate::context::ContextFragments;
use crate::error::RecordError;
use crate::pyjson::{render_json, render_text};
use serde_json::{Map, Value};

pub const DEFAULT_PERSONA: &str = "ASSISTANT";
pub const NO_TOOLS: &str = "[None]";
pub const DEFAULT_ACTION: &str = "None";

/// Everything the assemblers need from one parsed record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub persona: String,
    /// Rendered tool list, or `[None]`.
    pub tools: String,
    pub image: Option<String>,
    pub context: ContextFragments,
    pub user_query: String,
    pub thought: String,
    pub action: String,
    pub final_answer: Option<String>,
    pub goal: Option<String>,
}

impl ExtractedFields {
    pub fn require_image(&self) -> Result<&str, RecordError> {
        self.image.as_deref().ok_or(RecordError::MissingImage)
    }

    pub fn goal_achieved(&self) -> bool {
        self.goal.as_deref() == Some("achieved")
    }
}

/// Present means non-null and, for strings and containers, non-empty.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| is_present(v))
}

pub fn extract_fields(record: &Map<String, Value>) -> ExtractedFields {
    let input = record.get("input_data").and_then(Value::as_object);
    let input_field = |key: &str| present(input.and_then(|i| i.get(key)));

    let persona = present(record.get("persona"))
        .map(render_text)
        .unwrap_or_else(|| DEFAULT_PERSONA.to_string());

    let tools = present(record.get("available_tools"))
        .or_else(|| input_field("tools"))
        .map(render_json)
        .unwrap_or_else(|| NO_TOOLS.to_string());

    let image = present(record.get("image"))
        .or_else(|| input_field("image_context"))
        .map(render_text);

    let context = ContextFragments {
        history: input_field("history").cloned(),
        dom_elements: input_field("dom_elements").cloned(),
        observations: input_field("observations").cloned(),
        knowledge_context: input_field("knowledge_context").cloned(),
    };

    let user_query = present(record.get("user_query"))
        .map(render_text)
        .unwrap_or_default();

    let expected = record.get("expected_output").and_then(Value::as_object);
    let expected_field = |key: &str| expected.and_then(|e| e.get(key));

    let thought = expected_field("thought")
        .filter(|v| !v.is_null())
        .map(|v| render_text(&clamp_value(v)))
        .unwrap_or_default();

    let action = expected_field("action")
        .filter(|v| !v.is_null())
        .map(render_text)
        .unwrap_or_else(|| DEFAULT_ACTION.to_string());

    let final_answer = present(expected_field("final_answer")).map(render_text);

    let goal = expected_field("goal")
        .and_then(Value::as_str)
        .map(str::to_string);

    ExtractedFields {
        persona,
        tools,
        image,
        context,
        user_query,
        thought,
        action,
        final_answer,
        goal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> ExtractedFields {
        match value {
            Value::Object(map) => extract_fields(&map),
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn empty_record_gets_defaults() {
        let f = fields(json!({}));
        assert_eq!(f.persona, DEFAULT_PERSONA);
        assert_eq!(f.tools, NO_TOOLS);
        assert_eq!(f.image, None);
        assert_eq!(f.context, ContextFragments::default());
        assert_eq!(f.user_query, "");
        assert_eq!(f.thought, "");
        assert_eq!(f.action, DEFAULT_ACTION);
        assert_eq!(f.final_answer, None);
        assert!(!f.goal_achieved());
        assert!(matches!(f.require_image(), Err(RecordError::MissingImage)));
    }

    #[test]
    fn available_tools_take_precedence() {
        let f = fields(json!({
            "available_tools": ["click", "type"],
            "input_data": {"tools": ["scroll"]}
        }));
        assert_eq!(f.tools, r#"["click", "type"]"#);
    }

    #[test]
    fn empty_tool_list_falls_back_then_defaults() {
        let f = fields(json!({
            "available_tools": [],
            "input_data": {"tools": [{"name": "scroll"}]}
        }));
        assert_eq!(f.tools, r#"[{"name": "scroll"}]"#);

        let f = fields(json!({"available_tools": "", "input_data": {"tools": []}}));
        assert_eq!(f.tools, NO_TOOLS);
    }

    #[test]
    fn image_falls_back_to_image_context() {
        let f = fields(json!({"input_data": {"image_context": "shot.png"}}));
        assert_eq!(f.require_image().unwrap(), "shot.png");

        let f = fields(json!({"image": "top.png", "input_data": {"image_context": "ctx.png"}}));
        assert_eq!(f.image.as_deref(), Some("top.png"));

        let f = fields(json!({"image": "", "input_data": {"image_context": "ctx.png"}}));
        assert_eq!(f.image.as_deref(), Some("ctx.png"));
    }

    #[test]
    fn structured_image_reference_is_stringified() {
        let f = fields(json!({"image": {"path": "a.png"}}));
        assert_eq!(f.image.as_deref(), Some(r#"{"path": "a.png"}"#));
    }

    #[test]
    fn context_fragments_come_from_input_data_only() {
        let f = fields(json!({
            "history": "top-level history is ignored",
            "input_data": {
                "history": "step 1",
                "dom_elements": [{"id": 1}],
                "observations": "",
                "knowledge_context": null
            }
        }));
        assert_eq!(f.context.history, Some(json!("step 1")));
        assert_eq!(f.context.dom_elements, Some(json!([{"id": 1}])));
        assert_eq!(f.context.observations, None);
        assert_eq!(f.context.knowledge_context, None);
    }

    #[test]
    fn non_object_input_data_is_ignored() {
        let f = fields(json!({"input_data": "oops", "image": "a.png"}));
        assert_eq!(f.context, ContextFragments::default());
        assert_eq!(f.tools, NO_TOOLS);
    }

    #[test]
    fn thought_is_clamped_and_action_object_is_spaced_json() {
        let f = fields(json!({
            "expected_output": {
                "thought": "click at [50,2000,-10,300]",
                "action": {"type": "click", "box": [1, 2, 3, 4]},
                "final_answer": "done",
                "goal": "achieved"
            }
        }));
        assert_eq!(f.thought, "click at [50, 1000, 0, 300]");
        assert_eq!(f.action, r#"{"type": "click", "box": [1, 2, 3, 4]}"#);
        assert_eq!(f.final_answer.as_deref(), Some("done"));
        assert!(f.goal_achieved());
    }

    #[test]
    fn action_defaults_only_when_missing_or_null() {
        let f = fields(json!({"expected_output": {"action": null}}));
        assert_eq!(f.action, DEFAULT_ACTION);

        let f = fields(json!({"expected_output": {"action": ""}}));
        assert_eq!(f.action, "");
    }

    #[test]
    fn other_goals_are_not_achieved() {
        let f = fields(json!({"expected_output": {"goal": "in_progress"}}));
        assert_eq!(f.goal.as_deref(), Some("in_progress"));
        assert!(!f.goal_achieved());
    }

    #[test]
    fn persona_and_query_are_read_verbatim() {
        let f = fields(json!({"persona": "Researcher", "user_query": "Click submit"}));
        assert_eq!(f.persona, "Researcher");
        assert_eq!(f.user_query, "Click submit");
    }
}
