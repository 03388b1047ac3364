use crate::context::build_context_block;
use crate::error::RecordError;
use crate::extract::{extract_fields, ExtractedFields};
use aegis_types::{CanonicalRecord, ContentBlock, Message, Role};
use serde_json::{Map, Value};

pub const GOAL_ACHIEVED_MARKER: &str = "[GOAL ACHIEVED]";

pub fn system_prompt(fields: &ExtractedFields) -> String {
    format!(
        "You are Aegis. Current Mode: {}\nTools: {}",
        fields.persona, fields.tools
    )
}

/// `Thought`/`Action` lines, then the optional final answer and goal marker.
pub fn assistant_response(fields: &ExtractedFields) -> String {
    let mut response = format!("Thought: {}\nAction: {}", fields.thought, fields.action);
    if let Some(answer) = fields.final_answer.as_deref().filter(|a| !a.is_empty()) {
        response.push_str("\nFinal Answer: ");
        response.push_str(answer);
    }
    if fields.goal_achieved() {
        response.push('\n');
        response.push_str(GOAL_ACHIEVED_MARKER);
    }
    response
}

pub fn assemble_messages(fields: &ExtractedFields, image: &str) -> CanonicalRecord {
    let user_text = format!("{}{}", build_context_block(&fields.context), fields.user_query);

    CanonicalRecord::new(
        Message::text(Role::System, system_prompt(fields)),
        Message {
            role: Role::User,
            content: vec![ContentBlock::image(image), ContentBlock::text(user_text)],
        },
        Message::text(Role::Assistant, assistant_response(fields)),
    )
}

/// Parsed record -> vision conversation. Records without an image reference
/// are rejected.
pub fn format_row(record: &Map<String, Value>) -> Result<CanonicalRecord, RecordError> {
    let fields = extract_fields(record);
    let image = fields.require_image()?;
    Ok(assemble_messages(&fields, image))
}
