//! ChatML rendering for text-only training rows (`{"text": ...}`).
//!
//! Unlike the vision conversation, an image reference is optional here and is
//! only mentioned inside the context block.

use crate::assemble::system_prompt;
use crate::context::build_text_context_block;
use crate::extract::{extract_fields, ExtractedFields};
use aegis_types::TextRecord;
use serde_json::{Map, Value};

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

pub fn render_chat_template(fields: &ExtractedFields) -> String {
    let context = build_text_context_block(&fields.context, fields.image.as_deref());
    let final_answer = fields.final_answer.as_deref().unwrap_or("");

    format!(
        "{IM_START}system\n{system}{IM_END}\n\
         {IM_START}user\n{context}{query}{IM_END}\n\
         {IM_START}assistant\nThought: {thought}\nAction: {action}\nFinal Answer: {final_answer}{IM_END}",
        system = system_prompt(fields),
        query = fields.user_query,
        thought = fields.thought,
        action = fields.action,
    )
}

pub fn format_text_row(record: &Map<String, Value>) -> TextRecord {
    TextRecord {
        text: render_chat_template(&extract_fields(record)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_row(value: Value) -> TextRecord {
        match value {
            Value::Object(map) => format_text_row(&map),
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn renders_full_chatml_turns() {
        let row = text_row(json!({
            "persona": "Analyst",
            "user_query": "Summarize",
            "input_data": {
                "tools": ["search"],
                "knowledge_context": "kb",
                "image_context": "chart.png"
            },
            "expected_output": {"thought": "read it", "action": "respond", "final_answer": "ok"}
        }));
        assert_eq!(
            row.text,
            "<|im_start|>system\nYou are Aegis. Current Mode: Analyst\nTools: [\"search\"]<|im_end|>\n\
             <|im_start|>user\n<CONTEXT_BLOCK>\n[KNOWLEDGE]:\nkb\n[IMAGE_CONTEXT]:\nchart.png\n\n</CONTEXT_BLOCK>\n\nSummarize<|im_end|>\n\
             <|im_start|>assistant\nThought: read it\nAction: respond\nFinal Answer: ok<|im_end|>"
        );
        row.validate_schema().unwrap();
    }

    #[test]
    fn matches_existing_text_rows_byte_for_byte() {
        let row = text_row(json!({
            "persona": "P",
            "user_query": "q",
            "input_data": {
                "history": "h",
                "dom_elements": "d",
                "observations": "o",
                "knowledge_context": "k"
            },
            "expected_output": {"thought": "t", "action": "a"}
        }));
        assert_eq!(
            row.text,
            "<|im_start|>system\nYou are Aegis. Current Mode: P\nTools: [None]<|im_end|>\n\
             <|im_start|>user\n<CONTEXT_BLOCK>\n[HISTORY]:\nh\n[OBSERVATIONS]:\no\n[KNOWLEDGE]:\nk\n[DOM]:\nd\n\n</CONTEXT_BLOCK>\n\nq<|im_end|>\n\
             <|im_start|>assistant\nThought: t\nAction: a\nFinal Answer: <|im_end|>"
        );
    }

    #[test]
    fn image_is_optional_and_final_answer_line_always_present() {
        let row = text_row(json!({"expected_output": {"thought": "t", "action": "a"}}));
        assert!(!row.text.contains("[IMAGE_CONTEXT]"));
        assert!(row.text.ends_with("Thought: t\nAction: a\nFinal Answer: <|im_end|>"));
        assert!(row.text.contains("Tools: [None]"));
    }
}
