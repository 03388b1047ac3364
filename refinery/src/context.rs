use crate::pyjson::render_text;
use serde_json::Value;

pub const CONTEXT_OPEN: &str = "<CONTEXT_BLOCK>\n";
pub const CONTEXT_CLOSE: &str = "</CONTEXT_BLOCK>\n\n";

/// Optional side-channel context attached to the user turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextFragments {
    pub history: Option<Value>,
    pub dom_elements: Option<Value>,
    pub observations: Option<Value>,
    pub knowledge_context: Option<Value>,
}

impl ContextFragments {
    /// Sections in vision-prompt order. The order is part of the prompt format
    /// and does not follow field extraction order.
    fn sections(&self) -> [(&'static str, Option<&Value>); 4] {
        [
            ("HISTORY", self.history.as_ref()),
            ("DOM", self.dom_elements.as_ref()),
            ("OBSERVATIONS", self.observations.as_ref()),
            ("KNOWLEDGE", self.knowledge_context.as_ref()),
        ]
    }

    /// Sections in the order text-only ChatML rows have always used.
    fn text_sections(&self) -> [(&'static str, Option<&Value>); 4] {
        [
            ("HISTORY", self.history.as_ref()),
            ("OBSERVATIONS", self.observations.as_ref()),
            ("KNOWLEDGE", self.knowledge_context.as_ref()),
            ("DOM", self.dom_elements.as_ref()),
        ]
    }
}

fn push_section(out: &mut String, tag: &str, body: &str) {
    out.push('[');
    out.push_str(tag);
    out.push_str("]:\n");
    out.push_str(body);
    out.push('\n');
}

fn push_sections<'a, I>(out: &mut String, sections: I)
where
    I: IntoIterator<Item = (&'static str, Option<&'a Value>)>,
{
    for (tag, value) in sections {
        if let Some(value) = value {
            push_section(out, tag, &render_text(value));
        }
    }
}

/// Render the delimited context block. Empty fragments still produce the
/// marker pair.
pub fn build_context_block(fragments: &ContextFragments) -> String {
    let mut out = String::from(CONTEXT_OPEN);
    push_sections(&mut out, fragments.sections());
    out.push_str(CONTEXT_CLOSE);
    out
}

/// Context block for text-only rows. The image reference becomes a trailing
/// `[IMAGE_CONTEXT]` section, and the body is followed by a blank line before
/// the closing marker.
pub fn build_text_context_block(fragments: &ContextFragments, image: Option<&str>) -> String {
    let mut out = String::from(CONTEXT_OPEN);
    push_sections(&mut out, fragments.text_sections());
    if let Some(image) = image {
        push_section(&mut out, "IMAGE_CONTEXT", image);
    }
    out.push('\n');
    out.push_str(CONTEXT_CLOSE);
    out
}
