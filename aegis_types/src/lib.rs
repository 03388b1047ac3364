use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role order every accepted conversation must follow.
pub const ROLE_ORDER: [Role; 3] = [Role::System, Role::User, Role::Assistant];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One typed unit of message content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { image: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(image: impl Into<String>) -> Self {
        ContentBlock::Image {
            image: image.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// A fine-tuning conversation: system, user, assistant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub messages: Vec<Message>,
}

impl CanonicalRecord {
    pub fn new(system: Message, user: Message, assistant: Message) -> Self {
        Self {
            messages: vec![system, user, assistant],
        }
    }

    pub fn validate_schema(&self) -> Result<()> {
        validate_record_value(&serde_json::to_value(self)?)
    }
}

/// Plain chat-template row, `{"text": "..."}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub text: String,
}

impl TextRecord {
    pub fn validate_schema(&self) -> Result<()> {
        validate_text_record_value(&serde_json::to_value(self)?)
    }
}

/// Structural check for a conversation record. Content blocks are only
/// required to form a non-empty list; their inner shape is not inspected.
pub fn validate_record_value(value: &Value) -> Result<()> {
    let obj = value.as_object().context("record must be a JSON object")?;

    let messages = obj
        .get("messages")
        .and_then(|v| v.as_array())
        .context("messages missing or not an array")?;
    ensure!(
        messages.len() == ROLE_ORDER.len(),
        "expected {} messages, found {}",
        ROLE_ORDER.len(),
        messages.len()
    );

    for (idx, (message, expected)) in messages.iter().zip(ROLE_ORDER).enumerate() {
        let message = message
            .as_object()
            .with_context(|| format!("message {idx} must be an object"))?;
        let role = message
            .get("role")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("message {idx} role missing or not a string"))?;
        ensure!(
            role == expected.as_str(),
            "message {idx} has role {role:?}, expected {:?}",
            expected.as_str()
        );

        let content = message
            .get("content")
            .and_then(|v| v.as_array())
            .with_context(|| format!("message {idx} content must be an array"))?;
        ensure!(!content.is_empty(), "message {idx} content must not be empty");
    }

    Ok(())
}

pub fn validate_text_record_value(value: &Value) -> Result<()> {
    let obj = value.as_object().context("record must be a JSON object")?;
    let text = obj
        .get("text")
        .and_then(|v| v.as_str())
        .context("text missing or not a string")?;
    ensure!(!text.is_empty(), "text must not be empty");
    Ok(())
}
