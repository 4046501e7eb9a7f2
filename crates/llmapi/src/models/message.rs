use serde::{Deserialize, Serialize};

use super::content::{ContentBlock, ToolUseContent};
use super::role::Role;
use crate::providers::base::{StopReason, Usage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A plain-text conversation turn, the lossy projection of a [`RichMessage`]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A conversation turn made of ordered content blocks
pub struct RichMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl RichMessage {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        RichMessage { role, content }
    }

    /// Create an empty user message
    pub fn user() -> Self {
        Self::new(Role::User, Vec::new())
    }

    /// Create an empty assistant message
    pub fn assistant() -> Self {
        Self::new(Role::Assistant, Vec::new())
    }

    /// Add any content block to the message
    pub fn with_content(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(ContentBlock::text(text))
    }

    /// Flatten to plain text.
    ///
    /// Text blocks are concatenated as-is and thinking blocks are framed as
    /// `<thinking>\n...\n</thinking>\n`. Every other kind is dropped.
    pub fn to_message(&self) -> Message {
        let mut content = String::new();
        for block in &self.content {
            match block {
                ContentBlock::Text(text) => content.push_str(&text.text),
                ContentBlock::Thinking(thinking) => {
                    content.push_str("<thinking>\n");
                    content.push_str(&thinking.thinking);
                    content.push_str("\n</thinking>\n");
                }
                _ => {}
            }
        }
        Message {
            role: self.role,
            content,
        }
    }
}

impl From<Message> for RichMessage {
    fn from(message: Message) -> Self {
        let content = if message.content.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(message.content)]
        };
        RichMessage {
            role: message.role,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Everything a backend produced for a single rich send
pub struct RichResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Default for RichResponse {
    fn default() -> Self {
        RichResponse {
            content: Vec::new(),
            stop_reason: StopReason::EndTurn,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

impl RichResponse {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }

    /// Concatenated reasoning of all thinking blocks, without separators
    pub fn thinking_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.as_thinking().map(|t| t.thinking.as_str()))
            .collect()
    }

    pub fn tool_uses(&self) -> Vec<&ToolUseContent> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_use)
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse(_)))
    }

    pub fn usage(&self) -> Usage {
        Usage::new(self.input_tokens, self.output_tokens)
    }

    /// Fold the response into an assistant turn for history
    pub fn into_message(self) -> RichMessage {
        RichMessage::new(Role::Assistant, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::value::RawValue;

    fn raw_json(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn test_to_message_text_only() {
        let message = RichMessage::assistant()
            .with_text("Hello ")
            .with_text("world!")
            .to_message();
        assert_eq!(message, Message::assistant("Hello world!"));
    }

    #[test]
    fn test_to_message_with_thinking() {
        let message = RichMessage::assistant()
            .with_content(ContentBlock::thinking("My reasoning"))
            .with_text("My response")
            .to_message();
        assert_eq!(
            message.content,
            "<thinking>\nMy reasoning\n</thinking>\nMy response"
        );
    }

    #[test]
    fn test_to_message_thinking_not_escaped() {
        let message = RichMessage::assistant()
            .with_content(ContentBlock::thinking("a</thinking>b"))
            .to_message();
        assert_eq!(message.content, "<thinking>\na</thinking>b\n</thinking>\n");
    }

    #[test]
    fn test_to_message_mixed_content() {
        let message = RichMessage::user()
            .with_text("Look at this image:")
            .with_content(ContentBlock::image("image/png", "base64data"))
            .with_content(ContentBlock::tool_use("t1", "noop", raw_json("{}")))
            .with_content(ContentBlock::tool_result("t1", "done", false))
            .with_content(ContentBlock::document("application/pdf", "JVBE", None))
            .with_text(" What do you see?")
            .to_message();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "Look at this image: What do you see?");
    }

    #[test]
    fn test_to_message_text_concatenation_adds_nothing() {
        let parts = ["a", "", " b ", "\n", "c"];
        let mut rich = RichMessage::user();
        for part in parts {
            rich = rich.with_text(part);
        }
        assert_eq!(rich.to_message().content, parts.concat());
    }

    #[test]
    fn test_from_message() {
        let rich = RichMessage::from(Message::user("hi"));
        assert_eq!(rich.content, vec![ContentBlock::text("hi")]);

        let rich = RichMessage::from(Message::assistant(""));
        assert!(rich.content.is_empty());
    }

    #[test]
    fn test_response_text() {
        let response = RichResponse {
            content: vec![
                ContentBlock::thinking("thinking"),
                ContentBlock::text("Hello "),
                ContentBlock::text("world"),
            ],
            ..Default::default()
        };
        assert_eq!(response.text(), "Hello world");
    }

    #[test]
    fn test_response_thinking_text() {
        let response = RichResponse {
            content: vec![
                ContentBlock::thinking("First thought"),
                ContentBlock::text("response"),
                ContentBlock::thinking("Second thought"),
            ],
            ..Default::default()
        };
        assert_eq!(response.thinking_text(), "First thoughtSecond thought");
    }

    #[test]
    fn test_response_tool_uses() {
        let response = RichResponse {
            content: vec![
                ContentBlock::text("I'll use a tool"),
                ContentBlock::tool_use("tool_1", "get_weather", raw_json(r#"{"location":"NYC"}"#)),
                ContentBlock::tool_use("tool_2", "get_time", raw_json("{}")),
            ],
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        };

        let uses = response.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].name, "get_weather");
        assert_eq!(uses[0].input.get(), r#"{"location":"NYC"}"#);
        assert_eq!(uses[1].name, "get_time");
        assert!(response.has_tool_use());
    }

    #[test]
    fn test_response_without_tool_use() {
        let response = RichResponse {
            content: vec![ContentBlock::text("Just text")],
            ..Default::default()
        };
        assert!(!response.has_tool_use());
        assert!(response.tool_uses().is_empty());
    }

    #[test]
    fn test_empty_response() {
        let response = RichResponse::default();
        assert!(!response.has_tool_use());
        assert_eq!(response.text(), "");
        assert_eq!(response.thinking_text(), "");
        assert!(response.tool_uses().is_empty());
    }

    #[test]
    fn test_response_into_message() {
        let response = RichResponse {
            content: vec![ContentBlock::text("done")],
            input_tokens: 3,
            output_tokens: 4,
            ..Default::default()
        };
        assert_eq!(response.usage(), Usage::new(3, 4));

        let message = response.into_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.to_message().content, "done");
    }

    #[test]
    fn test_response_json_keys() {
        let response = RichResponse {
            content: vec![ContentBlock::text("hi")],
            stop_reason: StopReason::MaxTokens,
            input_tokens: 10,
            output_tokens: 20,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["stop_reason"], "max_tokens");
        assert_eq!(value["input_tokens"], 10);
        assert_eq!(value["output_tokens"], 20);
    }
}
