use base64::{engine::general_purpose::STANDARD as BASE64, DecodeError, Engine as _};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The kind of a [`ContentBlock`], matching the `type` key on the wire
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    ToolUse,
    ToolResult,
    Thinking,
    Document,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Where the bytes of an image come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 {
        media_type: String,
        data: String,
    },
    Url {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        media_type: String,
        url: String,
    },
}

impl ImageSource {
    pub fn media_type(&self) -> &str {
        match self {
            ImageSource::Base64 { media_type, .. } | ImageSource::Url { media_type, .. } => {
                media_type
            }
        }
    }

    /// The decoded image bytes, `None` for URL sources.
    ///
    /// Line breaks and other ASCII whitespace inside the data are ignored.
    pub fn decode(&self) -> Option<Result<Vec<u8>, DecodeError>> {
        match self {
            ImageSource::Base64 { data, .. } => {
                let compact: String = data
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                Some(BASE64.decode(compact))
            }
            ImageSource::Url { .. } => None,
        }
    }

    /// Size in bytes of the decoded payload. Unknown for URL sources and
    /// for data that is not valid base64.
    pub fn decoded_size(&self) -> Option<usize> {
        self.decode()?.ok().map(|bytes| bytes.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub source: ImageSource,
}

/// A tool call emitted by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseContent {
    /// Unique within a response, echoed back by the matching tool result
    pub id: String,
    pub name: String,
    /// Encoded tool arguments, kept byte for byte as received
    pub input: Box<RawValue>,
}

impl ToolUseContent {
    /// Decode the arguments into a caller-chosen type
    pub fn parse_input<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.input.get())
    }
}

impl PartialEq for ToolUseContent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.input.get() == other.input.get()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultContent {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

/// A reasoning trace produced before the visible answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingContent {
    pub thinking: String,
    /// Opaque verification token some backends require to be sent back verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub source: DocumentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One unit of conversation content
///
/// Serialized as a flat object whose `type` key names the kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextContent),
    Image(ImageContent),
    ToolUse(ToolUseContent),
    ToolResult(ToolResultContent),
    Thinking(ThinkingContent),
    Document(DocumentContent),
}

impl ContentBlock {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentBlock::Text(TextContent { text: text.into() })
    }

    /// An inline image from already base64-encoded data
    pub fn image<S: Into<String>, T: Into<String>>(media_type: S, data: T) -> Self {
        ContentBlock::Image(ImageContent {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        })
    }

    /// An inline image from raw bytes, encoded here
    pub fn image_from_bytes<S: Into<String>>(media_type: S, bytes: &[u8]) -> Self {
        Self::image(media_type, BASE64.encode(bytes))
    }

    pub fn image_from_url<S: Into<String>, T: Into<String>>(media_type: S, url: T) -> Self {
        ContentBlock::Image(ImageContent {
            source: ImageSource::Url {
                media_type: media_type.into(),
                url: url.into(),
            },
        })
    }

    /// A tool call carrying already-encoded JSON arguments
    pub fn tool_use<S: Into<String>, T: Into<String>>(
        id: S,
        name: T,
        input: Box<RawValue>,
    ) -> Self {
        ContentBlock::ToolUse(ToolUseContent {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn tool_result<S: Into<String>, T: Into<String>>(
        tool_use_id: S,
        content: T,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult(ToolResultContent {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        })
    }

    pub fn thinking<S: Into<String>>(thinking: S) -> Self {
        ContentBlock::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature: None,
        })
    }

    pub fn thinking_with_signature<S: Into<String>, T: Into<String>>(
        thinking: S,
        signature: T,
    ) -> Self {
        ContentBlock::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature: Some(signature.into()),
        })
    }

    pub fn document<S: Into<String>, T: Into<String>>(
        media_type: S,
        data: T,
        title: Option<String>,
    ) -> Self {
        ContentBlock::Document(DocumentContent {
            source: DocumentSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
            title,
        })
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            ContentBlock::Text(_) => ContentType::Text,
            ContentBlock::Image(_) => ContentType::Image,
            ContentBlock::ToolUse(_) => ContentType::ToolUse,
            ContentBlock::ToolResult(_) => ContentType::ToolResult,
            ContentBlock::Thinking(_) => ContentType::Thinking,
            ContentBlock::Document(_) => ContentType::Document,
        }
    }

    /// Get the text if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageContent> {
        match self {
            ContentBlock::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseContent> {
        match self {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultContent> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_thinking(&self) -> Option<&ThinkingContent> {
        match self {
            ContentBlock::Thinking(thinking) => Some(thinking),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&DocumentContent> {
        match self {
            ContentBlock::Document(document) => Some(document),
            _ => None,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

// Internally tagged enums buffer their input, which loses raw JSON
// payloads. Read the block as raw JSON first and dispatch on `type`.
impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tag {
            #[serde(rename = "type")]
            kind: ContentType,
        }

        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let json = raw.get();
        let tag: Tag = serde_json::from_str(json).map_err(de::Error::custom)?;
        let block = match tag.kind {
            ContentType::Text => serde_json::from_str(json).map(ContentBlock::Text),
            ContentType::Image => serde_json::from_str(json).map(ContentBlock::Image),
            ContentType::ToolUse => serde_json::from_str(json).map(ContentBlock::ToolUse),
            ContentType::ToolResult => serde_json::from_str(json).map(ContentBlock::ToolResult),
            ContentType::Thinking => serde_json::from_str(json).map(ContentBlock::Thinking),
            ContentType::Document => serde_json::from_str(json).map(ContentBlock::Document),
        };
        block.map_err(de::Error::custom)
    }
}
