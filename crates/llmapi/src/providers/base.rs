use std::collections::HashSet;
use std::ops::{Add, AddAssign};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::errors::{ConversationError, ConversationResult};
use crate::models::content::{ContentBlock, ContentType};
use crate::models::message::{Message, RichMessage, RichResponse};
use crate::models::role::Role;
use crate::models::tool::ToolDefinition;

/// Upper bound on rounds in [`Conversation::send_until_done`] and
/// [`Conversation::send_streaming_until_done`]. A reply still cut at the
/// token limit after this many rounds is returned with
/// [`StopReason::MaxTokens`].
pub const MAX_CONTINUATION_ROUNDS: usize = 32;

/// Receives streamed output as `(fragment, done)`.
///
/// Called sequentially in arrival order. The last call has `done == true`
/// and happens exactly once, after every fragment was delivered.
pub type StreamCallback<'a> = dyn FnMut(&str, bool) + Send + 'a;

/// Why the backend stopped generating
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    /// Output was cut at the token limit and can be resumed
    MaxTokens,
    StopSequence,
    ToolUse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage::new(
            self.input_tokens + rhs.input_tokens,
            self.output_tokens + rhs.output_tokens,
        )
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

/// Per-call overrides of the conversation's sampling defaults.
///
/// A zero field inherits the conversation setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    #[serde(default)]
    pub top_k: u32,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub top_p: f64,
}

impl Sampling {
    pub fn is_inherit(&self) -> bool {
        self.top_k == 0 && self.temperature == 0.0 && self.top_p == 0.0
    }
}

/// The outcome of a plain-text send
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub stop_reason: StopReason,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Reply {
    pub fn usage(&self) -> Usage {
        Usage::new(self.input_tokens, self.output_tokens)
    }

    /// Append a continuation round: text concatenates, tokens sum and the
    /// newest stop reason wins.
    pub fn absorb(&mut self, round: Reply) {
        self.text.push_str(&round.text);
        self.stop_reason = round.stop_reason;
        self.input_tokens += round.input_tokens;
        self.output_tokens += round.output_tokens;
    }
}

impl From<&RichResponse> for Reply {
    fn from(response: &RichResponse) -> Self {
        Reply {
            text: response.text(),
            stop_reason: response.stop_reason,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        }
    }
}

/// What content and features a backend accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_images: bool,
    pub supports_documents: bool,
    pub supports_tool_use: bool,
    pub supports_thinking: bool,
    pub supports_streaming: bool,
    /// Largest accepted decoded image in bytes, 0 for no limit
    #[serde(default)]
    pub max_image_size: u64,
    /// Accepted image MIME types, empty for no restriction
    #[serde(default)]
    pub supported_image_types: HashSet<String>,
}

impl Capabilities {
    /// What callers should assume about a backend that does not advertise anything
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn supports_image_type(&self, media_type: &str) -> bool {
        self.supports_images
            && (self.supported_image_types.is_empty()
                || self.supported_image_types.contains(media_type))
    }

    /// Reject blocks this backend cannot accept
    pub fn check_blocks(&self, blocks: &[ContentBlock]) -> ConversationResult<()> {
        for block in blocks {
            self.check_block(block)?;
        }
        Ok(())
    }

    fn check_block(&self, block: &ContentBlock) -> ConversationResult<()> {
        let unsupported = |reason: String| ConversationError::Unsupported {
            content_type: block.content_type(),
            reason,
        };

        match block {
            ContentBlock::Text(_) => Ok(()),
            ContentBlock::Image(image) => {
                if !self.supports_images {
                    return Err(unsupported("images are not supported".to_string()));
                }
                let media_type = image.source.media_type();
                if !self.supports_image_type(media_type) {
                    return Err(unsupported(format!(
                        "image type {:?} is not supported",
                        media_type
                    )));
                }
                match image.source.decode() {
                    Some(Err(err)) => Err(unsupported(format!(
                        "image data is not valid base64: {}",
                        err
                    ))),
                    Some(Ok(bytes))
                        if self.max_image_size > 0 && (bytes.len() as u64) > self.max_image_size =>
                    {
                        Err(unsupported(format!(
                            "image is {} bytes, limit is {}",
                            bytes.len(),
                            self.max_image_size
                        )))
                    }
                    _ => Ok(()),
                }
            }
            ContentBlock::Document(_) if !self.supports_documents => {
                Err(unsupported("documents are not supported".to_string()))
            }
            ContentBlock::ToolUse(_) | ContentBlock::ToolResult(_) if !self.supports_tool_use => {
                Err(unsupported("tool use is not supported".to_string()))
            }
            ContentBlock::Thinking(_) if !self.supports_thinking => {
                Err(unsupported("thinking is not supported".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Content kinds this backend accepts
    pub fn content_types(&self) -> Vec<ContentType> {
        let mut types = vec![ContentType::Text];
        if self.supports_images {
            types.push(ContentType::Image);
        }
        if self.supports_tool_use {
            types.push(ContentType::ToolUse);
            types.push(ContentType::ToolResult);
        }
        if self.supports_thinking {
            types.push(ContentType::Thinking);
        }
        if self.supports_documents {
            types.push(ContentType::Document);
        }
        types
    }
}

/// Optional self-description an adapter can offer
pub trait CapabilityProvider {
    fn capabilities(&self) -> Capabilities;
}

/// Base trait for conversation adapters (Anthropic, NovelAI, ...)
///
/// An adapter owns the history of one conversation. Every operation that
/// returns an error must leave that history untouched.
#[async_trait]
pub trait Conversation: Send {
    /// Send a user turn and return the assistant reply.
    ///
    /// Empty `text` continues the last assistant turn instead of sending an
    /// empty user turn.
    async fn send(&mut self, text: &str, sampling: Sampling) -> ConversationResult<Reply>;

    /// Like [`Conversation::send`], reporting output through `callback` as it arrives.
    ///
    /// The returned text equals the concatenation of all non-final fragments.
    async fn send_streaming(
        &mut self,
        text: &str,
        sampling: Sampling,
        callback: &mut StreamCallback<'_>,
    ) -> ConversationResult<Reply>;

    /// Send, then keep continuing while the reply is cut at the token limit,
    /// for at most [`MAX_CONTINUATION_ROUNDS`] rounds.
    async fn send_until_done(&mut self, text: &str, sampling: Sampling) -> ConversationResult<Reply> {
        let mut total = Reply::default();
        let mut next = text;
        for rounds in 1..=MAX_CONTINUATION_ROUNDS {
            let round = self.send(next, sampling).await?;
            total.absorb(round);
            if total.stop_reason != StopReason::MaxTokens {
                tracing::debug!(rounds, output_tokens = total.output_tokens, "reply complete");
                return Ok(total);
            }
            tracing::debug!(rounds, "reply truncated at max_tokens, continuing");
            next = "";
        }
        tracing::warn!(
            rounds = MAX_CONTINUATION_ROUNDS,
            "reply still truncated after the continuation limit"
        );
        Ok(total)
    }

    /// Streaming counterpart of [`Conversation::send_until_done`].
    ///
    /// Fragments of every round are forwarded; `done` is signalled once, after the last round.
    async fn send_streaming_until_done(
        &mut self,
        text: &str,
        sampling: Sampling,
        callback: &mut StreamCallback<'_>,
    ) -> ConversationResult<Reply> {
        let mut total = Reply::default();
        let mut next = text;
        for rounds in 1..=MAX_CONTINUATION_ROUNDS {
            let round = {
                let mut forward = |fragment: &str, done: bool| {
                    if !done {
                        callback(fragment, false);
                    }
                };
                self.send_streaming(next, sampling, &mut forward).await?
            };
            total.absorb(round);
            if total.stop_reason != StopReason::MaxTokens {
                break;
            }
            if rounds == MAX_CONTINUATION_ROUNDS {
                tracing::warn!(rounds, "streamed reply still truncated after the continuation limit");
                break;
            }
            tracing::debug!(
                rounds,
                output_tokens = total.output_tokens,
                "streamed reply truncated at max_tokens, continuing"
            );
            next = "";
        }
        callback("", true);
        Ok(total)
    }

    /// Send a multi-block user turn and return every block of the reply.
    async fn send_rich(
        &mut self,
        content: Vec<ContentBlock>,
        sampling: Sampling,
    ) -> ConversationResult<RichResponse>;

    async fn send_rich_streaming(
        &mut self,
        content: Vec<ContentBlock>,
        sampling: Sampling,
        callback: &mut StreamCallback<'_>,
    ) -> ConversationResult<RichResponse>;

    /// Append a turn without calling the backend
    fn add_message(&mut self, role: Role, content: &str);

    fn add_rich_message(&mut self, role: Role, content: Vec<ContentBlock>);

    fn get_messages(&self) -> Vec<Message>;

    fn get_rich_messages(&self) -> Vec<RichMessage>;

    /// Token usage since creation or the last [`Conversation::clear`]
    fn get_usage(&self) -> Usage;

    fn get_system(&self) -> &str;

    /// Drop the history. System prompt, model and settings survive.
    fn clear(&mut self);

    fn set_model(&mut self, model: &str);

    /// Replace the tool list; an empty list disables tool use
    fn set_tools(&mut self, tools: Vec<ToolDefinition>);

    fn get_tools(&self) -> Vec<ToolDefinition>;

    fn as_capability_provider(&self) -> Option<&dyn CapabilityProvider> {
        None
    }

    /// `None` means the adapter does not advertise, see [`Capabilities::minimal`]
    fn capabilities(&self) -> Option<Capabilities> {
        self.as_capability_provider()
            .map(|provider| provider.capabilities())
    }
}
