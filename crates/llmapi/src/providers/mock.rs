//! Scripted, in-memory [`Conversation`] adapter.
//!
//! [`MockConversation`] plays back queued [`RichResponse`]s (or errors) instead
//! of calling a backend, while keeping history, usage and settings exactly the
//! way a real adapter must. Use it to exercise code written against the
//! [`Conversation`] trait without a network.
use std::collections::VecDeque;

use async_trait::async_trait;

use super::base::{
    Capabilities, CapabilityProvider, Conversation, Reply, Sampling, StopReason, StreamCallback,
    Usage,
};
use super::configs::Settings;
use super::factory::{ConversationFactory, ProviderType};
use super::stream::{split_fragments, StreamSink};
use crate::errors::{ConversationError, ConversationResult};
use crate::models::content::ContentBlock;
use crate::models::message::{Message, RichMessage, RichResponse};
use crate::models::role::Role;
use crate::models::tool::ToolDefinition;

const DEFAULT_FRAGMENT_SIZE: usize = 8;

/// Cloneable stand-in for [`ConversationError`] so failures can be queued
#[derive(Debug, Clone, PartialEq)]
pub enum MockError {
    Request(String),
    Backend { status: Option<u16>, message: String },
    InvalidResponse(String),
}

impl From<MockError> for ConversationError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::Request(message) => ConversationError::Request(message),
            MockError::Backend { status, message } => ConversationError::Backend { status, message },
            MockError::InvalidResponse(message) => ConversationError::InvalidResponse(message),
        }
    }
}

/// One backend call as the mock saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Conversation settings with the call's sampling overrides applied
    pub settings: Settings,
    /// The user content sent; empty for a continuation
    pub content: Vec<ContentBlock>,
    pub tools: Vec<ToolDefinition>,
    /// Number of history turns before the call
    pub history_len: usize,
}

pub struct MockConversation {
    system: String,
    settings: Settings,
    tools: Vec<ToolDefinition>,
    history: Vec<RichMessage>,
    usage: Usage,
    script: VecDeque<Result<RichResponse, MockError>>,
    calls: Vec<RecordedCall>,
    capabilities: Option<Capabilities>,
    fragment_size: usize,
}

impl MockConversation {
    pub fn new<S: Into<String>>(system: S, settings: Settings) -> Self {
        Self {
            system: system.into(),
            settings,
            tools: Vec::new(),
            history: Vec::new(),
            usage: Usage::default(),
            script: VecDeque::new(),
            calls: Vec::new(),
            capabilities: None,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }

    /// Advertise `capabilities` and reject sends they do not allow
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Maximum characters per streamed fragment
    pub fn with_fragment_size(mut self, fragment_size: usize) -> Self {
        self.fragment_size = fragment_size;
        self
    }

    pub fn with_script(mut self, script: Vec<Result<RichResponse, MockError>>) -> Self {
        self.script.extend(script);
        self
    }

    pub fn queue_response(&mut self, response: RichResponse) -> &mut Self {
        self.script.push_back(Ok(response));
        self
    }

    /// Queue a text-only response
    pub fn queue_text<S: Into<String>>(
        &mut self,
        text: S,
        stop_reason: StopReason,
        input_tokens: u64,
        output_tokens: u64,
    ) -> &mut Self {
        self.queue_response(RichResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason,
            input_tokens,
            output_tokens,
        })
    }

    pub fn queue_error(&mut self, error: MockError) -> &mut Self {
        self.script.push_back(Err(error));
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn recorded_calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn exchange(
        &mut self,
        content: Vec<ContentBlock>,
        sampling: Sampling,
    ) -> ConversationResult<RichResponse> {
        if let Some(capabilities) = &self.capabilities {
            capabilities.check_blocks(&content)?;
        }

        self.calls.push(RecordedCall {
            settings: self.settings.with_sampling(&sampling),
            content: content.clone(),
            tools: self.tools.clone(),
            history_len: self.history.len(),
        });

        let response = match self.script.pop_front() {
            Some(Ok(response)) => response,
            Some(Err(err)) => {
                tracing::debug!(?err, "returning scripted error");
                return Err(err.into());
            }
            None => {
                tracing::warn!("scripted conversation ran out of responses");
                return Err(ConversationError::EmptyScript);
            }
        };

        tracing::debug!(
            model = %self.settings.model,
            continuation = content.is_empty(),
            stop_reason = %response.stop_reason,
            "scripted response"
        );
        self.record_turn(content, &response);
        self.usage += response.usage();
        Ok(response)
    }

    fn record_turn(&mut self, content: Vec<ContentBlock>, response: &RichResponse) {
        if content.is_empty() {
            // Continuations extend the trailing assistant turn
            if let Some(last) = self.history.last_mut() {
                if last.role == Role::Assistant {
                    last.content.extend(response.content.iter().cloned());
                    return;
                }
            }
        } else {
            self.history.push(RichMessage::new(Role::User, content));
        }
        self.history
            .push(RichMessage::new(Role::Assistant, response.content.clone()));
    }

    fn stream_response(&self, response: &RichResponse, callback: &mut StreamCallback<'_>) {
        let text = response.text();
        let mut sink = StreamSink::new(callback);
        for fragment in split_fragments(&text, self.fragment_size) {
            sink.emit(fragment);
        }
        sink.finish();
    }
}

impl CapabilityProvider for MockConversation {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone().unwrap_or_else(Capabilities::minimal)
    }
}

fn text_content(text: &str) -> Vec<ContentBlock> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::text(text)]
    }
}

#[async_trait]
impl Conversation for MockConversation {
    async fn send(&mut self, text: &str, sampling: Sampling) -> ConversationResult<Reply> {
        let response = self.exchange(text_content(text), sampling)?;
        Ok(Reply::from(&response))
    }

    async fn send_streaming(
        &mut self,
        text: &str,
        sampling: Sampling,
        callback: &mut StreamCallback<'_>,
    ) -> ConversationResult<Reply> {
        let response = self.exchange(text_content(text), sampling)?;
        self.stream_response(&response, callback);
        Ok(Reply::from(&response))
    }

    async fn send_rich(
        &mut self,
        content: Vec<ContentBlock>,
        sampling: Sampling,
    ) -> ConversationResult<RichResponse> {
        self.exchange(content, sampling)
    }

    async fn send_rich_streaming(
        &mut self,
        content: Vec<ContentBlock>,
        sampling: Sampling,
        callback: &mut StreamCallback<'_>,
    ) -> ConversationResult<RichResponse> {
        let response = self.exchange(content, sampling)?;
        self.stream_response(&response, callback);
        Ok(response)
    }

    fn add_message(&mut self, role: Role, content: &str) {
        self.history
            .push(RichMessage::from(Message::new(role, content)));
    }

    fn add_rich_message(&mut self, role: Role, content: Vec<ContentBlock>) {
        self.history.push(RichMessage::new(role, content));
    }

    fn get_messages(&self) -> Vec<Message> {
        self.history.iter().map(RichMessage::to_message).collect()
    }

    fn get_rich_messages(&self) -> Vec<RichMessage> {
        self.history.clone()
    }

    fn get_usage(&self) -> Usage {
        self.usage
    }

    fn get_system(&self) -> &str {
        &self.system
    }

    fn clear(&mut self) {
        self.history.clear();
        self.usage = Usage::default();
    }

    fn set_model(&mut self, model: &str) {
        self.settings.model = model.to_string();
    }

    fn set_tools(&mut self, tools: Vec<ToolDefinition>) {
        self.tools = tools;
    }

    fn get_tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    fn as_capability_provider(&self) -> Option<&dyn CapabilityProvider> {
        self.capabilities
            .as_ref()
            .map(|_| self as &dyn CapabilityProvider)
    }
}

/// Hands out [`MockConversation`]s that all start from the same script
pub struct MockFactory {
    provider: ProviderType,
    settings: Settings,
    script: Vec<Result<RichResponse, MockError>>,
    capabilities: Option<Capabilities>,
}

impl MockFactory {
    pub fn new(provider: ProviderType, script: Vec<Result<RichResponse, MockError>>) -> Self {
        Self {
            provider,
            settings: Settings::default(),
            script,
            capabilities: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }
}

impl ConversationFactory for MockFactory {
    fn provider(&self) -> ProviderType {
        self.provider
    }

    fn new_conversation(&self, system: &str) -> Box<dyn Conversation> {
        let mut conversation =
            MockConversation::new(system, self.settings.clone()).with_script(self.script.clone());
        if let Some(capabilities) = &self.capabilities {
            conversation = conversation.with_capabilities(capabilities.clone());
        }
        Box::new(conversation)
    }
}
