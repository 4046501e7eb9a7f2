use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::base::Conversation;
use crate::errors::{ConversationError, ConversationResult};

/// Identifies an LLM backend
#[derive(
    EnumIter, Display, EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    NovelAi,
}

/// Creates fresh conversations for one provider
pub trait ConversationFactory: Send + Sync {
    fn provider(&self) -> ProviderType;

    fn new_conversation(&self, system: &str) -> Box<dyn Conversation>;
}

/// Selects a factory by [`ProviderType`] at runtime
#[derive(Default, Clone)]
pub struct FactoryRegistry {
    factories: HashMap<ProviderType, Arc<dyn ConversationFactory>>,
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<String> = self.factories.keys().map(|p| p.to_string()).collect();
        providers.sort();
        f.debug_struct("FactoryRegistry")
            .field("providers", &providers)
            .finish()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for the same provider
    pub fn register(&mut self, factory: Arc<dyn ConversationFactory>) -> &mut Self {
        let provider = factory.provider();
        if self.factories.insert(provider, factory).is_some() {
            tracing::warn!(%provider, "replacing registered conversation factory");
        }
        self
    }

    pub fn get(&self, provider: ProviderType) -> Option<Arc<dyn ConversationFactory>> {
        self.factories.get(&provider).cloned()
    }

    pub fn contains(&self, provider: ProviderType) -> bool {
        self.factories.contains_key(&provider)
    }

    pub fn providers(&self) -> Vec<ProviderType> {
        self.factories.keys().copied().collect()
    }

    pub fn new_conversation(
        &self,
        provider: ProviderType,
        system: &str,
    ) -> ConversationResult<Box<dyn Conversation>> {
        let factory = self
            .factories
            .get(&provider)
            .ok_or_else(|| ConversationError::ProviderNotRegistered(provider.to_string()))?;
        tracing::debug!(%provider, "creating conversation");
        Ok(factory.new_conversation(system))
    }
}
