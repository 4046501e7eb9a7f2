use thiserror::Error;

use crate::models::content::ContentType;

/// Failures surfaced by [`Conversation`](crate::providers::base::Conversation) operations.
///
/// A call that returns an error must leave the conversation history as it was.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend error (status={status:?}): {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Unsupported content ({content_type}): {reason}")]
    Unsupported {
        content_type: ContentType,
        reason: String,
    },

    #[error("No conversation factory registered for provider: {0}")]
    ProviderNotRegistered(String),

    #[error("Scripted conversation has no responses left")]
    EmptyScript,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConversationResult<T> = Result<T, ConversationError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that feeds a settings field, e.g. `max_tokens` -> `LLMAPI_MAX_TOKENS`
pub fn to_env_var(field: &str) -> String {
    let field = field.replace('.', "__").to_uppercase();
    format!("LLMAPI_{}", field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("model"), "LLMAPI_MODEL");
        assert_eq!(to_env_var("extra.top_a"), "LLMAPI_EXTRA__TOP_A");
    }

    #[test]
    fn test_error_display() {
        let err = ConversationError::Backend {
            status: Some(529),
            message: "overloaded".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("529"));
        assert!(display.contains("overloaded"));

        let err = ConversationError::Unsupported {
            content_type: ContentType::Document,
            reason: "documents are not accepted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported content (document): documents are not accepted"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar {
            env_var: to_env_var("model"),
        };
        assert!(err.to_string().contains("LLMAPI_MODEL"));
    }
}
