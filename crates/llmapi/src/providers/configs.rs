use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::Sampling;
use crate::errors::{to_env_var, ConfigError};

pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Generation parameters for a conversation.
///
/// Adapters map these onto their native request formats. `extra` carries
/// provider-specific fields and is passed along without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub top_p: f64,
    #[serde(default)]
    pub top_k: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: 0.0,
            top_k: 0,
            stop_sequences: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Load settings from `LLMAPI_*` environment variables on top of the defaults.
    ///
    /// Nested keys use `__`, e.g. `LLMAPI_EXTRA__TOP_A=0.1`. A model is
    /// required; loading without one fails with `LLMAPI_MODEL` missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_and_validate(Self::defaults()?)
    }

    /// Like [`Settings::load`] with a config file layered between the
    /// defaults and the environment. The format follows the file extension.
    ///
    /// `extra` entries from TOML and JSON files keep their keys and values
    /// exactly as written, unless an environment variable overrides them.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = Self::defaults()?.add_source(File::from(path));
        let mut settings = Self::load_and_validate(builder)?;
        settings.restore_file_extra(path)?;
        Ok(settings)
    }

    // The config crate lowercases every key, so reread the file's `extra`
    // table with serde and put its entries back as written.
    fn restore_file_extra(&mut self, path: &Path) -> Result<(), ConfigError> {
        #[derive(Deserialize)]
        struct FileExtra {
            #[serde(default)]
            extra: HashMap<String, Value>,
        }

        let file: FileExtra = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&fs::read_to_string(path)?)?,
            Some("json") => serde_json::from_str(&fs::read_to_string(path)?)?,
            _ => return Ok(()),
        };

        for (key, value) in file.extra {
            let folded = key.to_lowercase();
            let merged = self.extra.remove(&folded);
            let overridden = env::var_os(to_env_var(&format!("extra.{}", folded))).is_some();
            let value = match merged {
                Some(merged) if overridden => merged,
                _ => value,
            };
            self.extra.insert(key, value);
        }
        Ok(())
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("max_tokens", i64::from(DEFAULT_MAX_TOKENS))?
            .set_default("temperature", DEFAULT_TEMPERATURE)?)
    }

    fn load_and_validate(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config = builder
            .add_source(
                Environment::with_prefix("LLMAPI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stop_sequences"),
            )
            .build()?;

        let settings: Settings = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(match &err {
                    config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    },
                    _ => ConfigError::Other(err),
                });
            }
        };

        if settings.model.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("model"),
            });
        }
        Ok(settings)
    }

    /// Settings for one call: every non-zero field of `sampling` replaces the stored value
    pub fn with_sampling(&self, sampling: &Sampling) -> Settings {
        let mut settings = self.clone();
        if sampling.top_k != 0 {
            settings.top_k = sampling.top_k;
        }
        if sampling.temperature != 0.0 {
            settings.temperature = sampling.temperature;
        }
        if sampling.top_p != 0.0 {
            settings.top_p = sampling.top_p;
        }
        settings
    }

    /// Adds a provider-specific extra option.
    pub fn with_extra<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::io::Write;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("LLMAPI_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.temperature, 1.0);
        assert_eq!(settings.top_k, 0);
        assert!(settings.model.is_empty());
    }

    #[test]
    fn test_with_sampling_zero_inherits() {
        let settings = Settings {
            top_k: 40,
            top_p: 0.9,
            ..Settings::new("claude-3-5-sonnet")
        };

        assert_eq!(settings.with_sampling(&Sampling::default()), settings);

        let merged = settings.with_sampling(&Sampling {
            temperature: 0.3,
            ..Default::default()
        });
        assert_eq!(merged.temperature, 0.3);
        assert_eq!(merged.top_k, 40);
        assert_eq!(merged.top_p, 0.9);

        let merged = settings.with_sampling(&Sampling {
            top_k: 10,
            temperature: 0.5,
            top_p: 0.5,
        });
        assert_eq!((merged.top_k, merged.temperature, merged.top_p), (10, 0.5, 0.5));
        assert_eq!(merged.model, "claude-3-5-sonnet");
    }

    #[test]
    fn test_extra_round_trips_unknown_keys() {
        let settings = Settings::new("kayra-v1")
            .with_extra("top_a", 0.1)
            .with_extra("phrase_rep_pen", "medium")
            .with_extra("logit_bias", json!([[1, -0.5]]));

        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
        assert_eq!(back.extra_f64("top_a"), Some(0.1));
        assert_eq!(back.extra_str("phrase_rep_pen"), Some("medium"));
        assert_eq!(back.extra["logit_bias"], json!([[1, -0.5]]));
        assert_eq!(back.extra_bool("missing"), None);
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clean_env();
        env::set_var("LLMAPI_MODEL", "claude-3-5-sonnet");
        env::set_var("LLMAPI_TEMPERATURE", "0.7");
        env::set_var("LLMAPI_TOP_K", "40");
        env::set_var("LLMAPI_EXTRA__USE_STRING", "true");

        let settings = Settings::load().unwrap();
        assert_eq!(settings.model, "claude-3-5-sonnet");
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.top_k, 40);
        assert_eq!(settings.extra_bool("use_string"), Some(true));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_load_requires_model() {
        clean_env();
        env::set_var("LLMAPI_MAX_TOKENS", "100");

        match Settings::load() {
            Err(ConfigError::MissingEnvVar { env_var }) => assert_eq!(env_var, "LLMAPI_MODEL"),
            other => panic!("Expected missing model error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env_override() {
        clean_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
model = "kayra-v1"
max_tokens = 150
stop_sequences = ["\n\n", "***"]

[extra]
top_a = 0.1
"#
        )
        .unwrap();
        env::set_var("LLMAPI_MAX_TOKENS", "300");

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.model, "kayra-v1");
        assert_eq!(settings.max_tokens, 300);
        assert_eq!(settings.temperature, 1.0);
        assert_eq!(settings.stop_sequences, vec!["\n\n", "***"]);
        assert_eq!(settings.extra_f64("top_a"), Some(0.1));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_file_extra_keeps_key_case() {
        clean_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
model = "kayra-v1"

[extra]
repPen = 1.1
top_a = 0.1
logitBias = {{ tokenId = -0.5 }}
"#
        )
        .unwrap();
        env::set_var("LLMAPI_EXTRA__TOP_A", "0.2");

        let settings = Settings::from_file(file.path()).unwrap();
        let mut keys: Vec<_> = settings.extra.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["logitBias", "repPen", "top_a"]);
        assert_eq!(settings.extra_f64("repPen"), Some(1.1));
        assert_eq!(settings.extra["logitBias"], json!({"tokenId": -0.5}));
        // The environment still wins over the file
        assert_eq!(settings.extra_f64("top_a"), Some(0.2));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_json_file_extra_keeps_key_case() {
        clean_env();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"model": "claude-3-5-sonnet", "extra": {{"useCache": true}}}}"#).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.extra_bool("useCache"), Some(true));
        assert!(!settings.extra.contains_key("usecache"));

        clean_env();
    }
}
