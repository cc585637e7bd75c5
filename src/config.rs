//! Process-wide defaults and environment configuration.
//!
//! Agents take an explicit provider handle; when none is given, `build()`
//! falls back to the process-wide default installed here (or derived from
//! the environment on first use). Tests inject fakes through the explicit
//! handle and never touch this global.

use std::sync::{Arc, OnceLock};

use crate::error::WeftError;
use crate::provider::openai::{Api, OpenAiProvider};
use crate::provider::ModelProvider;

/// Model used when neither the agent nor `WEFT_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Model for agents built without an explicit one: `WEFT_MODEL` from the
/// environment (reads `.env` if present), falling back to
/// [`DEFAULT_MODEL`].
pub fn default_model() -> String {
    let _ = dotenvy::dotenv();
    std::env::var("WEFT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into())
}

/// Environment-derived settings for the default OpenAI provider.
#[derive(Debug, Clone)]
pub struct WeftConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub api: Api,
    pub default_model: String,
}

impl WeftConfig {
    /// Load from the environment (reads `.env` if present):
    /// `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `WEFT_API`
    /// (`completions` | `responses`), `WEFT_MODEL`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let api = match std::env::var("WEFT_API").as_deref() {
            Ok("completions") => Api::Completions,
            _ => Api::Responses,
        };
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            api,
            default_model: default_model(),
        }
    }

    /// Build an OpenAI provider from these settings.
    ///
    /// # Errors
    ///
    /// [`WeftError::Authentication`] when no API key is configured.
    pub fn into_provider(self) -> Result<Arc<dyn ModelProvider>, WeftError> {
        let api_key = self
            .api_key
            .ok_or_else(|| WeftError::Authentication("Missing OPENAI_API_KEY".into()))?;
        Ok(Arc::new(OpenAiProvider::new(api_key, self.base_url, self.api)))
    }
}

static DEFAULT_PROVIDER: OnceLock<Arc<dyn ModelProvider>> = OnceLock::new();

/// Install the process-wide default provider. Returns `false` if one was
/// already installed (first caller wins).
pub fn init_default_provider(provider: Arc<dyn ModelProvider>) -> bool {
    DEFAULT_PROVIDER.set(provider).is_ok()
}

/// The provider agents use when built without an explicit handle.
/// Initialized lazily from [`WeftConfig::from_env`] unless
/// [`init_default_provider`] ran first.
pub fn default_provider() -> Result<Arc<dyn ModelProvider>, WeftError> {
    if let Some(provider) = DEFAULT_PROVIDER.get() {
        return Ok(Arc::clone(provider));
    }
    let provider = WeftConfig::from_env().into_provider()?;
    // A racing initializer wins; both derive from the same environment.
    let _ = DEFAULT_PROVIDER.set(Arc::clone(&provider));
    Ok(Arc::clone(
        DEFAULT_PROVIDER.get().unwrap_or(&provider),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_provider_requires_api_key() {
        let config = WeftConfig {
            api_key: None,
            base_url: None,
            api: Api::Responses,
            default_model: DEFAULT_MODEL.into(),
        };
        let err = config.into_provider().err().unwrap();
        assert!(matches!(err, WeftError::Authentication(_)));
    }

    #[test]
    fn into_provider_builds_with_key() {
        let config = WeftConfig {
            api_key: Some("sk-test".into()),
            base_url: Some("http://localhost:9".into()),
            api: Api::Completions,
            default_model: DEFAULT_MODEL.into(),
        };
        let provider = config.into_provider().unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
