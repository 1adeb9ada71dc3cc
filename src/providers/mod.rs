//! Provider abstraction layer.
//!
//! Every supported LLM service is exposed through the [`Client`] trait. The
//! built-in providers are resolved by name with [`new`]; user-defined
//! OpenAI-compatible endpoints are built with [`new_openai_compatible`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod anthropic;
pub mod content;
pub mod error;
mod gemini;
mod ollama;
mod openai_compatible;
mod transport;

pub use content::extract_message_content;
pub use error::{ProviderError, Result};

/// A selectable model exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Wire-level identifier used in requests.
    pub id: String,
    /// Informational name; equals `id` when the provider supplies none.
    pub display_name: String,
}

impl Model {
    pub(crate) fn new(id: impl Into<String>, display_name: Option<&str>) -> Self {
        let id = id.into();
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        Self { id, display_name }
    }
}

/// One normalized single-turn query.
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub model: String,
    /// System instructions.
    pub prompt: String,
    /// User text.
    pub question: String,
    /// Ask the provider for strict JSON output when it supports it.
    pub expect_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskResponse {
    pub text: String,
}

/// Shared construction options for every provider client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub api_key: String,
    /// Overrides the provider's default base URL when non-empty.
    pub base_url: String,
    /// Transport to use; a client with a 60s timeout is built when `None`.
    pub http_client: Option<reqwest::Client>,
    /// Static extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

/// Customizes a client for an OpenAI-compatible API.
#[derive(Debug, Clone, Default)]
pub struct OpenAiCompatibleSettings {
    pub name: String,
    /// Defaults to `/models`.
    pub models_path: String,
    /// Defaults to `/chat/completions`.
    pub chat_path: String,
    /// Defaults to `Authorization`.
    pub auth_header: String,
    /// Defaults to `Bearer `.
    pub auth_prefix: String,
    pub require_api_key: bool,
}

/// Uniform contract implemented by every provider.
///
/// Clients hold no mutable state and may be shared across concurrent calls.
/// Dropping a returned future aborts the in-flight HTTP call.
#[async_trait]
pub trait Client: Send + Sync {
    /// Canonical lowercase provider identifier.
    fn name(&self) -> &str;

    /// Fetches the text-generation models, sorted ascending by id.
    async fn list_models(&self) -> Result<Vec<Model>>;

    /// Sends one prompt/question pair and returns the trimmed reply text.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProvider {
    Anthropic,
    Gemini,
    Ollama,
    Openai,
    Openrouter,
}

impl BuiltinProvider {
    /// All built-in providers in name order.
    pub const ALL: [BuiltinProvider; 5] = [
        Self::Anthropic,
        Self::Gemini,
        Self::Ollama,
        Self::Openai,
        Self::Openrouter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::Openrouter => "openrouter",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Ollama => "http://127.0.0.1:11434",
            Self::Openai => "https://api.openai.com/v1",
            Self::Openrouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Environment variable conventionally holding the provider's key.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama => None,
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Openrouter => Some("OPENROUTER_API_KEY"),
        }
    }
}

impl fmt::Display for BuiltinProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinProvider {
    type Err = ProviderError;

    fn from_str(name: &str) -> Result<Self> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(ProviderError::configuration("provider name is required"));
        }
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == name)
            .ok_or_else(|| ProviderError::configuration(format!("unsupported provider {name:?}")))
    }
}

/// Returns a built-in provider client by name.
pub fn new(name: &str, options: ClientOptions) -> Result<Box<dyn Client>> {
    let provider = name.parse::<BuiltinProvider>()?;
    tracing::debug!(%provider, "building provider client");
    let client: Box<dyn Client> = match provider {
        BuiltinProvider::Anthropic => Box::new(anthropic::AnthropicClient::new(options)?),
        BuiltinProvider::Gemini => Box::new(gemini::GeminiClient::new(options)?),
        BuiltinProvider::Ollama => Box::new(ollama::OllamaClient::new(options)?),
        BuiltinProvider::Openai => Box::new(openai_compatible::openai(options)?),
        BuiltinProvider::Openrouter => Box::new(openai_compatible::openrouter(options)?),
    };
    Ok(client)
}

/// Returns a client for a user-defined OpenAI-compatible provider.
pub fn new_openai_compatible(
    mut settings: OpenAiCompatibleSettings,
    options: ClientOptions,
) -> Result<Box<dyn Client>> {
    settings.name = normalize_name(&settings.name);
    if settings.name.is_empty() {
        return Err(ProviderError::configuration("provider name is required"));
    }
    if options.base_url.trim().is_empty() {
        return Err(ProviderError::configuration("base URL is required"));
    }
    Ok(Box::new(openai_compatible::OpenAiCompatibleClient::new(
        settings, options,
    )?))
}

/// Built-in provider names, sorted.
pub fn supported_providers() -> Vec<&'static str> {
    BuiltinProvider::ALL
        .into_iter()
        .map(BuiltinProvider::as_str)
        .collect()
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn sort_models(models: &mut [Model]) {
    models.sort_by(|a, b| a.id.cmp(&b.id));
}
