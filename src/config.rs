use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::providers::{self, BuiltinProvider, ClientOptions, OpenAiCompatibleSettings};

const DEFAULT_OPENAI_MODEL: &str = "gpt-5-nano";

/// Per-provider settings for a built-in provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key_env: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_url: String,
}

impl ProviderConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A user-defined OpenAI-compatible endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomProviderConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key_env: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub models_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub chat_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_header: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_prefix: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub current_provider: String,
    pub render_markdown: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_providers: BTreeMap<String, CustomProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            BuiltinProvider::Openai.as_str().to_string(),
            ProviderConfig {
                model: DEFAULT_OPENAI_MODEL.to_string(),
                ..Default::default()
            },
        );
        Self {
            current_provider: String::new(),
            render_markdown: true,
            providers,
            custom_providers: BTreeMap::new(),
        }
    }
}

/// Resolves the config path: explicit override, `ASK_CONFIG`, then XDG/HOME.
pub fn config_path(path_override: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = path_override {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = env::var("ASK_CONFIG") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("ask").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        "Cannot resolve config path: set ASK_CONFIG or HOME/XDG_CONFIG_HOME.".to_string()
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("ask")
        .join("config.toml"))
}

/// Loads the config at `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<Config, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found; using defaults");
            return Ok(Config::default());
        }
        Err(err) => {
            return Err(format!(
                "Failed to read config file '{}': {err}",
                path.display()
            ));
        }
    };

    let mut config: Config = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;
    config.normalize();
    Ok(config)
}

/// Writes `config` atomically with owner-only permissions.
pub fn save(path: &Path, config: &Config) -> Result<(), String> {
    let mut config = config.clone();
    config.normalize();
    config.providers.retain(|_, provider| !provider.is_empty());

    let encoded = toml::to_string_pretty(&config)
        .map_err(|err| format!("Failed to encode config: {err}"))?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| {
            format!(
                "Failed to create config directory '{}': {err}",
                dir.display()
            )
        })?;
        set_permissions(dir, 0o700)?;
    }

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, encoded)
        .map_err(|err| format!("Failed to write config file '{}': {err}", tmp.display()))?;
    set_permissions(&tmp, 0o600)?;
    fs::rename(&tmp, path)
        .map_err(|err| format!("Failed to replace config file '{}': {err}", path.display()))?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|err| format!("Failed to set permissions on '{}': {err}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), String> {
    Ok(())
}

/// Default base URL and key env var for a built-in provider.
pub fn builtin_defaults(provider: &str) -> Option<(&'static str, Option<&'static str>)> {
    builtin(provider).map(|builtin| (builtin.default_base_url(), builtin.api_key_env()))
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn builtin(name: &str) -> Option<BuiltinProvider> {
    name.parse().ok()
}

fn env_value(var: &str) -> Option<String> {
    let var = var.trim();
    if var.is_empty() {
        return None;
    }
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    fn normalize(&mut self) {
        self.current_provider = key(&self.current_provider);
        self.providers = std::mem::take(&mut self.providers)
            .into_iter()
            .map(|(name, mut provider)| {
                provider.base_url = provider.base_url.trim().trim_end_matches('/').to_string();
                (key(&name), provider)
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();
        self.custom_providers = std::mem::take(&mut self.custom_providers)
            .into_iter()
            .map(|(name, mut custom)| {
                custom.base_url = custom.base_url.trim().trim_end_matches('/').to_string();
                (key(&name), custom)
            })
            .filter(|(name, custom)| !name.is_empty() && !custom.base_url.is_empty())
            .collect();
    }

    /// Built-in and custom provider names, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names = providers::supported_providers()
            .into_iter()
            .map(str::to_string)
            .chain(self.custom_providers.keys().cloned())
            .collect::<Vec<_>>();
        names.sort();
        names.dedup();
        names
    }

    pub fn provider_exists(&self, name: &str) -> bool {
        let name = key(name);
        builtin(&name).is_some() || self.custom_providers.contains_key(&name)
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom_providers.contains_key(&key(name))
    }

    pub fn model_for(&self, provider: &str) -> String {
        let provider = key(provider);
        match self.custom_providers.get(&provider) {
            Some(custom) => custom.model.trim().to_string(),
            None => self
                .providers
                .get(&provider)
                .map(|config| config.model.trim().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn set_model(&mut self, provider: &str, model: &str) {
        let provider = key(provider);
        let model = model.trim().to_string();
        match self.custom_providers.get_mut(&provider) {
            Some(custom) => custom.model = model,
            None => self.providers.entry(provider).or_default().model = model,
        }
    }

    pub fn set_current_provider(&mut self, provider: &str) {
        self.current_provider = key(provider);
    }

    /// Effective base URL: custom base, configured base, then built-in default.
    pub fn resolve_base_url(&self, provider: &str) -> String {
        let provider = key(provider);
        if let Some(custom) = self.custom_providers.get(&provider) {
            return custom.base_url.trim().trim_end_matches('/').to_string();
        }
        let configured = self
            .providers
            .get(&provider)
            .map(|config| config.base_url.trim())
            .unwrap_or_default();
        if !configured.is_empty() {
            return configured.trim_end_matches('/').to_string();
        }
        builtin(&provider)
            .map(|builtin| builtin.default_base_url().to_string())
            .unwrap_or_default()
    }

    /// Effective API key: configured env var, default env var, then stored key.
    pub fn resolve_api_key(&self, provider: &str) -> String {
        let provider = key(provider);
        if let Some(custom) = self.custom_providers.get(&provider) {
            return env_value(&custom.api_key_env)
                .unwrap_or_else(|| custom.api_key.trim().to_string());
        }

        let config = self.providers.get(&provider);
        config
            .and_then(|config| env_value(&config.api_key_env))
            .or_else(|| {
                builtin(&provider)
                    .and_then(BuiltinProvider::api_key_env)
                    .and_then(env_value)
            })
            .or_else(|| {
                config
                    .map(|config| config.api_key.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
            .unwrap_or_default()
    }

    /// Env var name consulted for a provider's key, if any.
    pub fn api_key_env(&self, provider: &str) -> String {
        let provider = key(provider);
        if let Some(custom) = self.custom_providers.get(&provider) {
            return custom.api_key_env.trim().to_string();
        }
        let configured = self
            .providers
            .get(&provider)
            .map(|config| config.api_key_env.trim().to_string())
            .unwrap_or_default();
        if !configured.is_empty() {
            return configured;
        }
        builtin(&provider)
            .and_then(BuiltinProvider::api_key_env)
            .unwrap_or_default()
            .to_string()
    }

    pub fn has_stored_key(&self, provider: &str) -> bool {
        let provider = key(provider);
        match self.custom_providers.get(&provider) {
            Some(custom) => !custom.api_key.trim().is_empty(),
            None => self
                .providers
                .get(&provider)
                .is_some_and(|config| !config.api_key.trim().is_empty()),
        }
    }

    pub fn set_api_key(&mut self, provider: &str, api_key: &str) {
        let provider = key(provider);
        let api_key = api_key.trim().to_string();
        match self.custom_providers.get_mut(&provider) {
            Some(custom) => custom.api_key = api_key,
            None => self.providers.entry(provider).or_default().api_key = api_key,
        }
    }

    pub fn set_api_key_env(&mut self, provider: &str, env_var: &str) {
        let provider = key(provider);
        let env_var = env_var.trim().to_string();
        match self.custom_providers.get_mut(&provider) {
            Some(custom) => custom.api_key_env = env_var,
            None => self.providers.entry(provider).or_default().api_key_env = env_var,
        }
    }

    pub fn clear_credentials(&mut self, provider: &str) {
        self.set_api_key(provider, "");
        self.set_api_key_env(provider, "");
    }

    pub fn set_base_url(&mut self, provider: &str, base_url: &str) {
        let provider = key(provider);
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        match self.custom_providers.get_mut(&provider) {
            Some(custom) => custom.base_url = base_url,
            None => self.providers.entry(provider).or_default().base_url = base_url,
        }
    }

    /// Adds or replaces a custom OpenAI-compatible provider.
    pub fn add_custom_provider(
        &mut self,
        name: &str,
        mut custom: CustomProviderConfig,
    ) -> Result<(), String> {
        let name = key(name);
        if name.is_empty() {
            return Err("provider name is required".to_string());
        }
        if builtin(&name).is_some() {
            return Err(format!("{name:?} is a built-in provider"));
        }
        custom.base_url = custom.base_url.trim().trim_end_matches('/').to_string();
        if custom.base_url.is_empty() {
            return Err("base_url is required".to_string());
        }
        if custom.models_path.trim().is_empty() {
            custom.models_path = "/models".to_string();
        }
        if custom.chat_path.trim().is_empty() {
            custom.chat_path = "/chat/completions".to_string();
        }
        if custom.auth_header.trim().is_empty() {
            custom.auth_header = "Authorization".to_string();
        }
        if custom.auth_prefix.is_empty() {
            custom.auth_prefix = "Bearer ".to_string();
        }
        self.custom_providers.insert(name, custom);
        Ok(())
    }

    pub fn remove_custom_provider(&mut self, name: &str) -> Result<(), String> {
        let name = key(name);
        if name.is_empty() {
            return Err("provider name is required".to_string());
        }
        if builtin(&name).is_some() {
            return Err("cannot remove built-in provider".to_string());
        }
        if self.custom_providers.remove(&name).is_none() {
            return Err(format!("provider {name:?} not found"));
        }
        if self.current_provider == name {
            self.current_provider.clear();
        }
        Ok(())
    }

    /// Builds the provider client for `provider` from this configuration.
    pub fn client_for(&self, provider: &str) -> Result<Box<dyn providers::Client>, String> {
        let provider = key(provider);
        let api_key = self.resolve_api_key(&provider);
        let client = match self.custom_providers.get(&provider) {
            Some(custom) => providers::new_openai_compatible(
                OpenAiCompatibleSettings {
                    name: provider.clone(),
                    models_path: custom.models_path.clone(),
                    chat_path: custom.chat_path.clone(),
                    auth_header: custom.auth_header.clone(),
                    auth_prefix: custom.auth_prefix.clone(),
                    require_api_key: false,
                },
                ClientOptions {
                    api_key,
                    base_url: custom.base_url.clone(),
                    http_client: None,
                    headers: custom.headers.clone(),
                },
            ),
            None => providers::new(
                &provider,
                ClientOptions {
                    api_key,
                    base_url: self.resolve_base_url(&provider),
                    ..Default::default()
                },
            ),
        };
        client.map_err(|err| err.to_string())
    }
}
