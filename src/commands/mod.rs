pub mod ask;
pub mod config;
pub mod key;
pub mod markdown;
pub mod models;
pub mod provider;

use std::io::{self, BufRead, IsTerminal};

use crate::config::Config;

/// Provider from `--provider`, else the configured current provider.
pub(crate) fn resolve_provider(flag: Option<&str>, config: &Config) -> Result<String, String> {
    let provider = flag
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| config.current_provider.clone());
    if provider.is_empty() {
        return Err(
            "No provider selected. Run `ask provider set <name>` or pass --provider.".to_string(),
        );
    }
    if !config.provider_exists(&provider) {
        return Err(format!(
            "unsupported provider {provider:?} (available: {})",
            config.provider_names().join(", ")
        ));
    }
    Ok(provider)
}

/// Reads a secret without echo on a terminal; piped input is read as a line.
pub(crate) fn prompt_secret(prompt: &str) -> Result<String, String> {
    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| format!("Failed to read input: {err}"))?;
        return Ok(line.trim().to_string());
    }
    rpassword::prompt_password(prompt)
        .map(|secret| secret.trim().to_string())
        .map_err(|err| format!("Failed to read input: {err}"))
}
