use std::env;
use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::prompt_secret;
use crate::config;

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    #[command(subcommand)]
    command: KeySubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum KeySubcommand {
    #[command(about = "Store an API key or the env var that holds it")]
    Set {
        provider: String,
        #[arg(long, help = "Key value; prompted for when neither --value nor --env is given")]
        value: Option<String>,
        #[arg(long = "env", value_name = "VAR", help = "Read the key from this environment variable")]
        env_var: Option<String>,
    },
    #[command(about = "Remove the stored key and env var for a provider")]
    Clear { provider: String },
    #[command(about = "Show the effective key, masked")]
    Show { provider: String },
}

pub fn run(args: KeyArgs, config_path: &Path) -> Result<(), String> {
    let mut cfg = config::load(config_path)?;
    match args.command {
        KeySubcommand::Set {
            provider,
            value,
            env_var,
        } => {
            let provider = known_provider(&cfg, &provider)?;
            let value = match (value, &env_var) {
                (Some(value), _) => Some(value),
                (None, Some(_)) => None,
                (None, None) => Some(prompt_secret(&format!("API key for {provider}: "))?),
            };
            if let Some(env_var) = env_var {
                cfg.set_api_key_env(&provider, &env_var);
            }
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err("API key is empty".to_string());
                }
                cfg.set_api_key(&provider, &value);
            }
            config::save(config_path, &cfg)?;
            println!("Key for {provider} saved.");
            Ok(())
        }
        KeySubcommand::Clear { provider } => {
            let provider = known_provider(&cfg, &provider)?;
            cfg.clear_credentials(&provider);
            config::save(config_path, &cfg)?;
            println!("Key for {provider} cleared.");
            Ok(())
        }
        KeySubcommand::Show { provider } => {
            let provider = known_provider(&cfg, &provider)?;
            let key = cfg.resolve_api_key(&provider);
            if key.is_empty() {
                println!("{provider}: not set");
                return Ok(());
            }
            let env_name = cfg.api_key_env(&provider);
            let from_env = !env_name.is_empty()
                && env::var(&env_name).is_ok_and(|value| value.trim() == key);
            let source = if from_env {
                format!("from ${env_name}")
            } else if cfg.has_stored_key(&provider) {
                "stored in config".to_string()
            } else {
                "from environment".to_string()
            };
            println!("{provider}: {} ({source})", mask_for_show(&key));
            Ok(())
        }
    }
}

fn known_provider(cfg: &config::Config, provider: &str) -> Result<String, String> {
    let provider = provider.trim().to_lowercase();
    if !cfg.provider_exists(&provider) {
        return Err(format!("unsupported provider {provider:?}"));
    }
    Ok(provider)
}

/// Masks all but the last four characters; short values are fully hidden.
pub fn mask_for_show(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    if chars.len() <= 6 {
        return "******".to_string();
    }
    let visible = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}
