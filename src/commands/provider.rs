use std::collections::BTreeMap;
use std::path::Path;

use clap::{Args, Subcommand};
use serde_json::json;

use crate::config::{self, Config, CustomProviderConfig};

#[derive(Debug, Args, Clone)]
pub struct ProviderArgs {
    #[command(subcommand)]
    command: ProviderSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ProviderSubcommand {
    #[command(about = "List built-in and custom providers")]
    List,
    #[command(about = "Print the current provider")]
    Current,
    #[command(about = "Switch the current provider")]
    Set {
        name: String,
        #[arg(long, help = "Also override the provider's base URL")]
        base_url: Option<String>,
    },
    #[command(about = "Add or replace a custom OpenAI-compatible provider")]
    Add(AddArgs),
    #[command(about = "Remove a custom provider", visible_aliases = ["rm", "delete"])]
    Remove { name: String },
    #[command(about = "Show the effective settings of a provider", visible_alias = "inspect")]
    Show { name: Option<String> },
}

#[derive(Debug, Args, Clone)]
struct AddArgs {
    name: String,
    #[arg(long)]
    base_url: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, help = "API key stored in the config file")]
    api_key: Option<String>,
    #[arg(long, value_name = "VAR", help = "Environment variable holding the API key")]
    api_key_env: Option<String>,
    #[arg(long, help = "Defaults to /models")]
    models_path: Option<String>,
    #[arg(long, help = "Defaults to /chat/completions")]
    chat_path: Option<String>,
    #[arg(long, help = "Defaults to Authorization")]
    auth_header: Option<String>,
    #[arg(long, help = "Defaults to \"Bearer \"")]
    auth_prefix: Option<String>,
    #[arg(long = "header", value_name = "NAME=VALUE", help = "Extra header, repeatable")]
    headers: Vec<String>,
}

pub fn run(args: ProviderArgs, config_path: &Path) -> Result<(), String> {
    let mut cfg = config::load(config_path)?;
    match args.command {
        ProviderSubcommand::List => {
            for name in cfg.provider_names() {
                let marker = if name == cfg.current_provider { '*' } else { ' ' };
                if cfg.is_custom(&name) {
                    println!("{marker} {name} (custom)");
                } else {
                    println!("{marker} {name}");
                }
            }
            Ok(())
        }
        ProviderSubcommand::Current => {
            if cfg.current_provider.is_empty() {
                return Err("No provider selected. Run `ask provider set <name>`.".to_string());
            }
            println!("{}", cfg.current_provider);
            Ok(())
        }
        ProviderSubcommand::Set { name, base_url } => {
            let name = name.trim().to_lowercase();
            if !cfg.provider_exists(&name) {
                return Err(format!(
                    "unsupported provider {name:?} (available: {})",
                    cfg.provider_names().join(", ")
                ));
            }
            cfg.set_current_provider(&name);
            if let Some(base_url) = base_url {
                cfg.set_base_url(&name, &base_url);
            }
            config::save(config_path, &cfg)?;
            println!("Current provider set to {name}.");
            Ok(())
        }
        ProviderSubcommand::Add(add) => {
            let name = add.name.trim().to_lowercase();
            let custom = CustomProviderConfig {
                base_url: add.base_url,
                api_key: add.api_key.unwrap_or_default().trim().to_string(),
                api_key_env: add.api_key_env.unwrap_or_default(),
                model: add.model.unwrap_or_default(),
                models_path: add.models_path.unwrap_or_default(),
                chat_path: add.chat_path.unwrap_or_default(),
                auth_header: add.auth_header.unwrap_or_default(),
                auth_prefix: add.auth_prefix.unwrap_or_default(),
                headers: parse_headers(&add.headers)?,
            };
            cfg.add_custom_provider(&name, custom)?;
            config::save(config_path, &cfg)?;
            if cfg.has_stored_key(&name) {
                println!("Added provider {name}.");
            } else {
                println!("Added provider {name}. Store a key with `ask key set {name}` if it needs one.");
            }
            Ok(())
        }
        ProviderSubcommand::Remove { name } => {
            cfg.remove_custom_provider(&name)?;
            config::save(config_path, &cfg)?;
            println!("Removed provider {}.", name.trim().to_lowercase());
            Ok(())
        }
        ProviderSubcommand::Show { name } => {
            let name = name
                .map(|name| name.trim().to_lowercase())
                .unwrap_or_else(|| cfg.current_provider.clone());
            if name.is_empty() {
                return Err("No provider selected. Pass a provider name.".to_string());
            }
            if !cfg.provider_exists(&name) {
                return Err(format!("unsupported provider {name:?}"));
            }
            let rendered = serde_json::to_string_pretty(&describe(&cfg, &name))
                .map_err(|err| format!("Failed to serialize provider: {err}"))?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn describe(cfg: &Config, name: &str) -> serde_json::Value {
    let key_status = if cfg.resolve_api_key(name).is_empty() {
        "not set"
    } else {
        "configured"
    };
    let mut view = json!({
        "name": name,
        "kind": if cfg.is_custom(name) { "custom" } else { "built-in" },
        "current": cfg.current_provider == name,
        "base_url": cfg.resolve_base_url(name),
        "model": cfg.model_for(name),
        "api_key_env": cfg.api_key_env(name),
        "api_key": key_status,
    });
    if let Some(custom) = cfg.custom_providers.get(name) {
        view["models_path"] = json!(custom.models_path);
        view["chat_path"] = json!(custom.chat_path);
        view["auth_header"] = json!(custom.auth_header);
        view["auth_prefix"] = json!(custom.auth_prefix);
        view["headers"] = json!(custom.headers);
    }
    view
}

/// Parses repeated `NAME=VALUE` header flags.
fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut headers = BTreeMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("invalid header {entry:?}; expected NAME=VALUE"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("invalid header {entry:?}; name is empty"));
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_parsed() {
        let raw = vec!["X-Team = infra".to_string(), "X-Empty=".to_string()];
        let headers = parse_headers(&raw).unwrap();
        assert_eq!(headers["X-Team"], "infra");
        assert_eq!(headers["X-Empty"], "");
        assert!(parse_headers(&["novalue".to_string()]).is_err());
        assert!(parse_headers(&["=x".to_string()]).is_err());
    }

    #[test]
    fn describe_hides_key_value() {
        let mut cfg = Config::default();
        cfg.set_api_key("ollama", "secret-value");
        let view = describe(&cfg, "ollama");
        assert_eq!(view["kind"], "built-in");
        assert_eq!(view["api_key"], "configured");
        assert_eq!(view["base_url"], "http://127.0.0.1:11434");
        assert!(!view.to_string().contains("secret-value"));
    }
}
