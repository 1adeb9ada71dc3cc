use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::key::mask_for_show;
use crate::config::{self, Config};

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    #[command(about = "Print the config file path")]
    Path,
    #[command(about = "Print the effective config with keys masked")]
    Show,
}

pub fn run(args: ConfigArgs, config_path: &Path) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Path => {
            println!("{}", config_path.display());
            Ok(())
        }
        ConfigSubcommand::Show => {
            let cfg = masked(config::load(config_path)?);
            let rendered = toml::to_string_pretty(&cfg)
                .map_err(|err| format!("Failed to encode config: {err}"))?;
            print!("{rendered}");
            Ok(())
        }
    }
}

fn masked(mut cfg: Config) -> Config {
    for provider in cfg.providers.values_mut() {
        if !provider.api_key.is_empty() {
            provider.api_key = mask_for_show(&provider.api_key);
        }
    }
    for custom in cfg.custom_providers.values_mut() {
        if !custom.api_key.is_empty() {
            custom.api_key = mask_for_show(&custom.api_key);
        }
    }
    cfg
}
