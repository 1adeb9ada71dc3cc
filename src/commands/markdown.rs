use std::path::Path;

use clap::{Args, Subcommand};

use crate::config;

#[derive(Debug, Args, Clone)]
pub struct MarkdownArgs {
    #[command(subcommand)]
    command: MarkdownSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum MarkdownSubcommand {
    #[command(about = "Render answers as markdown", visible_alias = "enable")]
    On,
    #[command(about = "Print answers as plain text", visible_alias = "disable")]
    Off,
    #[command(about = "Show whether markdown rendering is enabled")]
    Status,
}

pub fn run(args: MarkdownArgs, config_path: &Path) -> Result<(), String> {
    let mut cfg = config::load(config_path)?;
    let enabled = match args.command {
        MarkdownSubcommand::Status => cfg.render_markdown,
        MarkdownSubcommand::On | MarkdownSubcommand::Off => {
            cfg.render_markdown = matches!(args.command, MarkdownSubcommand::On);
            config::save(config_path, &cfg)?;
            cfg.render_markdown
        }
    };
    println!("Markdown rendering: {}", if enabled { "on" } else { "off" });
    Ok(())
}
