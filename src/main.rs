use std::io;
use std::path::PathBuf;
use std::process;

use ask::commands::ask::AskArgs;
use ask::commands::config::ConfigArgs;
use ask::commands::key::KeyArgs;
use ask::commands::markdown::MarkdownArgs;
use ask::commands::models::ModelsArgs;
use ask::commands::provider::ProviderArgs;
use ask::commands::{ask as ask_cmd, config, key, markdown, models, provider};
use ask::{config as settings, logging};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("ASK_GIT_SHA"),
    "\nbuilt: ",
    env!("ASK_BUILD_TS"),
    "\ntarget: ",
    env!("ASK_TARGET")
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  ask how do I find large files in this directory\n  git diff | ask -p anthropic summarize this change\n  ask --no-run --json list listening tcp ports\n  ask provider set gemini\n  ask models select\n  ask completion zsh > ~/.zfunc/_ask";

#[derive(Debug, Parser)]
#[command(
    name = "ask",
    about = "Ask an LLM from the terminal and run the command it suggests",
    version,
    long_version = LONG_VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file to use")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log provider requests to stderr")]
    verbose: bool,
    #[arg(short, long, global = true, help = "Only log errors")]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    ask: AskArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List, show and pick models", visible_alias = "model")]
    Models(ModelsArgs),
    #[command(about = "Manage providers", visible_alias = "providers")]
    Provider(ProviderArgs),
    #[command(about = "Manage API keys", visible_alias = "keys")]
    Key(KeyArgs),
    #[command(about = "Inspect local config")]
    Config(ConfigArgs),
    #[command(about = "Toggle markdown rendering of answers")]
    Markdown(MarkdownArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "ask", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "ask", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "ask", &mut io::stdout()),
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    if let Some(Commands::Completion { shell }) = cli.command {
        print_completion(shell);
        return Ok(());
    }

    let config_path = settings::config_path(cli.config.as_deref())?;
    match cli.command {
        None => ask_cmd::run(cli.ask, &config_path).await,
        Some(Commands::Models(args)) => models::run(args, &config_path).await,
        Some(Commands::Provider(args)) => provider::run(args, &config_path),
        Some(Commands::Key(args)) => key::run(args, &config_path),
        Some(Commands::Config(args)) => config::run(args, &config_path),
        Some(Commands::Markdown(args)) => markdown::run(args, &config_path),
        Some(Commands::Completion { .. }) => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
