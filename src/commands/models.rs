use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::commands::resolve_provider;
use crate::config;
use crate::providers::Model;

const LIST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Args, Clone)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: Option<ModelsSubcommand>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 'p', long, help = "Provider to query instead of the current one")]
    provider: Option<String>,
    #[arg(short = 's', long, help = "Case-insensitive filter on model id or name")]
    search: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
enum ModelsSubcommand {
    #[command(about = "List models offered by a provider (default)")]
    List(ListArgs),
    #[command(about = "Print the configured model")]
    Current {
        #[arg(short = 'p', long)]
        provider: Option<String>,
    },
    #[command(about = "Set the model for a provider")]
    Set {
        model: String,
        #[arg(short = 'p', long)]
        provider: Option<String>,
    },
    #[command(about = "Pick a model interactively")]
    Select {
        #[arg(short = 'p', long)]
        provider: Option<String>,
    },
}

pub async fn run(args: ModelsArgs, config_path: &Path) -> Result<(), String> {
    match args.command.unwrap_or(ModelsSubcommand::List(ListArgs::default())) {
        ModelsSubcommand::List(list) => {
            let cfg = config::load(config_path)?;
            let provider = resolve_provider(list.provider.as_deref(), &cfg)?;
            let models = fetch_models(&cfg, &provider).await?;
            let query = list.search.unwrap_or_default();
            let shown = filter_models(&models, &query);
            if shown.is_empty() {
                println!("No models found for {provider}.");
                return Ok(());
            }
            print!("{}", format_table(&shown, &cfg.model_for(&provider)));
            Ok(())
        }
        ModelsSubcommand::Current { provider } => {
            let cfg = config::load(config_path)?;
            let provider = resolve_provider(provider.as_deref(), &cfg)?;
            let model = cfg.model_for(&provider);
            if model.is_empty() {
                return Err(format!("No model configured for {provider}."));
            }
            println!("{model}");
            Ok(())
        }
        ModelsSubcommand::Set { model, provider } => {
            let mut cfg = config::load(config_path)?;
            let provider = resolve_provider(provider.as_deref(), &cfg)?;
            let model = model.trim();
            if model.is_empty() {
                return Err("model is required".to_string());
            }
            cfg.set_model(&provider, model);
            config::save(config_path, &cfg)?;
            println!("Model for {provider} set to {model}.");
            Ok(())
        }
        ModelsSubcommand::Select { provider } => {
            let mut cfg = config::load(config_path)?;
            let provider = resolve_provider(provider.as_deref(), &cfg)?;
            let models = fetch_models(&cfg, &provider).await?;
            if models.is_empty() {
                return Err(format!("{provider} returned no models."));
            }
            let stdin = io::stdin();
            let picked = pick_model(
                &models,
                &cfg.model_for(&provider),
                &mut stdin.lock(),
                &mut io::stdout(),
            )?;
            match picked {
                Some(model) => {
                    cfg.set_model(&provider, &model);
                    config::save(config_path, &cfg)?;
                    println!("Model for {provider} set to {model}.");
                }
                None => println!("Selection cancelled."),
            }
            Ok(())
        }
    }
}

async fn fetch_models(cfg: &config::Config, provider: &str) -> Result<Vec<Model>, String> {
    let client = cfg.client_for(provider)?;
    tokio::time::timeout(LIST_TIMEOUT, client.list_models())
        .await
        .map_err(|_| format!("listing {provider} models timed out"))?
        .map_err(|err| err.to_string())
}

/// Models whose id or display name contains `query`, ignoring case.
pub fn filter_models<'a>(models: &'a [Model], query: &str) -> Vec<&'a Model> {
    let query = query.trim().to_lowercase();
    models
        .iter()
        .filter(|model| {
            query.is_empty()
                || model.id.to_lowercase().contains(&query)
                || model.display_name.to_lowercase().contains(&query)
        })
        .collect()
}

fn format_table(models: &[&Model], current: &str) -> String {
    let width = models.iter().map(|model| model.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for model in models {
        let marker = if model.id == current { '*' } else { ' ' };
        if model.display_name == model.id {
            out.push_str(&format!("{marker} {}\n", model.id));
        } else {
            out.push_str(&format!(
                "{marker} {:<width$}  {}\n",
                model.id, model.display_name
            ));
        }
    }
    out
}

/// Numbered picker: a number selects, `/text` filters, `q` or EOF cancels.
fn pick_model<R: BufRead, W: Write>(
    models: &[Model],
    current: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>, String> {
    let mut shown = filter_models(models, "");
    loop {
        write!(output, "{}", numbered(&shown, current)).map_err(|err| err.to_string())?;
        write!(output, "Select a model [number, /search, q]: ").map_err(|err| err.to_string())?;
        output.flush().map_err(|err| err.to_string())?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|err| format!("Failed to read selection: {err}"))?;
        let choice = line.trim();
        if read == 0 || choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        if let Some(query) = choice.strip_prefix('/') {
            let filtered = filter_models(models, query);
            if filtered.is_empty() {
                writeln!(output, "No models match {query:?}.").map_err(|err| err.to_string())?;
            } else {
                shown = filtered;
            }
            continue;
        }
        match choice.parse::<usize>() {
            Ok(index) if (1..=shown.len()).contains(&index) => {
                return Ok(Some(shown[index - 1].id.clone()));
            }
            _ => writeln!(output, "Invalid selection {choice:?}.").map_err(|err| err.to_string())?,
        }
    }
}

fn numbered(models: &[&Model], current: &str) -> String {
    let mut out = String::new();
    for (index, model) in models.iter().enumerate() {
        let marker = if model.id == current { '*' } else { ' ' };
        out.push_str(&format!("{marker}{:>3}. {}\n", index + 1, model.id));
    }
    out
}
