use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use crate::assistant;
use crate::commands::resolve_provider;
use crate::config::{self, Config};
use crate::providers::{AskRequest, Client, Model};
use crate::render;
use crate::runner;

/// Substrings preferred, in order, when picking a model automatically.
const PREFERRED_MODEL_HINTS: [&str; 5] = ["mini", "flash", "haiku", "small", "8b"];

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    #[arg(short = 'p', long, help = "Provider to use instead of the current one")]
    pub provider: Option<String>,
    #[arg(short = 'm', long, help = "Model to use instead of the configured one")]
    pub model: Option<String>,
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 90,
        help = "Request timeout in seconds"
    )]
    pub timeout: u64,
    #[arg(long, help = "Print the answer as plain text")]
    pub no_markdown: bool,
    #[arg(long, help = "Print the suggested command instead of offering to run it")]
    pub no_run: bool,
    #[arg(long, help = "Print provider, model, question, answer and command as JSON")]
    pub json: bool,
    #[arg(
        value_name = "QUESTION",
        num_args = 1..,
        trailing_var_arg = true,
        help = "Question text; read from stdin when omitted"
    )]
    pub question: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    provider: &'a str,
    model: &'a str,
    question: &'a str,
    answer: &'a str,
    command: &'a str,
}

pub async fn run(args: AskArgs, config_path: &Path) -> Result<(), String> {
    let question = resolve_question(&args.question)?;
    let mut cfg = config::load(config_path)?;
    let provider = resolve_provider(args.provider.as_deref(), &cfg)?;
    let client = cfg.client_for(&provider)?;
    let timeout = Duration::from_secs(args.timeout.max(1));

    let model = match args
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
    {
        Some(model) => model.to_string(),
        None => resolve_model(&mut cfg, config_path, &provider, client.as_ref(), timeout).await?,
    };

    let allow_markdown = cfg.render_markdown && !args.no_markdown && !args.json;
    let request = AskRequest {
        model: model.clone(),
        prompt: assistant::build_prompt(&current_shell(), &current_dir(), env::consts::OS, allow_markdown),
        question: question.clone(),
        expect_json: true,
    };

    tracing::debug!(%provider, %model, "sending question");
    let reply = tokio::time::timeout(timeout, client.ask(&request))
        .await
        .map_err(|_| format!("{provider} request timed out after {}s", timeout.as_secs()))?
        .map_err(|err| err.to_string())?;

    let response = match assistant::parse(&reply.text) {
        Ok(response) => response,
        Err(err) => {
            eprintln!("warning: {err}; showing the raw response");
            assistant::fallback(&reply.text)
        }
    };

    if args.json {
        let output = JsonOutput {
            provider: &provider,
            model: &model,
            question: &question,
            answer: &response.answer,
            command: &response.command,
        };
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|err| format!("Failed to serialize output JSON: {err}"))?;
        println!("{rendered}");
        return Ok(());
    }

    let answer = render::markdown(&response.answer, allow_markdown);
    if !answer.is_empty() {
        println!("{answer}");
    }
    if !response.has_command() {
        return Ok(());
    }

    // Piped stdin cannot answer the confirmation prompt.
    if args.no_run || !io::stdin().is_terminal() {
        println!("\n$ {}", response.command);
        return Ok(());
    }
    let stdin = io::stdin();
    runner::confirm_and_run(&response.command, &mut stdin.lock(), &mut io::stdout())
}

fn resolve_question(words: &[String]) -> Result<String, String> {
    let mut question = words.join(" ").trim().to_string();
    if question.is_empty() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| format!("Failed to read question from stdin: {err}"))?;
        question = buffer.trim().to_string();
    }
    if question.is_empty() {
        return Err("Missing question. Pass it as arguments or via stdin.".to_string());
    }
    Ok(question)
}

/// Configured model for `provider`, or an auto-selected one that is then saved.
async fn resolve_model(
    cfg: &mut Config,
    config_path: &Path,
    provider: &str,
    client: &dyn Client,
    timeout: Duration,
) -> Result<String, String> {
    let configured = cfg.model_for(provider);
    if !configured.is_empty() {
        return Ok(configured);
    }

    let models = tokio::time::timeout(timeout, client.list_models())
        .await
        .map_err(|_| format!("listing {provider} models timed out after {}s", timeout.as_secs()))?
        .map_err(|err| format!("No model configured for {provider} and listing models failed: {err}"))?;
    let model = select_default_model(&models)
        .ok_or_else(|| format!("{provider} returned no models; set one with `ask models set`"))?;

    cfg.set_model(provider, &model);
    config::save(config_path, cfg)?;
    eprintln!("Using model {model} for {provider}.");
    Ok(model)
}

/// Picks the first model matching the preference hints, else the first model.
pub fn select_default_model(models: &[Model]) -> Option<String> {
    PREFERRED_MODEL_HINTS
        .iter()
        .find_map(|hint| {
            models
                .iter()
                .find(|model| model.id.to_lowercase().contains(hint))
        })
        .or_else(|| models.first())
        .map(|model| model.id.clone())
}

fn current_shell() -> String {
    env::var("SHELL")
        .ok()
        .and_then(|shell| {
            Path::new(shell.trim())
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "sh".to_string())
}

fn current_dir() -> String {
    env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(ids: &[&str]) -> Vec<Model> {
        ids.iter()
            .map(|id| Model {
                id: id.to_string(),
                display_name: id.to_string(),
            })
            .collect()
    }

    #[test]
    fn auto_select_follows_hint_order() {
        let list = models(&["claude-3-5-haiku", "gpt-4o", "gpt-4o-mini"]);
        assert_eq!(select_default_model(&list).as_deref(), Some("gpt-4o-mini"));

        let list = models(&["claude-3-5-haiku", "claude-sonnet-4", "llama-flash-8b"]);
        assert_eq!(
            select_default_model(&list).as_deref(),
            Some("llama-flash-8b")
        );
    }

    #[test]
    fn hints_match_any_substring_of_the_id() {
        // "gemini" contains "mini", which outranks "flash".
        let list = models(&["gemini-1.5-pro", "gemini-2.0-flash"]);
        assert_eq!(
            select_default_model(&list).as_deref(),
            Some("gemini-1.5-pro")
        );
    }

    #[test]
    fn auto_select_falls_back_to_first() {
        let list = models(&["llama3:70b", "qwen2.5:14b"]);
        assert_eq!(select_default_model(&list).as_deref(), Some("llama3:70b"));
        assert_eq!(select_default_model(&[]), None);
    }
}
