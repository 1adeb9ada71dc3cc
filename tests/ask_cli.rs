use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ask_cmd(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ask"));
    cmd.env_remove("ASK_CONFIG")
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .arg("--config")
        .arg(config);
    cmd
}

fn temp_config() -> (TempDir, PathBuf) {
    let dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    };
    let path = dir.path().join("ask").join("config.toml");
    (dir, path)
}

fn parse_stdout_json(output: &[u8]) -> Value {
    let text = String::from_utf8(output.to_vec()).expect("stdout should be utf-8");
    serde_json::from_str(text.trim()).expect("stdout should contain valid JSON")
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": content}}]
    }))
}

fn add_lab_provider(config: &Path, server: &MockServer, model: Option<&str>) {
    let base_url = format!("{}/v1", server.uri());
    let mut cmd = ask_cmd(config);
    cmd.args(["provider", "add", "lab", "--base-url", &base_url]);
    if let Some(model) = model {
        cmd.args(["--model", model]);
    }
    cmd.assert().success().stdout(contains("Added provider lab"));
    ask_cmd(config)
        .args(["provider", "set", "lab"])
        .assert()
        .success();
}

#[test]
fn version_includes_build_metadata() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("commit:").and(contains("built:")));
}

#[test]
fn completion_scripts_are_generated() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("_ask"));
    ask_cmd(&config)
        .args(["completion", "zsh"])
        .assert()
        .success()
        .stdout(contains("#compdef ask"));
    ask_cmd(&config)
        .args(["completion", "fish"])
        .assert()
        .success()
        .stdout(contains("complete -c ask"));
}

#[test]
fn config_path_honors_flag_and_env() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(contains(config.display().to_string()));

    let env_path = config.with_file_name("from-env.toml");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ask"));
    cmd.env("ASK_CONFIG", &env_path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(contains(env_path.display().to_string()));
}

#[test]
fn missing_question_fails() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .assert()
        .failure()
        .stderr(contains("error: Missing question"));
}

#[test]
fn ask_without_provider_fails() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["what", "time", "is", "it"])
        .assert()
        .failure()
        .stderr(contains("No provider selected"));
}

#[test]
fn unknown_provider_is_rejected() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["-p", "mistral", "hello"])
        .assert()
        .failure()
        .stderr(contains("unsupported provider \"mistral\""));
    ask_cmd(&config)
        .args(["provider", "set", "mistral"])
        .assert()
        .failure()
        .stderr(contains("unsupported provider"));
}

#[test]
fn provider_list_marks_current_and_custom() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["provider", "list"])
        .assert()
        .success()
        .stdout(contains("  anthropic\n").and(contains("  openrouter\n")));

    ask_cmd(&config)
        .args([
            "provider",
            "add",
            "Lab",
            "--base-url",
            "http://127.0.0.1:9/v1/",
            "--header",
            "X-Team=infra",
        ])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["provider", "set", "lab"])
        .assert()
        .success()
        .stdout(contains("Current provider set to lab."));

    ask_cmd(&config)
        .args(["provider", "list"])
        .assert()
        .success()
        .stdout(contains("* lab (custom)"));
    ask_cmd(&config)
        .args(["provider", "current"])
        .assert()
        .success()
        .stdout(contains("lab"));

    let assert = ask_cmd(&config)
        .args(["provider", "show"])
        .assert()
        .success();
    let view = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(view["kind"], "custom");
    assert_eq!(view["base_url"], "http://127.0.0.1:9/v1");
    assert_eq!(view["chat_path"], "/chat/completions");
    assert_eq!(view["headers"]["X-Team"], "infra");
}

#[test]
fn builtin_providers_cannot_be_replaced_or_removed() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["provider", "add", "openai", "--base-url", "http://x"])
        .assert()
        .failure()
        .stderr(contains("built-in provider"));
    ask_cmd(&config)
        .args(["provider", "remove", "openai"])
        .assert()
        .failure()
        .stderr(contains("cannot remove built-in provider"));
}

#[test]
fn removing_current_custom_provider_clears_selection() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["provider", "add", "lab", "--base-url", "http://127.0.0.1:9"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["provider", "set", "lab"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["provider", "remove", "lab"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["provider", "current"])
        .assert()
        .failure()
        .stderr(contains("No provider selected"));
}

#[test]
fn key_show_masks_stored_value() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["key", "show", "openai"])
        .assert()
        .success()
        .stdout(contains("openai: not set"));

    ask_cmd(&config)
        .args(["key", "set", "openai", "--value", "sk-test-abcdef1234"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["key", "show", "openai"])
        .assert()
        .success()
        .stdout(
            contains("**************1234 (stored in config)").and(contains("sk-test").not()),
        );

    let raw = fs::read_to_string(&config).unwrap();
    assert!(raw.contains("sk-test-abcdef1234"));

    ask_cmd(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("1234").and(contains("sk-test").not()));

    ask_cmd(&config)
        .args(["key", "clear", "openai"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["key", "show", "openai"])
        .assert()
        .success()
        .stdout(contains("openai: not set"));
}

#[test]
fn key_from_environment_is_reported() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .env("ANTHROPIC_API_KEY", "sk-ant-from-env-9876")
        .args(["key", "show", "anthropic"])
        .assert()
        .success()
        .stdout(contains("9876 (from $ANTHROPIC_API_KEY)"));
}

#[test]
fn markdown_toggle_persists() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["markdown", "status"])
        .assert()
        .success()
        .stdout(contains("Markdown rendering: on"));
    ask_cmd(&config)
        .args(["markdown", "off"])
        .assert()
        .success()
        .stdout(contains("Markdown rendering: off"));
    ask_cmd(&config)
        .args(["markdown", "status"])
        .assert()
        .success()
        .stdout(contains("Markdown rendering: off"));

    let raw = fs::read_to_string(&config).unwrap();
    assert!(raw.contains("render_markdown = false"));
}

#[test]
fn models_set_and_current() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["models", "current", "-p", "openai"])
        .assert()
        .success()
        .stdout(contains("gpt-5-nano"));
    ask_cmd(&config)
        .args(["models", "set", "gpt-4o-mini", "--provider", "openai"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["models", "current", "--provider", "openai"])
        .assert()
        .success()
        .stdout(contains("gpt-4o-mini"));
}

#[tokio::test(flavor = "multi_thread")]
async fn json_ask_against_custom_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply(r#"{"answer":"Load is low.","command":"uptime"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let (_dir, config) = temp_config();
    add_lab_provider(&config, &server, Some("lab-small"));

    let assert = ask_cmd(&config)
        .args(["--json", "how", "busy", "is", "this", "machine"])
        .assert()
        .success();
    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["provider"], "lab");
    assert_eq!(body["model"], "lab-small");
    assert_eq!(body["question"], "how busy is this machine");
    assert_eq!(body["answer"], "Load is low.");
    assert_eq!(body["command"], "uptime");

    ask_cmd(&config)
        .args(["--no-run", "--no-markdown", "how busy?"])
        .assert()
        .success()
        .stdout(contains("Load is low.").and(contains("$ uptime")));
}

#[tokio::test(flavor = "multi_thread")]
async fn question_is_read_from_stdin_and_model_is_auto_selected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "large-model"}, {"id": "tiny-mini"}, {"id": "medium"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("Try this:\n```bash\n$ df -h\n```"))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, config) = temp_config();
    add_lab_provider(&config, &server, None);

    let assert = ask_cmd(&config)
        .arg("--json")
        .write_stdin("how much disk is free?\n")
        .assert()
        .success()
        .stderr(contains("Using model tiny-mini for lab.").and(contains("warning:")));
    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["question"], "how much disk is free?");
    assert_eq!(body["model"], "tiny-mini");
    assert_eq!(body["command"], "df -h");

    ask_cmd(&config)
        .args(["models", "current"])
        .assert()
        .success()
        .stdout(contains("tiny-mini"));
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_errors_exit_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let (_dir, config) = temp_config();
    add_lab_provider(&config, &server, Some("m"));

    ask_cmd(&config)
        .args(["--json", "hello"])
        .assert()
        .failure()
        .stderr(contains("provider returned 503").and(contains("upstream down")));
}

#[tokio::test(flavor = "multi_thread")]
async fn models_list_filters_and_marks_current() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "alpha-mini"}, {"id": "beta"}, {"id": "alpha-large"}]
        })))
        .mount(&server)
        .await;

    let (_dir, config) = temp_config();
    add_lab_provider(&config, &server, Some("alpha-mini"));

    ask_cmd(&config)
        .args(["models", "list", "--search", "ALPHA"])
        .assert()
        .success()
        .stdout(
            contains("  alpha-large\n")
                .and(contains("* alpha-mini\n"))
                .and(contains("beta").not()),
        );
}

#[test]
fn key_set_reads_piped_value() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["key", "set", "gemini"])
        .write_stdin("AIza-piped-secret-7788\n")
        .assert()
        .success();
    ask_cmd(&config)
        .args(["key", "show", "gemini"])
        .assert()
        .success()
        .stdout(contains("7788 (stored in config)").and(contains("piped").not()));
}

#[test]
fn provider_add_accepts_api_key() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args([
            "provider",
            "add",
            "lab",
            "--base-url",
            "http://127.0.0.1:9/v1",
            "--api-key",
            "sk-lab-12345678",
        ])
        .assert()
        .success()
        .stdout(contains("ask key set").not());
    ask_cmd(&config)
        .args(["key", "show", "lab"])
        .assert()
        .success()
        .stdout(contains("lab: ***********5678 (stored in config)"));
}

#[test]
fn command_aliases_are_accepted() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["providers", "add", "lab", "--base-url", "http://127.0.0.1:9"])
        .assert()
        .success();
    ask_cmd(&config)
        .args(["providers", "inspect", "lab"])
        .assert()
        .success()
        .stdout(contains("\"kind\": \"custom\""));
    ask_cmd(&config)
        .args(["providers", "rm", "lab"])
        .assert()
        .success()
        .stdout(contains("Removed provider lab."));
    ask_cmd(&config)
        .args(["keys", "show", "openai"])
        .assert()
        .success()
        .stdout(contains("openai: not set"));
    ask_cmd(&config)
        .args(["model", "current", "-p", "openai"])
        .assert()
        .success()
        .stdout(contains("gpt-5-nano"));
    ask_cmd(&config)
        .args(["markdown", "disable"])
        .assert()
        .success()
        .stdout(contains("Markdown rendering: off"));
    ask_cmd(&config)
        .args(["markdown", "enable"])
        .assert()
        .success()
        .stdout(contains("Markdown rendering: on"));
}

#[test]
fn provider_set_can_override_base_url() {
    let (_dir, config) = temp_config();
    ask_cmd(&config)
        .args(["provider", "set", "ollama", "--base-url", "http://gpu-box:11434/"])
        .assert()
        .success();
    let assert = ask_cmd(&config)
        .args(["provider", "show"])
        .assert()
        .success();
    let view = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(view["name"], "ollama");
    assert_eq!(view["base_url"], "http://gpu-box:11434");
}
