//! Confirmation and execution of suggested shell commands.

use std::env;
use std::io::{BufRead, Write};
use std::process::Command;

use owo_colors::OwoColorize;

/// What the user chose to do with a suggested command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run(String),
    Copy(String),
    Cancel,
}

/// Reads the user's decision for `command` from `input`.
///
/// Enter or `y` runs the command as shown, `e` reads a replacement line,
/// `c` copies it, anything else cancels.
pub fn decide<R: BufRead, W: Write>(
    command: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Decision, String> {
    let command = command.trim();
    if command.is_empty() {
        return Ok(Decision::Cancel);
    }

    writeln!(output, "\n{} {}", "$".green().bold(), command).map_err(|err| err.to_string())?;
    let answer = prompt_line(input, output, "Run it? [Y/n/e(dit)/c(opy)] ")?;
    match answer.to_lowercase().as_str() {
        "" | "y" | "yes" => Ok(Decision::Run(command.to_string())),
        "e" | "edit" => {
            let edited = prompt_line(input, output, "$ ")?;
            if edited.is_empty() {
                Ok(Decision::Run(command.to_string()))
            } else {
                Ok(Decision::Run(edited))
            }
        }
        "c" | "copy" => Ok(Decision::Copy(command.to_string())),
        _ => Ok(Decision::Cancel),
    }
}

fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<String, String> {
    write!(output, "{prompt}").map_err(|err| err.to_string())?;
    output.flush().map_err(|err| err.to_string())?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| format!("Failed to read command input: {err}"))?;
    Ok(line.trim().to_string())
}

/// Prompts for a decision on `command` and carries it out.
pub fn confirm_and_run<R: BufRead, W: Write>(
    command: &str,
    input: &mut R,
    output: &mut W,
) -> Result<(), String> {
    match decide(command, input, output)? {
        Decision::Run(command) => run(&command),
        Decision::Copy(command) => {
            copy_to_clipboard(&command)
                .map_err(|err| format!("Failed to copy command to clipboard: {err}"))?;
            writeln!(output, "Command copied to clipboard.").map_err(|err| err.to_string())
        }
        Decision::Cancel => writeln!(output, "Command cancelled.").map_err(|err| err.to_string()),
    }
}

/// Runs `command` through `$SHELL -lc`, inheriting stdio.
pub fn run(command: &str) -> Result<(), String> {
    let shell = env::var("SHELL")
        .ok()
        .map(|shell| shell.trim().to_string())
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "sh".to_string());
    tracing::debug!(%shell, %command, "running command");

    let status = Command::new(&shell)
        .arg("-lc")
        .arg(command)
        .status()
        .map_err(|err| format!("Failed to start {shell}: {err}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("command exited with {status}"))
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|err| err.to_string())?;
    clipboard
        .set_text(text.to_string())
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decide_with(input: &str) -> Decision {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        decide("ls -la", &mut input, &mut output).unwrap()
    }

    #[test]
    fn enter_runs_the_suggested_command() {
        assert_eq!(decide_with("\n"), Decision::Run("ls -la".to_string()));
        assert_eq!(decide_with("Y\n"), Decision::Run("ls -la".to_string()));
        // EOF counts as an empty answer.
        assert_eq!(decide_with(""), Decision::Run("ls -la".to_string()));
    }

    #[test]
    fn edit_replaces_the_command() {
        assert_eq!(
            decide_with("e\nls -lah /tmp\n"),
            Decision::Run("ls -lah /tmp".to_string())
        );
        assert_eq!(decide_with("e\n\n"), Decision::Run("ls -la".to_string()));
    }

    #[test]
    fn other_answers_copy_or_cancel() {
        assert_eq!(decide_with("c\n"), Decision::Copy("ls -la".to_string()));
        assert_eq!(decide_with("n\n"), Decision::Cancel);
    }

    #[test]
    fn prompt_shows_the_command() {
        let mut input = Cursor::new(b"n\n".to_vec());
        let mut output = Vec::new();
        decide("git status", &mut input, &mut output).unwrap();
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("git status"));
        assert!(shown.contains("Run it?"));
    }

    #[cfg(unix)]
    #[test]
    fn run_reports_failure_status() {
        assert!(run("true").is_ok());
        assert!(run("exit 3").is_err());
    }
}
