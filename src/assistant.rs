//! System prompt construction and parsing of the `{answer, command}` reply.

use serde::{Deserialize, Serialize};

/// Normalized assistant payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub command: String,
}

impl Response {
    pub fn has_command(&self) -> bool {
        !self.command.trim().is_empty()
    }

    fn normalized(mut self) -> Self {
        self.answer = self.answer.trim().to_string();
        self.command = self.command.trim().to_string();
        self
    }
}

/// Decodes model output as a raw JSON object, or as the first balanced JSON
/// object embedded in surrounding text.
pub fn parse(text: &str) -> Result<Response, String> {
    let candidate = text.trim();
    if candidate.is_empty() {
        return Err("empty model response".to_string());
    }

    if let Ok(parsed) = serde_json::from_str::<Response>(candidate) {
        return Ok(parsed.normalized());
    }

    let fragment =
        first_json_object(candidate).ok_or_else(|| "model response is not valid JSON".to_string())?;
    serde_json::from_str::<Response>(fragment)
        .map(Response::normalized)
        .map_err(|err| format!("decode model JSON response: {err}"))
}

/// Builds a best-effort response from non-JSON model output: the whole text is
/// the answer and the command comes from a code block or a `$ ` line.
pub fn fallback(text: &str) -> Response {
    let text = text.trim();
    Response {
        answer: text.to_string(),
        command: command_from_text(text).unwrap_or_default(),
    }
}

fn command_from_text(text: &str) -> Option<String> {
    let Some(start) = text.find("```") else {
        return text
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("$ "))
            .map(|command| command.trim().to_string());
    };

    let rest = &text[start + 3..];
    let end = rest.find("```")?;
    let mut lines = rest[..end].trim().lines().peekable();
    if lines
        .peek()
        .is_some_and(|first| ["bash", "sh", "zsh"].iter().any(|lang| first.starts_with(lang)))
    {
        lines.next();
    }
    lines
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("$ ").unwrap_or(line).to_string())
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Returns the system prompt sent with every question.
pub fn build_prompt(shell: &str, cwd: &str, os: &str, allow_markdown: bool) -> String {
    let format_instruction = if allow_markdown {
        "In the answer field, use clean Markdown by default (short headings, concise bullet lists, and inline code where helpful). \
         Keep formatting readable and minimal. Do not use markdown code fences. "
    } else {
        "In the answer field, use plain text only (no markdown formatting, headings, bullet markers, or code fences). "
    };

    format!(
        "You are a terminal assistant. Return only strict JSON with exactly these keys: answer, command. \
         If the user asks for a terminal command, set command to one runnable command and include concise explanation in answer unless specified otherwise. \
         If no command is needed, set command to an empty string. \
         {format_instruction}Do not include any text outside JSON.\n\
         Environment: os={os}, shell={shell}, cwd={cwd}"
    )
}
