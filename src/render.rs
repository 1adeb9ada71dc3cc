//! Terminal rendering of markdown answers.

use owo_colors::OwoColorize;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

const FALLBACK_WIDTH: usize = 100;
const MIN_WIDTH: usize = 20;
const CODE_INDENT: &str = "    ";

#[derive(Debug, Default)]
struct Style {
    strong: usize,
    emphasis: usize,
    heading: bool,
    code_block: bool,
}

impl Style {
    fn paint(&self, text: &str) -> String {
        let mut painted = text.to_string();
        if self.emphasis > 0 {
            painted = painted.italic().to_string();
        }
        if self.strong > 0 || self.heading {
            painted = painted.bold().to_string();
        }
        painted
    }
}

/// Renders `text` for the terminal, wrapped to its width. When disabled, or
/// when there is nothing to render, the trimmed input is returned unchanged.
pub fn markdown(text: &str, enabled: bool) -> String {
    markdown_with_width(text, enabled, terminal_width())
}

/// Current terminal width in columns, or 100 when it cannot be determined.
pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .ok()
        .map(|(columns, _)| usize::from(columns))
        .filter(|columns| *columns > 0)
        .unwrap_or(FALLBACK_WIDTH)
}

/// Like [`markdown`] with an explicit wrap width.
pub fn markdown_with_width(text: &str, enabled: bool, width: usize) -> String {
    let clean = text.trim();
    if clean.is_empty() || !enabled {
        return clean.to_string();
    }

    let mut out = String::new();
    let mut style = Style::default();
    // One entry per open list: the next number for ordered lists.
    let mut lists: Vec<Option<u64>> = Vec::new();

    for event in Parser::new_ext(clean, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                start_block(&mut out);
                style.heading = true;
            }
            Event::End(TagEnd::Heading(_)) => {
                style.heading = false;
                out.push('\n');
            }
            Event::Start(Tag::Paragraph) if lists.is_empty() => start_block(&mut out),
            Event::End(TagEnd::Paragraph) if lists.is_empty() => out.push('\n'),
            Event::Start(Tag::List(first)) => {
                if lists.is_empty() {
                    start_block(&mut out);
                }
                lists.push(first);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                ensure_newline(&mut out);
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(number)) => {
                        out.push_str(&format!("{number}. "));
                        *number += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::End(TagEnd::Item) => ensure_newline(&mut out),
            Event::Start(Tag::Strong) => style.strong += 1,
            Event::End(TagEnd::Strong) => style.strong = style.strong.saturating_sub(1),
            Event::Start(Tag::Emphasis) => style.emphasis += 1,
            Event::End(TagEnd::Emphasis) => style.emphasis = style.emphasis.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => {
                start_block(&mut out);
                style.code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => style.code_block = false,
            Event::Text(text) if style.code_block => {
                for line in text.lines() {
                    out.push_str(&format!("{CODE_INDENT}{}\n", line.cyan()));
                }
            }
            Event::Text(text) => out.push_str(&style.paint(&text)),
            Event::Code(code) => out.push_str(&code.cyan().to_string()),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => {
                start_block(&mut out);
                out.push_str(&"─".repeat(24).dimmed().to_string());
                out.push('\n');
            }
            _ => {}
        }
    }

    wrap(out.trim_end(), width.max(MIN_WIDTH))
}

/// Wraps rendered lines to `width`. Code block lines are left alone and list
/// continuations hang under the item text.
fn wrap(rendered: &str, width: usize) -> String {
    let mut lines = Vec::new();
    for line in rendered.lines() {
        let (prefix, body) = split_item_prefix(line);
        let code_line = line.starts_with(CODE_INDENT) && prefix.trim().is_empty();
        if code_line || textwrap::core::display_width(line) <= width {
            lines.push(line.to_string());
            continue;
        }
        let hanging = " ".repeat(textwrap::core::display_width(prefix));
        let options = textwrap::Options::new(width)
            .initial_indent(prefix)
            .subsequent_indent(&hanging);
        lines.extend(
            textwrap::wrap(body, &options)
                .into_iter()
                .map(|part| part.into_owned()),
        );
    }
    lines.join("\n")
}

/// Splits leading indentation and a `• ` or `N. ` list marker off `line`.
fn split_item_prefix(line: &str) -> (&str, &str) {
    let indent = line.len() - line.trim_start_matches(' ').len();
    let rest = &line[indent..];
    let marker = if rest.starts_with("• ") {
        "• ".len()
    } else {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && rest[digits..].starts_with(". ") {
            digits + 2
        } else {
            0
        }
    };
    line.split_at(indent + marker)
}

fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn start_block(out: &mut String) {
    if out.is_empty() {
        return;
    }
    ensure_newline(out);
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}
