//! Terminal rendering of Markdown summaries.

use crate::storage::Theme;
use colored::{ColoredString, Colorize};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref STRONG: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref BULLET: Regex = Regex::new(r"^(\s*)[-*]\s+(.*)$").unwrap();
}

fn heading(text: &str, level: usize, theme: Theme) -> ColoredString {
    match (level, theme) {
        (1, Theme::Dark) => text.bright_cyan().bold(),
        (1, Theme::Light) => text.blue().bold(),
        (_, Theme::Dark) => text.bright_green().bold(),
        (_, Theme::Light) => text.green().bold(),
    }
}

fn inline(line: &str) -> String {
    STRONG
        .replace_all(line, |caps: &Captures| caps[1].bold().to_string())
        .into_owned()
}

/// Render Markdown headings, bullets and bold spans for a terminal.
pub fn render_markdown(text: &str, theme: Theme) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|c| *c == '#').count();

        if level > 0 && trimmed[level..].starts_with(' ') {
            let title = trimmed[level..].trim();
            if level == 1 && !out.is_empty() {
                out.push(String::new());
            }
            out.push(heading(title, level, theme).to_string());
        } else if let Some(caps) = BULLET.captures(line) {
            out.push(format!("{}  • {}", &caps[1], inline(&caps[2])));
        } else {
            out.push(inline(line));
        }
    }
    out.join("\n")
}

/// One-line status banner printed above a summary.
pub fn banner(label: &str, detail: &str) -> String {
    format!("{} {}", label.bold(), detail.dimmed())
}
