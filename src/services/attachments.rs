//! Attachment framing inside prompt text.
//!
//! Files travel to the backend as plain text sections appended to the
//! prompt:
//!
//! ```text
//! Summarize these
//!
//! [File: report.txt]
//! <file content>
//! [/File: report.txt]
//! ```
//!
//! The backend never sees the framing as anything but text. `decode` recovers
//! the sections for display; a section only counts when its closing marker
//! repeats the opening name exactly.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Attachment;

/// Free text and extracted file sections of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedPrompt {
    pub text: String,
    pub files: Vec<Attachment>,
}

fn opening_marker() -> &'static Regex {
    static OPENING: OnceLock<Regex> = OnceLock::new();
    OPENING.get_or_init(|| Regex::new(r"\[File:\s*([^\]]+)\]").expect("valid marker pattern"))
}

fn section(attachment: &Attachment) -> String {
    format!(
        "[File: {name}]\n{content}\n[/File: {name}]",
        name = attachment.name,
        content = attachment.content
    )
}

pub fn encode(text: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return text.to_string();
    }

    let block = attachments
        .iter()
        .map(section)
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.is_empty() {
        block
    } else {
        format!("{}\n\n{}", text, block)
    }
}

pub fn decode(prompt: &str) -> DecodedPrompt {
    let mut files = Vec::new();
    let mut residual = String::with_capacity(prompt.len());
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(caps) = opening_marker().captures_at(prompt, search_from) {
        let (Some(open), Some(raw_name)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        let Some((close_start, close_end)) = find_closing(prompt, open.end(), raw_name.as_str())
        else {
            // Unterminated: leave it in the text and keep scanning after it.
            search_from = open.start() + 1;
            continue;
        };

        files.push(Attachment {
            name: raw_name.as_str().trim().to_string(),
            content: prompt[open.end()..close_start].trim().to_string(),
        });

        residual.push_str(&prompt[copied_to..open.start()]);
        copied_to = close_end;
        search_from = close_end;
    }
    residual.push_str(&prompt[copied_to..]);

    DecodedPrompt {
        text: residual.trim().to_string(),
        files,
    }
}

/// Locate the first `[/File: <name>]` at or after `from`, with optional
/// whitespace after the colon and `name` matched literally.
fn find_closing(prompt: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    const CLOSE: &str = "[/File:";

    let mut cursor = from;
    while let Some(offset) = prompt[cursor..].find(CLOSE) {
        let start = cursor + offset;
        let after_colon = &prompt[start + CLOSE.len()..];
        let gap = after_colon.len() - after_colon.trim_start().len();

        // Longest whitespace run first; a name that itself starts with
        // whitespace needs some of it back.
        let candidates = after_colon[..gap]
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(gap))
            .rev();
        for skipped in candidates {
            let matches = after_colon[skipped..]
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with(']'));
            if matches {
                let end = start + CLOSE.len() + skipped + name.len() + 1;
                return Some((start, end));
            }
        }
        cursor = start + CLOSE.len();
    }
    None
}
