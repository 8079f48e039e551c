//! Text normalisation for indexing and previews
//!
//! `Tokenizer` turns raw text into index terms: lowercase, non-alphanumeric
//! runs become separators, short tokens are dropped. Both the corpus and the
//! query go through the same instance so their vocabularies line up.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DEFAULT_MIN_TOKEN_LENGTH;

/// Control characters other than `\t` and `\n`.
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap()
});

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    min_token_length: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LENGTH)
    }
}

impl Tokenizer {
    pub fn new(min_token_length: usize) -> Self {
        Self { min_token_length }
    }

    pub fn min_token_length(&self) -> usize {
        self.min_token_length
    }

    /// Split `text` into index terms. Empty or whitespace-only input yields
    /// an empty vector, which callers treat as "nothing to retrieve".
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut tokens = Vec::new();
        let mut current = String::new();

        for ch in lowered.chars() {
            if ch.is_alphanumeric() {
                current.push(ch);
            } else if !current.is_empty() {
                self.push_token(&mut tokens, std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            self.push_token(&mut tokens, current);
        }
        tokens
    }

    fn push_token(&self, tokens: &mut Vec<String>, token: String) {
        if token.chars().count() >= self.min_token_length {
            tokens.push(token);
        }
    }
}

/// Strip control characters, collapse horizontal whitespace and blank-line
/// runs, then trim.
pub fn clean_text(text: &str) -> String {
    let text = CONTROL_CHARS.replace_all(text, "");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Leading excerpt of `content` with whitespace runs collapsed to single
/// spaces, suffixed with "…" when the content was cut.
pub fn generate_preview(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    let mut result = String::with_capacity(max_chars.min(trimmed.len()) + 3);
    let mut last_was_space = false;
    let mut written = 0;
    let mut truncated = false;

    for ch in trimmed.chars() {
        let ch = match ch {
            '\n' | '\t' | '\r' => ' ',
            c => c,
        };
        if ch == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        if written >= max_chars {
            truncated = true;
            break;
        }
        result.push(ch);
        written += 1;
    }

    if result.ends_with(' ') {
        result.pop();
    }
    if truncated {
        result.push('\u{2026}');
    }
    result
}
