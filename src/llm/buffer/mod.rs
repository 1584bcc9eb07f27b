// Streamed output buffering
// Holds back partial words and unfinished markdown links until a safe boundary

#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use std::sync::LazyLock;

static REPEATED_SPACES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ ]{2,}").expect("valid regex"));
static SPACE_BEFORE_NEWLINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\n").expect("valid regex"));
static SPACE_AFTER_NEWLINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s+").expect("valid regex"));

/// Collapse runs of spaces and strip whitespace around newlines
#[inline]
pub fn clean_streamed_text(text: &str) -> String {
    let text = REPEATED_SPACES_REGEX.replace_all(text, " ");
    let text = SPACE_BEFORE_NEWLINE_REGEX.replace_all(&text, "\n");
    SPACE_AFTER_NEWLINE_REGEX
        .replace_all(&text, "\n")
        .into_owned()
}

/// Where the scanner is relative to a markdown link `[text](url)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Text,
    /// After `[`
    InLinkText,
    /// After `]`, a `(` would start the url
    LinkTextClosed,
    /// After `](`
    InLinkUrl,
}

impl LinkState {
    /// Advance by one character. The flag is set when `c` closed a link.
    /// Links never span lines, so a newline drops back to plain text.
    #[inline]
    pub fn next(self, c: char) -> (Self, bool) {
        match (self, c) {
            (Self::Text, '[') => (Self::InLinkText, false),
            (Self::Text, _) => (Self::Text, false),
            (Self::InLinkText, ']') => (Self::LinkTextClosed, false),
            (Self::InLinkText, '\n') => (Self::Text, false),
            (Self::InLinkText, _) => (Self::InLinkText, false),
            (Self::LinkTextClosed, '(') => (Self::InLinkUrl, false),
            (Self::LinkTextClosed, '[') => (Self::InLinkText, false),
            (Self::LinkTextClosed, _) => (Self::Text, false),
            (Self::InLinkUrl, ')') => (Self::Text, true),
            (Self::InLinkUrl, '\n') => (Self::Text, false),
            (Self::InLinkUrl, _) => (Self::InLinkUrl, false),
        }
    }
}

/// Accumulates streamed tokens and releases text only up to the last
/// whitespace or closed link outside of any link.
///
/// Whitespace is cleaned across flushes: leading spaces after an emitted
/// space are dropped, as is leading whitespace after an emitted newline.
/// A space already sent cannot be taken back when the next chunk opens
/// with a newline.
#[derive(Debug, Clone, Default)]
pub struct ChunkBuffer {
    pending: String,
    state: LinkState,
    last_emitted: Option<char>,
}

impl ChunkBuffer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    #[inline]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Add a token. Returns the cleaned text that became safe to emit, if any.
    #[inline]
    pub fn push(&mut self, token: &str) -> Option<String> {
        let scan_from = self.pending.len();
        self.pending.push_str(token);

        let mut boundary = None;
        for (offset, c) in token.char_indices() {
            let (state, closed_link) = self.state.next(c);
            self.state = state;
            if state == LinkState::Text && (closed_link || c.is_whitespace()) {
                boundary = Some(scan_from + offset + c.len_utf8());
            }
        }

        let boundary = boundary?;
        let rest = self.pending.split_off(boundary);
        let ready = std::mem::replace(&mut self.pending, rest);
        self.flush(&ready)
    }

    /// Release whatever is still held, link or not
    #[inline]
    pub fn finish(&mut self) -> Option<String> {
        self.state = LinkState::Text;
        let rest = std::mem::take(&mut self.pending);
        let flushed = self.flush(&rest);
        self.last_emitted = None;
        flushed
    }

    fn flush(&mut self, raw: &str) -> Option<String> {
        let cleaned = clean_streamed_text(raw);
        let text = match self.last_emitted {
            Some('\n') => cleaned.trim_start(),
            Some(' ') => cleaned.trim_start_matches(' '),
            _ => cleaned.as_str(),
        };
        let last = text.chars().last()?;
        self.last_emitted = Some(last);
        Some(text.to_string())
    }
}
