//! Word-level tokenizer
//!
//! Splits free text into surface tokens:
//!
//! - a run of letters/digits, where a single apostrophe or hyphen sitting
//!   *between* two alphanumerics is kept inside the run (`don't`, `well-known`)
//! - otherwise exactly one non-whitespace character (punctuation, symbols)
//!
//! Whitespace is never part of a token. Surface case is preserved; callers
//! normalize with [`Token::normalized`] before touching the vocabulary.

pub mod classify;

pub use classify::{
    classify, classify_with, is_decimal_digit, TokenCategory, DEFAULT_PUNCTUATION,
};

/// One surface token and where it starts in the input (byte offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    /// Byte offset one past the last byte of the token.
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Lowercase form used for vocabulary lookups.
    pub fn normalized(&self) -> String {
        self.text.to_lowercase()
    }

    pub fn category(&self) -> TokenCategory {
        classify(self.text)
    }
}

/// Characters that may glue two alphanumeric runs into one token.
fn is_joiner(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '-')
}

/// Tokenize `text` left to right. Deterministic, never yields an empty token.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if !c.is_alphanumeric() {
            chars.next();
            tokens.push(Token {
                text: &text[start..start + c.len_utf8()],
                start,
            });
            continue;
        }

        let mut end = start;
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_alphanumeric() {
                end = i + ch.len_utf8();
                chars.next();
            } else if is_joiner(ch) {
                // Joiner only counts when an alphanumeric follows immediately
                let after = text[i + ch.len_utf8()..].chars().next();
                if after.is_some_and(char::is_alphanumeric) {
                    chars.next();
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        tokens.push(Token {
            text: &text[start..end],
            start,
        });
    }

    tokens
}

/// Convenience: just the surface strings, in order.
pub fn surface_forms(text: &str) -> Vec<&str> {
    tokenize(text).into_iter().map(|t| t.text).collect()
}
