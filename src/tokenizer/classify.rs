//! Token classification for presentation.
//!
//! First match wins: any decimal digit makes a Number, a token drawn entirely
//! from the punctuation set is Punctuation, everything else is a Word.
//! Categories never influence vocabulary ids.

use serde::{Deserialize, Serialize};

/// Punctuation recognised by [`classify`].
pub const DEFAULT_PUNCTUATION: &str =
    ".,!?;:()[]{}\"'-/\u{2018}\u{2019}\u{201C}\u{201D}\u{2013}\u{2014}\u{2026}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenCategory {
    Word,
    Number,
    Punctuation,
}

impl TokenCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "Word",
            Self::Number => "Number",
            Self::Punctuation => "Punctuation",
        }
    }
}

impl std::fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(token: &str) -> TokenCategory {
    classify_with(token, DEFAULT_PUNCTUATION)
}

/// First code point of each Unicode decimal-digit (`Nd`) run of ten, outside ASCII.
const DECIMAL_ZEROS: &[u32] = &[
    0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946, 0x19D0,
    0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0, 0xA9F0,
    0xAA50, 0xABF0, 0xFF10,
];

/// Decimal digit in any script. Fractions, roman numerals and other numeric
/// symbols (`½`, `Ⅻ`) are not digits.
pub fn is_decimal_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    let code = u32::from(c);
    DECIMAL_ZEROS
        .iter()
        .any(|&zero| (zero..zero + 10).contains(&code))
}

/// Classify against a caller-supplied punctuation set.
pub fn classify_with(token: &str, punctuation: &str) -> TokenCategory {
    if token.chars().any(is_decimal_digit) {
        TokenCategory::Number
    } else if !token.is_empty() && token.chars().all(|c| punctuation.contains(c)) {
        TokenCategory::Punctuation
    } else {
        TokenCategory::Word
    }
}
