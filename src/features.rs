//! Structural character statistics for author names and message text.

use serde::{Deserialize, Serialize};

/// Character-class counts over a piece of text.
///
/// Letters and digits are the ASCII classes; the space character is the only
/// whitespace treated as "alphabetic". Everything else (tabs, punctuation,
/// non-ASCII letters) is counted as both non-alpha and non-alnum, so
/// `non_alpha == non_alnum + numbers` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFeatures {
    /// Number of characters
    pub length: usize,
    /// Characters that are neither letters nor the space character
    pub non_alpha: usize,
    /// Characters that are neither letters, digits nor the space character
    pub non_alnum: usize,
    /// Uppercase letters
    pub capitals: usize,
    /// Digits
    pub numbers: usize,
}

#[derive(Clone, Copy)]
enum CharClass {
    Upper,
    Lower,
    Digit,
    Space,
    Other,
}

const fn classify(c: char) -> CharClass {
    if c.is_ascii_uppercase() {
        CharClass::Upper
    } else if c.is_ascii_lowercase() {
        CharClass::Lower
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else if c == ' ' {
        CharClass::Space
    } else {
        CharClass::Other
    }
}

impl TextFeatures {
    /// Count character classes in one pass over `text`.
    #[must_use]
    pub fn extract(text: &str) -> Self {
        let mut features = Self::default();

        for c in text.chars() {
            features.length += 1;
            match classify(c) {
                CharClass::Upper => features.capitals += 1,
                CharClass::Lower | CharClass::Space => {}
                CharClass::Digit => {
                    features.numbers += 1;
                    features.non_alpha += 1;
                }
                CharClass::Other => {
                    features.non_alpha += 1;
                    features.non_alnum += 1;
                }
            }
        }

        features
    }
}
