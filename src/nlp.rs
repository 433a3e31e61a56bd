use anyhow::Result;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

/// Placeholder for bracketed item links and contract markers
pub const CONTRACT_TOKEN: &str = "ContractLink";
/// Placeholder for web links
pub const URL_TOKEN: &str = "urlLink";

/// Permissive URL matcher: scheme, `www` prefix, or `domain.tld/`, with balanced
/// parentheses allowed inside and trailing punctuation left outside the match.
const URL_PATTERN: &str = r#"(?i)\b((?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’]))"#;

/// Message normalizer and stemmer
pub struct NlpProcessor {
    bracket_regex: Regex,
    contract_regex: Regex,
    url_regex: Regex,
    stemmer: Stemmer,
}

impl NlpProcessor {
    /// Compile the link patterns and create an English Snowball stemmer
    pub fn new() -> Result<Self> {
        let bracket_regex = Regex::new(r"\[[^\]]*\]")
            .map_err(|e| anyhow::anyhow!("Failed to compile bracket regex: {e}"))?;
        let contract_regex = Regex::new(r"\((?:Item Exchange|Auction|Courier)\)")
            .map_err(|e| anyhow::anyhow!("Failed to compile contract regex: {e}"))?;
        let url_regex = Regex::new(URL_PATTERN)
            .map_err(|e| anyhow::anyhow!("Failed to compile URL regex: {e}"))?;

        Ok(Self {
            bracket_regex,
            contract_regex,
            url_regex,
            stemmer: Stemmer::create(Algorithm::English),
        })
    }

    /// Reduce a raw message to space-separated ASCII alphanumeric tokens.
    ///
    /// Links are masked before punctuation is stripped, so `[Rifter]` and
    /// `http://x.com/a` survive as placeholder tokens instead of fragments.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let masked = self.bracket_regex.replace_all(text, CONTRACT_TOKEN);
        let masked = self.contract_regex.replace_all(&masked, CONTRACT_TOKEN);
        let masked = self.url_regex.replace_all(&masked, URL_TOKEN);

        let stripped: String = masked
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
            .collect();

        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Stem each token of normalized text, keeping token order and count
    #[must_use]
    pub fn stem_text(&self, normalized: &str) -> String {
        normalized
            .split_whitespace()
            .map(|token| self.stemmer.stem(&token.to_lowercase()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalize then stem a raw message
    #[must_use]
    pub fn clean_message(&self, text: &str) -> String {
        self.stem_text(&self.normalize(text))
    }
}

impl std::fmt::Debug for NlpProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NlpProcessor")
            .field("stemmer", &"english")
            .finish_non_exhaustive()
    }
}
