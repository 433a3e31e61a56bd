//! TF-IDF vectorization and cosine similarity over an author's messages.
//!
//! Weighting follows the common scikit-learn defaults: lowercase input, tokens
//! of two or more word characters, raw term counts, smoothed
//! `idf = ln((1 + n) / (1 + df)) + 1` and L2-normalized rows.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::aggregate::AggregateError;

/// Tokens are runs of at least two word characters
pub const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// A sparse row: `(term index, weight)` pairs sorted by term index
pub type SparseRow = Vec<(usize, f64)>;

/// L2-normalized TF-IDF rows for one document set
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfMatrix {
    rows: Vec<SparseRow>,
    vocabulary_size: usize,
}

impl TfIdfMatrix {
    #[must_use]
    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    #[must_use]
    pub const fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    /// Cosine similarity between two rows; rows are unit length so this is a dot product
    #[must_use]
    pub fn similarity(&self, a: usize, b: usize) -> f64 {
        sparse_dot(&self.rows[a], &self.rows[b])
    }

    /// Full pairwise similarity matrix
    #[cfg(test)]
    fn similarity_matrix(&self) -> Vec<Vec<f64>> {
        (0..self.rows.len())
            .map(|a| (0..self.rows.len()).map(|b| self.similarity(a, b)).collect())
            .collect()
    }

    /// Column means of the similarity matrix.
    ///
    /// Computed as `x_j . (sum_i x_i) / n`, which equals the mean of column `j`
    /// without materializing the n-by-n matrix.
    #[must_use]
    pub fn mean_similarities(&self) -> Vec<f64> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let mut totals = vec![0.0; self.vocabulary_size];
        for row in &self.rows {
            for &(term, weight) in row {
                totals[term] += weight;
            }
        }
        let n = self.rows.len() as f64;
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(term, weight)| weight * totals[term]).sum::<f64>() / n)
            .collect()
    }
}

fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// TF-IDF vectorizer fitted per document set
pub struct TfIdfVectorizer {
    token_regex: Regex,
}

impl std::fmt::Debug for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfIdfVectorizer")
            .field("token_pattern", &TOKEN_PATTERN)
            .finish()
    }
}

impl TfIdfVectorizer {
    pub fn new() -> anyhow::Result<Self> {
        let token_regex = Regex::new(TOKEN_PATTERN)
            .map_err(|e| anyhow::anyhow!("Failed to compile token regex: {e}"))?;
        Ok(Self { token_regex })
    }

    fn tokenize(&self, document: &str) -> Vec<String> {
        let lowered = document.to_lowercase();
        self.token_regex
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Fit on `documents` and return their weighted rows.
    ///
    /// Fails with [`AggregateError::EmptyVocabulary`] when no document holds a token.
    pub fn fit_transform<S: AsRef<str>>(
        &self,
        documents: &[S],
    ) -> Result<TfIdfMatrix, AggregateError> {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| self.tokenize(doc.as_ref()))
            .collect();

        // Document frequency per term, in sorted term order
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for token in seen {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(AggregateError::EmptyVocabulary);
        }

        let n_documents = documents.len() as f64;
        let vocabulary: HashMap<&str, usize> = document_frequency
            .keys()
            .enumerate()
            .map(|(idx, term)| (*term, idx))
            .collect();
        let idf: Vec<f64> = document_frequency
            .values()
            .map(|&df| ((1.0 + n_documents) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in tokens {
                    if let Some(&idx) = vocabulary.get(token.as_str()) {
                        *counts.entry(idx).or_insert(0.0) += 1.0;
                    }
                }
                let mut row: SparseRow = counts
                    .into_iter()
                    .map(|(idx, tf)| (idx, tf * idf[idx]))
                    .collect();
                let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, weight) in &mut row {
                        *weight /= norm;
                    }
                }
                row
            })
            .collect();

        Ok(TfIdfMatrix {
            rows,
            vocabulary_size: idf.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer() -> TfIdfVectorizer {
        TfIdfVectorizer::new().expect("vectorizer")
    }

    #[test]
    fn test_single_character_tokens_are_ignored() {
        let result = vectorizer().fit_transform(&["a b c", "x y"]);
        assert!(matches!(result, Err(AggregateError::EmptyVocabulary)));
    }

    #[test]
    fn test_rows_are_unit_length() {
        let matrix = vectorizer()
            .fit_transform(&["wts rifter cheap", "wtb rifter", "hello hello world"])
            .expect("fit");
        for row in matrix.rows() {
            let norm: f64 = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        assert_eq!(matrix.vocabulary_size(), 6);
    }

    #[test]
    fn test_smoothed_idf_weights() {
        // "aa" appears in both documents, "bb" only in the first
        let matrix = vectorizer().fit_transform(&["aa bb", "aa"]).expect("fit");
        let idf_aa = (3.0_f64 / 3.0).ln() + 1.0;
        let idf_bb = (3.0_f64 / 2.0).ln() + 1.0;
        let norm = (idf_aa * idf_aa + idf_bb * idf_bb).sqrt();
        assert_eq!(matrix.rows()[0][0].0, 0);
        assert!((matrix.rows()[0][0].1 - idf_aa / norm).abs() < 1e-12);
        assert!((matrix.rows()[0][1].1 - idf_bb / norm).abs() < 1e-12);
        assert!((matrix.rows()[1][0].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_documents_have_similarity_one() {
        let matrix = vectorizer()
            .fit_transform(&["selling ships", "selling ships", "buying ore"])
            .expect("fit");
        assert!((matrix.similarity(0, 1) - 1.0).abs() < 1e-12);
        assert!(matrix.similarity(0, 2).abs() < 1e-12);
    }

    #[test]
    fn test_mean_similarities_match_matrix_columns() {
        let matrix = vectorizer()
            .fit_transform(&["wts rifter cheap", "wtb rifter now", "cheap ore", "ore ore"])
            .expect("fit");
        let full = matrix.similarity_matrix();
        let means = matrix.mean_similarities();
        for (j, mean) in means.iter().enumerate() {
            let column: f64 = full.iter().map(|row| row[j]).sum::<f64>() / full.len() as f64;
            assert!((column - mean).abs() < 1e-12);
        }
    }

    #[test]
    fn test_document_without_tokens_is_zero_row() {
        let matrix = vectorizer().fit_transform(&["ab cd", "!"]).expect("fit");
        assert!(matrix.rows()[1].is_empty());
        assert!(matrix.similarity(0, 1).abs() < f64::EPSILON);
    }
}
