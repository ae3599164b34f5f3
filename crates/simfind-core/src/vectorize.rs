//! TF-IDF weighting folded into fixed-dimension hashed vectors.
//!
//! tf is `count / total terms`; idf is smoothed as `ln((1 + N) / (1 + df)) + 1` so it is
//! always positive and a term present in every document still carries weight 1.
//! Weights are summed into `bucket(term, dim)` and the result is L2-normalized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hashing::bucket;
use crate::similarity::normalize;
use crate::tokenize::tokenize;

/// Dense vector of `dim` weights.
pub type Vector = Vec<f32>;

/// Term counts for one document. Ordered so bucket sums are reproducible bit for bit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermCounts {
    terms: BTreeMap<String, u32>,
    total: u32,
}

impl TermCounts {
    pub fn from_terms(terms: impl IntoIterator<Item = String>) -> Self {
        let mut counts = Self::default();
        for term in terms {
            *counts.terms.entry(term).or_insert(0) += 1;
            counts.total += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Number of corpus documents containing each term at least once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocFrequencies(BTreeMap<String, u32>);

impl DocFrequencies {
    pub fn get(&self, term: &str) -> u32 {
        self.0.get(term).copied().unwrap_or(0)
    }

    fn record(&mut self, counts: &TermCounts) {
        for term in counts.terms.keys() {
            *self.0.entry(term.clone()).or_insert(0) += 1;
        }
    }
}

/// Smoothed inverse document frequency for a corpus of `n` documents.
pub fn idf(n: usize, df: u32) -> f32 {
    (((1.0 + n as f64) / (1.0 + f64::from(df))).ln() + 1.0) as f32
}

/// Turns text into hashed TF-IDF vectors with a fixed dimension and excerpt length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vectorizer {
    dim: usize,
    excerpt_chars: usize,
}

impl Vectorizer {
    pub fn new(dim: usize, excerpt_chars: usize) -> Self {
        Self { dim, excerpt_chars }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn excerpt_chars(&self) -> usize {
        self.excerpt_chars
    }

    /// Tokenize `text` and count its terms.
    pub fn term_counts(&self, text: &str) -> TermCounts {
        TermCounts::from_terms(tokenize(text, self.excerpt_chars))
    }

    /// Start an incremental corpus. Only term counts are kept per document.
    pub fn corpus(&self) -> CorpusBuilder {
        CorpusBuilder {
            vectorizer: *self,
            docs: Vec::new(),
            df: DocFrequencies::default(),
        }
    }

    /// Corpus mode: one vector per text, idf computed across all of them.
    pub fn vectorize_corpus<S: AsRef<str>>(&self, texts: &[S]) -> (Vec<Vector>, DocFrequencies) {
        let mut corpus = self.corpus();
        for text in texts {
            corpus.add(text.as_ref());
        }
        corpus.finish()
    }

    /// Single-document mode: the corpus algorithm on a corpus of one.
    ///
    /// Every present term has idf 1 here, so this is pure term-frequency weighting.
    pub fn vectorize_single(&self, text: &str) -> Vector {
        let mut corpus = self.corpus();
        corpus.add(text);
        let (mut vectors, _) = corpus.finish();
        vectors.pop().unwrap_or_else(|| vec![0.0; self.dim])
    }

    /// Weigh `text` with the statistics of an existing corpus of `doc_count` documents.
    /// Terms the corpus never saw get `df = 0`.
    pub fn vectorize_with_stats(&self, text: &str, df: &DocFrequencies, doc_count: usize) -> Vector {
        let counts = self.term_counts(text);
        self.fold(&counts, |term| idf(doc_count, df.get(term)))
    }

    fn fold(&self, counts: &TermCounts, idf_of: impl Fn(&str) -> f32) -> Vector {
        let mut dense = vec![0.0f32; self.dim];
        if counts.is_empty() {
            return dense;
        }
        let total = counts.total as f32;
        for (term, &count) in &counts.terms {
            let tf = count as f32 / total;
            dense[bucket(term, self.dim)] += tf * idf_of(term);
        }
        normalize(&dense)
    }
}

/// Accumulates documents for corpus-mode vectorization.
#[derive(Debug)]
pub struct CorpusBuilder {
    vectorizer: Vectorizer,
    docs: Vec<TermCounts>,
    df: DocFrequencies,
}

impl CorpusBuilder {
    /// Add a document; returns its position in the corpus.
    pub fn add(&mut self, text: &str) -> usize {
        let counts = self.vectorizer.term_counts(text);
        self.df.record(&counts);
        self.docs.push(counts);
        self.docs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Weigh every document against the final document frequencies.
    pub fn finish(self) -> (Vec<Vector>, DocFrequencies) {
        let n = self.docs.len();
        let vectors = self
            .docs
            .iter()
            .map(|counts| self.vectorizer.fold(counts, |term| idf(n, self.df.get(term))))
            .collect();
        (vectors, self.df)
    }
}
