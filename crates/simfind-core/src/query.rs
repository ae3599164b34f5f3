//! Query pipeline: vectorize a file or free text against a loaded index and rank.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{Config, ConfigError, QueryWeighting};
use crate::documents::read_document;
use crate::similarity::{rank, round_score, RankOptions};
use crate::store::{self, Index, StoreError};

/// What to find similar files for.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    File(PathBuf),
    Text(String),
}

impl Query {
    /// Exactly one of `file` or `text` must be given; text must not be blank.
    pub fn from_parts(file: Option<PathBuf>, text: Option<String>) -> Result<Self, QueryError> {
        match (file, text) {
            (Some(path), None) => Ok(Query::File(path)),
            (None, Some(text)) if !text.trim().is_empty() => Ok(Query::Text(text)),
            (None, Some(_)) => Err(QueryError::InvalidQuery("query text is empty".into())),
            (Some(_), Some(_)) => Err(QueryError::InvalidQuery(
                "give either a file or text, not both".into(),
            )),
            (None, None) => Err(QueryError::InvalidQuery("no query file or text given".into())),
        }
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub path: String,
    pub title: String,
    /// Cosine similarity rounded to 2 decimals.
    pub similarity: f32,
    pub ext: String,
}

/// Load the index at `index_path` and run `query` against it.
pub fn run_query(index_path: &Path, query: &Query, config: &Config) -> Result<Vec<Match>, QueryError> {
    let index = store::load(index_path)?;
    query_index(&index, query, config)
}

/// Rank the documents of `index` against `query`. A file query never matches itself.
pub fn query_index(index: &Index, query: &Query, config: &Config) -> Result<Vec<Match>, QueryError> {
    config.validate()?;
    let (text, exclude) = match query {
        Query::Text(text) => {
            if text.trim().is_empty() {
                return Err(QueryError::InvalidQuery("query text is empty".into()));
            }
            (text.clone(), HashSet::new())
        }
        Query::File(path) => {
            let resolved = path.canonicalize().map_err(|e| {
                QueryError::InvalidQuery(format!("cannot resolve {}: {e}", path.display()))
            })?;
            // Read the file the way the build read every indexed file.
            let read_config = Config {
                enrich_with_frontmatter: index.enrich_with_frontmatter,
                ..config.clone()
            };
            let doc = read_document(Path::new(&index.root_path), &resolved, &read_config)
                .map_err(|e| QueryError::Unreadable(path.clone(), e.to_string()))?;
            let exclude = index
                .metadata
                .iter()
                .filter(|m| m.id == doc.id || Path::new(&m.path) == resolved)
                .map(|m| m.id.clone())
                .collect();
            (doc.content, exclude)
        }
    };

    let vectorizer = index.vectorizer();
    let query_vector = match config.query_weighting {
        QueryWeighting::Corpus => {
            vectorizer.vectorize_with_stats(&text, &index.doc_frequencies, index.doc_count)
        }
        QueryWeighting::Query => vectorizer.vectorize_single(&text),
    };

    let options = RankOptions {
        limit: config.limit,
        threshold: config.threshold,
        exclude,
    };
    let matches = rank(&query_vector, index.candidates(), &options)
        .into_iter()
        .map(|r| {
            let meta = &index.metadata[r.position];
            Match {
                path: meta.path.clone(),
                title: meta.title.clone(),
                similarity: round_score(r.score),
                ext: meta.ext.clone(),
            }
        })
        .collect::<Vec<_>>();
    tracing::debug!(results = matches.len(), "query ranked");
    Ok(matches)
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("cannot read query file {0}: {1}")]
    Unreadable(PathBuf, String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
