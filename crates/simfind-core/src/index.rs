//! Build pipeline: discover → read → vectorize → sparse-encode → save.
//!
//! Files are read one at a time and reduced to term counts, so only counts (not
//! whole contents) are held until the corpus statistics are final.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError};
use crate::documents::{discover, document_id, fingerprint_file, read_document, ScanError};
use crate::store::{self, default_index_path, Index, SparseVector, StoreError};
use crate::vectorize::Vectorizer;

/// A file left out of the index, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`build_and_save`].
#[derive(Debug)]
pub struct BuildReport {
    pub index_path: PathBuf,
    pub indexed: usize,
    pub skipped: Vec<Skipped>,
}

/// Canonical form of `root`, which must be a directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf, IndexError> {
    let root = root
        .canonicalize()
        .map_err(|e| IndexError::Canonicalize(root.to_path_buf(), e))?;
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root).into());
    }
    Ok(root)
}

/// Index every allowed file under `root`. Unreadable files are skipped, never fatal.
pub fn build_index(root: &Path, config: &Config) -> Result<(Index, Vec<Skipped>), IndexError> {
    config.validate()?;
    let root = resolve_root(root)?;
    tracing::info!(root = %root.display(), dim = config.hash_dim, "building index");

    let vectorizer = Vectorizer::new(config.hash_dim, config.excerpt_chars);
    let mut corpus = vectorizer.corpus();
    let mut metadata = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();

    for path in discover(&root, config)? {
        let read = read_document(&root, &path, config).and_then(|doc| {
            if seen.insert(doc.id.clone()) {
                Ok(doc)
            } else {
                let reason = format!("duplicate document id {}", doc.id);
                Err(ScanError::Unreadable(path.clone(), reason))
            }
        });
        match read {
            Ok(doc) => {
                tracing::debug!(id = %doc.id, "indexing");
                corpus.add(&doc.content);
                metadata.push(doc.metadata());
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                skipped.push(Skipped {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    let (vectors, doc_frequencies) = corpus.finish();
    let vectors = vectors.iter().map(|v| SparseVector::from_dense(v)).collect();
    let index = Index::new(
        &root,
        vectorizer,
        config.enrich_with_frontmatter,
        doc_frequencies,
        metadata,
        vectors,
    );
    tracing::info!(documents = index.doc_count, skipped = skipped.len(), "index built");
    Ok((index, skipped))
}

/// Build the index for `root` and write it to `index_path`, or to the default
/// location inside the root.
pub fn build_and_save(
    root: &Path,
    config: &Config,
    index_path: Option<&Path>,
) -> Result<BuildReport, IndexError> {
    let (index, skipped) = build_index(root, config)?;
    let index_path = index_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_index_path(Path::new(&index.root_path), &config.index_dir));
    store::save(&index, &index_path)?;
    tracing::info!(path = %index_path.display(), "index written");
    Ok(BuildReport {
        index_path,
        indexed: index.doc_count,
        skipped,
    })
}

/// How the files on disk differ from what an index recorded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Freshness {
    /// Indexed files whose content changed.
    pub changed: Vec<String>,
    /// Indexed files that no longer exist or can't be read.
    pub missing: Vec<String>,
    /// Files discovery would pick up that the index doesn't have.
    pub added: Vec<String>,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        self.changed.is_empty() && self.missing.is_empty() && self.added.is_empty()
    }
}

/// Compare an index against the current state of its root.
pub fn check_freshness(index: &Index, config: &Config) -> Result<Freshness, IndexError> {
    let root = PathBuf::from(&index.root_path);
    let mut freshness = Freshness::default();
    for meta in &index.metadata {
        match fingerprint_file(Path::new(&meta.path)) {
            Ok(fp) if fp == meta.fingerprint => {}
            Ok(_) => freshness.changed.push(meta.id.clone()),
            Err(_) => freshness.missing.push(meta.id.clone()),
        }
    }
    if root.is_dir() {
        let known: HashSet<&str> = index.metadata.iter().map(|m| m.id.as_str()).collect();
        freshness.added = discover(&root, config)?
            .map(|p| document_id(&root, &p))
            .filter(|id| !known.contains(id.as_str()))
            .collect();
    }
    Ok(freshness)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to resolve {0}: {1}")]
    Canonicalize(PathBuf, std::io::Error),
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
