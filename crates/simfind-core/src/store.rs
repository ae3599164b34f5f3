//! On-disk index: sparse corpus vectors plus per-document metadata, stored as JSON.
//!
//! The file is replaced wholesale on every build (write to a temp file in the same
//! directory, fsync, rename), so a reader sees either the old index or the new one.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::hashing::MAX_HASH_DIM;
use crate::similarity::{l2_norm, Candidate, Weighted};
use crate::vectorize::{DocFrequencies, Vectorizer};

/// Format version written into every index file.
pub const INDEX_VERSION: u32 = 1;
/// File name of the index inside the index directory.
pub const INDEX_FILENAME: &str = "index.json";
/// Decimal places kept for stored weights.
const WEIGHT_SCALE: f64 = 10_000.0;

/// Stored weight for `w`: rounded to 4 decimal places.
fn round_weight(w: f32) -> f32 {
    ((f64::from(w) * WEIGHT_SCALE).round() / WEIGHT_SCALE) as f32
}

/// Non-zero buckets of a vector. Buckets are kept in order so the file is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(BTreeMap<u32, f32>);

impl SparseVector {
    /// Keep every non-zero entry, rounded for storage. Entries that round to zero are dropped.
    pub fn from_dense(dense: &[f32]) -> Self {
        let entries = dense
            .iter()
            .enumerate()
            .filter_map(|(i, &w)| {
                let w = round_weight(w);
                (w != 0.0).then_some((i as u32, w))
            })
            .collect();
        Self(entries)
    }

    /// Expand to `dim` weights with zeros elsewhere. Buckets past `dim` are ignored.
    pub fn to_dense(&self, dim: usize) -> Vec<f32> {
        let mut dense = vec![0.0; dim];
        for (&i, &w) in &self.0 {
            if let Some(slot) = dense.get_mut(i as usize) {
                *slot = w;
            }
        }
        dense
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.0.iter().map(|(&i, &w)| (i as usize, w))
    }

    pub fn norm(&self) -> f32 {
        self.0.values().map(|w| w * w).sum::<f32>().sqrt()
    }
}

impl Weighted for SparseVector {
    fn cosine_to(&self, query: &[f32]) -> f32 {
        let denom = self.norm() * l2_norm(query);
        if denom <= 0.0 {
            return 0.0;
        }
        let dot: f32 = self
            .iter()
            .filter_map(|(i, w)| query.get(i).map(|q| w * q))
            .sum();
        dot / denom
    }
}

/// What we keep about each indexed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path relative to the index root, `/`-separated. Unique within an index.
    pub id: String,
    /// Absolute path at build time.
    pub path: String,
    pub title: String,
    /// blake3 hex digest of the file bytes.
    pub fingerprint: String,
    /// Extension without the dot, lowercase.
    pub ext: String,
    pub tags: Vec<String>,
}

/// The persisted index. `metadata[i]` describes `vectors[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub root_path: String,
    pub hash_dim: usize,
    /// Tokenizer excerpt length used at build time; queries use the same.
    pub excerpt_chars: usize,
    /// Whether frontmatter was folded into the indexed text; file queries do the same.
    pub enrich_with_frontmatter: bool,
    pub doc_count: usize,
    pub doc_frequencies: DocFrequencies,
    pub metadata: Vec<DocumentMetadata>,
    pub vectors: Vec<SparseVector>,
}

impl Index {
    pub fn new(
        root_path: &Path,
        vectorizer: Vectorizer,
        enrich_with_frontmatter: bool,
        doc_frequencies: DocFrequencies,
        metadata: Vec<DocumentMetadata>,
        vectors: Vec<SparseVector>,
    ) -> Self {
        Self {
            version: INDEX_VERSION,
            created_at: Utc::now(),
            root_path: root_path.to_string_lossy().into_owned(),
            hash_dim: vectorizer.dim(),
            excerpt_chars: vectorizer.excerpt_chars(),
            enrich_with_frontmatter,
            doc_count: metadata.len(),
            doc_frequencies,
            metadata,
            vectors,
        }
    }

    /// Vectorizer with the settings this index was built with.
    pub fn vectorizer(&self) -> Vectorizer {
        Vectorizer::new(self.hash_dim, self.excerpt_chars)
    }

    /// Candidates for ranking, in index order.
    pub fn candidates(&self) -> impl Iterator<Item = Candidate<'_, SparseVector>> {
        self.metadata
            .iter()
            .zip(&self.vectors)
            .map(|(meta, vector)| Candidate {
                id: meta.id.as_str(),
                vector,
            })
    }

    /// Checks the structural invariants. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != INDEX_VERSION {
            return Err(format!(
                "unsupported index version {} (expected {INDEX_VERSION})",
                self.version
            ));
        }
        if self.hash_dim == 0 {
            return Err("hashDim is 0".into());
        }
        if self.hash_dim > MAX_HASH_DIM {
            return Err(format!("hashDim {} exceeds {MAX_HASH_DIM}", self.hash_dim));
        }
        if self.excerpt_chars == 0 {
            return Err("excerptChars is 0".into());
        }
        if self.metadata.len() != self.doc_count || self.vectors.len() != self.doc_count {
            return Err(format!(
                "docCount is {} but found {} metadata entries and {} vectors",
                self.doc_count,
                self.metadata.len(),
                self.vectors.len()
            ));
        }
        let mut ids = HashSet::with_capacity(self.metadata.len());
        for meta in &self.metadata {
            if !ids.insert(meta.id.as_str()) {
                return Err(format!("duplicate document id {}", meta.id));
            }
        }
        for (meta, vector) in self.metadata.iter().zip(&self.vectors) {
            for (bucket, weight) in vector.iter() {
                if bucket >= self.hash_dim {
                    return Err(format!(
                        "vector for {} has bucket {bucket} outside hashDim {}",
                        meta.id, self.hash_dim
                    ));
                }
                if !weight.is_finite() {
                    return Err(format!("vector for {} has a non-finite weight", meta.id));
                }
            }
        }
        Ok(())
    }
}

/// Where the index for `root` lives by default.
pub fn default_index_path(root: &Path, index_dir: &str) -> PathBuf {
    root.join(index_dir).join(INDEX_FILENAME)
}

/// Replace the index file at `path` with `index`.
pub fn save(index: &Index, path: &Path) -> Result<(), StoreError> {
    index.validate().map_err(StoreError::Invalid)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StoreError::Io(dir.to_path_buf(), e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::Io(dir.to_path_buf(), e))?;
    let tmp_path = tmp.path().to_path_buf();
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, index).map_err(StoreError::Serialize)?;
        writer.flush().map_err(|e| StoreError::Io(tmp_path.clone(), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::Io(tmp_path, e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::Persist(path.to_path_buf(), e.error))?;
    Ok(())
}

/// Load and check the index at `path`.
pub fn load(path: &Path) -> Result<Index, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(StoreError::Io(path.to_path_buf(), e)),
    };
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    // Version first, so an old or future file gets a precise message.
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
    match value.get("version").and_then(serde_json::Value::as_u64) {
        Some(v) if v == u64::from(INDEX_VERSION) => {}
        Some(v) => {
            return Err(corrupt(format!(
                "unsupported index version {v} (expected {INDEX_VERSION})"
            )))
        }
        None => return Err(corrupt("missing version".into())),
    }

    let index: Index = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    index.validate().map_err(corrupt)?;
    Ok(index)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no index at {0}")]
    NotFound(PathBuf),
    #[error("index at {path} is malformed: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("refusing to write invalid index: {0}")]
    Invalid(String),
    #[error("io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to serialize index: {0}")]
    Serialize(serde_json::Error),
    #[error("failed to replace {0}: {1}")]
    Persist(PathBuf, std::io::Error),
}
