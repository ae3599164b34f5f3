//! All similarity logic independent of how it is run (CLI or library).
//!
//! A build turns every allowed file under a root into a hashed TF-IDF vector and
//! writes them, with per-file metadata, to an index file inside the root (see
//! [store]). A query vectorizes a file or free text with the same settings and
//! ranks the indexed files by cosine similarity.

pub mod app_data;
pub mod config;
pub mod documents;
pub mod hashing;
pub mod index;
pub mod query;
pub mod similarity;
pub mod store;
pub mod tokenize;
pub mod vectorize;

pub use app_data::app_data_dir;
pub use config::{config_path, load_config, load_config_from, Config, ConfigError, QueryWeighting};
pub use documents::{discover, document_id, read_document, Document, ScanError};
pub use index::{build_and_save, build_index, check_freshness, BuildReport, Freshness, IndexError, Skipped};
pub use query::{query_index, run_query, Match, Query, QueryError};
pub use similarity::{cosine, rank, RankOptions, Ranked};
pub use store::{default_index_path, load, save, DocumentMetadata, Index, SparseVector, StoreError};
pub use vectorize::{DocFrequencies, Vector, Vectorizer};
