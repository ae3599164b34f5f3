//! CLI entry point for simfind: build an index and find similar files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use simfind_core::{
    app_data_dir, build_and_save, check_freshness, config_path, default_index_path, discover,
    document_id, load, load_config, load_config_from, run_query, Config, ConfigError, IndexError,
    Match, Query, QueryError, QueryWeighting, StoreError,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "simfind")]
#[command(version)]
#[command(about = "simfind: find files similar to a file or a piece of text")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the one in the data directory.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Build (or rebuild) the index for a directory.
    Index {
        /// Root directory to index.
        #[arg(value_name = "ROOT", default_value = ".")]
        root: PathBuf,
        /// Write the index here instead of ROOT/.simfind/index.json.
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,
        /// Extensions to index, comma-separated (e.g. md,rs,py).
        #[arg(long, value_name = "EXTS", value_delimiter = ',')]
        ext: Option<Vec<String>>,
        /// Directory names to skip, comma-separated.
        #[arg(long, value_name = "DIRS", value_delimiter = ',')]
        exclude: Option<Vec<String>>,
        /// Vector dimension (number of hash buckets).
        #[arg(long, value_name = "N")]
        dim: Option<usize>,
    },
    /// Find indexed files similar to a file or to free text.
    Query {
        /// Free text to search for.
        #[arg(value_name = "TEXT", conflicts_with = "file")]
        text: Vec<String>,
        /// Find files similar to this file.
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Root directory the index was built for.
        #[arg(long, value_name = "ROOT", default_value = ".")]
        root: PathBuf,
        /// Read the index from here instead of ROOT/.simfind/index.json.
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,
        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Minimum similarity (0 to 1).
        #[arg(short, long)]
        threshold: Option<f32>,
        /// How query terms are weighted.
        #[arg(long, value_enum)]
        weighting: Option<Weighting>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show index details and which files changed since it was built.
    Status {
        #[arg(value_name = "ROOT", default_value = ".")]
        root: PathBuf,
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,
        /// Print status as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the files an index build would include.
    Scan {
        #[arg(value_name = "ROOT", default_value = ".")]
        root: PathBuf,
    },
    /// Show where simfind looks for its config file.
    DataDir,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Weighting {
    /// Weigh query terms with the indexed corpus's statistics.
    Corpus,
    /// Weigh query terms by their frequency in the query alone.
    Query,
}

impl From<Weighting> for QueryWeighting {
    fn from(w: Weighting) -> Self {
        match w {
            Weighting::Corpus => QueryWeighting::Corpus,
            Weighting::Query => QueryWeighting::Query,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    index_path: String,
    version: u32,
    created_at: String,
    root_path: String,
    hash_dim: usize,
    doc_count: usize,
    changed: Vec<String>,
    missing: Vec<String>,
    added: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let loaded = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return match e {
                ConfigError::Invalid(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            };
        }
    };

    match cli.command {
        Commands::Index {
            root,
            index,
            ext,
            exclude,
            dim,
        } => {
            let config = Config {
                extensions: ext.unwrap_or(config.extensions),
                exclude_dirs: exclude.unwrap_or(config.exclude_dirs),
                hash_dim: dim.unwrap_or(config.hash_dim),
                ..config
            };
            cmd_index(&root, index.as_deref(), &config)
        }
        Commands::Query {
            text,
            file,
            root,
            index,
            limit,
            threshold,
            weighting,
            json,
        } => {
            let config = Config {
                limit: limit.unwrap_or(config.limit),
                threshold: threshold.unwrap_or(config.threshold),
                query_weighting: weighting.map_or(config.query_weighting, Into::into),
                ..config
            };
            let text = (!text.is_empty()).then(|| text.join(" "));
            let index = index.unwrap_or_else(|| default_index_path(&root, &config.index_dir));
            cmd_query(&index, file, text, &config, json)
        }
        Commands::Status { root, index, json } => {
            let index = index.unwrap_or_else(|| default_index_path(&root, &config.index_dir));
            cmd_status(&index, &config, json)
        }
        Commands::Scan { root } => cmd_scan(&root, &config),
        Commands::DataDir => match (app_data_dir(), config_path()) {
            (Some(dir), Some(file)) => {
                println!("{}", dir.display());
                println!("  config: {}", file.display());
                ExitCode::SUCCESS
            }
            _ => {
                eprintln!("Could not determine the data directory.");
                ExitCode::FAILURE
            }
        },
    }
}

fn cmd_index(root: &Path, index: Option<&Path>, config: &Config) -> ExitCode {
    match build_and_save(root, config, index) {
        Ok(report) => {
            println!(
                "Indexed {} file(s) into {}",
                report.indexed,
                report.index_path.display()
            );
            if !report.skipped.is_empty() {
                println!("Skipped {} unreadable file(s):", report.skipped.len());
                for s in &report.skipped {
                    println!("  {}  ({})", s.path.display(), s.reason);
                }
            }
            ExitCode::SUCCESS
        }
        Err(IndexError::Config(e)) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_query(
    index: &Path,
    file: Option<PathBuf>,
    text: Option<String>,
    config: &Config,
    json: bool,
) -> ExitCode {
    let result = Query::from_parts(file, text).and_then(|q| run_query(index, &q, config));
    let matches = match result {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("Error: {}", describe_query_error(&e));
            return match e {
                QueryError::InvalidQuery(_) | QueryError::Config(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            };
        }
    };

    if json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("No similar files found (threshold {:.2}).", config.threshold);
        return ExitCode::SUCCESS;
    }
    for m in &matches {
        println!("{}", format_match(m));
    }
    ExitCode::SUCCESS
}

fn format_match(m: &Match) -> String {
    if m.ext.is_empty() {
        format!("{:.2}  {}  ({})", m.similarity, m.path, m.title)
    } else {
        format!("{:.2}  {}  ({}, {})", m.similarity, m.path, m.title, m.ext)
    }
}

fn describe_query_error(e: &QueryError) -> String {
    match e {
        QueryError::Store(StoreError::NotFound(path)) => format!(
            "no index found at {}. Run `simfind index <ROOT>` to build one.",
            path.display()
        ),
        QueryError::Store(StoreError::Corrupt { path, reason }) => format!(
            "the index at {} is malformed ({reason}). Rebuild it with `simfind index <ROOT>`.",
            path.display()
        ),
        other => other.to_string(),
    }
}

fn cmd_status(index_path: &Path, config: &Config, json: bool) -> ExitCode {
    let index = match load(index_path) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("Error: {}", describe_query_error(&QueryError::Store(e)));
            return ExitCode::FAILURE;
        }
    };
    let freshness = match check_freshness(&index, config) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let report = StatusReport {
        index_path: index_path.display().to_string(),
        version: index.version,
        created_at: index.created_at.to_rfc3339(),
        root_path: index.root_path.clone(),
        hash_dim: index.hash_dim,
        doc_count: index.doc_count,
        changed: freshness.changed,
        missing: freshness.missing,
        added: freshness.added,
    };
    if json {
        return print_json(&report);
    }

    println!("Index    {}", report.index_path);
    println!("  root     {}", report.root_path);
    println!("  built    {}", report.created_at);
    println!("  version  {}", report.version);
    println!("  dim      {}", report.hash_dim);
    println!("  files    {}", report.doc_count);
    if report.changed.is_empty() && report.missing.is_empty() && report.added.is_empty() {
        println!("Up to date.");
        return ExitCode::SUCCESS;
    }
    for (label, ids) in [
        ("changed", &report.changed),
        ("missing", &report.missing),
        ("new", &report.added),
    ] {
        for id in ids {
            println!("  {label:<8} {id}");
        }
    }
    println!("Run `simfind index {}` to refresh.", report.root_path);
    ExitCode::SUCCESS
}

fn cmd_scan(root: &Path, config: &Config) -> ExitCode {
    match discover(root, config) {
        Ok(paths) => {
            let mut count = 0;
            for path in paths {
                println!("  {}", document_id(root, &path));
                count += 1;
            }
            println!("{count} file(s) under {}", root.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_rows_show_title_and_extension() {
        let m = Match {
            path: "/repo/notes/cats.md".into(),
            title: "All About Cats".into(),
            similarity: 0.5,
            ext: "md".into(),
        };
        assert_eq!(format_match(&m), "0.50  /repo/notes/cats.md  (All About Cats, md)");

        let bare = Match {
            ext: String::new(),
            ..m
        };
        assert_eq!(format_match(&bare), "0.50  /repo/notes/cats.md  (All About Cats)");
    }
}
