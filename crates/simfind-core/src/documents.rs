//! Discovering and reading the files of a root directory.
//!
//! Discovery is lazy and sorted by file name so two builds over the same tree
//! produce the same index. Metadata extraction is best-effort: a file with broken
//! frontmatter is still indexed, with a title taken from its name.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::store::DocumentMetadata;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

/// A readable file, ready to be vectorized.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the root, `/`-separated.
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    /// Text handed to the vectorizer.
    pub content: String,
    pub ext: String,
    pub tags: Vec<String>,
    pub fingerprint: String,
}

impl Document {
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            id: self.id.clone(),
            path: self.path.to_string_lossy().into_owned(),
            title: self.title.clone(),
            fingerprint: self.fingerprint.clone(),
            ext: self.ext.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Lazily lists the files under `root` that `config` allows, in a stable order.
/// Hidden and excluded directories are not descended into. Unreadable directory
/// entries are logged and skipped.
pub fn discover<'a>(root: &Path, config: &'a Config) -> Result<impl Iterator<Item = PathBuf> + 'a, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !is_skipped_dir(e, config));
    Ok(walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(move |entry| {
            extension_of(entry.path()).is_some_and(|ext| config.allows_extension(&ext))
        })
        .map(walkdir::DirEntry::into_path))
}

fn is_skipped_dir(entry: &walkdir::DirEntry, config: &Config) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || config.excludes_dir(name))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Id of `path` relative to `root`; falls back to the full path for files outside it.
pub fn document_id(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Read one file into a [`Document`]. Fails with [`ScanError::Unreadable`] for I/O errors,
/// for content that is not UTF-8 and for a path below `root` that is not UTF-8 (its id
/// would be lossy and could collide with another file's).
pub fn read_document(root: &Path, path: &Path, config: &Config) -> Result<Document, ScanError> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    if rel.to_str().is_none() {
        return Err(ScanError::Unreadable(
            path.to_path_buf(),
            "file name is not valid UTF-8".into(),
        ));
    }
    let bytes = std::fs::read(path).map_err(|e| ScanError::Unreadable(path.to_path_buf(), e.to_string()))?;
    let fingerprint = blake3::hash(&bytes).to_hex().to_string();
    let raw = String::from_utf8(bytes)
        .map_err(|_| ScanError::Unreadable(path.to_path_buf(), "not valid UTF-8".into()))?;
    let ext = extension_of(path).unwrap_or_default();

    let (yaml, body) = split_frontmatter(&raw);
    let front = yaml.map(|y| parse_frontmatter(y, path)).unwrap_or_default();
    let title = front
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            MARKDOWN_EXTENSIONS
                .contains(&ext.as_str())
                .then(|| first_heading(body))
                .flatten()
        })
        .unwrap_or_else(|| file_title(path));
    let tags = front.tags.map(Tags::into_vec).unwrap_or_default();

    let content = if config.enrich_with_frontmatter && yaml.is_some() {
        enrich(front.title.as_deref(), &tags, body)
    } else {
        raw.clone()
    };

    Ok(Document {
        id: document_id(root, path),
        path: path.to_path_buf(),
        title,
        content,
        ext,
        tags,
        fingerprint,
    })
}

/// blake3 hex digest of a file, used to tell whether it changed since indexing.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    title: Option<String>,
    tags: Option<Tags>,
}

/// `tags: [a, b]` or `tags: "a, b"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<String>),
    Csv(String),
}

impl Tags {
    fn into_vec(self) -> Vec<String> {
        let tags = match self {
            Tags::List(list) => list,
            Tags::Csv(s) => s.split(',').map(str::to_string).collect(),
        };
        tags.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

fn parse_frontmatter(yaml: &str, path: &Path) -> Frontmatter {
    if yaml.trim().is_empty() {
        return Frontmatter::default();
    }
    serde_yaml::from_str(yaml).unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "ignoring unparsable frontmatter");
        Frontmatter::default()
    })
}

/// Splits optional YAML frontmatter (between a leading `---` line and the next `---`
/// line) from the body. Returns `(None, content)` when there is none.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let s = content.trim_start_matches('\u{feff}').trim_start();
    let Some(rest) = s.strip_prefix("---") else {
        return (None, content);
    };
    let Some(after_open) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (None, content);
    };
    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (Some(yaml), body.trim_start());
        }
        offset += line.len();
    }
    (None, content)
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn enrich(title: Option<&str>, tags: &[String], body: &str) -> String {
    let mut content = String::with_capacity(body.len() + 64);
    if let Some(title) = title {
        content.push_str(title);
        content.push('\n');
    }
    if !tags.is_empty() {
        content.push_str(&tags.join(" "));
        content.push('\n');
    }
    content.push_str(body);
    content
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("cannot read {0}: {1}")]
    Unreadable(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn ids(root: &Path, config: &Config) -> Vec<String> {
        discover(root, config)
            .unwrap()
            .map(|p| document_id(root, &p))
            .collect()
    }

    #[test]
    fn split_frontmatter_plain() {
        let s = "Hello world.";
        assert_eq!(split_frontmatter(s), (None, "Hello world."));
    }

    #[test]
    fn split_frontmatter_with_yaml() {
        let s = "---\ntitle: Foo\ndate: 2024-01-01\n---\n\nActual content here.";
        assert_eq!(
            split_frontmatter(s),
            (Some("title: Foo\ndate: 2024-01-01\n"), "Actual content here.")
        );
    }

    #[test]
    fn split_frontmatter_empty_block_and_unterminated() {
        assert_eq!(split_frontmatter("---\n---\nbody"), (Some(""), "body"));
        let open = "---\ntitle: never closed\n";
        assert_eq!(split_frontmatter(open), (None, open));
        assert_eq!(split_frontmatter("--- not a fence"), (None, "--- not a fence"));
    }

    #[test]
    fn discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "b.md", b"b");
        write(root, "a.rs", b"a");
        write(root, "image.png", b"png");
        write(root, "src/lib.rs", b"lib");
        write(root, "node_modules/pkg/index.js", b"js");
        write(root, ".git/config.md", b"git");
        write(root, ".simfind/index.md", b"index");
        write(root, ".hidden/notes.md", b"hidden");
        write(root, "target/debug/out.rs", b"out");

        assert_eq!(ids(root, &Config::default()), ["a.rs", "b.md", "src/lib.rs"]);
    }

    #[test]
    fn discover_honors_overrides() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "a.rs", b"a");
        write(root, "B.MD", b"b");
        write(root, "vendor/c.md", b"c");
        let config = Config {
            extensions: vec!["md".into()],
            exclude_dirs: vec!["vendor".into()],
            ..Config::default()
        };
        assert_eq!(ids(root, &config), ["B.MD"]);
    }

    #[test]
    fn discover_rejects_files() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "a.md", b"a");
        assert!(matches!(discover(&file, &Config::default()), Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn frontmatter_title_and_tags() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "notes/cats.md",
            b"---\ntitle: All About Cats\ntags: [pets, felines]\n---\n# Heading\n\nCats purr.",
        );
        let doc = read_document(dir.path(), &path, &Config::default()).unwrap();
        assert_eq!(doc.id, "notes/cats.md");
        assert_eq!(doc.title, "All About Cats");
        assert_eq!(doc.tags, ["pets", "felines"]);
        assert_eq!(doc.ext, "md");
        assert_eq!(doc.content, "All About Cats\npets felines\n# Heading\n\nCats purr.");
    }

    #[test]
    fn comma_separated_tags() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "a.md", b"---\ntags: rust, search ,\n---\nbody");
        let doc = read_document(dir.path(), &path, &Config::default()).unwrap();
        assert_eq!(doc.tags, ["rust", "search"]);
        assert_eq!(doc.title, "a");
    }

    #[test]
    fn heading_then_filename_fallback() {
        let dir = TempDir::new().unwrap();
        let md = write(dir.path(), "guide.md", b"intro\n# Getting Started\ntext");
        let rs = write(dir.path(), "main.rs", b"# not a heading in rust\nfn main() {}");
        let config = Config::default();
        assert_eq!(read_document(dir.path(), &md, &config).unwrap().title, "Getting Started");
        assert_eq!(read_document(dir.path(), &rs, &config).unwrap().title, "main");
    }

    #[test]
    fn broken_frontmatter_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "broken.md", b"---\ntitle: [unclosed\n---\nbody text");
        let doc = read_document(dir.path(), &path, &Config::default()).unwrap();
        assert_eq!(doc.title, "broken");
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn enrichment_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let raw = "---\ntitle: T\n---\nbody";
        let path = write(dir.path(), "a.md", raw.as_bytes());
        let config = Config {
            enrich_with_frontmatter: false,
            ..Config::default()
        };
        let doc = read_document(dir.path(), &path, &config).unwrap();
        assert_eq!(doc.content, raw);
        assert_eq!(doc.title, "T");
    }

    #[test]
    fn non_utf8_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "bin.txt", &[0xff, 0xfe, 0x00, 0x9f]);
        let err = read_document(dir.path(), &path, &Config::default()).unwrap_err();
        assert!(matches!(err, ScanError::Unreadable(..)));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "a.txt", b"one");
        let doc = read_document(dir.path(), &path, &Config::default()).unwrap();
        assert_eq!(doc.fingerprint, fingerprint_file(&path).unwrap());
        assert_eq!(doc.fingerprint, blake3::hash(b"one").to_hex().to_string());
        fs::write(&path, "two").unwrap();
        assert_ne!(doc.fingerprint, fingerprint_file(&path).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_name_is_unreadable() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"\xff.md"));
        fs::write(&path, "cat").unwrap();
        let err = read_document(dir.path(), &path, &Config::default()).unwrap_err();
        assert!(matches!(err, ScanError::Unreadable(..)));
    }
}
