//! Where simfind keeps its own user-level data (the default config file).
//!
//! Indexes are not stored here; each one lives inside the root it describes.

use std::path::PathBuf;

/// Returns the directory holding the user config.
/// On Linux: `~/.local/share/simfind/`; on macOS: `~/Library/Application Support/simfind/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("dev", "simfind", "simfind")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_is_a_directory() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.is_dir());
        }
    }
}
