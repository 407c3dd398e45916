#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the statistics `DuckDB` file.
//!
//! Paths are relative to the project root's `data/` directory unless
//! overridden with [`DB_PATH_ENV`].

use std::path::{Path, PathBuf};

/// Environment variable overriding [`statistics_db_path`].
pub const DB_PATH_ENV: &str = "AREASHIFT_DB_PATH";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// manifest directory itself if it has fewer ancestors than expected.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the path of the statistics `DuckDB` file.
///
/// Uses [`DB_PATH_ENV`] when set, else `data/statistics.duckdb`.
#[must_use]
pub fn statistics_db_path() -> PathBuf {
    std::env::var(DB_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| data_dir().join("statistics.duckdb"), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_under_project_root() {
        assert_eq!(data_dir(), project_root().join("data"));
        assert!(data_dir().ends_with("data"));
    }
}
