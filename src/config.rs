//! Repository path configuration
//!
//! The tool operates against a metadata repository root: three JSON
//! documents under `json/` and, by convention, a SQLite database somewhere
//! nearby. There is no persistent config file; every path is resolved from
//! the root once per invocation.

use std::path::{Path, PathBuf};

/// Books metadata document, relative to the repository root.
pub const BOOKS_JSON: &str = "json/books_metadata.json";
/// Narrated-audio metadata document, relative to the repository root.
pub const AUDIO_JSON: &str = "json/content_audio_metadata.json";
/// Category/chapter structure document, relative to the repository root.
pub const STRUCTURE_JSON: &str = "json/structure_metadata.json";

/// Resolved locations of the metadata documents for one invocation.
#[derive(Debug, Clone)]
pub struct RepoPaths {
    root: PathBuf,
}

impl RepoPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn books(&self) -> PathBuf {
        self.root.join(BOOKS_JSON)
    }

    pub fn audio(&self) -> PathBuf {
        self.root.join(AUDIO_JSON)
    }

    pub fn structure(&self) -> PathBuf {
        self.root.join(STRUCTURE_JSON)
    }

    /// Candidate locations probed for the content database when `--db` is
    /// not given, in order.
    pub fn db_candidates(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        vec![
            self.root.join("assets").join("books.db"),
            self.root.join("books.db"),
            cwd.join("assets").join("books.db"),
        ]
    }

    /// First existing candidate, else the first candidate regardless.
    pub fn default_db_path(&self) -> PathBuf {
        let candidates = self.db_candidates();
        candidates
            .iter()
            .find(|path| path.exists())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }
}
