//! Custom error types for shelfdoctor

use thiserror::Error;

/// Main error type for shelfdoctor operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Schema error: table '{0}' not found in DB")]
    Schema(String),

    #[error("no rows found in content for book_id={0}")]
    NotFound(i64),

    #[error("{0}")]
    Environment(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Structural problems (missing files, bad shapes, absent tables) exit 2,
    /// an export that matches zero rows exits 3, everything else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_) => 3,
            Error::Shape(_) | Error::Schema(_) | Error::Environment(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for shelfdoctor
pub type Result<T> = std::result::Result<T, Error>;
