//! Read-only access to the content database
//!
//! This module handles all SQLite access:
//! - table existence probes (schemas evolve; a missing table is zero rows)
//! - the doctor's row counts, id sets and corruption tallies
//! - raw row extraction for the patch generator
//!
//! The database is opened read-only with a single connection per
//! invocation and released before the command returns.

mod value;

pub use value::*;

use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, Row};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

pub const KOTOB_TABLE: &str = "kotob";
pub const CONTENT_TABLE: &str = "content";
pub const CONTENT_AUDIO_TABLE: &str = "content_audio";
pub const CATEGORIES_TABLE: &str = "categories";
pub const CHAPTERS_TABLE: &str = "chapters";

const BOOKLESS_CONTENT_SQL: &str = r#"
    SELECT COUNT(*)
    FROM content
    WHERE kotob_id IS NULL
       OR TRIM(CAST(kotob_id AS TEXT)) = ''
       OR CAST(kotob_id AS INTEGER) IN (0, -1)
"#;

const DUP_CONTENT_PAIRS_SQL: &str = r#"
    SELECT COUNT(*)
    FROM (
      SELECT chapters_id, kotob_id, COUNT(*) AS c
      FROM content
      GROUP BY chapters_id, kotob_id
      HAVING c > 1
    ) t
"#;

const ORPHAN_CONTENT_BOOKS_SQL: &str = r#"
    SELECT COUNT(*)
    FROM content c
    WHERE c.kotob_id IS NOT NULL
      AND TRIM(CAST(c.kotob_id AS TEXT)) <> ''
      AND CAST(c.kotob_id AS INTEGER) NOT IN (0, -1)
      AND NOT EXISTS (
        SELECT 1 FROM kotob k WHERE CAST(k.id AS INTEGER) = CAST(c.kotob_id AS INTEGER)
      )
"#;

const ORPHAN_CONTENT_CHAPTERS_SQL: &str = r#"
    SELECT COUNT(*)
    FROM content c
    WHERE c.chapters_id IS NOT NULL
      AND NOT EXISTS (
        SELECT 1 FROM chapters ch WHERE CAST(ch.id AS INTEGER) = CAST(c.chapters_id AS INTEGER)
      )
"#;

/// Everything the doctor extracts from the database in one pass.
///
/// A missing database yields `DbStats::default()`: all counts zero, all
/// sets empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DbStats {
    pub kotob_count: i64,
    pub content_count: i64,
    pub content_audio_count: i64,
    pub categories_count: i64,
    pub chapters_count: i64,
    /// Distinct book ids present in `kotob`, ascending.
    pub db_book_ids: Vec<i64>,
    /// Distinct book ids referenced from `content`, sentinels excluded,
    /// ascending.
    pub content_book_ids: Vec<i64>,
    /// `(book id, row count)` pairs, by descending count then ascending id.
    pub content_rows_by_book: Vec<(i64, i64)>,
    /// Content rows whose book reference is null, blank or a sentinel.
    pub bookless_content_rows: i64,
    /// Duplicate `(chapters_id, kotob_id)` pairs in `content`.
    pub dup_content_pairs: i64,
    /// Content rows whose book reference resolves to no `kotob` row.
    pub orphan_content_books: i64,
    /// Content rows whose chapter reference resolves to no `chapters` row.
    pub orphan_content_chapters: i64,
}

/// Read-only handle on the content database.
pub struct ContentDb {
    pool: SqlitePool,
}

impl ContentDb {
    /// Open the database file read-only. The file must already exist; the
    /// caller decides whether a missing file degrades or aborts.
    pub async fn open_read_only(path: &Path) -> Result<Self> {
        debug!("Opening content database at {:?}", path);
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Release the connection. Dropping the handle also releases it; this
    /// exists so commands can release before doing further file I/O.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Probe `sqlite_master` for a table, ahead of every query.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let row =
            sqlx::query("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ? LIMIT 1")
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Row count for a table; a missing table counts as zero.
    async fn table_count(&self, table: &str) -> Result<i64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Gather all doctor-facing statistics in one pass.
    pub async fn inspect(&self) -> Result<DbStats> {
        let mut stats = DbStats {
            kotob_count: self.table_count(KOTOB_TABLE).await?,
            content_count: self.table_count(CONTENT_TABLE).await?,
            content_audio_count: self.table_count(CONTENT_AUDIO_TABLE).await?,
            categories_count: self.table_count(CATEGORIES_TABLE).await?,
            chapters_count: self.table_count(CHAPTERS_TABLE).await?,
            ..DbStats::default()
        };

        let has_kotob = self.table_exists(KOTOB_TABLE).await?;
        if has_kotob {
            let rows = sqlx::query("SELECT id FROM kotob")
                .fetch_all(&self.pool)
                .await?;
            let mut ids = BTreeSet::new();
            for row in &rows {
                if let Some(id) = column_value(row, 0)?.as_int() {
                    ids.insert(id);
                }
            }
            stats.db_book_ids = ids.into_iter().collect();
        }

        if self.table_exists(CONTENT_TABLE).await? {
            let rows = sqlx::query("SELECT DISTINCT kotob_id FROM content")
                .fetch_all(&self.pool)
                .await?;
            let mut ids = BTreeSet::new();
            for row in &rows {
                if let Some(id) = column_value(row, 0)?.book_id() {
                    ids.insert(id);
                }
            }
            stats.content_book_ids = ids.into_iter().collect();

            let rows = sqlx::query("SELECT kotob_id, COUNT(*) AS c FROM content GROUP BY kotob_id")
                .fetch_all(&self.pool)
                .await?;
            let mut by_book = Vec::new();
            for row in &rows {
                if let Some(id) = column_value(row, 0)?.book_id() {
                    let count: i64 = row.try_get("c")?;
                    by_book.push((id, count));
                }
            }
            by_book.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            stats.content_rows_by_book = by_book;

            stats.bookless_content_rows = sqlx::query_scalar(BOOKLESS_CONTENT_SQL)
                .fetch_one(&self.pool)
                .await?;
            stats.dup_content_pairs = sqlx::query_scalar(DUP_CONTENT_PAIRS_SQL)
                .fetch_one(&self.pool)
                .await?;

            if has_kotob {
                stats.orphan_content_books = sqlx::query_scalar(ORPHAN_CONTENT_BOOKS_SQL)
                    .fetch_one(&self.pool)
                    .await?;
            }
            if self.table_exists(CHAPTERS_TABLE).await? {
                stats.orphan_content_chapters = sqlx::query_scalar(ORPHAN_CONTENT_CHAPTERS_SQL)
                    .fetch_one(&self.pool)
                    .await?;
            }
        }

        Ok(stats)
    }

    /// Column names of the `content` table in declaration order. The patch
    /// generator reuses exactly this order for its INSERT statements.
    pub async fn content_columns(&self) -> Result<Vec<String>> {
        if !self.table_exists(CONTENT_TABLE).await? {
            return Err(Error::Schema(CONTENT_TABLE.to_string()));
        }
        let rows = sqlx::query("PRAGMA table_info(content)")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("name")?))
            .collect()
    }

    /// All `content` rows, each as one value per column in declaration
    /// order.
    pub async fn content_rows(&self, column_count: usize) -> Result<Vec<Vec<SqlValue>>> {
        let rows = sqlx::query("SELECT * FROM content")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| (0..column_count).map(|i| column_value(row, i)).collect())
            .collect()
    }

    /// The `kotob` row for one book as `(column, value)` pairs, or `None`
    /// when the table or the row is absent.
    pub async fn book_row(&self, book_id: i64) -> Result<Option<Vec<(String, SqlValue)>>> {
        if !self.table_exists(KOTOB_TABLE).await? {
            return Ok(None);
        }
        let row = sqlx::query("SELECT * FROM kotob WHERE id = ? LIMIT 1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        row.columns()
            .iter()
            .map(|col| Ok((col.name().to_string(), column_value(&row, col.ordinal())?)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Create a database file and run the given statements against it.
    pub(crate) async fn seed_db(path: &Path, statements: &[&str]) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        for statement in statements {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }

    #[tokio::test]
    async fn test_missing_tables_inspect_as_zero() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.db");
        seed_db(&path, &["CREATE TABLE unrelated (id INTEGER)"]).await;

        let db = ContentDb::open_read_only(&path).await.unwrap();
        let stats = db.inspect().await.unwrap();
        db.close().await;

        assert_eq!(stats.kotob_count, 0);
        assert_eq!(stats.content_count, 0);
        assert!(stats.db_book_ids.is_empty());
        assert!(stats.content_rows_by_book.is_empty());
    }

    #[tokio::test]
    async fn test_inspect_counts_and_id_sets() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.db");
        seed_db(
            &path,
            &[
                "CREATE TABLE kotob (id INTEGER, title TEXT)",
                "CREATE TABLE content (id INTEGER, kotob_id, chapters_id, body TEXT)",
                "CREATE TABLE chapters (id INTEGER)",
                "INSERT INTO kotob VALUES (1, 'a'), (2, 'b')",
                "INSERT INTO chapters VALUES (10), (11)",
                // book 2 stored stringly, one bookless row, one orphan book ref
                "INSERT INTO content VALUES (1, 1, 10, 'x')",
                "INSERT INTO content VALUES (2, 1, 11, 'y')",
                "INSERT INTO content VALUES (3, '2', 10, 'z')",
                "INSERT INTO content VALUES (4, 0, 10, 'w')",
                "INSERT INTO content VALUES (5, 9, 99, 'q')",
            ],
        )
        .await;

        let db = ContentDb::open_read_only(&path).await.unwrap();
        let stats = db.inspect().await.unwrap();
        db.close().await;

        assert_eq!(stats.kotob_count, 2);
        assert_eq!(stats.content_count, 5);
        assert_eq!(stats.db_book_ids, vec![1, 2]);
        assert_eq!(stats.content_book_ids, vec![1, 2, 9]);
        assert_eq!(stats.content_rows_by_book, vec![(1, 2), (2, 1), (9, 1)]);
        assert_eq!(stats.bookless_content_rows, 1);
        assert_eq!(stats.orphan_content_books, 1);
        // rows referencing chapter 99 (and the bookless row's chapter 10 resolves)
        assert_eq!(stats.orphan_content_chapters, 1);
    }

    #[tokio::test]
    async fn test_duplicate_content_pairs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.db");
        seed_db(
            &path,
            &[
                "CREATE TABLE content (id INTEGER, kotob_id, chapters_id, body TEXT)",
                "INSERT INTO content VALUES (1, 1, 10, 'x')",
                "INSERT INTO content VALUES (2, 1, 10, 'x again')",
                "INSERT INTO content VALUES (3, 1, 11, 'y')",
            ],
        )
        .await;

        let db = ContentDb::open_read_only(&path).await.unwrap();
        let stats = db.inspect().await.unwrap();
        db.close().await;

        assert_eq!(stats.dup_content_pairs, 1);
    }

    #[tokio::test]
    async fn test_content_columns_requires_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.db");
        seed_db(&path, &["CREATE TABLE kotob (id INTEGER)"]).await;

        let db = ContentDb::open_read_only(&path).await.unwrap();
        let err = db.content_columns().await.unwrap_err();
        db.close().await;
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_content_columns_preserve_declaration_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("books.db");
        seed_db(
            &path,
            &["CREATE TABLE content (zeta TEXT, kotob_id INTEGER, alpha TEXT)"],
        )
        .await;

        let db = ContentDb::open_read_only(&path).await.unwrap();
        let columns = db.content_columns().await.unwrap();
        db.close().await;
        assert_eq!(columns, vec!["zeta", "kotob_id", "alpha"]);
    }
}
