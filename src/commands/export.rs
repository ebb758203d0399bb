//! Export command implementation
//!
//! Extracts every `content` row belonging to one book into a standalone,
//! idempotent SQL patch: one transaction that deletes the book's rows
//! unconditionally and re-inserts the exported set. Replaying the script
//! always converges on the same rows, whatever the destination held before.

use crate::db::{ContentDb, SqlValue, CONTENT_TABLE};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of a successful export.
#[derive(Debug, Serialize)]
pub struct ExportStats {
    pub book_id: i64,
    pub rows: usize,
    pub sql_path: PathBuf,
    pub meta_path: Option<PathBuf>,
}

/// A books-metadata row approximated from the database's own book record,
/// written next to the patch so both sides can be updated together.
#[derive(Debug, Serialize)]
struct BookSnippet {
    id: i64,
    title: Value,
    description: Value,
    version: Value,
    latest_version: Value,
    sql_download_url: Value,
    is_default: i64,
    is_downloaded_on_device: i64,
    status: Value,
}

impl BookSnippet {
    fn empty(book_id: i64) -> Self {
        Self {
            id: book_id,
            title: Value::from(""),
            description: Value::from(""),
            version: Value::from(""),
            latest_version: Value::from(""),
            sql_download_url: Value::from(""),
            is_default: 0,
            is_downloaded_on_device: 0,
            status: Value::from("active"),
        }
    }
}

/// Export one book's content rows as a SQL patch script.
pub async fn cmd_export_sql(
    db_path: &Path,
    book_id: i64,
    out_path: &Path,
    meta_out: Option<&Path>,
) -> Result<ExportStats> {
    if !db_path.exists() {
        return Err(Error::Environment(format!(
            "DB file not found: {}",
            db_path.display()
        )));
    }

    let db = ContentDb::open_read_only(db_path).await?;
    let result = export(&db, book_id, out_path, meta_out).await;
    db.close().await;
    result
}

async fn export(
    db: &ContentDb,
    book_id: i64,
    out_path: &Path,
    meta_out: Option<&Path>,
) -> Result<ExportStats> {
    let columns = db.content_columns().await?;
    if columns.is_empty() {
        return Err(Error::Schema(CONTENT_TABLE.to_string()));
    }

    let kotob_idx = columns.iter().position(|name| name == "kotob_id");
    let chapters_idx = columns.iter().position(|name| name == "chapters_id");

    let mut selected: Vec<Vec<SqlValue>> = db
        .content_rows(columns.len())
        .await?
        .into_iter()
        .filter(|row| kotob_idx.and_then(|i| row[i].book_id()) == Some(book_id))
        .collect();

    if selected.is_empty() {
        return Err(Error::NotFound(book_id));
    }

    // Stable output order across runs: numeric chapter id first, textual
    // form as the tiebreaker.
    selected.sort_by_key(|row| match chapters_idx {
        Some(i) => (row[i].as_int().unwrap_or(0), row[i].sort_text()),
        None => (0, String::new()),
    });

    let script = render_script(&columns, &selected, book_id, kotob_idx);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, script)?;
    info!("Wrote {} content rows to {:?}", selected.len(), out_path);

    let meta_path = match meta_out {
        Some(path) => {
            write_snippet(db, book_id, path).await?;
            Some(path.to_path_buf())
        }
        None => None,
    };

    Ok(ExportStats {
        book_id,
        rows: selected.len(),
        sql_path: out_path.to_path_buf(),
        meta_path,
    })
}

fn render_script(
    columns: &[String],
    rows: &[Vec<SqlValue>],
    book_id: i64,
    kotob_idx: Option<usize>,
) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push("BEGIN TRANSACTION;".to_string());
    lines.push(format!("DELETE FROM content WHERE kotob_id = {book_id};"));

    let columns_sql = columns.join(", ");
    for row in rows {
        let values: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                // The book id column is always the requested literal, even
                // when the stored value disagrees.
                if Some(i) == kotob_idx {
                    book_id.to_string()
                } else {
                    value.to_sql_literal()
                }
            })
            .collect();
        lines.push(format!(
            "INSERT INTO content ({columns_sql}) VALUES ({});",
            values.join(", ")
        ));
    }

    lines.push("COMMIT;".to_string());
    lines.join("\n") + "\n"
}

async fn write_snippet(db: &ContentDb, book_id: i64, path: &Path) -> Result<()> {
    let snippet = match db.book_row(book_id).await? {
        Some(row) => snippet_from_row(&row, book_id),
        None => BookSnippet::empty(book_id),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&snippet)?;
    std::fs::write(path, json + "\n")?;
    info!("Wrote book metadata snippet to {:?}", path);
    Ok(())
}

fn snippet_from_row(row: &[(String, SqlValue)], book_id: i64) -> BookSnippet {
    let get = |name: &str| {
        row.iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    };
    let json_of = |name: &str| get(name).map(SqlValue::to_json).unwrap_or(Value::Null);
    // latest_version wins; an empty one falls back to current_version
    let version = [get("latest_version"), get("current_version")]
        .into_iter()
        .flatten()
        .find(|value| !value.is_falsy())
        .map(SqlValue::to_json)
        .unwrap_or(Value::Null);

    BookSnippet {
        id: get("id").and_then(SqlValue::as_int).unwrap_or(book_id),
        title: json_of("title"),
        description: json_of("description"),
        version,
        latest_version: json_of("latest_version"),
        sql_download_url: json_of("sql_download_url"),
        is_default: get("is_default").and_then(SqlValue::as_int).unwrap_or(0),
        is_downloaded_on_device: get("is_downloaded").and_then(SqlValue::as_int).unwrap_or(0),
        status: json_of("status"),
    }
}

/// Print export results to console
pub fn print_export_stats(stats: &ExportStats) {
    println!(
        "Exported {} content rows for book_id={}",
        stats.rows, stats.book_id
    );
    println!("SQL file: {}", stats.sql_path.display());
    if let Some(meta_path) = &stats.meta_path {
        println!("Book metadata snippet: {}", meta_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seed_db;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
    use sqlx::{ConnectOptions, Connection};
    use tempfile::TempDir;

    async fn seed_content_db(path: &Path) {
        seed_db(
            path,
            &[
                "CREATE TABLE kotob (id INTEGER, title TEXT, latest_version TEXT, status TEXT)",
                "INSERT INTO kotob VALUES (42, 'Gardens', '3', 'active')",
                "CREATE TABLE content (id INTEGER, kotob_id, chapters_id, body TEXT)",
                // stringly-typed book id and out-of-order chapters on purpose
                "INSERT INTO content VALUES (1, '42', 2, 'second')",
                "INSERT INTO content VALUES (2, 42, 1, 'first')",
                "INSERT INTO content VALUES (3, 7, 1, 'other book')",
            ],
        )
        .await;
    }

    /// Run the script statement by statement on one connection, the way the
    /// sqlite3 shell would, so the transaction envelope stays intact.
    async fn apply_script(db_path: &Path, script: &str) {
        let options = SqliteConnectOptions::new().filename(db_path);
        let mut conn: SqliteConnection = options.connect().await.unwrap();
        for statement in script.lines().filter(|line| !line.trim().is_empty()) {
            sqlx::query(statement).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    }

    async fn count_book_rows(db_path: &Path, book_id: i64) -> i64 {
        let options = SqliteConnectOptions::new().filename(db_path);
        let mut conn: SqliteConnection = options.connect().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content WHERE kotob_id = ?")
            .bind(book_id)
            .fetch_one(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
        count
    }

    #[tokio::test]
    async fn test_export_script_shape_and_forced_book_id() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_content_db(&db_path).await;

        let out = tmp.path().join("patch").join("book_42.sql");
        let stats = cmd_export_sql(&db_path, 42, &out, None).await.unwrap();
        assert_eq!(stats.rows, 2);

        let script = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "BEGIN TRANSACTION;");
        assert_eq!(lines[1], "DELETE FROM content WHERE kotob_id = 42;");
        // rows come back ordered by chapter id, and the stringly-typed
        // stored id '42' is forced to the integer literal
        assert_eq!(
            lines[2],
            "INSERT INTO content (id, kotob_id, chapters_id, body) VALUES (2, 42, 1, 'first');"
        );
        assert_eq!(
            lines[3],
            "INSERT INTO content (id, kotob_id, chapters_id, body) VALUES (1, 42, 2, 'second');"
        );
        assert_eq!(lines[4], "COMMIT;");
        assert!(script.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_export_is_idempotent_when_reapplied() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_content_db(&db_path).await;

        let out = tmp.path().join("book_42.sql");
        cmd_export_sql(&db_path, 42, &out, None).await.unwrap();
        let script = std::fs::read_to_string(&out).unwrap();

        apply_script(&db_path, &script).await;
        let after_once = count_book_rows(&db_path, 42).await;
        apply_script(&db_path, &script).await;
        let after_twice = count_book_rows(&db_path, 42).await;

        assert_eq!(after_once, 2);
        assert_eq!(after_twice, after_once);
    }

    #[tokio::test]
    async fn test_export_unknown_book_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_content_db(&db_path).await;

        let out = tmp.path().join("book_9000.sql");
        let err = cmd_export_sql(&db_path, 9000, &out, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(9000)));
        assert_eq!(err.exit_code(), 3);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_export_requires_content_table() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_db(&db_path, &["CREATE TABLE kotob (id INTEGER)"]).await;

        let out = tmp.path().join("patch.sql");
        let err = cmd_export_sql(&db_path, 1, &out, None).await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_export_missing_db_file() {
        let tmp = TempDir::new().unwrap();
        let err = cmd_export_sql(&tmp.path().join("absent.db"), 1, &tmp.path().join("p.sql"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_snippet_from_book_table() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_content_db(&db_path).await;

        let out = tmp.path().join("book_42.sql");
        let meta_out = tmp.path().join("book_42.json");
        cmd_export_sql(&db_path, 42, &out, Some(&meta_out)).await.unwrap();

        let text = std::fs::read_to_string(&meta_out).unwrap();
        assert!(text.ends_with('\n'));
        let snippet: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(snippet["id"], Value::from(42));
        assert_eq!(snippet["title"], Value::from("Gardens"));
        assert_eq!(snippet["version"], Value::from("3"));
        assert_eq!(snippet["status"], Value::from("active"));
    }

    #[tokio::test]
    async fn test_snippet_defaults_without_book_row() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("books.db");
        seed_db(
            &db_path,
            &[
                "CREATE TABLE content (id INTEGER, kotob_id, chapters_id, body TEXT)",
                "INSERT INTO content VALUES (1, 5, 1, 'x')",
            ],
        )
        .await;

        let out = tmp.path().join("book_5.sql");
        let meta_out = tmp.path().join("book_5.json");
        cmd_export_sql(&db_path, 5, &out, Some(&meta_out)).await.unwrap();

        let snippet: Value =
            serde_json::from_str(&std::fs::read_to_string(&meta_out).unwrap()).unwrap();
        assert_eq!(snippet["id"], Value::from(5));
        assert_eq!(snippet["title"], Value::from(""));
        assert_eq!(snippet["status"], Value::from("active"));
    }
}
