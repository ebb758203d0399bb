//! Inspect command implementation
//!
//! Static checks over a SQL patch file: the script is scanned as text,
//! never executed. Findings are advisory; once the file is readable the
//! command succeeds regardless of what it finds.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Statement tallies and warnings for one SQL script.
#[derive(Debug, Serialize)]
pub struct SqlInspection {
    pub path: PathBuf,
    pub begin_transaction: usize,
    pub commit: usize,
    pub rollback: usize,
    pub delete_content: usize,
    pub insert_content: usize,
    /// Distinct book ids targeted by content deletes, ascending.
    pub delete_book_ids: Vec<i64>,
    pub warnings: Vec<String>,
}

/// Inspect a SQL patch file.
pub fn cmd_inspect_sql(sql_path: &Path) -> Result<SqlInspection> {
    if !sql_path.exists() {
        return Err(Error::Environment(format!(
            "SQL file not found: {}",
            sql_path.display()
        )));
    }

    // Scripts come from assorted tooling; invalid UTF-8 is replaced rather
    // than rejected.
    let bytes = std::fs::read(sql_path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(inspect_text(sql_path, &text))
}

fn inspect_text(path: &Path, text: &str) -> SqlInspection {
    let begin_re = Regex::new(r"(?i)\bBEGIN\s+TRANSACTION\b").unwrap();
    let commit_re = Regex::new(r"(?i)\bCOMMIT\b").unwrap();
    let rollback_re = Regex::new(r"(?i)\bROLLBACK\b").unwrap();
    let delete_re = Regex::new(r"(?i)\bDELETE\s+FROM\s+content\b").unwrap();
    let insert_re = Regex::new(r"(?i)\bINSERT\s+INTO\s+content\b").unwrap();
    let delete_target_re =
        Regex::new(r"(?i)\bDELETE\s+FROM\s+content\s+WHERE\s+kotob_id\s*=\s*(-?\d+)").unwrap();

    let delete_book_ids: BTreeSet<i64> = delete_target_re
        .captures_iter(text)
        .filter_map(|captures| captures[1].parse().ok())
        .collect();

    let begin_transaction = begin_re.find_iter(text).count();
    let commit = commit_re.find_iter(text).count();
    let delete_content = delete_re.find_iter(text).count();
    let insert_content = insert_re.find_iter(text).count();

    let mut warnings = Vec::new();
    if insert_content > 0 && delete_content == 0 {
        warnings
            .push("INSERT exists but DELETE for content is missing (risk of duplicates).".into());
    }
    if begin_transaction == 0 || commit == 0 {
        warnings.push("transaction markers are incomplete.".into());
    }

    SqlInspection {
        path: path.to_path_buf(),
        begin_transaction,
        commit,
        rollback: rollback_re.find_iter(text).count(),
        delete_content,
        insert_content,
        delete_book_ids: delete_book_ids.into_iter().collect(),
        warnings,
    }
}

/// Print inspection results to console
pub fn print_inspection(inspection: &SqlInspection) {
    println!("== SQL Inspect ==");
    println!("File: {}", inspection.path.display());
    println!("- BEGIN TRANSACTION: {}", inspection.begin_transaction);
    println!("- COMMIT: {}", inspection.commit);
    println!("- ROLLBACK: {}", inspection.rollback);
    println!("- DELETE FROM content: {}", inspection.delete_content);
    println!("- INSERT INTO content: {}", inspection.insert_content);
    let targets = if inspection.delete_book_ids.is_empty() {
        "none".to_string()
    } else {
        inspection
            .delete_book_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("- DELETE targets (kotob_id): {targets}");

    for warning in &inspection.warnings {
        println!("Warning: {warning}");
    }
}
