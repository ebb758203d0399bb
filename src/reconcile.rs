//! Metadata/database reconciliation
//!
//! The central cross-check: every identifier space (JSON books, JSON
//! structure, JSON audio references, database books, database content
//! references) becomes a normalized set, and the report is built from
//! frequency counts and set differences. Pure and deterministic: same
//! inputs, same report, no I/O, no clock.

use crate::db::DbStats;
use crate::meta::Metadata;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Cap on ids shown for a cross-check finding.
pub const SAMPLE_LIMIT: usize = 30;
/// Cap on the "top content books" ranking shown in the report.
pub const TOP_BOOKS_LIMIT: usize = 8;

/// The full doctor report. Built fresh per invocation, never persisted.
#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub repo_root: String,
    pub db_path: String,
    pub db_found: bool,
    pub books: BooksSection,
    pub structure: StructureSection,
    pub audio: AudioSection,
    /// Raw database statistics; `None` when the database file is absent.
    pub database: Option<DbStats>,
    /// Cross-source set differences; `None` when the database file is absent.
    pub cross_check: Option<CrossCheck>,
}

#[derive(Debug, Serialize)]
pub struct BooksSection {
    pub rows: usize,
    pub unique_ids: usize,
    pub invalid_id_rows: usize,
    /// Each duplicated id once, ascending, however often it repeats.
    pub duplicate_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct StructureSection {
    pub schema: Value,
    pub data_version: Value,
    pub categories: usize,
    pub chapters: usize,
    pub duplicate_category_ids: Vec<i64>,
    pub duplicate_chapter_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct AudioSection {
    pub rows: usize,
    /// Distinct (book, chapter, lang, url) keys that occur more than once.
    pub duplicate_entries: usize,
    pub missing_required: usize,
    /// Rows whose book reference is not a known JSON book id.
    pub unknown_book_refs: usize,
    /// Rows whose chapter reference is not a known JSON chapter id. A single
    /// row may count here and in `unknown_book_refs`.
    pub unknown_chapter_refs: usize,
}

#[derive(Debug, Serialize)]
pub struct CrossCheck {
    /// JSON book ids with no row in the database book table.
    pub missing_in_db: Vec<i64>,
    /// Database book ids with no JSON metadata row.
    pub local_only: Vec<i64>,
    /// Book ids referenced from content rows with no JSON metadata row.
    pub content_without_metadata: Vec<i64>,
}

/// Build the report from loader output and inspector output.
pub fn build_report(
    repo_root: &Path,
    db_path: &Path,
    meta: &Metadata,
    db: Option<DbStats>,
) -> DoctorReport {
    let book_id_set: BTreeSet<i64> = meta.books.ids.iter().copied().collect();
    let chapter_id_set: BTreeSet<i64> = meta.structure.chapter_ids.iter().copied().collect();

    let books = BooksSection {
        rows: meta.books.row_count,
        unique_ids: book_id_set.len(),
        invalid_id_rows: meta.books.invalid_id_rows,
        duplicate_ids: duplicates(&meta.books.ids),
    };

    let structure = StructureSection {
        schema: meta.structure.schema.clone(),
        data_version: meta.structure.data_version.clone(),
        categories: meta.structure.category_count,
        chapters: meta.structure.chapter_count,
        duplicate_category_ids: duplicates(&meta.structure.category_ids),
        duplicate_chapter_ids: duplicates(&meta.structure.chapter_ids),
    };

    let mut key_counts: HashMap<&crate::meta::AudioRow, usize> = HashMap::new();
    let mut unknown_book_refs = 0usize;
    let mut unknown_chapter_refs = 0usize;
    for row in &meta.audio.rows {
        *key_counts.entry(row).or_insert(0) += 1;
        if let Some(book_id) = row.book_id {
            if !book_id_set.contains(&book_id) {
                unknown_book_refs += 1;
            }
        }
        if !chapter_id_set.contains(&row.chapter_id) {
            unknown_chapter_refs += 1;
        }
    }
    let audio = AudioSection {
        rows: meta.audio.row_count,
        duplicate_entries: key_counts.values().filter(|count| **count > 1).count(),
        missing_required: meta.audio.missing_required,
        unknown_book_refs,
        unknown_chapter_refs,
    };

    let cross_check = db.as_ref().map(|stats| {
        let db_book_set: BTreeSet<i64> = stats.db_book_ids.iter().copied().collect();
        let content_book_set: BTreeSet<i64> = stats.content_book_ids.iter().copied().collect();
        CrossCheck {
            missing_in_db: book_id_set.difference(&db_book_set).copied().collect(),
            local_only: db_book_set.difference(&book_id_set).copied().collect(),
            content_without_metadata: content_book_set
                .difference(&book_id_set)
                .copied()
                .collect(),
        }
    });

    DoctorReport {
        repo_root: repo_root.display().to_string(),
        db_path: db_path.display().to_string(),
        db_found: db.is_some(),
        books,
        structure,
        audio,
        database: db,
        cross_check,
    }
}

/// Ids occurring at least twice, each reported once, ascending. Input order
/// does not matter.
fn duplicates(ids: &[i64]) -> Vec<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for id in ids {
        *counts.entry(*id).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect()
}
