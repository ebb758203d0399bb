//! Doctor command implementation

use crate::config::RepoPaths;
use crate::db::ContentDb;
use crate::error::Result;
use crate::meta;
use crate::reconcile::{build_report, DoctorReport, SAMPLE_LIMIT, TOP_BOOKS_LIMIT};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Run the full consistency check.
///
/// A missing or malformed metadata document aborts the whole report; a
/// missing database degrades to metadata-only checks.
pub async fn cmd_doctor(paths: &RepoPaths, db_path: &Path) -> Result<DoctorReport> {
    info!("Checking metadata under {:?} against {:?}", paths.root(), db_path);

    let metadata = meta::load(paths)?;

    let stats = if db_path.exists() {
        let db = ContentDb::open_read_only(db_path).await?;
        let stats = db.inspect().await?;
        db.close().await;
        Some(stats)
    } else {
        info!("Database {:?} not found, reporting metadata only", db_path);
        None
    };

    Ok(build_report(paths.root(), db_path, &metadata, stats))
}

/// Print the report to stdout.
pub fn print_doctor_report(report: &DoctorReport) {
    println!("== Library Data Doctor ==");
    println!("Repo: {}", report.repo_root);
    println!(
        "DB:   {} {}",
        report.db_path,
        if report.db_found { "(found)" } else { "(missing)" }
    );
    println!();

    println!("[Books Metadata]");
    println!("- rows: {}", report.books.rows);
    println!("- unique IDs: {}", report.books.unique_ids);
    println!("- rows with invalid ID: {}", report.books.invalid_id_rows);
    println!(
        "- duplicate IDs: {}{}",
        report.books.duplicate_ids.len(),
        id_suffix(&report.books.duplicate_ids)
    );
    println!();

    println!("[Structure Metadata]");
    println!("- schema: {}", scalar_text(&report.structure.schema));
    println!("- data_version: {}", scalar_text(&report.structure.data_version));
    println!(
        "- categories: {} (dup IDs: {})",
        report.structure.categories,
        report.structure.duplicate_category_ids.len()
    );
    println!(
        "- chapters: {} (dup IDs: {})",
        report.structure.chapters,
        report.structure.duplicate_chapter_ids.len()
    );
    println!();

    println!("[Audio Metadata]");
    println!("- rows: {}", report.audio.rows);
    println!(
        "- duplicate key rows (book+chapter+lang+url): {}",
        report.audio.duplicate_entries
    );
    println!(
        "- rows missing required fields (chapter/url): {}",
        report.audio.missing_required
    );
    println!(
        "- rows referencing unknown book IDs: {}",
        report.audio.unknown_book_refs
    );
    println!(
        "- rows referencing unknown chapter IDs: {}",
        report.audio.unknown_chapter_refs
    );
    println!();

    if let Some(stats) = &report.database {
        println!("[SQLite]");
        println!("- kotob rows: {}", stats.kotob_count);
        println!("- content rows: {}", stats.content_count);
        println!("- content_audio rows: {}", stats.content_audio_count);
        println!("- categories rows: {}", stats.categories_count);
        println!("- chapters rows: {}", stats.chapters_count);
        println!(
            "- content rows with missing/invalid kotob_id: {}",
            stats.bookless_content_rows
        );
        println!(
            "- duplicate content pairs (chapters_id+kotob_id): {}",
            stats.dup_content_pairs
        );
        println!(
            "- content rows with unknown kotob_id: {}",
            stats.orphan_content_books
        );
        println!(
            "- content rows with unknown chapter_id: {}",
            stats.orphan_content_chapters
        );
        if !stats.content_rows_by_book.is_empty() {
            let top: Vec<String> = stats
                .content_rows_by_book
                .iter()
                .take(TOP_BOOKS_LIMIT)
                .map(|(book_id, count)| format!("{book_id}:{count}"))
                .collect();
            println!("- top content books (book_id:rows): {}", top.join(", "));
        }
        println!();
    }

    if let Some(cross) = &report.cross_check {
        println!("[Cross-check]");
        print_cross_line("metadata books missing in DB.kotob", &cross.missing_in_db);
        print_cross_line("local DB books not in metadata", &cross.local_only);
        print_cross_line(
            "content books not in metadata",
            &cross.content_without_metadata,
        );
        println!();
    }

    println!("[Actionable]");
    println!("1) For local-only books, export a SQL patch and add a metadata row before distributing.");
    println!("2) Keep book IDs stable; never reuse an old ID for another book.");
    println!("3) Keep one source of truth for structure IDs (chapters/categories) and update via JSON upsert.");
    println!("4) For SQL book updates, use DELETE by kotob_id + INSERT to avoid duplicates.");
}

fn print_cross_line(label: &str, ids: &[i64]) {
    println!("- {}: {}", label, ids.len());
    if !ids.is_empty() {
        let sample: Vec<String> = ids.iter().take(SAMPLE_LIMIT).map(i64::to_string).collect();
        println!("  IDs: {}", sample.join(", "));
    }
}

fn id_suffix(ids: &[i64]) -> String {
    if ids.is_empty() {
        String::new()
    } else {
        let listed: Vec<String> = ids.iter().map(i64::to_string).collect();
        format!(" -> {}", listed.join(", "))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
