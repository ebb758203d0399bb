//! Metadata document loading
//!
//! Reads the three JSON documents that describe the library:
//! - books (top-level array)
//! - narrated audio (top-level array)
//! - structure: categories and chapters (top-level object)
//!
//! Loading is fail-fast on missing files and malformed top-level shapes;
//! anything wrong with an individual row is tallied, never fatal.

use crate::config::RepoPaths;
use crate::error::{Error, Result};
use crate::ident;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Everything the reconciliation engine needs from the JSON side.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub books: BooksMeta,
    pub structure: StructureMeta,
    pub audio: AudioMeta,
}

/// Extracted book id information.
#[derive(Debug, Clone)]
pub struct BooksMeta {
    pub row_count: usize,
    /// Ids that parse as integers, in document order, duplicates included.
    pub ids: Vec<i64>,
    /// Rows whose id does not parse (non-object rows count here too).
    pub invalid_id_rows: usize,
}

/// Extracted structure document information.
#[derive(Debug, Clone)]
pub struct StructureMeta {
    pub schema: Value,
    pub data_version: Value,
    pub category_count: usize,
    pub chapter_count: usize,
    pub category_ids: Vec<i64>,
    pub chapter_ids: Vec<i64>,
}

/// Extracted audio rows plus the tally of rows missing required fields.
#[derive(Debug, Clone)]
pub struct AudioMeta {
    pub row_count: usize,
    pub rows: Vec<AudioRow>,
    /// Rows that are not objects, lack a chapter id, or lack a url.
    pub missing_required: usize,
}

/// One well-formed audio row. A book reference is optional; a chapter id and
/// a non-empty url are required for the row to count at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioRow {
    pub book_id: Option<i64>,
    pub chapter_id: i64,
    pub lang: String,
    pub url: String,
}

/// Load and validate all three metadata documents.
pub fn load(paths: &RepoPaths) -> Result<Metadata> {
    let books_path = paths.books();
    let audio_path = paths.audio();
    let structure_path = paths.structure();

    let missing: Vec<String> = [&books_path, &audio_path, &structure_path]
        .iter()
        .filter(|path| !path.exists())
        .map(|path| path.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Environment(format!(
            "required metadata files are missing: {}",
            missing.join(", ")
        )));
    }

    let books_data = read_document(&books_path)?;
    let audio_data = read_document(&audio_path)?;
    let structure_data = read_document(&structure_path)?;

    let Value::Array(books_data) = books_data else {
        return Err(Error::Shape(format!(
            "{} must be a JSON array",
            books_path.display()
        )));
    };
    let Value::Array(audio_data) = audio_data else {
        return Err(Error::Shape(format!(
            "{} must be a JSON array",
            audio_path.display()
        )));
    };
    let Value::Object(structure_data) = structure_data else {
        return Err(Error::Shape(format!(
            "{} must be a JSON object",
            structure_path.display()
        )));
    };

    let books = extract_books(&books_data);
    let structure = extract_structure(&structure_data);
    let audio = extract_audio(&audio_data);

    debug!(
        books = books.row_count,
        audio = audio.row_count,
        categories = structure.category_count,
        chapters = structure.chapter_count,
        "loaded metadata documents"
    );

    Ok(Metadata {
        books,
        structure,
        audio,
    })
}

fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Shape(format!("{} is not valid JSON: {e}", path.display())))
}

fn extract_books(rows: &[Value]) -> BooksMeta {
    let raw_ids: Vec<Option<i64>> = rows
        .iter()
        .map(|row| {
            row.as_object()
                .and_then(|map| map.get("id"))
                .and_then(ident::as_int)
        })
        .collect();
    BooksMeta {
        row_count: rows.len(),
        ids: raw_ids.iter().flatten().copied().collect(),
        invalid_id_rows: raw_ids.iter().filter(|id| id.is_none()).count(),
    }
}

fn extract_structure(doc: &Map<String, Value>) -> StructureMeta {
    let categories = collection(doc, "categories");
    let chapters = collection(doc, "chapters");
    StructureMeta {
        schema: doc.get("schema").cloned().unwrap_or(Value::Null),
        data_version: doc.get("data_version").cloned().unwrap_or(Value::Null),
        category_count: categories.len(),
        chapter_count: chapters.len(),
        category_ids: collection_ids(categories),
        chapter_ids: collection_ids(chapters),
    }
}

/// A structure sub-collection; anything that is not an array reads as empty.
fn collection<'a>(doc: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn collection_ids(rows: &[Value]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| {
            row.as_object()
                .and_then(|map| map.get("id"))
                .and_then(ident::as_int)
        })
        .collect()
}

fn extract_audio(rows: &[Value]) -> AudioMeta {
    let mut extracted = Vec::new();
    let mut missing_required = 0usize;

    for row in rows {
        let Some(map) = row.as_object() else {
            missing_required += 1;
            continue;
        };

        let book_id =
            alias(map, &["kotob_id", "book_id", "kotobId"]).and_then(ident::normalize_book_id);
        let chapter_id =
            alias(map, &["chapters_id", "chapter_id", "chapterId"]).and_then(ident::as_int);
        let lang = alias(map, &["lang", "language"])
            .map(text_of)
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let url = alias(map, &["url", "audio_url", "download_url"])
            .map(text_of)
            .unwrap_or_default()
            .trim()
            .to_string();

        let Some(chapter_id) = chapter_id else {
            missing_required += 1;
            continue;
        };
        if url.is_empty() {
            missing_required += 1;
            continue;
        }

        extracted.push(AudioRow {
            book_id,
            chapter_id,
            lang,
            url,
        });
    }

    AudioMeta {
        row_count: rows.len(),
        rows: extracted,
        missing_required,
    }
}

/// First alias whose value is present and non-empty. Empty strings and zero
/// values fall through to the next alias.
fn alias<'a>(row: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .find(|value| !ident::is_falsy(value))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
