//! Consistency checking and patch generation for a book library described
//! in two places at once: JSON metadata documents (the distributed source
//! of truth) and an embedded SQLite content database (the runtime store).
//!
//! Three independent operations:
//! - doctor: cross-validate the metadata against itself and the database
//! - export-sql: turn one book's database rows into an idempotent SQL patch
//! - inspect-sql: statically check a patch script's transactional shape

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod ident;
pub mod meta;
pub mod reconcile;
