//! CLI commands implementation

pub mod doctor;
pub mod export;
pub mod inspect;

pub use doctor::*;
pub use export::*;
pub use inspect::*;
