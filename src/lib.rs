//! Screenplay layout loader.
//!
//! Recovers scene headings, character cues, dialog and action description from
//! layout-preserving page text, using each line's indentation as the only structural signal,
//! and emits dialog and scene-description units annotated with their scene context.

pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod parser;
pub mod source;

pub use config::{LoaderConfig, MarginConfig, Settings};
pub use error::LoaderError;
pub use loader::ScriptLoader;
pub use parser::{ClassifiedLine, LineKind, OutputUnit, Page, UnitType};
pub use source::{LayoutTextSource, PageSource};
