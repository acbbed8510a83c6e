use std::path::PathBuf;

use thiserror::Error;

use crate::parser::LineKind;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("margin {margin} is configured for both {first} and {second} lines")]
    OverlappingMargins {
        margin: usize,
        first: LineKind,
        second: LineKind,
    },

    /// Location headings and character cues are single-line by construction; a run of them
    /// means the margin grammar does not fit the document.
    #[error("{count} consecutive {kind} lines at margin {margin} on page {page_number}: {texts:?}")]
    MalformedGroup {
        kind: LineKind,
        margin: usize,
        page_number: u32,
        count: usize,
        texts: Vec<String>,
    },

    #[error("failed to read page source {path:?}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("page source {0:?} contains no text")]
    EmptySource(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
