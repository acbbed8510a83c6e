use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::ChunkConfig;
use crate::error::{LoaderError, Result};
use crate::parser::LineKind;

const DEFAULT_SOURCE: &str = "resources/movie-scripts/the-matrix-1999.txt";
const DEFAULT_DB_PATH: &str = "data/screenplay.sqlite";
const ENV_PREFIX: &str = "SCREENPLAY";

/// Boilerplate that shows up in page headers and footers of the calibrated script.
const DEFAULT_IGNORE_TAGS: &[&str] = &[
    "FADE IN:",
    "CONTINUED",
    "OMITTED",
    "THE MATRIX - Rev.",
    "FADE OUT.",
    "THE END",
    "(MORE)",
    "FADE TO BLACK.",
];

/// Accepted indentation per line kind.
///
/// Location margins are measured including the scene number that precedes the heading
/// (`"12      INT. ..."` has margin 8), so they live in a different coordinate space from the
/// other three kinds, whose margins are plain leading-whitespace runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginConfig {
    pub location: BTreeSet<usize>,
    pub description: BTreeSet<usize>,
    pub dialog: BTreeSet<usize>,
    pub character: BTreeSet<usize>,
}

impl Default for MarginConfig {
    fn default() -> Self {
        MarginConfig {
            location: BTreeSet::from([8, 9]),
            description: BTreeSet::from([8, 9]),
            dialog: BTreeSet::from([21, 30]),
            character: BTreeSet::from([32, 38, 39]),
        }
    }
}

impl MarginConfig {
    pub fn for_kind(&self, kind: LineKind) -> &BTreeSet<usize> {
        match kind {
            LineKind::Location => &self.location,
            LineKind::Description => &self.description,
            LineKind::Dialog => &self.dialog,
            LineKind::Character => &self.character,
        }
    }

    pub fn accepts(&self, kind: LineKind, margin: usize) -> bool {
        self.for_kind(kind).contains(&margin)
    }

    /// Whitespace-run kinds must not share a margin, otherwise the classification priority
    /// (character, description, dialog) would silently decide the kind of a line.
    pub fn validate(&self) -> Result<()> {
        let kinds = [LineKind::Character, LineKind::Description, LineKind::Dialog];
        for (i, &first) in kinds.iter().enumerate() {
            for &second in &kinds[i + 1..] {
                let shared = self.for_kind(first).intersection(self.for_kind(second)).next();
                if let Some(&margin) = shared {
                    return Err(LoaderError::OverlappingMargins {
                        margin,
                        first,
                        second,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Identifier of the source document; the layout-text reader treats it as a path.
    pub source: String,
    pub ignore_tags: Vec<String>,
    pub margins: MarginConfig,
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    /// Report non-blank lines that match no kind.
    pub show_unmatched: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            source: DEFAULT_SOURCE.to_string(),
            ignore_tags: DEFAULT_IGNORE_TAGS.iter().map(|t| t.to_string()).collect(),
            margins: MarginConfig::default(),
            // Page 0 is the title page.
            start_page: Some(1),
            end_page: None,
            show_unmatched: false,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        self.margins.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub loader: LoaderConfig,
    pub chunking: ChunkConfig,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            loader: LoaderConfig::default(),
            chunking: ChunkConfig::default(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl Settings {
    /// Layer an optional TOML file under `SCREENPLAY_*` environment variables
    /// (`SCREENPLAY_LOADER__START_PAGE=3`), then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment as the variable source when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.loader.validate()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }
}
