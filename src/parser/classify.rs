use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{LoaderConfig, MarginConfig};
use crate::error::Result;

/// Scene number, gap, heading, gap, scene number: `"12      INT. LOBBY - DAY      12"`.
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]?\d+\s{2,})(.*?)(\s{2,}[A-Z]?\d+)$").unwrap());
static INDENTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s{2,})(.*)$").unwrap());
static PARENTHETICAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Location,
    Description,
    Character,
    Dialog,
}

impl LineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Location => "location",
            LineKind::Description => "description",
            LineKind::Character => "character",
            LineKind::Dialog => "dialog",
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of layout text after classification. `margin` is always a member of the margin
/// set configured for `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedLine {
    pub page_number: u32,
    pub kind: LineKind,
    pub text: String,
    pub margin: usize,
}

impl ClassifiedLine {
    pub fn new(page_number: u32, kind: LineKind, text: impl Into<String>, margin: usize) -> Self {
        ClassifiedLine {
            page_number,
            kind,
            text: text.into(),
            margin,
        }
    }
}

/// Decides the kind of a raw layout line from its indentation alone.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    margins: MarginConfig,
    ignore_tags: Vec<String>,
}

impl LineClassifier {
    /// Fails when two whitespace-run kinds share a margin.
    pub fn new(margins: MarginConfig, ignore_tags: Vec<String>) -> Result<Self> {
        margins.validate()?;
        Ok(LineClassifier {
            margins,
            ignore_tags,
        })
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        Self::new(config.margins.clone(), config.ignore_tags.clone())
    }

    pub fn margins(&self) -> &MarginConfig {
        &self.margins
    }

    /// Page furniture such as `CONTINUED` or `(MORE)`.
    pub fn is_ignored(&self, line: &str) -> bool {
        self.ignore_tags.iter().any(|tag| line.contains(tag.as_str()))
    }

    /// Tests run in priority order: location, character, description, dialog. Lines that
    /// match none of them are noise and yield `None`.
    pub fn classify(&self, line: &str, page_number: u32) -> Option<ClassifiedLine> {
        if self.is_ignored(line) {
            return None;
        }

        let heading = if is_upper(line) {
            self.location_text(line).or_else(|| self.character_text(line))
        } else {
            None
        };
        let (kind, text, margin) = heading
            .or_else(|| self.indented_text(line, LineKind::Description))
            .or_else(|| self.indented_text(line, LineKind::Dialog))?;

        Some(ClassifiedLine::new(page_number, kind, text, margin))
    }

    fn location_text(&self, line: &str) -> Option<(LineKind, String, usize)> {
        let caps = LOCATION_RE.captures(line)?;
        let margin = caps[1].chars().count();
        if !self.margins.accepts(LineKind::Location, margin) {
            return None;
        }
        let text = non_empty(caps[2].trim())?;
        Some((LineKind::Location, text, margin))
    }

    fn character_text(&self, line: &str) -> Option<(LineKind, String, usize)> {
        let (margin, rest) = self.indentation(line, LineKind::Character)?;
        let text = non_empty(PARENTHETICAL_RE.replace(rest, "").trim())?;
        Some((LineKind::Character, text, margin))
    }

    fn indented_text(&self, line: &str, kind: LineKind) -> Option<(LineKind, String, usize)> {
        let (margin, rest) = self.indentation(line, kind)?;
        let text = non_empty(rest.trim())?;
        Some((kind, text, margin))
    }

    /// Leading whitespace run and the remainder, if the run length is accepted for `kind`.
    fn indentation<'a>(&self, line: &'a str, kind: LineKind) -> Option<(usize, &'a str)> {
        let caps = INDENTED_RE.captures(line)?;
        let margin = caps[1].chars().count();
        if !self.margins.accepts(kind, margin) {
            return None;
        }
        Some((margin, caps.get(2).map_or("", |m| m.as_str())))
    }
}

/// At least one cased character and no lower-case ones.
fn is_upper(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
