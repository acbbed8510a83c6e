use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LoaderError, Result};
use crate::parser::Page;

const FORM_FEED: char = '\x0c';

/// Supplies the pages of one document as layout-preserving text lines.
pub trait PageSource {
    fn pages(&self) -> Result<Vec<Page>>;
}

impl PageSource for [Page] {
    fn pages(&self) -> Result<Vec<Page>> {
        Ok(self.to_vec())
    }
}

impl PageSource for Vec<Page> {
    fn pages(&self) -> Result<Vec<Page>> {
        Ok(self.clone())
    }
}

/// Text produced by `pdftotext -layout`: pages separated by form feeds, numbered from 0.
#[derive(Debug, Clone)]
pub struct LayoutTextSource {
    path: PathBuf,
}

impl LayoutTextSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LayoutTextSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for LayoutTextSource {
    fn pages(&self) -> Result<Vec<Page>> {
        let text = fs::read_to_string(&self.path).map_err(|source| LoaderError::Source {
            path: self.path.clone(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(LoaderError::EmptySource(self.path.clone()));
        }

        let pages: Vec<Page> = split_pages(&text)
            .enumerate()
            .map(|(i, page)| Page::from_text(i as u32, page))
            .collect();
        info!(path = ?self.path, pages = pages.len(), "read layout text");
        Ok(pages)
    }
}

fn split_pages(text: &str) -> impl Iterator<Item = &str> {
    // pdftotext terminates every page, including the last, with a form feed.
    text.strip_suffix(FORM_FEED)
        .or_else(|| text.strip_suffix("\x0c\n"))
        .unwrap_or(text)
        .split(FORM_FEED)
}
