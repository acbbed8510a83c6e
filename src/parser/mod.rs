pub mod aggregate;
pub mod classify;
pub mod context;
pub mod page;

pub use aggregate::aggregate;
pub use classify::{ClassifiedLine, LineClassifier, LineKind};
pub use context::{
    contextualize, scene_description_id, ContextState, OutputUnit, UnitMetadata, UnitType,
};
pub use page::{
    CollectUnmatched, Discard, LogUnmatched, Page, PageParser, UnmatchedLine, UnmatchedSink,
};

use indicatif::ProgressBar;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::Result;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Four-pass pipeline: layout lines → classified lines → merged lines → output units.
#[derive(Debug, Clone)]
pub struct ScriptParser {
    pages: PageParser,
}

impl ScriptParser {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        Ok(ScriptParser {
            pages: PageParser::from_config(config)?,
        })
    }

    pub fn page_parser(&self) -> &PageParser {
        &self.pages
    }

    /// Classify every page and concatenate the results in page-number order.
    pub fn classify_pages(
        &self,
        pages: &[Page],
        sink: &dyn UnmatchedSink,
        progress: &ProgressBar,
    ) -> Vec<ClassifiedLine> {
        let mut parsed = self.parse_each(pages, sink, progress);
        parsed.sort_by_key(|(number, _)| *number);
        parsed.into_iter().flat_map(|(_, lines)| lines).collect()
    }

    pub fn parse(&self, pages: &[Page], sink: &dyn UnmatchedSink) -> Result<Vec<OutputUnit>> {
        self.parse_with_progress(pages, sink, &ProgressBar::hidden())
    }

    /// Same as [`ScriptParser::parse`], ticking `progress` once per page.
    pub fn parse_with_progress(
        &self,
        pages: &[Page],
        sink: &dyn UnmatchedSink,
        progress: &ProgressBar,
    ) -> Result<Vec<OutputUnit>> {
        let classified = self.classify_pages(pages, sink, progress);
        let merged = aggregate(classified)?;
        debug!(merged = merged.len(), "aggregated lines");
        Ok(contextualize(merged))
    }

    #[cfg(feature = "rayon")]
    fn parse_each(
        &self,
        pages: &[Page],
        sink: &dyn UnmatchedSink,
        progress: &ProgressBar,
    ) -> Vec<(u32, Vec<ClassifiedLine>)> {
        pages
            .par_iter()
            .map(|page| {
                let lines = self.pages.parse_page(page, sink);
                progress.inc(1);
                (page.number, lines)
            })
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn parse_each(
        &self,
        pages: &[Page],
        sink: &dyn UnmatchedSink,
        progress: &ProgressBar,
    ) -> Vec<(u32, Vec<ClassifiedLine>)> {
        pages
            .iter()
            .map(|page| {
                let lines = self.pages.parse_page(page, sink);
                progress.inc(1);
                (page.number, lines)
            })
            .collect()
    }
}
