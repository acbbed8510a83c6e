use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info};

use super::classify::{ClassifiedLine, LineClassifier};
use crate::config::LoaderConfig;
use crate::error::Result;

/// One page of layout text as delivered by the extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub lines: Vec<String>,
}

impl Page {
    pub fn new<I, S>(number: u32, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Page {
            number,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Split layout text into lines, dropping carriage returns left by CRLF output.
    pub fn from_text(number: u32, text: &str) -> Self {
        Self::new(number, text.split('\n').map(|l| l.trim_end_matches('\r')))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedLine {
    pub page_number: u32,
    pub text: String,
}

/// Receives non-blank lines that no kind accepted.
pub trait UnmatchedSink: Sync {
    fn unmatched(&self, text: &str, page_number: u32);
}

impl<F> UnmatchedSink for F
where
    F: Fn(&str, u32) + Sync,
{
    fn unmatched(&self, text: &str, page_number: u32) {
        self(text, page_number)
    }
}

pub struct Discard;

impl UnmatchedSink for Discard {
    fn unmatched(&self, _text: &str, _page_number: u32) {}
}

pub struct LogUnmatched;

impl UnmatchedSink for LogUnmatched {
    fn unmatched(&self, text: &str, page_number: u32) {
        info!(page_number, text, "no matched text");
    }
}

#[derive(Default)]
pub struct CollectUnmatched {
    lines: Mutex<Vec<UnmatchedLine>>,
}

impl CollectUnmatched {
    /// Collected lines, ordered by page since pages may be parsed in parallel.
    pub fn into_lines(self) -> Vec<UnmatchedLine> {
        let mut lines = self.lines.into_inner().unwrap_or_else(|e| e.into_inner());
        lines.sort_by_key(|l| l.page_number);
        lines
    }
}

impl UnmatchedSink for CollectUnmatched {
    fn unmatched(&self, text: &str, page_number: u32) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push(UnmatchedLine {
            page_number,
            text: text.to_string(),
        });
    }
}

/// Classifies every line of the pages inside the configured window.
#[derive(Debug, Clone)]
pub struct PageParser {
    classifier: LineClassifier,
    start_page: Option<u32>,
    end_page: Option<u32>,
}

impl PageParser {
    pub fn new(classifier: LineClassifier, start_page: Option<u32>, end_page: Option<u32>) -> Self {
        PageParser {
            classifier,
            start_page,
            end_page,
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        Ok(Self::new(
            LineClassifier::from_config(config)?,
            config.start_page,
            config.end_page,
        ))
    }

    pub fn classifier(&self) -> &LineClassifier {
        &self.classifier
    }

    pub fn in_window(&self, page_number: u32) -> bool {
        self.start_page.map_or(true, |start| page_number >= start)
            && self.end_page.map_or(true, |end| page_number <= end)
    }

    pub fn parse_page(&self, page: &Page, sink: &dyn UnmatchedSink) -> Vec<ClassifiedLine> {
        if !self.in_window(page.number) {
            return Vec::new();
        }

        let mut classified = Vec::with_capacity(page.lines.len());
        for line in &page.lines {
            match self.classifier.classify(line, page.number) {
                Some(item) => classified.push(item),
                None => {
                    if !line.trim().is_empty() && !self.classifier.is_ignored(line) {
                        sink.unmatched(line, page.number);
                    }
                }
            }
        }

        debug!(
            page_number = page.number,
            raw = page.lines.len(),
            classified = classified.len(),
            "parsed page"
        );
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineKind;

    fn parser(start_page: Option<u32>, end_page: Option<u32>) -> PageParser {
        let config = LoaderConfig {
            start_page,
            end_page,
            ..LoaderConfig::default()
        };
        PageParser::from_config(&config).unwrap()
    }

    fn sample_page(number: u32) -> Page {
        Page::new(
            number,
            [
                "                                                            FADE IN:",
                "1        INT. HOTEL - NIGHT        1",
                "         A flashlight cuts through the dark.",
                "",
                "                                      TRINITY",
                "                     Is everything in place?",
                "    (beat)",
            ],
        )
    }

    #[test]
    fn outside_window_yields_nothing() {
        let p = parser(Some(3), Some(5));
        assert!(p.parse_page(&sample_page(2), &Discard).is_empty());
        assert!(p.parse_page(&sample_page(6), &Discard).is_empty());
        assert_eq!(p.parse_page(&sample_page(3), &Discard).len(), 4);
    }

    #[test]
    fn open_window_bounds() {
        let p = parser(None, Some(1));
        assert!(p.in_window(0));
        assert!(!p.in_window(2));
        let p = parser(Some(1), None);
        assert!(!p.in_window(0));
        assert!(p.in_window(10_000));
    }

    #[test]
    fn from_config_rejects_overlapping_margins() {
        let mut config = LoaderConfig::default();
        config.margins.character.insert(21);
        assert!(PageParser::from_config(&config).is_err());
    }

    #[test]
    fn keeps_line_order() {
        let lines = parser(None, None).parse_page(&sample_page(1), &Discard);
        let kinds: Vec<_> = lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Location,
                LineKind::Description,
                LineKind::Character,
                LineKind::Dialog,
            ]
        );
        assert!(lines.iter().all(|l| l.page_number == 1));
    }

    #[test]
    fn reports_unmatched_but_not_ignored_or_blank() {
        let sink = CollectUnmatched::default();
        parser(None, None).parse_page(&sample_page(1), &sink);
        let unmatched = sink.into_lines();
        assert_eq!(
            unmatched,
            vec![UnmatchedLine {
                page_number: 1,
                text: "    (beat)".to_string(),
            }]
        );
    }

    #[test]
    fn closure_sink() {
        let count = std::sync::atomic::AtomicUsize::new(0);
        let sink = |_: &str, _: u32| {
            count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        };
        parser(None, None).parse_page(&sample_page(1), &sink);
        assert_eq!(count.into_inner(), 1);
    }

    #[test]
    fn from_text_strips_carriage_returns() {
        let page = Page::from_text(0, "a\r\n  b\r\n");
        assert_eq!(page.lines, vec!["a", "  b", ""]);
    }
}
