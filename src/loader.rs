use indicatif::ProgressBar;
use tracing::info;

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::parser::{Discard, LogUnmatched, OutputUnit, ScriptParser, UnmatchedSink};
use crate::source::{LayoutTextSource, PageSource};

/// Turns a screenplay into scene-description and dialog units.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    config: LoaderConfig,
    parser: ScriptParser,
}

impl ScriptLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let parser = ScriptParser::new(&config)?;
        Ok(ScriptLoader { config, parser })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the configured source as layout text.
    pub fn load(&self) -> Result<Vec<OutputUnit>> {
        self.load_from(&LayoutTextSource::new(&self.config.source))
    }

    pub fn load_from<S: PageSource + ?Sized>(&self, source: &S) -> Result<Vec<OutputUnit>> {
        self.load_with(source, self.unmatched_sink(), &ProgressBar::hidden())
    }

    /// Full control over where unmatched lines go and how page progress is shown.
    pub fn load_with<S: PageSource + ?Sized>(
        &self,
        source: &S,
        sink: &dyn UnmatchedSink,
        progress: &ProgressBar,
    ) -> Result<Vec<OutputUnit>> {
        let pages = source.pages()?;
        progress.set_length(pages.len() as u64);
        let units = self.parser.parse_with_progress(&pages, sink, progress)?;
        progress.finish_and_clear();
        info!(
            source = %self.config.source,
            pages = pages.len(),
            units = units.len(),
            "loaded script"
        );
        Ok(units)
    }

    /// Logging sink when `show_unmatched` is set, otherwise one that drops everything.
    pub fn unmatched_sink(&self) -> &'static dyn UnmatchedSink {
        if self.config.show_unmatched {
            &LogUnmatched
        } else {
            &Discard
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderError;
    use crate::parser::{scene_description_id, CollectUnmatched, Page, UnitType};

    const FIXTURE: &str = "tests/fixtures/matrix_excerpt.txt";

    fn loader() -> ScriptLoader {
        ScriptLoader::new(LoaderConfig {
            source: FIXTURE.to_string(),
            ..LoaderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn loads_fixture_script() {
        let units = loader().load().unwrap();
        assert_eq!(units.len(), 8);

        let first = &units[0];
        assert_eq!(first.metadata.unit_type, UnitType::SceneDescription);
        assert_eq!(
            first.text,
            "The screen fills with green, cascading computer code. \
             A flashlight cuts through the dark."
        );
        assert_eq!(
            first.metadata.location.as_deref(),
            Some("INT. HEART O' THE CITY HOTEL - ROOM 303 - NIGHT")
        );
        assert_eq!(first.metadata.sequence_index, 2);
        assert_eq!(first.metadata.page_number, 1);

        let lines: Vec<_> = units.iter().map(|u| u.metadata.sequence_index).collect();
        assert_eq!(lines, vec![2, 4, 6, 8, 10, 12, 14, 15]);
    }

    #[test]
    fn fixture_dialog_attribution() {
        let units = loader().load().unwrap();
        let dialog: Vec<_> = units
            .iter()
            .filter(|u| u.metadata.unit_type == UnitType::Dialog)
            .map(|u| (u.metadata.character.as_deref().unwrap(), u.text.as_str()))
            .collect();
        assert_eq!(
            dialog,
            vec![
                ("TRINITY", "Is everything in place?"),
                ("CYPHER", "You weren't supposed to relieve me."),
                ("AGENT SMITH", "Lieutenant, you were given specific orders."),
                ("LIEUTENANT", "I'm just doing my job."),
                ("TRINITY", "NO!"),
            ]
        );
        for unit in &units[4..] {
            assert_eq!(unit.metadata.location.as_deref(), Some("EXT. HOTEL - NIGHT"));
        }
    }

    #[test]
    fn repeated_description_shares_scene_id() {
        let units = loader().load().unwrap();
        let cops = scene_description_id("Cops pour out of the cars.");
        assert_eq!(units[3].metadata.scene_description_id.as_deref(), Some(cops.as_str()));
        assert_eq!(units[7].metadata.scene_description_id, units[3].metadata.scene_description_id);
        assert_eq!(units[7].metadata.page_number, 3);
        assert_ne!(units[0].metadata.scene_description_id, units[3].metadata.scene_description_id);
    }

    #[test]
    fn title_page_skipped_by_default_window() {
        let units = loader().load().unwrap();
        assert!(units.iter().all(|u| u.text != "THE MATRIX"));

        let open = ScriptLoader::new(LoaderConfig {
            source: FIXTURE.to_string(),
            start_page: None,
            ..LoaderConfig::default()
        })
        .unwrap();
        let units = open.load().unwrap();
        assert_eq!(units[0].text, "THE MATRIX");
        assert_eq!(units[0].metadata.character, None);
    }

    #[test]
    fn unmatched_lines_reach_the_sink() {
        let sink = CollectUnmatched::default();
        let source = LayoutTextSource::new(FIXTURE);
        loader()
            .load_with(&source, &sink, &ProgressBar::hidden())
            .unwrap();
        let texts: Vec<_> = sink
            .into_lines()
            .into_iter()
            .map(|l| (l.page_number, l.text.trim().to_string()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (2, "2.".to_string()),
                (2, "(beat)".to_string()),
                (3, "3.".to_string()),
            ]
        );
    }

    #[test]
    fn in_memory_source() {
        let pages = vec![Page::new(1, ["         Neo sleeps."])];
        let units = loader().load_from(&pages).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "Neo sleeps.");
    }

    #[test]
    fn source_errors_propagate() {
        let missing = ScriptLoader::new(LoaderConfig {
            source: "tests/fixtures/absent.txt".to_string(),
            ..LoaderConfig::default()
        })
        .unwrap();
        assert!(matches!(missing.load(), Err(LoaderError::Source { .. })));
    }
}
