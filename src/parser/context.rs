use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::classify::{ClassifiedLine, LineKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    SceneDescription,
    Dialog,
}

impl UnitType {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::SceneDescription => "scene_description",
            UnitType::Dialog => "dialog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetadata {
    #[serde(rename = "text_type")]
    pub unit_type: UnitType,
    pub scene_description_id: Option<String>,
    pub character: Option<String>,
    pub location: Option<String>,
    pub page_number: u32,
    /// 1-based position among all merged lines, including headings and cues.
    #[serde(rename = "line_number")]
    pub sequence_index: usize,
}

/// A finished scene description or dialog with the context it appeared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputUnit {
    pub text: String,
    pub metadata: UnitMetadata,
}

/// Content hash of a scene description. Identical text anywhere in the script yields the
/// same id, so two scenes described with the same words share one.
pub fn scene_description_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Running scene context while walking the merged lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextState {
    pub location: Option<String>,
    pub scene_description_id: Option<String>,
    pub character: Option<String>,
}

impl ContextState {
    pub fn step(self, sequence_index: usize, line: ClassifiedLine) -> (Self, Option<OutputUnit>) {
        match line.kind {
            LineKind::Location => (
                ContextState {
                    location: Some(line.text),
                    ..self
                },
                None,
            ),
            LineKind::Character => (
                ContextState {
                    character: Some(line.text),
                    ..self
                },
                None,
            ),
            LineKind::Description => {
                let state = ContextState {
                    scene_description_id: Some(scene_description_id(&line.text)),
                    ..self
                };
                let unit = state.unit(UnitType::SceneDescription, sequence_index, line);
                (state, Some(unit))
            }
            LineKind::Dialog => {
                let unit = self.unit(UnitType::Dialog, sequence_index, line);
                (self, Some(unit))
            }
        }
    }

    fn unit(&self, unit_type: UnitType, sequence_index: usize, line: ClassifiedLine) -> OutputUnit {
        let character = match unit_type {
            UnitType::SceneDescription => None,
            UnitType::Dialog => self.character.clone(),
        };
        OutputUnit {
            text: line.text,
            metadata: UnitMetadata {
                unit_type,
                scene_description_id: self.scene_description_id.clone(),
                character,
                location: self.location.clone(),
                page_number: line.page_number,
                sequence_index,
            },
        }
    }
}

/// Fold the transition over merged lines, numbering them from 1.
pub fn contextualize(lines: Vec<ClassifiedLine>) -> Vec<OutputUnit> {
    lines
        .into_iter()
        .zip(1..)
        .scan(ContextState::default(), |state, (line, index)| {
            let (next, unit) = std::mem::take(state).step(index, line);
            *state = next;
            Some(unit)
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(page: u32, kind: LineKind, text: &str, margin: usize) -> ClassifiedLine {
        ClassifiedLine::new(page, kind, text, margin)
    }

    #[test]
    fn dialog_carries_character_and_location() {
        let units = contextualize(vec![
            line(1, LineKind::Location, "THE MATRIX", 9),
            line(1, LineKind::Character, "NEO", 38),
            line(1, LineKind::Dialog, "I know kung fu", 21),
        ]);
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.text, "I know kung fu");
        assert_eq!(unit.metadata.unit_type, UnitType::Dialog);
        assert_eq!(unit.metadata.character.as_deref(), Some("NEO"));
        assert_eq!(unit.metadata.location.as_deref(), Some("THE MATRIX"));
        assert_eq!(unit.metadata.scene_description_id, None);
        assert_eq!(unit.metadata.sequence_index, 3);
    }

    #[test]
    fn description_sets_scene_id_without_character() {
        let units = contextualize(vec![
            line(1, LineKind::Character, "NEO", 38),
            line(1, LineKind::Description, "Neo wakes up.", 9),
            line(1, LineKind::Dialog, "Whoa.", 21),
        ]);
        assert_eq!(units.len(), 2);
        let scene = &units[0];
        assert_eq!(scene.metadata.unit_type, UnitType::SceneDescription);
        assert_eq!(scene.metadata.character, None);
        assert_eq!(scene.metadata.location, None);
        let id = scene.metadata.scene_description_id.clone();
        assert_eq!(id, Some(scene_description_id("Neo wakes up.")));
        assert_eq!(units[1].metadata.scene_description_id, id);
        assert_eq!(units[1].metadata.character.as_deref(), Some("NEO"));
    }

    #[test]
    fn sequence_index_counts_every_line() {
        let units = contextualize(vec![
            line(1, LineKind::Location, "ROOF", 9),
            line(1, LineKind::Description, "Wind.", 9),
            line(1, LineKind::Character, "TRINITY", 38),
            line(2, LineKind::Dialog, "Now.", 21),
        ]);
        let indices: Vec<_> = units.iter().map(|u| u.metadata.sequence_index).collect();
        assert_eq!(indices, vec![2, 4]);
        assert_eq!(units[1].metadata.page_number, 2);
    }

    #[test]
    fn context_follows_most_recent_values() {
        let units = contextualize(vec![
            line(1, LineKind::Location, "HOTEL", 9),
            line(1, LineKind::Character, "TRINITY", 38),
            line(1, LineKind::Dialog, "One.", 21),
            line(1, LineKind::Location, "ROOF", 9),
            line(1, LineKind::Character, "AGENT SMITH", 32),
            line(1, LineKind::Dialog, "Two.", 21),
        ]);
        assert_eq!(units[0].metadata.location.as_deref(), Some("HOTEL"));
        assert_eq!(units[0].metadata.character.as_deref(), Some("TRINITY"));
        assert_eq!(units[1].metadata.location.as_deref(), Some("ROOF"));
        assert_eq!(units[1].metadata.character.as_deref(), Some("AGENT SMITH"));
    }

    #[test]
    fn step_is_a_pure_transition() {
        let start = ContextState::default();
        let (state, unit) = start.clone().step(1, line(1, LineKind::Location, "HOTEL", 9));
        assert!(unit.is_none());
        assert_eq!(state.location.as_deref(), Some("HOTEL"));
        assert_eq!(start, ContextState::default());

        let (again, unit) = state.clone().step(2, line(1, LineKind::Dialog, "Hi.", 21));
        assert_eq!(again, state);
        assert_eq!(unit.unwrap().metadata.location.as_deref(), Some("HOTEL"));
    }

    #[test]
    fn scene_ids_are_content_hashes() {
        assert_eq!(scene_description_id("Rain."), scene_description_id("Rain."));
        assert_ne!(scene_description_id("Rain."), scene_description_id("Snow."));
        assert_eq!(scene_description_id("Rain.").len(), 64);
    }

    #[test]
    fn metadata_serializes_with_loader_field_names() {
        let units = contextualize(vec![line(4, LineKind::Dialog, "Hello.", 21)]);
        let json = serde_json::to_value(&units[0]).unwrap();
        assert_eq!(json["text"], "Hello.");
        assert_eq!(json["metadata"]["text_type"], "dialog");
        assert_eq!(json["metadata"]["line_number"], 1);
        assert_eq!(json["metadata"]["page_number"], 4);
        assert!(json["metadata"]["character"].is_null());
        assert!(json["metadata"]["scene_description_id"].is_null());
    }
}
