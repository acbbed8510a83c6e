use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::parser::{OutputUnit, UnitType};

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

const UNKNOWN_CHARACTER: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Soft limit in characters; a single oversized unit still forms its own chunk.
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub scenes: Vec<String>,
    pub characters: Vec<String>,
    pub text_types: Vec<UnitType>,
    pub page_numbers: Vec<u32>,
    pub scene_count: usize,
    pub character_count: usize,
    pub chunk_id: usize,
    pub source: String,
}

/// A retrieval document: several rendered units plus what they mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub id: String,
    pub page_content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Default)]
struct PendingChunk {
    content: String,
    scenes: BTreeSet<String>,
    characters: BTreeSet<String>,
    text_types: BTreeSet<UnitType>,
    page_numbers: BTreeSet<u32>,
}

impl PendingChunk {
    fn starting_with(content: String) -> Self {
        PendingChunk {
            content,
            ..PendingChunk::default()
        }
    }

    fn push(&mut self, unit: &OutputUnit) {
        if !self.content.is_empty() {
            self.content.push_str("\n\n");
        }
        self.content.push_str(&render_unit(unit));

        let meta = &unit.metadata;
        if let Some(location) = &meta.location {
            self.scenes.insert(location.clone());
        }
        if let Some(character) = &meta.character {
            self.characters.insert(character.clone());
        }
        self.text_types.insert(meta.unit_type);
        self.page_numbers.insert(meta.page_number);
    }

    fn finish(self, chunk_id: usize, source: &str) -> ChunkDocument {
        ChunkDocument {
            id: chunk_document_id(source, chunk_id),
            page_content: self.content,
            metadata: ChunkMetadata {
                scene_count: self.scenes.len(),
                character_count: self.characters.len(),
                scenes: self.scenes.into_iter().collect(),
                characters: self.characters.into_iter().collect(),
                text_types: self.text_types.into_iter().collect(),
                page_numbers: self.page_numbers.into_iter().collect(),
                chunk_id,
                source: source.to_string(),
            },
        }
    }
}

/// `"NEO: Whoa."` for dialog, `"[SCENE] Rain falls."` for scene descriptions.
pub fn render_unit(unit: &OutputUnit) -> String {
    match unit.metadata.unit_type {
        UnitType::Dialog => {
            let character = unit.metadata.character.as_deref().unwrap_or(UNKNOWN_CHARACTER);
            format!("{}: {}", character, unit.text)
        }
        UnitType::SceneDescription => format!("[SCENE] {}", unit.text),
    }
}

/// Pack units into overlapping chunks of roughly `chunk_size` characters.
///
/// A new chunk begins with the tail of the previous one; its metadata only covers the
/// units appended after that tail.
pub fn chunk_units(units: &[OutputUnit], config: &ChunkConfig, source: &str) -> Vec<ChunkDocument> {
    let mut chunks = Vec::new();
    let mut current = PendingChunk::default();

    for unit in units {
        let current_len = current.content.chars().count();
        if current_len > 0 && current_len + unit.text.chars().count() > config.chunk_size {
            let tail = overlap_tail(&current.content, config.overlap).to_string();
            let done = std::mem::replace(&mut current, PendingChunk::starting_with(tail));
            chunks.push(done.finish(chunks.len(), source));
        }
        current.push(unit);
    }

    if !current.content.trim().is_empty() {
        chunks.push(current.finish(chunks.len(), source));
    }
    chunks
}

/// The last `overlap` characters of `text`, cut after the first sentence end or blank line
/// so the next chunk does not start mid-sentence.
pub fn overlap_tail(text: &str, overlap: usize) -> &str {
    let len = text.chars().count();
    if len <= overlap {
        return text;
    }

    let start = text
        .char_indices()
        .nth(len - overlap)
        .map_or(text.len(), |(i, _)| i);
    let tail = &text[start..];

    if let Some(m) = SENTENCE_END_RE.find(tail) {
        return &tail[m.end()..];
    }
    if let Some(i) = tail.find("\n\n") {
        return &tail[i + 2..];
    }
    tail
}

fn chunk_document_id(source: &str, chunk_id: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(chunk_id.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}
