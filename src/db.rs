use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::chunk::ChunkDocument;
use crate::parser::OutputUnit;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS units (
            id                   INTEGER PRIMARY KEY,
            source               TEXT NOT NULL,
            line_number          INTEGER NOT NULL,
            page_number          INTEGER NOT NULL,
            text_type            TEXT NOT NULL CHECK(text_type IN ('scene_description','dialog')),
            text                 TEXT NOT NULL,
            scene_description_id TEXT,
            character            TEXT,
            location             TEXT,
            created_at           TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(source, line_number)
        );
        CREATE INDEX IF NOT EXISTS idx_units_character ON units(character);
        CREATE INDEX IF NOT EXISTS idx_units_scene ON units(scene_description_id);

        CREATE TABLE IF NOT EXISTS chunks (
            id           TEXT PRIMARY KEY,
            source       TEXT NOT NULL,
            chunk_id     INTEGER NOT NULL,
            content      TEXT NOT NULL,
            metadata     TEXT NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
        ",
    )?;
    Ok(())
}

/// Replace the stored units of `source`; returns rows written.
pub fn save_units(conn: &Connection, source: &str, units: &[OutputUnit]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM units WHERE source = ?1", params![source])?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO units
                (source, line_number, page_number, text_type, text,
                 scene_description_id, character, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for unit in units {
            let m = &unit.metadata;
            count += stmt.execute(params![
                source,
                m.sequence_index as i64,
                m.page_number,
                m.unit_type.as_str(),
                unit.text,
                m.scene_description_id,
                m.character,
                m.location,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Replace the stored chunks of every source present in `chunks`.
pub fn save_chunks(conn: &Connection, chunks: &[ChunkDocument]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let sources: BTreeSet<&str> = chunks.iter().map(|c| c.metadata.source.as_str()).collect();
    for source in sources {
        tx.execute("DELETE FROM chunks WHERE source = ?1", params![source])?;
    }
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO chunks (id, source, chunk_id, content, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for chunk in chunks {
            let metadata = serde_json::to_string(&chunk.metadata)?;
            count += stmt.execute(params![
                chunk.id,
                chunk.metadata.source,
                chunk.metadata.chunk_id as i64,
                chunk.page_content,
                metadata,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct Stats {
    pub scene_descriptions: usize,
    pub dialog: usize,
    pub characters: usize,
    pub locations: usize,
    pub scenes: usize,
    pub chunks: usize,
}

pub fn get_stats(conn: &Connection, source: &str) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        let n: i64 = conn.query_row(sql, params![source], |row| row.get(0))?;
        Ok(n as usize)
    };

    Ok(Stats {
        scene_descriptions: count(
            "SELECT COUNT(*) FROM units WHERE source = ?1 AND text_type = 'scene_description'",
        )?,
        dialog: count("SELECT COUNT(*) FROM units WHERE source = ?1 AND text_type = 'dialog'")?,
        characters: count("SELECT COUNT(DISTINCT character) FROM units WHERE source = ?1")?,
        locations: count("SELECT COUNT(DISTINCT location) FROM units WHERE source = ?1")?,
        scenes: count("SELECT COUNT(DISTINCT scene_description_id) FROM units WHERE source = ?1")?,
        chunks: count("SELECT COUNT(*) FROM chunks WHERE source = ?1")?,
    })
}

pub struct CharacterRow {
    pub character: String,
    pub lines: usize,
    pub first_page: u32,
}

/// Speaking characters ordered by number of dialog units.
pub fn character_lines(conn: &Connection, source: &str, limit: usize) -> Result<Vec<CharacterRow>> {
    let mut stmt = conn.prepare(
        "SELECT character, COUNT(*) AS n, MIN(page_number)
         FROM units
         WHERE source = ?1 AND text_type = 'dialog' AND character IS NOT NULL
         GROUP BY character
         ORDER BY n DESC, character
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![source, limit as i64], |row| {
            Ok(CharacterRow {
                character: row.get(0)?,
                lines: row.get::<_, i64>(1)? as usize,
                first_page: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
