use itertools::Itertools;

use super::classify::{ClassifiedLine, LineKind};
use crate::error::{LoaderError, Result};

/// Merge adjacent lines that share kind and margin, rejoining text the layout wrapped.
///
/// Only neighbours merge; two description paragraphs separated by a dialog stay apart.
pub fn aggregate(lines: Vec<ClassifiedLine>) -> Result<Vec<ClassifiedLine>> {
    let runs = lines.into_iter().chunk_by(|line| (line.kind, line.margin));
    let mut merged = Vec::new();
    for (_, run) in &runs {
        merged.push(merge_run(run.collect())?);
    }
    Ok(merged)
}

fn merge_run(mut run: Vec<ClassifiedLine>) -> Result<ClassifiedLine> {
    if run.len() == 1 {
        return Ok(run.remove(0));
    }

    let first = &run[0];
    if matches!(first.kind, LineKind::Location | LineKind::Character) {
        return Err(LoaderError::MalformedGroup {
            kind: first.kind,
            margin: first.margin,
            page_number: first.page_number,
            count: run.len(),
            texts: run.into_iter().map(|l| l.text).collect(),
        });
    }

    let text = run.iter().map(|l| l.text.as_str()).join(" ");
    Ok(ClassifiedLine {
        text,
        ..run.swap_remove(0)
    })
}
