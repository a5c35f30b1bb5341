//! Import command for loading shift records into the local `SQLite` store.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Deserialize;

use sl_core::{Break, RecordSet, Work, WorkChange};
use sl_db::{Database, InsertStats};

/// One JSON Lines record, tagged by its `record` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ImportRecord {
    Work(Work),
    Change(WorkChange),
    Break(Break),
}

/// Reads records from `reader`, stores them, and reports what was new.
pub fn run<R: BufRead, W: Write>(reader: R, writer: &mut W, db: &mut Database) -> Result<InsertStats> {
    let records = parse_records(reader)?;
    let stats = db
        .insert_records(&records)
        .context("failed to store records")?;

    let inserted = stats.works + stats.changes + stats.breaks;
    writeln!(
        writer,
        "Imported {inserted} new of {} records ({} works, {} changes, {} breaks)",
        records.len(),
        stats.works,
        stats.changes,
        stats.breaks
    )?;
    Ok(stats)
}

fn parse_records<R: BufRead>(reader: R) -> Result<RecordSet> {
    let mut records = RecordSet::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        match parsed {
            ImportRecord::Work(work) => records.works.push(work),
            ImportRecord::Change(change) => {
                check_change(&change).with_context(|| format!("invalid change on line {}", idx + 1))?;
                records.changes.push(change);
            }
            ImportRecord::Break(brk) => records.breaks.push(brk),
        }
    }
    Ok(records)
}

fn check_change(change: &WorkChange) -> Result<()> {
    if !change.kind.is_replacement() && change.replacement_client_id.is_some() {
        anyhow::bail!(
            "{} {} cannot name a replacement client",
            change.kind,
            change.id
        );
    }
    if change.kind.is_replacement() && change.replacement_client_id.is_none() {
        tracing::debug!(
            change_id = %change.id,
            "replacement without client, work's client keeps the span"
        );
    }
    Ok(())
}
