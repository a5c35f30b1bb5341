//! Recompute command: one collision detection pass over a window.
//!
//! Reports are published through writer sinks, either as human-readable text
//! or as pretty-printed JSON.

use std::io::{self, Write};

use anyhow::{Context, Result};

use sl_core::rect::format_time;
use sl_core::{CancelFlag, Collision, CollisionReport, CollisionSink, RecomputeWindow, recompute};
use sl_db::Database;

use super::rects::rect_line;

/// Publishes reports as text.
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> CollisionSink for TextSink<W> {
    type Error = io::Error;

    fn publish(&mut self, report: &CollisionReport) -> Result<(), Self::Error> {
        let w = &mut self.writer;
        let window = &report.window;
        writeln!(w, "Run {}", report.run_id)?;
        writeln!(
            w,
            "Window: {} to {} ({})",
            window.first(),
            window.last(),
            window
                .client_id()
                .map_or_else(|| "all clients".to_string(), |c| format!("client {c}"))
        )?;
        writeln!(
            w,
            "Checked {}, {} from {}",
            count(report.timelines_checked, "timeline"),
            count(report.rects, "rect"),
            count(report.records, "record")
        )?;
        if report.cancelled {
            writeln!(w, "Cancelled: report is partial")?;
        }

        if report.is_clean() {
            writeln!(w, "No collisions.")?;
            return Ok(());
        }

        for day in &report.days {
            writeln!(
                w,
                "{} {}: {}",
                day.client_id,
                day.date,
                count(day.collisions.len(), "collision")
            )?;
            for collision in &day.collisions {
                writeln!(w, "  {}", collision_line(collision))?;
            }
        }
        Ok(())
    }
}

/// Publishes reports as pretty-printed JSON.
pub struct JsonSink<W> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> CollisionSink for JsonSink<W> {
    type Error = serde_json::Error;

    fn publish(&mut self, report: &CollisionReport) -> Result<(), Self::Error> {
        serde_json::to_writer_pretty(&mut self.writer, report)?;
        writeln!(self.writer).map_err(serde_json::Error::io)
    }
}

/// Runs one pass over `window` and writes the report.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    window: &RecomputeWindow,
    json: bool,
) -> Result<CollisionReport> {
    let cancel = CancelFlag::new();
    let report = if json {
        recompute(db, &mut JsonSink::new(writer), window, &cancel)
    } else {
        recompute(db, &mut TextSink::new(writer), window, &cancel)
    }
    .context("recomputation failed")?;
    Ok(report)
}

fn collision_line(collision: &Collision) -> String {
    format!(
        "{} overlaps {} at {}-{} ({} min)",
        rect_line(&collision.first),
        rect_line(&collision.second),
        format_time(collision.overlap_start),
        format_time(collision.overlap_end),
        collision.overlap().num_minutes()
    )
}

fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
