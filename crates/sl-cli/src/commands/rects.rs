//! Rects command for printing the built timelines of a window.

use std::io::Write;

use anyhow::{Context, Result};

use sl_core::rect::format_time;
use sl_core::{ClientDayTimeline, RecomputeWindow, TimeRect, window_timelines};
use sl_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, window: &RecomputeWindow, json: bool) -> Result<()> {
    let records = db
        .load_records(window)
        .context("failed to load records")?;
    let timelines = window_timelines(&records, window);
    tracing::debug!(timelines = timelines.len(), "built timelines");

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&timelines)?)?;
        return Ok(());
    }

    if timelines.is_empty() {
        writeln!(writer, "No rects in window.")?;
        return Ok(());
    }

    for timeline in &timelines {
        write_timeline(writer, timeline)?;
    }
    Ok(())
}

fn write_timeline<W: Write>(writer: &mut W, timeline: &ClientDayTimeline) -> Result<()> {
    let noun = if timeline.len() == 1 { "rect" } else { "rects" };
    writeln!(
        writer,
        "{} {} ({} {noun})",
        timeline.client_id(),
        timeline.date(),
        timeline.len()
    )?;
    for rect in timeline.rects() {
        writeln!(writer, "  {}", rect_line(rect))?;
    }
    Ok(())
}

/// One rect without its client and date, which the timeline header carries.
pub(crate) fn rect_line(rect: &TimeRect) -> String {
    let change = rect
        .change_id()
        .map(|change_id| format!(" [{change_id}]"))
        .unwrap_or_default();
    format!(
        "{}-{} {} {}{change}",
        format_time(rect.start()),
        format_time(rect.end()),
        rect.kind(),
        rect.source_id()
    )
}
