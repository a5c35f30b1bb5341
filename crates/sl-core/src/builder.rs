//! Rect building: turns works, changes, and breaks into single-day rects.
//!
//! # Algorithm Summary
//!
//! For each work:
//! 1. Collect the changes referencing it (changes for unknown works are ignored)
//! 2. Move the remaining start to the end of the start-kind changes and the
//!    remaining end to the start of the end-kind changes
//! 3. Emit the remaining span as a work rect, plus one rect per change
//!
//! Every emitted span is split at midnight, anchored on the work's date.
//! Breaks pass through unchanged apart from the midnight split.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime, TimeDelta};

use crate::rect::{RectKind, TimeRect, split_at_midnight};
use crate::records::{Break, Work, WorkChange};
use crate::types::{ChangeId, ClientId, SourceId, WorkId};

/// Builds the complete set of rects for the given records.
///
/// Total and deterministic: identical input yields identical output, and no
/// input is rejected. Output order is work rects then change rects for each
/// work in input order, followed by break rects.
pub fn build_rects(works: &[Work], changes: &[WorkChange], breaks: &[Break]) -> Vec<TimeRect> {
    let known: HashSet<&WorkId> = works.iter().map(|work| &work.id).collect();
    let mut by_work: HashMap<&WorkId, Vec<&WorkChange>> = HashMap::new();
    let mut orphaned = 0_usize;
    for change in changes {
        if known.contains(&change.work_id) {
            by_work.entry(&change.work_id).or_default().push(change);
        } else {
            orphaned += 1;
            tracing::trace!(change_id = %change.id, work_id = %change.work_id, "ignoring change for unknown work");
        }
    }

    let mut rects = Vec::with_capacity(works.len() + changes.len() + breaks.len());
    for work in works {
        let work_changes = by_work.get(&work.id).map_or(&[][..], Vec::as_slice);
        push_work_rects(&mut rects, work, work_changes);
    }
    for brk in breaks {
        push_split(
            &mut rects,
            &Origin {
                source_id: SourceId::from(&brk.id),
                kind: RectKind::Break,
                client_id: &brk.client_id,
                change_id: None,
            },
            brk.date,
            brk.start,
            brk.end,
        );
    }

    tracing::debug!(
        works = works.len(),
        changes = changes.len(),
        breaks = breaks.len(),
        orphaned,
        rects = rects.len(),
        "built rects"
    );
    rects
}

/// Who a span belongs to and where it came from.
struct Origin<'a> {
    source_id: SourceId,
    kind: RectKind,
    client_id: &'a ClientId,
    change_id: Option<&'a ChangeId>,
}

fn push_work_rects(rects: &mut Vec<TimeRect>, work: &Work, changes: &[&WorkChange]) {
    let frame = WorkFrame::new(work);
    let mut start = TimeDelta::zero();
    let mut end = frame.length;
    let mut adjusted_start = false;
    let mut adjusted_end = false;

    // Start-kind changes keep the candidate furthest into the work, end-kind
    // changes the earliest one, so application order never matters.
    for change in changes {
        if change.kind.adjusts_start() {
            let candidate = frame.position(change.end);
            if !adjusted_start || candidate > start {
                start = candidate;
            }
            adjusted_start = true;
        } else {
            let candidate = frame.position(change.start);
            if !adjusted_end || candidate < end {
                end = candidate;
            }
            adjusted_end = true;
        }
    }
    if start > end {
        tracing::trace!(work_id = %work.id, "changes consume the whole work");
        start = end;
    }

    let source_id = SourceId::from(&work.id);
    push_split(
        rects,
        &Origin {
            source_id: source_id.clone(),
            kind: RectKind::Work,
            client_id: &work.client_id,
            change_id: None,
        },
        work.date,
        frame.time_at(start),
        frame.time_at(end),
    );

    for change in changes {
        let (kind, client_id) = if change.kind.is_replacement() {
            (
                RectKind::Replacement,
                change
                    .replacement_client_id
                    .as_ref()
                    .unwrap_or(&work.client_id),
            )
        } else {
            (RectKind::Correction, &work.client_id)
        };
        push_split(
            rects,
            &Origin {
                source_id: source_id.clone(),
                kind,
                client_id,
                change_id: Some(&change.id),
            },
            work.date,
            change.start,
            change.end,
        );
    }
}

fn push_split(
    rects: &mut Vec<TimeRect>,
    origin: &Origin<'_>,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) {
    for span in split_at_midnight(date, start, end) {
        rects.push(
            TimeRect::new(
                origin.source_id.clone(),
                origin.kind,
                origin.client_id.clone(),
                span.date,
                span.start,
                span.end,
            )
            .with_change_id(origin.change_id.cloned()),
        );
    }
}

/// A work's span laid out on an axis starting at the work's start.
///
/// Position zero is the work's start and `length` its end. Times outside the
/// work map to whichever side of the span they are closer to, so changes
/// reaching slightly before the start get a negative position.
struct WorkFrame {
    origin: NaiveTime,
    length: TimeDelta,
}

impl WorkFrame {
    fn new(work: &Work) -> Self {
        Self {
            origin: work.start,
            length: forward_offset(work.start, work.end),
        }
    }

    fn position(&self, time: NaiveTime) -> TimeDelta {
        let after = forward_offset(self.origin, time);
        if after <= self.length {
            return after;
        }
        let before = after - TimeDelta::days(1);
        if -before < after - self.length {
            before
        } else {
            after
        }
    }

    fn time_at(&self, position: TimeDelta) -> NaiveTime {
        self.origin + position
    }
}

/// Wall-clock distance going forward from `from` to `to`, in `[0, 24h)`.
fn forward_offset(from: NaiveTime, to: NaiveTime) -> TimeDelta {
    let delta = to - from;
    if delta < TimeDelta::zero() {
        delta + TimeDelta::days(1)
    } else {
        delta
    }
}
