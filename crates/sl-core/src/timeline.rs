//! Per-client, per-day timelines and collision detection.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::rect::TimeRect;
use crate::types::ClientId;

/// Two rects of one timeline that double-book the client.
///
/// `first` precedes `second` in the timeline's rect order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub first: TimeRect,
    pub second: TimeRect,
    /// Start of the shared interval.
    pub overlap_start: NaiveTime,
    /// End of the shared interval.
    pub overlap_end: NaiveTime,
}

impl Collision {
    fn new(first: TimeRect, second: TimeRect) -> Self {
        let overlap_start = first.start().max(second.start());
        let overlap_end = first.end().min(second.end());
        Self {
            first,
            second,
            overlap_start,
            overlap_end,
        }
    }

    /// Length of the shared interval.
    pub fn overlap(&self) -> TimeDelta {
        if self.overlap_end <= self.overlap_start {
            return TimeDelta::zero();
        }
        self.overlap_end - self.overlap_start
    }
}

/// The rects of one client on one calendar day.
///
/// The timeline trusts its caller: rects are not re-filtered by client or date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDayTimeline {
    client_id: ClientId,
    date: NaiveDate,
    rects: Vec<TimeRect>,
}

impl ClientDayTimeline {
    /// Creates an empty timeline.
    pub const fn new(client_id: ClientId, date: NaiveDate) -> Self {
        Self {
            client_id,
            date,
            rects: Vec::new(),
        }
    }

    /// Creates a timeline holding already-filtered rects.
    pub const fn with_rects(client_id: ClientId, date: NaiveDate, rects: Vec<TimeRect>) -> Self {
        Self {
            client_id,
            date,
            rects,
        }
    }

    pub fn push(&mut self, rect: TimeRect) {
        self.rects.push(rect);
    }

    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn rects(&self) -> &[TimeRect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Finds every pair of rects that double-book the client.
    ///
    /// A pair collides when neither rect is a break, their source IDs differ,
    /// and their half-open intervals overlap. Each unordered pair is reported
    /// once. Pairwise comparison is quadratic in the number of rects, which is
    /// bounded by one client's assignments on one day.
    pub fn collisions(&self) -> Vec<Collision> {
        let mut found = Vec::new();
        for (i, a) in self.rects.iter().enumerate() {
            if a.is_break() {
                continue;
            }
            for b in &self.rects[i + 1..] {
                if b.is_break() || a.source_id() == b.source_id() {
                    continue;
                }
                if a.overlaps(b) {
                    found.push(Collision::new(a.clone(), b.clone()));
                }
            }
        }
        found
    }
}

/// Groups rects into one timeline per (client, date).
///
/// Timelines are ordered by client, then date. Rects keep their input order
/// within a timeline.
pub fn partition_by_client_day(rects: Vec<TimeRect>) -> Vec<ClientDayTimeline> {
    let mut groups: BTreeMap<(ClientId, NaiveDate), Vec<TimeRect>> = BTreeMap::new();
    for rect in rects {
        groups
            .entry((rect.client_id().clone(), rect.date()))
            .or_default()
            .push(rect);
    }
    groups
        .into_iter()
        .map(|((client_id, date), rects)| ClientDayTimeline::with_rects(client_id, date, rects))
        .collect()
}
