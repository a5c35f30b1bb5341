//! Input records: work assignments, their changes, and breaks.
//!
//! Records are read-only input to the engine. Times are wall-clock times of
//! day without a date; a record whose end lies before its start crosses
//! midnight into the following calendar day.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::{BreakId, ChangeId, ChangeKind, ClientId, ShiftId, WorkId};

/// A scheduled assignment of a client to a shift on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    pub client_id: ClientId,
    pub shift_id: ShiftId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Work {
    /// Creates a work assignment.
    pub const fn new(
        id: WorkId,
        client_id: ClientId,
        shift_id: ShiftId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id,
            client_id,
            shift_id,
            date,
            start,
            end,
        }
    }
}

/// A correction or replacement applied to exactly one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkChange {
    pub id: ChangeId,
    pub work_id: WorkId,
    pub kind: ChangeKind,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Client taking over the changed span. Only meaningful for replacements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_client_id: Option<ClientId>,
}

impl WorkChange {
    /// Creates a correction of the given kind.
    pub const fn correction(
        id: ChangeId,
        work_id: WorkId,
        kind: ChangeKind,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id,
            work_id,
            kind,
            start,
            end,
            replacement_client_id: None,
        }
    }

    /// Creates a replacement of the given kind owned by `client_id`.
    pub const fn replacement(
        id: ChangeId,
        work_id: WorkId,
        kind: ChangeKind,
        start: NaiveTime,
        end: NaiveTime,
        client_id: ClientId,
    ) -> Self {
        Self {
            id,
            work_id,
            kind,
            start,
            end,
            replacement_client_id: Some(client_id),
        }
    }
}

/// A non-competing interval for a client on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    pub id: BreakId,
    pub client_id: ClientId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Break {
    /// Creates a break.
    pub const fn new(
        id: BreakId,
        client_id: ClientId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id,
            client_id,
            date,
            start,
            end,
        }
    }
}

/// A consistent snapshot of records for one recomputation window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub works: Vec<Work>,
    #[serde(default)]
    pub changes: Vec<WorkChange>,
    #[serde(default)]
    pub breaks: Vec<Break>,
}

impl RecordSet {
    /// Total number of records of all kinds.
    pub fn len(&self) -> usize {
        self.works.len() + self.changes.len() + self.breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
