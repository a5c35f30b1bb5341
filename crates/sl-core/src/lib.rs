//! Core domain logic for shift timelines.
//!
//! This crate contains the fundamental types and logic for:
//! - Rect building: turning works, changes, and breaks into single-day rects
//! - Timelines: grouping rects per client and day, and detecting collisions
//! - Recomputation: running a full pass over a date window

mod builder;
pub mod rect;
pub mod recompute;
pub mod records;
mod timeline;
pub mod types;

pub use builder::build_rects;
pub use rect::{DAY_END, DAY_START, RectKind, TimeRect};
pub use recompute::{
    CancelFlag, CollisionReport, CollisionSink, DayCollisions, RecomputeError, RecomputeWindow,
    RecordSource, recompute, window_timelines,
};
pub use records::{Break, RecordSet, Work, WorkChange};
pub use timeline::{ClientDayTimeline, Collision, partition_by_client_day};
pub use types::{BreakId, ChangeId, ChangeKind, ClientId, ShiftId, SourceId, ValidationError, WorkId};
