//! Collision recomputation for a date window.
//!
//! A pass loads a snapshot of records from a [`RecordSource`], builds rects
//! once over the whole snapshot, partitions them into client-day timelines,
//! checks each timeline for collisions in parallel, and hands the resulting
//! [`CollisionReport`] to a [`CollisionSink`].
//!
//! A pass owns all of its state. Passes over disjoint windows may run
//! concurrently; passes over the same window are safe but redundant.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::builder::build_rects;
use crate::records::RecordSet;
use crate::timeline::{ClientDayTimeline, Collision, partition_by_client_day};
use crate::types::ClientId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Recomputation errors.
#[derive(Debug, Error)]
pub enum RecomputeError {
    /// The window ends before it starts.
    #[error("invalid window: {first} is after {last}")]
    InvalidWindow { first: NaiveDate, last: NaiveDate },

    /// The record source failed.
    #[error("failed to load records")]
    Load(#[source] BoxError),

    /// The collision sink failed.
    #[error("failed to publish collision report")]
    Publish(#[source] BoxError),
}

/// The dates and clients a pass reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeWindow {
    first: NaiveDate,
    last: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<ClientId>,
}

impl RecomputeWindow {
    /// Creates a window covering `first..=last`.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self, RecomputeError> {
        if first > last {
            return Err(RecomputeError::InvalidWindow { first, last });
        }
        Ok(Self {
            first,
            last,
            client_id: None,
        })
    }

    /// Restricts the window to a single client.
    #[must_use]
    pub fn with_client(mut self, client_id: Option<ClientId>) -> Self {
        self.client_id = client_id;
        self
    }

    pub const fn first(&self) -> NaiveDate {
        self.first
    }

    pub const fn last(&self) -> NaiveDate {
        self.last
    }

    pub const fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    /// First date a source must load records for.
    ///
    /// One day before the window, so works crossing midnight into the first
    /// day contribute their second half.
    pub fn load_from(&self) -> NaiveDate {
        self.first.pred_opt().unwrap_or(self.first)
    }

    /// Whether a timeline falls inside the window and client scope.
    pub fn covers(&self, timeline: &ClientDayTimeline) -> bool {
        let date = timeline.date();
        if date < self.first || date > self.last {
            return false;
        }
        self.client_id
            .as_ref()
            .is_none_or(|client_id| client_id == timeline.client_id())
    }
}

/// Supplies the records for a window.
///
/// Implementations return works and breaks dated from
/// [`RecomputeWindow::load_from`] through the window's last date, plus every
/// change of the returned works. With a client filter, works owned by the
/// client and works replaced over to the client are both required.
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self, window: &RecomputeWindow) -> Result<RecordSet, Self::Error>;
}

/// An in-memory snapshot is its own source. The window only scopes the report.
impl RecordSource for RecordSet {
    type Error = Infallible;

    fn load(&self, _window: &RecomputeWindow) -> Result<RecordSet, Self::Error> {
        Ok(self.clone())
    }
}

/// Receives the report of each pass.
pub trait CollisionSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn publish(&mut self, report: &CollisionReport) -> Result<(), Self::Error>;
}

impl CollisionSink for Vec<CollisionReport> {
    type Error = Infallible;

    fn publish(&mut self, report: &CollisionReport) -> Result<(), Self::Error> {
        self.push(report.clone());
        Ok(())
    }
}

/// Cooperative cancellation shared between a pass and its owner.
///
/// Checked before each client-day timeline. A timeline that has started is
/// always finished.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Collisions found in one client-day timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCollisions {
    pub client_id: ClientId,
    pub date: NaiveDate,
    pub collisions: Vec<Collision>,
}

/// Outcome of one recomputation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionReport {
    /// Identifies the pass in logs.
    pub run_id: Uuid,
    pub window: RecomputeWindow,
    /// Records loaded from the source.
    pub records: usize,
    /// Rects inside the window and client scope.
    pub rects: usize,
    /// Timelines fully checked.
    pub timelines_checked: usize,
    /// Timelines with at least one collision, by client then date.
    pub days: Vec<DayCollisions>,
    /// Whether the pass stopped before checking every timeline.
    pub cancelled: bool,
}

impl CollisionReport {
    pub fn collision_count(&self) -> usize {
        self.days.iter().map(|day| day.collisions.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.days.is_empty()
    }
}

/// Builds the timelines of a record snapshot that fall inside `window`.
pub fn window_timelines(records: &RecordSet, window: &RecomputeWindow) -> Vec<ClientDayTimeline> {
    let rects = build_rects(&records.works, &records.changes, &records.breaks);
    partition_by_client_day(rects)
        .into_iter()
        .filter(|timeline| window.covers(timeline))
        .collect()
}

/// Runs one recomputation pass and publishes its report.
///
/// Only source and sink failures are errors. A cancelled pass still publishes
/// the timelines it finished, with `cancelled` set.
pub fn recompute<S, K>(
    source: &S,
    sink: &mut K,
    window: &RecomputeWindow,
    cancel: &CancelFlag,
) -> Result<CollisionReport, RecomputeError>
where
    S: RecordSource + ?Sized,
    K: CollisionSink + ?Sized,
{
    let run_id = Uuid::new_v4();
    let records = source
        .load(window)
        .map_err(|e| RecomputeError::Load(Box::new(e)))?;
    tracing::debug!(%run_id, records = records.len(), "loaded records");

    let timelines = window_timelines(&records, window);
    let rects: usize = timelines.iter().map(ClientDayTimeline::len).sum();

    let checked: Vec<Option<DayCollisions>> = timelines
        .par_iter()
        .map(|timeline| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(DayCollisions {
                client_id: timeline.client_id().clone(),
                date: timeline.date(),
                collisions: timeline.collisions(),
            })
        })
        .collect();

    let timelines_checked = checked.iter().flatten().count();
    let cancelled = timelines_checked < timelines.len();
    if cancelled {
        tracing::warn!(
            %run_id,
            timelines_checked,
            timelines = timelines.len(),
            "recomputation cancelled"
        );
    }

    let report = CollisionReport {
        run_id,
        window: window.clone(),
        records: records.len(),
        rects,
        timelines_checked,
        days: checked
            .into_iter()
            .flatten()
            .filter(|day| !day.collisions.is_empty())
            .collect(),
        cancelled,
    };
    tracing::debug!(
        %run_id,
        rects,
        timelines_checked,
        collisions = report.collision_count(),
        "recomputation complete"
    );

    sink.publish(&report)
        .map_err(|e| RecomputeError::Publish(Box::new(e)))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Break, Work, WorkChange};
    use crate::types::{BreakId, ChangeId, ChangeKind, ShiftId, WorkId};
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn client(id: &str) -> ClientId {
        ClientId::new(id).unwrap()
    }

    fn work(id: &str, client_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Work {
        Work::new(
            WorkId::new(id).unwrap(),
            client(client_id),
            ShiftId::new("shift-1").unwrap(),
            date,
            start,
            end,
        )
    }

    fn window(first: u32, last: u32) -> RecomputeWindow {
        RecomputeWindow::new(d(first), d(last)).unwrap()
    }

    /// Two clients with one double-booking each, plus a clean day.
    fn sample_records() -> RecordSet {
        RecordSet {
            works: vec![
                work("w1", "alice", d(10), t(8, 0), t(14, 0)),
                work("w2", "alice", d(10), t(12, 0), t(18, 0)),
                work("w3", "bob", d(9), t(22, 0), t(6, 0)),
                work("w4", "bob", d(10), t(4, 0), t(12, 0)),
                work("w5", "bob", d(11), t(8, 0), t(12, 0)),
            ],
            changes: vec![WorkChange::correction(
                ChangeId::new("ch1").unwrap(),
                WorkId::new("w1").unwrap(),
                ChangeKind::EndCorrection,
                t(13, 0),
                t(14, 0),
            )],
            breaks: vec![Break::new(
                BreakId::new("b1").unwrap(),
                client("alice"),
                d(10),
                t(12, 0),
                t(12, 30),
            )],
        }
    }

    #[derive(Debug, Error)]
    #[error("storage offline")]
    struct Offline;

    struct FailingSource;

    impl RecordSource for FailingSource {
        type Error = Offline;

        fn load(&self, _window: &RecomputeWindow) -> Result<RecordSet, Self::Error> {
            Err(Offline)
        }
    }

    /// Serves a snapshot and cancels the pass as soon as it is loaded.
    struct CancellingSource {
        records: RecordSet,
        cancel: CancelFlag,
    }

    impl RecordSource for CancellingSource {
        type Error = Infallible;

        fn load(&self, _window: &RecomputeWindow) -> Result<RecordSet, Self::Error> {
            self.cancel.cancel();
            Ok(self.records.clone())
        }
    }

    /// Every client double-booked on every day of March 1-28.
    fn busy_month(clients: usize) -> RecordSet {
        let mut works = Vec::new();
        for c in 0..clients {
            for day in 1..=28 {
                let client_id = format!("c{c}");
                works.push(work(&format!("{client_id}-{day}-a"), &client_id, d(day), t(8, 0), t(14, 0)));
                works.push(work(&format!("{client_id}-{day}-b"), &client_id, d(day), t(12, 0), t(18, 0)));
            }
        }
        RecordSet {
            works,
            ..RecordSet::default()
        }
    }

    struct FailingSink;

    impl CollisionSink for FailingSink {
        type Error = Offline;

        fn publish(&mut self, _report: &CollisionReport) -> Result<(), Self::Error> {
            Err(Offline)
        }
    }

    #[test]
    fn test_window_rejects_reversed_dates() {
        let err = RecomputeWindow::new(d(11), d(10)).unwrap_err();
        assert_eq!(err.to_string(), "invalid window: 2025-03-11 is after 2025-03-10");
    }

    #[test]
    fn test_window_loads_from_previous_day() {
        assert_eq!(window(10, 12).load_from(), d(9));
        let edge = RecomputeWindow::new(NaiveDate::MIN, NaiveDate::MIN).unwrap();
        assert_eq!(edge.load_from(), NaiveDate::MIN);
    }

    #[test]
    fn test_recompute_reports_collisions_per_client_day() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let report = recompute(&sample_records(), &mut sink, &window(10, 11), &CancelFlag::new()).unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.records, 7);
        // alice/10: w1 + correction + w2 + break; bob/10: w3 second half + w4; bob/11: w5
        assert_eq!(report.rects, 7);
        assert_eq!(report.timelines_checked, 3);
        assert_eq!(report.collision_count(), 3);

        let keys: Vec<(&str, NaiveDate)> = report
            .days
            .iter()
            .map(|day| (day.client_id.as_str(), day.date))
            .collect();
        assert_eq!(keys, vec![("alice", d(10)), ("bob", d(10))]);

        // alice: w1 (shortened to 08-13) and its correction both overlap w2
        let alice = &report.days[0].collisions;
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].first.source_id().as_str(), "w1");
        assert_eq!(alice[0].second.source_id().as_str(), "w2");
        assert_eq!(alice[0].overlap_end, t(13, 0));
        assert_eq!(alice[1].first.change_id().unwrap().as_str(), "ch1");
        // bob: the overnight half from the day before the window against w4
        let bob = &report.days[1].collisions[0];
        assert_eq!(bob.first.source_id().as_str(), "w3");
        assert_eq!(bob.second.source_id().as_str(), "w4");

        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0], report);
    }

    #[test]
    fn test_recompute_excludes_days_outside_window() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let report = recompute(&sample_records(), &mut sink, &window(11, 11), &CancelFlag::new()).unwrap();

        assert_eq!(report.timelines_checked, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_recompute_client_filter() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let scoped = window(10, 11).with_client(Some(client("bob")));
        let report = recompute(&sample_records(), &mut sink, &scoped, &CancelFlag::new()).unwrap();

        assert_eq!(report.timelines_checked, 2);
        assert_eq!(report.collision_count(), 1);
        assert!(report.days.iter().all(|day| day.client_id.as_str() == "bob"));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let records = sample_records();
        let first = recompute(&records, &mut sink, &window(9, 11), &CancelFlag::new()).unwrap();
        let second = recompute(&records, &mut sink, &window(9, 11), &CancelFlag::new()).unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.days, second.days);
        assert_eq!(first.rects, second.rects);
    }

    #[test]
    fn test_cancelled_pass_publishes_partial_report() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut sink: Vec<CollisionReport> = Vec::new();
        let report = recompute(&sample_records(), &mut sink, &window(10, 11), &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.timelines_checked, 0);
        assert!(report.days.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_cancel_after_load_skips_unchecked_timelines() {
        let cancel = CancelFlag::new();
        let source = CancellingSource {
            records: sample_records(),
            cancel: cancel.clone(),
        };
        let mut sink: Vec<CollisionReport> = Vec::new();
        let report = recompute(&source, &mut sink, &window(10, 11), &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.records, 7);
        assert_eq!(report.rects, 7);
        assert_eq!(report.timelines_checked, 0);
        assert!(report.days.is_empty());
        assert_eq!(sink, vec![report]);
    }

    #[test]
    fn test_cancel_during_pass_reports_whole_timelines_only() {
        let records = busy_month(50);
        let month = window(1, 28);
        let mut sink: Vec<CollisionReport> = Vec::new();
        let full = recompute(&records, &mut sink, &month, &CancelFlag::new()).unwrap();
        assert_eq!(full.timelines_checked, 50 * 28);
        assert_eq!(full.days.len(), full.timelines_checked);

        let cancel = CancelFlag::new();
        let partial = std::thread::scope(|scope| {
            let handle = cancel.clone();
            scope.spawn(move || {
                std::thread::sleep(std::time::Duration::from_micros(200));
                handle.cancel();
            });
            recompute(&records, &mut sink, &month, &cancel).unwrap()
        });

        // Every timeline collides, so each checked timeline is reported
        assert_eq!(partial.days.len(), partial.timelines_checked);
        assert_eq!(partial.cancelled, partial.timelines_checked < full.timelines_checked);
        for day in &partial.days {
            let whole = full
                .days
                .iter()
                .find(|other| other.client_id == day.client_id && other.date == day.date)
                .unwrap();
            assert_eq!(day, whole);
        }
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let cancel = CancelFlag::new();
        let handle = cancel.clone();
        assert!(!cancel.is_cancelled());
        handle.cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_load_failure_is_reported() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let err = recompute(&FailingSource, &mut sink, &window(10, 11), &CancelFlag::new()).unwrap_err();

        assert!(matches!(err, RecomputeError::Load(_)));
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "storage offline"
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_publish_failure_is_reported() {
        let err = recompute(
            &sample_records(),
            &mut FailingSink,
            &window(10, 11),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RecomputeError::Publish(_)));
    }

    #[test]
    fn test_empty_records_yield_clean_report() {
        let mut sink: Vec<CollisionReport> = Vec::new();
        let report = recompute(&RecordSet::default(), &mut sink, &window(10, 11), &CancelFlag::new()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.records, 0);
        assert_eq!(report.timelines_checked, 0);
        assert!(!report.cancelled);
    }
}
