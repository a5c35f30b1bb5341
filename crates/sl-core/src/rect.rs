//! Time rectangles: single-day intervals derived from records.

use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

use crate::types::{ChangeId, ClientId, SourceId};

/// First representable time of day.
pub const DAY_START: NaiveTime = match NaiveTime::from_hms_opt(0, 0, 0) {
    Some(time) => time,
    None => panic!("invalid start-of-day time"),
};

/// Last representable time of day.
///
/// Overnight intervals end their first half here.
pub const DAY_END: NaiveTime = match NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999) {
    Some(time) => time,
    None => panic!("invalid end-of-day time"),
};

/// What kind of record produced a rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RectKind {
    /// The remaining span of a work after all changes.
    Work,
    /// A break. Never takes part in collisions.
    Break,
    /// A start or end correction of a work.
    Correction,
    /// A start or end replacement of a work.
    Replacement,
}

impl RectKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
            Self::Correction => "correction",
            Self::Replacement => "replacement",
        }
    }
}

impl fmt::Display for RectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A contiguous interval on one calendar day, tagged with its origin and owner.
///
/// Rects produced by [`build_rects`](crate::build_rects) never span midnight:
/// overnight intervals are represented as two rects, one per day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRect {
    source_id: SourceId,
    kind: RectKind,
    client_id: ClientId,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    change_id: Option<ChangeId>,
}

impl TimeRect {
    /// Creates a single rect as given, without midnight handling.
    pub const fn new(
        source_id: SourceId,
        kind: RectKind,
        client_id: ClientId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            source_id,
            kind,
            client_id,
            date,
            start,
            end,
            change_id: None,
        }
    }

    /// Attaches the ID of the change that produced this rect.
    #[must_use]
    pub fn with_change_id(mut self, change_id: Option<ChangeId>) -> Self {
        self.change_id = change_id;
        self
    }

    pub const fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub const fn kind(&self) -> RectKind {
        self.kind
    }

    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// The change that produced this rect, for correction and replacement rects.
    pub const fn change_id(&self) -> Option<&ChangeId> {
        self.change_id.as_ref()
    }

    pub const fn is_break(&self) -> bool {
        matches!(self.kind, RectKind::Break)
    }

    /// Half-open overlap test: `[s1, e1)` and `[s2, e2)` overlap iff
    /// `s1 < e2 && s2 < e1`. Dates are not compared.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} {} {} ({})",
            self.date,
            format_time(self.start),
            format_time(self.end),
            self.kind,
            self.source_id,
            self.client_id
        )
    }
}

/// One day's share of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySpan {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Splits an interval anchored on `date` at midnight.
///
/// When `end < start` the interval yields `(date, start, DAY_END)` and
/// `(date + 1, DAY_START, end)`. Anything else, zero-length intervals
/// included, yields a single span on `date`.
pub fn split_at_midnight(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> impl Iterator<Item = DaySpan> {
    if end >= start {
        return std::iter::once(DaySpan { date, start, end }).chain(None::<DaySpan>);
    }

    let next = date.succ_opt().map(|next_day| DaySpan {
        date: next_day,
        start: DAY_START,
        end,
    });
    if next.is_none() {
        tracing::trace!(%date, "no following day, dropping overnight remainder");
    }
    std::iter::once(DaySpan {
        date,
        start,
        end: DAY_END,
    })
    .chain(next)
}

/// Formats a time of day for display.
///
/// `DAY_END` renders as `24:00`; whole minutes render as `HH:MM`.
pub fn format_time(time: NaiveTime) -> String {
    if time == DAY_END {
        return "24:00".to_string();
    }
    if time.second() == 0 && time.nanosecond() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn rect(source: &str, kind: RectKind, start: NaiveTime, end: NaiveTime) -> TimeRect {
        TimeRect::new(
            SourceId::new(source).unwrap(),
            kind,
            ClientId::new("c1").unwrap(),
            d(10),
            start,
            end,
        )
    }

    #[test]
    fn day_sentinels_bound_the_day() {
        assert_eq!(DAY_START, t(0, 0));
        assert!(DAY_END > t(23, 59));
        assert_eq!(DAY_END.nanosecond(), 999_999_999);
    }

    #[test]
    fn split_keeps_same_day_interval() {
        let spans: Vec<_> = split_at_midnight(d(10), t(8, 0), t(16, 0)).collect();
        assert_eq!(
            spans,
            vec![DaySpan {
                date: d(10),
                start: t(8, 0),
                end: t(16, 0)
            }]
        );
    }

    #[test]
    fn split_overnight_interval_into_two_days() {
        let spans: Vec<_> = split_at_midnight(d(10), t(22, 0), t(6, 0)).collect();
        assert_eq!(
            spans,
            vec![
                DaySpan {
                    date: d(10),
                    start: t(22, 0),
                    end: DAY_END
                },
                DaySpan {
                    date: d(11),
                    start: DAY_START,
                    end: t(6, 0)
                },
            ]
        );
    }

    #[test]
    fn split_never_splits_zero_length() {
        let spans: Vec<_> = split_at_midnight(d(10), t(0, 0), t(0, 0)).collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].date, d(10));

        assert_eq!(split_at_midnight(d(10), t(13, 0), t(13, 0)).count(), 1);
    }

    #[test]
    fn split_ending_at_midnight_has_empty_second_half() {
        let spans: Vec<_> = split_at_midnight(d(10), t(18, 0), DAY_START).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].start, spans[1].end);
    }

    #[test]
    fn split_crosses_month_boundary() {
        let spans: Vec<_> = split_at_midnight(d(31), t(23, 0), t(1, 0)).collect();
        assert_eq!(spans[1].date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[test]
    fn split_on_last_date_drops_remainder() {
        let spans: Vec<_> = split_at_midnight(NaiveDate::MAX, t(23, 0), t(1, 0)).collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].end, DAY_END);
    }

    #[test]
    fn overlap_is_half_open() {
        let a = rect("a", RectKind::Work, t(8, 0), t(14, 0));
        let b = rect("b", RectKind::Work, t(12, 0), t(18, 0));
        let c = rect("c", RectKind::Work, t(14, 0), t(16, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn format_time_renders_day_end_as_24() {
        assert_eq!(format_time(DAY_END), "24:00");
        assert_eq!(format_time(t(6, 5)), "06:05");
        assert_eq!(
            format_time(NaiveTime::from_hms_opt(6, 5, 30).unwrap()),
            "06:05:30"
        );
    }

    #[test]
    fn display_includes_origin_and_owner() {
        let a = rect("w1", RectKind::Correction, t(6, 0), t(7, 0));
        assert_eq!(a.to_string(), "2025-03-10 06:00-07:00 correction w1 (c1)");
    }
}
