//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{Days, NaiveDate};
use regex::Regex;

use sl_core::{ClientId, RecomputeWindow};

use crate::{Config, WindowArgs};

/// Pre-compiled regex for relative date parsing.
static RELATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative date parsing (~1000 years in days).
const MAX_RELATIVE_DAYS: u64 = 1000 * 365;

/// Parse a date string as either ISO 8601 or relative to `today`.
///
/// Supports:
/// - ISO 8601: "2026-01-15"
/// - Named: "today", "yesterday"
/// - Relative: "3 days ago", "1 week ago"
pub fn parse_date(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    match s {
        "today" => return Ok(today),
        "yesterday" => return days_before(today, 1),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(caps) = RELATIVE_DATE_RE.captures(s) else {
        anyhow::bail!(
            "Invalid date: {s}. Use ISO 8601 (e.g., 2026-01-15), 'today', 'yesterday', or relative (e.g., '3 days ago')"
        );
    };

    let n: u64 = caps[1]
        .parse()
        .context("failed to parse number in relative date")?;

    let days_per_unit = match &caps[2] {
        "day" => 1,
        "week" => 7,
        unit => anyhow::bail!("Unknown date unit: {unit}"),
    };

    if n > MAX_RELATIVE_DAYS / days_per_unit {
        anyhow::bail!("Relative date value too large: {n} {}", &caps[2]);
    }

    days_before(today, n * days_per_unit)
}

fn days_before(today: NaiveDate, days: u64) -> anyhow::Result<NaiveDate> {
    today
        .checked_sub_days(Days::new(days))
        .with_context(|| format!("date {days} days before {today} is out of range"))
}

/// Resolve window arguments against the configuration.
///
/// `--to` defaults to `today`; `--from` defaults to the configured number of
/// days ending on `--to`.
pub fn resolve_window(
    args: &WindowArgs,
    config: &Config,
    today: NaiveDate,
) -> anyhow::Result<RecomputeWindow> {
    let last = match &args.to {
        Some(to) => parse_date(to, today).context("invalid --to")?,
        None => today,
    };
    let first = match &args.from {
        Some(from) => parse_date(from, today).context("invalid --from")?,
        None => days_before(last, u64::from(config.window_days.max(1) - 1))?,
    };
    let client_id = args
        .client
        .as_deref()
        .map(ClientId::new)
        .transpose()
        .context("invalid --client")?;

    let window = RecomputeWindow::new(first, last)?.with_client(client_id);
    Ok(window)
}
