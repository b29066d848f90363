//! Plain-text report codec. The layout is line-oriented and is parsed in
//! best-effort mode: every line is matched against one of five patterns
//! (person header, section header, cumulative-duration line, date heading,
//! session line) and anything unrecognized is skipped. Cumulative-duration
//! lines are informational only; totals are recomputed from the sessions.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
    store::{entities::SessionEntity, DaySessions, DayTotals},
    utils::time::{format_duration, local_clock},
};

const PERSON_PREFIX: &str = "Tracking for:";
const TOTALS_HEADER: &str = "Daily Cumulative Durations:";
const SESSIONS_HEADER: &str = "Detailed Start and End Times:";
const DATE_PREFIX: &str = "Date:";
const NO_DATA: &str = "No data available.";

/// Fatal parse failures. Any one of these rejects the whole import; the
/// tolerant skipping only applies to lines that match no pattern at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("line {line}: malformed session entry {text:?}")]
    MalformedSession { line: usize, text: String },
    #[error("line {line}: malformed date heading {text:?}")]
    MalformedDate { line: usize, text: String },
    #[error("line {line}: session entry outside any date block")]
    SessionOutsideDate { line: usize },
    #[error("line {line}: session interval ends before its start")]
    InvertedInterval { line: usize },
    #[error("report has no \"Tracking for:\" header")]
    MissingPersonHeader,
}

/// One person's data reconstructed from a report, with totals recomputed
/// purely from the session intervals.
#[derive(Debug, PartialEq, Default)]
pub struct ParsedReport {
    pub person: String,
    pub tracked_times: DayTotals,
    pub session_details: DaySessions,
}

/// Renders one person's data in the report layout. Session times are
/// written as local 12-hour clock values under their date heading, which is
/// what [parse_report] reconstructs the timestamps from.
pub fn encode_report(person: &str, totals: Option<&DayTotals>, sessions: Option<&DaySessions>) -> String {
    let mut out = format!("{PERSON_PREFIX} {person}\n\n");

    let empty = totals.map_or(true, DayTotals::is_empty)
        && sessions.map_or(true, DaySessions::is_empty);
    if empty {
        out.push_str(NO_DATA);
        return out;
    }

    out.push_str(TOTALS_HEADER);
    out.push('\n');
    for (date, ms) in totals.into_iter().flatten() {
        out.push_str(&format!("  {date}: {}\n", format_duration(*ms)));
    }

    out.push('\n');
    out.push_str(SESSIONS_HEADER);
    out.push('\n');
    for (date, list) in sessions.into_iter().flatten() {
        out.push_str(&format!("{DATE_PREFIX} {date}\n"));
        for (index, session) in list.iter().enumerate() {
            out.push_str(&format!(
                "  Session {}: {} - {}\n",
                index + 1,
                local_clock(session.start),
                local_clock(session.end)
            ));
        }
        out.push('\n');
    }

    out
}

/// Parses a report back into one person's data. Unrecognized lines are
/// skipped; structural problems in session or date lines abort with a
/// [ReportError] so the caller can refuse the whole import.
pub fn parse_report(content: &str) -> Result<ParsedReport, ReportError> {
    let mut person: Option<String> = None;
    let mut current_date: Option<NaiveDate> = None;
    let mut tracked_times = DayTotals::new();
    let mut session_details = DaySessions::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let number = index + 1;
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix(PERSON_PREFIX) {
            person = Some(name.trim().to_string());
        } else if line == TOTALS_HEADER || line == SESSIONS_HEADER {
            continue;
        } else if is_cumulative_line(line) {
            // Informational; totals are rebuilt from the session lines.
            continue;
        } else if let Some(rest) = line.strip_prefix(DATE_PREFIX) {
            if person.is_none() {
                return Err(ReportError::MissingPersonHeader);
            }
            let text = rest.trim();
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
                ReportError::MalformedDate {
                    line: number,
                    text: text.to_string(),
                }
            })?;
            current_date = Some(date);
            session_details.entry(date).or_default();
        } else if line.starts_with("Session") {
            let date = current_date.ok_or(ReportError::SessionOutsideDate { line: number })?;
            let Some(session) = parse_session_line(line, date, number)? else {
                continue;
            };
            *tracked_times.entry(date).or_insert(0) += session.duration_ms();
            session_details.entry(date).or_default().push(session);
        } else {
            debug!("Skipping unrecognized report line {number}: {line:?}");
        }
    }

    let person = person.ok_or(ReportError::MissingPersonHeader)?;
    Ok(ParsedReport {
        person,
        tracked_times,
        session_details,
    })
}

/// Matches `  <YYYY-MM-DD>: <H:MM:SS>` from the cumulative block.
fn is_cumulative_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((date, _)) => NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").is_ok(),
        None => false,
    }
}

fn parse_session_line(
    line: &str,
    date: NaiveDate,
    number: usize,
) -> Result<Option<SessionEntity>, ReportError> {
    let malformed = || ReportError::MalformedSession {
        line: number,
        text: line.to_string(),
    };

    let (_, times) = line.split_once(": ").ok_or_else(malformed)?;
    let (start, end) = times.split_once(" - ").ok_or_else(malformed)?;
    let start = resolve_clock(date, start.trim()).ok_or_else(malformed)?;
    let end = resolve_clock(date, end.trim()).ok_or_else(malformed)?;

    if end < start {
        return Err(ReportError::InvertedInterval { line: number });
    }
    if end == start {
        // A session shorter than a second collapses to equal clock times
        // in the report; at second granularity there is nothing to keep.
        debug!("Skipping zero-length session on line {number}: {line:?}");
        return Ok(None);
    }
    Ok(Some(SessionEntity { start, end }))
}

/// Rebuilds an instant from the date heading plus a 12-hour clock string.
/// A local time made ambiguous by a DST transition resolves to its earliest
/// valid instant; a nonexistent one fails the line.
fn resolve_clock(date: NaiveDate, text: &str) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(text, "%I:%M:%S %p").ok()?;
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|moment| moment.to_utc())
}
