//! Owned, typed replacement for the ambient `trackedTimes`/`sessionDetails`
//! globals of the original tool. All nested-container creation is explicit
//! through the accessors here; callers never reach into the maps directly.

pub mod entities;
pub mod state_file;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use entities::SessionEntity;

/// Cumulative tracked milliseconds per day.
pub type DayTotals = BTreeMap<NaiveDate, i64>;
/// Recorded sessions per day, in append (chronological) order.
pub type DaySessions = BTreeMap<NaiveDate, Vec<SessionEntity>>;

/// The whole persisted state: the active person plus both data maps,
/// saved and loaded as one document.
///
/// Invariant: for every person and date, the tracked total equals the sum
/// of that day's session durations plus any manually added time. Manual
/// additions touch only the totals, so the total may exceed the session
/// sum; see [crate::tracker::Tracker::add_manual_time].
#[derive(PartialEq, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeTrackerStore {
    pub current_person: Option<String>,
    pub tracked_times: BTreeMap<String, DayTotals>,
    pub session_details: BTreeMap<String, DaySessions>,
}

impl TimeTrackerStore {
    /// Adds tracked milliseconds to a day, creating person and day buckets
    /// as needed.
    pub fn add_duration(&mut self, person: &str, date: NaiveDate, ms: i64) {
        *self
            .tracked_times
            .entry(person.to_string())
            .or_default()
            .entry(date)
            .or_insert(0) += ms;
    }

    /// Makes sure a (possibly zero) total entry exists for the day. Used
    /// when a running timer rolls over into a new date.
    pub fn ensure_day(&mut self, person: &str, date: NaiveDate) {
        self.tracked_times
            .entry(person.to_string())
            .or_default()
            .entry(date)
            .or_insert(0);
    }

    pub fn push_session(&mut self, person: &str, date: NaiveDate, session: SessionEntity) {
        self.session_details
            .entry(person.to_string())
            .or_default()
            .entry(date)
            .or_default()
            .push(session);
    }

    pub fn totals_for(&self, person: &str) -> Option<&DayTotals> {
        self.tracked_times.get(person)
    }

    pub fn sessions_for(&self, person: &str) -> Option<&DaySessions> {
        self.session_details.get(person)
    }

    pub fn session_count(&self, person: &str, date: NaiveDate) -> Option<usize> {
        self.session_details.get(person)?.get(&date).map(Vec::len)
    }

    /// Removes the session at `index` (0-based). Emptied date and person
    /// buckets are dropped rather than kept around empty.
    pub fn take_session(
        &mut self,
        person: &str,
        date: NaiveDate,
        index: usize,
    ) -> Option<SessionEntity> {
        let days = self.session_details.get_mut(person)?;
        let sessions = days.get_mut(&date)?;
        if index >= sessions.len() {
            return None;
        }
        let removed = sessions.remove(index);
        if sessions.is_empty() {
            days.remove(&date);
        }
        if days.is_empty() {
            self.session_details.remove(person);
        }
        Some(removed)
    }

    /// Subtracts from a day's total. A total at or below zero removes the
    /// day entry entirely, and a person with no remaining days is dropped.
    pub fn subtract_duration(&mut self, person: &str, date: NaiveDate, ms: i64) {
        let Some(days) = self.tracked_times.get_mut(person) else {
            return;
        };
        if let Some(total) = days.get_mut(&date) {
            *total -= ms;
            if *total <= 0 {
                days.remove(&date);
            }
        }
        if days.is_empty() {
            self.tracked_times.remove(person);
        }
    }

    /// Replaces both data maps with one person's imported data. This is a
    /// full overwrite, not a merge; only the active-person selection
    /// survives.
    pub fn replace_data(&mut self, person: String, totals: DayTotals, sessions: DaySessions) {
        self.tracked_times = BTreeMap::from([(person.clone(), totals)]);
        self.session_details = BTreeMap::from([(person, sessions)]);
    }
}
