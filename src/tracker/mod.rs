//! Session accounting: the Idle/Running timer state machine and every
//! operation that mutates tracked data. Each mutation persists the whole
//! state through [StateStorage] before it reports success.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    store::{entities::SessionEntity, state_file::StateStorage, TimeTrackerStore},
    utils::time::day_start,
};

/// User-input and selection failures. These abort the operation before any
/// state is mutated.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid clock time {input:?}, expected HH:MM or HH:MM:SS")]
    InvalidClockTime { input: String },
    #[error("stop time must be later than start time")]
    EndBeforeStart,
    #[error("no sessions recorded for {person} on {date}")]
    UnknownDate { person: String, date: NaiveDate },
    #[error("no session {number} on {date}, the day has {count}")]
    UnknownSession {
        date: NaiveDate,
        number: usize,
        count: usize,
    },
    #[error("the timer is not running")]
    TimerIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running { started_at: DateTime<Utc> },
}

/// Accounting engine scoped to one person. Owns the in-memory state and the
/// storage handle; the CLI hands both back when it is done.
pub struct Tracker<S> {
    store: TimeTrackerStore,
    storage: S,
    person: String,
    state: TimerState,
}

impl<S: StateStorage> Tracker<S> {
    pub fn new(store: TimeTrackerStore, storage: S, person: String) -> Self {
        Self {
            store,
            storage,
            person,
            state: TimerState::Idle,
        }
    }

    pub fn person(&self) -> &str {
        &self.person
    }

    pub fn store(&self) -> &TimeTrackerStore {
        &self.store
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Starts the live timer. A second start while already running is
    /// ignored, which is what guards against double invocation.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if let TimerState::Running { started_at } = self.state {
            debug!("Start ignored, timer already running since {started_at}");
            return;
        }
        self.state = TimerState::Running { started_at: now };
        info!("Started tracking for {}", self.person);
    }

    /// Live elapsed time, or None while idle.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.state {
            TimerState::Running { started_at } => Some(now - started_at),
            TimerState::Idle => None,
        }
    }

    /// Splits a running session when the local calendar date has moved past
    /// the date the timer was started on: everything before the most recent
    /// midnight goes to the start day, and the timer restarts at midnight.
    /// Calling this again within the same date is a no-op, so the 1-second
    /// tick cadence can invoke it freely.
    ///
    /// Returns whether a split happened.
    pub async fn check_midnight_crossing(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let TimerState::Running { started_at } = self.state else {
            return Ok(false);
        };
        let local_now = now.with_timezone(&Local);
        let started_day = started_at.with_timezone(&Local).date_naive();
        if local_now.date_naive() == started_day {
            return Ok(false);
        }

        let midnight = day_start(local_now).to_utc();
        let before_midnight = (midnight - started_at).num_milliseconds();
        self.store
            .add_duration(&self.person, started_day, before_midnight);
        self.store.ensure_day(&self.person, local_now.date_naive());
        self.state = TimerState::Running {
            started_at: midnight,
        };
        self.storage.save(&self.store).await?;

        info!(
            "Running session crossed midnight, {before_midnight}ms allocated to {started_day}"
        );
        Ok(true)
    }

    /// Stops the timer, adds the elapsed time to today's total, and records
    /// the session. A stop within the same millisecond as the start records
    /// nothing, which keeps every stored session at `end > start`.
    pub async fn stop(&mut self, now: DateTime<Utc>) -> Result<Option<SessionEntity>> {
        let TimerState::Running { started_at } = self.state else {
            return Err(TrackerError::TimerIdle.into());
        };

        let session = SessionEntity {
            start: started_at,
            end: now,
        };
        if session.duration_ms() <= 0 {
            self.state = TimerState::Idle;
            info!(
                "Stopped tracking for {} with nothing elapsed, no session recorded",
                self.person
            );
            return Ok(None);
        }

        let today = now.with_timezone(&Local).date_naive();
        self.store
            .add_duration(&self.person, today, session.duration_ms());
        self.store.push_session(&self.person, today, session);
        self.storage.save(&self.store).await?;

        self.state = TimerState::Idle;
        info!(
            "Stopped tracking for {}, recorded {}ms on {today}",
            self.person,
            session.duration_ms()
        );
        Ok(Some(session))
    }

    /// Adds a hand-entered interval of two wall-clock times to the current
    /// day's total. No session record is created, so the day's total can
    /// exceed the sum of its sessions and the added time will not survive
    /// an export/import round trip.
    pub async fn add_manual_time(
        &mut self,
        start: &str,
        end: &str,
        now: DateTime<Utc>,
    ) -> Result<Duration> {
        let start = parse_clock_time(start)?;
        let end = parse_clock_time(end)?;
        if end <= start {
            return Err(TrackerError::EndBeforeStart.into());
        }

        let duration = end - start;
        let today = now.with_timezone(&Local).date_naive();
        self.store
            .add_duration(&self.person, today, duration.num_milliseconds());
        self.storage.save(&self.store).await?;

        warn!(
            "Manual entry of {}ms on {today} has no session record backing it",
            duration.num_milliseconds()
        );
        Ok(duration)
    }

    /// Deletes one recorded session, identified by the 1-based number shown
    /// in the status listing. The session's duration is subtracted from the
    /// day total, and emptied date entries disappear from both maps.
    pub async fn delete_session(&mut self, date: NaiveDate, number: usize) -> Result<SessionEntity> {
        let count = self
            .store
            .session_count(&self.person, date)
            .ok_or_else(|| TrackerError::UnknownDate {
                person: self.person.clone(),
                date,
            })?;
        if number == 0 || number > count {
            return Err(TrackerError::UnknownSession {
                date,
                number,
                count,
            }
            .into());
        }

        let removed = self
            .store
            .take_session(&self.person, date, number - 1)
            .ok_or_else(|| TrackerError::UnknownDate {
                person: self.person.clone(),
                date,
            })?;
        self.store
            .subtract_duration(&self.person, date, removed.duration_ms());
        self.storage.save(&self.store).await?;

        info!(
            "Deleted session {number} of {date} for {} ({}ms)",
            self.person,
            removed.duration_ms()
        );
        Ok(removed)
    }
}

fn parse_clock_time(input: &str) -> Result<NaiveTime, TrackerError> {
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .map_err(|_| TrackerError::InvalidClockTime {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

    use crate::store::{state_file::MockStateStorage, TimeTrackerStore};

    use super::{Tracker, TimerState, TrackerError};

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .to_utc()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn saving_storage() -> MockStateStorage {
        let mut storage = MockStateStorage::new();
        storage.expect_save().returning(|_| Ok(()));
        storage
    }

    fn tracker() -> Tracker<MockStateStorage> {
        Tracker::new(
            TimeTrackerStore::default(),
            saving_storage(),
            "alice".into(),
        )
    }

    #[tokio::test]
    async fn test_session_durations_sum_to_day_total() -> Result<()> {
        let mut tracker = tracker();

        tracker.start(local(2024, 1, 1, 9, 0, 0));
        tracker.stop(local(2024, 1, 1, 10, 30, 0)).await?;
        tracker.start(local(2024, 1, 1, 13, 0, 0));
        tracker.stop(local(2024, 1, 1, 13, 45, 0)).await?;

        let day = date("2024-01-01");
        let total = *tracker.store().totals_for("alice").unwrap().get(&day).unwrap();
        let session_sum: i64 = tracker.store().sessions_for("alice").unwrap()[&day]
            .iter()
            .map(|s| s.duration_ms())
            .sum();

        assert_eq!(total, session_sum);
        assert_eq!(total, (90 + 45) * 60_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_double_start_is_ignored() {
        let mut tracker = tracker();
        let first = local(2024, 1, 1, 9, 0, 0);

        tracker.start(first);
        tracker.start(local(2024, 1, 1, 9, 5, 0));

        assert_eq!(tracker.state(), TimerState::Running { started_at: first });
    }

    #[tokio::test]
    async fn test_stop_while_idle_fails() {
        let mut tracker = Tracker::new(
            TimeTrackerStore::default(),
            MockStateStorage::new(),
            "alice".into(),
        );
        let err = tracker.stop(local(2024, 1, 1, 9, 0, 0)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::TimerIdle)
        ));
    }

    #[tokio::test]
    async fn test_stop_without_elapsed_time_records_nothing() -> Result<()> {
        // No save expectation: stopping with nothing elapsed must not
        // persist anything.
        let mut tracker = Tracker::new(
            TimeTrackerStore::default(),
            MockStateStorage::new(),
            "alice".into(),
        );
        let instant = local(2024, 1, 1, 9, 0, 0);

        tracker.start(instant);
        assert!(tracker.stop(instant).await?.is_none());

        assert_eq!(tracker.state(), TimerState::Idle);
        assert!(tracker.store().totals_for("alice").is_none());
        assert!(tracker.store().sessions_for("alice").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_midnight_crossing_splits_at_local_midnight() -> Result<()> {
        let mut tracker = tracker();

        tracker.start(local(2024, 1, 1, 23, 30, 0));
        let crossed = tracker
            .check_midnight_crossing(local(2024, 1, 2, 0, 5, 0))
            .await?;
        assert!(crossed);

        // 30 minutes land on day one, the timer restarts at midnight.
        let totals = tracker.store().totals_for("alice").unwrap();
        assert_eq!(totals[&date("2024-01-01")], 30 * 60_000);
        assert_eq!(totals[&date("2024-01-02")], 0);
        assert_eq!(
            tracker.state(),
            TimerState::Running {
                started_at: local(2024, 1, 2, 0, 0, 0)
            }
        );

        // Stopping at 00:30 allocates the remainder to day two.
        tracker.stop(local(2024, 1, 2, 0, 30, 0)).await?;
        let totals = tracker.store().totals_for("alice").unwrap();
        assert_eq!(totals[&date("2024-01-02")], 30 * 60_000);

        let sessions = tracker.store().sessions_for("alice").unwrap();
        assert_eq!(sessions[&date("2024-01-02")].len(), 1);
        assert_eq!(
            sessions[&date("2024-01-02")][0].start,
            local(2024, 1, 2, 0, 0, 0)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_midnight_crossing_is_idempotent_within_a_date() -> Result<()> {
        let mut tracker = tracker();

        tracker.start(local(2024, 1, 1, 23, 30, 0));
        assert!(
            tracker
                .check_midnight_crossing(local(2024, 1, 2, 0, 5, 0))
                .await?
        );
        assert!(
            !tracker
                .check_midnight_crossing(local(2024, 1, 2, 0, 5, 1))
                .await?
        );

        let totals = tracker.store().totals_for("alice").unwrap();
        assert_eq!(totals[&date("2024-01-01")], 30 * 60_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_midnight_without_crossing_is_noop() -> Result<()> {
        let mut tracker = Tracker::new(
            TimeTrackerStore::default(),
            MockStateStorage::new(),
            "alice".into(),
        );
        tracker.start(local(2024, 1, 1, 9, 0, 0));
        assert!(
            !tracker
                .check_midnight_crossing(local(2024, 1, 1, 23, 59, 59))
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_add_manual_time() -> Result<()> {
        let mut tracker = tracker();
        let now = local(2024, 1, 5, 12, 0, 0);

        let added = tracker.add_manual_time("09:00", "10:30", now).await?;
        assert_eq!(added.num_milliseconds(), 90 * 60_000);

        let totals = tracker.store().totals_for("alice").unwrap();
        assert_eq!(totals[&date("2024-01-05")], 90 * 60_000);
        // Manual entries never create session records.
        assert!(tracker.store().sessions_for("alice").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_add_manual_time_rejects_end_before_start() {
        // No save expectation: a rejected entry must not persist anything.
        let mut tracker = Tracker::new(
            TimeTrackerStore::default(),
            MockStateStorage::new(),
            "alice".into(),
        );
        let now = local(2024, 1, 5, 12, 0, 0);

        for (start, end) in [("10:30", "09:00"), ("09:00", "09:00")] {
            let err = tracker.add_manual_time(start, end, now).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<TrackerError>(),
                Some(TrackerError::EndBeforeStart)
            ));
        }
        assert!(tracker.store().totals_for("alice").is_none());
    }

    #[tokio::test]
    async fn test_add_manual_time_rejects_garbage() {
        let mut tracker = Tracker::new(
            TimeTrackerStore::default(),
            MockStateStorage::new(),
            "alice".into(),
        );
        let err = tracker
            .add_manual_time("nine", "10:00", local(2024, 1, 5, 12, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::InvalidClockTime { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_one_of_several_sessions() -> Result<()> {
        let mut tracker = tracker();
        let day = date("2024-01-01");

        tracker.start(local(2024, 1, 1, 9, 0, 0));
        tracker.stop(local(2024, 1, 1, 10, 0, 0)).await?;
        tracker.start(local(2024, 1, 1, 11, 0, 0));
        tracker.stop(local(2024, 1, 1, 11, 30, 0)).await?;

        let removed = tracker.delete_session(day, 1).await?;
        assert_eq!(removed.duration_ms(), 60 * 60_000);

        let totals = tracker.store().totals_for("alice").unwrap();
        assert_eq!(totals[&day], 30 * 60_000);
        assert_eq!(tracker.store().session_count("alice", day), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_last_session_removes_date_from_both_maps() -> Result<()> {
        let mut tracker = tracker();
        let day = date("2024-01-01");

        tracker.start(local(2024, 1, 1, 9, 0, 0));
        tracker.stop(local(2024, 1, 1, 10, 0, 0)).await?;

        tracker.delete_session(day, 1).await?;
        assert!(tracker.store().totals_for("alice").is_none());
        assert!(tracker.store().sessions_for("alice").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_with_bad_selection_fails_validation() -> Result<()> {
        let mut tracker = tracker();
        let day = date("2024-01-01");

        tracker.start(local(2024, 1, 1, 9, 0, 0));
        tracker.stop(local(2024, 1, 1, 10, 0, 0)).await?;

        let err = tracker
            .delete_session(date("2024-01-02"), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::UnknownDate { .. })
        ));

        for number in [0, 2] {
            let err = tracker.delete_session(day, number).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<TrackerError>(),
                Some(TrackerError::UnknownSession { .. })
            ));
        }

        // The failed deletions left the data untouched.
        assert_eq!(tracker.store().session_count("alice", day), Some(1));
        Ok(())
    }
}
