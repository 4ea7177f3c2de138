use crate::alarm_store::{AlarmStore, StoreError};
use crate::announcer::Announcer;
use crate::models::{weekday_index, Alarm, AlarmPatch, AlarmTime};
use crate::ringing_session::RingingSession;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;

/// A wall-clock reading truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinuteStamp {
    pub date: NaiveDate,
    pub time: AlarmTime,
}

impl MinuteStamp {
    pub fn from_datetime(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            time: AlarmTime::from_naive(now.time()),
        }
    }

    pub fn weekday(&self) -> u8 {
        weekday_index(self.date)
    }
}

impl fmt::Display for MinuteStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Ringing,
}

#[derive(Debug)]
pub enum TickOutcome {
    AlreadyRinging,
    NoMatch,
    Triggered {
        alarm: Alarm,
        phrase: String,
        /// Set when a one-time alarm could not be saved as disabled. The
        /// alarm still rings and stays disabled in memory.
        disable_error: Option<StoreError>,
    },
}

/// Whether `alarm`'s schedule covers `now`, ignoring the fired-minute memo.
pub fn schedule_matches(alarm: &Alarm, now: &MinuteStamp) -> bool {
    if !alarm.enabled || alarm.time != now.time {
        return false;
    }
    if alarm.is_one_time {
        return alarm.one_time_date == Some(now.date);
    }
    alarm.days.any_selected() && alarm.days.repeats_on(now.weekday())
}

pub fn announcement_phrase(alarm: &Alarm) -> String {
    format!("It's {}. Time for {}.", alarm.time.format_12h(), alarm.task)
}

/// Decides once per tick whether an alarm should start ringing.
///
/// Only one alarm rings at a time. While ringing, ticks do nothing; after a
/// dismiss the next tick scans again. Each alarm remembers the minute it last
/// fired so sub-minute ticks cannot trigger it twice.
#[derive(Debug, Default)]
pub struct AlarmEngine {
    session: RingingSession,
    fired: HashMap<u64, MinuteStamp>,
}

impl AlarmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        if self.session.is_ringing() {
            EngineState::Ringing
        } else {
            EngineState::Idle
        }
    }

    pub fn session_mut(&mut self) -> &mut RingingSession {
        &mut self.session
    }

    pub fn active_alarm(&self) -> Option<&Alarm> {
        self.session.active()
    }

    /// Number of fired-minute entries held; bounded by distinct alarm ids.
    pub fn memo_len(&self) -> usize {
        self.fired.len()
    }

    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        store: &mut AlarmStore,
        announcer: &dyn Announcer,
    ) -> TickOutcome {
        if self.session.is_ringing() {
            return TickOutcome::AlreadyRinging;
        }

        let stamp = MinuteStamp::from_datetime(now);
        // Stored order is creation order, so the oldest alarm wins ties.
        let Some(alarm) = store
            .alarms()
            .iter()
            .find(|alarm| self.is_candidate(alarm, &stamp))
            .cloned()
        else {
            return TickOutcome::NoMatch;
        };

        self.fired.insert(alarm.id, stamp);
        tracing::info!(id = alarm.id, task = %alarm.task, at = %stamp, "alarm ringing");

        let mut disable_error = None;
        if alarm.is_one_time {
            if let Err(err) = store.update(alarm.id, AlarmPatch::enabled(false)) {
                tracing::warn!(id = alarm.id, error = %err, "could not save one-time alarm as disabled");
                disable_error = Some(err);
            }
        }

        let phrase = announcement_phrase(&alarm);
        self.session.activate(alarm.clone());
        announcer.announce(&phrase);

        TickOutcome::Triggered {
            alarm,
            phrase,
            disable_error,
        }
    }

    pub fn dismiss(&mut self, announcer: &dyn Announcer) -> Option<Alarm> {
        let dismissed = self.session.dismiss(announcer);
        if let Some(alarm) = &dismissed {
            tracing::info!(id = alarm.id, "alarm dismissed");
        }
        dismissed
    }

    fn is_candidate(&self, alarm: &Alarm, now: &MinuteStamp) -> bool {
        self.fired.get(&alarm.id) != Some(now) && schedule_matches(alarm, now)
    }
}

#[cfg(test)]
mod tests {
    use super::{schedule_matches, AlarmEngine, EngineState, MinuteStamp, TickOutcome};
    use crate::alarm_store::AlarmStore;
    use crate::announcer::testing::RecordingAnnouncer;
    use crate::data_manager::DataManager;
    use crate::models::{AlarmPatch, AlarmTime, Days, NewAlarm};
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use tempfile::TempDir;

    // 2025-01-06 is a Monday.
    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .expect("valid datetime")
    }

    fn empty_store() -> (TempDir, AlarmStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let manager = DataManager::new(dir.path()).expect("create manager");
        let store = AlarmStore::open(manager, false).expect("open store");
        (dir, store)
    }

    fn repeating(time: &str, task: &str, days: &[u8]) -> NewAlarm {
        NewAlarm {
            time: time.parse::<AlarmTime>().expect("valid time"),
            task: task.to_string(),
            days: Days::from_indices(days.iter().copied()),
            is_one_time: false,
            one_time_date: None,
        }
    }

    fn one_time(time: &str, task: &str, date: NaiveDate) -> NewAlarm {
        NewAlarm {
            time: time.parse::<AlarmTime>().expect("valid time"),
            task: task.to_string(),
            days: Days::default(),
            is_one_time: true,
            one_time_date: Some(date),
        }
    }

    fn triggered_id(outcome: &TickOutcome) -> Option<u64> {
        match outcome {
            TickOutcome::Triggered { alarm, .. } => Some(alarm.id),
            _ => None,
        }
    }

    #[test]
    fn wake_up_scenario_rings_once_and_announces() {
        let (_dir, mut store) = empty_store();
        let alarm = store
            .add(repeating("07:00", "Wake up", &[1]))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        let outcome = engine.tick(at(6, 7, 0, 2), &mut store, &announcer);
        assert_eq!(triggered_id(&outcome), Some(alarm.id));
        assert_eq!(engine.state(), EngineState::Ringing);
        assert_eq!(engine.active_alarm().map(|a| a.id), Some(alarm.id));
        assert_eq!(announcer.spoken().len(), 1);
        assert_eq!(announcer.spoken(), vec!["It's 7:00 AM. Time for Wake up.".to_string()]);

        let outcome = engine.tick(at(6, 7, 0, 7), &mut store, &announcer);
        assert!(matches!(outcome, TickOutcome::AlreadyRinging));
        assert_eq!(announcer.spoken().len(), 1);
    }

    #[test]
    fn fires_once_per_minute_even_after_dismiss() {
        let (_dir, mut store) = empty_store();
        store
            .add(repeating("07:00", "Wake up", &[1]))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        let mut fired = 0;
        let mut now = at(6, 7, 0, 0);
        while now < at(6, 7, 1, 0) {
            if triggered_id(&engine.tick(now, &mut store, &announcer)).is_some() {
                fired += 1;
            }
            engine.dismiss(&announcer);
            now += TimeDelta::seconds(5);
        }
        assert_eq!(fired, 1);
        assert_eq!(announcer.cancels(), 1);
    }

    #[test]
    fn repeating_alarm_fires_again_next_matching_day() {
        let (_dir, mut store) = empty_store();
        store
            .add(repeating("07:00", "Wake up", &[1, 2]))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        assert!(triggered_id(&engine.tick(at(6, 7, 0, 0), &mut store, &announcer)).is_some());
        engine.dismiss(&announcer);
        assert!(triggered_id(&engine.tick(at(7, 7, 0, 0), &mut store, &announcer)).is_some());
    }

    #[test]
    fn wrong_weekday_or_minute_does_not_fire() {
        let (_dir, mut store) = empty_store();
        store
            .add(repeating("07:00", "Wake up", &[1]))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        // Tuesday.
        assert!(matches!(
            engine.tick(at(7, 7, 0, 0), &mut store, &announcer),
            TickOutcome::NoMatch
        ));
        assert!(matches!(
            engine.tick(at(6, 7, 1, 0), &mut store, &announcer),
            TickOutcome::NoMatch
        ));
    }

    #[test]
    fn no_days_selected_never_fires() {
        let (_dir, mut store) = empty_store();
        let alarm = store
            .add(repeating("07:00", "Inert", &[]))
            .expect("add");
        let mut days = Days::default();
        for day in 0..7 {
            days.set(day, false);
        }
        store
            .update(
                alarm.id,
                AlarmPatch {
                    days: Some(days),
                    ..AlarmPatch::default()
                },
            )
            .expect("update");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        for day in 5..12 {
            let outcome = engine.tick(at(day, 7, 0, 0), &mut store, &announcer);
            assert!(matches!(outcome, TickOutcome::NoMatch));
        }
        assert!(store.get(alarm.id).expect("alarm").enabled);
    }

    #[test]
    fn disabled_alarm_is_never_evaluated() {
        let (_dir, mut store) = empty_store();
        let alarm = store
            .add(repeating("07:00", "Wake up", &[1]))
            .expect("add");
        store.toggle(alarm.id).expect("toggle");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        assert!(matches!(
            engine.tick(at(6, 7, 0, 0), &mut store, &announcer),
            TickOutcome::NoMatch
        ));
    }

    #[test]
    fn one_time_alarm_fires_on_its_date_and_disables_itself() {
        let (dir, mut store) = empty_store();
        let date = NaiveDate::from_ymd_opt(2025, 1, 8).expect("valid date");
        let alarm = store
            .add(one_time("09:15", "Dentist", date))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        assert!(matches!(
            engine.tick(at(7, 9, 15, 0), &mut store, &announcer),
            TickOutcome::NoMatch
        ));

        let outcome = engine.tick(at(8, 9, 15, 0), &mut store, &announcer);
        match outcome {
            TickOutcome::Triggered {
                alarm: fired,
                disable_error,
                ..
            } => {
                assert_eq!(fired.id, alarm.id);
                assert!(disable_error.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!store.get(alarm.id).expect("alarm").enabled);

        // Disabled state survives a restart.
        let reopened = AlarmStore::open(
            DataManager::new(dir.path()).expect("create manager"),
            false,
        )
        .expect("reopen");
        assert!(!reopened.get(alarm.id).expect("alarm").enabled);

        engine.dismiss(&announcer);
        let mut fresh_engine = AlarmEngine::new();
        assert!(matches!(
            fresh_engine.tick(at(8, 9, 15, 30), &mut store, &announcer),
            TickOutcome::NoMatch
        ));
    }

    #[test]
    fn one_time_mode_ignores_selected_days() {
        let (_dir, mut store) = empty_store();
        let alarm = store
            .add(repeating("07:00", "Wake up", &[1]))
            .expect("add");
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).expect("valid date");
        store
            .update(
                alarm.id,
                AlarmPatch {
                    is_one_time: Some(true),
                    one_time_date: Some(Some(date)),
                    ..AlarmPatch::default()
                },
            )
            .expect("update");
        let stored = store.get(alarm.id).expect("alarm").clone();
        assert!(stored.days.repeats_on(1));

        // Monday matches the days map but not the one-time date.
        assert!(!schedule_matches(
            &stored,
            &MinuteStamp::from_datetime(at(6, 7, 0, 0))
        ));
        assert!(schedule_matches(
            &stored,
            &MinuteStamp::from_datetime(at(9, 7, 0, 0))
        ));
    }

    #[test]
    fn simultaneous_alarms_pick_the_oldest_first() {
        let (_dir, mut store) = empty_store();
        let first = store
            .add(repeating("07:00", "First", &[1]))
            .expect("add");
        let second = store
            .add(repeating("07:00", "Second", &[1]))
            .expect("add");
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        let outcome = engine.tick(at(6, 7, 0, 0), &mut store, &announcer);
        assert_eq!(triggered_id(&outcome), Some(first.id));

        // Dismissed within the same minute: the other alarm is picked up.
        engine.dismiss(&announcer);
        let outcome = engine.tick(at(6, 7, 0, 5), &mut store, &announcer);
        assert_eq!(triggered_id(&outcome), Some(second.id));
    }

    #[test]
    fn memo_stays_bounded_by_alarm_count() {
        let (_dir, mut store) = empty_store();
        for task in ["A", "B", "C"] {
            store
                .add(repeating("07:00", task, &[0, 1, 2, 3, 4, 5, 6]))
                .expect("add");
        }
        let announcer = RecordingAnnouncer::default();
        let mut engine = AlarmEngine::new();

        let mut now = at(6, 6, 59, 0);
        for _ in 0..(12 * 60 * 24 * 3) {
            engine.tick(now, &mut store, &announcer);
            engine.dismiss(&announcer);
            now += TimeDelta::seconds(5);
        }
        assert_eq!(engine.memo_len(), 3);
    }
}
