use crate::alarm_store::{AlarmStore, StoreError};
use crate::models::{
    parse_calendar_date, weekday_index, Alarm, AlarmPatch, AlarmTime, Days, NewAlarm,
    WEEKDAY_NAMES,
};
use crate::suggest::{clean_suggestion, Suggester};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};

const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

const WEEKDAY_FULL_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Alarm fields as entered by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmDraft {
    pub time: Option<String>,
    pub task: String,
    pub days: Vec<u8>,
    pub is_one_time: bool,
    pub one_time_date: Option<String>,
}

impl From<&Alarm> for AlarmDraft {
    fn from(alarm: &Alarm) -> Self {
        Self {
            time: Some(alarm.time.to_string()),
            task: alarm.task.clone(),
            days: alarm.days.selected().collect(),
            is_one_time: alarm.is_one_time,
            one_time_date: alarm
                .one_time_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
        }
    }
}

/// A draft that passed validation, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAlarm {
    pub time: AlarmTime,
    pub task: String,
    pub days: Days,
    pub is_one_time: bool,
    pub one_time_date: Option<NaiveDate>,
}

impl ValidAlarm {
    fn into_new_alarm(self) -> NewAlarm {
        NewAlarm {
            time: self.time,
            task: self.task,
            days: self.days,
            is_one_time: self.is_one_time,
            one_time_date: self.one_time_date,
        }
    }

    fn into_patch(self) -> AlarmPatch {
        AlarmPatch {
            time: Some(self.time),
            task: Some(self.task),
            days: Some(self.days),
            enabled: None,
            is_one_time: Some(self.is_one_time),
            one_time_date: Some(self.one_time_date),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("alarm time is required")]
    MissingTime,
    #[error("unrecognised time of day: {0}")]
    InvalidTime(String),
    #[error("task must not be empty")]
    EmptyTask,
    #[error("select at least one day for a repeating alarm")]
    NoDaysSelected,
    #[error("weekday {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    InvalidWeekday(u8),
    #[error("a date is required for a one-time alarm")]
    MissingDate,
    #[error("unrecognised date: {0}")]
    InvalidDate(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn validate(draft: &AlarmDraft) -> Result<ValidAlarm, EditorError> {
    let time = match draft.time.as_deref().map(str::trim) {
        None | Some("") => return Err(EditorError::MissingTime),
        Some(raw) => normalize_time(raw)?,
    };

    let task = draft.task.trim();
    if task.is_empty() {
        return Err(EditorError::EmptyTask);
    }

    if let Some(day) = draft.days.iter().copied().find(|day| *day > 6) {
        return Err(EditorError::InvalidWeekday(day));
    }
    let days = Days::from_indices(draft.days.iter().copied());

    let one_time_date = if draft.is_one_time {
        match draft.one_time_date.as_deref().map(str::trim) {
            None | Some("") => return Err(EditorError::MissingDate),
            Some(raw) => Some(normalize_date(raw)?),
        }
    } else {
        if !days.any_selected() {
            return Err(EditorError::NoDaysSelected);
        }
        None
    };

    Ok(ValidAlarm {
        time,
        task: task.to_string(),
        days,
        is_one_time: draft.is_one_time,
        one_time_date,
    })
}

/// Validates and stores a new alarm. Nothing is written when validation fails.
pub fn create(store: &mut AlarmStore, draft: &AlarmDraft) -> Result<Alarm, EditorError> {
    let valid = validate(draft)?;
    Ok(store.add(valid.into_new_alarm())?)
}

/// Validates and applies a draft to an existing alarm. `enabled` is left as is;
/// an unknown id is a no-op.
pub fn update(store: &mut AlarmStore, id: u64, draft: &AlarmDraft) -> Result<(), EditorError> {
    let valid = validate(draft)?;
    Ok(store.update(id, valid.into_patch())?)
}

/// Accepts `HH:mm`, `H:mm`, `HH:mm:ss`, `h:mm AM` and RFC 3339 timestamps.
pub fn normalize_time(raw: &str) -> Result<AlarmTime, EditorError> {
    let value = raw.trim().to_ascii_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&value, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Local).time())
        })
        .map(AlarmTime::from_naive)
        .ok_or_else(|| EditorError::InvalidTime(raw.to_string()))
}

pub fn normalize_date(raw: &str) -> Result<NaiveDate, EditorError> {
    parse_calendar_date(raw).ok_or_else(|| EditorError::InvalidDate(raw.to_string()))
}

/// Weekday index from a number (`0`..`6`) or an English name (`mon`, `Monday`).
pub fn parse_weekday(raw: &str) -> Option<u8> {
    let value = raw.trim();
    if let Ok(index) = value.parse::<u8>() {
        return (index <= 6).then_some(index);
    }
    let lower = value.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    WEEKDAY_FULL_NAMES
        .iter()
        .position(|name| name.starts_with(&lower))
        .map(|index| index as u8)
}

pub fn suggest_task(suggester: &dyn Suggester, time: AlarmTime) -> String {
    let prompt = format!(
        "Suggest a short motivating task for an alarm at {}",
        time.format_12h()
    );
    clean_suggestion(&suggester.suggest(&prompt))
}

/// What gets spoken after an alarm is saved.
pub fn confirmation_phrase(alarm: &Alarm) -> String {
    let mut phrase = format!("Alarm set for {} at {}", alarm.task, alarm.time.format_12h());
    if alarm.is_one_time {
        if let Some(date) = alarm.one_time_date {
            phrase.push_str(&format!(" on {}", date.format("%B %-d")));
        }
    } else {
        let days: Vec<&str> = alarm
            .days
            .selected()
            .filter_map(|day| WEEKDAY_NAMES.get(usize::from(day)).copied())
            .collect();
        if days.len() == 7 {
            phrase.push_str(" every day");
        } else if !days.is_empty() {
            phrase.push_str(&format!(" on {}", days.join(", ")));
        }
    }
    phrase
}

/// The draft a new-alarm form starts from: the current minute, today's date.
pub fn blank_draft(now: NaiveDateTime) -> AlarmDraft {
    AlarmDraft {
        time: Some(AlarmTime::from_naive(now.time()).to_string()),
        task: String::new(),
        days: vec![weekday_index(now.date())],
        is_one_time: false,
        one_time_date: Some(now.date().format("%Y-%m-%d").to_string()),
    }
}
