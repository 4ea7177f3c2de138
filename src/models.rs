use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: u64,
    pub time: AlarmTime,
    pub task: String,
    #[serde(default)]
    pub days: Days,
    pub enabled: bool,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default, with = "one_time_date")]
    pub one_time_date: Option<NaiveDate>,
}

impl Alarm {
    pub fn apply(&mut self, patch: AlarmPatch) {
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(task) = patch.task {
            self.task = task;
        }
        if let Some(days) = patch.days {
            self.days = days;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(is_one_time) = patch.is_one_time {
            self.is_one_time = is_one_time;
        }
        if let Some(one_time_date) = patch.one_time_date {
            self.one_time_date = one_time_date;
        }
    }
}

/// Fields of an alarm that does not exist yet. The store assigns the id and
/// enables it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlarm {
    pub time: AlarmTime,
    pub task: String,
    pub days: Days,
    pub is_one_time: bool,
    pub one_time_date: Option<NaiveDate>,
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmPatch {
    pub time: Option<AlarmTime>,
    pub task: Option<String>,
    pub days: Option<Days>,
    pub enabled: Option<bool>,
    pub is_one_time: Option<bool>,
    pub one_time_date: Option<Option<NaiveDate>>,
}

impl AlarmPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

/// Time of day at minute resolution, always rendered as `HH:mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmTime {
    minute_of_day: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day: {0}")]
pub struct InvalidTime(pub String);

impl AlarmTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minute_of_day: (hour * 60 + minute) as u16,
        })
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            minute_of_day: (time.hour() * 60 + time.minute()) as u16,
        }
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minute_of_day / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minute_of_day % 60)
    }

    pub fn to_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or_default()
    }

    /// `7:05 AM` style, used in spoken phrases.
    pub fn format_12h(&self) -> String {
        self.to_naive().format("%-I:%M %p").to_string()
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for AlarmTime {
    type Err = InvalidTime;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTime(value.to_string());
        let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        if !digits(hour) || !digits(minute) {
            return Err(invalid());
        }
        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for AlarmTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AlarmTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Weekday selection keyed by index, 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Days(BTreeMap<u8, bool>);

impl Days {
    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> Self {
        Self(indices.into_iter().map(|day| (day, true)).collect())
    }

    pub fn set(&mut self, weekday: u8, selected: bool) {
        self.0.insert(weekday, selected);
    }

    pub fn repeats_on(&self, weekday: u8) -> bool {
        self.0.get(&weekday).copied().unwrap_or(false)
    }

    pub fn any_selected(&self) -> bool {
        self.0.values().any(|selected| *selected)
    }

    pub fn selected(&self) -> impl Iterator<Item = u8> + '_ {
        self.0
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(day, _)| *day)
    }
}

pub const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps (reduced to their local date).
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    })
}

mod one_time_date {
    use super::parse_calendar_date;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_calendar_date(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid oneTimeDate: {raw}"))
            }),
        }
    }
}
