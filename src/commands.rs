use crate::alarm_editor::{blank_draft, confirmation_phrase, normalize_time, AlarmDraft};
use crate::alarm_service::AlarmService;
use crate::app_error::AppError;
use crate::events::AlarmEvent;
use crate::models::{Alarm, AlarmTime, WEEKDAY_NAMES};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

/// Fields given on the command line; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmEdits {
    pub time: Option<String>,
    pub task: Option<String>,
    pub days: Option<Vec<u8>>,
    pub date: Option<String>,
    pub once: bool,
}

impl AlarmEdits {
    /// Choosing days makes the alarm repeating; choosing a date makes it
    /// one-time.
    pub fn apply_to(self, mut draft: AlarmDraft) -> AlarmDraft {
        if let Some(time) = self.time {
            draft.time = Some(time);
        }
        if let Some(task) = self.task {
            draft.task = task;
        }
        if let Some(days) = self.days {
            draft.days = days;
            draft.is_one_time = false;
        }
        if let Some(date) = self.date {
            draft.one_time_date = Some(date);
            draft.is_one_time = true;
        }
        if self.once {
            draft.is_one_time = true;
        }
        draft
    }
}

pub fn list_alarms(service: &AlarmService) -> Result<Vec<Alarm>, String> {
    service.alarms().map_err(|err| report_error(service, err))
}

/// Creates an alarm. Time defaults to the current minute, and a one-time
/// alarm without a date is set for today.
pub fn add_alarm(service: &AlarmService, edits: AlarmEdits) -> Result<Alarm, String> {
    let mut base = blank_draft(service.now());
    base.days.clear();
    if edits.date.is_none() && !edits.once {
        base.one_time_date = None;
    }
    let draft = edits.apply_to(base);
    let alarm = service
        .create(&draft)
        .map_err(|err| report_error(service, err))?;
    service.announce(&confirmation_phrase(&alarm));
    Ok(alarm)
}

pub fn edit_alarm(service: &AlarmService, id: u64, edits: AlarmEdits) -> Result<Alarm, String> {
    let existing = service
        .get(id)
        .map_err(|err| report_error(service, err))?
        .ok_or_else(|| alarm_not_found(id))?;
    let draft = edits.apply_to(AlarmDraft::from(&existing));
    service
        .update(id, &draft)
        .map_err(|err| report_error(service, err))?;
    let updated = service
        .get(id)
        .map_err(|err| report_error(service, err))?
        .ok_or_else(|| alarm_not_found(id))?;
    service.announce(&confirmation_phrase(&updated));
    Ok(updated)
}

pub fn toggle_alarm(service: &AlarmService, id: u64) -> Result<Option<Alarm>, String> {
    service
        .toggle(id)
        .map_err(|err| report_error(service, err))?;
    service.get(id).map_err(|err| report_error(service, err))
}

pub fn delete_alarm(service: &AlarmService, id: u64) -> Result<(), String> {
    service
        .delete(id)
        .map_err(|err| report_error(service, err))
}

pub fn suggest_task(service: &AlarmService, time: Option<&str>) -> Result<String, String> {
    let time = match time {
        Some(raw) => normalize_time(raw).map_err(|err| report_error(service, err.into()))?,
        None => AlarmTime::from_naive(service.now().time()),
    };
    Ok(service.suggest_task(time))
}

pub fn dismiss_alarm(service: &AlarmService) -> Result<Option<Alarm>, String> {
    service.dismiss().map_err(|err| report_error(service, err))
}

pub fn motivate(service: &AlarmService) -> Result<Option<String>, String> {
    service.motivate().map_err(|err| report_error(service, err))
}

/// Rings alarms and reacts to input lines until `q` or `shutdown`. Enter or
/// `d` dismisses, `m` motivates. Closed input only stops reading; the clock
/// keeps being watched.
pub async fn watch<R, S>(
    service: &AlarmService,
    period: Duration,
    input: R,
    shutdown: S,
) -> Result<(), String>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut events = service.subscribe_events();
    let ticker = service.start_ticker(period);
    let mut lines = input.lines();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if handle_input(service, line.trim())? {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("input closed; watching until shutdown");
                    input_open = false;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "input unreadable; watching until shutdown");
                    input_open = false;
                }
            },
            () = &mut shutdown => break,
        }
    }

    ticker.stop();
    dismiss_alarm(service)?;
    tracing::info!("alarm watcher stopped");
    Ok(())
}

// Returns true when the watcher should stop.
fn handle_input(service: &AlarmService, input: &str) -> Result<bool, String> {
    match input {
        "" | "d" => {
            if dismiss_alarm(service)?.is_none() {
                println!("nothing is ringing");
            }
        }
        "m" => {
            if motivate(service)?.is_none() {
                println!("nothing to motivate");
            }
        }
        "q" => return Ok(true),
        other => println!("unknown input: {other}"),
    }
    Ok(false)
}

fn print_event(event: &AlarmEvent) {
    match event {
        AlarmEvent::Ringing { alarm, phrase } => {
            println!("RINGING #{} {}: {phrase}", alarm.id, alarm.task);
        }
        AlarmEvent::Dismissed { alarm_id } => println!("dismissed #{alarm_id}"),
        AlarmEvent::AlarmsChanged { count } => println!("{count} alarm(s) stored"),
        AlarmEvent::Motivation { text } => println!("{text}"),
        AlarmEvent::AppError(payload) => eprintln!("error: {}", payload.message),
    }
}

pub fn format_alarm(alarm: &Alarm) -> String {
    let status = if alarm.enabled { "on " } else { "off" };
    let schedule = if alarm.is_one_time {
        match alarm.one_time_date {
            Some(date) => format!("once {}", date.format("%Y-%m-%d")),
            None => "once (no date)".to_string(),
        }
    } else {
        let days: Vec<&str> = alarm
            .days
            .selected()
            .filter_map(|day| WEEKDAY_NAMES.get(usize::from(day)).copied())
            .collect();
        if days.is_empty() {
            "no days".to_string()
        } else {
            days.join(" ")
        }
    };
    format!(
        "#{:<3} {} [{status}] {:<24} {schedule}",
        alarm.id, alarm.time, alarm.task
    )
}

fn alarm_not_found(id: u64) -> String {
    format!("Alarm not found: {id}")
}

fn report_error(service: &AlarmService, error: AppError) -> String {
    service.report(&error);
    if let Some(detail) = error.detail() {
        tracing::error!(kind = ?error.kind(), detail, "{}", error.message());
    } else {
        tracing::warn!(kind = ?error.kind(), "{}", error.message());
    }
    error.message().to_string()
}
