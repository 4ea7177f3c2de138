use crate::app_error::AppErrorPayload;
use crate::models::Alarm;
use serde::Serialize;
use tokio::sync::broadcast;

const ALARM_RINGING_EVENT: &str = "alarm-ringing";
const ALARM_DISMISSED_EVENT: &str = "alarm-dismissed";
const ALARMS_CHANGED_EVENT: &str = "alarms-changed";
const MOTIVATION_EVENT: &str = "motivation";
const APP_ERROR_EVENT: &str = "app-error";

pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AlarmEvent {
    Ringing { alarm: Alarm, phrase: String },
    Dismissed { alarm_id: u64 },
    AlarmsChanged { count: usize },
    Motivation { text: String },
    AppError(AppErrorPayload),
}

impl AlarmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AlarmEvent::Ringing { .. } => ALARM_RINGING_EVENT,
            AlarmEvent::Dismissed { .. } => ALARM_DISMISSED_EVENT,
            AlarmEvent::AlarmsChanged { .. } => ALARMS_CHANGED_EVENT,
            AlarmEvent::Motivation { .. } => MOTIVATION_EVENT,
            AlarmEvent::AppError(_) => APP_ERROR_EVENT,
        }
    }
}

pub type EventSender = broadcast::Sender<AlarmEvent>;

fn emit_event(events: &EventSender, event: AlarmEvent) {
    let name = event.name();
    if let Err(err) = events.send(event) {
        // Nobody is listening; not an error for a headless run.
        tracing::debug!(event = name, error = %err, "event dropped");
    }
}

pub fn emit_ringing(events: &EventSender, alarm: Alarm, phrase: String) {
    emit_event(events, AlarmEvent::Ringing { alarm, phrase });
}

pub fn emit_dismissed(events: &EventSender, alarm_id: u64) {
    emit_event(events, AlarmEvent::Dismissed { alarm_id });
}

pub fn emit_alarms_changed(events: &EventSender, count: usize) {
    emit_event(events, AlarmEvent::AlarmsChanged { count });
}

pub fn emit_motivation(events: &EventSender, text: String) {
    emit_event(events, AlarmEvent::Motivation { text });
}

pub fn emit_app_error(events: &EventSender, payload: AppErrorPayload) {
    emit_event(events, AlarmEvent::AppError(payload));
}
