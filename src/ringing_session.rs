use crate::announcer::Announcer;
use crate::models::Alarm;
use crate::suggest::{clean_suggestion, Suggester};

/// The alarm that is currently ringing, if any.
#[derive(Debug, Default)]
pub struct RingingSession {
    active: Option<Alarm>,
    motivation: Option<String>,
}

impl RingingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ringing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&Alarm> {
        self.active.as_ref()
    }

    pub fn motivation(&self) -> Option<&str> {
        self.motivation.as_deref()
    }

    pub(crate) fn activate(&mut self, alarm: Alarm) {
        self.active = Some(alarm);
        self.motivation = None;
    }

    /// Stops ringing and silences any announcement in flight. Returns the
    /// alarm that was ringing.
    pub fn dismiss(&mut self, announcer: &dyn Announcer) -> Option<Alarm> {
        let dismissed = self.active.take();
        self.motivation = None;
        if dismissed.is_some() {
            announcer.cancel();
        }
        dismissed
    }

    /// Asks for a short motivational line about the ringing alarm's task and
    /// speaks it. Returns `None` when idle or when nothing was suggested.
    pub fn motivate(
        &mut self,
        suggester: &dyn Suggester,
        announcer: &dyn Announcer,
    ) -> Option<String> {
        let alarm = self.active.as_ref()?;
        let prompt = format!(
            "Generate a short, powerful, and unique motivational quote related to the task: \"{}\". Make it sound like a personal reminder.",
            alarm.task
        );
        let message = clean_suggestion(&suggester.suggest(&prompt));
        if message.is_empty() {
            return None;
        }
        announcer.announce(&message);
        self.motivation = Some(message.clone());
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::RingingSession;
    use crate::announcer::testing::RecordingAnnouncer;
    use crate::models::{Alarm, AlarmTime, Days};
    use crate::suggest::testing::CannedSuggester;
    use crate::suggest::NoopSuggester;

    fn sample_alarm() -> Alarm {
        Alarm {
            id: 3,
            time: AlarmTime::new(6, 30).expect("valid time"),
            task: "Study".to_string(),
            days: Days::from_indices([2]),
            enabled: true,
            is_one_time: false,
            one_time_date: None,
        }
    }

    #[test]
    fn dismiss_clears_alarm_and_cancels_speech() {
        let announcer = RecordingAnnouncer::default();
        let mut session = RingingSession::new();
        session.activate(sample_alarm());
        assert!(session.is_ringing());

        let dismissed = session.dismiss(&announcer).expect("dismissed alarm");
        assert_eq!(dismissed.id, 3);
        assert!(session.active().is_none());
        assert_eq!(announcer.cancels(), 1);
    }

    #[test]
    fn dismiss_when_idle_is_a_no_op() {
        let announcer = RecordingAnnouncer::default();
        let mut session = RingingSession::new();
        assert!(session.dismiss(&announcer).is_none());
        assert_eq!(announcer.cancels(), 0);
    }

    #[test]
    fn motivate_speaks_and_keeps_the_suggestion() {
        let announcer = RecordingAnnouncer::default();
        let suggester = CannedSuggester::new("\"You've got this.\"");
        let mut session = RingingSession::new();
        session.activate(sample_alarm());

        let message = session.motivate(&suggester, &announcer);
        assert_eq!(message.as_deref(), Some("You've got this."));
        assert_eq!(session.motivation(), Some("You've got this."));
        assert_eq!(announcer.spoken(), vec!["You've got this.".to_string()]);
        assert!(suggester.prompts()[0].contains("\"Study\""));
    }

    #[test]
    fn motivate_without_suggestion_or_alarm_is_silent() {
        let announcer = RecordingAnnouncer::default();
        let mut session = RingingSession::new();
        assert!(session.motivate(&NoopSuggester, &announcer).is_none());

        session.activate(sample_alarm());
        assert!(session.motivate(&NoopSuggester, &announcer).is_none());
        assert!(announcer.spoken().is_empty());
    }
}
