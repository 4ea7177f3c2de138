use crate::alarm_editor::{self, AlarmDraft};
use crate::alarm_engine::{AlarmEngine, TickOutcome};
use crate::alarm_store::AlarmStore;
use crate::announcer::{Announcer, NoopAnnouncer, SpeechAnnouncer};
use crate::app_error::{AppError, AppErrorKind};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::data_manager::DataManager;
use crate::events::{
    emit_alarms_changed, emit_app_error, emit_dismissed, emit_motivation, emit_ringing,
    AlarmEvent, EventSender, EVENT_CAPACITY,
};
use crate::models::{Alarm, AlarmTime};
use crate::suggest::{NoopSuggester, Suggester};
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
struct AlarmCore {
    store: AlarmStore,
    engine: AlarmEngine,
}

/// Cloneable handle over the store and engine. All mutation happens under one
/// lock that is never held across an await point.
#[derive(Clone)]
pub struct AlarmService {
    core: Arc<Mutex<AlarmCore>>,
    announcer: Arc<dyn Announcer>,
    suggester: Arc<dyn Suggester>,
    clock: Arc<dyn Clock>,
    events: EventSender,
}

/// Keeps the tick task alive. Dropping it stops the task.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl AlarmService {
    pub fn new(
        store: AlarmStore,
        announcer: Arc<dyn Announcer>,
        suggester: Arc<dyn Suggester>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            core: Arc::new(Mutex::new(AlarmCore {
                store,
                engine: AlarmEngine::new(),
            })),
            announcer,
            suggester,
            clock,
            events,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let data_manager = DataManager::new(&config.data_dir)?;
        let store = AlarmStore::open(data_manager, config.seed_defaults)?;
        let announcer: Arc<dyn Announcer> = if config.speech_enabled {
            Arc::new(SpeechAnnouncer::detect(config.voice.clone()))
        } else {
            Arc::new(NoopAnnouncer)
        };
        Ok(Self::new(
            store,
            announcer,
            Arc::new(NoopSuggester),
            Arc::new(SystemClock),
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AlarmEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_alarms(&self) -> Result<watch::Receiver<Vec<Alarm>>, AppError> {
        Ok(self.lock_core()?.store.subscribe())
    }

    pub fn alarms(&self) -> Result<Vec<Alarm>, AppError> {
        Ok(self.lock_core()?.store.alarms().to_vec())
    }

    pub fn get(&self, id: u64) -> Result<Option<Alarm>, AppError> {
        Ok(self.lock_core()?.store.get(id).cloned())
    }

    pub fn create(&self, draft: &AlarmDraft) -> Result<Alarm, AppError> {
        let mut core = self.lock_core()?;
        let result = alarm_editor::create(&mut core.store, draft);
        let count = core.store.len();
        drop(core);
        self.after_mutation(result.map_err(AppError::from), count)
    }

    pub fn update(&self, id: u64, draft: &AlarmDraft) -> Result<(), AppError> {
        let mut core = self.lock_core()?;
        let result = alarm_editor::update(&mut core.store, id, draft);
        let count = core.store.len();
        drop(core);
        self.after_mutation(result.map_err(AppError::from), count)
    }

    pub fn toggle(&self, id: u64) -> Result<(), AppError> {
        let mut core = self.lock_core()?;
        let result = core.store.toggle(id);
        let count = core.store.len();
        drop(core);
        self.after_mutation(result.map_err(AppError::from), count)
    }

    pub fn delete(&self, id: u64) -> Result<(), AppError> {
        let mut core = self.lock_core()?;
        let result = core.store.delete(id);
        let count = core.store.len();
        drop(core);
        self.after_mutation(result.map_err(AppError::from), count)
    }

    /// Runs one engine tick against the clock.
    pub fn tick(&self) -> Result<TickOutcome, AppError> {
        let now = self.clock.now();
        let mut core = self.lock_core()?;
        let AlarmCore { store, engine } = &mut *core;
        let outcome = engine.tick(now, store, self.announcer.as_ref());
        let count = store.len();
        drop(core);

        if let TickOutcome::Triggered {
            alarm,
            phrase,
            disable_error,
        } = &outcome
        {
            if alarm.is_one_time {
                emit_alarms_changed(&self.events, count);
            }
            if let Some(err) = disable_error {
                let detail = err.to_string();
                emit_app_error(
                    &self.events,
                    AppError::new(
                        AppErrorKind::Data,
                        "The one-time alarm was disabled but could not be saved",
                        true,
                    )
                    .with_detail(detail)
                    .payload(),
                );
            }
            emit_ringing(&self.events, alarm.clone(), phrase.clone());
        }
        Ok(outcome)
    }

    pub fn active_alarm(&self) -> Result<Option<Alarm>, AppError> {
        Ok(self.lock_core()?.engine.active_alarm().cloned())
    }

    pub fn dismiss(&self) -> Result<Option<Alarm>, AppError> {
        let mut core = self.lock_core()?;
        let dismissed = core.engine.dismiss(self.announcer.as_ref());
        drop(core);
        if let Some(alarm) = &dismissed {
            emit_dismissed(&self.events, alarm.id);
        }
        Ok(dismissed)
    }

    pub fn motivate(&self) -> Result<Option<String>, AppError> {
        let mut core = self.lock_core()?;
        let message = core
            .engine
            .session_mut()
            .motivate(self.suggester.as_ref(), self.announcer.as_ref());
        drop(core);
        if let Some(text) = &message {
            emit_motivation(&self.events, text.clone());
        }
        Ok(message)
    }

    pub fn suggest_task(&self, time: AlarmTime) -> String {
        alarm_editor::suggest_task(self.suggester.as_ref(), time)
    }

    pub fn announce(&self, text: &str) {
        self.announcer.announce(text);
    }

    /// Blocks until the last announcement has been spoken.
    pub fn finish_speaking(&self) {
        self.announcer.finish();
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Spawns the periodic tick on the current tokio runtime.
    pub fn start_ticker(&self, period: Duration) -> TickerHandle {
        let service = self.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(period_ms = period.as_millis() as u64, "alarm ticker started");
            loop {
                interval.tick().await;
                if let Err(err) = service.tick() {
                    tracing::error!(error = %err, "alarm tick failed");
                    emit_app_error(&service.events, err.payload());
                }
            }
        });
        TickerHandle { task }
    }

    pub(crate) fn report(&self, error: &AppError) {
        emit_app_error(&self.events, error.payload());
    }

    fn after_mutation<T>(&self, result: Result<T, AppError>, count: usize) -> Result<T, AppError> {
        match &result {
            Ok(_) => emit_alarms_changed(&self.events, count),
            // A failed save still changed memory.
            Err(err) if err.kind() == AppErrorKind::Data => {
                emit_alarms_changed(&self.events, count)
            }
            Err(_) => {}
        }
        result
    }

    fn lock_core(&self) -> Result<MutexGuard<'_, AlarmCore>, AppError> {
        self.core
            .lock()
            .map_err(|_| AppError::system("Alarm state lock failed"))
    }
}
