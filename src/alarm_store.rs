use crate::data_manager::{AlarmDocument, DataError, DataManager};
use crate::models::{Alarm, AlarmPatch, AlarmTime, Days, NewAlarm};
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to load alarms: {0}")]
    Load(#[source] DataError),
    #[error("failed to save alarms: {0}")]
    Persist(#[source] DataError),
}

/// Owns the alarm collection. Every mutation is published to subscribers and
/// written through to disk before returning.
///
/// Lookups by an unknown id are silent no-ops. A failed write is reported to
/// the caller, but the in-memory change stays in place.
#[derive(Debug)]
pub struct AlarmStore {
    data_manager: DataManager,
    alarms: Vec<Alarm>,
    next_id: u64,
    snapshots: watch::Sender<Vec<Alarm>>,
}

impl AlarmStore {
    pub fn open(data_manager: DataManager, seed_defaults: bool) -> Result<Self, StoreError> {
        let loaded = data_manager.load_alarms().map_err(StoreError::Load)?;
        let seeded = loaded.is_none();
        let document = loaded.unwrap_or_else(|| AlarmDocument::new(Vec::new(), 1));

        let (snapshots, _) = watch::channel(document.alarms.clone());
        let mut store = Self {
            data_manager,
            alarms: document.alarms,
            next_id: document.next_id,
            snapshots,
        };

        if seeded {
            if seed_defaults {
                for alarm in default_alarms() {
                    store.insert(alarm);
                }
            }
            tracing::info!(
                path = %store.data_manager.alarms_path().display(),
                count = store.alarms.len(),
                "initialised alarm store"
            );
            store.commit()?;
        } else {
            tracing::debug!(count = store.alarms.len(), "loaded alarms");
        }
        Ok(store)
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: u64) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Alarm>> {
        self.snapshots.subscribe()
    }

    pub fn add(&mut self, alarm: NewAlarm) -> Result<Alarm, StoreError> {
        let created = self.insert(alarm);
        tracing::info!(id = created.id, time = %created.time, "alarm added");
        self.commit()?;
        Ok(created)
    }

    pub fn update(&mut self, id: u64, patch: AlarmPatch) -> Result<(), StoreError> {
        let Some(alarm) = self.alarms.iter_mut().find(|alarm| alarm.id == id) else {
            tracing::debug!(id, "update ignored: unknown alarm");
            return Ok(());
        };
        alarm.apply(patch);
        self.commit()
    }

    pub fn delete(&mut self, id: u64) -> Result<(), StoreError> {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        if self.alarms.len() == before {
            tracing::debug!(id, "delete ignored: unknown alarm");
            return Ok(());
        }
        tracing::info!(id, "alarm deleted");
        self.commit()
    }

    pub fn toggle(&mut self, id: u64) -> Result<(), StoreError> {
        let Some(alarm) = self.alarms.iter_mut().find(|alarm| alarm.id == id) else {
            tracing::debug!(id, "toggle ignored: unknown alarm");
            return Ok(());
        };
        alarm.enabled = !alarm.enabled;
        tracing::info!(id, enabled = alarm.enabled, "alarm toggled");
        self.commit()
    }

    fn insert(&mut self, alarm: NewAlarm) -> Alarm {
        let created = Alarm {
            id: self.next_id,
            time: alarm.time,
            task: alarm.task,
            days: alarm.days,
            enabled: true,
            is_one_time: alarm.is_one_time,
            one_time_date: alarm.one_time_date,
        };
        self.next_id = self.next_id.saturating_add(1);
        self.alarms.push(created.clone());
        created
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshots.send_replace(self.alarms.clone());
        let document = AlarmDocument::new(self.alarms.clone(), self.next_id);
        self.data_manager
            .save_alarms(&document)
            .map_err(StoreError::Persist)
    }
}

fn default_alarms() -> Vec<NewAlarm> {
    AlarmTime::new(7, 0)
        .map(|time| NewAlarm {
            time,
            task: "Wake up".to_string(),
            days: Days::from_indices(1..=5),
            is_one_time: false,
            one_time_date: None,
        })
        .into_iter()
        .collect()
}
