use crate::models::Alarm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current layout of `alarms.json`.
pub const STORE_VERSION: u32 = 1;

const ALARMS_FILE: &str = "alarms.json";

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unsupported alarm store version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDocument {
    pub version: u32,
    pub next_id: u64,
    pub alarms: Vec<Alarm>,
}

impl AlarmDocument {
    pub fn new(alarms: Vec<Alarm>, next_id: u64) -> Self {
        let mut document = Self {
            version: STORE_VERSION,
            next_id,
            alarms,
        };
        document.repair_next_id();
        document
    }

    // Ids are never reused, so the counter has to stay above every stored id.
    fn repair_next_id(&mut self) {
        let floor = self
            .alarms
            .iter()
            .map(|alarm| alarm.id)
            .max()
            .map_or(1, |max| max.saturating_add(1));
        self.next_id = self.next_id.max(floor);
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned(AlarmDocument),
    Unversioned(Vec<Alarm>),
}

#[derive(Debug, Clone)]
pub struct DataManager {
    alarms_path: PathBuf,
}

impl DataManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> DataResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            alarms_path: base_dir.join(ALARMS_FILE),
        })
    }

    pub fn alarms_path(&self) -> &Path {
        &self.alarms_path
    }

    /// Returns `None` when nothing has been stored yet.
    pub fn load_alarms(&self) -> DataResult<Option<AlarmDocument>> {
        if !self.alarms_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.alarms_path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let document = match serde_json::from_str(&contents)? {
            StoredLayout::Versioned(document) => {
                if document.version > STORE_VERSION {
                    return Err(DataError::UnsupportedVersion {
                        found: document.version,
                        supported: STORE_VERSION,
                    });
                }
                AlarmDocument::new(document.alarms, document.next_id)
            }
            StoredLayout::Unversioned(alarms) => {
                tracing::info!(
                    path = %self.alarms_path.display(),
                    count = alarms.len(),
                    "migrating unversioned alarm list"
                );
                AlarmDocument::new(alarms, 1)
            }
        };
        Ok(Some(document))
    }

    pub fn save_alarms(&self, document: &AlarmDocument) -> DataResult<()> {
        self.write_json(&self.alarms_path, document)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> DataResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        match fs::rename(&temp_path, path) {
            Ok(()) => Ok(()),
            Err(_err) if path.exists() => {
                let _ = fs::remove_file(path);
                fs::rename(&temp_path, path).map_err(DataError::from)
            }
            Err(err) => Err(DataError::from(err)),
        }
    }
}
