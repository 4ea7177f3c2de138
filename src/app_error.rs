use crate::alarm_editor::EditorError;
use crate::alarm_store::StoreError;
use crate::config::ConfigError;
use crate::data_manager::DataError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppErrorKind {
    System,
    Data,
    Validation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppErrorPayload {
    pub kind: AppErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub recoverable: bool,
}

/// An error ready to show to the user. It carries the payload that goes out
/// on the event channel.
#[derive(Debug, Clone)]
pub struct AppError(AppErrorPayload);

impl AppError {
    pub fn new(kind: AppErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self(AppErrorPayload {
            kind,
            message: message.into(),
            detail: None,
            recoverable,
        })
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.0.detail = Some(detail.into());
        self
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::System, message, true)
    }

    pub fn kind(&self) -> AppErrorKind {
        self.0.kind
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.0.detail.as_deref()
    }

    pub fn payload(&self) -> AppErrorPayload {
        self.0.clone()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.detail {
            Some(detail) => write!(f, "{} ({detail})", self.0.message),
            None => f.write_str(&self.0.message),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DataError> for AppError {
    fn from(error: DataError) -> Self {
        let detail = error.to_string();
        let (message, recoverable) = match error {
            DataError::Io(_) => ("Could not read or write the alarm file", true),
            DataError::Serde(_) => ("The alarm file is not valid JSON", false),
            DataError::UnsupportedVersion { .. } => {
                ("The alarm file was written by a newer version", false)
            }
        };
        Self::new(AppErrorKind::Data, message, recoverable).with_detail(detail)
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Load(inner) => Self::from(inner),
            StoreError::Persist(inner) => {
                // Memory already holds the change; only durability was lost.
                let detail = inner.to_string();
                Self::new(
                    AppErrorKind::Data,
                    "Changes were applied but could not be saved; they will be lost on restart",
                    true,
                )
                .with_detail(detail)
            }
        }
    }
}

impl From<EditorError> for AppError {
    fn from(error: EditorError) -> Self {
        match error {
            EditorError::Store(inner) => Self::from(inner),
            other => Self::new(AppErrorKind::Validation, capitalize(&other.to_string()), true),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::new(AppErrorKind::System, "Invalid configuration", false)
            .with_detail(error.to_string())
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
