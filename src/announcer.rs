use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

/// Speaks text aloud. `announce` and `cancel` are fire-and-forget: they never
/// block on playback and never report failure to the caller.
pub trait Announcer: Send + Sync {
    /// Cancels anything still being spoken, then starts `text`.
    fn announce(&self, text: &str);

    fn cancel(&self);

    /// Blocks until the current announcement has been spoken.
    fn finish(&self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnouncer;

impl Announcer for NoopAnnouncer {
    fn announce(&self, _text: &str) {}

    fn cancel(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechBackend {
    Say,
    EspeakNg,
    Espeak,
    SpdSay,
}

impl SpeechBackend {
    const PREFERENCE: [SpeechBackend; 4] = [
        SpeechBackend::Say,
        SpeechBackend::EspeakNg,
        SpeechBackend::Espeak,
        SpeechBackend::SpdSay,
    ];

    pub fn program(&self) -> &'static str {
        match self {
            SpeechBackend::Say => "say",
            SpeechBackend::EspeakNg => "espeak-ng",
            SpeechBackend::Espeak => "espeak",
            SpeechBackend::SpdSay => "spd-say",
        }
    }

    /// First synthesiser found on `PATH`, with its resolved location.
    pub fn detect() -> Option<(Self, PathBuf)> {
        Self::PREFERENCE.into_iter().find_map(|backend| {
            which::which(backend.program())
                .ok()
                .map(|path| (backend, path))
        })
    }

    // Rates are roughly 90% of each tool's default speed.
    fn args(&self, voice: Option<&str>, text: &str) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            SpeechBackend::Say => {
                args.extend(["-r".to_string(), "160".to_string()]);
                if let Some(voice) = voice {
                    args.extend(["-v".to_string(), voice.to_string()]);
                }
            }
            SpeechBackend::EspeakNg | SpeechBackend::Espeak => {
                args.extend(["-s".to_string(), "157".to_string()]);
                if let Some(voice) = voice {
                    args.extend(["-v".to_string(), voice.to_string()]);
                }
            }
            SpeechBackend::SpdSay => {
                args.extend(["-r".to_string(), "-10".to_string()]);
                if let Some(voice) = voice {
                    args.extend(["-l".to_string(), voice.to_string()]);
                }
            }
        }
        args.push(text.to_string());
        args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Started,
    Unavailable,
    Failed,
}

/// Speaks through a system synthesiser running as a child process. The child
/// is kept so the next announcement (or a dismiss) can cut it off.
#[derive(Debug)]
pub struct SpeechAnnouncer {
    backend: Option<SpeechBackend>,
    program: Option<PathBuf>,
    voice: Option<String>,
    state: Mutex<SpeechState>,
}

#[derive(Debug, Default)]
struct SpeechState {
    current: Option<Child>,
    failure_notified: bool,
}

impl SpeechAnnouncer {
    pub fn detect(voice: Option<String>) -> Self {
        match SpeechBackend::detect() {
            Some((backend, program)) => {
                tracing::info!(program = %program.display(), voice = ?voice, "speech enabled");
                Self::with_program(backend, program, voice)
            }
            None => {
                tracing::warn!("no speech synthesiser found; announcements are silent");
                Self::with_backend(None, voice)
            }
        }
    }

    /// Uses `backend`, looked up on `PATH` when each announcement starts.
    pub fn with_backend(backend: Option<SpeechBackend>, voice: Option<String>) -> Self {
        Self {
            backend,
            program: backend.map(|backend| PathBuf::from(backend.program())),
            voice,
            state: Mutex::new(SpeechState::default()),
        }
    }

    /// Runs the executable at `program` with `backend`'s arguments.
    pub fn with_program(
        backend: SpeechBackend,
        program: impl Into<PathBuf>,
        voice: Option<String>,
    ) -> Self {
        Self {
            backend: Some(backend),
            program: Some(program.into()),
            voice,
            state: Mutex::new(SpeechState::default()),
        }
    }

    pub fn speak(&self, text: &str) -> SpeechOutcome {
        let mut state = self.lock_state();
        stop_child(&mut state.current);

        let (Some(backend), Some(program)) = (self.backend, self.program.as_ref()) else {
            return SpeechOutcome::Unavailable;
        };
        let spawned = Command::new(program)
            .args(backend.args(self.voice.as_deref(), text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                state.current = Some(child);
                state.failure_notified = false;
                SpeechOutcome::Started
            }
            Err(err) => {
                if !state.failure_notified {
                    state.failure_notified = true;
                    tracing::warn!(program = %program.display(), error = %err, "speech failed");
                }
                SpeechOutcome::Failed
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SpeechState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Announcer for SpeechAnnouncer {
    fn announce(&self, text: &str) {
        let outcome = self.speak(text);
        tracing::debug!(?outcome, text, "announce");
    }

    fn cancel(&self) {
        stop_child(&mut self.lock_state().current);
    }

    fn finish(&self) {
        let current = self.lock_state().current.take();
        if let Some(mut child) = current {
            if let Err(err) = child.wait() {
                tracing::debug!(error = %err, "speech process wait failed");
            }
        }
    }
}

fn stop_child(current: &mut Option<Child>) {
    if let Some(mut child) = current.take() {
        // Already-finished children just get reaped.
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Announcer;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    pub struct RecordingAnnouncer {
        spoken: Mutex<Vec<String>>,
        cancels: Mutex<usize>,
    }

    impl RecordingAnnouncer {
        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().expect("spoken lock").clone()
        }

        pub fn cancels(&self) -> usize {
            *self.cancels.lock().expect("cancel lock")
        }
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, text: &str) {
            self.spoken.lock().expect("spoken lock").push(text.to_string());
        }

        fn cancel(&self) {
            *self.cancels.lock().expect("cancel lock") += 1;
        }
    }

    /// Writes an executable shell script that stands in for a synthesiser: it
    /// pauses briefly, then records its arguments in the returned marker file.
    #[cfg(unix)]
    pub fn fake_synthesiser(dir: &Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let marker = dir.join("spoken.txt");
        let script = dir.join("fake-espeak-ng");
        let body = format!(
            "#!/bin/sh\nsleep 0.3\necho \"$@\" > '{}'\n",
            marker.display()
        );
        fs::write(&script, body).expect("write fake synthesiser");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("make fake synthesiser executable");
        (script, marker)
    }

    /// Waits for the fake synthesiser to finish and returns what it spoke.
    #[cfg(unix)]
    pub fn wait_for_speech(marker: &Path) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(spoken) = fs::read_to_string(marker) {
                if !spoken.is_empty() {
                    return spoken;
                }
            }
            assert!(Instant::now() < deadline, "speech never finished");
            thread::sleep(Duration::from_millis(20));
        }
    }
}
