//! Per-session raw frame log.
//!
//! One file per session, `XBeeRAW_log<timestamp>.txt`, holding the rendered
//! form of every frame sent or received.

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::*;

/// Append-only log file; a disabled log discards everything.
#[derive(Debug)]
pub struct RawLog {
    sink: Option<(PathBuf, Mutex<File>)>,
}

impl RawLog {
    /// Create a new session file under `dir`, creating the directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> DriverResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.3f");
        let path = dir.join(format!("XBeeRAW_log{}.txt", stamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!("raw log at {}", path.display());
        Ok(RawLog {
            sink: Some((path, Mutex::new(file))),
        })
    }

    /// A log that writes nothing.
    pub fn disabled() -> Self {
        RawLog { sink: None }
    }

    /// Path of the session file.
    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(path, _)| path.as_path())
    }

    /// Append one line. Write failures are logged and otherwise ignored so the
    /// read loop keeps running.
    pub fn append(&self, line: impl Display) {
        let Some((path, file)) = &self.sink else {
            return;
        };
        let mut file = file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("raw log write to {} failed: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("digimesh-rawlog-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_append_lines() {
        let dir = scratch_dir("append");
        let log = RawLog::create(&dir).unwrap();
        log.append("first");
        log.append(format_args!("second {}", 2));

        let path = log.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("XBeeRAW_log"));
        assert!(name.ends_with(".txt"));
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first\nsecond 2\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_disabled() {
        let log = RawLog::disabled();
        log.append("ignored");
        assert!(log.path().is_none());
    }
}
