//! Session audit log.
//!
//! Optional append-only record of what the launcher saw and did (windows
//! becoming ready, closing, being evicted or spawned, session pushes). One
//! timestamped line per event; the file is shared between tasks.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// What an audit line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Ready,
    Closed,
    Evict,
    Spawn,
    Session,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Ready => "READY",
            AuditKind::Closed => "CLOSED",
            AuditKind::Evict => "EVICT",
            AuditKind::Spawn => "SPAWN",
            AuditKind::Session => "SESSION",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Append `[<utc ms>] KIND: data` to the audit file, if there is one.
pub fn log_line(handle: &LogHandle, kind: AuditKind, data: &str) {
    let Ok(mut guard) = handle.lock() else {
        return;
    };
    if let Some(file) = guard.as_mut() {
        if let Err(e) = writeln!(file, "[{}] {}: {}", utc_timestamp(), kind, data)
            .and_then(|_| file.flush())
        {
            log::debug!("Dropped {} audit line: {}", kind, e);
        }
    }
}

/// Open `{log_dir}/{log_id}.log` for appending.
///
/// With no directory, or if the file can't be opened, the handle is empty and
/// `log_line` does nothing.
pub fn open_log_file(log_dir: Option<&str>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = Path::new(dir).join(format!("{log_id}.log"));
        let opened = std::fs::create_dir_all(dir)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
        match opened {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Failed to open session log {}: {}", path.display(), e);
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read(dir: &Path, log_id: &str) -> String {
        std::fs::read_to_string(dir.join(format!("{log_id}.log"))).unwrap()
    }

    #[test]
    fn timestamp_is_utc_with_millis() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn kinds_render_uppercase() {
        assert_eq!(AuditKind::Evict.to_string(), "EVICT");
        assert_eq!(AuditKind::Session.as_str(), "SESSION");
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let handle = open_log_file(log_dir.to_str(), "session");
        assert!(handle.lock().unwrap().is_some());
        assert!(log_dir.join("session.log").exists());
    }

    #[test]
    fn no_directory_means_no_file() {
        let handle = open_log_file(None, "session");
        assert!(handle.lock().unwrap().is_none());
        log_line(&handle, AuditKind::Ready, "primary");
    }

    #[test]
    fn lines_are_appended_in_order() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(dir.path().to_str(), "session");

        log_line(&handle, AuditKind::Ready, "primary");
        log_line(&handle, AuditKind::Evict, "primary last seen 1999");

        let contents = read(dir.path(), "session");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] READY: primary"));
        assert!(lines[1].ends_with("] EVICT: primary last seen 1999"));
    }

    #[test]
    fn reopening_keeps_earlier_lines() {
        let dir = tempdir().unwrap();
        log_line(&open_log_file(dir.path().to_str(), "session"), AuditKind::Spawn, "primary");
        log_line(&open_log_file(dir.path().to_str(), "session"), AuditKind::Spawn, "secondary");

        let contents = read(dir.path(), "session");
        assert_eq!(contents.lines().count(), 2);
    }
}
