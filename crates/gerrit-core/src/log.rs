//! Append-only diagnostic log
//!
//! Every request and its raw response are written here so that a failing
//! call can be reconstructed after the fact. The log is shared by all
//! in-flight calls; each append holds an in-process mutex and an advisory
//! file lock so records from concurrent requests never interleave.
//!
//! Writing is best-effort. A failure to write is reported through `tracing`
//! and otherwise ignored; it never fails the request being logged.
//!
//! Appends are synchronous and run on the caller's thread, including async
//! worker threads. The file lock is therefore only polled for a short,
//! bounded time: when another process holds it longer, the record is dropped
//! with a warning instead of stalling the runtime.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use fs2::FileExt;

/// Prefix put in front of every record.
const RECORD_PREFIX: &str = "[gerrit-mcp-server]";

/// Default file name, relative to the process working directory.
pub const DEFAULT_LOG_FILE: &str = "server.log";

/// Longest time an append waits for the file lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(250);

const LOCK_POLL: Duration = Duration::from_millis(5);

#[derive(Debug)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
    guard: Mutex<()>,
    lock_wait: Duration,
}

impl DiagnosticLog {
    /// Log to the file at `path`, creating it on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            guard: Mutex::new(()),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            guard: Mutex::new(()),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one prefixed record. `message` may span multiple lines.
    pub fn record(&self, message: &str) {
        self.append(&format!("{RECORD_PREFIX} {message}\n"));
    }

    /// Append a labelled block of raw output, verbatim.
    pub fn record_block(&self, label: &str, body: &str) {
        self.append(&format!("{RECORD_PREFIX} {label}:\n{body}\n"));
    }

    fn append(&self, text: &str) {
        let Some(path) = &self.path else {
            return;
        };
        // A poisoned guard only means another writer panicked mid-append;
        // the file itself is still usable.
        let _held = self.guard.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = write_locked(path, text, self.lock_wait) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write diagnostic log");
        }
    }
}

fn write_locked(path: &Path, text: &str, lock_wait: Duration) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    lock_within(&file, lock_wait)?;
    let written = file.write_all(text.as_bytes()).and_then(|_| file.flush());
    let unlocked = file.unlock();
    written.and(unlocked)
}

fn lock_within(file: &std::fs::File, limit: Duration) -> std::io::Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() != fs2::lock_contended_error().kind() => return Err(e),
            Err(_) if Instant::now() >= deadline => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("log file stayed locked for {limit:?}"),
                ));
            }
            Err(_) => std::thread::sleep(LOCK_POLL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_records_are_appended_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.log");
        let log = DiagnosticLog::new(&path);

        log.record("Executing: curl -s https://example.com");
        log.record_block("stdout", "{\"ok\": true}");

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "[gerrit-mcp-server] Executing: curl -s https://example.com\n\
             [gerrit-mcp-server] stdout:\n{\"ok\": true}\n"
        );
    }

    #[test]
    fn test_unwritable_path_is_swallowed() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let log = DiagnosticLog::new(temp.path());
        log.record("this goes nowhere");
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = DiagnosticLog::disabled();
        assert!(log.path().is_none());
        log.record("ignored");
    }

    #[test]
    fn test_foreign_lock_bounds_the_wait() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.log");
        let log = DiagnosticLog::new(&path).with_lock_wait(Duration::from_millis(50));

        let holder = OpenOptions::new().create(true).append(true).open(&path).unwrap();
        holder.lock_exclusive().unwrap();

        let started = Instant::now();
        log.record("dropped while locked");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        holder.unlock().unwrap();
        log.record("written after release");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[gerrit-mcp-server] written after release\n"
        );
    }

    #[test]
    fn test_concurrent_appends_do_not_tear_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.log");
        let log = Arc::new(DiagnosticLog::new(&path));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        log.record(&format!("writer {i} line {j} {}", "x".repeat(200)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            assert!(line.starts_with("[gerrit-mcp-server] writer "));
            assert!(line.ends_with(&"x".repeat(200)));
        }
    }
}
