//! Human readable, append-only history of every transition. The tracker never reads it back.

use std::{
    fmt::Display,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::utils::time::format_duration;

use super::state::WorkState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub time: DateTime<Utc>,
    pub description: String,
    pub snapshot: String,
}

impl AuditEntry {
    pub fn new(time: DateTime<Utc>, description: impl Into<String>, state: &WorkState) -> Self {
        Self {
            time,
            description: description.into(),
            snapshot: snapshot(state),
        }
    }

    pub fn format_line<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: Display,
    {
        format!(
            "{}   {} ({})",
            self.time.with_timezone(tz).format("%d/%m/%Y, %H:%M:%S"),
            self.description,
            self.snapshot
        )
    }
}

impl Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_line(&Local))
    }
}

/// Compact description of a state: `mode[, break][, AFK][, lock], done/todo>overtime`.
pub fn snapshot(state: &WorkState) -> String {
    let mut s = state.mode.to_string();
    if state.is_break {
        s += ", break";
    }
    if state.afk {
        s += ", AFK";
    }
    if state.lock {
        s += ", lock";
    }
    s += &format!(
        ", {}/{}>{}",
        format_duration(state.done),
        format_duration(state.todo()),
        format_duration(state.overtime)
    );
    s
}

#[cfg_attr(test, mockall::automock)]
pub trait AuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<()>;
}

/// Appends lines to a plain text file. The file is never truncated or rotated.
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {:?}", self.path))?;
        writeln!(file, "{entry}")?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryAuditLog;


#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::tracker::state::{Mode, WorkState};

    use super::{snapshot, AuditEntry, AuditLog, FileAuditLog};

    fn test_state() -> WorkState {
        WorkState::fresh(
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap(),
            Duration::minutes(450),
            Duration::hours(8),
        )
    }

    #[test]
    fn test_snapshot_plain() {
        let mut state = test_state();
        state.done = Duration::minutes(225);
        state.overtime = Duration::minutes(93);
        assert_eq!(snapshot(&state), "office, 3:45/8:00>1:33");
    }

    #[test]
    fn test_snapshot_flags() {
        let mut state = test_state();
        state.mode = Mode::Home;
        state.is_break = true;
        state.afk = true;
        state.lock = true;
        state.overtime = Duration::minutes(-20);
        assert_eq!(snapshot(&state), "home, break, AFK, lock, 0:00/7:30>-0:20");
    }

    #[test]
    fn test_line_format() {
        let entry = AuditEntry::new(
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 5, 7).unwrap(),
            "Locked screen",
            &test_state(),
        );
        assert_eq!(
            entry.format_line(&FixedOffset::east_opt(3600).unwrap()),
            "11/03/2024, 10:05:07   Locked screen (office, 0:00/8:00>0:00)"
        );
    }

    #[test]
    fn test_file_audit_log_appends() -> Result<()> {
        let dir = tempdir()?;
        let mut log = FileAuditLog::new(dir.path().join("work-log.log"));
        let state = test_state();

        log.append(&AuditEntry::new(state.last_update, "Application startup.", &state))?;
        log.append(&AuditEntry::new(state.last_update, "Start of break", &state))?;

        let content = std::fs::read_to_string(log.path())?;
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Application startup."));
        assert!(lines[1].ends_with("Start of break (office, 0:00/8:00>0:00)"));
        Ok(())
    }
}
