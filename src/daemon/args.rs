use std::{path::PathBuf, time::Duration};

use clap::{value_parser, Args, Parser};
use tracing::level_filters::LevelFilter;

use crate::{
    tracker::{calendar::WorkCalendar, TrackerConfig},
    utils::time::HoursMinutes,
};

use super::control::DEFAULT_CONTROL_PORT;

/// Upper bound for tick interval and idle threshold, one day.
const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Everything that shapes the behaviour of a running daemon apart from its port. The cli accepts
/// the same set and passes it through when it restarts the daemon.
#[derive(Args, Debug, Clone)]
pub struct DaemonOptions {
    /// Directory for state copies, the audit log and diagnostics.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Seconds between ticks that keep `done` current.
    #[arg(long = "tick-interval", default_value_t = 30, value_parser = value_parser!(u64).range(1..=MAX_INTERVAL_SECS))]
    pub tick_interval: u64,
    /// Seconds without updates after which the machine is considered to have been off.
    #[arg(long = "idle-threshold", default_value_t = 180, value_parser = value_parser!(u64).range(1..=MAX_INTERVAL_SECS))]
    pub idle_threshold: u64,
    /// Local hour at which the working day rolls over.
    #[arg(long = "day-start-hour", default_value_t = 4, value_parser = value_parser!(u32).range(0..24))]
    pub day_start_hour: u32,
    /// Home quota for a day started without a previous state.
    #[arg(long = "home-todo", default_value = "7:30")]
    pub home_todo: HoursMinutes,
    /// Office quota for a day started without a previous state.
    #[arg(long = "office-todo", default_value = "8:00")]
    pub office_todo: HoursMinutes,
}

impl DaemonOptions {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            calendar: WorkCalendar::local(self.day_start_hour),
            idle_threshold: chrono::Duration::seconds(self.idle_threshold as i64),
            default_home_todo: self.home_todo.0,
            default_office_todo: self.office_todo.0,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval)
    }

    /// Command line that reproduces these options.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dir) = &self.dir {
            args.push("--dir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        args.extend([
            format!("--tick-interval={}", self.tick_interval),
            format!("--idle-threshold={}", self.idle_threshold),
            format!("--day-start-hour={}", self.day_start_hour),
            format!("--home-todo={}", self.home_todo),
            format!("--office-todo={}", self.office_todo),
        ]);
        args
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Background process that owns the work log state")]
pub struct DaemonArgs {
    /// Run in the foreground instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Loopback port of the control socket.
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    pub port: u16,
    #[command(flatten)]
    pub options: DaemonOptions,
}
