//! The state machine. [Tracker] owns the only [state::WorkState] and every change to it goes
//! through [Tracker::apply].

pub mod audit;
pub mod calendar;
pub mod state;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{error, info, instrument, warn};

use crate::{
    storage::state_store::StateStore,
    utils::time::{format_duration, saturating_add, saturating_sub},
};

use audit::{AuditEntry, AuditLog};
use calendar::WorkCalendar;
use state::{StateDelta, ViewState, WorkState};

pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::minutes(3);

pub struct TrackerConfig {
    pub calendar: WorkCalendar,
    /// A gap this long before the first tick after startup means the machine was off.
    pub idle_threshold: Duration,
    /// Quotas used when no state could be restored.
    pub default_home_todo: Duration,
    pub default_office_todo: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calendar: WorkCalendar::default(),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            default_home_todo: Duration::minutes(7 * 60 + 30),
            default_office_todo: Duration::hours(8),
        }
    }
}

pub struct Tracker<S, A> {
    state: WorkState,
    store: S,
    audit: A,
    config: TrackerConfig,
}

impl<S: StateStore, A: AuditLog> Tracker<S, A> {
    /// Restores the state from the store. When nothing valid is found a fresh state is created,
    /// which means the previous state is lost, so it is reported loudly.
    pub async fn open(store: S, audit: A, config: TrackerConfig, now: DateTime<Utc>) -> Self {
        let restored = store.load().await;
        let lost = restored.is_none();
        let state = restored.unwrap_or_else(|| {
            WorkState::fresh(
                config.calendar.day_of(now),
                now,
                config.default_home_todo,
                config.default_office_todo,
            )
        });

        let mut tracker = Self {
            state,
            store,
            audit,
            config,
        };
        if lost {
            error!("No valid state copy found, current state is lost");
            tracker.log(now, "!!!!!! LOST CURRENT STATE");
        } else {
            info!("Restored state last updated at {}", tracker.state.last_update);
        }
        tracker.log(now, "Application startup.");
        tracker
    }

    pub fn state(&self) -> &WorkState {
        &self.state
    }

    pub fn view(&self) -> ViewState {
        self.state.view()
    }

    /// Applies a single transition at `now` and returns what should be shown. Never fails: store
    /// and audit errors are logged and the in-memory state stays authoritative.
    #[instrument(level = "debug", skip(self))]
    pub async fn apply(
        &mut self,
        mut delta: StateDelta,
        now: DateTime<Utc>,
        first_tick: bool,
    ) -> ViewState {
        let today = self.config.calendar.day_of(now);
        if today > self.state.day {
            self.roll_over(today, now);
        } else if today < self.state.day {
            // Only the wall clock went back, the day already ended.
            warn!("Clock moved back into {today}, staying on {}", self.state.day);
        } else if first_tick && now - self.state.last_update > self.config.idle_threshold {
            // Treat the gap as if the screen was locked the whole time, then unlock.
            let off_at = self.state.last_update + self.config.idle_threshold;
            self.log(off_at, "Power off detected");
            self.transition(StateDelta::lock(true), off_at, false).await;
            delta.lock = Some(false);
        }
        self.transition(delta, now, first_tick).await;
        self.state.view()
    }

    /// Folds the finished day into overtime. The quota of the mode active at the end of the day
    /// is used.
    fn roll_over(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        let day_end = self.state.last_update;
        self.state.day = today;
        self.state.is_break = false;
        self.state.afk = false;

        let todo = self.state.todo();
        let overtime_add = saturating_sub(self.state.done, todo);
        self.log(
            day_end,
            format!(
                "Day ended after {} of {}.",
                format_duration(self.state.done),
                format_duration(todo)
            ),
        );
        self.log(
            day_end,
            format!("Overtime update {}.", format_duration(overtime_add)),
        );

        self.state.overtime = saturating_add(self.state.overtime, overtime_add);
        self.state.done = Duration::zero();
        self.state.last_update = self.state.last_update.max(now);
        self.log(now, "============== STARTING A DAY ==============");
    }

    async fn transition(&mut self, delta: StateDelta, now: DateTime<Utc>, first_tick: bool) {
        let counted = self.state.counts_as_work();
        let elapsed = now - self.state.last_update;
        if elapsed < Duration::zero() {
            warn!("Clock moved backwards by {}", format_duration(-elapsed));
        } else if counted {
            match self.state.done.checked_add(&elapsed) {
                Some(done) => self.state.done = done,
                None => warn!("Done time is out of range, {elapsed} not counted"),
            }
        }

        self.apply_delta(delta, now);
        self.state.last_update = self.state.last_update.max(now);

        if let Err(e) = self.store.save(&self.state).await {
            error!("Failed to persist state: {e:?}");
        }

        let counts = self.state.counts_as_work();
        if counts != counted || first_tick {
            self.log(
                now,
                if counts {
                    "Started counting work time."
                } else {
                    "Ended counting work time."
                },
            );
        }
    }

    fn apply_delta(&mut self, delta: StateDelta, now: DateTime<Utc>) {
        if let Some(mode) = delta.mode.filter(|v| *v != self.state.mode) {
            self.log(
                now,
                format!("Changed mode from \"{}\" to \"{mode}\"", self.state.mode),
            );
            self.state.mode = mode;
        }
        if let Some(is_break) = delta.is_break.filter(|v| *v != self.state.is_break) {
            self.log(
                now,
                if is_break {
                    "Start of break"
                } else {
                    "End of break"
                },
            );
            self.state.is_break = is_break;
        }
        if let Some(afk) = delta.afk.filter(|v| *v != self.state.afk) {
            self.log(
                now,
                if afk {
                    "Start of work away from keyboard"
                } else {
                    "End of work away from keyboard"
                },
            );
            self.state.afk = afk;
        }
        if let Some(lock) = delta.lock.filter(|v| *v != self.state.lock) {
            self.log(now, if lock { "Locked screen" } else { "Unlocked screen" });
            self.state.lock = lock;
        }
        if let Some(todo) = delta.home_todo.filter(|v| *v != self.state.home_todo) {
            self.log(
                now,
                format!(
                    "Changed time to do at home from {} to {}",
                    format_duration(self.state.home_todo),
                    format_duration(todo)
                ),
            );
            self.state.home_todo = todo;
        }
        if let Some(todo) = delta.office_todo.filter(|v| *v != self.state.office_todo) {
            self.log(
                now,
                format!(
                    "Changed time to do at office from {} to {}",
                    format_duration(self.state.office_todo),
                    format_duration(todo)
                ),
            );
            self.state.office_todo = todo;
        }
        // Zero means there is nothing to add.
        if let Some(added) = delta.done.filter(|v| !v.is_zero()) {
            match self.state.done.checked_add(&added) {
                Some(done) => {
                    self.log(
                        now,
                        format!(
                            "Work done time changed by {}, from {} to {}",
                            format_duration(added),
                            format_duration(self.state.done),
                            format_duration(done)
                        ),
                    );
                    self.state.done = done;
                }
                None => warn!("Ignoring done change by {added}, the result is out of range"),
            }
        }
        if let Some(overtime) = delta.overtime.filter(|v| *v != self.state.overtime) {
            self.log(
                now,
                format!(
                    "Changed overtime from {} to {}",
                    format_duration(self.state.overtime),
                    format_duration(overtime)
                ),
            );
            self.state.overtime = overtime;
        }
    }

    fn log(&mut self, time: DateTime<Utc>, description: impl Into<String>) {
        let entry = AuditEntry::new(time, description, &self.state);
        info!("{} ({})", entry.description, entry.snapshot);
        if let Err(e) = self.audit.append(&entry) {
            warn!("Failed to write audit entry: {e:?}");
        }
    }
}
