use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Utc};

pub const DEFAULT_DAY_START_HOUR: u32 = 4;

/// Maps instants onto work days. A work day starts at `day_start_hour` local time instead of
/// midnight, so late evenings still belong to the day they started in.
#[derive(Debug, Clone, Copy)]
pub struct WorkCalendar {
    day_start_hour: u32,
    /// `None` means the system time zone.
    offset: Option<FixedOffset>,
}

impl WorkCalendar {
    pub fn local(day_start_hour: u32) -> Self {
        Self {
            day_start_hour,
            offset: None,
        }
    }

    pub fn with_offset(day_start_hour: u32, offset: FixedOffset) -> Self {
        Self {
            day_start_hour,
            offset: Some(offset),
        }
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        let shifted = instant - Duration::hours(self.day_start_hour.into());
        match self.offset {
            Some(offset) => shifted.with_timezone(&offset).date_naive(),
            None => shifted.with_timezone(&Local).date_naive(),
        }
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::local(DEFAULT_DAY_START_HOUR)
    }
}
