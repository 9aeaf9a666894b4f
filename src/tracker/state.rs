use std::fmt::Display;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::{saturating_add, saturating_sub};

/// Decides which quota applies to the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Office,
    Home,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Office => write!(f, "office"),
            Mode::Home => write!(f, "home"),
        }
    }
}

/// The persisted state of the tracker. Durations are stored as milliseconds so the files stay
/// readable and can be corrected by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkState {
    pub day: NaiveDate,
    pub mode: Mode,
    pub is_break: bool,
    /// Away from keyboard, but still working.
    pub afk: bool,
    pub lock: bool,
    #[serde(with = "duration_ms")]
    pub done: Duration,
    #[serde(with = "duration_ms")]
    pub home_todo: Duration,
    #[serde(with = "duration_ms")]
    pub office_todo: Duration,
    /// Carried across days, may be negative.
    #[serde(with = "duration_ms")]
    pub overtime: Duration,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update: DateTime<Utc>,
}

impl WorkState {
    pub fn fresh(
        day: NaiveDate,
        now: DateTime<Utc>,
        home_todo: Duration,
        office_todo: Duration,
    ) -> Self {
        Self {
            day,
            mode: Mode::Office,
            is_break: false,
            afk: false,
            lock: false,
            done: Duration::zero(),
            home_todo,
            office_todo,
            overtime: Duration::zero(),
            last_update: now,
        }
    }

    /// Quota of the current mode.
    pub fn todo(&self) -> Duration {
        match self.mode {
            Mode::Office => self.office_todo,
            Mode::Home => self.home_todo,
        }
    }

    /// Whether wall-clock time passing in this state accrues to `done`. Office time always
    /// counts unless on a break, home time only while unlocked or explicitly away from keyboard.
    pub fn counts_as_work(&self) -> bool {
        !self.is_break && (self.mode == Mode::Office || self.afk || !self.lock)
    }

    /// Once the quota is met the excess is reported as overtime instead of as done.
    pub fn view(&self) -> ViewState {
        let todo = self.todo();
        let (done, overtime) = if self.done > todo {
            (
                todo,
                saturating_add(self.overtime, saturating_sub(self.done, todo)),
            )
        } else {
            (self.done, self.overtime)
        };
        ViewState {
            mode: self.mode,
            is_break: self.is_break,
            afk: self.afk,
            done,
            todo,
            overtime,
        }
    }
}

/// Sparse set of changes for a single transition. Absent fields are left untouched. `done` is
/// added to the current value, every other field replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_break: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms"
    )]
    pub home_todo: Option<Duration>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms"
    )]
    pub office_todo: Option<Duration>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms"
    )]
    pub overtime: Option<Duration>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms"
    )]
    pub done: Option<Duration>,
}

impl StateDelta {
    pub fn mode(mode: Mode) -> Self {
        Self {
            mode: Some(mode),
            ..Default::default()
        }
    }

    pub fn on_break(value: bool) -> Self {
        Self {
            is_break: Some(value),
            ..Default::default()
        }
    }

    pub fn afk(value: bool) -> Self {
        Self {
            afk: Some(value),
            ..Default::default()
        }
    }

    pub fn lock(value: bool) -> Self {
        Self {
            lock: Some(value),
            ..Default::default()
        }
    }
}

/// What the presentation layer gets after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub mode: Mode,
    pub is_break: bool,
    pub afk: bool,
    #[serde(with = "duration_ms")]
    pub done: Duration,
    #[serde(with = "duration_ms")]
    pub todo: Duration,
    #[serde(with = "duration_ms")]
    pub overtime: Duration,
}

mod duration_ms {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(ms).ok_or_else(|| D::Error::custom("duration out of range"))
    }
}

mod optional_duration_ms {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(v) => serializer.serialize_some(&v.num_milliseconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer)?
            .map(|ms| {
                Duration::try_milliseconds(ms)
                    .ok_or_else(|| D::Error::custom("duration out of range"))
            })
            .transpose()
    }
}
