use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use chrono::Duration;

/// This is the standard way of printing durations in worklog: `[-]H:MM`, rounded to the nearest
/// minute.
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration
        .num_milliseconds()
        .saturating_add(30_000)
        .div_euclid(60_000);
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.abs();
    format!("{sign}{}:{:02}", minutes / 60, minutes % 60)
}

/// `a + b`, clamped to the representable range.
pub fn saturating_add(a: Duration, b: Duration) -> Duration {
    a.checked_add(&b).unwrap_or(if b < Duration::zero() {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

/// `a - b`, clamped to the representable range.
pub fn saturating_sub(a: Duration, b: Duration) -> Duration {
    a.checked_sub(&b).unwrap_or(if b > Duration::zero() {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

/// Duration written as `[-]H:MM` or `[-]H`. Used for command line arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoursMinutes(pub Duration);

impl FromStr for HoursMinutes {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (hours, minutes) = match unsigned.split_once(':') {
            Some((h, m)) => (h, m),
            None => (unsigned, "0"),
        };
        let hours = hours
            .parse::<i64>()
            .with_context(|| format!("Can't parse hours in {s}"))?;
        let minutes = minutes
            .parse::<i64>()
            .with_context(|| format!("Can't parse minutes in {s}"))?;
        if hours < 0 || !(0..60).contains(&minutes) {
            return Err(anyhow!("Can't parse {s} into H:MM"));
        }
        let total = hours
            .checked_mul(60)
            .and_then(|v| v.checked_add(minutes))
            .and_then(Duration::try_minutes)
            .ok_or_else(|| anyhow!("{s} is too long"))?;
        Ok(HoursMinutes(if negative { -total } else { total }))
    }
}

impl Display for HoursMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_duration(self.0))
    }
}
