//! Time-of-day window during which producers are not run.

use core::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockedPeriodError {
    #[error("blocked period must look like HHMM-HHMM, got {0:?}")]
    Format(String),
    #[error("invalid time of day {0:?} in blocked period")]
    InvalidTime(String),
}

/// A daily window, in local time, parsed from `"HHMM-HHMM"`.
///
/// Both ends are inclusive. A start later than the end wraps past midnight
/// (`"2200-0600"`). `"0000-0000"` never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockedPeriod {
    #[default]
    Never,
    Window { start: NaiveTime, end: NaiveTime },
}

impl BlockedPeriod {
    pub fn is_blocked_at(&self, now: NaiveTime) -> bool {
        match *self {
            BlockedPeriod::Never => false,
            BlockedPeriod::Window { start, end } if start <= end => start <= now && now <= end,
            BlockedPeriod::Window { start, end } => now >= start || now <= end,
        }
    }
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, BlockedPeriodError> {
    let invalid = || BlockedPeriodError::InvalidTime(raw.to_string());
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hour = raw[..2].parse().map_err(|_| invalid())?;
    let minute = raw[2..].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

impl FromStr for BlockedPeriod {
    type Err = BlockedPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| BlockedPeriodError::Format(s.to_string()))?;
        let start = parse_hhmm(start.trim())?;
        let end = parse_hhmm(end.trim())?;
        if start == NaiveTime::MIN && end == NaiveTime::MIN {
            return Ok(BlockedPeriod::Never);
        }
        Ok(BlockedPeriod::Window { start, end })
    }
}

impl TryFrom<String> for BlockedPeriod {
    type Error = BlockedPeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl core::fmt::Display for BlockedPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (start, end) = match *self {
            BlockedPeriod::Never => (NaiveTime::MIN, NaiveTime::MIN),
            BlockedPeriod::Window { start, end } => (start, end),
        };
        write!(
            f,
            "{:02}{:02}-{:02}{:02}",
            start.hour(),
            start.minute(),
            end.hour(),
            end.minute()
        )
    }
}

impl From<BlockedPeriod> for String {
    fn from(value: BlockedPeriod) -> Self {
        value.to_string()
    }
}
