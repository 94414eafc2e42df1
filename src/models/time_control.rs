use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-side starting clock and per-move increment, encoded on the wire as
/// `"<minutes>+<incrementSeconds>"`, e.g. "5+0" or "3+2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    pub minutes: u32,
    pub increment_seconds: u32,
}

impl TimeControl {
    pub fn new(minutes: u32, increment_seconds: u32) -> Self {
        TimeControl {
            minutes,
            increment_seconds,
        }
    }

    pub fn initial_seconds(&self) -> u64 {
        u64::from(self.minutes) * 60
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.minutes, self.increment_seconds)
    }
}

#[derive(Debug)]
pub struct TimeControlParseError(pub String);

impl fmt::Display for TimeControlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid time control: {}", self.0)
    }
}

impl std::error::Error for TimeControlParseError {}

impl FromStr for TimeControl {
    type Err = TimeControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('+');
        let minutes = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| TimeControlParseError(s.to_string()))?;
        let increment = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| TimeControlParseError(s.to_string()))?;
        if parts.next().is_some() || minutes == 0 {
            return Err(TimeControlParseError(s.to_string()));
        }
        Ok(TimeControl::new(minutes, increment))
    }
}
