//! Julian day timestamps
//!
//! DWG stores calendar times as a Julian day number plus milliseconds since
//! midnight, and durations (TDINDWG) as a plain day count plus milliseconds.

use std::fmt;

use thiserror::Error;

/// Milliseconds in one day
pub const MS_PER_DAY: u32 = 86_400_000;

/// Julian day of the Gregorian calendar switch (1582-10-15 is day 2299161)
const GREGORIAN_SWITCH: i64 = 2_299_160;

/// A raw (day, milliseconds) pair as stored in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JulianDate {
    pub day: i64,
    pub milliseconds: i64,
}

/// A converted calendar timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }
}

/// Why a stored value could not become a calendar time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("julian day {0} is not positive")]
    NonPositiveDay(i64),
    #[error("year {0} outside 1..=9999")]
    YearOutOfRange(i64),
    #[error("{0} ms is not a time of day")]
    MillisecondsOutOfRange(i64),
}

impl JulianDate {
    pub const fn new(day: i64, milliseconds: i64) -> Self {
        Self { day, milliseconds }
    }

    /// An all-zero pair means the variable was never set.
    pub fn is_unset(&self) -> bool {
        self.day == 0 && self.milliseconds == 0
    }

    /// Convert to a proleptic calendar date and time of day.
    pub fn to_calendar(&self) -> Result<CalendarTime, TimestampError> {
        if self.day <= 0 {
            return Err(TimestampError::NonPositiveDay(self.day));
        }
        if self.milliseconds < 0 || self.milliseconds >= MS_PER_DAY as i64 {
            return Err(TimestampError::MillisecondsOutOfRange(self.milliseconds));
        }

        let (year, month, day) = julian_day_to_ymd(self.day);
        if !(1..=9999).contains(&year) {
            return Err(TimestampError::YearOutOfRange(year));
        }

        let (hour, minute, second, millisecond) = split_milliseconds(self.milliseconds);
        Ok(CalendarTime {
            year: year as i32,
            month: month as u8,
            day: day as u8,
            hour,
            minute,
            second,
            millisecond,
        })
    }

    /// Format as an elapsed duration, e.g. `3 days 4 hours 12 minutes 5 seconds`.
    ///
    /// Zero components are omitted; an all-zero duration yields `0 seconds`.
    pub fn to_duration_string(&self) -> String {
        let (hour, minute, second, _) = split_milliseconds(self.milliseconds.max(0));
        let mut parts = Vec::new();
        if self.day != 0 {
            parts.push(format!("{} days", self.day));
        }
        if hour != 0 {
            parts.push(format!("{} hours", hour));
        }
        if minute != 0 {
            parts.push(format!("{} minutes", minute));
        }
        if second != 0 || parts.is_empty() {
            parts.push(format!("{} seconds", second));
        }
        parts.join(" ")
    }
}

fn split_milliseconds(ms: i64) -> (u8, u8, u8, u16) {
    let ms = ms % MS_PER_DAY as i64;
    let millisecond = (ms % 1000) as u16;
    let total_seconds = ms / 1000;
    let second = (total_seconds % 60) as u8;
    let minute = ((total_seconds / 60) % 60) as u8;
    let hour = (total_seconds / 3600) as u8;
    (hour, minute, second, millisecond)
}

/// Astronomical Julian day → (year, month, day) conversion.
fn julian_day_to_ymd(jd: i64) -> (i64, i64, i64) {
    let i = jd as f64;
    let a = ((i - 1_867_216.25) / 36_524.25).trunc();
    let b = if jd > GREGORIAN_SWITCH {
        i + 1.0 + a - (a / 4.0).trunc()
    } else {
        i
    };
    let c = b + 1524.0;
    let d = ((c - 122.1) / 365.25).trunc();
    let e = (365.25 * d).trunc();
    let g = ((c - e) / 30.6001).trunc();

    let day = c - e - (30.6001 * g).trunc();
    let month = if g < 13.5 { g - 1.0 } else { g - 13.0 };
    let year = if month > 2.5 { d - 4716.0 } else { d - 4715.0 };

    (year as i64, month as i64, day as i64)
}
