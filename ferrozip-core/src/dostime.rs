//! MS-DOS packed date-time, the 32-bit timestamp format every ZIP header
//! carries.
//!
//! Layout (little-endian on the wire, time in the low word, date in the
//! high word):
//!
//! ```text
//! bits  0..5   seconds / 2   (0-29)
//! bits  5..11  minute        (0-59)
//! bits 11..16  hour          (0-23)
//! bits 16..21  day           (1-31)
//! bits 21..25  month         (1-12)
//! bits 25..32  year - 1980   (0-119, i.e. 1980-2099)
//! ```
//!
//! Converting *from* calendar time clamps out-of-range years silently;
//! converting *into* calendar time never clamps, and every construction from
//! a raw packed value validates the fields, not just ones typed by a user.

use crate::error::{FerroZipError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// A validated DOS date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime(u32);

impl DosDateTime {
    /// The earliest representable instant, 1980-01-01 00:00:00.
    pub const MIN: DosDateTime = DosDateTime(0x0021_0000);

    /// Build from a raw packed value, validating every field.
    pub fn from_packed(packed: u32) -> Result<Self> {
        let dt = Self(packed);
        let (second2, minute, hour) = dt.time_fields();
        let (day, month, year_off) = dt.date_fields();
        if second2 > 29 {
            return Err(invalid("seconds", second2));
        }
        if minute > 59 {
            return Err(invalid("minute", minute));
        }
        if hour > 23 {
            return Err(invalid("hour", hour));
        }
        if day < 1 {
            return Err(invalid("day", day));
        }
        if !(1..=12).contains(&month) {
            return Err(invalid("month", month));
        }
        if year_off > 119 {
            return Err(invalid("year", year_off));
        }
        Ok(dt)
    }

    /// Convert a calendar time, clamping years outside 1980-2099.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let clamped = match dt.year() {
            y if y < 1980 => NaiveDate::from_ymd_opt(1980, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(dt),
            y if y > 2099 => NaiveDate::from_ymd_opt(2099, 12, 31)
                .and_then(|d| d.and_hms_opt(23, 59, 58))
                .unwrap_or(dt),
            _ => dt,
        };
        let time = (clamped.second() / 2)
            | (clamped.minute() << 5)
            | (clamped.hour() << 11);
        let date = clamped.day()
            | (clamped.month() << 5)
            | ((clamped.year() as u32 - 1980) << 9);
        Self((date << 16) | time)
    }

    /// Convert back to calendar time.
    pub fn to_datetime(self) -> NaiveDateTime {
        let (second2, minute, hour) = self.time_fields();
        let (day, month, year_off) = self.date_fields();
        // Fields were validated on construction; the expect covers only
        // impossible day-of-month combinations like Feb 30, which the DOS
        // format itself cannot rule out. Saturate those to the month start.
        NaiveDate::from_ymd_opt(1980 + year_off as i32, month, day)
            .unwrap_or_else(|| {
                NaiveDate::from_ymd_opt(1980 + year_off as i32, month, 1).unwrap()
            })
            .and_hms_opt(hour, minute, second2 * 2)
            .unwrap()
    }

    /// The raw packed 32-bit value.
    pub fn as_packed(self) -> u32 {
        self.0
    }

    /// The time half (low 16 bits), as stored in older header layouts.
    pub fn time_word(self) -> u16 {
        self.0 as u16
    }

    /// The date half (high 16 bits).
    pub fn date_word(self) -> u16 {
        (self.0 >> 16) as u16
    }

    fn time_fields(self) -> (u32, u32, u32) {
        let t = self.0 & 0xFFFF;
        (t & 0x1F, (t >> 5) & 0x3F, (t >> 11) & 0x1F)
    }

    fn date_fields(self) -> (u32, u32, u32) {
        let d = self.0 >> 16;
        (d & 0x1F, (d >> 5) & 0x0F, (d >> 9) & 0x7F)
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::MIN
    }
}

fn invalid(field: &str, value: u32) -> FerroZipError {
    FerroZipError::structural(format!("invalid DOS time: {} field is {}", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_roundtrip_lower_boundary() {
        let t = dt(1980, 1, 1, 0, 0, 0);
        let packed = DosDateTime::from_datetime(t);
        assert_eq!(packed, DosDateTime::MIN);
        assert_eq!(packed.to_datetime(), t);
        assert_eq!(DosDateTime::from_packed(packed.as_packed()).unwrap(), packed);
    }

    #[test]
    fn test_roundtrip_upper_boundary() {
        let t = dt(2099, 12, 31, 23, 59, 58);
        let packed = DosDateTime::from_datetime(t);
        assert_eq!(packed.to_datetime(), t);
    }

    #[test]
    fn test_two_second_resolution() {
        let t = dt(2024, 6, 15, 12, 30, 31);
        let packed = DosDateTime::from_datetime(t);
        // Odd seconds truncate to the even value below.
        assert_eq!(packed.to_datetime(), dt(2024, 6, 15, 12, 30, 30));
    }

    #[test]
    fn test_year_clamps_low() {
        let packed = DosDateTime::from_datetime(dt(1975, 7, 4, 9, 0, 0));
        assert_eq!(packed.to_datetime(), dt(1980, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_year_clamps_high() {
        let packed = DosDateTime::from_datetime(dt(2150, 1, 1, 0, 0, 0));
        assert_eq!(packed.to_datetime(), dt(2099, 12, 31, 23, 59, 58));
    }

    #[test]
    fn test_from_packed_rejects_bad_seconds() {
        // Seconds field 31 (> 29)
        let base = DosDateTime::from_datetime(dt(2000, 1, 1, 0, 0, 0)).as_packed();
        let bad = (base & !0x1F) | 31;
        assert!(DosDateTime::from_packed(bad).is_err());
    }

    #[test]
    fn test_from_packed_rejects_bad_minute_hour() {
        let base = DosDateTime::from_datetime(dt(2000, 1, 1, 0, 0, 0)).as_packed();
        let bad_minute = (base & !(0x3F << 5)) | (60 << 5);
        assert!(DosDateTime::from_packed(bad_minute).is_err());
        let bad_hour = (base & !(0x1F << 11)) | (24 << 11);
        assert!(DosDateTime::from_packed(bad_hour).is_err());
    }

    #[test]
    fn test_from_packed_rejects_bad_date_fields() {
        let base = DosDateTime::from_datetime(dt(2000, 6, 15, 0, 0, 0)).as_packed();
        let zero_day = base & !(0x1F << 16);
        assert!(DosDateTime::from_packed(zero_day).is_err());
        let zero_month = base & !(0x0F << 21);
        assert!(DosDateTime::from_packed(zero_month).is_err());
        let month_13 = (base & !(0x0F << 21)) | (13 << 21);
        assert!(DosDateTime::from_packed(month_13).is_err());
        let year_120 = (base & !(0x7F << 25)) | (120 << 25);
        assert!(DosDateTime::from_packed(year_120).is_err());
    }

    #[test]
    fn test_words_split() {
        let packed = DosDateTime::from_datetime(dt(2024, 3, 2, 10, 20, 30));
        let v = packed.as_packed();
        assert_eq!(packed.time_word(), v as u16);
        assert_eq!(packed.date_word(), (v >> 16) as u16);
    }
}
