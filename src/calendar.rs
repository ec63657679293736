//! Solar Hijri (Jalali) display dates
//!
//! Orders keep a UTC instant for filtering and a Tehran-local Jalali string
//! for humans.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

/// Iran Standard Time. No DST since 2022.
const TEHRAN_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

const DAYS_BEFORE_MONTH: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Convert a Gregorian date to (year, month, day) in the Solar Hijri calendar
pub fn gregorian_to_jalali(year: i32, month: u32, day: u32) -> (i64, u32, u32) {
    let gy = i64::from(year);
    let gm = i64::from(month);
    let gd = i64::from(day);
    let gy2 = if gm > 2 { gy + 1 } else { gy };

    let month_index = usize::try_from(gm - 1).unwrap_or(0).min(11);
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd
        + DAYS_BEFORE_MONTH[month_index];

    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    // jm is in 1..=12 and jd in 1..=31 by construction
    (
        jy,
        u32::try_from(jm).unwrap_or(1),
        u32::try_from(jd).unwrap_or(1),
    )
}

/// Format an instant as `YYYY/MM/DD HH:MM` in Tehran local time
pub fn display_timestamp(instant: DateTime<Utc>) -> String {
    let local = match FixedOffset::east_opt(TEHRAN_OFFSET_SECS) {
        Some(offset) => instant.with_timezone(&offset),
        None => instant.fixed_offset(),
    };
    let (jy, jm, jd) = gregorian_to_jalali(local.year(), local.month(), local.day());
    format!(
        "{jy:04}/{jm:02}/{jd:02} {:02}:{:02}",
        local.hour(),
        local.minute()
    )
}
