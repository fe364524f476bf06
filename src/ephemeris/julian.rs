//! Julian dates and the TT − UT correction.

use chrono::{Datelike, Timelike};

use crate::types::UtcInstant;

/// Julian date of J2000.0 (2000-01-01 12:00 TT).
pub const J2000_JD: f64 = 2_451_545.0;

/// Days per Julian century.
pub const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Julian date of the Unix epoch (1970-01-01 00:00 UT).
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date (UT) of a Gregorian calendar date and fractional hour.
///
/// Meeus, *Astronomical Algorithms*, ch. 7. Valid for Gregorian dates.
pub fn julian_day(year: i32, month: u32, day: u32, hours: f64) -> f64 {
    let (y, m) = if month <= 2 {
        (year as f64 - 1.0, month as f64 + 12.0)
    } else {
        (year as f64, month as f64)
    };
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + b - 1524.5
        + hours / 24.0
}

/// Julian date (UT) of an instant.
pub fn julian_day_ut(instant: &UtcInstant) -> f64 {
    let dt = instant.as_datetime();
    let secs = dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 * 1e-9;
    UNIX_EPOCH_JD + secs / SECONDS_PER_DAY
}

/// Julian centuries since J2000.0.
pub fn julian_centuries(jd: f64) -> f64 {
    (jd - J2000_JD) / DAYS_PER_CENTURY
}

/// Decimal year of an instant, mid-month convention used by the ΔT fits.
pub fn decimal_year(instant: &UtcInstant) -> f64 {
    let dt = instant.as_datetime();
    let day_fraction = (dt.day() as f64 - 1.0 + dt.hour() as f64 / 24.0) / 31.0;
    dt.year() as f64 + (dt.month() as f64 - 1.0 + day_fraction) / 12.0
}

/// ΔT = TT − UT in seconds.
///
/// Espenak & Meeus (2006) polynomial fits for 1900–2150, with the
/// Morrison & Stephenson long-term parabola outside that window.
pub fn delta_t_seconds(year: f64) -> f64 {
    let y = year;
    if (1900.0..1920.0).contains(&y) {
        let t = y - 1900.0;
        -2.79 + 1.494119 * t - 0.0598939 * t.powi(2) + 0.0061966 * t.powi(3)
            - 0.000197 * t.powi(4)
    } else if (1920.0..1941.0).contains(&y) {
        let t = y - 1920.0;
        21.20 + 0.84493 * t - 0.076100 * t.powi(2) + 0.0020936 * t.powi(3)
    } else if (1941.0..1961.0).contains(&y) {
        let t = y - 1950.0;
        29.07 + 0.407 * t - t.powi(2) / 233.0 + t.powi(3) / 2547.0
    } else if (1961.0..1986.0).contains(&y) {
        let t = y - 1975.0;
        45.45 + 1.067 * t - t.powi(2) / 260.0 - t.powi(3) / 718.0
    } else if (1986.0..2005.0).contains(&y) {
        let t = y - 2000.0;
        63.86 + 0.3345 * t - 0.060374 * t.powi(2) + 0.0017275 * t.powi(3)
            + 0.000651814 * t.powi(4)
            + 0.00002373599 * t.powi(5)
    } else if (2005.0..2050.0).contains(&y) {
        let t = y - 2000.0;
        62.92 + 0.32217 * t + 0.005589 * t.powi(2)
    } else if (2050.0..2150.0).contains(&y) {
        let u = (y - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u - 0.5628 * (2150.0 - y)
    } else {
        let u = (y - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> UtcInstant {
        UtcInstant::new(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap()
                .and_utc(),
        )
    }

    #[test]
    fn test_julian_day_meeus_examples() {
        // Meeus example 7.a: 1957 October 4.81
        assert!((julian_day(1957, 10, 4, 0.81 * 24.0) - 2_436_116.31).abs() < 1e-6);
        // J2000.0
        assert!((julian_day(2000, 1, 1, 12.0) - J2000_JD).abs() < 1e-9);
        // January/February use the previous-year branch
        assert!((julian_day(1987, 1, 27, 0.0) - 2_446_822.5).abs() < 1e-9);
    }

    #[test]
    fn test_julian_day_ut_matches_calendar() {
        let jd = julian_day_ut(&instant(1990, 8, 15, 9, 0));
        assert!((jd - julian_day(1990, 8, 15, 9.0)).abs() < 1e-9);
        assert!((jd - 2_448_118.875).abs() < 1e-9);
    }

    #[test]
    fn test_centuries_zero_at_j2000() {
        assert_eq!(julian_centuries(J2000_JD), 0.0);
        assert!((julian_centuries(J2000_JD + DAYS_PER_CENTURY) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_delta_t_known_values() {
        // Observed: ~57 s in 1990, ~63.8 s in 2000, ~69 s in 2020.
        assert!((delta_t_seconds(1990.5) - 57.0).abs() < 1.0);
        assert!((delta_t_seconds(2000.0) - 63.86).abs() < 0.01);
        assert!((delta_t_seconds(2020.0) - 71.5).abs() < 3.0);
        // Early 20th century is near zero.
        assert!(delta_t_seconds(1902.0).abs() < 3.0);
    }

    #[test]
    fn test_decimal_year() {
        let y = decimal_year(&instant(1990, 1, 1, 0, 0));
        assert!((y - 1990.0).abs() < 1e-9);
        let y = decimal_year(&instant(1990, 7, 1, 0, 0));
        assert!((y - 1990.5).abs() < 1e-9);
    }
}
