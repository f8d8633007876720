//! X-axis value formatting: tick labels, cursor readouts and the domain
//! fragment shown in the plot title.
//!
//! Timestamps travel through the plot as `f64` seconds since the UNIX epoch
//! (see [`super::range::datetime_to_secs`]) and are always shown as naive
//! wall-clock time, exactly as stored in the table.

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::range::{secs_to_datetime, AxisKind, AxisValue};

// ─────────────────────────────────────────────────────────────────────────────
// TimeResolution
// ─────────────────────────────────────────────────────────────────────────────

/// Granularity of the sub-second portion shown in a time label.
///
/// Ordered from coarsest to finest so `min_resolution` can act as a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeResolution {
    /// `HH:MM:SS`
    Seconds,
    /// `HH:MM:SS.mmm`
    Milliseconds,
}

// ─────────────────────────────────────────────────────────────────────────────
// TimeFormatter
// ─────────────────────────────────────────────────────────────────────────────

/// Adaptive timestamp formatter for a datetime x-axis.
///
/// * The date (`MM-DD`) is hidden unless the visible range crosses a calendar
///   day, or [`force_date_visible`](Self::force_date_visible) is set.
/// * The year is shown only with the date and only when the range crosses a
///   year boundary.
/// * Milliseconds are shown when the visible span is below
///   [`milliseconds_threshold`](Self::milliseconds_threshold) seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFormatter {
    pub force_date_visible: bool,
    pub milliseconds_threshold: f64,
    pub min_resolution: TimeResolution,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self {
            force_date_visible: false,
            milliseconds_threshold: 60.0,
            min_resolution: TimeResolution::Seconds,
        }
    }
}

impl TimeFormatter {
    /// Format `value_secs` given the visible range `(lo, hi)` in seconds.
    pub fn format(&self, value_secs: f64, x_range_secs: (f64, f64)) -> String {
        let (lo, hi) = if x_range_secs.0 <= x_range_secs.1 {
            x_range_secs
        } else {
            (x_range_secs.1, x_range_secs.0)
        };
        let start = to_naive(lo);
        let end = to_naive(hi);
        let value = to_naive(value_secs);

        let show_date = self.force_date_visible || start.date() != end.date();
        let show_year = show_date && start.year() != end.year();

        let base = if show_year {
            value.format("%Y-%m-%d %H:%M:%S").to_string()
        } else if show_date {
            value.format("%m-%d %H:%M:%S").to_string()
        } else {
            value.format("%H:%M:%S").to_string()
        };

        match self.determine_resolution(hi - lo) {
            TimeResolution::Seconds => base,
            TimeResolution::Milliseconds => {
                format!("{}.{:03}", base, value.nanosecond() / 1_000_000)
            }
        }
    }

    pub fn determine_resolution(&self, range_span_secs: f64) -> TimeResolution {
        if range_span_secs < self.milliseconds_threshold {
            TimeResolution::Milliseconds.max(self.min_resolution)
        } else {
            self.min_resolution
        }
    }
}

/// Out-of-range or non-finite seconds fall back to the UNIX epoch.
fn to_naive(secs: f64) -> NaiveDateTime {
    secs_to_datetime(secs).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Numeric formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Render `value` as compact scientific notation like `1.23e5`.
fn format_scientific(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", digits, value);
    }
    let exp = value.abs().log10().floor() as i32;
    let mantissa = value / 10f64.powi(exp);
    if exp == 0 {
        format!("{:.*}", digits, mantissa)
    } else {
        format!("{:.*}e{}", digits, mantissa, exp)
    }
}

/// Decimal notation, switching to scientific when the tick step is far from
/// unity relative to `dec_pl`.
pub fn format_numeric(value: f64, dec_pl: usize, step: f64) -> String {
    let sci = step.is_finite() && step != 0.0 && {
        let exp = step.abs().log10().floor() as i32;
        exp < -(dec_pl as i32) || exp >= dec_pl as i32 + 3
    };
    if sci {
        format_scientific(value, dec_pl)
    } else {
        format!("{:.*}", dec_pl, value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// XFormatter
// ─────────────────────────────────────────────────────────────────────────────

/// How x-axis values are rendered for the current x column.
#[derive(Debug, Clone, PartialEq)]
pub enum XFormatter {
    Numeric { decimal_places: usize },
    Time(TimeFormatter),
}

impl Default for XFormatter {
    fn default() -> Self {
        XFormatter::Numeric { decimal_places: 2 }
    }
}

impl XFormatter {
    /// Formatter suited to an axis of the given kind.
    pub fn for_kind(kind: AxisKind) -> Self {
        match kind {
            AxisKind::DateTime => XFormatter::Time(TimeFormatter::default()),
            AxisKind::Numeric => XFormatter::default(),
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, XFormatter::Time(_))
    }

    /// Tick label for `value` with the visible bounds and tick `step`.
    pub fn format_tick(&self, value: f64, x_bounds: (f64, f64), step: f64) -> String {
        match self {
            XFormatter::Numeric { decimal_places } => format_numeric(value, *decimal_places, step),
            XFormatter::Time(tf) => tf.format(value, x_bounds),
        }
    }

    /// Cursor readout: always full precision for timestamps.
    pub fn format_cursor(&self, value: f64) -> String {
        match self {
            XFormatter::Numeric { decimal_places } => format!("{:.*}", decimal_places + 2, value),
            XFormatter::Time(_) => to_naive(value).format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Title fragment
// ─────────────────────────────────────────────────────────────────────────────

/// One end of the plot domain as shown in the title: floats rounded to two
/// decimals, timestamps to the second, unset ends as `x`.
pub fn title_value(value: Option<&AxisValue>) -> String {
    match value {
        None => "x".to_string(),
        Some(AxisValue::Number(v)) => format!("{}", (v * 100.0).round() / 100.0),
        Some(AxisValue::DateTime(dt)) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Title fragment summarizing the applied domain, e.g. `1.5  -  x`.
pub fn domain_title(left: Option<&AxisValue>, right: Option<&AxisValue>) -> String {
    format!("{}  -  {}", title_value(left), title_value(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::range::datetime_to_secs;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32, s: u32) -> f64 {
        let dt = NaiveDate::from_ymd_opt(2024, 1, d)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap();
        datetime_to_secs(&dt)
    }

    #[test]
    fn time_hides_date_within_one_day() {
        let tf = TimeFormatter::default();
        let t = at(15, 12, 0, 0);
        assert_eq!(tf.format(t, (t - 3600.0, t + 3600.0)), "12:00:00");
    }

    #[test]
    fn time_shows_date_across_midnight() {
        let tf = TimeFormatter::default();
        let t = at(15, 23, 30, 0);
        assert_eq!(tf.format(t, (t, at(16, 0, 30, 0))), "01-15 23:30:00");
    }

    #[test]
    fn time_shows_millis_for_short_spans() {
        let tf = TimeFormatter::default();
        let t = at(15, 12, 0, 0) + 0.25;
        assert_eq!(tf.format(t, (t - 1.0, t + 1.0)), "12:00:00.250");
    }

    #[test]
    fn numeric_switches_to_scientific() {
        assert_eq!(format_numeric(12.346, 2, 1.0), "12.35");
        assert_eq!(format_numeric(0.00012, 2, 0.0001), "1.20e-4");
    }

    #[test]
    fn title_rounds_floats_and_marks_open_ends() {
        let l = AxisValue::Number(1.23456);
        assert_eq!(domain_title(Some(&l), None), "1.23  -  x");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_milli_opt(8, 0, 5, 500))
            .unwrap();
        assert_eq!(
            domain_title(None, Some(&AxisValue::DateTime(dt))),
            "x  -  2024-03-01 08:00:05"
        );
    }
}
