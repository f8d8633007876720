//! Bounded scalar and interval primitives.
//!
//! [`LimitedValue`] is a single value with optional `min`/`max` limits,
//! [`LimitedRange`] is a `[left, right]` interval inside optional
//! `[min, max]` limits. Both back the sliders in the UI and the plot domain.
//!
//! With enforcement on, a [`LimitedRange`] keeps
//! `min <= left <= right <= max` for every value that is set.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch (millisecond resolution) for a naive timestamp.
pub fn datetime_to_secs(dt: &NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / 1000.0
}

/// Inverse of [`datetime_to_secs`]. Returns `None` for out-of-range or non-finite input.
pub fn secs_to_datetime(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).map(|d| d.naive_utc())
}

/// Scalars that can live inside a [`LimitedValue`] / [`LimitedRange`].
pub trait RangeScalar: Clone + PartialOrd + fmt::Debug {
    /// Position on a linear scale, used for factors and slider mapping.
    fn to_f64(&self) -> f64;
    /// Build a value of the same kind as `self` from a linear position.
    fn from_f64_like(&self, v: f64) -> Self;
}

impl RangeScalar for f64 {
    fn to_f64(&self) -> f64 {
        *self
    }
    fn from_f64_like(&self, v: f64) -> Self {
        v
    }
}

impl RangeScalar for i64 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
    fn from_f64_like(&self, v: f64) -> Self {
        v.round() as i64
    }
}

impl RangeScalar for usize {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
    fn from_f64_like(&self, v: f64) -> Self {
        v.round().max(0.0) as usize
    }
}

impl RangeScalar for NaiveDateTime {
    fn to_f64(&self) -> f64 {
        datetime_to_secs(self)
    }
    fn from_f64_like(&self, v: f64) -> Self {
        secs_to_datetime(v).unwrap_or(*self)
    }
}

/// A value on the x-axis: either a plain number or a timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AxisValue {
    Number(f64),
    DateTime(NaiveDateTime),
}

/// Kind tag of an [`AxisValue`] or of a whole range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisKind {
    Numeric,
    DateTime,
}

impl AxisValue {
    pub fn kind(&self) -> AxisKind {
        match self {
            AxisValue::Number(_) => AxisKind::Numeric,
            AxisValue::DateTime(_) => AxisKind::DateTime,
        }
    }
}

impl PartialOrd for AxisValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (AxisValue::Number(a), AxisValue::Number(b)) => a.partial_cmp(b),
            (AxisValue::DateTime(a), AxisValue::DateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl RangeScalar for AxisValue {
    fn to_f64(&self) -> f64 {
        match self {
            AxisValue::Number(v) => *v,
            AxisValue::DateTime(dt) => datetime_to_secs(dt),
        }
    }
    fn from_f64_like(&self, v: f64) -> Self {
        match self {
            AxisValue::Number(_) => AxisValue::Number(v),
            AxisValue::DateTime(dt) => AxisValue::DateTime(dt.from_f64_like(v)),
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Number(v) => write!(f, "{:.2}", v),
            AxisValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

fn larger<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

fn smaller<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LimitedValue
// ─────────────────────────────────────────────────────────────────────────────

/// A single value with optional lower/upper limits. Unset limits are not enforced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitedValue<T> {
    min_val: Option<T>,
    max_val: Option<T>,
    val: T,
}

impl<T: RangeScalar> LimitedValue<T> {
    pub fn new(min_val: Option<T>, max_val: Option<T>, val: T) -> Self {
        let mut lv = Self {
            min_val,
            max_val,
            val: val.clone(),
        };
        lv.val = lv.find_bounded(val);
        lv
    }

    /// Shorthand for a value limited on both sides.
    ///
    /// ```
    /// # use labelplot::data::range::LimitedValue;
    /// let v = LimitedValue::bounded(4.0, 30.0, 50.0);
    /// assert_eq!(v.val(), 30.0);
    /// ```
    pub fn bounded(min_val: T, max_val: T, val: T) -> Self {
        Self::new(Some(min_val), Some(max_val), val)
    }

    pub fn min_val(&self) -> Option<T> {
        self.min_val.clone()
    }

    pub fn max_val(&self) -> Option<T> {
        self.max_val.clone()
    }

    pub fn val(&self) -> T {
        self.val.clone()
    }

    pub fn set_min_val(&mut self, value: Option<T>) {
        let Some(value) = value else {
            self.min_val = None;
            return;
        };
        if self.min_val.as_ref() == Some(&value) {
            return;
        }
        self.min_val = Some(match &self.max_val {
            Some(max) => smaller(max.clone(), value),
            None => value,
        });
        self.val = self.find_bounded(self.val.clone());
    }

    pub fn set_max_val(&mut self, value: Option<T>) {
        let Some(value) = value else {
            self.max_val = None;
            return;
        };
        if self.max_val.as_ref() == Some(&value) {
            return;
        }
        self.max_val = Some(match &self.min_val {
            Some(min) => larger(min.clone(), value),
            None => value,
        });
        self.val = self.find_bounded(self.val.clone());
    }

    /// Set the value, clamped into the limits. Returns whether it changed.
    /// Non-finite input is ignored.
    pub fn set_val(&mut self, value: T) -> bool {
        if !value.to_f64().is_finite() {
            return false;
        }
        let bounded = self.find_bounded(value);
        if bounded == self.val {
            return false;
        }
        self.val = bounded;
        true
    }

    /// Clamp `value` into the current limits.
    pub fn find_bounded(&self, value: T) -> T {
        if let Some(max) = &self.max_val {
            if value > *max {
                return max.clone();
            }
        }
        if let Some(min) = &self.min_val {
            if value < *min {
                return min.clone();
            }
        }
        value
    }
}

impl<T: fmt::Display> fmt::Display for LimitedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} <=) {} (<= {})", opt(&self.min_val), self.val, opt(&self.max_val))
    }
}

fn opt<T: fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "None".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LimitedRange
// ─────────────────────────────────────────────────────────────────────────────

/// An interval `[left, right]` inside optional limits `[min, max]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitedRange<T> {
    min_val: Option<T>,
    max_val: Option<T>,
    left_val: Option<T>,
    right_val: Option<T>,
    enforce_limits: bool,
}

impl<T> Default for LimitedRange<T> {
    fn default() -> Self {
        Self {
            min_val: None,
            max_val: None,
            left_val: None,
            right_val: None,
            enforce_limits: true,
        }
    }
}

impl<T: RangeScalar> LimitedRange<T> {
    /// Unset `left`/`right` default to `min`/`max`.
    pub fn new(
        min_val: Option<T>,
        max_val: Option<T>,
        left_val: Option<T>,
        right_val: Option<T>,
    ) -> Self {
        Self {
            left_val: left_val.or_else(|| min_val.clone()),
            right_val: right_val.or_else(|| max_val.clone()),
            min_val,
            max_val,
            enforce_limits: true,
        }
    }

    /// Range whose window spans its whole limits.
    pub fn spanning(min_val: T, max_val: T) -> Self {
        Self::new(Some(min_val), Some(max_val), None, None)
    }

    pub fn min_val(&self) -> Option<T> {
        self.min_val.clone()
    }
    pub fn max_val(&self) -> Option<T> {
        self.max_val.clone()
    }
    pub fn left_val(&self) -> Option<T> {
        self.left_val.clone()
    }
    pub fn right_val(&self) -> Option<T> {
        self.right_val.clone()
    }
    pub fn enforce_limits(&self) -> bool {
        self.enforce_limits
    }

    /// Turning enforcement on immediately pulls left/right into the limits.
    pub fn set_enforce_limits(&mut self, enforce: bool) {
        if enforce && !self.enforce_limits {
            let (l, r) = self.find_bounded(self.left_val.clone(), self.right_val.clone());
            self.left_val = l;
            self.right_val = r;
        }
        self.enforce_limits = enforce;
    }

    pub fn set_min_val(&mut self, value: Option<T>) {
        if value == self.min_val {
            return;
        }
        let Some(value) = value else {
            self.min_val = None;
            return;
        };
        if !self.enforce_limits {
            self.min_val = Some(value);
            return;
        }
        let new_min = match &self.max_val {
            Some(max) => smaller(max.clone(), value.clone()),
            None => value.clone(),
        };
        self.min_val = Some(new_min.clone());
        if let Some(left) = self.left_val.clone() {
            self.set_left_val(Some(larger(value, left)));
        }
        if let Some(right) = self.right_val.clone() {
            self.set_right_val(Some(larger(new_min, right)));
        }
    }

    pub fn set_max_val(&mut self, value: Option<T>) {
        if value == self.max_val {
            return;
        }
        let Some(value) = value else {
            self.max_val = None;
            return;
        };
        if !self.enforce_limits {
            self.max_val = Some(value);
            return;
        }
        let new_max = match &self.min_val {
            Some(min) => larger(min.clone(), value),
            None => value,
        };
        self.max_val = Some(new_max.clone());
        if let Some(left) = self.left_val.clone() {
            self.set_left_val(Some(smaller(new_max.clone(), left)));
        }
        if let Some(right) = self.right_val.clone() {
            self.set_right_val(Some(smaller(new_max, right)));
        }
    }

    /// A `left` beyond `right` is pulled back onto `right`.
    pub fn set_left_val(&mut self, value: Option<T>) {
        if value == self.left_val {
            return;
        }
        if self.enforce_limits {
            let (l, r) = self.find_bounded(value, self.right_val.clone());
            self.left_val = l;
            self.right_val = r;
        } else {
            self.left_val = value;
        }
    }

    pub fn set_right_val(&mut self, value: Option<T>) {
        if value == self.right_val {
            return;
        }
        if self.enforce_limits {
            let (l, r) = self.find_bounded(self.left_val.clone(), value);
            self.left_val = l;
            self.right_val = r;
        } else {
            self.right_val = value;
        }
    }

    /// Clamp a desired `(left, right)` pair into the limits, with `left <= right`.
    /// Unset inputs are replaced by the corresponding limit.
    pub fn find_bounded(&self, left: Option<T>, right: Option<T>) -> (Option<T>, Option<T>) {
        let left = left.or_else(|| self.min_val.clone());
        let right = right.or_else(|| self.max_val.clone());
        let clamp = |v: Option<T>| {
            v.map(|mut v| {
                if let Some(min) = &self.min_val {
                    v = larger(min.clone(), v);
                }
                if let Some(max) = &self.max_val {
                    v = smaller(max.clone(), v);
                }
                v
            })
        };
        let mut left = clamp(left);
        let right = clamp(right);
        if let (Some(l), Some(r)) = (&left, &right) {
            if l > r {
                left = Some(r.clone());
            }
        }
        (left, right)
    }

    /// Whether the given values fall inside the limits. Unset values are ignored.
    pub fn check_in_bounds(&self, left: Option<&T>, right: Option<&T>) -> bool {
        let inside = |v: &T| {
            self.min_val.as_ref().map_or(true, |min| v >= min)
                && self.max_val.as_ref().map_or(true, |max| v <= max)
        };
        left.map_or(true, inside) && right.map_or(true, inside)
    }

    /// Adopt another range's limits and re-clamp the current window into them.
    pub fn copy_limits(&mut self, other: &LimitedRange<T>) {
        self.min_val = other.min_val.clone();
        self.max_val = other.max_val.clone();
        let (l, r) = self.find_bounded(self.left_val.clone(), self.right_val.clone());
        self.left_val = l;
        self.right_val = r;
    }

    /// Adopt another range's window, clamped into this range's limits.
    pub fn copy_vals(&mut self, other: &LimitedRange<T>) {
        let (l, r) = self.find_bounded(other.left_val.clone(), other.right_val.clone());
        self.left_val = l;
        self.right_val = r;
    }

    /// Normalized position of `value` within `[min, max]`.
    pub fn find_factor(&self, value: &T) -> Option<f64> {
        let (min, max) = (self.min_val.as_ref()?, self.max_val.as_ref()?);
        let span = max.to_f64() - min.to_f64();
        if span == 0.0 {
            return Some(0.0);
        }
        Some((value.to_f64() - min.to_f64()) / span)
    }

    /// Normalized positions of `left` and `right`. `(0, 1)` for a zero-width range.
    pub fn factors(&self) -> Option<(f64, f64)> {
        let (min, max) = (self.min_val.as_ref()?, self.max_val.as_ref()?);
        if min.to_f64() == max.to_f64() {
            return Some((0.0, 1.0));
        }
        let left = self.left_val.as_ref().unwrap_or(min);
        let right = self.right_val.as_ref().unwrap_or(max);
        Some((self.find_factor(left)?, self.find_factor(right)?))
    }

    /// Value at normalized position `factor` within `[min, max]`.
    pub fn value_at_factor(&self, factor: f64) -> Option<T> {
        let (min, max) = (self.min_val.as_ref()?, self.max_val.as_ref()?);
        let v = min.to_f64() + factor * (max.to_f64() - min.to_f64());
        Some(min.from_f64_like(v))
    }

    pub fn is_unbounded(&self) -> bool {
        self.min_val.is_none() && self.max_val.is_none()
    }
}

impl LimitedRange<AxisValue> {
    /// Common kind of every set value, or `None` if empty or mixed.
    pub fn kind(&self) -> Option<AxisKind> {
        let mut kinds = [&self.min_val, &self.max_val, &self.left_val, &self.right_val]
            .into_iter()
            .flatten()
            .map(AxisValue::kind);
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }
}

impl<T: fmt::Display> fmt::Display for LimitedRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} <=) {} <= {} (<= {})",
            opt(&self.min_val),
            opt(&self.left_val),
            opt(&self.right_val),
            opt(&self.max_val)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_clamped_on_construction_and_set() {
        let mut v = LimitedValue::bounded(0.0, 1.0, 2.0);
        assert_eq!(v.val(), 1.0);
        assert!(v.set_val(-3.0));
        assert_eq!(v.val(), 0.0);
        assert!(!v.set_val(-1.0));
    }

    #[test]
    fn raising_min_pulls_value_up() {
        let mut v = LimitedValue::bounded(0.0, 10.0, 2.0);
        v.set_min_val(Some(5.0));
        assert_eq!(v.val(), 5.0);
        // min never exceeds max
        v.set_min_val(Some(20.0));
        assert_eq!(v.min_val(), Some(10.0));
        assert_eq!(v.val(), 10.0);
    }

    #[test]
    fn left_past_right_drags_right() {
        let mut r = LimitedRange::spanning(0.0, 10.0);
        r.set_right_val(Some(4.0));
        r.set_left_val(Some(6.0));
        // left is clamped to right, not the other way around
        assert_eq!(r.left_val(), Some(4.0));
        assert_eq!(r.right_val(), Some(4.0));
    }

    #[test]
    fn shrinking_limits_clamps_window() {
        let mut r = LimitedRange::new(Some(0.0), Some(10.0), Some(2.0), Some(8.0));
        r.set_max_val(Some(5.0));
        assert_eq!(r.right_val(), Some(5.0));
        r.set_min_val(Some(3.0));
        assert_eq!(r.left_val(), Some(3.0));
        assert_eq!(r.factors(), Some((0.0, 1.0)));
    }

    #[test]
    fn disabled_enforcement_keeps_raw_values_until_reenabled() {
        let mut r = LimitedRange::spanning(0.0, 1.0);
        r.set_enforce_limits(false);
        r.set_left_val(Some(-5.0));
        assert_eq!(r.left_val(), Some(-5.0));
        r.set_enforce_limits(true);
        assert_eq!(r.left_val(), Some(0.0));
    }

    #[test]
    fn factors_of_degenerate_range() {
        let r = LimitedRange::spanning(3.0, 3.0);
        assert_eq!(r.factors(), Some((0.0, 1.0)));
        let unbounded: LimitedRange<f64> = LimitedRange::default();
        assert_eq!(unbounded.factors(), None);
    }

    #[test]
    fn axis_range_kind() {
        let dt = chrono::NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let r = LimitedRange::spanning(AxisValue::DateTime(dt), AxisValue::DateTime(dt));
        assert_eq!(r.kind(), Some(AxisKind::DateTime));
        let mixed = LimitedRange::new(
            Some(AxisValue::Number(0.0)),
            Some(AxisValue::DateTime(dt)),
            None,
            None,
        );
        assert_eq!(mixed.kind(), None);
        assert_eq!(LimitedRange::<AxisValue>::default().kind(), None);
    }

    #[test]
    fn datetime_seconds_roundtrip_millis() {
        let dt = chrono::NaiveDate::from_ymd_opt(2021, 6, 3)
            .and_then(|d| d.and_hms_milli_opt(12, 30, 15, 250))
            .unwrap();
        let s = datetime_to_secs(&dt);
        assert_eq!(secs_to_datetime(s), Some(dt));
    }
}
