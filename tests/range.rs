use labelplot::{AxisValue, LimitedRange, LimitedValue};

// Helper: small deterministic generator so the sequences are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn value(&mut self) -> f64 {
        (self.next() % 200) as f64 - 100.0
    }
}

fn assert_ordered(r: &LimitedRange<f64>) {
    if let (Some(min), Some(l), Some(rt), Some(max)) = (r.min_val(), r.left_val(), r.right_val(), r.max_val()) {
        assert!(min <= l && l <= rt && rt <= max, "broken order: {:?}", r);
    }
}

#[test]
fn any_assignment_sequence_keeps_order() {
    for seed in 0..50u64 {
        let mut rng = Lcg(seed);
        let mut r = LimitedRange::spanning(-10.0, 10.0);
        for _ in 0..200 {
            let v = Some(rng.value());
            match rng.next() % 4 {
                0 => r.set_min_val(v),
                1 => r.set_max_val(v),
                2 => r.set_left_val(v),
                _ => r.set_right_val(v),
            }
            assert_ordered(&r);
        }
    }
}

#[test]
fn window_never_inverts() {
    let mut r = LimitedRange::new(Some(0.0), Some(10.0), Some(2.0), Some(4.0));
    r.set_right_val(Some(1.0));
    assert_eq!((r.left_val(), r.right_val()), (Some(1.0), Some(1.0)));
    r.set_right_val(Some(20.0));
    assert_eq!(r.right_val(), Some(10.0));
    r.set_left_val(Some(20.0));
    assert_eq!((r.left_val(), r.right_val()), (Some(10.0), Some(10.0)));
}

#[test]
fn max_below_min_collapses_to_min() {
    let mut r = LimitedRange::spanning(5.0, 10.0);
    r.set_max_val(Some(1.0));
    assert_eq!(r.max_val(), Some(5.0));
    assert_eq!((r.left_val(), r.right_val()), (Some(5.0), Some(5.0)));
}

#[test]
fn disabled_enforcement_stores_raw_values() {
    let mut r = LimitedRange::spanning(0.0, 10.0);
    r.set_enforce_limits(false);
    r.set_left_val(Some(-5.0));
    assert_eq!(r.left_val(), Some(-5.0));
    r.set_enforce_limits(true);
    assert_eq!(r.left_val(), Some(0.0));
}

#[test]
fn factors_and_values() {
    let r = LimitedRange::new(Some(0.0), Some(10.0), Some(2.5), Some(5.0));
    assert_eq!(r.factors(), Some((0.25, 0.5)));
    assert_eq!(r.value_at_factor(0.8), Some(8.0));
    assert_eq!(LimitedRange::spanning(3.0, 3.0).factors(), Some((0.0, 1.0)));
    assert_eq!(LimitedRange::<f64>::default().factors(), None);
}

#[test]
fn datetime_range_kind() {
    use chrono::NaiveDate;
    let a = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let b = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let r = LimitedRange::spanning(AxisValue::DateTime(a), AxisValue::DateTime(b));
    assert_eq!(r.kind(), Some(labelplot::data::range::AxisKind::DateTime));
    assert_eq!(r.factors(), Some((0.0, 1.0)));
}

#[test]
fn limited_value_clamps() {
    let mut v = LimitedValue::bounded(0, 10_000, 0i64);
    assert!(v.set_val(20_000));
    assert_eq!(v.val(), 10_000);
    assert!(!v.set_val(50_000));
    v.set_max_val(Some(500));
    assert_eq!(v.val(), 500);
    v.set_min_val(Some(1_000));
    assert_eq!(v.min_val(), Some(500));
}

#[test]
fn limited_value_ignores_non_finite() {
    let mut v = LimitedValue::bounded(0.0, 1.0, 0.5);
    assert!(!v.set_val(f64::NAN));
    assert!(!v.set_val(f64::INFINITY));
    assert_eq!(v.val(), 0.5);
    assert!(v.set_val(2.0));
    assert_eq!(v.val(), 1.0);
}
