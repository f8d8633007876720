use labelplot::color_scheme::Rgba;
use labelplot::geometry::{point_in_polygon, polygon_area, CloudKind, SelectionTranslator, SeriesCloud};
use labelplot::RowSet;

const RED: Rgba = Rgba::new(1.0, 0.0, 0.0, 1.0);

// Helper: a single series of `n` points on y = x^2, ids starting at 10
fn parabola(kind: CloudKind, n: usize) -> SeriesCloud {
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let y: Vec<f64> = x.iter().map(|v| v * v).collect();
    let ids = (10..10 + n as u64).collect();
    let y_max = ((n - 1) * (n - 1)) as f64;
    let n_colors = match kind {
        CloudKind::Line => n - 1,
        CloudKind::Scatter => n,
    };
    SeriesCloud::new("sq", kind, x, y, ids, (0.0, y_max), vec![RED; n_colors])
}

#[test]
fn full_bounding_box_selects_every_row() {
    let t = SelectionTranslator::new(vec![parabola(CloudKind::Scatter, 6)]);
    let all: RowSet = (10..16).collect();
    assert_eq!(t.rectangle_select([0.0, 0.0], [5.0, 1.0]), all);
    // Corner order does not matter.
    assert_eq!(t.rectangle_select([5.0, 1.0], [0.0, 0.0]), all);
}

#[test]
fn zero_area_lasso_selects_nothing() {
    let t = SelectionTranslator::new(vec![parabola(CloudKind::Scatter, 6)]);
    let collinear = [[0.0, 0.0], [2.5, 0.5], [5.0, 1.0], [0.0, 0.0]];
    assert_eq!(polygon_area(&collinear), 0.0);
    assert!(t.lasso_select(&collinear).is_empty());
}

#[test]
fn lasso_uses_each_series_scale() {
    // Same x, different y scales: normalized y 0.5 is y 12.5 for the first
    // series and 5.0 for the second.
    let a = parabola(CloudKind::Scatter, 6);
    let mut b = parabola(CloudKind::Scatter, 6);
    b.y = vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
    b.y_max = 10.0;
    b.ids = (20..26).collect();
    let t = SelectionTranslator::new(vec![a, b]);
    let lower_half = [[-1.0, -0.1], [6.0, -0.1], [6.0, 0.5], [-1.0, 0.5]];
    let rows = t.lasso_select(&lower_half);
    assert_eq!(rows, [10, 11, 12, 13, 20, 21, 22].into_iter().collect());
}

#[test]
fn span_ignores_y() {
    let t = SelectionTranslator::new(vec![parabola(CloudKind::Line, 6)]);
    assert_eq!(t.span_select(3.5, 1.5), [12, 13].into_iter().collect());
}

#[test]
fn recolor_twice_is_identical() {
    for kind in [CloudKind::Line, CloudKind::Scatter] {
        let mut t = SelectionTranslator::new(vec![parabola(kind, 6)]);
        let sel: RowSet = [11, 12].into_iter().collect();
        t.recolor_for_selection(&sel);
        let first = t.clouds()[0].colors.clone();
        t.recolor_for_selection(&sel);
        assert_eq!(t.clouds()[0].colors, first);
        assert_ne!(first, t.clouds()[0].base_colors);
    }
}

#[test]
fn point_in_polygon_edges() {
    let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    assert!(point_in_polygon([0.5, 0.5], &square));
    assert!(!point_in_polygon([1.5, 0.5], &square));
    assert_eq!(polygon_area(&square), 1.0);
}
