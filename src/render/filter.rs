//! Row filtering: visible rows, then user filters, then the plot domain.

use log::debug;

use crate::data::range::{AxisValue, LimitedRange};
use crate::data::store::DatasetStore;
use crate::data::table::Table;
use crate::data::x_formatter::domain_title;
use crate::error::{HookError, RenderError};
use crate::hooks::HookRegistry;

/// The rows a redraw works on.
pub struct FilteredView {
    pub table: Table,
    /// Summary of the applied domain, e.g. `2.5  -  x`.
    pub title: String,
    pub filter_errors: Vec<HookError>,
}

/// Keep rows whose `x_axis` value lies inside the domain window. Unset ends
/// do not restrict; rows without a comparable x value are dropped as soon as
/// either end is set.
pub fn restrict_to_domain(
    table: &Table,
    x_axis: &str,
    domain: &LimitedRange<AxisValue>,
) -> Result<Table, RenderError> {
    let (left, right) = (domain.left_val(), domain.right_val());
    if left.is_none() && right.is_none() {
        return Ok(table.clone());
    }
    let col = table
        .column(x_axis)
        .ok_or_else(|| RenderError::InvalidColumn(x_axis.to_string()))?;
    let keep: Vec<usize> = col
        .values
        .iter()
        .enumerate()
        .filter_map(|(pos, v)| {
            let x = v.as_axis_value()?;
            let after_left = left.as_ref().map_or(true, |l| x >= *l);
            let before_right = right.as_ref().map_or(true, |r| x <= *r);
            (after_left && before_right).then_some(pos)
        })
        .collect();
    Ok(table.take_rows(&keep))
}

/// Table minus hidden rows, passed through the registered filters, then cut
/// to the plot domain of `x_axis`.
pub fn filter_rows(
    store: &DatasetStore,
    x_axis: &str,
    domain: &LimitedRange<AxisValue>,
    hooks: &HookRegistry,
) -> Result<FilteredView, RenderError> {
    let table = store.table().ok_or(RenderError::NoTable)?;
    let visible = table.take_rows(&store.visible_positions());
    let (filtered, filter_errors) = hooks.apply_filters(visible);
    let table = restrict_to_domain(&filtered, x_axis, domain)?;
    debug!(
        "filtered view: {} of {} rows ({} hidden)",
        table.len(),
        store.table().map_or(0, Table::len),
        store.hidden().len()
    );
    Ok(FilteredView {
        table,
        title: domain_title(domain.left_val().as_ref(), domain.right_val().as_ref()),
        filter_errors,
    })
}
