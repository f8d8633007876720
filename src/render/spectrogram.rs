//! Spectrogram overlay: time × frequency-bin intensity mesh built from an
//! array column.
//!
//! Bins outside the configured line range are cut, the remaining bins are
//! averaged in blocks whose size follows the quality setting, and the whole
//! mesh is rescaled so its mean maps to the brightness setting.

use log::debug;

use crate::color_scheme::Rgba;
use crate::data::settings::SpectrogramSettings;
use crate::data::table::{Table, Value, DATETIME_COLUMN};
use crate::error::RenderError;

pub const FREQUENCY_AXIS_LABEL: &str = "Frequency (Hz)";

/// Ready-to-draw spectrogram.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramMesh {
    /// Timestamp (epoch seconds) of each mesh column, ascending.
    pub x: Vec<f64>,
    /// Rescaled intensity, `z[row][col]`; row 0 is the lowest bin block.
    pub z: Vec<Vec<f64>>,
    /// `rows × cols` colors, row-major, row 0 lowest.
    pub colors: Vec<Rgba>,
    /// Range shown on the frequency axis.
    pub freq_range: (f64, f64),
}

impl SpectrogramMesh {
    pub fn rows(&self) -> usize {
        self.z.len()
    }

    pub fn cols(&self) -> usize {
        self.x.len()
    }
}

/// Number of adjacent bins averaged into one mesh row.
pub fn reduction_factor(quality: f64) -> usize {
    let r = (51.0 - 50.0 * quality.max(0.0).powf(1.0 / 5.0)) as i64;
    r.max(1) as usize
}

/// Block means of `bins` in blocks of `block`; a short last block is padded
/// with zeros.
fn block_mean(bins: &[f64], block: usize) -> Vec<f64> {
    bins.chunks(block)
        .map(|c| c.iter().sum::<f64>() / block as f64)
        .collect()
}

/// Build the mesh for `settings.column` over the rows of `view`, which must
/// carry the timestamp column. Returns `Ok(None)` when there is nothing to
/// draw.
pub fn build_spectrogram(
    view: &Table,
    x_axis: &str,
    settings: &SpectrogramSettings,
) -> Result<Option<SpectrogramMesh>, RenderError> {
    if !settings.enabled {
        return Ok(None);
    }
    if x_axis != DATETIME_COLUMN {
        return Err(RenderError::SpectrogramAxis(x_axis.to_string()));
    }
    if settings.column.is_empty() {
        debug!("no spectrogram column selected");
        return Ok(None);
    }
    let col = view
        .column(&settings.column)
        .ok_or_else(|| RenderError::InvalidColumn(settings.column.clone()))?;
    let ts = view
        .column(DATETIME_COLUMN)
        .ok_or_else(|| RenderError::InvalidColumn(DATETIME_COLUMN.to_string()))?;
    if col.array_len().is_none() {
        if col.is_all_null() {
            return Ok(None);
        }
        return Err(RenderError::NotAnArrayColumn(settings.column.clone()));
    }

    let mut rows: Vec<(f64, &[f64])> = ts
        .values
        .iter()
        .zip(&col.values)
        .filter_map(|(t, v)| match (t.as_f64(), v) {
            (Some(t), Value::Array(a)) if t.is_finite() => Some((t, a.as_slice())),
            _ => None,
        })
        .collect();
    if rows.is_empty() {
        return Ok(None);
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_bins = rows.iter().map(|(_, a)| a.len()).min().unwrap_or(0);
    let max_bins = settings.lines.max_val().unwrap_or(n_bins).max(1);
    let left = settings.lines.left_val().unwrap_or(0).min(n_bins);
    let right = settings.lines.right_val().unwrap_or(n_bins).min(n_bins);
    if right <= left {
        return Ok(None);
    }
    let reduction = reduction_factor(settings.quality.val());

    // Transpose to bins × time while reducing.
    let reduced: Vec<Vec<f64>> = rows
        .iter()
        .map(|(_, a)| block_mean(&a[left..right], reduction))
        .collect();
    let n_rows = reduced[0].len();
    let mut z: Vec<Vec<f64>> = (0..n_rows)
        .map(|r| reduced.iter().map(|col| col[r]).collect())
        .collect();

    let count = (n_rows * rows.len()) as f64;
    let mean = z.iter().flatten().sum::<f64>() / count;
    let gain = (settings.brightness.val() * 2.0).powi(5);
    if mean.is_finite() && mean != 0.0 {
        for v in z.iter_mut().flatten() {
            *v = *v / mean * gain;
        }
    }

    // Color scale: minimum of the mesh up to 1.0.
    let vmin = z.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let vmax = 1.0;
    let colors = z
        .iter()
        .flatten()
        .map(|v| {
            let t = if vmax > vmin { (v - vmin) / (vmax - vmin) } else { 1.0 };
            settings.colormap.sample(t as f32)
        })
        .collect();

    debug!(
        "spectrogram '{}': {} x {} (bins {}..{}, reduction {})",
        settings.column,
        n_rows,
        rows.len(),
        left,
        right,
        reduction
    );
    Ok(Some(SpectrogramMesh {
        x: rows.iter().map(|(t, _)| *t).collect(),
        z,
        colors,
        freq_range: (
            1000.0 * left as f64 / max_bins as f64,
            1000.0 * right as f64 / max_bins as f64,
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::range::{LimitedRange, LimitedValue};
    use crate::data::table::Column;
    use chrono::NaiveDate;

    fn table() -> Table {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Table::with_sequential_ids(vec![
            Column::from_datetimes(
                DATETIME_COLUMN,
                (0..3).map(|i| t0 + chrono::Duration::seconds(i)),
            ),
            Column::from_arrays("fft", (0..3).map(|i| vec![1.0 + i as f64, 2.0, 3.0, 4.0])),
        ])
        .unwrap()
    }

    fn settings() -> SpectrogramSettings {
        SpectrogramSettings {
            enabled: true,
            column: "fft".into(),
            lines: LimitedRange::spanning(0, 4),
            brightness: LimitedValue::bounded(0.0, 1.0, 0.5),
            quality: LimitedValue::bounded(0.1, 1.0, 1.0),
            ..SpectrogramSettings::default()
        }
    }

    #[test]
    fn reduction_follows_quality() {
        assert_eq!(reduction_factor(1.0), 1);
        assert_eq!(reduction_factor(0.1), 19);
    }

    #[test]
    fn full_quality_keeps_every_bin_and_normalizes_mean() {
        let mesh = build_spectrogram(&table(), DATETIME_COLUMN, &settings()).unwrap().unwrap();
        assert_eq!(mesh.rows(), 4);
        assert_eq!(mesh.cols(), 3);
        let mean: f64 = mesh.z.iter().flatten().sum::<f64>() / 12.0;
        assert!((mean - 1.0).abs() < 1e-9);
        assert_eq!(mesh.colors.len(), 12);
        assert_eq!(mesh.freq_range, (0.0, 1000.0));
    }

    #[test]
    fn line_range_and_blocks() {
        let mut s = settings();
        s.lines.set_left_val(Some(1));
        s.quality.set_val(0.5);
        let r = reduction_factor(0.5);
        assert!(r > 1);
        let mesh = build_spectrogram(&table(), DATETIME_COLUMN, &s).unwrap().unwrap();
        assert_eq!(mesh.rows(), (3 + r - 1) / r);
        assert_eq!(mesh.freq_range, (250.0, 1000.0));
    }

    #[test]
    fn non_timestamp_axis_is_rejected() {
        assert!(matches!(
            build_spectrogram(&table(), "Depth(m)", &settings()),
            Err(RenderError::SpectrogramAxis(_))
        ));
    }
}
