//! Chart data adapter
//!
//! Turns backend rows into plotted series, computes Y-axis ranges biased
//! around each metric's reference band, and prepares panels the TUI can
//! lay out at any size without touching the rows again.

use crate::model::{ChartMode, DeviceSeries, Metric, ReferenceBand, Row, XKey, row_number};
use crate::time::{axis_label, format_epoch, parse_x_to_epoch};

/// A plotted series. `x` and `y` always have the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartSeries {
    /// Epoch seconds, in source order
    pub x: Vec<f64>,
    pub y: Vec<Option<f64>>,
}

impl ChartSeries {
    /// Build from rows, dropping rows whose x-key does not parse
    pub fn from_rows(rows: &[Row], data_key: &str, x_key: XKey) -> Self {
        let mut series = Self::default();
        for row in rows {
            let x = row
                .get(x_key.as_str())
                .and_then(|v| v.as_str())
                .and_then(|s| parse_x_to_epoch(s, x_key));
            if let Some(x) = x {
                series.x.push(x);
                series.y.push(row_number(row, data_key));
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Finite y-values only
    pub fn finite_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.y.iter().filter_map(|v| *v).filter(|v| v.is_finite())
    }

    /// True when at least one sample has a plottable value
    pub fn has_values(&self) -> bool {
        self.finite_values().next().is_some()
    }

    /// (x, y) pairs with a finite y, for the chart widget
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.x
            .iter()
            .zip(&self.y)
            .filter_map(|(x, y)| y.filter(|v| v.is_finite()).map(|v| (*x, v)))
            .collect()
    }

    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        let min_t = self.x.iter().copied().fold(f64::INFINITY, f64::min);
        let max_t = self.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min_t.is_finite() && max_t.is_finite() {
            Some((min_t, max_t))
        } else {
            None
        }
    }

    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        let min_v = self.finite_values().fold(f64::INFINITY, f64::min);
        let max_v = self.finite_values().fold(f64::NEG_INFINITY, f64::max);
        if min_v.is_finite() && max_v.is_finite() {
            Some((min_v, max_v))
        } else {
            None
        }
    }

    /// Index of the sample whose time is nearest to `t`
    pub fn nearest_index(&self, t: f64) -> Option<usize> {
        self.x
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))
            .map(|(i, _)| i)
    }
}

/// Y-axis scaling decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum YRange {
    Fixed(f64, f64),
    Auto,
}

/// Reference-band-aware Y range.
///
/// The range is symmetric around the band center and always wide enough to
/// show the upper bound and every finite value, padded by 5% (minimum 1).
pub fn y_range(band: Option<ReferenceBand>, values: &[f64]) -> YRange {
    let Some(band) = band else {
        return YRange::Auto;
    };

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = if finite.is_empty() {
        let delta = band.half_width();
        (band.center - delta, band.center + delta)
    } else {
        let data_min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let delta = (data_max - band.center)
            .abs()
            .max((band.center - data_min).abs())
            .max(band.half_width());
        let pad = (delta * 0.05).max(1.0);
        (band.center - (delta + pad), band.center + (delta + pad))
    };

    if lo.is_finite() && hi.is_finite() {
        YRange::Fixed(lo, hi)
    } else {
        YRange::Auto
    }
}

/// Automatic bounds from the data alone
pub fn auto_bounds(series: &ChartSeries) -> (f64, f64) {
    match series.value_bounds() {
        None => (0.0, 1.0),
        Some((min_v, max_v)) if (max_v - min_v).abs() < f64::EPSILON => (min_v - 1.0, max_v + 1.0),
        Some((min_v, max_v)) => {
            let pad = ((max_v - min_v) * 0.05).max(1.0);
            (min_v - pad, max_v + pad)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefLineKind {
    /// Solid line at the expected operating value
    Center,
    /// Dashed line at the upper bound
    Upper,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefLine {
    pub kind: RefLineKind,
    pub value: f64,
}

/// Reference lines that fall inside the visible Y range
pub fn visible_ref_lines(band: Option<ReferenceBand>, bounds: (f64, f64)) -> Vec<RefLine> {
    let Some(band) = band else {
        return Vec::new();
    };
    let (lo, hi) = bounds;
    [
        RefLine {
            kind: RefLineKind::Center,
            value: band.center,
        },
        RefLine {
            kind: RefLineKind::Upper,
            value: band.upper,
        },
    ]
    .into_iter()
    .filter(|l| l.value >= lo && l.value <= hi)
    .collect()
}

/// Cursor readout for one sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tooltip {
    pub time: String,
    pub label: String,
    pub value: String,
}

/// A fully prepared chart: series, resolved bounds, overlays and labels.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartPanel {
    pub title: String,
    pub metric: Metric,
    pub data_key: String,
    pub x_key: XKey,
    pub series: ChartSeries,
    pub y_range: YRange,
    /// Bounds actually used for drawing (fixed or auto)
    pub y_bounds: (f64, f64),
    pub x_bounds: (f64, f64),
    pub ref_lines: Vec<RefLine>,
    /// Backend gap-fill samples among the rows
    pub synthetic: usize,
}

impl ChartPanel {
    pub fn build(title: impl Into<String>, rows: &[Row], metric: Metric, mode: ChartMode) -> Self {
        let data_key = metric.data_key(mode);
        let x_key = mode.x_key();
        let series = ChartSeries::from_rows(rows, &data_key, x_key);
        let band = metric.reference_band();

        let values: Vec<f64> = series.finite_values().collect();
        let y_range = y_range(band, &values);
        let y_bounds = match y_range {
            YRange::Fixed(lo, hi) => (lo, hi),
            YRange::Auto => auto_bounds(&series),
        };
        let x_bounds = match series.time_bounds() {
            Some((lo, hi)) if hi > lo => (lo, hi),
            Some((lo, _)) => (lo - 1.0, lo + 1.0),
            None => (0.0, 1.0),
        };
        let synthetic = rows
            .iter()
            .filter(|r| r.get("is_fake").and_then(|v| v.as_bool()) == Some(true))
            .count();

        Self {
            title: title.into(),
            metric,
            data_key,
            x_key,
            ref_lines: visible_ref_lines(band, y_bounds),
            series,
            y_range,
            y_bounds,
            x_bounds,
            synthetic,
        }
    }

    /// Empty or all-null series: render the placeholder instead
    pub fn is_empty(&self) -> bool {
        !self.series.has_values()
    }

    /// Tooltip for the sample nearest to `t`; None when its value is null
    pub fn tooltip_at(&self, t: f64) -> Option<Tooltip> {
        let idx = self.series.nearest_index(t)?;
        self.tooltip_for(idx)
    }

    pub fn tooltip_for(&self, idx: usize) -> Option<Tooltip> {
        let x = *self.series.x.get(idx)?;
        let y = (*self.series.y.get(idx)?)?;
        Some(Tooltip {
            time: format_epoch(x),
            label: self.data_key.clone(),
            value: format!("{:.3}", y),
        })
    }

    /// Evenly spaced x tick labels (first, middle, last)
    pub fn x_labels(&self) -> Vec<String> {
        let (lo, hi) = self.x_bounds;
        [lo, (lo + hi) / 2.0, hi]
            .iter()
            .map(|t| axis_label(*t, self.x_key))
            .collect()
    }

    /// Rounded y tick labels (bottom, middle, top)
    pub fn y_labels(&self) -> Vec<String> {
        let (lo, hi) = self.y_bounds;
        [lo, (lo + hi) / 2.0, hi]
            .iter()
            .map(|v| format!("{}", v.round()))
            .collect()
    }
}

/// The four per-metric panels for one device
pub fn metric_panels(rows: &[Row], mode: ChartMode) -> Vec<ChartPanel> {
    Metric::ALL
        .iter()
        .map(|m| ChartPanel::build(m.title(), rows, *m, mode))
        .collect()
}

/// One RSSI panel per device, skipping devices without rows
pub fn rssi_panels(devices: &[DeviceSeries], mode: ChartMode) -> Vec<ChartPanel> {
    devices
        .iter()
        .filter(|d| !d.rows.is_empty())
        .map(|d| {
            ChartPanel::build(
                format!("RSSI · {}", d.label()),
                &d.rows,
                Metric::RouterRssi,
                mode,
            )
        })
        .collect()
}
