use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use tracing::debug;

use routerdash_core::chart::{ChartPanel, RefLineKind, metric_panels, rssi_panels};
use routerdash_core::model::ChartMode;
use routerdash_core::state::DashboardState;

use super::styles;

/// Rows a single panel needs to be readable
const MIN_PANEL_HEIGHT: u16 = 9;

/// Segments per dashed reference line
const DASH_SEGMENTS: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotKey {
    version: u64,
    mode: ChartMode,
    rssi_only: bool,
}

/// Prepared chart panels for the current chart data.
///
/// Panels are rebuilt only when the data or the view mode changes; terminal
/// resizes just lay the existing panels out again.
#[derive(Debug, Default)]
pub struct ChartSlots {
    key: Option<SlotKey>,
    panels: Vec<ChartPanel>,
    builds: u64,
}

impl ChartSlots {
    /// Rebuild if the state moved on. Returns true when panels were replaced.
    pub fn sync(&mut self, state: &DashboardState) -> bool {
        let key = SlotKey {
            version: state.chart_version,
            mode: state.chart.mode,
            rssi_only: state.chart.rssi_only,
        };
        if self.key == Some(key) {
            return false;
        }

        // old panels go before the new set is built
        drop(std::mem::take(&mut self.panels));

        self.panels = if key.rssi_only {
            rssi_panels(&state.all_rssi, key.mode)
        } else if state.chart_rows.is_empty() {
            Vec::new()
        } else {
            metric_panels(&state.chart_rows, key.mode)
        };
        self.key = Some(key);
        self.builds += 1;
        debug!(builds = self.builds, panels = self.panels.len(), "chart panels rebuilt");
        true
    }

    pub fn panels(&self) -> &[ChartPanel] {
        &self.panels
    }

    #[cfg(test)]
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Forget everything, e.g. on logout
    pub fn release(&mut self) {
        self.panels.clear();
        self.key = None;
    }
}

/// Dashed line as evenly spaced scatter points
fn dashed(x_bounds: (f64, f64), y: f64) -> Vec<(f64, f64)> {
    let (lo, hi) = x_bounds;
    let step = (hi - lo) / DASH_SEGMENTS as f64;
    (0..=DASH_SEGMENTS)
        .step_by(2)
        .map(|i| (lo + step * i as f64, y))
        .collect()
}

/// Time under the cursor for a fraction across the x range
pub fn cursor_time(panel: &ChartPanel, frac: f64) -> f64 {
    let (lo, hi) = panel.x_bounds;
    lo + (hi - lo) * frac.clamp(0.0, 1.0)
}

fn panel_title(panel: &ChartPanel, cursor: Option<f64>) -> Line<'static> {
    let mut spans = vec![Span::styled(format!(" {} ", panel.title), styles::title())];
    if panel.synthetic > 0 {
        spans.push(Span::styled(
            format!("({} filled) ", panel.synthetic),
            styles::text_muted(),
        ));
    }
    if let Some(tip) = cursor.and_then(|frac| panel.tooltip_at(cursor_time(panel, frac))) {
        spans.push(Span::styled(
            format!("│ {}  {}: {} ", tip.time, tip.label, tip.value),
            styles::cursor(),
        ));
    }
    Line::from(spans)
}

fn render_placeholder(f: &mut Frame, area: Rect, title: Line<'static>, text: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_subtle())
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let y = inner.y + inner.height / 2;
    let line = Rect {
        y,
        height: 1.min(inner.height),
        ..inner
    };
    f.render_widget(
        Paragraph::new(text.to_string())
            .style(styles::text_muted())
            .alignment(Alignment::Center),
        line,
    );
}

/// Draw one panel with reference lines and an optional cursor
pub fn render_panel(f: &mut Frame, area: Rect, panel: &ChartPanel, cursor: Option<f64>) {
    let title = panel_title(panel, cursor);
    if panel.is_empty() {
        render_placeholder(f, area, title, "no data");
        return;
    }

    let points = panel.series.points();
    let ref_points: Vec<(RefLineKind, Vec<(f64, f64)>)> = panel
        .ref_lines
        .iter()
        .map(|line| {
            let pts = match line.kind {
                RefLineKind::Center => vec![(panel.x_bounds.0, line.value), (panel.x_bounds.1, line.value)],
                RefLineKind::Upper => dashed(panel.x_bounds, line.value),
            };
            (line.kind, pts)
        })
        .collect();
    let cursor_points: Option<Vec<(f64, f64)>> = cursor.and_then(|frac| {
        let idx = panel.series.nearest_index(cursor_time(panel, frac))?;
        let x = *panel.series.x.get(idx)?;
        Some(vec![(x, panel.y_bounds.0), (x, panel.y_bounds.1)])
    });

    let mut datasets = Vec::with_capacity(4);
    for (kind, pts) in &ref_points {
        let graph_type = match kind {
            RefLineKind::Center => GraphType::Line,
            RefLineKind::Upper => GraphType::Scatter,
        };
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(graph_type)
                .style(styles::ref_line(*kind))
                .data(pts),
        );
    }
    if let Some(pts) = &cursor_points {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(styles::cursor())
                .data(pts),
        );
    }
    datasets.push(
        Dataset::default()
            .name(panel.data_key.clone())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(styles::metric(panel.metric))
            .data(&points),
    );

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_subtle())
                .title(title),
        )
        .x_axis(
            Axis::default()
                .bounds([panel.x_bounds.0, panel.x_bounds.1])
                .labels(panel.x_labels())
                .style(styles::text_dim()),
        )
        .y_axis(
            Axis::default()
                .bounds([panel.y_bounds.0, panel.y_bounds.1])
                .labels(panel.y_labels())
                .style(styles::text_dim()),
        )
        .hidden_legend_constraints((Constraint::Ratio(1, 1), Constraint::Ratio(1, 1)));

    f.render_widget(chart, area);
}

/// How many panels fit and where they go
fn panel_areas(area: Rect, count: usize, grid: bool) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    if grid && count == 4 && area.height >= MIN_PANEL_HEIGHT * 2 && area.width >= 80 {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        return rows
            .iter()
            .flat_map(|row| {
                Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(*row)
                    .to_vec()
            })
            .collect();
    }

    let fits = usize::from((area.height / MIN_PANEL_HEIGHT).max(1));
    let shown = count.min(fits);
    let constraints: Vec<Constraint> = (0..shown)
        .map(|_| Constraint::Ratio(1, shown as u32))
        .collect();
    Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

/// Draw the chart tab body. `scroll` skips panels in the all-devices view.
pub fn render_charts(
    f: &mut Frame,
    area: Rect,
    slots: &ChartSlots,
    rssi_only: bool,
    scroll: usize,
    cursor: Option<f64>,
) {
    let panels = slots.panels();
    if panels.is_empty() {
        let text = if rssi_only {
            "No RSSI data in this range"
        } else {
            "No data in this range"
        };
        render_placeholder(f, area, Line::from(" Charts "), text);
        return;
    }

    let start = scroll.min(panels.len().saturating_sub(1));
    let visible = &panels[start..];
    let areas = panel_areas(area, visible.len(), !rssi_only);
    for (panel, rect) in visible.iter().zip(areas) {
        render_panel(f, rect, panel, cursor);
    }
}
