use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table, TableState},
};

use routerdash_core::model::{TABLE_HEADERS, row_text};
use routerdash_core::state::DashboardState;

use super::{fit, styles};

/// Widest a single column is drawn
const MAX_COL_WIDTH: usize = 20;

/// Scroll position within the records table
#[derive(Debug, Default)]
pub struct TableView {
    /// First header drawn (horizontal scroll)
    pub col_offset: usize,
    pub rows: TableState,
}

impl TableView {
    pub fn scroll_cols(&mut self, delta: isize) {
        let max = TABLE_HEADERS.len().saturating_sub(1) as isize;
        self.col_offset = (self.col_offset as isize + delta).clamp(0, max) as usize;
    }

    pub fn scroll_rows(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.rows.select(None);
            return;
        }
        let current = self.rows.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        self.rows.select(Some(next));
    }

    /// Back to the top-left, e.g. after a new page arrives
    pub fn reset(&mut self) {
        self.rows.select(None);
        *self.rows.offset_mut() = 0;
    }
}

/// Width per column from header and cell contents, capped
pub fn column_widths(state: &DashboardState) -> Vec<usize> {
    TABLE_HEADERS
        .iter()
        .map(|h| {
            let cells = state
                .table_rows
                .iter()
                .map(|r| row_text(r, h).chars().count())
                .max()
                .unwrap_or(0);
            cells.max(h.len()).clamp(4, MAX_COL_WIDTH)
        })
        .collect()
}

/// Header indices that fit in `width` starting at `offset`
pub fn visible_columns(widths: &[usize], offset: usize, width: u16) -> Vec<usize> {
    let mut used = 0usize;
    let mut out = Vec::new();
    for (i, w) in widths.iter().enumerate().skip(offset) {
        let need = w + 1;
        if used + need > usize::from(width) && !out.is_empty() {
            break;
        }
        used += need;
        out.push(i);
    }
    out
}

pub fn pager_text(state: &DashboardState) -> String {
    format!(
        "page {}/{}  ·  {} rows  ·  {}  ·  {}",
        state.table.page,
        state.total_pages(),
        state.table_total,
        state.table.order.label(),
        state.table.range
    )
}

pub fn render_table(f: &mut Frame, area: Rect, state: &DashboardState, view: &mut TableView) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let widths = column_widths(state);
    let cols = visible_columns(&widths, view.col_offset, parts[0].width.saturating_sub(2));

    let header = TableRow::new(
        cols.iter()
            .map(|&i| Cell::from(TABLE_HEADERS[i]).style(styles::accent_bold())),
    );
    let rows: Vec<TableRow> = state
        .table_rows
        .iter()
        .map(|r| {
            TableRow::new(
                cols.iter()
                    .map(|&i| Cell::from(fit(&row_text(r, TABLE_HEADERS[i]), widths[i]))),
            )
        })
        .collect();
    let constraints: Vec<Constraint> = cols
        .iter()
        .map(|&i| Constraint::Length(widths[i] as u16))
        .collect();

    let title = if state.table_rows.is_empty() {
        " Records (empty) ".to_string()
    } else {
        format!(" Records  ·  columns {}+ ", view.col_offset + 1)
    };
    let table = Table::new(rows, constraints)
        .header(header)
        .row_highlight_style(styles::selection())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_subtle())
                .title(title),
        );
    f.render_stateful_widget(table, parts[0], &mut view.rows);

    let prev = if state.can_prev() { "[ prev" } else { "  " };
    let next = if state.can_next() { "next ]" } else { "  " };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(prev, styles::key_hint()),
            Span::raw("  "),
            Span::styled(pager_text(state), styles::text_dim()),
            Span::raw("  "),
            Span::styled(next, styles::key_hint()),
        ])),
        parts[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use routerdash_core::config::DashConfig;

    fn state() -> DashboardState {
        DashboardState::new(
            &DashConfig::default(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        )
    }

    #[test]
    fn test_visible_columns_respects_width() {
        let widths = vec![10, 10, 10, 10];
        assert_eq!(visible_columns(&widths, 0, 25), vec![0, 1]);
        assert_eq!(visible_columns(&widths, 2, 100), vec![2, 3]);
        // a column wider than the area still shows alone
        assert_eq!(visible_columns(&[30], 0, 10), vec![0]);
    }

    #[test]
    fn test_column_widths_use_headers_when_empty() {
        let widths = column_widths(&state());
        assert_eq!(widths.len(), TABLE_HEADERS.len());
        assert_eq!(widths[0], "ts_kst".len());
        assert_eq!(widths[4], 4);
    }

    #[test]
    fn test_pager_text() {
        let mut s = state();
        s.table_total = 450;
        s.table.page = 2;
        assert_eq!(
            pager_text(&s),
            "page 2/3  ·  450 rows  ·  newest first  ·  2025-01-08 .. 2025-01-15"
        );
    }

    #[test]
    fn test_scroll_clamps() {
        let mut view = TableView::default();
        view.scroll_cols(-3);
        assert_eq!(view.col_offset, 0);
        view.scroll_cols(100);
        assert_eq!(view.col_offset, TABLE_HEADERS.len() - 1);

        view.scroll_rows(5, 3);
        assert_eq!(view.rows.selected(), Some(2));
        view.scroll_rows(1, 0);
        assert_eq!(view.rows.selected(), None);
    }
}
