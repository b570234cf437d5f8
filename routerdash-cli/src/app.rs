//! Terminal dashboard: reducer task, effect runner and the draw/input loop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use routerdash_core::api::DashboardApi;
use routerdash_core::auth::authenticate;
use routerdash_core::config::{DashConfig, MIN_REFRESH_SECS, next_refresh_choice};
use routerdash_core::model::{ChartMode, DateRange, Device, Msisdn, SortOrder, Tab};
use routerdash_core::reducer::{DashboardEvent, reduce};
use routerdash_core::session::SessionStore;
use routerdash_core::state::DashboardState;
use routerdash_core::time::today_kst;

use crate::runner::{Emitter, EffectRunner};
use crate::ui::chart::{ChartSlots, render_charts};
use crate::ui::forms::{LoginAction, LoginForm, TextInput, render_confirm, render_login, render_prompt};
use crate::ui::table::{TableView, render_table};
use crate::ui::{centered_rect, styles};

/// Fraction of the x range one cursor step moves
const CURSOR_STEP: f64 = 0.02;

pub struct AppContext {
    pub config: DashConfig,
    pub api: Arc<dyn DashboardApi>,
    pub session: Arc<dyn SessionStore>,
    pub export_dir: PathBuf,
}

#[derive(Clone, Debug)]
enum Modal {
    Alias { msisdn: Msisdn, input: TextInput },
    ConfirmDormant { msisdn: Msisdn },
    ConfirmActivate { msisdn: Msisdn },
    Range {
        tab: Tab,
        input: TextInput,
        error: Option<String>,
    },
    Help,
}

/// What a key press asks the loop to do
#[derive(Clone, Debug)]
enum Action {
    Emit(DashboardEvent),
    Login { id: String, password: String },
    Logout,
    Quit,
}

/// Read-only facts about the state needed to interpret keys
#[derive(Clone, Debug)]
struct KeyContext {
    logged_in: bool,
    tab: Tab,
    visible: Vec<Msisdn>,
    selected: Option<Device>,
    page: u32,
    can_prev: bool,
    can_next: bool,
    mode: ChartMode,
    rssi_only: bool,
    show_dormant: bool,
    auto_refresh: bool,
    interval_secs: u64,
    order: SortOrder,
    chart_range: DateRange,
    table_range: DateRange,
    table_len: usize,
    panel_count: usize,
}

impl KeyContext {
    fn capture(state: &DashboardState, panel_count: usize) -> Self {
        Self {
            logged_in: state.is_logged_in(),
            tab: state.tab,
            visible: state
                .visible_devices()
                .iter()
                .map(|d| d.msisdn.clone())
                .collect(),
            selected: state.selected_device().cloned(),
            page: state.table.page,
            can_prev: state.can_prev(),
            can_next: state.can_next(),
            mode: state.chart.mode,
            rssi_only: state.chart.rssi_only,
            show_dormant: state.show_dormant,
            auto_refresh: state.refresh.auto,
            interval_secs: state.refresh.interval_secs,
            order: state.table.order,
            chart_range: state.chart.range,
            table_range: state.table.range,
            table_len: state.table_rows.len(),
            panel_count,
        }
    }

    /// Visible device `delta` steps away from the selection, wrapping
    fn step_device(&self, delta: isize) -> Option<Msisdn> {
        if self.visible.is_empty() {
            return None;
        }
        let len = self.visible.len() as isize;
        let current = self
            .selected
            .as_ref()
            .and_then(|d| self.visible.iter().position(|m| *m == d.msisdn))
            .map(|i| i as isize)
            .unwrap_or(-1);
        let next = (current + delta).rem_euclid(len) as usize;
        self.visible.get(next).cloned()
    }
}

#[derive(Debug, Default)]
struct UiState {
    login: LoginForm,
    modal: Option<Modal>,
    slots: ChartSlots,
    table: TableView,
    /// Chart cursor as a fraction of the x range
    cursor: Option<f64>,
    chart_scroll: usize,
}

fn emit(event: DashboardEvent) -> Vec<Action> {
    vec![Action::Emit(event)]
}

fn handle_modal_key(ui: &mut UiState, code: KeyCode) -> Vec<Action> {
    let Some(modal) = ui.modal.as_mut() else {
        return Vec::new();
    };
    let mut close = false;
    let mut actions = Vec::new();

    match modal {
        Modal::Help => close = true,
        Modal::Alias { msisdn, input } => match code {
            KeyCode::Esc => close = true,
            KeyCode::Enter => {
                actions = emit(DashboardEvent::SaveAlias {
                    msisdn: msisdn.clone(),
                    alias: input.value().trim().to_string(),
                });
                close = true;
            }
            other => {
                input.handle_key(other);
            }
        },
        Modal::ConfirmDormant { msisdn } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                actions = emit(DashboardEvent::MarkDormant {
                    msisdn: msisdn.clone(),
                });
                close = true;
            }
            KeyCode::Char('n') | KeyCode::Esc => close = true,
            _ => {}
        },
        Modal::ConfirmActivate { msisdn } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                actions = emit(DashboardEvent::Activate {
                    msisdn: msisdn.clone(),
                });
                close = true;
            }
            KeyCode::Char('n') | KeyCode::Esc => close = true,
            _ => {}
        },
        Modal::Range { tab, input, error } => match code {
            KeyCode::Esc => close = true,
            KeyCode::Enter => match DateRange::parse(input.value()) {
                Some(range) => {
                    actions = emit(match tab {
                        Tab::Chart => DashboardEvent::SetChartRange { range },
                        Tab::Table => DashboardEvent::SetTableRange { range },
                    });
                    close = true;
                }
                None => *error = Some("expected YYYY-MM-DD YYYY-MM-DD".into()),
            },
            other => {
                if input.handle_key(other) {
                    *error = None;
                }
            }
        },
    }

    if close {
        ui.modal = None;
    }
    actions
}

fn handle_key(ui: &mut UiState, ctx: &KeyContext, code: KeyCode, modifiers: KeyModifiers) -> Vec<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return vec![Action::Quit];
    }

    if !ctx.logged_in {
        return match ui.login.handle_key(code) {
            LoginAction::None => Vec::new(),
            LoginAction::Submit { id, password } => vec![Action::Login { id, password }],
            LoginAction::Quit => vec![Action::Quit],
        };
    }

    if ui.modal.is_some() {
        return handle_modal_key(ui, code);
    }

    let on_chart = ctx.tab == Tab::Chart;
    match code {
        KeyCode::Char('q') => vec![Action::Quit],
        KeyCode::Char('?') => {
            ui.modal = Some(Modal::Help);
            Vec::new()
        }
        KeyCode::Esc => emit(DashboardEvent::DismissNotice),
        KeyCode::Char('L') => vec![Action::Logout],

        KeyCode::Tab | KeyCode::BackTab => emit(DashboardEvent::SwitchTab {
            tab: ctx.tab.toggle(),
        }),
        KeyCode::Up | KeyCode::Char('k') => select_step(ui, ctx, -1),
        KeyCode::Down | KeyCode::Char('j') => select_step(ui, ctx, 1),
        KeyCode::Char('z') => emit(DashboardEvent::SetShowDormant {
            show: !ctx.show_dormant,
        }),

        KeyCode::Char('r') => emit(DashboardEvent::RefreshRequested),
        KeyCode::Char('a') => emit(DashboardEvent::SetAutoRefresh {
            on: !ctx.auto_refresh,
        }),
        KeyCode::Char('i') => emit(DashboardEvent::SetRefreshInterval {
            secs: next_refresh_choice(ctx.interval_secs),
        }),

        KeyCode::Char('d') => {
            let range = if on_chart { ctx.chart_range } else { ctx.table_range };
            ui.modal = Some(Modal::Range {
                tab: ctx.tab,
                input: TextInput::with_value(&format!("{} {}", range.start_str(), range.end_str())),
                error: None,
            });
            Vec::new()
        }
        KeyCode::Char('[') | KeyCode::Char(']') => {
            let days = if code == KeyCode::Char('[') { -1 } else { 1 };
            if on_chart {
                emit(DashboardEvent::SetChartRange {
                    range: ctx.chart_range.shifted(days),
                })
            } else {
                emit(DashboardEvent::SetTableRange {
                    range: ctx.table_range.shifted(days),
                })
            }
        }

        KeyCode::Char('s') => match &ctx.selected {
            Some(device) => {
                ui.modal = Some(Modal::Alias {
                    msisdn: device.msisdn.clone(),
                    input: TextInput::with_value(device.alias()),
                });
                Vec::new()
            }
            None => Vec::new(),
        },
        KeyCode::Char('x') => match &ctx.selected {
            Some(device) if !device.dormant => {
                ui.modal = Some(Modal::ConfirmDormant {
                    msisdn: device.msisdn.clone(),
                });
                Vec::new()
            }
            _ => Vec::new(),
        },
        KeyCode::Char('A') => match &ctx.selected {
            Some(device) if device.dormant => {
                ui.modal = Some(Modal::ConfirmActivate {
                    msisdn: device.msisdn.clone(),
                });
                Vec::new()
            }
            _ => Vec::new(),
        },
        KeyCode::Char('e') => emit(DashboardEvent::ExportRequested),

        // chart tab
        KeyCode::Char('m') if on_chart => emit(DashboardEvent::SetChartMode {
            mode: ctx.mode.cycle(),
        }),
        KeyCode::Char('R') if on_chart => {
            ui.chart_scroll = 0;
            emit(DashboardEvent::SetRssiOnly { on: !ctx.rssi_only })
        }
        KeyCode::Char('c') if on_chart => {
            ui.cursor = match ui.cursor {
                Some(_) => None,
                None => Some(1.0),
            };
            Vec::new()
        }
        KeyCode::Left if on_chart => {
            ui.cursor = Some((ui.cursor.unwrap_or(1.0) - CURSOR_STEP).max(0.0));
            Vec::new()
        }
        KeyCode::Right if on_chart => {
            ui.cursor = Some((ui.cursor.unwrap_or(0.0) + CURSOR_STEP).min(1.0));
            Vec::new()
        }
        KeyCode::PageDown if on_chart => {
            ui.chart_scroll = (ui.chart_scroll + 1).min(ctx.panel_count.saturating_sub(1));
            Vec::new()
        }
        KeyCode::PageUp if on_chart => {
            ui.chart_scroll = ui.chart_scroll.saturating_sub(1);
            Vec::new()
        }

        // records tab
        KeyCode::Right | KeyCode::Char('n') if !on_chart && ctx.can_next => {
            ui.table.reset();
            emit(DashboardEvent::SetPage { page: ctx.page + 1 })
        }
        KeyCode::Left | KeyCode::Char('p') if !on_chart && ctx.can_prev => {
            ui.table.reset();
            emit(DashboardEvent::SetPage { page: ctx.page - 1 })
        }
        KeyCode::Char('o') if !on_chart => {
            ui.table.reset();
            emit(DashboardEvent::SetOrder {
                order: ctx.order.toggle(),
            })
        }
        KeyCode::Char('.') if !on_chart => {
            ui.table.scroll_cols(1);
            Vec::new()
        }
        KeyCode::Char(',') if !on_chart => {
            ui.table.scroll_cols(-1);
            Vec::new()
        }
        KeyCode::PageDown if !on_chart => {
            ui.table.scroll_rows(10, ctx.table_len);
            Vec::new()
        }
        KeyCode::PageUp if !on_chart => {
            ui.table.scroll_rows(-10, ctx.table_len);
            Vec::new()
        }

        _ => Vec::new(),
    }
}

fn select_step(ui: &mut UiState, ctx: &KeyContext, delta: isize) -> Vec<Action> {
    match ctx.step_device(delta) {
        Some(msisdn) => {
            ui.table.reset();
            emit(DashboardEvent::SelectDevice { msisdn })
        }
        None => Vec::new(),
    }
}

// --- Terminal setup/teardown ---
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub async fn run_tui(ctx: AppContext) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let emitter = Emitter::new(event_tx);

    let state = Arc::new(RwLock::new(DashboardState::new(
        &ctx.config,
        today_kst(Utc::now()),
    )));

    // Reducer task; owns the effect runner and with it the refresh timer
    let state_for_reducer = state.clone();
    let mut effects = EffectRunner::new(ctx.api.clone(), emitter.clone(), ctx.export_dir.clone());
    let reducer = tokio::spawn(async move {
        while let Some(env) = event_rx.recv().await {
            let out = {
                let mut s = state_for_reducer.write().await;
                reduce(&mut s, &env)
            };
            effects.dispatch_all(out);
        }
        effects.shutdown();
    });

    match ctx.session.load() {
        Ok(Some(user)) => {
            info!(%user, "resuming session");
            emitter.emit(DashboardEvent::LoggedIn { user });
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not read session, showing login"),
    }

    let mut terminal = setup_terminal().context("failed to set up terminal")?;
    let res = tui_loop(&mut terminal, &ctx, state, &emitter).await;
    restore_terminal(terminal).context("failed to restore terminal")?;

    // dropping the runner aborts the refresh timer
    reducer.abort();
    res
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ctx: &AppContext,
    state: Arc<RwLock<DashboardState>>,
    emitter: &Emitter,
) -> Result<()> {
    let mut ui = UiState::default();
    let backend_name = ctx.api.describe();

    loop {
        let key_ctx = {
            let snapshot = state.read().await;
            ui.slots.sync(&snapshot);
            terminal.draw(|f| draw(f, &snapshot, &mut ui, &backend_name))?;
            KeyContext::capture(&snapshot, ui.slots.panels().len())
        };

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let CEvent::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }

        for action in handle_key(&mut ui, &key_ctx, code, modifiers) {
            match action {
                Action::Emit(event) => emitter.emit(event),
                Action::Login { id, password } => match authenticate(&ctx.config.accounts, &id, &password) {
                    Ok(user) => {
                        if let Err(e) = ctx.session.save(&user) {
                            warn!(error = %e, "could not persist session");
                        }
                        info!(%user, "logged in");
                        ui.login = LoginForm::default();
                        emitter.emit(DashboardEvent::LoggedIn { user });
                    }
                    Err(e) => ui.login.reject(e.to_string()),
                },
                Action::Logout => {
                    if let Err(e) = ctx.session.clear() {
                        warn!(error = %e, "could not clear session");
                    }
                    info!("logged out");
                    ui.slots.release();
                    ui.table.reset();
                    ui.login = LoginForm::default();
                    ui.cursor = None;
                    ui.chart_scroll = 0;
                    emitter.emit(DashboardEvent::LoggedOut);
                }
                Action::Quit => return Ok(()),
            }
        }
    }
}

fn device_item(device: &Device, selected: bool) -> ListItem<'static> {
    let mut spans = vec![Span::styled(device.label(), styles::device(device))];
    if device.dormant {
        spans.push(Span::styled(" [dormant]", styles::device(device)));
    }
    let item = ListItem::new(Line::from(spans));
    if selected {
        item.style(styles::selection())
    } else {
        item
    }
}

fn draw_header(f: &mut Frame, area: Rect, state: &DashboardState, backend_name: &str) {
    let mut top = vec![Span::styled(" Router Info Dashboard ", styles::title())];
    if let Some(user) = &state.user {
        top.push(Span::styled(format!(" {} ", user), styles::accent_bold()));
    }
    if let Some(stamp) = &state.last_updated {
        top.push(Span::styled(format!(" last updated {} ", stamp), styles::text_dim()));
    }
    top.push(Span::styled(format!(" · {}", backend_name), styles::text_muted()));

    let auto = if state.refresh.auto {
        format!("auto {}s", state.refresh.interval_secs.max(MIN_REFRESH_SECS))
    } else {
        "auto off".to_string()
    };
    let mut controls = vec![
        Span::styled(" Chart ", styles::tab(state.tab == Tab::Chart)),
        Span::styled(" Records ", styles::tab(state.tab == Tab::Table)),
        Span::raw("  "),
        Span::styled(auto, styles::toggle(state.refresh.auto)),
        Span::raw("  "),
        Span::styled("dormant", styles::toggle(state.show_dormant)),
    ];
    match state.tab {
        Tab::Chart => {
            controls.push(Span::raw("  "));
            controls.push(Span::styled("rssi-only", styles::toggle(state.chart.rssi_only)));
            controls.push(Span::styled(
                format!("  {}  {}", state.chart.mode.label(), state.chart.range),
                styles::text(),
            ));
            let filled = state.synthetic_count();
            if filled > 0 && !state.chart.rssi_only {
                controls.push(Span::styled(format!("  {} filled", filled), styles::warn()));
            }
        }
        Tab::Table => controls.push(Span::styled(
            format!("  {}  {}", state.table.order.label(), state.table.range),
            styles::text(),
        )),
    }

    f.render_widget(
        Paragraph::new(vec![Line::from(top), Line::from(controls)]),
        area,
    );
}

fn draw_footer(f: &mut Frame, area: Rect, state: &DashboardState) {
    let line = match &state.notice {
        Some(notice) => Line::from(vec![
            Span::styled(format!(" {} ", notice.text), styles::notice(notice.level)),
            Span::styled("  Esc dismiss", styles::text_muted()),
        ]),
        None => {
            let hints: &[(&str, &str)] = match state.tab {
                Tab::Chart => &[
                    ("↑↓", "device"),
                    ("Tab", "records"),
                    ("m", "mode"),
                    ("d", "dates"),
                    ("R", "rssi-only"),
                    ("c", "cursor"),
                    ("r", "refresh"),
                    ("?", "help"),
                    ("q", "quit"),
                ],
                Tab::Table => &[
                    ("↑↓", "device"),
                    ("Tab", "chart"),
                    ("←→", "page"),
                    ("o", "order"),
                    (",.", "columns"),
                    ("e", "csv"),
                    ("r", "refresh"),
                    ("?", "help"),
                    ("q", "quit"),
                ],
            };
            let mut spans = Vec::new();
            for (key, label) in hints {
                spans.push(Span::styled(format!(" {}", key), styles::key_hint()));
                spans.push(Span::styled(format!(" {} ", label), styles::text_dim()));
            }
            Line::from(spans)
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let rows: [(&str, &str); 22] = [
        ("↑/↓ j/k", "select device"),
        ("Tab", "switch chart / records"),
        ("z", "show or hide dormant devices"),
        ("r", "refresh now"),
        ("a", "toggle auto-refresh"),
        ("i", "cycle refresh interval"),
        ("d", "edit date range"),
        ("[ ]", "shift dates by a day"),
        ("m", "chart mode: samples / hourly / daily"),
        ("R", "RSSI for all active devices"),
        ("c ←/→", "chart cursor"),
        ("PgUp/PgDn", "scroll panels or rows"),
        ("←/→ n/p", "records page"),
        ("o", "records order"),
        (", .", "scroll columns"),
        ("e", "export records as CSV"),
        ("s", "set device alias"),
        ("x", "mark device dormant"),
        ("A", "activate dormant device"),
        ("L", "log out"),
        ("Esc", "dismiss message"),
        ("q", "quit"),
    ];
    let rect = centered_rect(area, 52, rows.len() as u16 + 2);
    f.render_widget(Clear, rect);
    let lines: Vec<Line> = rows
        .iter()
        .map(|(key, text)| {
            Line::from(vec![
                Span::styled(format!("  {:<11}", key), styles::key_hint()),
                Span::styled(*text, styles::text()),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_focused())
                .title(" Keys "),
        ),
        rect,
    );
}

fn draw(f: &mut Frame, state: &DashboardState, ui: &mut UiState, backend_name: &str) {
    let area = f.area();
    if !state.is_logged_in() {
        render_login(f, area, &ui.login);
        return;
    }

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(5), Constraint::Length(1)])
        .split(area);
    draw_header(f, outer[0], state, backend_name);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)])
        .split(outer[1]);

    let visible = state.visible_devices();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|d| device_item(d, state.selected.as_deref() == Some(d.msisdn.as_str())))
        .collect();
    let mut list_state = ListState::default();
    list_state.select(state.selected_index());
    let title = format!(" Devices ({}) ", visible.len());
    f.render_stateful_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_subtle())
                .title(title),
        ),
        body[0],
        &mut list_state,
    );

    match state.tab {
        Tab::Chart => render_charts(
            f,
            body[1],
            &ui.slots,
            state.chart.rssi_only,
            ui.chart_scroll,
            ui.cursor,
        ),
        Tab::Table => render_table(f, body[1], state, &mut ui.table),
    }

    draw_footer(f, outer[2], state);

    match &ui.modal {
        Some(Modal::Help) => draw_help(f, area),
        Some(Modal::Alias { msisdn, input }) => render_prompt(
            f,
            area,
            &format!("Alias for {}", msisdn),
            input,
            "Enter save · Esc cancel · empty clears the alias",
        ),
        Some(Modal::ConfirmDormant { msisdn }) => render_confirm(
            f,
            area,
            "Mark dormant",
            &format!("Mark device {} dormant? Its data is kept.", msisdn),
        ),
        Some(Modal::ConfirmActivate { msisdn }) => render_confirm(
            f,
            area,
            "Activate",
            &format!("Return device {} to the active list?", msisdn),
        ),
        Some(Modal::Range { tab, input, error }) => {
            let hint = error
                .clone()
                .unwrap_or_else(|| "YYYY-MM-DD YYYY-MM-DD · Enter apply · Esc cancel".into());
            let title = match tab {
                Tab::Chart => "Chart dates",
                Tab::Table => "Records dates",
            };
            render_prompt(f, area, title, input, &hint);
        }
        None => {}
    }
}
