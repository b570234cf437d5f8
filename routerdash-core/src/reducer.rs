use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::api::{TablePage, TableQuery};
use crate::device::{self, SelectionFix};
use crate::model::{ChartMode, DateRange, Device, DeviceSeries, Msisdn, Row, SortOrder, Tab};
use crate::state::{DashboardState, FetchKind, Notice};
use crate::time::format_stamp;

/// Device mutations that report back to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Alias,
    Dormant,
    Activate,
}

impl Mutation {
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::Alias => "Failed to save alias",
            Self::Dormant => "Failed to mark device dormant",
            Self::Activate => "Failed to activate device",
        }
    }

    pub fn success_message(&self, msisdn: &str) -> String {
        match self {
            Self::Alias => format!("Alias saved for {}", msisdn),
            Self::Dormant => format!("{} marked dormant (data kept)", msisdn),
            Self::Activate => format!("{} is active again", msisdn),
        }
    }
}

#[derive(Clone, Debug)]
pub enum DashboardEvent {
    LoggedIn { user: String },
    LoggedOut,

    /// Fetch the device list, keeping the current selection when possible
    ReloadDevices,
    DevicesLoaded {
        token: u64,
        devices: Vec<Device>,
        select: Option<Msisdn>,
    },

    SelectDevice { msisdn: Msisdn },
    SetShowDormant { show: bool },
    SwitchTab { tab: Tab },

    SetChartMode { mode: ChartMode },
    SetChartRange { range: DateRange },
    SetRssiOnly { on: bool },

    SetTableRange { range: DateRange },
    SetPage { page: u32 },
    SetOrder { order: SortOrder },

    SeriesLoaded { token: u64, rows: Vec<Row> },
    AllRssiLoaded { token: u64, series: Vec<DeviceSeries> },
    TableLoaded { token: u64, page: TablePage },
    FetchFailed {
        kind: FetchKind,
        token: u64,
        reason: String,
    },

    RefreshRequested,
    /// `ok` is false when any fetch in the refresh failed
    RefreshCompleted { ok: bool },
    SetAutoRefresh { on: bool },
    SetRefreshInterval { secs: u64 },

    SaveAlias { msisdn: Msisdn, alias: String },
    MarkDormant { msisdn: Msisdn },
    Activate { msisdn: Msisdn },
    MutationFinished {
        mutation: Mutation,
        msisdn: Msisdn,
        /// Err carries the backend detail, if any
        result: Result<(), Option<String>>,
    },

    ExportRequested,
    ExportFinished { result: Result<String, String> },

    DismissNotice,
}

#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub id: u64,
    pub at: SystemTime,
    pub event: DashboardEvent,
}

/// Side effects the runner performs on behalf of the reducer
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    LoadDevices {
        token: u64,
        include_dormant: bool,
        select: Option<Msisdn>,
    },
    FetchSeries {
        token: u64,
        msisdn: Msisdn,
        mode: ChartMode,
        range: DateRange,
    },
    FetchAllRssi {
        token: u64,
        devices: Vec<Device>,
        mode: ChartMode,
        range: DateRange,
    },
    FetchTable { token: u64, query: TableQuery },
    SaveAlias { msisdn: Msisdn, alias: String },
    MarkDormant { msisdn: Msisdn },
    Activate { msisdn: Msisdn },
    ExportCsv {
        msisdn: Msisdn,
        range: DateRange,
        order: SortOrder,
    },
    /// Run these together, then report `RefreshCompleted`
    Refresh { effects: Vec<Effect> },
    /// Cancel the current timer; start a new one when `period` is set
    RescheduleTimer { period: Option<Duration> },
}

fn stamp(state: &mut DashboardState, at: SystemTime) {
    state.last_updated = Some(format_stamp(DateTime::<Utc>::from(at)));
}

fn load_devices(state: &mut DashboardState, select: Option<Msisdn>) -> Effect {
    Effect::LoadDevices {
        token: state.tokens.issue(FetchKind::Devices),
        include_dormant: state.show_dormant,
        select,
    }
}

fn series_effect(state: &mut DashboardState) -> Option<Effect> {
    let msisdn = state.selected.clone().filter(|m| !m.is_empty())?;
    Some(Effect::FetchSeries {
        token: state.tokens.issue(FetchKind::Series),
        msisdn,
        mode: state.chart.mode,
        range: state.chart.range,
    })
}

fn all_rssi_effect(state: &mut DashboardState) -> Option<Effect> {
    let devices: Vec<Device> = state.active_devices().into_iter().cloned().collect();
    if devices.is_empty() {
        // nothing to ask for; also invalidates any fetch still running
        state.tokens.issue(FetchKind::AllRssi);
        if !state.all_rssi.is_empty() {
            state.all_rssi.clear();
            state.chart_version += 1;
        }
        return None;
    }
    Some(Effect::FetchAllRssi {
        token: state.tokens.issue(FetchKind::AllRssi),
        devices,
        mode: state.chart.mode,
        range: state.chart.range,
    })
}

fn table_effect(state: &mut DashboardState) -> Option<Effect> {
    let msisdn = state.selected.clone().filter(|m| !m.is_empty())?;
    Some(Effect::FetchTable {
        token: state.tokens.issue(FetchKind::Table),
        query: TableQuery {
            msisdn,
            range: state.table.range,
            page: state.table.page,
            page_size: state.table.page_size,
            order: state.table.order,
        },
    })
}

fn chart_effects(state: &mut DashboardState) -> Vec<Effect> {
    let mut out: Vec<Effect> = series_effect(state).into_iter().collect();
    if state.chart.rssi_only {
        out.extend(all_rssi_effect(state));
    }
    out
}

/// Fetches for whichever tab is showing
fn tab_effects(state: &mut DashboardState) -> Vec<Effect> {
    if !state.is_logged_in() {
        return Vec::new();
    }
    match state.tab {
        Tab::Chart => chart_effects(state),
        Tab::Table => table_effect(state).into_iter().collect(),
    }
}

/// Fetches that depend on the selected device. All-device RSSI does not.
fn selection_effects(state: &mut DashboardState) -> Vec<Effect> {
    if !state.is_logged_in() {
        return Vec::new();
    }
    match state.tab {
        Tab::Chart => series_effect(state).into_iter().collect(),
        Tab::Table => table_effect(state).into_iter().collect(),
    }
}

fn clear_selection_data(state: &mut DashboardState) {
    state.tokens.issue(FetchKind::Series);
    state.tokens.issue(FetchKind::Table);
    state.chart_rows.clear();
    state.chart_version += 1;
    state.table_rows.clear();
    state.table_total = 0;
}

/// Make the selection valid for the visible set. Returns true when it moved.
fn reconcile(state: &mut DashboardState) -> bool {
    let fix = device::reconcile_selection(&state.visible_devices(), state.selected.as_deref());
    match fix {
        SelectionFix::Keep => false,
        SelectionFix::Reset(msisdn) => {
            state.selected = Some(msisdn);
            state.table.page = 1;
            true
        }
        SelectionFix::Clear => {
            state.selected = None;
            clear_selection_data(state);
            true
        }
    }
}

fn mutation_effect(state: &DashboardState, effect: Effect, msisdn: &str) -> Vec<Effect> {
    if msisdn.is_empty() || !state.is_logged_in() {
        return Vec::new();
    }
    vec![effect]
}

/// Apply one event. Returns the effects the runner must perform.
pub fn reduce(state: &mut DashboardState, env: &EventEnvelope) -> Vec<Effect> {
    state.last_event_id = env.id;

    match &env.event {
        DashboardEvent::LoggedIn { user } => {
            state.user = Some(user.clone());
            state.clear_data();
            vec![
                load_devices(state, None),
                Effect::RescheduleTimer {
                    period: state.refresh_period(),
                },
            ]
        }
        DashboardEvent::LoggedOut => {
            state.user = None;
            state.clear_data();
            vec![Effect::RescheduleTimer { period: None }]
        }

        DashboardEvent::ReloadDevices => {
            if !state.is_logged_in() {
                return Vec::new();
            }
            let select = state.selected.clone();
            vec![load_devices(state, select)]
        }
        DashboardEvent::DevicesLoaded {
            token,
            devices,
            select,
        } => {
            if !state.tokens.is_current(FetchKind::Devices, *token) {
                tracing::debug!(token, "discarding stale device list");
                return Vec::new();
            }
            let before = state.selected.clone();
            let active_before: Vec<Device> = state.active_devices().into_iter().cloned().collect();
            state.devices = device::sort_devices(devices.clone());
            if let Some(pick) = device::default_selection(&state.devices, select.as_deref()) {
                state.selected = Some(pick);
            }
            reconcile(state);

            let mut effects = Vec::new();
            if state.selected != before {
                if before.is_some() && state.selected.is_some() {
                    state.table.page = 1;
                }
                effects = selection_effects(state);
            }
            let active_changed = state
                .active_devices()
                .into_iter()
                .ne(active_before.iter());
            if active_changed && state.chart.rssi_only && state.tab == Tab::Chart {
                effects.extend(all_rssi_effect(state));
            }
            effects
        }

        DashboardEvent::SelectDevice { msisdn } => {
            if state.selected.as_deref() == Some(msisdn.as_str())
                || !state.devices.iter().any(|d| &d.msisdn == msisdn)
            {
                return Vec::new();
            }
            state.selected = Some(msisdn.clone());
            state.table.page = 1;
            selection_effects(state)
        }
        DashboardEvent::SetShowDormant { show } => {
            if state.show_dormant == *show {
                return Vec::new();
            }
            state.show_dormant = *show;
            // the device list reload below covers all-device rssi
            let mut effects = if reconcile(state) {
                selection_effects(state)
            } else {
                Vec::new()
            };
            if state.is_logged_in() {
                let select = state.selected.clone();
                effects.push(load_devices(state, select));
            }
            effects
        }
        DashboardEvent::SwitchTab { tab } => {
            if state.tab == *tab {
                return Vec::new();
            }
            state.tab = *tab;
            tab_effects(state)
        }

        DashboardEvent::SetChartMode { mode } => {
            if state.chart.mode == *mode {
                return Vec::new();
            }
            state.chart.mode = *mode;
            // rows of another mode carry different keys
            state.chart_rows.clear();
            state.all_rssi.clear();
            state.chart_version += 1;
            chart_effects_on_tab(state)
        }
        DashboardEvent::SetChartRange { range } => {
            if state.chart.range == *range {
                return Vec::new();
            }
            state.chart.range = *range;
            chart_effects_on_tab(state)
        }
        DashboardEvent::SetRssiOnly { on } => {
            if state.chart.rssi_only == *on {
                return Vec::new();
            }
            state.chart.rssi_only = *on;
            state.chart_version += 1;
            if !*on {
                state.tokens.issue(FetchKind::AllRssi);
                state.all_rssi.clear();
                return Vec::new();
            }
            if state.tab == Tab::Chart && state.is_logged_in() {
                all_rssi_effect(state).into_iter().collect()
            } else {
                Vec::new()
            }
        }

        DashboardEvent::SetTableRange { range } => {
            if state.table.range == *range {
                return Vec::new();
            }
            state.table.range = *range;
            state.table.page = 1;
            table_effects_on_tab(state)
        }
        DashboardEvent::SetPage { page } => {
            let page = (*page).clamp(1, state.total_pages());
            if state.table.page == page {
                return Vec::new();
            }
            state.table.page = page;
            table_effects_on_tab(state)
        }
        DashboardEvent::SetOrder { order } => {
            if state.table.order == *order {
                return Vec::new();
            }
            state.table.order = *order;
            table_effects_on_tab(state)
        }

        DashboardEvent::SeriesLoaded { token, rows } => {
            if !state.tokens.is_current(FetchKind::Series, *token) {
                tracing::debug!(token, "discarding stale series");
                return Vec::new();
            }
            state.chart_rows = rows.clone();
            state.chart_version += 1;
            stamp(state, env.at);
            Vec::new()
        }
        DashboardEvent::AllRssiLoaded { token, series } => {
            if !state.tokens.is_current(FetchKind::AllRssi, *token) {
                tracing::debug!(token, "discarding stale all-device rssi");
                return Vec::new();
            }
            state.all_rssi = series.clone();
            state.chart_version += 1;
            stamp(state, env.at);
            Vec::new()
        }
        DashboardEvent::TableLoaded { token, page } => {
            if !state.tokens.is_current(FetchKind::Table, *token) {
                tracing::debug!(token, "discarding stale table page");
                return Vec::new();
            }
            state.table_rows = page.rows.clone();
            state.table_total = page.total;
            stamp(state, env.at);
            Vec::new()
        }
        DashboardEvent::FetchFailed {
            kind,
            token,
            reason,
        } => {
            // prior data stays on screen
            if state.tokens.is_current(*kind, *token) {
                tracing::debug!(?kind, token, %reason, "fetch failed, keeping previous data");
            }
            Vec::new()
        }

        DashboardEvent::RefreshRequested => {
            if !state.is_logged_in() {
                return Vec::new();
            }
            let select = state.selected.clone();
            let mut effects = vec![load_devices(state, select)];
            effects.extend(tab_effects(state));
            vec![Effect::Refresh { effects }]
        }
        DashboardEvent::RefreshCompleted { ok } => {
            if !*ok {
                tracing::debug!("refresh had failures, keeping last updated");
            } else if state.is_logged_in() {
                stamp(state, env.at);
            }
            Vec::new()
        }
        DashboardEvent::SetAutoRefresh { on } => {
            state.refresh.auto = *on;
            vec![Effect::RescheduleTimer {
                period: state.refresh_period(),
            }]
        }
        DashboardEvent::SetRefreshInterval { secs } => {
            state.refresh.interval_secs = *secs;
            vec![Effect::RescheduleTimer {
                period: state.refresh_period(),
            }]
        }

        DashboardEvent::SaveAlias { msisdn, alias } => mutation_effect(
            state,
            Effect::SaveAlias {
                msisdn: msisdn.clone(),
                alias: alias.trim().to_string(),
            },
            msisdn,
        ),
        DashboardEvent::MarkDormant { msisdn } => mutation_effect(
            state,
            Effect::MarkDormant {
                msisdn: msisdn.clone(),
            },
            msisdn,
        ),
        DashboardEvent::Activate { msisdn } => mutation_effect(
            state,
            Effect::Activate {
                msisdn: msisdn.clone(),
            },
            msisdn,
        ),
        DashboardEvent::MutationFinished {
            mutation,
            msisdn,
            result,
        } => match result {
            Ok(()) => {
                state.notice = Some(Notice::info(mutation.success_message(msisdn)));
                let select = match mutation {
                    Mutation::Alias | Mutation::Activate => Some(msisdn.clone()),
                    Mutation::Dormant => None,
                };
                if state.is_logged_in() {
                    vec![load_devices(state, select)]
                } else {
                    Vec::new()
                }
            }
            Err(detail) => {
                let text = detail
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or(mutation.fallback_message());
                state.notice = Some(Notice::error(text));
                Vec::new()
            }
        },

        DashboardEvent::ExportRequested => {
            let Some(msisdn) = state.selected.clone().filter(|m| !m.is_empty()) else {
                state.notice = Some(Notice::error("Select a device to export"));
                return Vec::new();
            };
            vec![Effect::ExportCsv {
                msisdn,
                range: state.table.range,
                order: state.table.order,
            }]
        }
        DashboardEvent::ExportFinished { result } => {
            state.notice = Some(match result {
                Ok(path) => Notice::info(format!("CSV saved to {}", path)),
                Err(reason) => Notice::error(format!("CSV export failed: {}", reason)),
            });
            Vec::new()
        }

        DashboardEvent::DismissNotice => {
            state.notice = None;
            Vec::new()
        }
    }
}

fn chart_effects_on_tab(state: &mut DashboardState) -> Vec<Effect> {
    if state.tab == Tab::Chart {
        tab_effects(state)
    } else {
        Vec::new()
    }
}

fn table_effects_on_tab(state: &mut DashboardState) -> Vec<Effect> {
    if state.tab == Tab::Table {
        tab_effects(state)
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashConfig;
    use chrono::NaiveDate;

    struct Harness {
        state: DashboardState,
        next_id: u64,
    }

    impl Harness {
        fn new() -> Self {
            let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
            Self {
                state: DashboardState::new(&DashConfig::default(), today),
                next_id: 0,
            }
        }

        fn send(&mut self, event: DashboardEvent) -> Vec<Effect> {
            self.next_id += 1;
            let env = EventEnvelope {
                id: self.next_id,
                at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_736_900_000),
                event,
            };
            reduce(&mut self.state, &env)
        }

        /// Log in and answer the first device load
        fn logged_in(devices: Vec<Device>) -> Self {
            let mut h = Self::new();
            let effects = h.send(DashboardEvent::LoggedIn {
                user: "webons".into(),
            });
            let token = device_token(&effects);
            h.send(DashboardEvent::DevicesLoaded {
                token,
                devices,
                select: None,
            });
            h
        }
    }

    fn dev(msisdn: &str, alias: &str, dormant: bool, has_recent: bool) -> Device {
        Device {
            msisdn: msisdn.into(),
            alias: (!alias.is_empty()).then(|| alias.to_string()),
            dormant,
            has_recent,
        }
    }

    fn fleet() -> Vec<Device> {
        vec![
            dev("010-1", "bravo", false, true),
            dev("010-2", "alpha", true, true),
            dev("010-3", "charlie", false, false),
            dev("010-4", "delta", false, true),
        ]
    }

    fn device_token(effects: &[Effect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::LoadDevices { token, .. } => Some(*token),
                _ => None,
            })
            .expect("device load effect")
    }

    fn series_token(effects: &[Effect]) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::FetchSeries { token, .. } => Some(*token),
            _ => None,
        })
    }

    fn table_token(effects: &[Effect]) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::FetchTable { token, .. } => Some(*token),
            _ => None,
        })
    }

    #[test]
    fn test_login_loads_devices_and_selects_first_active() {
        let mut h = Harness::new();
        let effects = h.send(DashboardEvent::LoggedIn {
            user: "webons".into(),
        });
        assert!(matches!(
            effects[0],
            Effect::LoadDevices {
                include_dormant: false,
                select: None,
                ..
            }
        ));
        assert_eq!(effects[1], Effect::RescheduleTimer { period: None });

        let effects = h.send(DashboardEvent::DevicesLoaded {
            token: device_token(&effects),
            devices: fleet(),
            select: None,
        });
        // "alpha" sorts first but is dormant
        assert_eq!(h.state.selected.as_deref(), Some("010-1"));
        assert_eq!(h.state.devices[0].msisdn, "010-2");
        assert!(series_token(&effects).is_some());
    }

    #[test]
    fn test_device_change_fetches_only_active_tab() {
        let mut h = Harness::logged_in(fleet());
        let effects = h.send(DashboardEvent::SelectDevice {
            msisdn: "010-4".into(),
        });
        assert_eq!(effects.len(), 1);
        assert!(series_token(&effects).is_some());

        h.send(DashboardEvent::SwitchTab { tab: Tab::Table });
        let effects = h.send(DashboardEvent::SelectDevice {
            msisdn: "010-1".into(),
        });
        assert_eq!(effects.len(), 1);
        assert!(table_token(&effects).is_some());
    }

    #[test]
    fn test_params_only_fetch_on_their_tab() {
        let mut h = Harness::logged_in(fleet());
        let range = DateRange::parse("2025-01-01 2025-01-05").unwrap();

        assert!(h.send(DashboardEvent::SetTableRange { range }).is_empty());
        assert!(h.send(DashboardEvent::SetOrder { order: SortOrder::Asc }).is_empty());
        assert!(series_token(&h.send(DashboardEvent::SetChartRange { range })).is_some());
        assert!(
            series_token(&h.send(DashboardEvent::SetChartMode {
                mode: ChartMode::DailyAvg
            }))
            .is_some()
        );

        h.send(DashboardEvent::SwitchTab { tab: Tab::Table });
        assert!(
            h.send(DashboardEvent::SetChartMode {
                mode: ChartMode::Raw
            })
            .is_empty()
        );
    }

    #[test]
    fn test_table_range_change_resets_page() {
        let mut h = Harness::logged_in(fleet());
        h.send(DashboardEvent::SwitchTab { tab: Tab::Table });
        h.state.table_total = 450;
        h.send(DashboardEvent::SetPage { page: 3 });
        assert_eq!(h.state.table.page, 3);
        assert!(!h.state.can_next());

        // past the last page clamps
        assert!(h.send(DashboardEvent::SetPage { page: 9 }).is_empty());

        let range = DateRange::parse("2025-01-01..2025-01-02").unwrap();
        let effects = h.send(DashboardEvent::SetTableRange { range });
        assert_eq!(h.state.table.page, 1);
        match &effects[0] {
            Effect::FetchTable { query, .. } => {
                assert_eq!(query.page, 1);
                assert_eq!(query.range, range);
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_dormant_filter_resets_selection_and_page() {
        let mut h = Harness::logged_in(fleet());
        h.send(DashboardEvent::SetShowDormant { show: true });
        h.send(DashboardEvent::SelectDevice {
            msisdn: "010-2".into(),
        });
        h.send(DashboardEvent::SwitchTab { tab: Tab::Table });
        h.state.table_total = 1000;
        h.send(DashboardEvent::SetPage { page: 4 });

        let effects = h.send(DashboardEvent::SetShowDormant { show: false });
        // first visible in sorted order is "bravo"
        assert_eq!(h.state.selected.as_deref(), Some("010-1"));
        assert_eq!(h.state.table.page, 1);
        assert!(table_token(&effects).is_some());
        assert!(matches!(
            effects.last(),
            Some(Effect::LoadDevices {
                include_dormant: false,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_visible_set_clears_selection_and_suppresses_fetches() {
        let mut h = Harness::logged_in(vec![dev("010-9", "", false, true)]);
        assert_eq!(h.state.selected.as_deref(), Some("010-9"));

        let effects = h.send(DashboardEvent::ReloadDevices);
        let effects = h.send(DashboardEvent::DevicesLoaded {
            token: device_token(&effects),
            devices: vec![dev("010-9", "", true, true)],
            select: None,
        });
        assert_eq!(h.state.selected, None);
        assert!(effects.is_empty());
        assert!(h.state.chart_rows.is_empty());

        let effects = h.send(DashboardEvent::RefreshRequested);
        match &effects[0] {
            Effect::Refresh { effects } => {
                assert_eq!(effects.len(), 1);
                assert!(matches!(effects[0], Effect::LoadDevices { .. }));
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_stale_responses_are_discarded() {
        let mut h = Harness::logged_in(fleet());
        let first = series_token(&h.send(DashboardEvent::SelectDevice {
            msisdn: "010-4".into(),
        }))
        .unwrap();
        let second = series_token(&h.send(DashboardEvent::SelectDevice {
            msisdn: "010-1".into(),
        }))
        .unwrap();

        let mut newer = Row::new();
        newer.insert("ts".into(), "2025-01-15 10:00:00".into());
        h.send(DashboardEvent::SeriesLoaded {
            token: second,
            rows: vec![newer.clone()],
        });
        let version = h.state.chart_version;

        // the earlier request resolves last
        h.send(DashboardEvent::SeriesLoaded {
            token: first,
            rows: vec![Row::new(), Row::new()],
        });
        assert_eq!(h.state.chart_rows, vec![newer]);
        assert_eq!(h.state.chart_version, version);
    }

    #[test]
    fn test_rssi_only_fetches_active_devices() {
        let mut h = Harness::logged_in(fleet());
        let effects = h.send(DashboardEvent::SetRssiOnly { on: true });
        match &effects[0] {
            Effect::FetchAllRssi { devices, .. } => {
                let ids: Vec<&str> = devices.iter().map(|d| d.msisdn.as_str()).collect();
                assert_eq!(ids, vec!["010-1", "010-4"]);
            }
            other => panic!("unexpected effect {:?}", other),
        }

        // an unchanged device list leaves the rssi set alone
        let effects = h.send(DashboardEvent::ReloadDevices);
        let effects = h.send(DashboardEvent::DevicesLoaded {
            token: device_token(&effects),
            devices: fleet(),
            select: Some("010-1".into()),
        });
        assert!(effects.is_empty());

        // a device coming back re-fetches
        let mut revived = fleet();
        revived[2].has_recent = true;
        let effects = h.send(DashboardEvent::ReloadDevices);
        let effects = h.send(DashboardEvent::DevicesLoaded {
            token: device_token(&effects),
            devices: revived,
            select: Some("010-1".into()),
        });
        match &effects[..] {
            [Effect::FetchAllRssi { devices, .. }] => assert_eq!(devices.len(), 3),
            other => panic!("unexpected effects {:?}", other),
        }

        // switching device only refetches that device's series
        let effects = h.send(DashboardEvent::SelectDevice {
            msisdn: "010-4".into(),
        });
        assert!(matches!(&effects[..], [Effect::FetchSeries { .. }]));

        // chart params too, alongside the single-device series
        let effects = h.send(DashboardEvent::SetChartMode {
            mode: ChartMode::HourlyAvg,
        });
        assert_eq!(effects.len(), 2);

        assert!(h.send(DashboardEvent::SetRssiOnly { on: false }).is_empty());
        assert!(h.state.all_rssi.is_empty());
    }

    #[test]
    fn test_refresh_runs_devices_and_tab_then_stamps() {
        let mut h = Harness::logged_in(fleet());
        let effects = h.send(DashboardEvent::RefreshRequested);
        match &effects[0] {
            Effect::Refresh { effects } => {
                assert!(matches!(
                    &effects[0],
                    Effect::LoadDevices { select: Some(m), .. } if m == "010-1"
                ));
                assert!(series_token(effects).is_some());
            }
            other => panic!("unexpected effect {:?}", other),
        }
        h.send(DashboardEvent::RefreshCompleted { ok: true });
        // 1_736_900_000 is 2025-01-15 00:13:20Z
        assert_eq!(h.state.last_updated.as_deref(), Some("2025-01-15 09:13:20"));
    }

    #[test]
    fn test_failed_refresh_keeps_last_updated() {
        let mut h = Harness::logged_in(fleet());
        assert_eq!(h.state.last_updated, None);
        let effects = h.send(DashboardEvent::RefreshRequested);
        let Effect::Refresh { effects } = &effects[0] else {
            panic!("expected a refresh");
        };
        h.send(DashboardEvent::FetchFailed {
            kind: FetchKind::Devices,
            token: device_token(effects),
            reason: "connection refused".into(),
        });
        h.send(DashboardEvent::FetchFailed {
            kind: FetchKind::Series,
            token: series_token(effects).unwrap(),
            reason: "connection refused".into(),
        });
        h.send(DashboardEvent::RefreshCompleted { ok: false });
        assert_eq!(h.state.last_updated, None);
    }

    #[test]
    fn test_refresh_in_rssi_mode_fetches_all_devices_once() {
        let mut h = Harness::logged_in(fleet());
        h.send(DashboardEvent::SetRssiOnly { on: true });

        let effects = h.send(DashboardEvent::RefreshRequested);
        let Effect::Refresh { effects } = &effects[0] else {
            panic!("expected a refresh");
        };
        let all_rssi: Vec<u64> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::FetchAllRssi { token, .. } => Some(*token),
                _ => None,
            })
            .collect();
        assert_eq!(all_rssi.len(), 1);

        let after = h.send(DashboardEvent::DevicesLoaded {
            token: device_token(effects),
            devices: fleet(),
            select: Some("010-1".into()),
        });
        assert!(after.iter().all(|e| !matches!(e, Effect::FetchAllRssi { .. })));
        assert!(h.state.tokens.is_current(FetchKind::AllRssi, all_rssi[0]));
    }

    #[test]
    fn test_auto_refresh_reschedules_with_floor() {
        let mut h = Harness::logged_in(fleet());
        h.send(DashboardEvent::SetRefreshInterval { secs: 2 });
        let effects = h.send(DashboardEvent::SetAutoRefresh { on: true });
        assert_eq!(
            effects,
            vec![Effect::RescheduleTimer {
                period: Some(Duration::from_secs(5))
            }]
        );
        let effects = h.send(DashboardEvent::LoggedOut);
        assert_eq!(effects, vec![Effect::RescheduleTimer { period: None }]);
        assert!(h.state.devices.is_empty());
    }

    #[test]
    fn test_mutation_outcomes() {
        let mut h = Harness::logged_in(fleet());
        let effects = h.send(DashboardEvent::SaveAlias {
            msisdn: "010-1".into(),
            alias: "  roof  ".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::SaveAlias {
                msisdn: "010-1".into(),
                alias: "roof".into()
            }]
        );
        assert!(
            h.send(DashboardEvent::MarkDormant {
                msisdn: String::new()
            })
            .is_empty()
        );

        let effects = h.send(DashboardEvent::MutationFinished {
            mutation: Mutation::Alias,
            msisdn: "010-1".into(),
            result: Ok(()),
        });
        assert!(matches!(
            &effects[0],
            Effect::LoadDevices { select: Some(m), .. } if m == "010-1"
        ));

        h.send(DashboardEvent::MutationFinished {
            mutation: Mutation::Dormant,
            msisdn: "010-1".into(),
            result: Err(Some("device busy".into())),
        });
        assert_eq!(h.state.notice, Some(Notice::error("device busy")));

        h.send(DashboardEvent::MutationFinished {
            mutation: Mutation::Activate,
            msisdn: "010-2".into(),
            result: Err(None),
        });
        assert_eq!(
            h.state.notice,
            Some(Notice::error("Failed to activate device"))
        );
    }

    #[test]
    fn test_export_requires_selection() {
        let mut h = Harness::new();
        assert!(h.send(DashboardEvent::ExportRequested).is_empty());
        assert!(h.state.notice.is_some());

        let mut h = Harness::logged_in(fleet());
        let effects = h.send(DashboardEvent::ExportRequested);
        assert!(matches!(&effects[0], Effect::ExportCsv { msisdn, .. } if msisdn == "010-1"));
    }
}
