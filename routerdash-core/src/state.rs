use std::time::Duration;

use chrono::NaiveDate;

use crate::config::{DashConfig, MIN_REFRESH_SECS};
use crate::device;
use crate::model::{ChartMode, DateRange, Device, DeviceSeries, Msisdn, Row, SortOrder, Tab};

/// Kinds of backend fetch that can go stale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Devices,
    Series,
    AllRssi,
    Table,
}

/// Latest issued sequence token per fetch kind.
///
/// A response is applied only when it carries the token most recently
/// issued for its kind.
#[derive(Clone, Debug, Default)]
pub struct SeqTokens {
    next: u64,
    devices: u64,
    series: u64,
    all_rssi: u64,
    table: u64,
}

impl SeqTokens {
    fn slot(&mut self, kind: FetchKind) -> &mut u64 {
        match kind {
            FetchKind::Devices => &mut self.devices,
            FetchKind::Series => &mut self.series,
            FetchKind::AllRssi => &mut self.all_rssi,
            FetchKind::Table => &mut self.table,
        }
    }

    pub fn issue(&mut self, kind: FetchKind) -> u64 {
        self.next += 1;
        let token = self.next;
        *self.slot(kind) = token;
        token
    }

    pub fn is_current(&self, kind: FetchKind, token: u64) -> bool {
        let current = match kind {
            FetchKind::Devices => self.devices,
            FetchKind::Series => self.series,
            FetchKind::AllRssi => self.all_rssi,
            FetchKind::Table => self.table,
        };
        current != 0 && current == token
    }

    /// Invalidate everything in flight
    pub fn reset(&mut self) {
        *self = Self {
            next: self.next,
            ..Self::default()
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-visible one-line message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChartParams {
    pub mode: ChartMode,
    pub range: DateRange,
    pub rssi_only: bool,
}

#[derive(Clone, Debug)]
pub struct TableParams {
    pub range: DateRange,
    pub page: u32,
    pub page_size: u32,
    pub order: SortOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshSettings {
    pub auto: bool,
    pub interval_secs: u64,
}

impl RefreshSettings {
    /// Timer period, or None when auto-refresh is off
    pub fn period(&self) -> Option<Duration> {
        self.auto
            .then(|| Duration::from_secs(self.interval_secs.max(MIN_REFRESH_SECS)))
    }
}

/// Everything the dashboard shows, in one place.
#[derive(Clone, Debug)]
pub struct DashboardState {
    /// Logged-in user; None shows the login form
    pub user: Option<String>,

    /// Sorted device list as last returned by the backend
    pub devices: Vec<Device>,
    pub show_dormant: bool,
    pub selected: Option<Msisdn>,
    pub tab: Tab,

    pub chart: ChartParams,
    /// Rows for `chart.mode` of the selected device
    pub chart_rows: Vec<Row>,
    pub all_rssi: Vec<DeviceSeries>,
    /// Bumped whenever chart data is replaced
    pub chart_version: u64,

    pub table: TableParams,
    pub table_rows: Vec<Row>,
    pub table_total: u64,

    pub refresh: RefreshSettings,
    /// UTC+9 "YYYY-MM-DD HH:MM:SS" of the last successful load
    pub last_updated: Option<String>,
    pub notice: Option<Notice>,

    pub tokens: SeqTokens,
    pub last_event_id: u64,
}

impl DashboardState {
    pub fn new(config: &DashConfig, today: NaiveDate) -> Self {
        let range = DateRange::last_days(today, config.chart.default_days);
        Self {
            user: None,
            devices: Vec::new(),
            show_dormant: false,
            selected: None,
            tab: Tab::default(),
            chart: ChartParams {
                mode: config.chart.mode,
                range,
                rssi_only: false,
            },
            chart_rows: Vec::new(),
            all_rssi: Vec::new(),
            chart_version: 0,
            table: TableParams {
                range,
                page: 1,
                page_size: config.table.page_size.max(1),
                order: config.table.order,
            },
            table_rows: Vec::new(),
            table_total: 0,
            refresh: RefreshSettings {
                auto: config.refresh.auto,
                interval_secs: config.refresh.interval_secs,
            },
            last_updated: None,
            notice: None,
            tokens: SeqTokens::default(),
            last_event_id: 0,
        }
    }

    /// Drop all per-user data, keeping parameters
    pub fn clear_data(&mut self) {
        self.devices.clear();
        self.selected = None;
        self.chart_rows.clear();
        self.all_rssi.clear();
        self.chart_version += 1;
        self.table_rows.clear();
        self.table_total = 0;
        self.table.page = 1;
        self.last_updated = None;
        self.notice = None;
        self.tokens.reset();
    }

    pub fn visible_devices(&self) -> Vec<&Device> {
        device::visible_devices(&self.devices, self.show_dormant)
    }

    /// Devices shown in the all-devices RSSI view
    pub fn active_devices(&self) -> Vec<&Device> {
        device::active_devices(&self.devices, self.show_dormant)
    }

    pub fn selected_device(&self) -> Option<&Device> {
        let id = self.selected.as_deref()?;
        self.devices.iter().find(|d| d.msisdn == id)
    }

    /// Position of the selection within the visible list
    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected.as_deref()?;
        self.visible_devices().iter().position(|d| d.msisdn == id)
    }

    pub fn total_pages(&self) -> u32 {
        let size = u64::from(self.table.page_size.max(1));
        let pages = self.table_total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn can_prev(&self) -> bool {
        self.table.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.table.page < self.total_pages()
    }

    pub fn refresh_period(&self) -> Option<Duration> {
        self.refresh.period()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Backend gap-fill samples in the current chart rows
    pub fn synthetic_count(&self) -> usize {
        self.chart_rows
            .iter()
            .filter(|r| r.get("is_fake").and_then(|v| v.as_bool()).unwrap_or(false))
            .count()
    }
}
