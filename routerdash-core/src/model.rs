use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type Msisdn = String;

/// A single backend row (series sample or table record), kept as raw JSON.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub msisdn: Msisdn,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub dormant: bool,
    #[serde(default)]
    pub has_recent: bool,
}

impl Device {
    pub fn new(msisdn: impl Into<String>) -> Self {
        Self {
            msisdn: msisdn.into(),
            alias: None,
            dormant: false,
            has_recent: false,
        }
    }

    /// Trimmed alias, empty when unset
    pub fn alias(&self) -> &str {
        self.alias.as_deref().map(str::trim).unwrap_or("")
    }

    /// "alias (msisdn)" or just the msisdn
    pub fn label(&self) -> String {
        let name = self.alias();
        if name.is_empty() {
            self.msisdn.clone()
        } else {
            format!("{} ({})", name, self.msisdn)
        }
    }

    /// Reporting recently and not soft-deleted
    pub fn is_active(&self) -> bool {
        self.has_recent && !self.dormant
    }
}

/// The four plotted radio metrics, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    RouterRssi,
    Sinr,
    Rsrq,
    Rsrp,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::RouterRssi, Metric::Sinr, Metric::Rsrq, Metric::Rsrp];

    pub fn key(&self) -> &'static str {
        match self {
            Self::RouterRssi => "router_rssi",
            Self::Sinr => "sinr",
            Self::Rsrq => "rsrq",
            Self::Rsrp => "rsrp",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::RouterRssi => "RSSI (dBm)",
            Self::Sinr => "SINR (dB)",
            Self::Rsrq => "RSRQ (dB)",
            Self::Rsrp => "RSRP (dBm)",
        }
    }

    pub fn reference_band(&self) -> Option<ReferenceBand> {
        let band = match self {
            Self::Rsrp => ReferenceBand::new(-100.0, -84.0),
            Self::Rsrq => ReferenceBand::new(-10.0, -6.0),
            Self::Sinr => ReferenceBand::new(15.0, 19.0),
            Self::RouterRssi => ReferenceBand::new(-70.0, -56.0),
        };
        Some(band)
    }

    /// Row field holding this metric for a given chart mode
    pub fn data_key(&self, mode: ChartMode) -> String {
        format!("{}{}", self.key(), mode.suffix())
    }
}

/// Expected operating value and upper bound for a metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceBand {
    pub center: f64,
    pub upper: f64,
}

impl ReferenceBand {
    pub const fn new(center: f64, upper: f64) -> Self {
        Self { center, upper }
    }

    pub fn half_width(&self) -> f64 {
        (self.upper - self.center).abs()
    }
}

/// Which row field carries the sample time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XKey {
    /// Raw sample timestamp
    Ts,
    /// Hourly bucket label
    Hour,
    /// Daily bucket label
    Day,
}

impl XKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Hour => "h",
            Self::Day => "d",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMode {
    #[default]
    Raw,
    HourlyAvg,
    DailyAvg,
}

impl ChartMode {
    pub const ALL: [ChartMode; 3] = [ChartMode::Raw, ChartMode::HourlyAvg, ChartMode::DailyAvg];

    /// Path segment under /api/metrics/
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::HourlyAvg => "hourly_avg",
            Self::DailyAvg => "daily_avg",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::HourlyAvg | Self::DailyAvg => "_avg",
        }
    }

    pub fn x_key(&self) -> XKey {
        match self {
            Self::Raw => XKey::Ts,
            Self::HourlyAvg => XKey::Hour,
            Self::DailyAvg => XKey::Day,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Raw => "all samples",
            Self::HourlyAvg => "hourly avg",
            Self::DailyAvg => "daily avg",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            Self::Raw => Self::HourlyAvg,
            Self::HourlyAvg => Self::DailyAvg,
            Self::DailyAvg => Self::Raw,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Asc => "oldest first",
            Self::Desc => "newest first",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}', expected asc or desc", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Chart,
    Table,
}

impl Tab {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chart => "Chart",
            Self::Table => "Records",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Chart => Self::Table,
            Self::Table => Self::Chart,
        }
    }
}

/// Inclusive calendar range passed to the backend as YYYY-MM-DD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `days` days back from `today`, ending today
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let start = today - chrono::Duration::days(i64::from(days));
        Self { start, end: today }
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// Move both ends by `days` (negative = earlier)
    pub fn shifted(&self, days: i64) -> Self {
        let d = chrono::Duration::days(days);
        Self {
            start: self.start + d,
            end: self.end + d,
        }
    }

    /// Parse "YYYY-MM-DD YYYY-MM-DD" (also accepts ".." or "~" separators)
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.replace("..", " ").replace('~', " ");
        let mut parts = normalized.split_whitespace();
        let start = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { start, end })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.start_str(), self.end_str())
    }
}

/// Columns of the records table, in display order.
pub const TABLE_HEADERS: [&str; 24] = [
    "ts_kst",
    "datetime_str",
    "system",
    "plmn",
    "band",
    "earfcn_dl",
    "earfcn_ul",
    "bandwidth",
    "cell_id",
    "pci",
    "drx",
    "rsrp",
    "rsrq",
    "rssi",
    "tac",
    "sinr",
    "rrc_st",
    "emc_st",
    "scell_band",
    "scell_bw",
    "scell_status",
    "latitude",
    "longitude",
    "ip_v4",
];

/// Numeric value of a row field; non-numbers are None
pub fn row_number(row: &Row, key: &str) -> Option<f64> {
    row.get(key).and_then(|v| v.as_f64())
}

/// Text of a row field for verbatim display; null/missing is empty
pub fn row_text(row: &Row, key: &str) -> String {
    match row.get(key) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One device's series in the all-devices RSSI view.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSeries {
    pub msisdn: Msisdn,
    pub alias: String,
    pub rows: Vec<Row>,
}

impl DeviceSeries {
    pub fn label(&self) -> String {
        if self.alias.is_empty() {
            self.msisdn.clone()
        } else {
            format!("{} ({})", self.alias, self.msisdn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_label() {
        let mut d = Device::new("01012345678");
        assert_eq!(d.label(), "01012345678");
        d.alias = Some("  Mokdong C1 ".into());
        assert_eq!(d.label(), "Mokdong C1 (01012345678)");
        d.alias = Some("   ".into());
        assert_eq!(d.label(), "01012345678");
    }

    #[test]
    fn test_device_null_alias_deserializes() {
        let d: Device =
            serde_json::from_value(json!({"msisdn": "1", "alias": null, "dormant": true}))
                .unwrap();
        assert_eq!(d.alias(), "");
        assert!(d.dormant);
        assert!(!d.has_recent);
    }

    #[test]
    fn test_metric_data_keys() {
        assert_eq!(Metric::RouterRssi.data_key(ChartMode::Raw), "router_rssi");
        assert_eq!(Metric::Rsrp.data_key(ChartMode::HourlyAvg), "rsrp_avg");
        assert_eq!(ChartMode::DailyAvg.x_key(), XKey::Day);
        assert_eq!(ChartMode::HourlyAvg.x_key().as_str(), "h");
    }

    #[test]
    fn test_date_range_parse() {
        let r = DateRange::parse("2025-01-08 2025-01-15").unwrap();
        assert_eq!(r.start_str(), "2025-01-08");
        assert_eq!(r.end_str(), "2025-01-15");
        assert!(DateRange::parse("2025-01-08..2025-01-15").is_some());
        assert!(DateRange::parse("2025-01-08").is_none());
        assert!(DateRange::parse("2025-13-08 2025-01-15").is_none());
    }

    #[test]
    fn test_last_days() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let r = DateRange::last_days(today, 7);
        assert_eq!(r.start_str(), "2025-01-08");
        assert_eq!(r.end, today);
    }

    #[test]
    fn test_row_text_and_number() {
        let row: Row = serde_json::from_value(json!({"band": 3, "plmn": "45006", "pci": null}))
            .unwrap();
        assert_eq!(row_text(&row, "band"), "3");
        assert_eq!(row_text(&row, "plmn"), "45006");
        assert_eq!(row_text(&row, "pci"), "");
        assert_eq!(row_text(&row, "missing"), "");
        assert_eq!(row_number(&row, "band"), Some(3.0));
        assert_eq!(row_number(&row, "plmn"), None);
    }
}
