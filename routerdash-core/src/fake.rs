//! In-process backend with deterministic synthetic telemetry.
//!
//! Backs `routerdash --demo` and the async tests. Series are smooth waves
//! seeded from the msisdn so every device looks different but stable.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde_json::{Value, json};

use crate::api::{ApiError, DashboardApi, TablePage, TableQuery};
use crate::model::{ChartMode, DateRange, Device, Row, SortOrder, TABLE_HEADERS};

/// Minutes between raw samples
const RAW_STEP_MIN: i64 = 30;

#[derive(Debug)]
struct FakeInner {
    devices: Vec<Device>,
    failing_series: BTreeSet<String>,
    reject_mutations: Option<String>,
}

#[derive(Debug)]
pub struct FakeApi {
    inner: Mutex<FakeInner>,
    calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

fn demo_devices() -> Vec<Device> {
    [
        ("01000000001", Some("Mokdong C1"), false, true),
        ("01000000002", Some("Sindorim A3"), false, true),
        ("01000000003", Some("Yeouido B2"), false, true),
        ("01000000004", Some("Gangnam D4"), true, false),
        ("01000000005", None, false, false),
    ]
    .into_iter()
    .map(|(msisdn, alias, dormant, has_recent)| Device {
        msisdn: msisdn.to_string(),
        alias: alias.map(|a| a.to_string()),
        dormant,
        has_recent,
    })
    .collect()
}

fn seed(msisdn: &str) -> f64 {
    let sum: u64 = msisdn.bytes().map(u64::from).sum();
    (sum % 17) as f64
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Four metric values for a device at a point in time
fn sample(msisdn: &str, t: NaiveDateTime) -> [f64; 4] {
    let s = seed(msisdn);
    let phase = t.and_utc().timestamp() as f64 / 3600.0 / 6.0 + s;
    let wave = phase.sin();
    let slow = (phase / 3.0).cos();
    [
        round3(-98.0 + 9.0 * wave - s * 0.4),
        round3(-9.5 + 2.5 * slow),
        round3(14.0 + 5.0 * wave * slow),
        round3(-68.0 + 7.0 * wave - s * 0.3),
    ]
}

fn times(range: &DateRange, step: Duration) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let (Some(mut t), Some(end)) = (
        range.start.and_hms_opt(0, 0, 0),
        (range.end + Duration::days(1)).and_hms_opt(0, 0, 0),
    ) else {
        return out;
    };
    while t < end {
        out.push(t);
        t += step;
    }
    out
}

fn series_rows(msisdn: &str, mode: ChartMode, range: &DateRange) -> Vec<Row> {
    let step = match mode {
        ChartMode::Raw => Duration::minutes(RAW_STEP_MIN),
        ChartMode::HourlyAvg => Duration::hours(1),
        ChartMode::DailyAvg => Duration::days(1),
    };
    times(range, step)
        .into_iter()
        .filter_map(|t| {
            let [rsrp, rsrq, sinr, rssi] = sample(msisdn, t);
            let value = match mode {
                ChartMode::Raw => json!({
                    "ts": t.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "rsrp": rsrp, "rsrq": rsrq, "sinr": sinr, "router_rssi": rssi,
                    "is_fake": false,
                }),
                ChartMode::HourlyAvg => json!({
                    "h": t.format("%Y-%m-%d %H:00:00").to_string(),
                    "rsrp_avg": rsrp, "rsrq_avg": rsrq, "sinr_avg": sinr, "router_rssi_avg": rssi,
                }),
                ChartMode::DailyAvg => json!({
                    "d": t.format("%Y-%m-%d").to_string(),
                    "rsrp_avg": rsrp, "rsrq_avg": rsrq, "sinr_avg": sinr, "router_rssi_avg": rssi,
                }),
            };
            match value {
                Value::Object(map) => Some(map),
                _ => None,
            }
        })
        .collect()
}

fn record_row(msisdn: &str, idx: usize, t: NaiveDateTime) -> Row {
    let [rsrp, rsrq, sinr, rssi] = sample(msisdn, t);
    let mut row = Row::new();
    for key in TABLE_HEADERS {
        let value = match key {
            "ts_kst" => json!(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            "datetime_str" => json!(t.format("%Y%m%d%H%M%S").to_string()),
            "system" => json!("LTE"),
            "plmn" => json!("45006"),
            "band" => json!(if idx % 3 == 0 { 5 } else { 3 }),
            "earfcn_dl" => json!(1550),
            "earfcn_ul" => json!(19550),
            "bandwidth" => json!(20),
            "cell_id" => json!(format!("{:07X}", 0x1A2B00 + seed(msisdn) as u32)),
            "pci" => json!(100 + seed(msisdn) as u32),
            "drx" => json!(1280),
            "rsrp" => json!(rsrp),
            "rsrq" => json!(rsrq),
            "rssi" => json!(rssi),
            "tac" => json!(4660),
            "sinr" => json!(sinr),
            "rrc_st" => json!("CONNECTED"),
            "emc_st" => json!("IDLE"),
            "scell_band" => Value::Null,
            "scell_bw" => Value::Null,
            "scell_status" => json!("NONE"),
            "latitude" => json!(37.5263),
            "longitude" => json!(126.8646),
            "ip_v4" => json!(format!("10.0.{}.{}", seed(msisdn) as u32, 10 + idx % 200)),
            _ => Value::Null,
        };
        row.insert(key.to_string(), value);
    }
    row
}

fn records(msisdn: &str, range: &DateRange, order: SortOrder) -> Vec<Row> {
    let mut list: Vec<Row> = times(range, Duration::minutes(RAW_STEP_MIN))
        .into_iter()
        .enumerate()
        .map(|(i, t)| record_row(msisdn, i, t))
        .collect();
    if order == SortOrder::Desc {
        list.reverse();
    }
    list
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::with_devices(demo_devices())
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            inner: Mutex::new(FakeInner {
                devices,
                failing_series: BTreeSet::new(),
                reject_mutations: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every series request for this device fail
    pub fn fail_series_for(&self, msisdn: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_series.insert(msisdn.to_string());
        }
    }

    /// Answer mutations with `ok: false` and this detail
    pub fn reject_mutations(&self, detail: Option<&str>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.reject_mutations = Some(detail.unwrap_or_default().to_string());
        }
    }

    /// Number of backend calls served
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FakeInner>, ApiError> {
        self.inner.lock().map_err(|_| ApiError::Transport {
            reason: "fake backend poisoned".into(),
        })
    }

    fn mutate(&self, msisdn: &str, f: impl FnOnce(&mut Device)) -> Result<(), ApiError> {
        self.hit();
        let mut inner = self.lock()?;
        if let Some(detail) = &inner.reject_mutations {
            let detail = (!detail.is_empty()).then(|| detail.clone());
            return Err(ApiError::Rejected { detail });
        }
        if msisdn.is_empty() {
            return Err(ApiError::Rejected {
                detail: Some("msisdn is required".into()),
            });
        }
        match inner.devices.iter_mut().find(|d| d.msisdn == msisdn) {
            Some(device) => f(device),
            None => {
                let mut device = Device::new(msisdn);
                f(&mut device);
                inner.devices.push(device);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DashboardApi for FakeApi {
    async fn list_devices(&self, include_dormant: bool) -> Result<Vec<Device>, ApiError> {
        self.hit();
        let inner = self.lock()?;
        Ok(inner
            .devices
            .iter()
            .filter(|d| include_dormant || !d.dormant)
            .cloned()
            .collect())
    }

    async fn fetch_series(
        &self,
        msisdn: &str,
        mode: ChartMode,
        range: &DateRange,
    ) -> Result<Vec<Row>, ApiError> {
        self.hit();
        if self.lock()?.failing_series.contains(msisdn) {
            return Err(ApiError::Transport {
                reason: format!("connection reset while fetching {}", msisdn),
            });
        }
        Ok(series_rows(msisdn, mode, range))
    }

    async fn fetch_table(&self, query: &TableQuery) -> Result<TablePage, ApiError> {
        self.hit();
        let all = records(&query.msisdn, &query.range, query.order);
        let total = all.len() as u64;
        let size = query.page_size.max(1) as usize;
        let offset = (query.page.max(1) as usize - 1) * size;
        let rows = all.into_iter().skip(offset).take(size).collect();
        Ok(TablePage { rows, total })
    }

    async fn set_alias(&self, msisdn: &str, alias: &str) -> Result<(), ApiError> {
        let alias = alias.trim().to_string();
        self.mutate(msisdn, |d| {
            d.alias = (!alias.is_empty()).then_some(alias);
        })
    }

    async fn set_dormant(&self, msisdn: &str) -> Result<(), ApiError> {
        self.mutate(msisdn, |d| d.dormant = true)
    }

    async fn activate(&self, msisdn: &str) -> Result<(), ApiError> {
        self.mutate(msisdn, |d| d.dormant = false)
    }

    async fn export_csv(
        &self,
        msisdn: &str,
        range: &DateRange,
        order: SortOrder,
    ) -> Result<Vec<u8>, ApiError> {
        self.hit();
        let mut out = TABLE_HEADERS.join(",");
        out.push('\n');
        for row in records(msisdn, range, order) {
            let line: Vec<String> = TABLE_HEADERS
                .iter()
                .map(|h| csv_field(&crate::model::row_text(&row, h)))
                .collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.hit();
        Ok(())
    }

    fn describe(&self) -> String {
        "demo backend".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_series_shapes_per_mode() {
        let api = FakeApi::new();
        let raw = api.fetch_series("01000000001", ChartMode::Raw, &range()).await.unwrap();
        assert_eq!(raw.len(), 2 * 24 * 2);
        assert!(raw[0].contains_key("ts"));
        assert!(raw[0].contains_key("router_rssi"));

        let hourly = api
            .fetch_series("01000000001", ChartMode::HourlyAvg, &range())
            .await
            .unwrap();
        assert_eq!(hourly.len(), 48);
        assert!(hourly[0].contains_key("rsrp_avg"));

        let daily = api
            .fetch_series("01000000001", ChartMode::DailyAvg, &range())
            .await
            .unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].get("d"), Some(&json!("2025-01-14")));
    }

    #[tokio::test]
    async fn test_table_paging() {
        let api = FakeApi::new();
        let mut q = TableQuery {
            msisdn: "01000000001".into(),
            range: range(),
            page: 1,
            page_size: 40,
            order: SortOrder::Desc,
        };
        let first = api.fetch_table(&q).await.unwrap();
        assert_eq!(first.total, 96);
        assert_eq!(first.rows.len(), 40);
        assert_eq!(first.rows[0].len(), TABLE_HEADERS.len());

        q.page = 3;
        let last = api.fetch_table(&q).await.unwrap();
        assert_eq!(last.rows.len(), 16);
    }

    #[tokio::test]
    async fn test_dormant_hidden_unless_requested() {
        let api = FakeApi::new();
        let active = api.list_devices(false).await.unwrap();
        assert!(active.iter().all(|d| !d.dormant));
        let all = api.list_devices(true).await.unwrap();
        assert_eq!(all.len(), active.len() + 1);

        api.set_dormant("01000000001").await.unwrap();
        let active_after = api.list_devices(false).await.unwrap();
        assert_eq!(active_after.len(), active.len() - 1);

        api.activate("01000000001").await.unwrap();
        assert_eq!(api.list_devices(false).await.unwrap().len(), active.len());
    }

    #[tokio::test]
    async fn test_rejected_mutation_carries_detail() {
        let api = FakeApi::new();
        api.reject_mutations(Some("alias too long"));
        let err = api.set_alias("01000000001", "x").await.unwrap_err();
        assert_eq!(err.detail(), Some("alias too long"));

        api.reject_mutations(None);
        let err = api.set_dormant("01000000001").await.unwrap_err();
        assert_eq!(err.detail(), None);
    }

    #[tokio::test]
    async fn test_csv_has_header_and_rows() {
        let api = FakeApi::new();
        let bytes = api
            .export_csv("01000000001", &range(), SortOrder::Asc)
            .await
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("ts_kst,datetime_str"));
        assert_eq!(lines.count(), 96);
    }
}
