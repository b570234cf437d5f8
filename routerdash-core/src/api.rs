use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::device::sort_devices;
use crate::model::{ChartMode, DateRange, Device, DeviceSeries, Row, SortOrder};

/// Errors from talking to the dashboard backend
#[derive(Clone, Debug, PartialEq)]
pub enum ApiError {
    /// Connection, timeout, or other transport failure
    Transport { reason: String },
    /// Non-success HTTP status
    Status { code: u16, body: String },
    /// Body did not match the expected shape
    Decode { reason: String },
    /// Backend answered `ok: false` to a mutation
    Rejected { detail: Option<String> },
}

impl ApiError {
    /// Backend-provided detail for user-facing notices
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Rejected { detail } => detail.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { reason } => write!(f, "request failed: {}", reason),
            Self::Status { code, body } => write!(f, "HTTP {}: {}", code, body),
            Self::Decode { reason } => write!(f, "invalid response: {}", reason),
            Self::Rejected { detail } => match detail {
                Some(d) => write!(f, "rejected: {}", d),
                None => write!(f, "rejected by backend"),
            },
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub data: Vec<Row>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TablePage {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub total: u64,
}

/// `{ok, detail?}` answer to alias/dormant/activate calls
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl MutationResponse {
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.ok {
            Ok(())
        } else {
            Err(ApiError::Rejected {
                detail: self.detail,
            })
        }
    }
}

/// Parameters of one records page request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableQuery {
    pub msisdn: String,
    pub range: DateRange,
    pub page: u32,
    pub page_size: u32,
    pub order: SortOrder,
}

/// The REST backend the dashboard consumes.
///
/// Implementations:
/// - `HttpApi` (cli): reqwest against a live server
/// - `FakeApi`: deterministic in-process data for demos and tests
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn list_devices(&self, include_dormant: bool) -> Result<Vec<Device>, ApiError>;

    async fn fetch_series(
        &self,
        msisdn: &str,
        mode: ChartMode,
        range: &DateRange,
    ) -> Result<Vec<Row>, ApiError>;

    async fn fetch_table(&self, query: &TableQuery) -> Result<TablePage, ApiError>;

    async fn set_alias(&self, msisdn: &str, alias: &str) -> Result<(), ApiError>;

    /// Soft-delete: marks the device dormant, keeps its data
    async fn set_dormant(&self, msisdn: &str) -> Result<(), ApiError>;

    async fn activate(&self, msisdn: &str) -> Result<(), ApiError>;

    async fn export_csv(
        &self,
        msisdn: &str,
        range: &DateRange,
        order: SortOrder,
    ) -> Result<Vec<u8>, ApiError>;

    async fn health(&self) -> Result<(), ApiError>;

    /// Human-readable backend identity for status lines
    fn describe(&self) -> String;
}

/// Device list access with sorting applied.
#[derive(Clone)]
pub struct DeviceDirectory {
    api: Arc<dyn DashboardApi>,
}

impl DeviceDirectory {
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self, include_dormant: bool) -> Result<Vec<Device>, ApiError> {
        let devices = self.api.list_devices(include_dormant).await?;
        Ok(sort_devices(devices))
    }

    pub async fn set_alias(&self, msisdn: &str, alias: &str) -> Result<(), ApiError> {
        self.api.set_alias(msisdn, alias.trim()).await
    }

    pub async fn set_dormant(&self, msisdn: &str) -> Result<(), ApiError> {
        self.api.set_dormant(msisdn).await
    }

    pub async fn activate(&self, msisdn: &str) -> Result<(), ApiError> {
        self.api.activate(msisdn).await
    }
}

/// Series and records access. An empty msisdn never reaches the backend.
#[derive(Clone)]
pub struct MetricsFetcher {
    api: Arc<dyn DashboardApi>,
}

impl MetricsFetcher {
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        Self { api }
    }

    pub async fn series(
        &self,
        msisdn: &str,
        mode: ChartMode,
        range: &DateRange,
    ) -> Result<Vec<Row>, ApiError> {
        if msisdn.is_empty() {
            return Ok(Vec::new());
        }
        self.api.fetch_series(msisdn, mode, range).await
    }

    pub async fn table(&self, query: &TableQuery) -> Result<TablePage, ApiError> {
        if query.msisdn.is_empty() {
            return Ok(TablePage::default());
        }
        self.api.fetch_table(query).await
    }

    /// Fetch every device's series concurrently.
    ///
    /// A failing device contributes nothing; devices without rows are
    /// omitted from the result.
    pub async fn all_device_series(
        &self,
        devices: &[Device],
        mode: ChartMode,
        range: &DateRange,
    ) -> Vec<DeviceSeries> {
        let fetches = devices.iter().map(|dev| async move {
            let rows = self.series(&dev.msisdn, mode, range).await.unwrap_or_default();
            DeviceSeries {
                msisdn: dev.msisdn.clone(),
                alias: dev.alias().to_string(),
                rows,
            }
        });

        join_all(fetches)
            .await
            .into_iter()
            .filter(|s| !s.rows.is_empty())
            .collect()
    }

    pub async fn export_csv(
        &self,
        msisdn: &str,
        range: &DateRange,
        order: SortOrder,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        if msisdn.is_empty() {
            return Ok(None);
        }
        self.api.export_csv(msisdn, range, order).await.map(Some)
    }
}
