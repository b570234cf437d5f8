//! reqwest-backed `DashboardApi` against the telemetry REST server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use routerdash_core::api::{
    ApiError, DashboardApi, DevicesResponse, MutationResponse, SeriesResponse, TablePage,
    TableQuery,
};
use routerdash_core::model::{ChartMode, DateRange, Device, Row, SortOrder};

#[derive(Clone, Debug)]
pub struct HttpApi {
    base_url: String,
    client: Client,
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        reason: e.to_string(),
    }
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build().map_err(transport)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let response = req.send().await.map_err(transport)?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { code, body });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(req).await?;
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })
    }

    /// Mutations answer `{ok, detail}` even on error statuses
    async fn mutate(&self, req: RequestBuilder) -> Result<(), ApiError> {
        let response = req.send().await.map_err(transport)?;
        let success = response.status().is_success();
        let body: MutationResponse = response.json().await.unwrap_or_default();
        if success {
            body.into_result()
        } else {
            Err(ApiError::Rejected {
                detail: body.detail,
            })
        }
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn list_devices(&self, include_dormant: bool) -> Result<Vec<Device>, ApiError> {
        let flag = if include_dormant { "1" } else { "0" };
        let req = self
            .client
            .get(self.url("/api/msisdns"))
            .query(&[("include_dormant", flag)]);
        let body: DevicesResponse = self.get_json(req).await?;
        Ok(body.devices)
    }

    async fn fetch_series(
        &self,
        msisdn: &str,
        mode: ChartMode,
        range: &DateRange,
    ) -> Result<Vec<Row>, ApiError> {
        let req = self
            .client
            .get(self.url(&format!("/api/metrics/{}", mode.endpoint())))
            .query(&[
                ("msisdn", msisdn.to_string()),
                ("start", range.start_str()),
                ("end", range.end_str()),
            ]);
        let body: SeriesResponse = self.get_json(req).await?;
        Ok(body.data)
    }

    async fn fetch_table(&self, query: &TableQuery) -> Result<TablePage, ApiError> {
        let req = self.client.get(self.url("/api/records")).query(&[
            ("msisdn", query.msisdn.clone()),
            ("start", query.range.start_str()),
            ("end", query.range.end_str()),
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
            ("order", query.order.as_str().to_string()),
        ]);
        self.get_json(req).await
    }

    async fn set_alias(&self, msisdn: &str, alias: &str) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url("/api/devices/alias"))
            .json(&json!({ "msisdn": msisdn, "alias": alias }));
        self.mutate(req).await
    }

    async fn set_dormant(&self, msisdn: &str) -> Result<(), ApiError> {
        let req = self
            .client
            .delete(self.url("/api/devices"))
            .query(&[("msisdn", msisdn)]);
        self.mutate(req).await
    }

    async fn activate(&self, msisdn: &str) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url("/api/devices/activate"))
            .json(&json!({ "msisdn": msisdn }));
        self.mutate(req).await
    }

    async fn export_csv(
        &self,
        msisdn: &str,
        range: &DateRange,
        order: SortOrder,
    ) -> Result<Vec<u8>, ApiError> {
        let req = self.client.get(self.url("/api/records/csv")).query(&[
            ("msisdn", msisdn.to_string()),
            ("start", range.start_str()),
            ("end", range.end_str()),
            ("order", order.as_str().to_string()),
        ]);
        let response = self.send(req).await?;
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn health(&self) -> Result<(), ApiError> {
        let req = self.client.get(self.url("/healthz"));
        let body: serde_json::Value = self.get_json(req).await?;
        match body.get("status").and_then(|s| s.as_str()) {
            Some("ok") => Ok(()),
            other => Err(ApiError::Decode {
                reason: format!("unexpected health status {:?}", other),
            }),
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
