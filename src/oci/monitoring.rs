//! OCI Monitoring API
//!
//! Typed access to the two telemetry calls the datasource needs:
//! `ListMetrics` (one page per call) and `SummarizeMetricsData`.

use super::http::{OciHttpClient, Page};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const API_VERSION: &str = "/20180401";

/// Filter and grouping for a list-metrics call
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListMetricsDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
}

/// Metric definition returned by list-metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

/// Body of a summarize-metrics-data call
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeMetricsDataDetails {
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    pub query: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Aggregated series returned by summarize-metrics-data
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub aggregated_datapoints: Vec<AggregatedDatapoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedDatapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Monitoring operations used by the datasource
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Fetch one page of metric definitions
    async fn list_metrics(
        &self,
        region: &str,
        compartment_id: &str,
        details: &ListMetricsDetails,
        page: Option<&str>,
    ) -> Result<Page<Metric>>;

    /// Fetch aggregated datapoints for a MQL query
    async fn summarize_metrics_data(
        &self,
        region: &str,
        compartment_id: &str,
        details: &SummarizeMetricsDataDetails,
    ) -> Result<Vec<MetricData>>;
}

/// REST client for the telemetry service
#[derive(Clone)]
pub struct MonitoringClient {
    http: OciHttpClient,
    endpoint: Option<String>,
}

impl MonitoringClient {
    /// `endpoint` overrides the telemetry base URL (may contain `{region}`)
    pub fn new(http: OciHttpClient, endpoint: Option<String>) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl MonitoringApi for MonitoringClient {
    async fn list_metrics(
        &self,
        region: &str,
        compartment_id: &str,
        details: &ListMetricsDetails,
        page: Option<&str>,
    ) -> Result<Page<Metric>> {
        let mut query = vec![("compartmentId", compartment_id)];
        if let Some(page) = page {
            query.push(("page", page));
        }
        let url = self.http.service_url(
            "telemetry",
            self.endpoint.as_deref(),
            region,
            &format!("{}/metrics/actions/listMetrics", API_VERSION),
            &query,
        )?;

        let response = self.http.post::<_, Vec<Metric>>(url, details).await?;
        Ok(Page {
            items: response.body,
            next_page: response.next_page,
        })
    }

    async fn summarize_metrics_data(
        &self,
        region: &str,
        compartment_id: &str,
        details: &SummarizeMetricsDataDetails,
    ) -> Result<Vec<MetricData>> {
        let url = self.http.service_url(
            "telemetry",
            self.endpoint.as_deref(),
            region,
            &format!("{}/metrics/actions/summarizeMetricsData", API_VERSION),
            &[("compartmentId", compartment_id)],
        )?;

        let response = self.http.post::<_, Vec<MetricData>>(url, details).await?;
        Ok(response.body)
    }
}
