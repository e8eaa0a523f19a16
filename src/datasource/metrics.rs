//! Metric queries
//!
//! The default query type: one summarize-metrics-data call per query in the
//! batch, each reshaped into series. Failures stay local to their query.

use super::model::{non_empty, DatasourceRequest, Query, QueryResult, TimeRange};
use super::series::to_series;
use crate::oci::monitoring::{MonitoringApi, SummarizeMetricsDataDetails};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

fn epoch_ms(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("timestamp out of range: {}", ms))
}

fn summarize_details(
    query: &Query,
    time_range: &TimeRange,
) -> Result<(String, String, SummarizeMetricsDataDetails)> {
    let model = query.model()?;
    let resource_group = model.resource_group_filter();
    let details = SummarizeMetricsDataDetails {
        namespace: model.namespace,
        resource_group,
        query: model.query,
        start_time: epoch_ms(time_range.from_epoch_ms)?,
        end_time: epoch_ms(time_range.to_epoch_ms)?,
        resolution: non_empty(&model.resolution),
    };
    Ok((model.region, model.compartment, details))
}

async fn run_query(
    monitoring: &dyn MonitoringApi,
    query: &Query,
    time_range: &TimeRange,
) -> Result<QueryResult> {
    let (region, compartment, details) = summarize_details(query, time_range)?;
    tracing::debug!(
        "summarize {} in {} ({})",
        details.query,
        compartment,
        region
    );

    let items = monitoring
        .summarize_metrics_data(&region, &compartment, &details)
        .await
        .context("summarize metrics data failed")?;

    Ok(QueryResult {
        ref_id: query.ref_id.clone(),
        series: to_series(&items),
        ..Default::default()
    })
}

/// Run every query of the batch in order
pub async fn query_metrics(
    monitoring: &dyn MonitoringApi,
    request: &DatasourceRequest,
) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(request.queries.len());
    for query in &request.queries {
        let result = match run_query(monitoring, query, &request.time_range).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Query {} failed: {:#}", query.ref_id, e);
                QueryResult {
                    ref_id: query.ref_id.clone(),
                    error: Some(format!("{:#}", e)),
                    ..Default::default()
                }
            },
        };
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::testing::FakeMonitoring;
    use crate::oci::monitoring::{AggregatedDatapoint, MetricData};
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn query(ref_id: &str, compartment: &str) -> Query {
        Query {
            ref_id: ref_id.to_string(),
            model_json: json!({
                "queryType": "query",
                "region": "phx",
                "compartment": compartment,
                "namespace": "oci_computeagent",
                "query": "CpuUtilization[1m].mean()",
                "resolution": "1m",
                "resourceGroup": "NoResourceGroup"
            })
            .to_string(),
            ..Default::default()
        }
    }

    fn data() -> MetricData {
        MetricData {
            name: "CpuUtilization".to_string(),
            namespace: "oci_computeagent".to_string(),
            dimensions: BTreeMap::from([("resourceDisplayName".to_string(), "vm1".to_string())]),
            aggregated_datapoints: vec![AggregatedDatapoint {
                timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
                value: 3.5,
            }],
            ..Default::default()
        }
    }

    fn request(queries: Vec<Query>) -> DatasourceRequest {
        DatasourceRequest {
            time_range: TimeRange {
                from_epoch_ms: 1_699_996_400_123,
                to_epoch_ms: 1_700_000_000_456,
                ..Default::default()
            },
            queries,
        }
    }

    #[tokio::test]
    async fn test_builds_summarize_request_from_model_and_range() {
        let series = HashMap::from([("c1".to_string(), vec![data()])]);
        let monitoring = FakeMonitoring::with_data(series);

        let results = query_metrics(&monitoring, &request(vec![query("A", "c1")])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ref_id, "A");
        assert_eq!(results[0].error, None);
        assert_eq!(results[0].series[0].name, "CpuUtilization, {vm1}");
        assert_eq!(results[0].series[0].points[0].timestamp, 1_700_000_000_000);

        let sent = &monitoring.summarize_requests()[0];
        assert_eq!(sent.region, "phx");
        assert_eq!(sent.compartment_id, "c1");
        assert_eq!(sent.details.query, "CpuUtilization[1m].mean()");
        assert_eq!(sent.details.resolution.as_deref(), Some("1m"));
        assert_eq!(sent.details.resource_group, None);
        assert_eq!(sent.details.start_time.timestamp_millis(), 1_699_996_400_123);
        assert_eq!(sent.details.end_time.timestamp_millis(), 1_700_000_000_456);
    }

    #[tokio::test]
    async fn test_failure_is_captured_per_query() {
        let series = HashMap::from([("c1".to_string(), vec![data()])]);
        let monitoring = FakeMonitoring::with_data(series);
        let mut broken = query("C", "c1");
        broken.model_json = "{oops".to_string();

        let results = query_metrics(
            &monitoring,
            &request(vec![query("A", "c1"), query("B", "missing"), broken]),
        )
        .await;

        let ids: Vec<&str> = results.iter().map(|r| r.ref_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(results[0].series.len(), 1);
        assert_eq!(
            results[1].error.as_deref(),
            Some("summarize metrics data failed: OCI API request failed: 404 Not Found")
        );
        assert!(results[1].series.is_empty());
        assert!(results[2]
            .error
            .as_deref()
            .unwrap()
            .starts_with("invalid query model for C"));
        assert_eq!(monitoring.summarize_requests().len(), 2);
    }
}
