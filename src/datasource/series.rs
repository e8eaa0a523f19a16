//! Time series reshaping
//!
//! Each summarize-metrics-data item becomes one named series. The name is
//! the metric name followed by the values of human-readable dimensions
//! (keys ending in `Name`), or by every dimension value when none exists.

use super::model::{Point, TimeSeries};
use crate::oci::monitoring::MetricData;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn display_name_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+Name").expect("static regex"))
}

/// Series name for a metric and its dimensions.
///
/// Dimensions are visited in sorted key order.
pub fn series_name(metric: &str, dimensions: &BTreeMap<String, String>) -> String {
    let re = display_name_key();
    let mut name = metric.to_string();
    let mut matched = false;

    for (key, value) in dimensions {
        if re.is_match(key) {
            name.push_str(&format!(", {{{}}}", value));
            matched = true;
        }
    }

    if !matched {
        let values: Vec<&str> = dimensions.values().map(String::as_str).collect();
        name.push_str(&format!(", {{{}}}", values.join(", ")));
    }
    name
}

pub fn to_series(items: &[MetricData]) -> Vec<TimeSeries> {
    items
        .iter()
        .map(|item| TimeSeries {
            name: series_name(&item.name, &item.dimensions),
            points: item
                .aggregated_datapoints
                .iter()
                .map(|dp| Point {
                    timestamp: dp.timestamp.timestamp_millis(),
                    value: dp.value,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::monitoring::AggregatedDatapoint;
    use chrono::{TimeZone, Utc};

    fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_display_name_dimension_is_used() {
        let name = series_name(
            "CpuUtilization",
            &dims(&[("resourceDisplayName", "vm1"), ("resourceId", "ocid1.instance.oc1..x")]),
        );
        assert_eq!(name, "CpuUtilization, {vm1}");
    }

    #[test]
    fn test_falls_back_to_all_values_sorted_by_key() {
        let name = series_name(
            "CpuUtilization",
            &dims(&[("shape", "VM.Standard"), ("availabilityDomain", "AD-1")]),
        );
        assert_eq!(name, "CpuUtilization, {AD-1, VM.Standard}");
    }

    #[test]
    fn test_multiple_name_dimensions_in_key_order() {
        let name = series_name(
            "DiskBytesRead",
            &dims(&[("resourceName", "disk0"), ("instanceName", "vm2")]),
        );
        assert_eq!(name, "DiskBytesRead, {vm2}, {disk0}");
    }

    #[test]
    fn test_bare_name_key_does_not_match() {
        // `\w+` needs at least one character before `Name`
        assert_eq!(series_name("M", &dims(&[("Name", "x")])), "M, {x}");
        assert_eq!(series_name("M", &BTreeMap::new()), "M, {}");
    }

    #[test]
    fn test_points_use_millisecond_timestamps() {
        let item = MetricData {
            name: "CpuUtilization".to_string(),
            namespace: "oci_computeagent".to_string(),
            resource_group: None,
            compartment_id: "ocid1.compartment.oc1..c".to_string(),
            dimensions: dims(&[("resourceDisplayName", "vm1")]),
            resolution: None,
            aggregated_datapoints: vec![
                AggregatedDatapoint {
                    timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
                    value: 12.5,
                },
                AggregatedDatapoint {
                    timestamp: Utc.timestamp_millis_opt(1_700_000_060_000).unwrap(),
                    value: 0.0,
                },
            ],
        };

        let series = to_series(&[item]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "CpuUtilization, {vm1}");
        assert_eq!(
            series[0].points,
            vec![
                Point { timestamp: 1_700_000_000_123, value: 12.5 },
                Point { timestamp: 1_700_000_060_000, value: 0.0 },
            ]
        );
    }
}
