//! Lookup responders
//!
//! Each lookup makes one (possibly paginated) API call and flattens the
//! result into a single table keyed by a fixed ref id.

use super::compartments::CompartmentNames;
use super::model::{non_empty, DatasourceResponse, QueryModel, Table, NO_RESOURCE_GROUP};
use super::pagination::search_metrics;
use crate::error::{DatasourceError, Result};
use crate::oci::identity::IdentityApi;
use crate::oci::monitoring::{ListMetricsDetails, Metric, MonitoringApi};
use std::collections::HashSet;

async fn list(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
    details: ListMetricsDetails,
    max_pages: usize,
    lookup: &str,
) -> Result<Vec<Metric>> {
    search_metrics(monitoring, &model.region, &model.compartment, &details, max_pages)
        .await
        .map_err(DatasourceError::api(format!("{} lookup", lookup)))
}

pub async fn namespaces(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
    max_pages: usize,
) -> Result<DatasourceResponse> {
    let details = ListMetricsDetails {
        group_by: vec!["namespace".to_string()],
        ..Default::default()
    };
    let items = list(monitoring, model, details, max_pages, "namespaces").await?;

    let mut table = Table::text(1);
    for item in &items {
        table.push_row(&[&item.namespace]);
    }
    Ok(DatasourceResponse::table("namespaces", table))
}

/// Resource groups of a namespace, always led by the "unset" sentinel row
pub async fn resource_groups(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
    max_pages: usize,
) -> Result<DatasourceResponse> {
    let details = ListMetricsDetails {
        namespace: model.namespace_filter(),
        group_by: vec!["resourceGroup".to_string()],
        ..Default::default()
    };
    let items = list(monitoring, model, details, max_pages, "resourcegroups").await?;

    let mut table = Table::text(1);
    table.push_row(&[NO_RESOURCE_GROUP]);
    // The group without a resource group is already covered by the sentinel
    for group in items.iter().filter_map(|item| item.resource_group.as_deref()) {
        table.push_row(&[group]);
    }
    Ok(DatasourceResponse::table("resourcegroups", table))
}

pub async fn regions(identity: &dyn IdentityApi, model: &QueryModel) -> Result<DatasourceResponse> {
    let regions = identity
        .list_regions(&model.region)
        .await
        .map_err(DatasourceError::api("error fetching regions"))?;

    let mut table = Table::text(1);
    for region in &regions {
        table.push_row(&[&region.name]);
    }
    Ok(DatasourceResponse::table("regions", table))
}

/// Every `key=value` dimension pair of the matching metrics
pub async fn dimensions(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
    max_pages: usize,
) -> Result<DatasourceResponse> {
    let details = ListMetricsDetails {
        name: non_empty(&model.metric),
        namespace: model.namespace_filter(),
        resource_group: model.resource_group_filter(),
        ..Default::default()
    };
    let items = list(monitoring, model, details, max_pages, "dimensions").await?;

    let mut table = Table::text(1);
    for item in &items {
        for (key, value) in &item.dimensions {
            table.push_row(&[format!("{}={}", key, value)]);
        }
    }
    Ok(DatasourceResponse::table("dimensions", table))
}

/// Metric names of a namespace, first occurrence wins
pub async fn search(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
    max_pages: usize,
) -> Result<DatasourceResponse> {
    // Grouping by name keeps the page cap from hiding metrics
    let details = ListMetricsDetails {
        namespace: model.namespace_filter(),
        resource_group: model.resource_group_filter(),
        group_by: vec!["name".to_string()],
        ..Default::default()
    };
    let items = list(monitoring, model, details, max_pages, "search").await?;

    let mut seen = HashSet::new();
    let mut table = Table::text(1);
    for item in &items {
        if seen.insert(item.name.as_str()) {
            table.push_row(&[&item.name]);
        }
    }
    Ok(DatasourceResponse::table("search", table))
}

/// Two columns (full name, OCID), sorted by name
pub fn compartments(names: &CompartmentNames) -> DatasourceResponse {
    let mut table = Table::text(2);
    for (name, id) in names {
        table.push_row(&[name, id]);
    }
    DatasourceResponse::table("compartments", table)
}

/// Connectivity check: one list-metrics call against the tenancy
pub async fn test_connection(
    monitoring: &dyn MonitoringApi,
    model: &QueryModel,
) -> Result<DatasourceResponse> {
    monitoring
        .list_metrics(
            &model.region,
            &model.tenancy_ocid,
            &ListMetricsDetails::default(),
            None,
        )
        .await
        .map_err(DatasourceError::api("list metrics failed"))?;
    Ok(DatasourceResponse::default())
}
