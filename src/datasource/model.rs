//! Host wire shapes
//!
//! Requests arrive as a time range plus a list of queries whose `modelJson`
//! carries the datasource-specific query model. Responses carry one result
//! per query (or per lookup) holding tables or time series.

use crate::error::{DatasourceError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Resource group selector value meaning "no resource group"
pub const NO_RESOURCE_GROUP: &str = "NoResourceGroup";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    #[serde(default)]
    pub from_raw: String,
    #[serde(default)]
    pub to_raw: String,
    #[serde(default)]
    pub from_epoch_ms: i64,
    #[serde(default)]
    pub to_epoch_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub ref_id: String,
    #[serde(default)]
    pub model_json: String,
    #[serde(default)]
    pub interval_ms: i64,
    #[serde(default)]
    pub max_data_points: i64,
}

impl Query {
    /// Decode the query model. An empty model decodes to all-empty fields.
    pub fn model(&self) -> Result<QueryModel> {
        if self.model_json.trim().is_empty() {
            return Ok(QueryModel::default());
        }
        serde_json::from_str(&self.model_json).map_err(|source| DatasourceError::InvalidModel {
            ref_id: self.ref_id.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceRequest {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub queries: Vec<Query>,
}

/// Query model sent by the frontend.
/// Field names are accepted in camelCase, PascalCase and lowercase.
/// Missing and `null` fields decode to empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryModel {
    #[serde(
        rename = "queryType",
        alias = "QueryType",
        alias = "querytype",
        deserialize_with = "null_as_empty"
    )]
    pub query_type: String,
    #[serde(alias = "Compartment", deserialize_with = "null_as_empty")]
    pub compartment: String,
    #[serde(alias = "Region", deserialize_with = "null_as_empty")]
    pub region: String,
    #[serde(
        rename = "tenancyOCID",
        alias = "TenancyOCID",
        alias = "tenancyOcid",
        alias = "tenancyocid",
        deserialize_with = "null_as_empty"
    )]
    pub tenancy_ocid: String,
    #[serde(alias = "Environment", deserialize_with = "null_as_empty")]
    pub environment: String,
    #[serde(alias = "Query", deserialize_with = "null_as_empty")]
    pub query: String,
    #[serde(alias = "Resolution", deserialize_with = "null_as_empty")]
    pub resolution: String,
    #[serde(alias = "Namespace", deserialize_with = "null_as_empty")]
    pub namespace: String,
    #[serde(
        rename = "resourceGroup",
        alias = "ResourceGroup",
        alias = "resourcegroup",
        deserialize_with = "null_as_empty"
    )]
    pub resource_group: String,
    #[serde(alias = "Metric", deserialize_with = "null_as_empty")]
    pub metric: String,
}

impl QueryModel {
    /// Resource group to filter on, `None` for the sentinel or an empty value
    pub fn resource_group_filter(&self) -> Option<String> {
        non_empty(&self.resource_group).filter(|rg| rg != NO_RESOURCE_GROUP)
    }

    pub fn namespace_filter(&self) -> Option<String> {
        non_empty(&self.namespace)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceResponse {
    pub results: Vec<QueryResult>,
}

impl DatasourceResponse {
    /// Response holding a single lookup table
    pub fn table(ref_id: &str, table: Table) -> Self {
        Self {
            results: vec![QueryResult {
                ref_id: ref_id.to_string(),
                tables: vec![table],
                ..Default::default()
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RowValueKind {
    #[default]
    #[serde(rename = "TYPE_STRING")]
    String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowValue {
    pub kind: RowValueKind,
    pub string_value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRow {
    pub values: Vec<RowValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Table of `columns` string columns, each named `text`
    pub fn text(columns: usize) -> Self {
        Self {
            columns: (0..columns)
                .map(|_| TableColumn {
                    name: "text".to_string(),
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<S: AsRef<str>>(&mut self, values: &[S]) {
        self.rows.push(TableRow {
            values: values
                .iter()
                .map(|v| RowValue {
                    kind: RowValueKind::String,
                    string_value: v.as_ref().to_string(),
                })
                .collect(),
        });
    }

    /// First column of every row
    pub fn first_column(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.values.first())
            .map(|v| v.string_value.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub value: f64,
}
