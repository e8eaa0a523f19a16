//! In-memory API fakes shared by the datasource unit tests

use crate::oci::http::Page;
use crate::oci::identity::{Compartment, IdentityApi, RegionInfo, Tenancy};
use crate::oci::monitoring::{
    ListMetricsDetails, Metric, MetricData, MonitoringApi, SummarizeMetricsDataDetails,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn metric(name: &str, namespace: &str, dimensions: &[(&str, &str)]) -> Metric {
    Metric {
        name: name.to_string(),
        namespace: namespace.to_string(),
        resource_group: None,
        compartment_id: "ocid1.compartment.oc1..c".to_string(),
        dimensions: dimensions
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub region: String,
    pub compartment_id: String,
    pub details: ListMetricsDetails,
    pub page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub region: String,
    pub compartment_id: String,
    pub details: SummarizeMetricsDataDetails,
}

#[derive(Default)]
pub struct FakeMonitoring {
    pages: Mutex<VecDeque<Page<Metric>>>,
    failure: Option<String>,
    /// Summarize responses by compartment; a missing compartment fails
    data: HashMap<String, Vec<MetricData>>,
    list_requests: Mutex<Vec<ListRequest>>,
    summarize_requests: Mutex<Vec<SummarizeRequest>>,
}

impl FakeMonitoring {
    pub fn with_pages(pages: Vec<Page<Metric>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Default::default()
        }
    }

    pub fn with_items(items: Vec<Metric>) -> Self {
        Self::with_pages(vec![Page {
            items,
            next_page: None,
        }])
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_data(data: HashMap<String, Vec<MetricData>>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.list_requests.lock().unwrap().clone()
    }

    pub fn summarize_requests(&self) -> Vec<SummarizeRequest> {
        self.summarize_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MonitoringApi for FakeMonitoring {
    async fn list_metrics(
        &self,
        region: &str,
        compartment_id: &str,
        details: &ListMetricsDetails,
        page: Option<&str>,
    ) -> Result<Page<Metric>> {
        self.list_requests.lock().unwrap().push(ListRequest {
            region: region.to_string(),
            compartment_id: compartment_id.to_string(),
            details: details.clone(),
            page: page.map(str::to_string),
        });
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or(Page {
            items: Vec::new(),
            next_page: None,
        }))
    }

    async fn summarize_metrics_data(
        &self,
        region: &str,
        compartment_id: &str,
        details: &SummarizeMetricsDataDetails,
    ) -> Result<Vec<MetricData>> {
        self.summarize_requests.lock().unwrap().push(SummarizeRequest {
            region: region.to_string(),
            compartment_id: compartment_id.to_string(),
            details: details.clone(),
        });
        self.data
            .get(compartment_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("OCI API request failed: 404 Not Found"))
    }
}

pub struct FakeIdentity {
    pub tenancy_name: String,
    pub compartments: Vec<Compartment>,
    pub tenancy_calls: AtomicUsize,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self {
            tenancy_name: "acme".to_string(),
            compartments: Vec::new(),
            tenancy_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeIdentity {
    pub fn with_compartments(compartments: Vec<Compartment>) -> Self {
        Self {
            compartments,
            ..Default::default()
        }
    }

    pub fn tenancy_calls(&self) -> usize {
        self.tenancy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn get_tenancy(&self, _region: &str, tenancy_id: &str) -> Result<Tenancy> {
        self.tenancy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Tenancy {
            id: tenancy_id.to_string(),
            name: self.tenancy_name.clone(),
            description: None,
            home_region_key: Some("PHX".to_string()),
        })
    }

    async fn list_compartments(
        &self,
        _region: &str,
        _compartment_id: &str,
        page: Option<&str>,
    ) -> Result<Page<Compartment>> {
        // Two pages so the cursor walk is exercised
        let mid = self.compartments.len() / 2;
        Ok(match page {
            None => Page {
                items: self.compartments[..mid].to_vec(),
                next_page: Some("second".to_string()),
            },
            Some(_) => Page {
                items: self.compartments[mid..].to_vec(),
                next_page: None,
            },
        })
    }

    async fn list_regions(&self, _region: &str) -> Result<Vec<RegionInfo>> {
        Ok(vec![
            RegionInfo {
                key: "IAD".to_string(),
                name: "us-ashburn-1".to_string(),
            },
            RegionInfo {
                key: "PHX".to_string(),
                name: "us-phoenix-1".to_string(),
            },
        ])
    }
}
