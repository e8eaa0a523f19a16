//! OCI Identity API
//!
//! Tenancy lookup, deep compartment listing and the region list.

use super::http::{OciHttpClient, Page};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "/20160918";

/// Lifecycle state of a usable compartment
pub const LIFECYCLE_ACTIVE: &str = "ACTIVE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tenancy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub home_region_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Compartment {
    pub id: String,
    /// Parent compartment
    pub compartment_id: String,
    pub name: String,
    #[serde(default)]
    pub lifecycle_state: String,
}

impl Compartment {
    pub fn is_active(&self) -> bool {
        self.lifecycle_state == LIFECYCLE_ACTIVE
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionInfo {
    pub key: String,
    pub name: String,
}

/// Identity operations used by the datasource
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn get_tenancy(&self, region: &str, tenancy_id: &str) -> Result<Tenancy>;

    /// One page of every compartment under `compartment_id`, at any depth
    async fn list_compartments(
        &self,
        region: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> Result<Page<Compartment>>;

    async fn list_regions(&self, region: &str) -> Result<Vec<RegionInfo>>;
}

/// REST client for the identity service
#[derive(Clone)]
pub struct IdentityClient {
    http: OciHttpClient,
    endpoint: Option<String>,
}

impl IdentityClient {
    /// `endpoint` overrides the identity base URL (may contain `{region}`)
    pub fn new(http: OciHttpClient, endpoint: Option<String>) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn get_tenancy(&self, region: &str, tenancy_id: &str) -> Result<Tenancy> {
        let url = self.http.service_url(
            "identity",
            self.endpoint.as_deref(),
            region,
            &format!("{}/tenancies/{}", API_VERSION, urlencoding::encode(tenancy_id)),
            &[],
        )?;
        Ok(self.http.get(url).await?.body)
    }

    async fn list_compartments(
        &self,
        region: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> Result<Page<Compartment>> {
        let mut query = vec![
            ("compartmentId", compartment_id),
            ("accessLevel", "ANY"),
            ("compartmentIdInSubtree", "true"),
        ];
        if let Some(page) = page {
            query.push(("page", page));
        }
        let url = self.http.service_url(
            "identity",
            self.endpoint.as_deref(),
            region,
            &format!("{}/compartments", API_VERSION),
            &query,
        )?;

        let response = self.http.get::<Vec<Compartment>>(url).await?;
        Ok(Page {
            items: response.body,
            next_page: response.next_page,
        })
    }

    async fn list_regions(&self, region: &str) -> Result<Vec<RegionInfo>> {
        let url = self.http.service_url(
            "identity",
            self.endpoint.as_deref(),
            region,
            &format!("{}/regions", API_VERSION),
            &[],
        )?;
        Ok(self.http.get(url).await?.body)
    }
}
