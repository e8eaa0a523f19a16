//! Datasource adapter
//!
//! [`OciDatasource`] receives host requests, builds the API clients on first
//! use and routes each request to a lookup responder or the metrics query.

pub mod compartments;
pub mod lookups;
pub mod metrics;
pub mod model;
pub mod pagination;
pub mod series;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::{DatasourceError, Result};
use crate::oci::auth::Environment;
use crate::oci::client::{ApiClients, ClientFactory};
use compartments::{fetch_compartments, CompartmentCache, DEFAULT_CACHE_REFRESH};
use model::{DatasourceRequest, DatasourceResponse, QueryModel};
use pagination::MAX_METRIC_PAGES;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::Instrument;

/// Query types understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Compartments,
    Dimensions,
    Namespaces,
    ResourceGroups,
    Regions,
    Search,
    Test,
    /// Anything else runs as a metrics query
    Metrics,
}

impl QueryType {
    pub fn parse(s: &str) -> Self {
        match s {
            "compartments" => Self::Compartments,
            "dimensions" => Self::Dimensions,
            "namespaces" => Self::Namespaces,
            "resourcegroups" => Self::ResourceGroups,
            "regions" => Self::Regions,
            "search" => Self::Search,
            "test" => Self::Test,
            _ => Self::Metrics,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compartments => "compartments",
            Self::Dimensions => "dimensions",
            Self::Namespaces => "namespaces",
            Self::ResourceGroups => "resourcegroups",
            Self::Regions => "regions",
            Self::Search => "search",
            Self::Test => "test",
            Self::Metrics => "query",
        }
    }

    fn is_lookup(&self) -> bool {
        !matches!(self, Self::Metrics)
    }
}

/// Tunables of a datasource instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceOptions {
    pub cache_refresh: Duration,
    pub max_metric_pages: usize,
}

impl Default for DatasourceOptions {
    fn default() -> Self {
        Self {
            cache_refresh: DEFAULT_CACHE_REFRESH,
            max_metric_pages: MAX_METRIC_PAGES,
        }
    }
}

/// One datasource instance, shared across concurrent host requests
pub struct OciDatasource {
    factory: Arc<dyn ClientFactory>,
    clients: OnceCell<ApiClients>,
    compartments: CompartmentCache,
    options: DatasourceOptions,
}

impl OciDatasource {
    pub fn new(factory: Arc<dyn ClientFactory>, options: DatasourceOptions) -> Self {
        Self {
            factory,
            clients: OnceCell::new(),
            compartments: CompartmentCache::new(options.cache_refresh),
            options,
        }
    }

    /// Handle one host request
    pub async fn query(&self, request: &DatasourceRequest) -> Result<DatasourceResponse> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("query", %request_id);
        self.route(request).instrument(span).await
    }

    async fn route(&self, request: &DatasourceRequest) -> Result<DatasourceResponse> {
        let first = request.queries.first().ok_or(DatasourceError::EmptyRequest)?;
        let model = first.model()?;
        let query_type = QueryType::parse(&model.query_type);
        tracing::info!(
            "{} request with {} queries",
            query_type.as_str(),
            request.queries.len()
        );

        if query_type.is_lookup() && request.queries.len() != 1 {
            return Err(DatasourceError::MultipleLookupQueries {
                query_type: query_type.as_str().to_string(),
                count: request.queries.len(),
            });
        }

        let clients = self.clients(&model.environment).await?;
        let monitoring = clients.monitoring.as_ref();
        let max_pages = self.options.max_metric_pages;

        match query_type {
            QueryType::Compartments => self.compartments_response(clients, &model).await,
            QueryType::Dimensions => lookups::dimensions(monitoring, &model, max_pages).await,
            QueryType::Namespaces => lookups::namespaces(monitoring, &model, max_pages).await,
            QueryType::ResourceGroups => {
                lookups::resource_groups(monitoring, &model, max_pages).await
            },
            QueryType::Regions => lookups::regions(clients.identity.as_ref(), &model).await,
            QueryType::Search => lookups::search(monitoring, &model, max_pages).await,
            QueryType::Test => lookups::test_connection(monitoring, &model).await,
            QueryType::Metrics => Ok(DatasourceResponse {
                results: metrics::query_metrics(monitoring, request).await,
            }),
        }
    }

    /// API clients, built once per instance. A failed build is retried on
    /// the next request.
    async fn clients(&self, environment: &str) -> Result<&ApiClients> {
        self.clients
            .get_or_try_init(|| async {
                let environment = Environment::parse(environment)
                    .ok_or_else(|| DatasourceError::UnknownEnvironment(environment.to_string()))?;
                self.factory.build(environment).await.map_err(|e| {
                    tracing::error!("Client bootstrap failed: {:#}", e);
                    DatasourceError::Config(e)
                })
            })
            .await
    }

    async fn compartments_response(
        &self,
        clients: &ApiClients,
        model: &QueryModel,
    ) -> Result<DatasourceResponse> {
        let identity = clients.identity.as_ref();
        let names = self
            .compartments
            .get_or_refresh(&model.tenancy_ocid, || {
                fetch_compartments(identity, &model.region, &model.tenancy_ocid)
            })
            .await
            .map_err(DatasourceError::api("compartments lookup"))?;
        Ok(lookups::compartments(&names))
    }
}
