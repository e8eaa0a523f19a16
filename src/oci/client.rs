//! OCI Clients
//!
//! Builds the Monitoring and Identity clients for an environment, combining
//! a credential provider with the signed HTTP client.

use super::auth::{ConfigFileProvider, CredentialProvider, Environment, InstancePrincipalProvider};
use super::http::OciHttpClient;
use super::identity::{IdentityApi, IdentityClient};
use super::monitoring::{MonitoringApi, MonitoringClient};
use super::region::EndpointOverrides;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// The two API clients a datasource instance works with
#[derive(Clone)]
pub struct ApiClients {
    pub monitoring: Arc<dyn MonitoringApi>,
    pub identity: Arc<dyn IdentityApi>,
}

/// Constructs API clients once the environment is known
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, environment: Environment) -> Result<ApiClients>;
}

/// Factory for the real REST clients
#[derive(Debug, Clone, Default)]
pub struct OciClientFactory {
    pub endpoints: EndpointOverrides,
    pub timeout: Option<Duration>,
}

impl OciClientFactory {
    pub fn new(endpoints: EndpointOverrides, timeout: Option<Duration>) -> Self {
        Self { endpoints, timeout }
    }

    /// Build clients signing with an already resolved credential provider
    pub fn with_provider(&self, provider: Arc<dyn CredentialProvider>) -> Result<ApiClients> {
        let http = OciHttpClient::new(provider, self.timeout)?;
        Ok(ApiClients {
            monitoring: Arc::new(MonitoringClient::new(
                http.clone(),
                self.endpoints.telemetry.clone(),
            )),
            identity: Arc::new(IdentityClient::new(http, self.endpoints.identity.clone())),
        })
    }
}

#[async_trait]
impl ClientFactory for OciClientFactory {
    async fn build(&self, environment: Environment) -> Result<ApiClients> {
        tracing::info!("Initializing OCI clients for environment {}", environment.as_str());

        let provider: Arc<dyn CredentialProvider> = match environment {
            Environment::Local => Arc::new(
                ConfigFileProvider::from_default_location()
                    .context("Failed to load OCI config file credentials")?,
            ),
            Environment::OciInstance => Arc::new(
                InstancePrincipalProvider::new(&self.endpoints, self.timeout)
                    .await
                    .context("Failed to initialize instance principal credentials")?,
            ),
        };

        self.with_provider(provider)
    }
}
