//! OCI API interaction module
//!
//! This module provides the core functionality for talking to Oracle Cloud
//! Infrastructure REST APIs: credential providers, request signing, the
//! signed HTTP client and typed Monitoring and Identity clients.
//!
//! # Module Structure
//!
//! - [`auth`] - credential providers (config file, instance principal)
//! - [`signer`] - OCI HTTP signature scheme
//! - [`http`] - signed HTTP client for REST API calls
//! - [`region`] - region key resolution and service endpoints
//! - [`monitoring`] - Monitoring API (list metrics, summarize metrics data)
//! - [`identity`] - Identity API (tenancy, compartments, regions)
//! - [`client`] - builds both API clients for an environment
//!
//! # Example
//!
//! ```ignore
//! use crate::oci::client::{ClientFactory, OciClientFactory};
//! use crate::oci::auth::Environment;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let clients = OciClientFactory::default().build(Environment::Local).await?;
//!     let regions = clients.identity.list_regions("us-phoenix-1").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod identity;
pub mod monitoring;
pub mod region;
pub mod signer;
