//! OCI Metrics datasource adapter
//!
//! Translates dashboard host query requests into OCI Monitoring and Identity
//! API calls and reshapes the answers into host tables and time series.
//!
//! # Module Structure
//!
//! - [`oci`] - signed REST clients for the OCI Monitoring and Identity APIs
//! - [`datasource`] - query routing, lookups, compartment cache and series reshaping
//! - [`config`] - persistent adapter settings
//! - [`server`] - HTTP surface exposing the adapter to the host
//! - [`error`] - error type surfaced to the host

pub mod config;
pub mod datasource;
pub mod error;
pub mod oci;
pub mod server;

pub use datasource::OciDatasource;
pub use error::{DatasourceError, Result};
