//! HTTP surface
//!
//! Exposes the adapter to the host as JSON over HTTP:
//! `POST /query` runs a datasource request, `GET /health` answers liveness.

use crate::datasource::model::{DatasourceRequest, DatasourceResponse};
use crate::datasource::OciDatasource;
use crate::error::Result;
use anyhow::Context;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(datasource: Arc<OciDatasource>) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/health", get(health))
        .with_state(datasource)
}

async fn query(
    State(datasource): State<Arc<OciDatasource>>,
    Json(request): Json<DatasourceRequest>,
) -> Result<Json<DatasourceResponse>> {
    let response = datasource.query(&request).await?;
    Ok(Json(response))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serve on an already bound listener until the process stops
pub async fn serve_on(listener: TcpListener, datasource: Arc<OciDatasource>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Datasource listening on {}", addr);
    axum::serve(listener, router(datasource))
        .await
        .context("Server error")
}

pub async fn serve(listen: &str, datasource: Arc<OciDatasource>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to address {}", listen))?;
    serve_on(listener, datasource).await
}
