use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to the host for a whole request
#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("broken environment: {0:#}")]
    Config(anyhow::Error),

    #[error("unknown environment type: {0:?}")]
    UnknownEnvironment(String),

    #[error("invalid query model for {ref_id}: {source}")]
    InvalidModel {
        ref_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request carries no queries")]
    EmptyRequest,

    #[error("{query_type} lookup expects exactly one query, got {count}")]
    MultipleLookupQueries { query_type: String, count: usize },

    #[error("{context}: {source:#}")]
    Api {
        context: String,
        source: anyhow::Error,
    },
}

impl DatasourceError {
    /// Wrap an OCI call failure with what was being attempted
    pub fn api(context: impl Into<String>) -> impl FnOnce(anyhow::Error) -> Self {
        let context = context.into();
        move |source| Self::Api { context, source }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Api { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownEnvironment(_)
            | Self::InvalidModel { .. }
            | Self::EmptyRequest
            | Self::MultipleLookupQueries { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for DatasourceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DatasourceError>;
