//! HTTP utilities for signed OCI REST API calls

use super::auth::CredentialProvider;
use super::region::{effective_region, endpoint_url, service_endpoint};
use super::signer::{sign_request, SigningKey};
use anyhow::{Context, Result};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the pagination cursor
pub const NEXT_PAGE_HEADER: &str = "opc-next-page";

/// Header correlating a call with OCI's own logs
pub const REQUEST_ID_HEADER: &str = "opc-request-id";

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Error body returned by OCI services
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// One page of a list call
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<String>,
}

/// Decoded response of a signed call
#[derive(Debug)]
pub struct OciResponse<T> {
    pub next_page: Option<String>,
    pub body: T,
}

/// Build the underlying reqwest client
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        "oci-metrics-datasource/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to create HTTP client")
}

/// Send a signed request and fail on non-success status codes
pub(crate) async fn send_signed(
    client: &Client,
    key: &SigningKey<'_>,
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
) -> Result<Response> {
    tracing::debug!("{} {}", method, url);

    let headers = sign_request(key, method.as_str(), &url, body.as_deref(), chrono::Utc::now())?;

    let mut request = client
        .request(method, url)
        .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().simple().to_string())
        .header("accept", "application/json");
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = request.send().await.context("Failed to send request")?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .context("Failed to read response body")?;
    // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
    tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));

    match serde_json::from_str::<ServiceError>(&body) {
        Ok(err) if !err.code.is_empty() || !err.message.is_empty() => Err(anyhow::anyhow!(
            "OCI API request failed: {} {}: {}",
            status,
            err.code,
            err.message
        )),
        _ => Err(anyhow::anyhow!("OCI API request failed: {}", status)),
    }
}

/// HTTP client wrapper for signed OCI API calls
#[derive(Clone)]
pub struct OciHttpClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl OciHttpClient {
    /// Create a new HTTP client signing with `credentials`
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            credentials,
        })
    }

    /// Region configured on the credential provider, if any
    pub fn default_region(&self) -> Option<String> {
        self.credentials.region()
    }

    /// Build the URL of an API call against a regional service.
    /// `region` falls back to the credential provider's region when empty.
    pub fn service_url(
        &self,
        service: &str,
        template: Option<&str>,
        region: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Url> {
        let region = effective_region(region, self.default_region().as_deref())?;
        let base = service_endpoint(service, &region, template)?;
        let mut url = endpoint_url(&base, path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Make a signed GET request
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<OciResponse<T>> {
        self.send(Method::GET, url, None).await
    }

    /// Make a signed POST request with a JSON body
    pub async fn post<B, T>(&self, url: Url, body: &B) -> Result<OciResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).context("Failed to encode request body")?;
        self.send(Method::POST, url, Some(body)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<OciResponse<T>> {
        let credentials = self.credentials.credentials().await?;
        let key = credentials.signing_key();
        let response = send_signed(&self.client, &key, method, url, body).await?;

        let next_page = response
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string());
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        let body = serde_json::from_str(&text).context("Failed to parse response JSON")?;

        Ok(OciResponse {
            next_page,
            body,
        })
    }
}
