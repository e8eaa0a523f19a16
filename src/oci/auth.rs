//! OCI Authentication
//!
//! Credential providers selected by the datasource `Environment`: API keys
//! from the OCI CLI config file, or instance principals obtained from the
//! instance metadata service and the federation endpoint.

use super::http::{build_http_client, send_signed};
use super::region::{endpoint_url, resolve_region, service_endpoint, EndpointOverrides};
use super::signer::{decode_pem, RsaSigner, SigningKey};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use reqwest::{Client, Method};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Default profile in the OCI config file
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Instance metadata service (v2)
const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/opc/v2";

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Token TTL if the token carries no readable expiry
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(20 * 60);

/// Where the datasource runs, which decides how it authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// API key from the local OCI config file
    Local,
    /// Instance principal of the compute instance running the adapter
    OciInstance,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "OCI Instance" => Some(Self::OciInstance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OciInstance => "OCI Instance",
        }
    }
}

/// Key id plus signing key for one or more requests
#[derive(Clone)]
pub struct Credentials {
    pub key_id: String,
    pub signer: Arc<RsaSigner>,
}

impl Credentials {
    pub fn signing_key(&self) -> SigningKey<'_> {
        SigningKey {
            key_id: &self.key_id,
            signer: &self.signer,
        }
    }
}

/// Source of request-signing credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Credentials valid for the next request
    async fn credentials(&self) -> Result<Credentials>;

    /// Home region of the credentials, used when a request names none
    fn region(&self) -> Option<String>;
}

/// Fixed credentials, e.g. an API key loaded once
#[derive(Clone)]
pub struct StaticProvider {
    credentials: Credentials,
    region: Option<String>,
}

impl StaticProvider {
    pub fn new(key_id: &str, private_key_pem: &str, region: Option<&str>) -> Result<Self> {
        Ok(Self {
            credentials: Credentials {
                key_id: key_id.to_string(),
                signer: Arc::new(RsaSigner::from_pem(private_key_pem)?),
            },
            region: region.map(resolve_region),
        })
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}

// =============================================================================
// Config file (API key)
// =============================================================================

/// One profile of the OCI config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OciProfile {
    pub user: String,
    pub fingerprint: String,
    pub key_file: String,
    pub tenancy: String,
    pub region: Option<String>,
}

impl OciProfile {
    /// Key id in the `tenancy/user/fingerprint` form
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }
}

/// Get the OCI config file location
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("OCI_CONFIG_FILE") {
        return Some(expand_home(&path));
    }
    dirs::home_dir().map(|p| p.join(".oci").join("config"))
}

/// Get the profile name to use
pub fn default_profile() -> String {
    std::env::var("OCI_CONFIG_PROFILE").unwrap_or_else(|_| DEFAULT_PROFILE.to_string())
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Parse `profile` out of OCI config file content.
/// Named profiles inherit missing keys from `DEFAULT`.
pub fn parse_profile(content: &str, profile: &str) -> Result<OciProfile> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
        } else if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let Some(selected) = sections.get(profile) else {
        return Err(anyhow::anyhow!("Profile {} not found in OCI config", profile));
    };
    let defaults = sections.get(DEFAULT_PROFILE);
    let lookup = |key: &str| -> Option<String> {
        selected
            .get(key)
            .or_else(|| defaults.and_then(|d| d.get(key)))
            .filter(|v| !v.is_empty())
            .cloned()
    };
    let required = |key: &str| -> Result<String> {
        lookup(key).with_context(|| format!("Missing {} in OCI config profile {}", key, profile))
    };

    Ok(OciProfile {
        user: required("user")?,
        fingerprint: required("fingerprint")?,
        key_file: required("key_file")?,
        tenancy: required("tenancy")?,
        region: lookup("region"),
    })
}

/// API key credentials read from the OCI CLI config file
pub struct ConfigFileProvider {
    inner: StaticProvider,
}

impl ConfigFileProvider {
    /// Load from `OCI_CONFIG_FILE` / `~/.oci/config` and `OCI_CONFIG_PROFILE`
    pub fn from_default_location() -> Result<Self> {
        let path = default_config_path().context("Cannot determine OCI config file location")?;
        Self::from_file(&path, &default_profile())
    }

    /// Load `profile` from the config file at `path`
    pub fn from_file(path: &Path, profile: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OCI config file {}", path.display()))?;
        let profile = parse_profile(&content, profile)?;

        let mut key_path = expand_home(&profile.key_file);
        if key_path.is_relative() {
            if let Some(dir) = path.parent() {
                key_path = dir.join(key_path);
            }
        }
        let pem = std::fs::read_to_string(&key_path)
            .with_context(|| format!("Failed to read private key {}", key_path.display()))?;

        let inner = StaticProvider::new(&profile.key_id(), &pem, profile.region.as_deref())?;
        tracing::info!("Loaded OCI API key for tenancy {}", profile.tenancy);

        Ok(Self { inner })
    }
}

#[async_trait]
impl CredentialProvider for ConfigFileProvider {
    async fn credentials(&self) -> Result<Credentials> {
        self.inner.credentials().await
    }

    fn region(&self) -> Option<String> {
        self.inner.region()
    }
}

// =============================================================================
// Instance principal
// =============================================================================

#[derive(Clone)]
struct CachedToken {
    credentials: Credentials,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct FederationResponse {
    token: String,
}

/// Instance principal credentials with security token caching
#[derive(Clone)]
pub struct InstancePrincipalProvider {
    http: Client,
    metadata_url: Url,
    auth_endpoint: Url,
    region: String,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl InstancePrincipalProvider {
    /// Discover the instance region and prepare the federation endpoint
    pub async fn new(endpoints: &EndpointOverrides, timeout: Option<Duration>) -> Result<Self> {
        let http = build_http_client(timeout)?;
        let metadata_url = endpoints.metadata.as_deref().unwrap_or(DEFAULT_METADATA_URL);
        let metadata_url = Url::parse(metadata_url).context("Invalid instance metadata URL")?;

        let region = instance_region(&http, &metadata_url)
            .await
            .context("Failed to read instance region. Is this running on an OCI instance?")?;
        let auth_endpoint = service_endpoint("auth", &region, endpoints.auth.as_deref())?;

        tracing::info!("Using instance principal in region {}", region);

        Ok(Self {
            http,
            metadata_url,
            auth_endpoint,
            region,
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Exchange the instance certificate for a security token
    async fn federate(&self) -> Result<CachedToken> {
        let cert_pem = fetch_metadata(&self.http, &self.metadata_url, "/identity/cert.pem").await?;
        let key_pem = fetch_metadata(&self.http, &self.metadata_url, "/identity/key.pem").await?;
        let intermediate_pem =
            fetch_metadata(&self.http, &self.metadata_url, "/identity/intermediate.pem").await?;

        let (_, cert_der) = decode_pem(&cert_pem).context("Invalid instance certificate")?;
        let (_, intermediate_der) =
            decode_pem(&intermediate_pem).context("Invalid intermediate certificate")?;
        let tenancy = tenancy_from_certificate(&cert_der)?;
        let fingerprint = certificate_fingerprint(&cert_der);

        // The token is bound to the instance key rather than a per-session key,
        // so it is only as short-lived as the instance certificate allows.
        let signer = Arc::new(RsaSigner::from_pem(&key_pem)?);
        let body = serde_json::json!({
            "certificate": STANDARD.encode(&cert_der),
            "publicKey": STANDARD.encode(signer.public_key_der()),
            "intermediateCertificates": [STANDARD.encode(&intermediate_der)],
            "purpose": "DEFAULT",
        });

        let key_id = format!("{}/fed-x509/{}", tenancy, fingerprint);
        let key = SigningKey {
            key_id: &key_id,
            signer: &signer,
        };
        let url = endpoint_url(&self.auth_endpoint, "/v1/x509")?;
        let response = send_signed(
            &self.http,
            &key,
            Method::POST,
            url,
            Some(serde_json::to_vec(&body)?),
        )
        .await
        .context("Failed to obtain instance principal token")?;
        let federation: FederationResponse = response
            .json()
            .await
            .context("Failed to parse federation response")?;

        let ttl = token_ttl(&federation.token).unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        tracing::debug!(
            "New instance principal token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(CachedToken {
            credentials: Credentials {
                key_id: format!("ST${}", federation.token),
                signer,
            },
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialProvider for InstancePrincipalProvider {
    async fn credentials(&self) -> Result<Credentials> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.credentials.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let mut cache = self.token_cache.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.credentials.clone());
            }
        }
        let token = self.federate().await?;
        let credentials = token.credentials.clone();
        *cache = Some(token);
        Ok(credentials)
    }

    fn region(&self) -> Option<String> {
        Some(self.region.clone())
    }
}

/// Full region identifier of the instance. The short key is only a fallback
/// for metadata services without `canonicalRegionName`.
async fn instance_region(http: &Client, metadata_url: &Url) -> Result<String> {
    match fetch_metadata(http, metadata_url, "/instance/canonicalRegionName").await {
        Ok(region) if !region.is_empty() => Ok(region.to_lowercase()),
        _ => {
            tracing::warn!("canonicalRegionName unavailable, falling back to the region key");
            let key = fetch_metadata(http, metadata_url, "/instance/region").await?;
            Ok(resolve_region(&key))
        },
    }
}

async fn fetch_metadata(http: &Client, base: &Url, path: &str) -> Result<String> {
    let url = endpoint_url(base, path)?;
    tracing::debug!("GET {}", url);

    let response = http
        .get(url)
        .bearer_auth("Oracle")
        .send()
        .await
        .with_context(|| format!("Failed to query instance metadata {}", path))?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "Instance metadata request {} failed: {}",
            path,
            response.status()
        ));
    }
    let text = response
        .text()
        .await
        .context("Failed to read instance metadata")?;
    Ok(text.trim().to_string())
}

/// Extract the tenancy OCID from the instance certificate subject.
///
/// The marker opens a DER string value whose length byte directly precedes
/// it, in both the short and the one-byte long form.
pub fn tenancy_from_certificate(der: &[u8]) -> Result<String> {
    for marker in [&b"opc-tenant:"[..], &b"opc-identity:"[..]] {
        let Some(start) = der.windows(marker.len()).position(|w| w == marker) else {
            continue;
        };
        let Some(&len) = start.checked_sub(1).and_then(|i| der.get(i)) else {
            continue;
        };
        let end = (start + len as usize).min(der.len());
        let value = der.get(start + marker.len()..end).unwrap_or_default();
        if let Ok(tenancy) = std::str::from_utf8(value) {
            if !tenancy.is_empty() {
                return Ok(tenancy.to_string());
            }
        }
    }
    Err(anyhow::anyhow!("Instance certificate carries no tenancy id"))
}

/// SHA-1 fingerprint of a DER certificate, colon separated
pub fn certificate_fingerprint(der: &[u8]) -> String {
    ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, der)
        .as_ref()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Remaining lifetime of a JWT security token, from its `exp` claim
pub fn token_ttl(token: &str) -> Option<Duration> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    let remaining = exp - chrono::Utc::now().timestamp();
    (remaining > 0).then(|| Duration::from_secs(remaining as u64))
}
