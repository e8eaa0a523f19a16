//! OCI regions and service endpoints

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Second-level domain of the commercial realm
pub const REALM_DOMAIN: &str = "oraclecloud.com";

/// Short region keys accepted in place of a region identifier
const REGION_KEYS: &[(&str, &str)] = &[
    ("ams", "eu-amsterdam-1"),
    ("arn", "eu-stockholm-1"),
    ("auh", "me-abudhabi-1"),
    ("beg", "eu-jovanovac-1"),
    ("bog", "sa-bogota-1"),
    ("bom", "ap-mumbai-1"),
    ("cdg", "eu-paris-1"),
    ("cwl", "uk-cardiff-1"),
    ("dxb", "me-dubai-1"),
    ("fra", "eu-frankfurt-1"),
    ("gru", "sa-saopaulo-1"),
    ("hyd", "ap-hyderabad-1"),
    ("iad", "us-ashburn-1"),
    ("icn", "ap-seoul-1"),
    ("jed", "me-jeddah-1"),
    ("jnb", "af-johannesburg-1"),
    ("kix", "ap-osaka-1"),
    ("lhr", "uk-london-1"),
    ("lin", "eu-milan-1"),
    ("mad", "eu-madrid-1"),
    ("mel", "ap-melbourne-1"),
    ("mrs", "eu-marseille-1"),
    ("mty", "mx-monterrey-1"),
    ("mtz", "il-jerusalem-1"),
    ("nrt", "ap-tokyo-1"),
    ("ord", "us-chicago-1"),
    ("phx", "us-phoenix-1"),
    ("qro", "mx-queretaro-1"),
    ("ruh", "me-riyadh-1"),
    ("scl", "sa-santiago-1"),
    ("sin", "ap-singapore-1"),
    ("sjc", "us-sanjose-1"),
    ("syd", "ap-sydney-1"),
    ("vap", "sa-valparaiso-1"),
    ("vcp", "sa-vinhedo-1"),
    ("yny", "ap-chuncheon-1"),
    ("yul", "ca-montreal-1"),
    ("yyz", "ca-toronto-1"),
    ("zrh", "eu-zurich-1"),
];

/// Resolve a region key or identifier to a region identifier.
/// Unknown values are passed through lowercased, so new regions keep working.
pub fn resolve_region(region: &str) -> String {
    let region = region.trim().to_lowercase();
    REGION_KEYS
        .iter()
        .find(|(key, _)| *key == region)
        .map(|(_, id)| id.to_string())
        .unwrap_or(region)
}

/// Base URL overrides for OCI services.
///
/// A value may contain a `{region}` placeholder. Without an override the
/// public commercial-realm endpoint is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointOverrides {
    #[serde(default)]
    pub telemetry: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
}

/// Build the base URL of a regional OCI service
pub fn service_endpoint(service: &str, region: &str, template: Option<&str>) -> Result<Url> {
    let region = resolve_region(region);
    let raw = match template {
        Some(template) => template.replace("{region}", &region),
        None => format!("https://{}.{}.{}", service, region, REALM_DOMAIN),
    };
    Url::parse(&raw).with_context(|| format!("Invalid {} endpoint: {}", service, raw))
}

/// Append an API path to a service base URL, keeping any base path prefix
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&raw).with_context(|| format!("Invalid API URL: {}", raw))
}

/// Pick the region for a call: the requested one, or the provider default
pub fn effective_region(requested: &str, fallback: Option<&str>) -> Result<String> {
    if !requested.trim().is_empty() {
        return Ok(resolve_region(requested));
    }
    fallback
        .filter(|r| !r.trim().is_empty())
        .map(resolve_region)
        .context("No region in request and no default region configured")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_region_keys() {
        assert_eq!(resolve_region("phx"), "us-phoenix-1");
        assert_eq!(resolve_region("IAD"), "us-ashburn-1");
        assert_eq!(resolve_region("eu-frankfurt-1"), "eu-frankfurt-1");
        assert_eq!(resolve_region("mty"), "mx-monterrey-1");
        assert_eq!(resolve_region("bog"), "sa-bogota-1");
        assert_eq!(resolve_region(" us-new-region-9 "), "us-new-region-9");
    }

    #[test]
    fn test_service_endpoint_default_and_override() {
        let url = service_endpoint("telemetry", "phx", None).unwrap();
        assert_eq!(url.as_str(), "https://telemetry.us-phoenix-1.oraclecloud.com/");

        let template = Some("http://127.0.0.1:8080/{region}");
        let url = service_endpoint("identity", "fra", template).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/eu-frankfurt-1");
    }

    #[test]
    fn test_endpoint_url_keeps_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/mock/").unwrap();
        let url = endpoint_url(&base, "/20160918/regions").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/mock/20160918/regions");
    }

    #[test]
    fn test_effective_region() {
        assert_eq!(effective_region("syd", Some("phx")).unwrap(), "ap-sydney-1");
        assert_eq!(effective_region("", Some("phx")).unwrap(), "us-phoenix-1");
        assert!(effective_region("", None).is_err());
        assert!(effective_region(" ", Some("")).is_err());
    }
}
