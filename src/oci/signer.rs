//! OCI HTTP request signing
//!
//! Implements the `rsa-sha256` HTTP signature scheme OCI uses for every API
//! call: a signing string is built from a fixed list of headers, signed with
//! the caller's RSA key and sent in the `authorization` header.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use std::fmt;
use url::Url;

/// Headers signed on every request
const GENERIC_HEADERS: &[&str] = &["date", "(request-target)", "host"];

/// Extra headers signed on requests carrying a body
const BODY_HEADERS: &[&str] = &["content-length", "content-type", "x-content-sha256"];

/// DER prefix of the `rsaEncryption` AlgorithmIdentifier
const RSA_ALGORITHM_ID: &[u8] = &[
    0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05, 0x00,
];

/// RSA private key used to sign requests
pub struct RsaSigner {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigner")
            .field("modulus_bits", &(self.key_pair.public().modulus_len() * 8))
            .finish()
    }
}

impl RsaSigner {
    /// Load an unencrypted PKCS#1 or PKCS#8 PEM private key
    pub fn from_pem(pem: &str) -> Result<Self> {
        if pem.contains("Proc-Type: 4,ENCRYPTED") {
            return Err(anyhow::anyhow!("Encrypted private keys are not supported"));
        }
        let (label, der) = decode_pem(pem)?;
        let key_pair = match label.as_str() {
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(&der),
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(&der),
            "ENCRYPTED PRIVATE KEY" => {
                return Err(anyhow::anyhow!("Encrypted private keys are not supported"))
            },
            other => return Err(anyhow::anyhow!("Unsupported PEM block: {}", other)),
        }
        .map_err(|e| anyhow::anyhow!("Invalid RSA private key: {:?}", e))?;

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Sign `data` and return the base64 signature
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, data, &mut signature)
            .map_err(|e| anyhow::anyhow!("Failed to sign request: {:?}", e))?;
        Ok(STANDARD.encode(signature))
    }

    /// Public key as a DER `SubjectPublicKeyInfo`
    pub fn public_key_der(&self) -> Vec<u8> {
        let rsa_public_key = self.key_pair.public().as_ref();

        let mut bit_string = vec![0x00];
        bit_string.extend_from_slice(rsa_public_key);

        let mut body = RSA_ALGORITHM_ID.to_vec();
        body.extend(der_tagged(0x03, &bit_string));
        der_tagged(0x30, &body)
    }
}

fn der_tagged(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

/// Decode the first PEM block of `pem`, returning its label and DER bytes
pub fn decode_pem(pem: &str) -> Result<(String, Vec<u8>)> {
    let mut label = None;
    let mut body = String::new();

    for line in pem.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            label = Some(rest.trim_end_matches('-').to_string());
            continue;
        }
        if line.starts_with("-----END ") {
            break;
        }
        // Skip encapsulated headers such as Proc-Type
        if label.is_some() && !line.contains(':') {
            body.push_str(line);
        }
    }

    let label = label.context("No PEM block found")?;
    let der = STANDARD
        .decode(body.as_bytes())
        .context("Invalid base64 in PEM block")?;
    Ok((label, der))
}

/// Credentials for one signed request
#[derive(Clone)]
pub struct SigningKey<'a> {
    pub key_id: &'a str,
    pub signer: &'a RsaSigner,
}

/// Compute the headers to attach to a request.
///
/// Returns `(name, value)` pairs including `date`, the body headers when a
/// body is present, and `authorization`.
pub fn sign_request(
    key: &SigningKey<'_>,
    method: &str,
    url: &Url,
    body: Option<&[u8]>,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>> {
    let host = match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    };
    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut headers: Vec<(&'static str, String)> = vec![
        ("date", now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
        ("(request-target)", format!("{} {}", method.to_lowercase(), target)),
        ("host", host),
    ];
    let mut signed: Vec<&str> = GENERIC_HEADERS.to_vec();

    if let Some(body) = body {
        let digest = ring::digest::digest(&ring::digest::SHA256, body);
        headers.push(("content-length", body.len().to_string()));
        headers.push(("content-type", "application/json".to_string()));
        headers.push(("x-content-sha256", STANDARD.encode(digest.as_ref())));
        signed.extend_from_slice(BODY_HEADERS);
    }

    let signing_string = headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");
    let signature = key.signer.sign(signing_string.as_bytes())?;

    let authorization = format!(
        "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",\
         headers=\"{}\",signature=\"{}\"",
        key.key_id,
        signed.join(" "),
        signature
    );

    // The request target and host are implied by the request itself
    let mut out: Vec<(&'static str, String)> = headers
        .into_iter()
        .filter(|(name, _)| *name != "(request-target)" && *name != "host")
        .collect();
    out.push(("authorization", authorization));
    Ok(out)
}
