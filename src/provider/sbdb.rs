//! JPL Small-Body Database (SBDB) cross-reference lookup.
//!
//! SBDB answers a name query with the object's canonical full name and its
//! SPK-ID. The SPK-ID namespace only partially overlaps with what Horizons
//! accepts, so callers must run the identifier through the guard.

use super::{
    CrossReference, CrossReferenceLookup, HttpConfig, build_http_client, is_throttle_status,
    transport_error,
};
use crate::models::Identifier;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

const PROVIDER: &str = "sbdb";

/// Default SBDB API endpoint.
pub const DEFAULT_SBDB_URL: &str = "https://ssd-api.jpl.nasa.gov/sbdb.api";

/// SBDB client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbdbConfig {
    /// API endpoint.
    pub endpoint: String,
    /// HTTP timeouts.
    pub http: HttpConfig,
}

impl Default for SbdbConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SBDB_URL.to_string(),
            http: HttpConfig {
                timeout_ms: 10_000,
                connect_timeout_ms: 5_000,
            },
        }
    }
}

impl SbdbConfig {
    /// Applies `SKYCASCADE_SBDB_URL`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_SBDB_URL") {
            if !v.trim().is_empty() {
                self.endpoint = v;
            }
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct SbdbResponse {
    #[serde(default)]
    object: Option<SbdbObject>,
}

#[derive(Debug, Deserialize)]
struct SbdbObject {
    #[serde(default)]
    spkid: Option<Value>,
    #[serde(default)]
    fullname: Option<String>,
}

/// Blocking SBDB client.
pub struct SbdbClient {
    config: SbdbConfig,
    client: reqwest::blocking::Client,
}

impl SbdbClient {
    /// Creates a client.
    #[must_use]
    pub fn new(config: SbdbConfig) -> Self {
        let client = build_http_client(config.http);
        Self { config, client }
    }
}

impl CrossReferenceLookup for SbdbClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn lookup(&self, query: &str) -> Result<Option<CrossReference>> {
        let span = tracing::info_span!("sbdb.lookup", query = query);
        let _enter = span.enter();

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("sstr", query), ("full-prec", "0")])
            .send()
            .map_err(|e| transport_error(PROVIDER, "sbdb_request", &e))?;

        let status = response.status();
        if is_throttle_status(status) {
            return Err(Error::RateLimited {
                provider: PROVIDER,
                cause: format!("HTTP {status}"),
            });
        }
        // 300: several objects match; 404: nothing matches.
        if status == reqwest::StatusCode::MULTIPLE_CHOICES
            || status == reqwest::StatusCode::NOT_FOUND
        {
            tracing::debug!(status = %status, "SBDB found no unique match");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(provider = PROVIDER, status = %status, body = %body, "SBDB returned error status");
            return Err(Error::operation("sbdb_request", format!("HTTP {status}")));
        }

        let body = response
            .text()
            .map_err(|e| transport_error(PROVIDER, "sbdb_body", &e))?;
        parse_lookup(&body)
    }
}

/// Parses an SBDB response body.
pub(crate) fn parse_lookup(body: &str) -> Result<Option<CrossReference>> {
    let parsed: SbdbResponse = serde_json::from_str(body)
        .map_err(|e| Error::operation("sbdb_decode", format!("invalid JSON: {e}")))?;
    let Some(object) = parsed.object else {
        return Ok(None);
    };
    let spkid = match object.spkid {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    if spkid.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(CrossReference {
        canonical_full_name: object.fullname.unwrap_or_default().trim().to_string(),
        internal_identifier: Identifier::new(spkid),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let body = r#"{"object":{"spkid":"20000433","fullname":"433 Eros (A898 PA)","kind":"an"},"signature":{"version":"1.3"}}"#;
        let xref = parse_lookup(body).unwrap().unwrap();
        assert_eq!(xref.canonical_full_name, "433 Eros (A898 PA)");
        assert_eq!(xref.internal_identifier.as_str(), "20000433");
    }

    #[test]
    fn test_parse_numeric_spkid() {
        let body = r#"{"object":{"spkid":1003227,"fullname":"C/2024 G3 (ATLAS)"}}"#;
        let xref = parse_lookup(body).unwrap().unwrap();
        assert_eq!(xref.internal_identifier.as_str(), "1003227");
    }

    #[test]
    fn test_missing_object_is_none() {
        let body = r#"{"message":"specified object was not found"}"#;
        assert!(parse_lookup(body).unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_lookup("<html>").is_err());
    }
}
