//! JPL Horizons API client.
//!
//! Requests a geocentric observer ephemeris at daily steps in CSV form and
//! parses the rows between `$$SOE` and `$$EOE`. Comet designations are sent
//! as small-body searches with closest-apparition selection so periodic
//! comets do not come back as an ambiguous list of apparitions.

use super::{EphemerisProvider, HttpConfig, build_http_client, is_throttle_status, transport_error};
use crate::executor::FetchRequest;
use crate::models::{Identifier, Sample, Section};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

const PROVIDER: &str = "horizons";

/// Default Horizons API endpoint.
pub const DEFAULT_HORIZONS_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";

/// Result-text fragments Horizons uses to reject an identifier.
const REJECTION_MARKERS: &[&str] = &[
    "No matches found",
    "Cannot interpret",
    "Multiple major-bodies match",
    "Matching small-bodies",
    "No ephemeris for target",
    "Unknown target",
];

/// Horizons client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizonsConfig {
    /// API endpoint.
    pub endpoint: String,
    /// Observer center code (`500` = geocentric).
    pub center: String,
    /// HTTP timeouts.
    pub http: HttpConfig,
}

impl Default for HorizonsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_HORIZONS_URL.to_string(),
            center: "500".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl HorizonsConfig {
    /// Applies `SKYCASCADE_HORIZONS_URL`, `SKYCASCADE_HORIZONS_CENTER` and the
    /// shared HTTP overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SKYCASCADE_HORIZONS_URL") {
            if !v.trim().is_empty() {
                self.endpoint = v;
            }
        }
        if let Ok(v) = std::env::var("SKYCASCADE_HORIZONS_CENTER") {
            if !v.trim().is_empty() {
                self.center = v;
            }
        }
        self.http = self.http.with_env_overrides();
        self
    }
}

#[derive(Debug, Deserialize)]
struct HorizonsResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking Horizons client.
pub struct HorizonsClient {
    config: HorizonsConfig,
    client: reqwest::blocking::Client,
}

impl HorizonsClient {
    /// Creates a client.
    #[must_use]
    pub fn new(config: HorizonsConfig) -> Self {
        let client = build_http_client(config.http);
        Self { config, client }
    }

    fn query_params(&self, request: &FetchRequest) -> Vec<(&'static str, String)> {
        let start = request.span.start();
        let stop = request.span.end_exclusive();
        vec![
            ("format", "json".to_string()),
            (
                "COMMAND",
                format!("'{}'", command_for(&request.identifier, request.section)),
            ),
            ("OBJ_DATA", "NO".to_string()),
            ("MAKE_EPHEM", "YES".to_string()),
            ("EPHEM_TYPE", "OBSERVER".to_string()),
            ("CENTER", format!("'{}'", self.config.center)),
            ("START_TIME", format!("'{start}'")),
            ("STOP_TIME", format!("'{stop}'")),
            ("STEP_SIZE", "'1 d'".to_string()),
            ("QUANTITIES", "'1,9'".to_string()),
            ("ANG_FORMAT", "DEG".to_string()),
            ("CSV_FORMAT", "YES".to_string()),
        ]
    }
}

impl EphemerisProvider for HorizonsClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn ephemerides(&self, request: &FetchRequest) -> Result<Vec<Sample>> {
        let span = tracing::info_span!(
            "horizons.ephemerides",
            identifier = %request.identifier,
            section = %request.section,
            start = %request.span.start(),
            days = request.span.days(),
        );
        let _enter = span.enter();

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&self.query_params(request))
            .send()
            .map_err(|e| transport_error(PROVIDER, "horizons_request", &e))?;

        let status = response.status();
        if is_throttle_status(status) {
            return Err(Error::RateLimited {
                provider: PROVIDER,
                cause: format!("HTTP {status}"),
            });
        }

        let body = response
            .text()
            .map_err(|e| transport_error(PROVIDER, "horizons_body", &e))?;
        let parsed: HorizonsResponse = serde_json::from_str(&body).map_err(|e| {
            Error::operation(
                "horizons_decode",
                format!("HTTP {status}: invalid JSON: {e}"),
            )
        })?;

        if let Some(error) = parsed.error {
            return Err(classify_error_text(&request.identifier, &error, status));
        }
        let text = parsed
            .result
            .ok_or_else(|| Error::operation("horizons_decode", "response has no result field"))?;

        let mut samples = parse_ephemeris(request.identifier.as_str(), &text)?;
        samples.retain(|s| request.span.contains(s.date));
        tracing::debug!(rows = samples.len(), "Parsed Horizons ephemeris");
        Ok(samples)
    }
}

/// Builds the `COMMAND` value for an identifier.
pub(crate) fn command_for(identifier: &Identifier, section: Section) -> String {
    match section {
        Section::Comet if identifier.numeric().is_none() => {
            format!("{}; CAP;", identifier.core())
        },
        _ => identifier.as_str().to_string(),
    }
}

fn classify_error_text(identifier: &Identifier, text: &str, status: reqwest::StatusCode) -> Error {
    if let Some(marker) = find_rejection(text) {
        return Error::ObjectNotFound {
            identifier: identifier.to_string(),
            cause: marker,
        };
    }
    if status.is_client_error() {
        return Error::ObjectNotFound {
            identifier: identifier.to_string(),
            cause: first_line(text),
        };
    }
    Error::operation("horizons_request", format!("HTTP {status}: {}", first_line(text)))
}

fn find_rejection(text: &str) -> Option<String> {
    text.lines()
        .find(|line| REJECTION_MARKERS.iter().any(|m| line.contains(m)))
        .map(|line| line.trim().to_string())
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Parses the `result` text of a Horizons CSV observer ephemeris.
///
/// # Errors
///
/// Returns [`Error::ObjectNotFound`] when the text is a rejection and
/// [`Error::OperationFailed`] when it has no parsable rows.
pub fn parse_ephemeris(identifier: &str, text: &str) -> Result<Vec<Sample>> {
    let Some(soe) = text.find("$$SOE") else {
        if let Some(marker) = find_rejection(text) {
            return Err(Error::ObjectNotFound {
                identifier: identifier.to_string(),
                cause: marker,
            });
        }
        return Err(Error::operation(
            "horizons_parse",
            format!("no $$SOE marker for {identifier}"),
        ));
    };
    let body_start = soe + "$$SOE".len();
    let body_end = text[body_start..]
        .find("$$EOE")
        .map_or(text.len(), |i| body_start + i);

    let header = text[..soe]
        .lines()
        .rev()
        .find(|l| l.contains("Date__(UT)"))
        .ok_or_else(|| Error::operation("horizons_parse", "missing column header"))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let ra_idx = columns
        .iter()
        .position(|c| c.starts_with("R.A."))
        .ok_or_else(|| Error::operation("horizons_parse", "missing R.A. column"))?;
    let dec_idx = columns
        .iter()
        .position(|c| c.starts_with("DEC"))
        .ok_or_else(|| Error::operation("horizons_parse", "missing DEC column"))?;
    let mag_idx = columns.iter().position(|c| *c == "T-mag" || *c == "APmag");

    let mut samples = Vec::new();
    for line in text[body_start..body_end].lines() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= dec_idx || fields[0].is_empty() {
            continue;
        }
        let date = parse_row_date(fields[0]).ok_or_else(|| {
            Error::operation("horizons_parse", format!("bad date '{}'", fields[0]))
        })?;
        let ra_deg = parse_float(fields[ra_idx], "R.A.")?;
        let dec_deg = parse_float(fields[dec_idx], "DEC")?;
        let magnitude = mag_idx
            .and_then(|i| fields.get(i))
            .and_then(|v| v.parse::<f64>().ok());
        samples.push(Sample {
            date,
            ra_deg,
            dec_deg,
            magnitude,
        });
    }

    if samples.is_empty() {
        return Err(Error::operation(
            "horizons_parse",
            format!("no ephemeris rows for {identifier}"),
        ));
    }
    Ok(samples)
}

fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(raw, "%Y-%b-%d %H:%M")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%b-%d"))
        .ok()
}

fn parse_float(raw: &str, column: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::operation("horizons_parse", format!("bad {column} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EROS: &str = "\
*******************************************************************************
Target body name: 433 Eros (A898 PA)              {source: JPL#659}
*******************************************************************************
 Date__(UT)__HR:MN, , , R.A.___(ICRF), DEC____(ICRF),  APmag, S-brt,
**************************************************************************
$$SOE
 2026-Mar-05 00:00, , , 123.45678, -12.34567,  11.20,  5.10,
 2026-Mar-06 00:00,*, , 123.98765, -12.10000,  11.18,  5.09,
$$EOE
**************************************************************************
";

    const COMET: &str = "\
 Date__(UT)__HR:MN, , , R.A.___(ICRF), DEC____(ICRF),  T-mag, N-mag,
$$SOE
 2026-Mar-05 00:00, , , 10.5, 20.25, n.a., n.a.,
$$EOE
";

    #[test]
    fn test_parse_asteroid_rows() {
        let samples = parse_ephemeris("433;", EROS).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        assert!((samples[0].ra_deg - 123.456_78).abs() < 1e-9);
        assert!((samples[1].dec_deg + 12.1).abs() < 1e-9);
        assert_eq!(samples[0].magnitude, Some(11.2));
    }

    #[test]
    fn test_parse_missing_magnitude() {
        let samples = parse_ephemeris("C/2024 G3", COMET).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].magnitude, None);
    }

    #[test]
    fn test_rejection_text_is_not_found() {
        let text = "Horizons> No matches found.\n  Use ID# to make unique selection.";
        let err = parse_ephemeris("Nope", text).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));

        let text = "  Matching small-bodies:\n    Record #  Epoch-yr  Primary Desig\n";
        let err = parse_ephemeris("3", text).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }

    #[test]
    fn test_unexpected_text_is_operation_failure() {
        let err = parse_ephemeris("x", "garbage").unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_comet_command_uses_closest_apparition() {
        assert_eq!(
            command_for(&Identifier::new("29P"), Section::Comet),
            "29P; CAP;"
        );
        assert_eq!(
            command_for(&Identifier::new("90000031"), Section::Comet),
            "90000031"
        );
        assert_eq!(command_for(&Identifier::new("3;"), Section::Asteroid), "3;");
    }
}
