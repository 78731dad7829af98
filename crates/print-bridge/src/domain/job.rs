//! Print job requests and their validation.
//!
//! A [`PrintJobRequest`] is what the client sent; a [`ResolvedPrintJob`] is
//! what the printer transport consumes.  [`validate`] is the only way to get
//! from one to the other: it substitutes the configured defaults, checks the
//! IP shape, and decodes the base64 payload.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::config::PrinterDefaults;

/// Standard alphabet, padding optional.  Browsers and `btoa()` always pad,
/// but hand-built payloads frequently do not.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body of a `print` message, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobRequest {
    /// Target printer IP.  Absent, `null` and `""` all mean "use the default".
    #[serde(default)]
    pub printer_ip: Option<String>,

    /// Target printer port.  Absent, `null` and `0` all mean "use the default".
    #[serde(default)]
    pub printer_port: Option<u16>,

    /// Base64-encoded printer-ready bytes.
    #[serde(default)]
    pub print_data: Option<String>,
}

/// A validated job, ready for exactly one delivery attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedPrintJob {
    /// Correlates the log lines of one job.
    pub job_id: Uuid,
    /// Dotted-quad printer IP (shape-checked only).
    pub ip: String,
    pub port: u16,
    /// Decoded payload; may be empty.
    pub payload: Vec<u8>,
}

impl ResolvedPrintJob {
    /// `ip:port` for log lines and connect errors.
    pub fn target(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

// Payloads can be megabytes of printer language; only log their length.
impl fmt::Debug for ResolvedPrintJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPrintJob")
            .field("job_id", &self.job_id)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Reasons a print request is rejected before any connection is opened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither the request nor the configuration names a printer IP.
    #[error("printer IP is required")]
    MissingIp,

    /// The IP is not four dot-separated groups of 1–3 digits.
    #[error("invalid IP address format: {0:?}")]
    InvalidIpFormat(String),

    /// `printData` is missing or is not base64.
    #[error("malformed print data: {0}")]
    MalformedPayload(String),
}

/// Resolves defaults and validates a print request.
///
/// Checks run in a fixed order: IP presence, IP shape, payload decoding.
///
/// # Errors
///
/// - [`ValidationError::MissingIp`] when no IP can be resolved.
/// - [`ValidationError::InvalidIpFormat`] when the IP is not a dotted quad.
/// - [`ValidationError::MalformedPayload`] when `printData` is absent or
///   cannot be decoded.
///
/// # Example
///
/// ```rust
/// use print_bridge::domain::config::PrinterDefaults;
/// use print_bridge::domain::job::{validate, PrintJobRequest};
///
/// let request = PrintJobRequest {
///     printer_ip: Some("10.0.0.7".to_string()),
///     printer_port: None,
///     print_data: Some("SGVsbG8=".to_string()),
/// };
/// let job = validate(&request, &PrinterDefaults::default()).unwrap();
/// assert_eq!(job.port, 9100);
/// assert_eq!(job.payload, b"Hello");
/// ```
pub fn validate(
    request: &PrintJobRequest,
    defaults: &PrinterDefaults,
) -> Result<ResolvedPrintJob, ValidationError> {
    let ip = non_empty(request.printer_ip.as_deref())
        .or_else(|| non_empty(defaults.ip.as_deref()))
        .ok_or(ValidationError::MissingIp)?;

    if !is_dotted_quad(ip) {
        return Err(ValidationError::InvalidIpFormat(ip.to_string()));
    }

    let port = match request.printer_port {
        Some(port) if port != 0 => port,
        _ => defaults.port,
    };

    let encoded = request
        .print_data
        .as_deref()
        .ok_or_else(|| ValidationError::MalformedPayload("printData is missing".to_string()))?;
    let payload = decode_print_data(encoded)?;

    Ok(ResolvedPrintJob {
        job_id: Uuid::new_v4(),
        ip: ip.to_string(),
        port,
        payload,
    })
}

/// Returns `true` for exactly four dot-separated groups of 1–3 ASCII digits.
///
/// No octet range check is made: `999.999.999.999` is accepted.
pub fn is_dotted_quad(ip: &str) -> bool {
    let mut groups = 0;
    for group in ip.split('.') {
        groups += 1;
        if groups > 4 || group.is_empty() || group.len() > 3 {
            return false;
        }
        if !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    groups == 4
}

/// Decodes `printData`, ignoring embedded ASCII whitespace (line-wrapped
/// base64 is common when payloads are pasted from files).
///
/// The URL-safe digits `-` and `_` are read as `+` and `/`, so either
/// alphabet (or a mix of both) decodes to the same bytes.
fn decode_print_data(encoded: &str) -> Result<Vec<u8>, ValidationError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| ValidationError::MalformedPayload(e.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
