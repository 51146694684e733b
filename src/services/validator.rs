//! Input Validation
//!
//! Shape check for the company URL entered by the operator. The
//! orchestrator trusts this result and does not re-validate.

use serde::Serialize;
use url::Url;

/// Result of validating a raw URL string
#[derive(Debug, Clone, Serialize)]
pub struct UrlValidation {
    /// Whether the input is an acceptable company URL
    pub ok: bool,
    /// Normalized form, present when `ok`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_url: Option<String>,
    /// Human-readable rejection reason, present when not `ok`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UrlValidation {
    fn accept(normalized: String) -> Self {
        Self {
            ok: true,
            normalized_url: Some(normalized),
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            normalized_url: None,
            reason: Some(reason.into()),
        }
    }
}

/// Validate and normalize a raw URL.
///
/// A missing scheme is tolerated and defaults to https. Only http and
/// https are accepted, and the host must look like a domain (at least
/// one dot, no spaces).
pub fn validate_url(raw: &str) -> UrlValidation {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UrlValidation::reject("URL is empty");
    }
    if trimmed.contains(char::is_whitespace) {
        return UrlValidation::reject("URL contains whitespace");
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = match Url::parse(&candidate) {
        Ok(parsed) => parsed,
        Err(e) => return UrlValidation::reject(format!("not a valid URL: {}", e)),
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return UrlValidation::reject(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    match parsed.host_str() {
        Some(host) if host.contains('.') => UrlValidation::accept(parsed.to_string()),
        Some(_) => UrlValidation::reject("host is not a domain name"),
        None => UrlValidation::reject("URL has no host"),
    }
}
