//! Connectivity targets, certificate parsing and the plain-text report.
//!
//! Pure functions only; probing happens in `application::services::network`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Default timeout for pings, TCP connects and HTTPS probes.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PING_COUNT: u32 = 4;
pub const IDRAC_PING_COUNT: u32 = 2;
pub const HTTPS_PORT: u16 = 443;

/// HTTP statuses that prove the iDRAC web UI is serving, logged in or not.
pub const IDRAC_OK_STATUSES: &[u16] = &[200, 401, 403];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Generic,
    Idrac,
}

/// A host to probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectivityTarget {
    pub host: String,
    pub port: u16,
    pub kind: TargetKind,
}

impl ConnectivityTarget {
    /// Parse `host` or `host:port`. Bracketed IPv6 (`[fe80::1]:8443`) is
    /// accepted; a bare IPv6 address is taken as host only.
    #[must_use]
    pub fn parse(spec: &str, kind: TargetKind) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        let (host, port) = if let Some(rest) = spec.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().ok()?,
                None if tail.is_empty() => HTTPS_PORT,
                None => return None,
            };
            (host.to_string(), port)
        } else if spec.matches(':').count() == 1 {
            let (host, port) = spec.split_once(':')?;
            (host.to_string(), port.parse().ok()?)
        } else {
            (spec.to_string(), HTTPS_PORT)
        };
        (!host.is_empty() && port != 0).then_some(Self { host, port, kind })
    }
}

/// Fields of an X.509 certificate that matter for reachability decisions.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    /// X.509 version as printed by openssl (`3` for v3).
    pub version: Option<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub expired: bool,
    pub days_remaining: i64,
}

/// Parse an openssl date such as `Feb 15 12:00:00 2036 GMT`.
#[must_use]
pub fn parse_openssl_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%b %d %H:%M:%S %Y GMT")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%b  %d %H:%M:%S %Y GMT"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%b %e %H:%M:%S %Y GMT"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the output of
/// `openssl x509 -noout -subject -issuer -serial -startdate -enddate -text`.
///
/// Only the `key=value` header lines and the `Version:` line are used;
/// the rest of `-text` output is ignored.
#[must_use]
pub fn parse_openssl_x509(output: &str, now: DateTime<Utc>) -> Option<CertificateInfo> {
    let mut subject = None;
    let mut issuer = None;
    let mut serial = None;
    let mut version = None;
    let mut not_before = None;
    let mut not_after = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("Version:") {
            version = v.split_whitespace().next().and_then(|n| n.parse().ok());
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "subject" => subject = Some(value),
            "issuer" => issuer = Some(value),
            "serial" => serial = Some(value),
            "notBefore" => not_before = parse_openssl_date(&value),
            "notAfter" => not_after = parse_openssl_date(&value),
            _ => {}
        }
    }

    let not_after = not_after?;
    Some(CertificateInfo {
        subject: subject.unwrap_or_default(),
        issuer: issuer.unwrap_or_default(),
        serial_number: serial.unwrap_or_default(),
        version,
        not_before: not_before?,
        not_after,
        expired: not_after < now,
        days_remaining: (not_after - now).num_days(),
    })
}

/// First PEM certificate block in `openssl s_client` output.
#[must_use]
pub fn extract_pem(output: &str) -> Option<&str> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";
    let start = output.find(BEGIN)?;
    let end = output[start..].find(END)? + start + END.len();
    Some(&output[start..end])
}

/// Outcome of the layered iDRAC reachability check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdracCheck {
    pub host: String,
    pub ping: bool,
    pub port_open: bool,
    pub http_status: Option<u16>,
    pub certificate_expired: Option<bool>,
    pub accessible: bool,
    /// First failing layer, when not accessible.
    pub failure: Option<String>,
}

/// Results for one target of a connectivity suite.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResult {
    pub host: String,
    pub port: u16,
    pub ping: bool,
    pub port_open: bool,
    pub ssl_cert: Option<CertificateInfo>,
    pub idrac_accessible: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

/// Render the plain-text connectivity report.
#[must_use]
pub fn render_connectivity_report(results: &[ConnectivityResult], generated: DateTime<Utc>) -> String {
    let mut lines = vec![
        "Network Connectivity Report".to_string(),
        "=".repeat(40),
        format!("Generated: {}", generated.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    for r in results {
        lines.push(format!("Target: {}", r.host));
        lines.push("-".repeat(20));
        lines.push(format!("  Ping: {}", mark(r.ping)));
        lines.push(format!("  Port Open: {}", mark(r.port_open)));
        match &r.ssl_cert {
            Some(cert) => {
                let status = if cert.expired { "EXPIRED" } else { "VALID" };
                lines.push(format!("  SSL Certificate: {status}"));
                lines.push(format!(
                    "    Expires: {}",
                    cert.not_after.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            None => lines.push("  SSL Certificate: Not Available".to_string()),
        }
        if let Some(ok) = r.idrac_accessible {
            lines.push(format!("  iDRAC Access: {}", mark(ok)));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
