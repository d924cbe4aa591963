//! Application service: reachability checks for hosts and iDRAC interfaces.
//!
//! Ping and certificate retrieval shell out through `CommandRunner`
//! (`ping`, `openssl`); TCP, DNS and HTTPS go through `NetworkProbe`.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::application::ports::{CommandRunner, LocalFs, NetworkProbe};
use crate::domain::network::{
    CertificateInfo, ConnectivityResult, ConnectivityTarget, DEFAULT_NETWORK_TIMEOUT_SECS,
    DEFAULT_PING_COUNT, HTTPS_PORT, IDRAC_OK_STATUSES, IDRAC_PING_COUNT, IdracCheck, TargetKind,
    extract_pem, parse_openssl_x509, render_connectivity_report,
};

/// Network checks bound to a runner, a probe and a per-operation timeout.
pub struct NetworkValidator<'a, R, P> {
    runner: &'a R,
    probe: &'a P,
    timeout: Duration,
}

impl<'a, R: CommandRunner, P: NetworkProbe> NetworkValidator<'a, R, P> {
    #[must_use]
    pub fn new(runner: &'a R, probe: &'a P) -> Self {
        Self {
            runner,
            probe,
            timeout: Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `ping -c count host`; success iff exit 0. Errors and timeouts read
    /// as unreachable.
    pub async fn ping_host(&self, host: &str, count: u32) -> bool {
        let count = count.to_string();
        match self
            .runner
            .run_with_timeout("ping", &["-c", &count, host], self.timeout)
            .await
        {
            Ok(out) if out.status.success() => {
                info!(host, "ping succeeded");
                true
            }
            Ok(_) => {
                warn!(host, "ping failed");
                false
            }
            Err(e) => {
                error!(host, error = %e, "ping error");
                false
            }
        }
    }

    pub async fn check_port_open(&self, host: &str, port: u16) -> bool {
        match self.probe.tcp_connect(host, port, self.timeout).await {
            Ok(open) => {
                if open {
                    info!(host, port, "port open");
                } else {
                    warn!(host, port, "port closed");
                }
                open
            }
            Err(e) => {
                warn!(host, port, error = %e, "port check failed");
                false
            }
        }
    }

    /// Fetch the peer certificate without verifying it.
    ///
    /// # Errors
    ///
    /// Returns an error if `openssl` fails or presents no certificate.
    pub async fn get_ssl_certificate_info(&self, host: &str, port: u16) -> Result<CertificateInfo> {
        let connect = format!("{host}:{port}");
        let handshake = self
            .runner
            .run_with_stdin(
                "openssl",
                &["s_client", "-connect", &connect, "-servername", host, "-showcerts"],
                b"",
                self.timeout,
            )
            .await
            .context("running openssl s_client")?;
        let stdout = String::from_utf8_lossy(&handshake.stdout);
        let pem = extract_pem(&stdout)
            .with_context(|| format!("no certificate presented by {connect}"))?;

        let parsed = self
            .runner
            .run_with_stdin(
                "openssl",
                &[
                    "x509", "-noout", "-subject", "-issuer", "-serial", "-startdate", "-enddate",
                    "-text",
                ],
                pem.as_bytes(),
                self.timeout,
            )
            .await
            .context("running openssl x509")?;
        if !parsed.status.success() {
            anyhow::bail!(
                "openssl x509 failed: {}",
                String::from_utf8_lossy(&parsed.stderr).trim()
            );
        }
        let cert = parse_openssl_x509(&String::from_utf8_lossy(&parsed.stdout), Utc::now())
            .with_context(|| format!("could not parse certificate from {connect}"))?;
        info!(host, port, expired = cert.expired, "retrieved certificate");
        Ok(cert)
    }

    /// Layered iDRAC check: ping, then port 443, then an unverified HTTPS
    /// GET. 200, 401 and 403 count as reachable.
    pub async fn validate_idrac_connection(&self, ip: &str) -> IdracCheck {
        let mut check = IdracCheck {
            host: ip.to_string(),
            ping: false,
            port_open: false,
            http_status: None,
            certificate_expired: None,
            accessible: false,
            failure: None,
        };

        check.ping = self.ping_host(ip, IDRAC_PING_COUNT).await;
        if !check.ping {
            error!(ip, "cannot ping iDRAC");
            check.failure = Some(format!("cannot ping iDRAC at {ip}"));
            return check;
        }

        check.port_open = self.check_port_open(ip, HTTPS_PORT).await;
        if !check.port_open {
            error!(ip, "HTTPS port not accessible");
            check.failure = Some(format!("HTTPS port {HTTPS_PORT} not accessible on {ip}"));
            return check;
        }

        let url = if ip.parse::<IpAddr>().is_ok_and(|a| a.is_ipv6()) {
            format!("https://[{ip}]")
        } else {
            format!("https://{ip}")
        };
        match self.probe.https_get(&url, false, self.timeout).await {
            Ok(resp) if IDRAC_OK_STATUSES.contains(&resp.status) => {
                check.http_status = Some(resp.status);
                check.accessible = true;
                info!(ip, status = resp.status, "iDRAC web interface accessible");
                if let Ok(cert) = self.get_ssl_certificate_info(ip, HTTPS_PORT).await {
                    if cert.expired {
                        warn!(ip, not_after = %cert.not_after, "iDRAC certificate is expired");
                    } else {
                        info!(ip, "iDRAC certificate is valid");
                    }
                    check.certificate_expired = Some(cert.expired);
                }
            }
            Ok(resp) => {
                check.http_status = Some(resp.status);
                error!(ip, status = resp.status, "unexpected HTTP status");
                check.failure = Some(format!("unexpected HTTP status {}", resp.status));
            }
            Err(e) => {
                error!(ip, error = %e, "iDRAC web interface unreachable");
                check.failure = Some(format!("web interface unreachable: {e:#}"));
            }
        }
        check
    }

    async fn probe_target(&self, target: &ConnectivityTarget) -> ConnectivityResult {
        info!(host = %target.host, port = target.port, "testing connectivity");
        let ping = self.ping_host(&target.host, DEFAULT_PING_COUNT).await;
        let port_open = self.check_port_open(&target.host, target.port).await;
        let ssl_cert = match self.get_ssl_certificate_info(&target.host, target.port).await {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!(host = %target.host, error = %e, "no certificate");
                None
            }
        };
        let idrac_accessible = if target.kind == TargetKind::Idrac {
            Some(self.validate_idrac_connection(&target.host).await.accessible)
        } else {
            None
        };
        ConnectivityResult {
            host: target.host.clone(),
            port: target.port,
            ping,
            port_open,
            ssl_cert,
            idrac_accessible,
            timestamp: Utc::now(),
        }
    }

    /// Probe every target concurrently. Results keep the input order.
    pub async fn test_connectivity_suite(
        &self,
        targets: &[ConnectivityTarget],
    ) -> Vec<ConnectivityResult> {
        join_all(targets.iter().map(|t| self.probe_target(t))).await
    }

    /// First resolved address, `None` on failure.
    pub async fn dns_lookup(&self, hostname: &str) -> Option<IpAddr> {
        match self.probe.resolve(hostname).await {
            Ok(addrs) => addrs.into_iter().next(),
            Err(e) => {
                warn!(hostname, error = %e, "DNS lookup failed");
                None
            }
        }
    }
}

/// Render the connectivity report and optionally write it to `output`.
///
/// # Errors
///
/// Returns an error if the report file cannot be written.
pub fn generate_connectivity_report(
    fs: &impl LocalFs,
    results: &[ConnectivityResult],
    output: Option<&Path>,
) -> Result<String> {
    let report = render_connectivity_report(results, Utc::now());
    if let Some(path) = output {
        fs.write_file(path, &report, false)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!(path = %path.display(), "connectivity report written");
    }
    Ok(report)
}
