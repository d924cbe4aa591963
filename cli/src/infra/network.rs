//! Network infrastructure: implements `NetworkProbe` with tokio sockets and
//! `reqwest`.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpStream;

use crate::application::ports::{HttpProbe, NetworkProbe};

/// Production implementation that performs real network checks.
pub struct TokioNetworkProbe;

impl NetworkProbe for TokioNetworkProbe {
    async fn tcp_connect(&self, host: &str, port: u16, timeout: Duration) -> Result<bool> {
        let connect = TcpStream::connect((host, port));
        Ok(matches!(tokio::time::timeout(timeout, connect).await, Ok(Ok(_))))
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .with_context(|| format!("cannot resolve {host}"))?;
        let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        ips.dedup();
        Ok(ips)
    }

    async fn https_get(&self, url: &str, verify_tls: bool, timeout: Duration) -> Result<HttpProbe> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        let started = Instant::now();
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Ok(HttpProbe {
            status: response.status().as_u16(),
            elapsed: started.elapsed(),
        })
    }
}
