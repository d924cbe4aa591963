//! Proxmox VE REST client: implements the `ProxmoxApi` port over `reqwest`.
//!
//! Every request carries the `PVEAPIToken` header. Responses are unwrapped
//! from the `{"data": ...}` envelope; non-2xx replies become
//! `ProxmoxError::Http`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::application::ports::ProxmoxApi;
use crate::domain::config::ProxmoxConfig;
use crate::domain::error::ProxmoxError;
use crate::domain::proxmox::{VmStatus, VmSummary, api_token_header, base_url, qemu_path};

pub struct ProxmoxClient {
    client: Client,
    base_url: String,
    auth: String,
    node: String,
}

impl ProxmoxClient {
    /// Build a client for the configured node.
    ///
    /// # Errors
    ///
    /// Returns `ProxmoxError::MissingToken` when no API token is configured,
    /// or an error if the HTTP client cannot be built.
    pub fn new(config: &ProxmoxConfig) -> Result<Self> {
        Self::with_base_url(config, base_url(config))
    }

    /// Client against an explicit API root (used by tests).
    ///
    /// # Errors
    ///
    /// Same as [`ProxmoxClient::new`].
    pub fn with_base_url(config: &ProxmoxConfig, base_url: impl Into<String>) -> Result<Self> {
        let auth = api_token_header(config)?;
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("building Proxmox HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            node: config.node.clone(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, path, "proxmox request");
        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(reqwest::header::AUTHORIZATION, &self.auth);
        if let Some(form) = form {
            req = req.form(form);
        }
        let response = req
            .send()
            .await
            .with_context(|| format!("{method} {path}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxmoxError::Http {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            }
            .into());
        }
        let mut envelope: Value = response
            .json()
            .await
            .with_context(|| format!("decoding response of {path}"))?;
        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| ProxmoxError::MissingData(path.to_string()))?;
        serde_json::from_value(data).with_context(|| format!("unexpected payload from {path}"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T> {
        self.request(Method::POST, path, Some(form)).await
    }
}

impl ProxmoxApi for ProxmoxClient {
    async fn version(&self) -> Result<Value> {
        self.get("/version").await
    }

    async fn list_vms(&self) -> Result<Vec<VmSummary>> {
        let mut vms: Vec<VmSummary> = self.get(&format!("/nodes/{}/qemu", self.node)).await?;
        vms.sort_by_key(|vm| vm.vmid);
        Ok(vms)
    }

    async fn vm_status(&self, vmid: u32) -> Result<VmStatus> {
        self.get(&qemu_path(&self.node, vmid, "status/current")).await
    }

    async fn start_vm(&self, vmid: u32) -> Result<String> {
        self.post(&qemu_path(&self.node, vmid, "status/start"), &[]).await
    }

    async fn stop_vm(&self, vmid: u32) -> Result<String> {
        self.post(&qemu_path(&self.node, vmid, "status/stop"), &[]).await
    }

    async fn exec_command(&self, vmid: u32, command: &str) -> Result<Value> {
        self.post(
            &qemu_path(&self.node, vmid, "agent/exec"),
            &[("command", command.to_string())],
        )
        .await
    }

    async fn create_snapshot(&self, vmid: u32, name: &str, description: &str) -> Result<String> {
        self.post(
            &qemu_path(&self.node, vmid, "snapshot"),
            &[
                ("snapname", name.to_string()),
                ("description", description.to_string()),
            ],
        )
        .await
    }
}
