//! Tests for `application::services::network`.

#![allow(clippy::expect_used)]

use std::path::Path;
use std::time::Duration;

use timeshift_cli::application::services::network::{
    NetworkValidator, generate_connectivity_report,
};
use timeshift_cli::domain::network::{ConnectivityTarget, TargetKind};

use crate::helpers::{err_output, ok_output};
use crate::mocks::{MemFs, MockProbe, ScriptedRunner};

const S_CLIENT: &[u8] = b"CONNECTED(00000003)\n\
-----BEGIN CERTIFICATE-----\nMIIBexpired\n-----END CERTIFICATE-----\n";

const EXPIRED_X509: &[u8] = b"subject=CN = idrac-7h2k, O = Dell Inc.\n\
issuer=CN = idrac-7h2k, O = Dell Inc.\n\
serial=5E1A\n\
notBefore=Mar  1 00:00:00 2018 GMT\n\
notAfter=Mar  1 00:00:00 2023 GMT\n\
Certificate:\n    Data:\n        Version: 3 (0x2)\n";

fn open(host: &str, port: u16) -> MockProbe {
    MockProbe {
        open_ports: vec![(host.to_string(), port)],
        ..MockProbe::default()
    }
}

#[tokio::test]
async fn ping_uses_count_and_reads_exit_status() {
    let runner = ScriptedRunner::new().on("ping -c 3 10.0.0.9", err_output(1, b"100% packet loss"));
    let probe = MockProbe::default();
    let validator = NetworkValidator::new(&runner, &probe);

    assert!(validator.ping_host("10.0.0.8", 3).await);
    assert!(!validator.ping_host("10.0.0.9", 3).await);
    assert!(runner.called("ping -c 3 10.0.0.8"));
}

#[tokio::test]
async fn ping_errors_read_as_unreachable() {
    let runner = ScriptedRunner::new().timing_out("ping");
    let probe = MockProbe::default();
    assert!(!NetworkValidator::new(&runner, &probe).ping_host("10.0.0.8", 1).await);
}

#[tokio::test]
async fn idrac_check_stops_at_the_first_failing_layer() {
    let runner = ScriptedRunner::new().on("ping", err_output(1, b""));
    let probe = open("10.0.0.5", 443);

    let check = NetworkValidator::new(&runner, &probe)
        .validate_idrac_connection("10.0.0.5")
        .await;

    assert!(!check.ping);
    assert!(!check.port_open);
    assert!(!check.accessible);
    assert!(check.failure.expect("failure").contains("cannot ping"));
    assert!(!runner.called("openssl"));
}

#[tokio::test]
async fn idrac_check_reports_closed_https_port() {
    let runner = ScriptedRunner::new();
    let probe = MockProbe::default();

    let check = NetworkValidator::new(&runner, &probe)
        .validate_idrac_connection("10.0.0.5")
        .await;

    assert!(check.ping);
    assert!(!check.port_open);
    assert_eq!(check.http_status, None);
    assert!(check.failure.expect("failure").contains("443"));
}

#[tokio::test]
async fn idrac_login_page_behind_auth_counts_as_accessible() {
    let runner = ScriptedRunner::new()
        .on("openssl s_client", ok_output(S_CLIENT))
        .on("openssl x509", ok_output(EXPIRED_X509));
    let probe = MockProbe {
        http_status: Some(401),
        ..open("10.0.0.5", 443)
    };

    let check = NetworkValidator::new(&runner, &probe)
        .validate_idrac_connection("10.0.0.5")
        .await;

    assert!(check.accessible);
    assert_eq!(check.http_status, Some(401));
    assert_eq!(check.certificate_expired, Some(true));
    assert!(check.failure.is_none());
}

#[tokio::test]
async fn idrac_unexpected_status_is_not_accessible() {
    let runner = ScriptedRunner::new();
    let probe = MockProbe {
        http_status: Some(503),
        ..open("10.0.0.5", 443)
    };

    let check = NetworkValidator::new(&runner, &probe)
        .validate_idrac_connection("10.0.0.5")
        .await;

    assert!(!check.accessible);
    assert_eq!(check.http_status, Some(503));
    assert!(check.failure.expect("failure").contains("503"));
}

#[tokio::test]
async fn certificate_info_is_parsed_from_openssl() {
    let runner = ScriptedRunner::new()
        .on("openssl s_client", ok_output(S_CLIENT))
        .on("openssl x509", ok_output(EXPIRED_X509));
    let probe = MockProbe::default();

    let cert = NetworkValidator::new(&runner, &probe)
        .get_ssl_certificate_info("idrac.lab", 443)
        .await
        .expect("certificate");

    assert!(cert.expired);
    assert_eq!(cert.serial_number, "5E1A");
    assert!(runner.called("openssl s_client -connect idrac.lab:443 -servername idrac.lab"));
}

#[tokio::test]
async fn certificate_lookup_uses_the_validator_timeout() {
    let runner = ScriptedRunner::new()
        .on("openssl s_client", ok_output(S_CLIENT))
        .on("openssl x509", ok_output(EXPIRED_X509));
    let probe = MockProbe::default();

    NetworkValidator::new(&runner, &probe)
        .get_ssl_certificate_info("idrac.lab", 443)
        .await
        .expect("certificate");
    NetworkValidator::new(&runner, &probe)
        .with_timeout(Duration::from_secs(7))
        .get_ssl_certificate_info("idrac.lab", 443)
        .await
        .expect("certificate");

    assert_eq!(
        runner.stdin_timeouts(),
        vec![
            Duration::from_secs(10),
            Duration::from_secs(10),
            Duration::from_secs(7),
            Duration::from_secs(7),
        ]
    );
}

#[tokio::test]
async fn hanging_openssl_is_reported_as_a_timeout() {
    let runner = ScriptedRunner::new().timing_out("openssl");
    let probe = MockProbe::default();

    let err = NetworkValidator::new(&runner, &probe)
        .with_timeout(Duration::from_secs(2))
        .get_ssl_certificate_info("idrac.lab", 443)
        .await
        .expect_err("timed out");

    assert!(format!("{err:#}").contains("timed out"));
    assert_eq!(runner.stdin_timeouts(), vec![Duration::from_secs(2)]);
    assert!(!runner.called("openssl x509"));
}

#[tokio::test]
async fn missing_certificate_is_an_error() {
    let runner = ScriptedRunner::new().on("openssl s_client", ok_output(b"CONNECTED\nno peer certificate"));
    let probe = MockProbe::default();

    let err = NetworkValidator::new(&runner, &probe)
        .get_ssl_certificate_info("idrac.lab", 443)
        .await
        .expect_err("no certificate");
    assert!(format!("{err:#}").contains("no certificate presented"));
}

#[tokio::test]
async fn suite_keeps_input_order_and_only_checks_idrac_targets_for_access() {
    let runner = ScriptedRunner::new();
    let probe = open("pve.lab", 8006);
    let targets = vec![
        ConnectivityTarget::parse("pve.lab:8006", TargetKind::Generic).expect("target"),
        ConnectivityTarget::parse("10.0.0.5", TargetKind::Idrac).expect("target"),
    ];

    let results = NetworkValidator::new(&runner, &probe)
        .test_connectivity_suite(&targets)
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].host, "pve.lab");
    assert!(results[0].port_open);
    assert_eq!(results[0].idrac_accessible, None);
    assert_eq!(results[1].host, "10.0.0.5");
    assert_eq!(results[1].idrac_accessible, Some(false));
}

#[tokio::test]
async fn dns_lookup_returns_first_address_or_none() {
    let runner = ScriptedRunner::new();
    let probe = MockProbe::default();
    let found = NetworkValidator::new(&runner, &probe).dns_lookup("pve.lab").await;
    assert_eq!(found, Some("10.0.0.7".parse().expect("ip")));

    let failing = MockProbe {
        resolves: false,
        ..MockProbe::default()
    };
    assert!(NetworkValidator::new(&runner, &failing).dns_lookup("nowhere.invalid").await.is_none());
}

#[tokio::test]
async fn report_is_written_when_a_path_is_given() {
    let runner = ScriptedRunner::new();
    let probe = MockProbe::default();
    let targets = vec![ConnectivityTarget::parse("10.0.0.5", TargetKind::Generic).expect("target")];
    let results = NetworkValidator::new(&runner, &probe)
        .test_connectivity_suite(&targets)
        .await;
    let fs = MemFs::default();

    let report = generate_connectivity_report(&fs, &results, Some(Path::new("/tmp/report.txt")))
        .expect("report");

    assert!(report.starts_with("Network Connectivity Report"));
    assert!(report.contains("Target: 10.0.0.5"));
    assert!(report.contains("SSL Certificate: Not Available"));
    assert_eq!(fs.contents(Path::new("/tmp/report.txt")), Some(report));
}
