//! Tests for `application::services::templates`.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use timeshift_cli::application::services::templates::{
    TemplateEngine, format_for_path, validate_config_file,
};
use timeshift_cli::domain::error::TemplateError;
use timeshift_cli::domain::template::{ConfigFormat, ConfigTemplate, validate_content};

use crate::mocks::{DiskTemplates, MemFs};

fn engine() -> TemplateEngine {
    TemplateEngine::with_builtins(&DiskTemplates).expect("builtin bodies present")
}

fn vars(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[test]
fn builtins_are_listed_with_their_variable_counts() {
    let listing = engine().list_templates();
    let names: Vec<&str> = listing.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["proxmox", "docker-compose", "environment", "kubernetes"]);
    assert!(listing.iter().all(|t| t.variables > 0));
}

#[test]
fn every_builtin_renders_to_valid_content_with_defaults() {
    let engine = engine();
    for summary in engine.list_templates() {
        let rendered = engine
            .render_template(&summary.name, &Map::new(), true)
            .expect("renders with defaults");
        validate_content(&rendered, summary.format)
            .unwrap_or_else(|e| panic!("{} rendered invalid {:?}: {e}", summary.name, summary.format));
        assert!(!rendered.contains("{{"), "{} left a placeholder", summary.name);
    }
}

#[test]
fn caller_variables_override_defaults() {
    let rendered = engine()
        .render_template("proxmox", &vars(json!({"vm_cores": 8, "proxmox_node": "pve-02"})), true)
        .expect("render");
    let doc: Value = serde_json::from_str(&rendered).expect("json");
    assert_eq!(doc["vm_defaults"]["cores"], 8);
    assert_eq!(doc["proxmox"]["node"], "pve-02");
    assert_eq!(doc["metadata"]["generated_by"], "Timeshift Config Template Engine");
}

#[test]
fn quotes_in_secrets_stay_valid_json() {
    let secret = r#"s3"cr\et"#;
    let rendered = engine()
        .render_template("proxmox", &vars(json!({"proxmox_token_secret": secret})), true)
        .expect("render");
    let doc: Value = serde_json::from_str(&rendered).expect("json");
    assert_eq!(doc["proxmox"]["token_secret"], secret);
}

#[test]
fn unparseable_output_is_refused_before_it_is_written() {
    let engine = engine();
    let fs = MemFs::default();
    let bad = vars(json!({"verify_ssl": "yes"}));

    engine
        .render_to_file(&fs, "proxmox", &bad, Path::new("/srv/raw.json"), false)
        .expect("unvalidated output is written as rendered");
    assert!(fs.contents(Path::new("/srv/raw.json")).is_some());

    let err = engine
        .render_to_file(&fs, "proxmox", &bad, Path::new("/srv/checked.json"), true)
        .expect_err("invalid output");
    assert!(matches!(
        err.downcast_ref::<TemplateError>(),
        Some(TemplateError::InvalidOutput { .. })
    ));
    assert!(fs.contents(Path::new("/srv/checked.json")).is_none());
}

#[test]
fn range_rules_apply_only_when_validating() {
    let engine = engine();
    let too_many = vars(json!({"vm_cores": 500}));

    let err = engine
        .render_template("proxmox", &too_many, true)
        .expect_err("out of range");
    assert!(matches!(
        err,
        TemplateError::OutOfRange { ref variable, min: 1, max: 128, .. } if variable == "vm_cores"
    ));

    assert!(engine.render_template("proxmox", &too_many, false).is_ok());
}

#[test]
fn unknown_template_and_undefined_placeholder() {
    let mut engine = engine();
    assert!(matches!(
        engine.render_template("nginx", &Map::new(), true),
        Err(TemplateError::NotFound(_))
    ));

    engine.register(ConfigTemplate {
        name: "motd".to_string(),
        description: "Login banner".to_string(),
        format: ConfigFormat::Env,
        body: "BANNER={{ banner }}\n".to_string(),
        defaults: Map::new(),
        validators: Vec::new(),
        sensitive: false,
    });
    let err = engine
        .render_template("motd", &Map::new(), true)
        .expect_err("undefined");
    assert!(matches!(err, TemplateError::UndefinedVariable { ref variable, .. } if variable == "banner"));

    let rendered = engine
        .render_template("motd", &vars(json!({"banner": "maintenance"})), true)
        .expect("render");
    assert_eq!(rendered, "BANNER=maintenance\n");
}

#[test]
fn sensitive_templates_are_written_private() {
    let engine = engine();
    let fs = MemFs::default();

    engine
        .render_to_file(&fs, "environment", &Map::new(), Path::new("/srv/app/.env"), true)
        .expect("write");
    engine
        .render_to_file(&fs, "docker-compose", &Map::new(), Path::new("/srv/app/compose.yaml"), true)
        .expect("write");

    assert_eq!(fs.mode(Path::new("/srv/app/.env")), Some(0o600));
    assert_eq!(fs.mode(Path::new("/srv/app/compose.yaml")), Some(0o644));
    let env = fs.contents(Path::new("/srv/app/.env")).expect("written");
    assert!(env.contains("PROXMOX_HOST=192.168.1.100"));
}

#[test]
fn config_set_writes_files_and_manifest_and_skips_unknown_names() {
    let fs = MemFs::default();
    let names = vec![
        "proxmox".to_string(),
        "nginx".to_string(),
        "kubernetes".to_string(),
    ];

    let set = engine()
        .create_config_set(&fs, "lab", &names, &Map::new(), Path::new("/srv/configs"))
        .expect("set");

    assert_eq!(set.directory, PathBuf::from("/srv/configs/lab"));
    assert_eq!(
        set.files,
        vec![
            PathBuf::from("/srv/configs/lab/proxmox.json"),
            PathBuf::from("/srv/configs/lab/kubernetes.yaml"),
        ]
    );
    assert_eq!(set.skipped, vec!["nginx"]);

    let manifest: Value =
        serde_json::from_str(&fs.contents(&set.manifest).expect("manifest")).expect("json");
    assert_eq!(manifest["name"], "lab");
    assert_eq!(manifest["templates"], json!(["proxmox", "kubernetes"]));
    assert_eq!(manifest["files"][0]["path"], "proxmox.json");
    assert_eq!(manifest["files"][0]["sha256"].as_str().map(str::len), Some(64));
}

#[test]
fn format_is_inferred_from_the_file_name() {
    assert_eq!(format_for_path(Path::new("app/.env")), Some(ConfigFormat::Env));
    assert_eq!(format_for_path(Path::new(".env.production")), Some(ConfigFormat::Env));
    assert_eq!(format_for_path(Path::new("compose.yml")), Some(ConfigFormat::Yaml));
    assert_eq!(format_for_path(Path::new("settings.ini")), Some(ConfigFormat::Ini));
    assert_eq!(format_for_path(Path::new("README")), None);
}

#[test]
fn config_files_are_checked_by_format() {
    let fs = MemFs::default()
        .with_file("/cfg/good.json", "{\"a\": 1}", 0o644)
        .with_file("/cfg/bad.json", "{\"a\": ", 0o644)
        .with_file("/cfg/bad.env", "JUST_A_WORD\n", 0o644)
        .with_file("/cfg/settings", "[main]\nkey = value\n", 0o644);

    assert!(validate_config_file(&fs, Path::new("/cfg/good.json"), None).is_ok());

    let err = validate_config_file(&fs, Path::new("/cfg/bad.json"), None).expect_err("bad json");
    assert!(err.to_string().contains("invalid JSON"));

    let err = validate_config_file(&fs, Path::new("/cfg/bad.env"), None).expect_err("bad env");
    assert!(err.to_string().contains("line 1"));

    assert!(validate_config_file(&fs, Path::new("/cfg/settings"), None).is_err());
    assert!(validate_config_file(&fs, Path::new("/cfg/settings"), Some(ConfigFormat::Ini)).is_ok());
}
