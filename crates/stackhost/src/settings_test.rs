// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
fn test_settings_from_vars() {
    let settings = RunSettings::from_vars([
        ("STACKHOST_PROJECT", "web"),
        ("STACKHOST_STACK", "dev"),
        ("STACKHOST_DRY_RUN", "true"),
        ("STACKHOST_PARALLELISM", "4"),
        ("STACKHOST_CONFIG", r#"{"web:size": "large", "aws:region": "us-east-1", "web:count": 3}"#),
        ("STACKHOST_CONFIG_SECRET_KEYS", r#"["web:size"]"#),
        ("HOME", "/root"),
    ])
    .expect("Should read settings");
    assert_eq!(settings.project, "web");
    assert_eq!(settings.stack, "dev");
    assert!(settings.dry_run);
    assert_eq!(settings.parallelism, 4);
    assert!(settings.config.is_secret("size"));
    assert!(!settings.config.is_secret("aws:region"));
    assert_eq!(
        settings.config.keys().collect::<Vec<_>>(),
        vec!["web:size", "aws:region", "web:count"]
    );
}

#[rstest]
#[case(&[("STACKHOST_STACK", "dev")])]
#[case(&[("STACKHOST_PROJECT", "web"), ("STACKHOST_STACK", "")])]
#[case(&[("STACKHOST_PROJECT", "web"), ("STACKHOST_STACK", "dev"), ("STACKHOST_DRY_RUN", "maybe")])]
#[case(&[("STACKHOST_PROJECT", "web"), ("STACKHOST_STACK", "dev"), ("STACKHOST_PARALLELISM", "many")])]
fn test_invalid_settings(#[case] vars: &[(&str, &str)]) {
    let result = RunSettings::from_vars(vars.iter().copied());
    assert!(matches!(result, Err(crate::Error::InvalidSettings(_))));
}

#[rstest]
#[tokio::test]
async fn test_config_values() {
    let mut config = StackConfig::new("web");
    config.insert("size", "large").unwrap();
    config.insert("aws:config:region", "us-east-1").unwrap();
    config.insert("web:ports", "[80, 443]").unwrap();
    config.mark_secret("size").unwrap();

    let size = config.get("web:size").expect("Should find namespaced key");
    assert!(size.is_secret().await);
    assert_eq!(size.value().await.as_deref(), Some("large"));

    let region = config.require("aws:region").expect("Should normalize legacy keys");
    assert!(!region.is_secret().await);

    let ports: Deferred<Vec<u16>> = config
        .get_object("ports")
        .expect("Should parse json")
        .expect("Should be set");
    assert_eq!(ports.value().await, Some(vec![80, 443]));

    assert!(config.get("missing").is_none());
    let err = config.require("missing").expect_err("Should be required");
    assert!(err.to_string().contains("web:missing"), "got: {err}");
}

#[rstest]
#[case("a:b:c:d")]
#[case(":key")]
#[case("ns:")]
fn test_invalid_config_keys(#[case] key: &str) {
    let mut config = StackConfig::new("web");
    assert!(config.insert(key, "v").is_err());
}

#[rstest]
fn test_parse_minimal_project() {
    let yaml = r#"
api: stackhost/v0
name: web
"#;
    let spec = ProjectSpec::from_yaml(yaml).expect("Should parse minimal project");
    assert_eq!(spec.api, ApiVersion::V0);
    assert_eq!(spec.name, "web");
    assert!(spec.stacks.is_empty());
    spec.validate().expect("Should validate");
}

#[rstest]
fn test_parse_project_with_stacks() {
    let yaml = r#"
api: stackhost/v0
name: web
description: "A static website"
stacks:
  dev:
    organization: acme
    config:
      aws:region: us-west-2
      replicas: 2
      token: abc
    secret_keys:
      - token
"#;
    let spec = ProjectSpec::from_yaml(yaml).expect("Should parse project");
    spec.validate().expect("Should validate");
    let settings = spec.settings("dev").expect("Should have a dev stack");
    assert_eq!(settings.project, "web");
    assert_eq!(settings.organization.as_deref(), Some("acme"));
    assert!(settings.config.is_secret("web:token"));
    let replicas = settings
        .config
        .get_object::<i64>("replicas")
        .expect("Should parse json");
    assert!(replicas.is_some());
    assert!(spec.settings("prod").is_err());
}

#[rstest]
fn test_invalid_yaml() {
    let result = ProjectSpec::from_yaml("api: stackhost/v0\nname: [");
    assert!(matches!(result, Err(crate::Error::InvalidYaml { .. })));

    let result = ProjectSpec::from_yaml("api: other/v9\nname: web");
    assert!(matches!(result, Err(crate::Error::InvalidYaml { .. })));
}

#[rstest]
#[case("stacks:\n  dev:\n    secret_keys: [token]\n")]
#[case("stacks:\n  \"dev stack\": {}\n")]
#[case("stacks:\n  dev:\n    config:\n      web:a: 1\n      a: 2\n")]
fn test_invalid_project(#[case] stacks: &str) {
    let yaml = format!("api: stackhost/v0\nname: web\n{stacks}");
    let spec = ProjectSpec::from_yaml(yaml).expect("Should parse");
    assert!(matches!(
        spec.validate(),
        Err(crate::Error::InvalidSettings(_))
    ));
}

#[rstest]
fn test_load_and_find_project() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("src").join("lib");
    std::fs::create_dir_all(&nested).unwrap();
    let file = tmp.path().join(PROJECT_FILE);
    std::fs::write(&file, "api: stackhost/v0\nname: web\n").unwrap();

    let found = ProjectSpec::find(&nested).expect("Should find the project file");
    assert_eq!(found, file);
    let spec = ProjectSpec::load(&found).expect("Should load");
    assert_eq!(spec.source_path.as_deref(), Some(file.as_path()));

    let missing = ProjectSpec::load(tmp.path().join("nope.yaml"));
    assert!(matches!(missing, Err(crate::Error::ReadFailed { .. })));
}
