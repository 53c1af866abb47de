use std::{env, fs};

use restgraph_server::config::AppConfig;
use restgraph_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("restgraph.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[bridge]
expose_route = true
route_prefix = "/docs"
forward_headers = ["authorization", "x-tenant"]
unknown_option = "ignored"

[bridge.definitions.info]
title = "Users API"
version = "2.0.0"

[bridge.graphql]
graphiql = true
max_depth = 8
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.bridge.expose_route);
    assert_eq!(cfg.bridge.document_path(), "/docs/json");
    assert_eq!(cfg.bridge.forward_headers, vec!["authorization", "x-tenant"]);
    assert_eq!(cfg.bridge.definitions.info.title, "Users API");
    assert!(cfg.bridge.graphql.graphiql);
    assert_eq!(cfg.bridge.graphql.max_depth, 8);
    assert_eq!(cfg.bridge.graphql.max_complexity, 500);

    // 2) Env override should win over file
    unsafe {
        env::set_var("RESTGRAPH__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("RESTGRAPH__SERVER__PORT");
    }

    // 3) Invalid values are rejected
    let invalid = dir.path().join("invalid.toml");
    fs::write(
        &invalid,
        r#"
[bridge.graphql]
path = "graphql"
"#,
    )
    .expect("write invalid toml");
    let err = load_config(invalid.to_str()).expect_err("relative graphql path must fail");
    assert!(err.contains("path"), "{err}");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let cfg = load_config(path.to_str()).expect("defaults should load");
    assert_eq!(cfg.server.host, AppConfig::default().server.host);
    assert_eq!(cfg.bridge.graphql.path, "/graphql");
    assert!(!cfg.bridge.viewer);
}

#[test]
fn app_config_parses_from_toml_directly() {
    let cfg: AppConfig = toml::from_str(
        r#"
[bridge]
viewer = true
include_deprecated = false
"#,
    )
    .expect("toml parses");
    assert!(cfg.bridge.viewer);
    assert!(!cfg.bridge.include_deprecated);
    assert_eq!(cfg.server.port, 8080);
}
