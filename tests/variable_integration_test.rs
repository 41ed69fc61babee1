use apichain::definition::RequestDefinition;
use apichain::http::{Auth, Method};
use apichain::variable::{
    ConfigLoader, ExtractionError, UndefinedVariablePolicy, VariableContext, VariableResolver,
    extract_from_str,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("apichain.toml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_load_settings_and_environments() {
    let (_dir, path) = write_config(
        r#"
[settings]
data_dir = "/var/lib/apichain"
timeout_secs = 5
undefined_variables = "error"
serialize_same_chain = true

[environments.dev]
base_url = "http://localhost:3000"
api_key = "dev-key-123"

[environments.prod]
base_url = "https://api.example.com"
"#,
    );

    let config = ConfigLoader::load_from_path(&path).unwrap();
    assert_eq!(config.settings.data_dir, PathBuf::from("/var/lib/apichain"));
    assert_eq!(config.settings.timeout(), Duration::from_secs(5));
    assert_eq!(config.settings.undefined_variables, UndefinedVariablePolicy::Error);
    assert!(config.settings.serialize_same_chain);
    assert_eq!(config.environments.len(), 2);
    assert_eq!(
        config.environments["dev"].variables.get("api_key"),
        Some(&"dev-key-123".to_string())
    );
}

#[test]
fn test_settings_default_when_absent() {
    let (_dir, path) = write_config("");

    let config = ConfigLoader::load_from_path(&path).unwrap();
    assert!(config.environments.is_empty());
    assert_eq!(config.settings.timeout(), Duration::from_secs(30));
    assert_eq!(config.settings.undefined_variables, UndefinedVariablePolicy::Keep);
    assert!(!config.settings.serialize_same_chain);
}

#[test]
fn test_malformed_config_is_config_error() {
    let (_dir, path) = write_config("[settings\ntimeout_secs = ");
    let err = ConfigLoader::load_from_path(&path).unwrap_err();
    assert!(err.to_string().starts_with("Config error"));
}

#[test]
fn test_cli_override_priority() {
    let (_dir, path) = write_config(
        r#"
[environments.dev]
base_url = "http://localhost:3000"
api_key = "config-key"
"#,
    );
    let config = ConfigLoader::load_from_path(&path).unwrap();

    let cli_vars = vec![("api_key".to_string(), "cli-override-key".to_string())];
    let context = ConfigLoader::build_context(&config, Some("dev"), &cli_vars).unwrap();

    assert_eq!(context.get("api_key"), Some("cli-override-key"));
    assert_eq!(context.get("base_url"), Some("http://localhost:3000"));
}

#[test]
fn test_unknown_environment_is_error() {
    let (_dir, path) = write_config("[environments.dev]\nbase_url = \"x\"\n");
    let config = ConfigLoader::load_from_path(&path).unwrap();

    assert!(ConfigLoader::build_context(&config, Some("staging"), &[]).is_err());
    assert!(ConfigLoader::build_context(&config, None, &[]).unwrap().is_empty());
}

#[test]
fn test_environment_variable_expansion() {
    unsafe {
        std::env::set_var("APICHAIN_TEST_TOKEN", "environment-value");
    }

    let (_dir, path) = write_config(
        r#"
[environments.dev]
token = "${APICHAIN_TEST_TOKEN}"
"#,
    );
    let config = ConfigLoader::load_from_path(&path).unwrap();
    let context = ConfigLoader::build_context(&config, Some("dev"), &[]).unwrap();

    assert_eq!(
        VariableResolver::substitute("Bearer {{token}}", &context),
        "Bearer environment-value"
    );

    unsafe {
        std::env::remove_var("APICHAIN_TEST_TOKEN");
    }
}

#[test]
fn test_seeded_definition_resolves_every_field() {
    let (_dir, path) = write_config(
        r#"
[environments.dev]
base_url = "https://api.example.com"
user = "admin"
"#,
    );
    let config = ConfigLoader::load_from_path(&path).unwrap();
    let cli_vars = vec![("password".to_string(), "s3cret".to_string())];
    let context = ConfigLoader::build_context(&config, Some("dev"), &cli_vars).unwrap();

    let definition = RequestDefinition::new("login", Method::Post, "{{base_url}}/login")
        .with_header("X-User", "{{user}}")
        .with_param("trace", "{{trace_id}}")
        .with_body(r#"{"user": "{{user}}"}"#)
        .with_auth(Auth::Basic {
            username: "{{user}}".to_string(),
            password: "{{password}}".to_string(),
        });

    assert_eq!(definition.unresolved_variables(&context), vec!["trace_id"]);

    let request = definition.resolve(&context);
    assert_eq!(request.url, "https://api.example.com/login");
    assert_eq!(request.headers["X-User"], "admin");
    assert_eq!(request.query_params["trace"], "{{trace_id}}");
    assert_eq!(request.body.as_deref(), Some(r#"{"user": "admin"}"#));
    assert_eq!(
        request.auth,
        Some(Auth::Basic {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
        })
    );
}

#[test]
fn test_extracted_values_substitute_as_strings() {
    let body = r#"{"data": {"id": 7, "active": true, "tags": ["a", "b"], "owner": null}}"#;
    let mut context = VariableContext::new();
    for (path, var) in [
        ("data.id", "id"),
        ("data.active", "active"),
        ("data.tags", "tags"),
        ("data.owner", "owner"),
        ("data.tags.1", "second"),
    ] {
        let value = extract_from_str(body, path).unwrap();
        context.insert(var, VariableResolver::value_to_string(&value));
    }

    assert_eq!(
        VariableResolver::substitute(
            "{{id}} {{active}} {{tags}} {{owner}} {{second}}",
            &context
        ),
        r#"7 true ["a","b"] null b"#
    );
}

#[test]
fn test_extract_errors_from_raw_bodies() {
    assert_eq!(extract_from_str("plain text", "id"), Err(ExtractionError::NotStructured));
    assert_eq!(extract_from_str("42", "id"), Err(ExtractionError::NotStructured));
    assert_eq!(extract_from_str(r#"{"a": 1}"#, ""), Err(ExtractionError::EmptyPath));
    assert!(matches!(
        extract_from_str(r#"{"items": []}"#, "items.0"),
        Err(ExtractionError::IndexOutOfRange { index: 0, len: 0, .. })
    ));
}

#[test]
fn test_cli_variable_parsing() {
    assert_eq!(
        ConfigLoader::parse_cli_var("key1=value1"),
        Some(("key1".to_string(), "value1".to_string()))
    );
    assert_eq!(
        ConfigLoader::parse_cli_var("key3=value=with=equals"),
        Some(("key3".to_string(), "value=with=equals".to_string()))
    );
    assert_eq!(ConfigLoader::parse_cli_var("=value"), None);
    assert_eq!(ConfigLoader::parse_cli_var("novalue"), None);
}
