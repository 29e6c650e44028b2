use config_loader::{ConfigError, FunctionConfigLoader};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(name: &str, content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

#[test]
fn given_yaml_function_config_when_load_then_fields_are_populated() {
    let (temp_dir, path) = write_config(
        "function.yaml",
        r#"
metadata:
  name: echoer
  labels:
    team: platform
spec:
  runtime: shell
  handler: echo
  eventTimeout: 30s
  env:
    - name: GREETING
      value: hello
  runtimeAttributes:
    arguments: abcdef
    responseHeaders:
      header1: value1
      header2: value2
"#,
    );

    let loaded = FunctionConfigLoader::new().load_file(&path).unwrap();

    assert_eq!(loaded.name(), "echoer");
    assert_eq!(loaded.config.spec.runtime, "shell");
    assert_eq!(loaded.config.spec.handler, "echo");
    assert_eq!(loaded.config.metadata.labels["team"], "platform");
    assert_eq!(loaded.event_timeout, Some(Duration::from_secs(30)));
    assert_eq!(loaded.env()["GREETING"], "hello");
    assert_eq!(
        loaded.function_dir,
        temp_dir.path().canonicalize().unwrap()
    );

    let attributes = loaded.runtime_attributes();
    assert_eq!(attributes["arguments"], json!("abcdef"));
    assert_eq!(
        attributes["responseHeaders"],
        json!({"header1": "value1", "header2": "value2"})
    );
}

#[test]
fn given_json_function_config_when_load_then_success() {
    let (_temp_dir, path) = write_config(
        "function.json",
        r#"{
            "metadata": {"name": "reverser"},
            "spec": {"runtime": "shell", "handler": "reverser.sh:main"}
        }"#,
    );

    let loaded = FunctionConfigLoader::new().load_file(&path).unwrap();

    assert_eq!(loaded.name(), "reverser");
    assert_eq!(loaded.config.spec.handler, "reverser.sh:main");
    assert_eq!(loaded.event_timeout, None);
    assert!(loaded.runtime_attributes().is_empty());
    assert!(loaded.env().is_empty());
}

#[test]
fn given_string_response_headers_when_load_then_shape_is_left_to_the_runtime() {
    let (_temp_dir, path) = write_config(
        "function.yaml",
        r#"
metadata:
  name: echoer
spec:
  runtime: shell
  handler: echo
  runtimeAttributes:
    responseHeaders: '"header1": "value1", "header2": "value2"'
"#,
    );

    let loaded = FunctionConfigLoader::new().load_file(&path).unwrap();

    assert!(loaded.runtime_attributes()["responseHeaders"].is_string());
}

#[test]
fn given_config_missing_handler_when_load_then_validation_error() {
    let (_temp_dir, path) = write_config(
        "function.yaml",
        "metadata:\n  name: echoer\nspec:\n  runtime: shell\n",
    );

    let result = FunctionConfigLoader::new().load_file(&path);

    match result {
        Err(ConfigError::ValidationFailed { errors }) => {
            assert!(!errors.is_empty());
            assert!(errors.iter().any(|e| e.message.contains("handler")));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn given_runtime_attributes_as_list_when_load_then_validation_error() {
    let (_temp_dir, path) = write_config(
        "function.yaml",
        "metadata:\n  name: echoer\nspec:\n  runtime: shell\n  handler: echo\n  runtimeAttributes:\n    - arguments\n",
    );

    let result = FunctionConfigLoader::new().load_file(&path);

    match result {
        Err(ConfigError::ValidationFailed { errors }) => {
            assert!(errors
                .iter()
                .any(|e| e.json_pointer.contains("runtimeAttributes")));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn given_invalid_event_timeout_when_load_then_timeout_error() {
    let (_temp_dir, path) = write_config(
        "function.yaml",
        "metadata:\n  name: echoer\nspec:\n  runtime: shell\n  handler: echo\n  eventTimeout: eventually\n",
    );

    let result = FunctionConfigLoader::new().load_file(&path);

    assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));
}

#[test]
fn given_malformed_yaml_when_load_then_parse_error() {
    let (_temp_dir, path) = write_config("function.yaml", "metadata: [unclosed\n");

    let result = FunctionConfigLoader::new().load_file(&path);

    assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
}

#[test]
fn given_unknown_extension_when_load_then_unsupported_format() {
    let (_temp_dir, path) = write_config("function.toml", "name = 'echoer'\n");

    let result = FunctionConfigLoader::new().load_file(&path);

    assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
}

#[test]
fn given_nonexistent_config_file_when_load_then_file_not_found_error() {
    let temp_dir = TempDir::new().unwrap();

    let result = FunctionConfigLoader::new().load_file(&temp_dir.path().join("missing.yaml"));

    assert!(matches!(
        result,
        Err(ConfigError::ConfigFileNotFound { .. })
    ));
}

#[test]
fn given_function_directory_when_load_then_function_yaml_is_used() {
    let (temp_dir, _path) = write_config(
        "function.yaml",
        "metadata:\n  name: json-parser\nspec:\n  runtime: shell\n  handler: parser.sh:main\n",
    );

    let loaded = FunctionConfigLoader::new().load(temp_dir.path()).unwrap();

    assert_eq!(loaded.name(), "json-parser");
    assert_eq!(loaded.config.spec.handler, "parser.sh:main");
    assert_eq!(loaded.function_dir, temp_dir.path().canonicalize().unwrap());
}

#[test]
fn given_directory_with_json_config_when_load_dir_then_json_is_used() {
    let (temp_dir, _path) = write_config(
        "function.json",
        r#"{"metadata": {"name": "json-parser"}, "spec": {"runtime": "shell", "handler": "cat"}}"#,
    );

    let loaded = FunctionConfigLoader::new().load_dir(temp_dir.path()).unwrap();

    assert_eq!(loaded.name(), "json-parser");
}

#[test]
fn given_directory_without_config_when_load_then_file_not_found_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("parser.sh"), "#!/bin/sh\ncat\n").unwrap();

    let result = FunctionConfigLoader::new().load(temp_dir.path());

    match result {
        Err(ConfigError::ConfigFileNotFound { path }) => {
            assert!(path.ends_with("function.yaml"), "{path}");
        }
        other => panic!("expected missing config, got {other:?}"),
    }
}

const INLINE_PARSER: &str = r#"#!/bin/sh

# @function.configure
#
# function.yaml:
#   metadata:
#     labels:
#       kind: parser
#   spec:
#     runtime: shell
#     eventTimeout: 10s
#     runtimeAttributes:
#       responseHeaders:
#         content-type: application/json

cat
"#;

#[test]
fn given_script_with_inline_config_when_load_then_config_comes_from_comment_block() {
    let (temp_dir, path) = write_config("parser.sh", INLINE_PARSER);

    let loaded = FunctionConfigLoader::new().load(&path).unwrap();

    assert_eq!(loaded.name(), "parser");
    assert_eq!(loaded.config.spec.runtime, "shell");
    assert_eq!(loaded.config.spec.handler, "parser.sh");
    assert_eq!(loaded.config.metadata.labels["kind"], "parser");
    assert_eq!(loaded.event_timeout, Some(Duration::from_secs(10)));
    assert_eq!(
        loaded.runtime_attributes()["responseHeaders"],
        json!({"content-type": "application/json"})
    );
    assert_eq!(loaded.function_dir, temp_dir.path().canonicalize().unwrap());
}

#[test]
fn given_inline_config_naming_function_and_handler_when_load_then_they_are_kept() {
    let (_temp_dir, path) = write_config(
        "parser.sh",
        "#!/bin/sh\n# @function.configure\n# function.yaml:\n#   metadata:\n#     name: json-parser\n#   spec:\n#     runtime: shell\n#     handler: parser.sh:main\ncat\n",
    );

    let loaded = FunctionConfigLoader::new().load_inline(&path).unwrap();

    assert_eq!(loaded.name(), "json-parser");
    assert_eq!(loaded.config.spec.handler, "parser.sh:main");
}

#[test]
fn given_malformed_inline_config_when_load_then_parse_error() {
    let (_temp_dir, path) = write_config(
        "parser.sh",
        "#!/bin/sh\n# @function.configure\n# function.yaml:\n#   spec: [runtime: shell\n#   handler: :\ncat\n",
    );

    let result = FunctionConfigLoader::new().load(&path);

    assert!(matches!(result, Err(ConfigError::ParseFailed { .. })), "{result:?}");
}

#[test]
fn given_inline_block_without_function_yaml_key_when_load_then_invalid_inline_config() {
    let (_temp_dir, path) = write_config(
        "parser.sh",
        "#!/bin/sh\n# @function.configure\n#   spec:\n#     runtime: shell\ncat\n",
    );

    let result = FunctionConfigLoader::new().load(&path);

    match result {
        Err(ConfigError::InlineConfigInvalid { message, .. }) => {
            assert!(message.contains("function.yaml:"), "{message}");
        }
        other => panic!("expected invalid inline config, got {other:?}"),
    }
}

#[test]
fn given_inline_config_missing_runtime_when_load_then_validation_error() {
    let (_temp_dir, path) = write_config(
        "parser.sh",
        "#!/bin/sh\n# @function.configure\n# function.yaml:\n#   spec:\n#     description: no runtime\ncat\n",
    );

    let result = FunctionConfigLoader::new().load(&path);

    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })), "{result:?}");
}

#[test]
fn given_script_without_inline_config_when_load_then_not_found_error() {
    let (_temp_dir, path) = write_config("parser.sh", "#!/bin/sh\ncat\n");

    let result = FunctionConfigLoader::new().load(&path);

    assert!(matches!(
        result,
        Err(ConfigError::InlineConfigNotFound { .. })
    ));
}
