use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

const FUNCTION_CONFIG_SCHEMA: &str = include_str!("../contracts/function-config.v1.json");

/// File names looked up, in order, when a function is loaded from a directory.
pub const FUNCTION_CONFIG_FILES: [&str; 3] = ["function.yaml", "function.yml", "function.json"];

/// Comment line that opens an inline configuration block in a handler script.
pub const INLINE_CONFIG_MARKER: &str = "@function.configure";

const INLINE_CONFIG_KEY: &str = "function.yaml:";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    ConfigFileNotFound { path: String },

    #[error("Unsupported config format for {path} (expected .yaml, .yml or .json)")]
    UnsupportedFormat { path: String },

    #[error("Schema compilation failed: {message}")]
    SchemaCompilationFailed { message: String },

    #[error("Config validation failed: {}", summarize(errors))]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Config parsing failed: {message}")]
    ParseFailed { message: String },

    #[error("Invalid eventTimeout '{value}': {message}")]
    InvalidTimeout { value: String, message: String },

    #[error("No inline function configuration ('# {marker}') found in {path}")]
    InlineConfigNotFound { path: String, marker: &'static str },

    #[error("Invalid inline function configuration in {path}: {message}")]
    InlineConfigInvalid { path: String, message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub json_pointer: String,
    pub message: String,
    pub schema_path: String,
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| {
            if error.json_pointer.is_empty() {
                error.message.clone()
            } else {
                format!("{}: {}", error.json_pointer, error.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub metadata: FunctionMetadata,
    pub spec: FunctionConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfigSpec {
    pub runtime: String,
    pub handler: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_timeout: Option<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Untyped attribute bag, interpreted by the runtime named in `runtime`.
    #[serde(default)]
    pub runtime_attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// A function configuration read from disk, with its location.
#[derive(Debug, Clone)]
pub struct LoadedFunction {
    pub config: FunctionConfig,
    pub function_dir: PathBuf,
    pub event_timeout: Option<Duration>,
}

impl LoadedFunction {
    pub fn name(&self) -> &str {
        &self.config.metadata.name
    }

    pub fn runtime_attributes(&self) -> Map<String, Value> {
        self.config
            .spec
            .runtime_attributes
            .clone()
            .unwrap_or_default()
    }

    pub fn env(&self) -> BTreeMap<String, String> {
        self.config
            .spec
            .env
            .iter()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            Some("json") => Some(Format::Json),
            _ => None,
        }
    }
}

/// Reads function configuration files and checks their outer shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionConfigLoader;

impl FunctionConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a function from `path`, whatever form it takes.
    ///
    /// A directory is searched for [`FUNCTION_CONFIG_FILES`]; a `.yaml`, `.yml`
    /// or `.json` file is a configuration file; any other file is a handler
    /// script carrying its configuration inline.
    #[instrument(skip(self))]
    pub fn load(&self, path: &Path) -> Result<LoadedFunction, ConfigError> {
        if path.is_dir() {
            self.load_dir(path)
        } else if path.exists() && Format::from_path(path).is_none() {
            self.load_inline(path)
        } else {
            self.load_file(path)
        }
    }

    #[instrument(skip(self))]
    pub fn load_file(&self, path: &Path) -> Result<LoadedFunction, ConfigError> {
        debug!("Loading function config from: {:?}", path);

        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let format = Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_string_lossy().to_string(),
        })?;

        let content = read(path)?;
        let config = self.finish(self.parse_value(&content, format)?)?;

        loaded(config, parent_dir(path))
    }

    /// Load the configuration file of a function directory.
    #[instrument(skip(self))]
    pub fn load_dir(&self, dir: &Path) -> Result<LoadedFunction, ConfigError> {
        let config_path = FUNCTION_CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::ConfigFileNotFound {
                path: dir.join(FUNCTION_CONFIG_FILES[0]).to_string_lossy().to_string(),
            })?;

        self.load_file(&config_path)
    }

    /// Load a handler script whose configuration sits in a comment block:
    ///
    /// ```text
    /// # @function.configure
    /// #
    /// # function.yaml:
    /// #   spec:
    /// #     runtime: shell
    /// ```
    ///
    /// `metadata.name` defaults to the script's file stem and `spec.handler`
    /// to its file name.
    #[instrument(skip(self))]
    pub fn load_inline(&self, script: &Path) -> Result<LoadedFunction, ConfigError> {
        debug!("Loading inline function config from: {:?}", script);

        if !script.is_file() {
            return Err(ConfigError::ConfigFileNotFound {
                path: script.to_string_lossy().to_string(),
            });
        }

        let source = read(script)?;
        let document = extract_inline_config(&source)
            .ok_or_else(|| ConfigError::InlineConfigNotFound {
                path: script.to_string_lossy().to_string(),
                marker: INLINE_CONFIG_MARKER,
            })?
            .map_err(|message| ConfigError::InlineConfigInvalid {
                path: script.to_string_lossy().to_string(),
                message,
            })?;

        let mut value = self.parse_value(&document, Format::Yaml)?;
        apply_script_defaults(&mut value, script)?;
        let config = self.finish(value)?;

        loaded(config, parent_dir(script))
    }

    /// Parse a YAML document already in memory.
    #[instrument(skip(self, content))]
    pub fn load_yaml_str(&self, content: &str) -> Result<FunctionConfig, ConfigError> {
        self.finish(self.parse_value(content, Format::Yaml)?)
    }

    #[instrument(skip(self))]
    pub fn validate_value(&self, config_value: &Value) -> Result<(), ConfigError> {
        let schema_value: Value =
            serde_json::from_str(FUNCTION_CONFIG_SCHEMA).map_err(|e| ConfigError::ParseFailed {
                message: e.to_string(),
            })?;

        let compiled_schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| ConfigError::SchemaCompilationFailed {
                message: e.to_string(),
            })?;

        if let Err(errors) = compiled_schema.validate(config_value) {
            let validation_errors: Vec<ValidationError> = errors
                .map(|error| ValidationError {
                    json_pointer: error.instance_path.to_string(),
                    message: error.to_string(),
                    schema_path: error.schema_path.to_string(),
                })
                .collect();

            return Err(ConfigError::ValidationFailed {
                errors: validation_errors,
            });
        }

        Ok(())
    }

    fn parse_value(&self, content: &str, format: Format) -> Result<Value, ConfigError> {
        match format {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::ParseFailed {
                message: e.to_string(),
            }),
            Format::Json => serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed {
                message: e.to_string(),
            }),
        }
    }

    fn finish(&self, config_value: Value) -> Result<FunctionConfig, ConfigError> {
        self.validate_value(&config_value)?;

        serde_json::from_value(config_value).map_err(|e| ConfigError::ParseFailed {
            message: e.to_string(),
        })
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        message: format!("Failed to read {}: {}", path.display(), e),
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.canonicalize()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn loaded(config: FunctionConfig, function_dir: PathBuf) -> Result<LoadedFunction, ConfigError> {
    let event_timeout = parse_timeout(config.spec.event_timeout.as_deref())?;

    debug!(
        "Loaded function '{}' (runtime {}, handler {})",
        config.metadata.name, config.spec.runtime, config.spec.handler
    );

    Ok(LoadedFunction {
        config,
        function_dir,
        event_timeout,
    })
}

/// Pull the YAML document out of a script's inline configuration block.
///
/// Returns `None` when the script has no marker line.
fn extract_inline_config(source: &str) -> Option<Result<String, String>> {
    let mut lines = source.lines();
    lines.find(|line| comment_text(line).map(str::trim) == Some(INLINE_CONFIG_MARKER))?;

    let block: Vec<&str> = lines.map_while(comment_text).collect();
    let mut body = block.iter().skip_while(|line| line.trim().is_empty());

    match body.next() {
        Some(line) if line.trim() == INLINE_CONFIG_KEY => {}
        Some(line) => {
            return Some(Err(format!(
                "expected '{}' after the marker, found '{}'",
                INLINE_CONFIG_KEY,
                line.trim()
            )))
        }
        None => return Some(Err(format!("expected '{}' after the marker", INLINE_CONFIG_KEY))),
    }

    let body: Vec<&str> = body.copied().collect();
    let indent = body
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min();

    let Some(indent) = indent else {
        return Some(Err(format!("'{}' block is empty", INLINE_CONFIG_KEY)));
    };

    let document = body
        .iter()
        .map(|line| line.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    Some(Ok(document))
}

/// Text of a `#` comment line with the `#` and one following space removed.
fn comment_text(line: &str) -> Option<&str> {
    let text = line.trim_start().strip_prefix('#')?;
    Some(text.strip_prefix(' ').unwrap_or(text))
}

fn apply_script_defaults(value: &mut Value, script: &Path) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InlineConfigInvalid {
        path: script.to_string_lossy().to_string(),
        message: message.to_string(),
    };

    let root = value
        .as_object_mut()
        .ok_or_else(|| invalid("configuration must be a map"))?;

    if let Some(name) = script.file_stem().and_then(|stem| stem.to_str()) {
        let metadata = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata
                .entry("name")
                .or_insert_with(|| Value::String(name.to_string()));
        }
    }

    if let Some(file_name) = script.file_name().and_then(|name| name.to_str()) {
        if let Some(spec) = root.get_mut("spec").and_then(Value::as_object_mut) {
            spec.entry("handler")
                .or_insert_with(|| Value::String(file_name.to_string()));
        }
    }

    Ok(())
}

fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let timeout = humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidTimeout {
        value: raw.to_string(),
        message: e.to_string(),
    })?;

    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout {
            value: raw.to_string(),
            message: "timeout must be greater than zero".to_string(),
        });
    }

    Ok(Some(timeout))
}
