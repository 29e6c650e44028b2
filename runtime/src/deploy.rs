//! Deploys a function configuration file into a ready [`ShellRuntime`].

use anyhow::{Context, Result};
use capsules_shell::{FunctionSpec, RuntimeOptions, ShellRuntime};
use config_loader::{FunctionConfigLoader, LoadedFunction};
use std::path::Path;
use tracing::info;

use crate::server;

/// Map a loaded configuration onto the engine's deploy-time input.
pub fn function_spec(loaded: &LoadedFunction) -> FunctionSpec {
    FunctionSpec {
        name: loaded.name().to_string(),
        runtime: loaded.config.spec.runtime.clone(),
        handler: loaded.config.spec.handler.clone(),
        runtime_attributes: loaded.runtime_attributes(),
        env: loaded.env(),
        function_dir: Some(loaded.function_dir.clone()),
        timeout: loaded.event_timeout,
    }
}

/// Load `path` and validate it into a servable runtime.
///
/// `path` is a function configuration file, a directory holding one, or a
/// handler script with an inline configuration block. Any error here is a
/// failed deploy; callers must not expose the function.
pub fn deploy(path: &Path, options: &RuntimeOptions) -> Result<ShellRuntime> {
    let loaded = FunctionConfigLoader::new()
        .load(path)
        .with_context(|| format!("Failed to load function config {}", path.display()))?;

    let runtime = ShellRuntime::initialize(function_spec(&loaded), options)
        .with_context(|| format!("Failed to deploy function '{}'", loaded.name()))?;
    server::check_response_headers(runtime.config())
        .with_context(|| format!("Failed to deploy function '{}'", loaded.name()))?;

    info!(function = %runtime.name(), "function deployed");
    Ok(runtime)
}
