//! Shell runtime lifecycle.
//!
//! A [`FunctionSpec`] is an unvalidated deployment. [`ShellRuntime::initialize`]
//! either produces a ready runtime or a [`ConfigurationError`]; a failed deploy
//! never yields a value that could be invoked.

use crate::arguments;
use crate::attributes::{self, RuntimeAttributes, ShellRuntimeConfig};
use crate::error::{ConfigurationError, InvocationError};
use crate::handler::HandlerReference;
use crate::invoker::{InvokerSettings, SubprocessInvoker, DEFAULT_INVOCATION_TIMEOUT, DEFAULT_SHELL};
use crate::request::InvocationRequest;
use crate::response::{self, InvocationResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

pub const SHELL_RUNTIME: &str = "shell";

/// Deploy-time description of a shell function.
#[derive(Debug, Clone, Default)]
pub struct FunctionSpec {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    pub runtime_attributes: RuntimeAttributes,
    pub env: BTreeMap<String, String>,
    pub function_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime: SHELL_RUNTIME.to_string(),
            handler: handler.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.runtime_attributes.insert(key.into(), value);
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_function_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.function_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Process-wide knobs that are not part of a function's own configuration.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub shell: PathBuf,
    pub default_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            default_timeout: DEFAULT_INVOCATION_TIMEOUT,
        }
    }
}

/// A deployed, ready-to-serve shell function.
///
/// Cloning is cheap; clones share the same read-only configuration.
#[derive(Debug, Clone)]
pub struct ShellRuntime {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    handler: HandlerReference,
    config: ShellRuntimeConfig,
    invoker: SubprocessInvoker,
}

impl ShellRuntime {
    /// Validate `spec` and bring the function to the ready state.
    #[instrument(skip_all, fields(function = %spec.name))]
    pub fn initialize(
        spec: FunctionSpec,
        options: &RuntimeOptions,
    ) -> Result<Self, ConfigurationError> {
        if spec.runtime != SHELL_RUNTIME {
            return Err(ConfigurationError::UnsupportedRuntime {
                runtime: spec.runtime,
            });
        }

        let handler = HandlerReference::resolve(&spec.handler, spec.function_dir.as_deref())?;
        let config = attributes::validate(&spec.runtime_attributes)?;

        let settings = InvokerSettings {
            shell: options.shell.clone(),
            timeout: spec.timeout.unwrap_or(options.default_timeout),
            env: spec.env,
            working_dir: spec.function_dir,
        };

        info!(
            %handler,
            static_arguments = %config.static_arguments(),
            response_headers = config.response_headers().len(),
            timeout_ms = settings.timeout.as_millis() as u64,
            "shell function ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                name: spec.name,
                handler,
                config,
                invoker: SubprocessInvoker::new(settings),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handler(&self) -> &HandlerReference {
        &self.inner.handler
    }

    pub fn config(&self) -> &ShellRuntimeConfig {
        &self.inner.config
    }

    /// Invoke the handler for `request`.
    ///
    /// Failures are logged and returned as a non-2xx result; the runtime keeps
    /// serving afterwards.
    #[instrument(
        skip_all,
        fields(
            function = %self.inner.name,
            invocation_id = %Uuid::new_v4(),
            method = %request.method()
        )
    )]
    pub async fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        match self.run(request).await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, code = err.code(), "invocation failed");
                InvocationResult::from_error(&err)
            }
        }
    }

    /// Like [`ShellRuntime::invoke`] but hands the typed failure back to the caller.
    pub async fn try_invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, InvocationError> {
        self.run(request).await
    }

    async fn run(&self, request: &InvocationRequest) -> Result<InvocationResult, InvocationError> {
        let inner = &*self.inner;
        let args = arguments::resolve(&inner.config, request);

        let output = inner
            .invoker
            .invoke(&inner.handler, args, request.body())
            .await?;

        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "handler wrote to stderr");
        }
        info!(
            duration_ms = output.duration.as_secs_f64() * 1000.0,
            response_bytes = output.stdout.len(),
            "invocation completed"
        );

        Ok(response::compose(&inner.config, output.stdout))
    }
}
