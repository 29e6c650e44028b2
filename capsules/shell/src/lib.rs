//! Shell capsule: serves an arbitrary shell command or script as a function.
//!
//! The request body is piped to the handler's stdin and its stdout becomes the
//! response body. Runtime attributes (`arguments`, `responseHeaders`) are
//! validated once at deploy time; the `X-Shell-Arguments` request header can
//! replace the static arguments for a single invocation.

pub mod arguments;
pub mod attributes;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod request;
pub mod response;
pub mod runtime;

pub use arguments::ARGUMENTS_HEADER;
pub use attributes::{RuntimeAttributes, ShellRuntimeConfig};
pub use error::{ConfigurationError, InvocationError};
pub use handler::HandlerReference;
pub use invoker::{InvocationOutput, InvokerSettings, SubprocessInvoker};
pub use request::InvocationRequest;
pub use response::InvocationResult;
pub use runtime::{FunctionSpec, RuntimeOptions, ShellRuntime, SHELL_RUNTIME};
