use capsules_shell::invoker::DEFAULT_SHELL;
use capsules_shell::RuntimeOptions;
use crate::server::DEFAULT_MAX_BODY_SIZE;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Startup settings for the HTTP trigger. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "runtime", version, about = "Serve a shell function over HTTP")]
pub struct Settings {
    /// Function configuration file (.yaml, .yml or .json), a directory holding
    /// `function.yaml`, or a handler script with an inline configuration
    #[arg(long, env = "FUNCTION_CONFIG", value_name = "PATH")]
    pub function_config: PathBuf,

    #[arg(long, env = "RUNTIME_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Shell used to run handlers (invoked as `<shell> -c <command line>`)
    #[arg(long, env = "SHELL_RUNTIME_SHELL", default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Invocation timeout for functions that do not set `eventTimeout`
    #[arg(
        long,
        env = "SHELL_RUNTIME_TIMEOUT",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    pub default_timeout: Duration,

    /// Largest request body accepted, in bytes
    #[arg(long, env = "SHELL_RUNTIME_MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    pub max_body_size: usize,
}

impl Settings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            shell: self.shell.clone(),
            default_timeout: self.default_timeout,
        }
    }
}
