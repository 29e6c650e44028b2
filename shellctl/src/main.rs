use anyhow::{Context, Result};
use capsules_shell::invoker::DEFAULT_SHELL;
use capsules_shell::{InvocationRequest, RuntimeOptions, ARGUMENTS_HEADER};
use clap::{Parser, Subcommand};
use runtime::deploy;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "shellctl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,

    /// Shell used to run handlers
    #[arg(long, global = true, env = "SHELL_RUNTIME_SHELL", default_value = DEFAULT_SHELL)]
    shell: PathBuf,

    /// Invocation timeout for functions that do not set `eventTimeout`
    #[arg(
        long,
        global = true,
        env = "SHELL_RUNTIME_TIMEOUT",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    default_timeout: Duration,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a function configuration the same way a deploy would
    Validate {
        /// Function configuration file, function directory, or script with inline configuration
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
    /// Deploy a function locally and invoke it once
    Invoke {
        /// Function configuration file, function directory, or script with inline configuration
        #[arg(value_name = "PATH")]
        file: PathBuf,
        #[arg(long, default_value = "POST")]
        method: String,
        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the request body from a file
        #[arg(long, value_name = "PATH")]
        body_file: Option<PathBuf>,
        /// Replace the function's static arguments for this invocation
        #[arg(long)]
        arguments: Option<String>,
        /// Extra request header, repeatable
        #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Print status and response headers before the body
        #[arg(short, long)]
        include: bool,
    },
    /// Print version and exit
    Version,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header '{}' must look like NAME:VALUE", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header '{}' has an empty name", raw));
    }
    Ok((name.to_string(), value.trim_start().to_string()))
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let options = RuntimeOptions {
        shell: cli.shell,
        default_timeout: cli.default_timeout,
    };

    match cli.cmd {
        Commands::Validate { file } => match deploy::deploy(&file, &options) {
            Ok(runtime) => {
                println!("✓ Function '{}' is valid", runtime.name());
            }
            Err(e) => {
                eprintln!("✗ {:#}", e);
                std::process::exit(1);
            }
        },
        Commands::Invoke {
            file,
            method,
            body,
            body_file,
            arguments,
            headers,
            include,
        } => {
            let runtime = match deploy::deploy(&file, &options) {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("✗ {:#}", e);
                    std::process::exit(1);
                }
            };

            let body = read_body(body, body_file.as_deref())?;
            let mut request = InvocationRequest::new(method).with_body(body);
            for (name, value) in headers {
                request.insert_header(name, value);
            }
            if let Some(arguments) = arguments {
                request.insert_header(ARGUMENTS_HEADER, arguments);
            }

            let result = runtime.invoke(&request).await;

            if !result.is_success() {
                eprintln!("✗ Invocation failed with status {}", result.status);
                std::io::stderr().write_all(&result.body)?;
                eprintln!();
                std::process::exit(1);
            }

            let mut stdout = std::io::stdout().lock();
            if include {
                writeln!(stdout, "HTTP {}", result.status)?;
                for (name, value) in &result.headers {
                    writeln!(stdout, "{}: {}", name, value)?;
                }
                writeln!(stdout)?;
            }
            stdout.write_all(&result.body)?;
            stdout.flush()?;
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

fn read_body(body: Option<String>, body_file: Option<&Path>) -> Result<Vec<u8>> {
    match (body, body_file) {
        (Some(body), _) => Ok(body.into_bytes()),
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read request body from {}", path.display())),
        (None, None) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_splits_on_first_colon() {
        assert_eq!(
            parse_header("X-Shell-Arguments: a:b").unwrap(),
            ("X-Shell-Arguments".to_string(), "a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
