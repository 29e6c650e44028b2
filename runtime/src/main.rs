use anyhow::Result;
use clap::Parser;
use runtime::settings::Settings;
use runtime::{deploy, server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::parse();

    info!(
        "Deploying function from {}",
        settings.function_config.display()
    );

    let runtime = match deploy::deploy(&settings.function_config, &settings.runtime_options()) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Function deployment failed: {:#}", e);
            std::process::exit(1);
        }
    };

    server::serve(settings.addr(), runtime, settings.max_body_size).await
}
