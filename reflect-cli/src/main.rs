//! # Reflect CLI Entry Point
//!
//! The main executable. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the log subscriber and parses the arguments using [`cli::Cli`].
//! 2. **Connection**: Establishes a connection to the target server via `reflect_core`
//!    (every command but `serve`).
//! 3. **Execution**: Delegates the work to the `DynamicClient`, or hosts the demo services.
//! 4. **Presentation**: Prints the resulting data to standard output. Logs go to standard error.
mod cli;
mod demo;
mod formatter;
mod server;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, ServiceList};
use futures_util::StreamExt;
use reflect_core::{
    client::{DynamicClient, DynamicRequest, DynamicResponse},
    config::ClientConfig,
};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let args = Cli::parse();

    match args.command {
        Commands::Serve {
            listen,
            stream_interval_ms,
        } => server::serve(listen, Duration::from_millis(stream_interval_ms)).await,
        Commands::List { url } => list_services(&url).await,
        Commands::Call {
            url,
            endpoint,
            body,
            client,
        } => {
            let (service, method) = endpoint;
            let request = DynamicRequest::new(service, method, body);
            run_call(&url, client.config(), request).await
        }
        Commands::Demo {
            url,
            bidi_interval_ms,
            client,
        } => {
            let config = client
                .config()
                .with_bidi_interval(Duration::from_millis(bidi_interval_ms));
            let mut client = connect(&url, config).await?;
            demo::run(&mut client).await
        }
    }
}

/// Logs are filtered through `RUST_LOG`, defaulting to `info`.
fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()
        .context("failed to create env filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn connect(url: &str, config: ClientConfig) -> anyhow::Result<DynamicClient> {
    DynamicClient::connect_with(url, config)
        .await
        .context("connection failed")
}

async fn list_services(url: &str) -> anyhow::Result<()> {
    let mut client = connect(url, ClientConfig::default()).await?;

    let services = client
        .list_services()
        .await
        .context("failed to list services")?;

    println!("{}", FormattedString::from(ServiceList(services)));
    Ok(())
}

async fn run_call(url: &str, config: ClientConfig, request: DynamicRequest) -> anyhow::Result<()> {
    let mut client = connect(url, config).await?;
    let endpoint = format!("{}/{}", request.service, request.method);

    let response = client
        .call(request)
        .await
        .with_context(|| format!("call to '{endpoint}' failed"))?;

    match response {
        DynamicResponse::Unary(value) => println!("{}", FormattedString::from(value)),
        DynamicResponse::Streaming(mut stream) => {
            while let Some(item) = stream.next().await {
                let value = item.with_context(|| format!("stream of '{endpoint}' failed"))?;
                println!("{}", FormattedString::from(value));
            }
        }
    }

    Ok(())
}
