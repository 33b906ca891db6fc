//! # CLI
//!
//! This module defines the command-line interface of `reflect` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring the endpoint
//! is `Service/Method` and the body is valid JSON).
use clap::{Args, Parser, Subcommand};
use reflect_core::config::{ClientConfig, DEFAULT_NAMESPACE, ImportPolicy};
use std::{net::SocketAddr, time::Duration};

#[derive(Parser)]
#[command(
    name = "reflect",
    version,
    about = "gRPC calls without generated stubs, driven by server reflection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Host the demo services together with the reflection service
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:50051")]
        listen: SocketAddr,
        /// Delay between two messages of `SyncService/SyncServerStream`, in milliseconds
        #[arg(long, default_value_t = 1000)]
        stream_interval_ms: u64,
    },

    /// List the services exposed by a server
    List {
        /// The server URL to connect to (e.g. http://localhost:50051)
        url: String,
    },

    /// Perform a gRPC call to a server
    ///
    /// The method is resolved through the server's reflection service, so only its name is
    /// needed.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// reflect call http://localhost:50051 TestService/Test --body '{"message": "hi"}'
    /// ```
    Call {
        /// The server URL to connect to (e.g. http://localhost:50051)
        url: String,
        /// Endpoint (Service/Method), without the namespace
        #[arg(value_parser = parse_endpoint)]
        endpoint: (String, String),
        /// JSON body (Object for Unary and Server Streaming, Array for Client Streaming and
        /// Bidirectional)
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Run every call shape against the demo services and print the responses
    Demo {
        /// The server URL to connect to (e.g. http://localhost:50051)
        url: String,
        /// Delay between two messages of the bidirectional call, in milliseconds
        #[arg(long, default_value_t = 1000)]
        bidi_interval_ms: u64,
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Args)]
pub struct ClientArgs {
    /// Package of the services being called
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// Follow the imports of the method's file when resolving it
    #[arg(long)]
    pub transitive: bool,
    /// Connection timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub connect_timeout_secs: u64,
}

impl ClientArgs {
    pub fn config(&self) -> ClientConfig {
        let import_policy = if self.transitive {
            ImportPolicy::Transitive
        } else {
            ImportPolicy::FirstFileOnly
        };

        ClientConfig::default()
            .with_namespace(self.namespace.clone())
            .with_import_policy(import_policy)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    let (service, method) = value
        .split_once('/')
        .ok_or_else(|| format!("Invalid endpoint format: '{value}'. Expected 'Service/Method'"))?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
