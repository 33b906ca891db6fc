//! Walks every call shape of `TestService`, resolving each method through reflection first.
//!
//! A failing step is reported and the walk goes on with the next one.
use crate::formatter::{FormattedString, ServiceList};
use anyhow::Context;
use futures_util::StreamExt;
use reflect_core::client::{CallError, DynamicClient, DynamicRequest, DynamicResponse};
use serde_json::{Value, json};

const SERVICE: &str = "TestService";
const DESCRIPTOR_FILE: &str = "reflect.proto";
const STREAM_LEN: usize = 3;

/// Runs the demo and fails if any step failed.
pub async fn run(client: &mut DynamicClient) -> anyhow::Result<()> {
    let mut failures = 0;

    match client.list_services().await {
        Ok(services) => println!("{}", FormattedString::from(ServiceList(services))),
        Err(err) => {
            tracing::error!(%err, "failed to list services");
            failures += 1;
        }
    }

    if let Err(err) = print_descriptor(client).await {
        tracing::error!(file = DESCRIPTOR_FILE, "{err:#}");
        failures += 1;
    }

    for (method, body) in steps() {
        println!("==> {SERVICE}/{method}");

        if let Err(err) = call(client, method, body).await {
            tracing::error!(%err, kind = ?err.kind(), method, "call failed");
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} demo step(s) failed");
    }

    Ok(())
}

fn sequence(label: &str) -> Value {
    (1..=STREAM_LEN)
        .map(|i| json!({ "message": format!("{label} stream message {i}") }))
        .collect()
}

fn steps() -> Vec<(&'static str, Value)> {
    vec![
        ("Test", json!({ "message": "This is a Unary RPC test message!" })),
        (
            "TestServerStream",
            json!({ "message": "Start server streaming!" }),
        ),
        ("TestClientStream", sequence("Client")),
        ("TestBidiStream", sequence("Bidi")),
        ("Run", json!({ "message": "Run command test", "id": 12345 })),
    ]
}

async fn print_descriptor(client: &mut DynamicClient) -> anyhow::Result<()> {
    let file = client
        .fetch_file(DESCRIPTOR_FILE)
        .await
        .context("failed to fetch file descriptor")?;

    let formatted = FormattedString::try_from(&file)
        .context("failed to render file descriptor")?;
    println!("{formatted}");
    Ok(())
}

async fn call(client: &mut DynamicClient, method: &str, body: Value) -> Result<(), CallError> {
    let request = DynamicRequest::new(SERVICE, method, body);

    match client.call(request).await? {
        DynamicResponse::Unary(value) => println!("{}", FormattedString::from(value)),
        DynamicResponse::Streaming(mut stream) => {
            while let Some(item) = stream.next().await {
                println!("{}", FormattedString::from(item?));
            }
        }
    }

    Ok(())
}
