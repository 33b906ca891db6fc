//! # Dynamic Client
//!
//! This module implements the high-level logic for executing dynamic gRPC requests: JSON in,
//! JSON out.
//!
//! The [`DynamicClient`] resolves the requested method through reflection, reads its call shape
//! from the descriptor, converts the JSON body into request messages, dispatches the call and
//! renders the responses back to JSON.
//!
//! ## Example
//!
//! ```rust,no_run
//! use reflect_core::client::{DynamicClient, DynamicRequest, DynamicResponse};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = DynamicClient::connect("http://localhost:50051").await?;
//!
//! let request = DynamicRequest::new(
//!     "TestService",
//!     "Test",
//!     serde_json::json!({ "message": "hello" }),
//! );
//!
//! if let DynamicResponse::Unary(value) = client.call(request).await? {
//!     println!("{value}");
//! }
//! # Ok(())
//! # }
//! ```
mod types;

pub use types::*;

use crate::{
    BoxError, ErrorKind,
    config::ClientConfig,
    grpc::{
        bidi::BidiCall,
        client::{CallShape, InvokeError, Invoker},
    },
    message::{self, BridgeError},
    reflection::resolver::{DescriptorResolver, ResolveError, ResolvedMethod},
    symbol::ServiceSymbol,
};
use futures_util::{StreamExt, stream};
use http_body::Body as HttpBody;
use prost_reflect::DynamicMessage;
use prost_types::FileDescriptorProto;
use serde_json::Value;
use std::time::Duration;
use tonic::{
    client::GrpcService,
    transport::{Channel, Endpoint},
};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

impl ClientConnectError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

/// Errors that can occur during a dynamic call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error("Method '{method}' is {shape} and expects {expected} as body")]
    InvalidBody {
        method: String,
        shape: CallShape,
        expected: &'static str,
    },
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolve(err) => err.kind(),
            Self::Bridge(err) => err.kind(),
            Self::Invoke(err) => err.kind(),
            Self::InvalidBody { .. } => ErrorKind::Parse,
        }
    }
}

/// The main client for calling gRPC methods of a reflection-enabled server.
#[derive(Debug, Clone)]
pub struct DynamicClient<S = Channel> {
    resolver: DescriptorResolver<S>,
    invoker: Invoker<S>,
    config: ClientConfig,
}

impl DynamicClient<Channel> {
    /// Connects to a gRPC server with the default [`ClientConfig`].
    ///
    /// # Arguments
    ///
    /// * `addr` - The server URI (e.g., `http://localhost:50051`).
    pub async fn connect(addr: &str) -> Result<Self, ClientConnectError> {
        Self::connect_with(addr, ClientConfig::default()).await
    }

    /// Connects to a gRPC server, bounding the connection attempt by `config.connect_timeout`.
    pub async fn connect_with(
        addr: &str,
        config: ClientConfig,
    ) -> Result<Self, ClientConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.to_string(), e))?
            .connect_timeout(config.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.to_string(), e))?;

        tracing::debug!(addr, "connected");

        Ok(Self::from_service(channel, config))
    }
}

impl<S> DynamicClient<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    ///
    /// The service is shared by the reflection lookups and the calls; whoever created it
    /// remains its owner.
    pub fn from_service(service: S, config: ClientConfig) -> Self {
        let resolver = DescriptorResolver::new(service.clone(), config.namespace.clone())
            .with_import_policy(config.import_policy);
        let invoker = Invoker::new(service);

        Self {
            resolver,
            invoker,
            config,
        }
    }

    /// Builds a symbol in the configured namespace.
    pub fn symbol(&self, service: &str, method: &str) -> ServiceSymbol {
        self.resolver.symbol(service, method)
    }

    /// Resolves `service`/`method` in the configured namespace.
    pub async fn resolve(
        &mut self,
        service: &str,
        method: &str,
    ) -> Result<ResolvedMethod, ResolveError> {
        let symbol = self.symbol(service, method);
        self.resolver.resolve(&symbol).await
    }

    /// Lists the services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ResolveError> {
        self.resolver.list_services().await
    }

    /// Fetches a whole file by name (e.g. `reflect.proto`).
    pub async fn fetch_file(
        &mut self,
        filename: &str,
    ) -> Result<FileDescriptorProto, ResolveError> {
        self.resolver.fetch_file_by_filename(filename).await
    }

    /// Executes a dynamic gRPC request.
    ///
    /// 1. Resolves the method through reflection.
    /// 2. Converts the JSON body according to the shape declared by the method.
    /// 3. Dispatches the call and renders the responses.
    pub async fn call(&mut self, request: DynamicRequest) -> Result<DynamicResponse, CallError> {
        let method = self.resolve(&request.service, &request.method).await?;
        let shape = method.shape();
        let input = method.input();

        tracing::debug!(symbol = %method.symbol(), %shape, "dispatching call");

        match shape {
            CallShape::Unary => {
                let request = message::from_value(&input, request.body)?;
                let response = self.invoker.unary(&method, request).await?;
                Ok(DynamicResponse::Unary(message::to_value(&response)?))
            }
            CallShape::ServerStreaming => {
                let request = message::from_value(&input, request.body)?;
                let responses = self.invoker.server_streaming(&method, request).await?;
                let rendered = responses.map(|item| -> Result<Value, CallError> {
                    let response = item?;
                    Ok(message::to_value(&response)?)
                });
                Ok(DynamicResponse::Streaming(rendered.boxed()))
            }
            CallShape::ClientStreaming => {
                let requests = request_sequence(&method, request.body)?;
                let response = self
                    .invoker
                    .client_streaming(&method, stream::iter(requests))
                    .await?;
                Ok(DynamicResponse::Unary(message::to_value(&response)?))
            }
            CallShape::Bidirectional => {
                let requests = request_sequence(&method, request.body)?;
                let call = self.invoker.open_bidirectional(&method)?;
                let call = send_paced(call, requests, self.config.bidi_interval).await?;
                Ok(DynamicResponse::Streaming(drain_responses(call)))
            }
        }
    }
}

/// Converts a JSON array into the request messages of a client-streaming method.
fn request_sequence(
    method: &ResolvedMethod,
    body: Value,
) -> Result<Vec<DynamicMessage>, CallError> {
    let Value::Array(items) = body else {
        return Err(CallError::InvalidBody {
            method: method.symbol().to_string(),
            shape: method.shape(),
            expected: "an array of objects",
        });
    };

    let input = method.input();
    items
        .into_iter()
        .map(|item| message::from_value(&input, item).map_err(CallError::from))
        .collect()
}

/// Sends every request, waiting `interval` between two sends, then half-closes the call.
async fn send_paced(
    mut call: BidiCall,
    requests: Vec<DynamicMessage>,
    interval: Duration,
) -> Result<BidiCall, CallError> {
    for (i, request) in requests.into_iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        if let Err(err) = call.send(request).await {
            // The call ended early; report why rather than the failed send.
            return Err(match call.join().await {
                Err(cause) => cause.into(),
                Ok(_) => err.into(),
            });
        }
    }

    call.half_close();
    Ok(call)
}

/// Surfaces the responses observed by the drain task, then the error that ended the call, if any.
fn drain_responses(call: BidiCall) -> JsonStream {
    stream::unfold(Some(call), |state| async move {
        let mut call = state?;

        match call.next().await {
            Some(response) => {
                let rendered = message::to_value(&response).map_err(CallError::from);
                Some((rendered, Some(call)))
            }
            None => match call.join().await {
                Ok(_) => None,
                Err(err) => Some((Err(CallError::from(err)), None)),
            },
        }
    })
    .boxed()
}
