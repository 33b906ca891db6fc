//! # Invocation Driver
//!
//! This module wraps a standard `tonic` client to provide a generic interface for
//! gRPC communication with runtime-shaped messages.
//!
//! ## How it works
//!
//! The [`Invoker`] utilizes the [`super::codec::DynamicCodec`] to handle serialization.
//! It takes a [`ResolvedMethod`] and `DynamicMessage` payloads, builds the dispatch path from
//! the method's symbol and hands everything to `tonic`.
//!
//! ## Call shapes
//!
//! The shape of a call is read from the method descriptor ([`CallShape::of`]). Each call method
//! checks that the shape it implements is the one the method declares before anything is sent,
//! so a caller cannot drive a streaming method as a unary one by mistake.
//!
//! Payloads are moved into the driver: once a message is handed over it belongs to the I/O layer.
use super::codec::DynamicCodec;
use crate::{BoxError, ErrorKind, reflection::resolver::ResolvedMethod};
use futures_util::{Stream, StreamExt, stream::BoxStream};
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::{fmt, str::FromStr};
use tonic::{Code, client::GrpcService, transport::Channel};

/// A lazily consumed sequence of responses. It ends on the server's end-of-stream and cannot be
/// restarted.
pub type ResponseStream = BoxStream<'static, Result<DynamicMessage, InvokeError>>;

#[derive(thiserror::Error, Debug)]
pub enum InvokeError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid dispatch path '{path}': '{source}'")]
    InvalidPath {
        path: String,
        #[source]
        source: http::uri::InvalidUri,
    },
    #[error("Method '{method}' is {declared} but was called as {requested}")]
    ShapeMismatch {
        method: String,
        declared: CallShape,
        requested: CallShape,
    },
    #[error("gRPC call failed: '{0}'")]
    Status(#[from] tonic::Status),
    #[error("The call is half-closed, no more messages can be sent")]
    HalfClosed,
    #[error("The call ended before the message could be sent")]
    SendFailed,
    #[error("The receive task did not complete: '{0}'")]
    DrainTask(#[from] tokio::task::JoinError),
}

impl InvokeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch { .. } => ErrorKind::Parse,
            Self::Status(status) if status.code() == Code::Unimplemented => ErrorKind::NotFound,
            _ => ErrorKind::Transport,
        }
    }
}

/// The four gRPC call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    Unary,
    ServerStreaming,
    ClientStreaming,
    Bidirectional,
}

impl CallShape {
    /// Shape declared by the method's streaming flags.
    pub fn of(method: &MethodDescriptor) -> Self {
        match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => CallShape::Unary,
            (false, true) => CallShape::ServerStreaming,
            (true, false) => CallShape::ClientStreaming,
            (true, true) => CallShape::Bidirectional,
        }
    }

    pub fn is_client_streaming(self) -> bool {
        matches!(self, CallShape::ClientStreaming | CallShape::Bidirectional)
    }

    pub fn is_server_streaming(self) -> bool {
        matches!(self, CallShape::ServerStreaming | CallShape::Bidirectional)
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallShape::Unary => "unary",
            CallShape::ServerStreaming => "server streaming",
            CallShape::ClientStreaming => "client streaming",
            CallShape::Bidirectional => "bidirectional streaming",
        };
        f.write_str(name)
    }
}

/// A generic gRPC client exchanging `DynamicMessage`s.
#[derive(Debug, Clone)]
pub struct Invoker<S = Channel> {
    pub(super) client: tonic::client::Grpc<S>,
}

impl<S> Invoker<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    pub async fn unary(
        &mut self,
        method: &ResolvedMethod,
        request: DynamicMessage,
    ) -> Result<DynamicMessage, InvokeError> {
        check_shape(method, CallShape::Unary)?;
        let path = dispatch_path(method)?;
        self.ready().await?;

        tracing::debug!(path = %path, "unary call");
        let codec = DynamicCodec::new(method.input(), method.output());
        let response = self
            .client
            .unary(tonic::Request::new(request), path, codec)
            .await?;

        Ok(response.into_inner())
    }

    /// Performs a Server Streaming gRPC call (Single Request -> Stream of Responses).
    ///
    /// The returned stream yields responses as they arrive and ends when the server closes the
    /// stream. Any other failure is yielded as an error item.
    pub async fn server_streaming(
        &mut self,
        method: &ResolvedMethod,
        request: DynamicMessage,
    ) -> Result<ResponseStream, InvokeError> {
        check_shape(method, CallShape::ServerStreaming)?;
        let path = dispatch_path(method)?;
        self.ready().await?;

        tracing::debug!(path = %path, "server streaming call");
        let codec = DynamicCodec::new(method.input(), method.output());
        let response = self
            .client
            .server_streaming(tonic::Request::new(request), path, codec)
            .await?;

        Ok(into_response_stream(response.into_inner()))
    }

    /// Performs a Client Streaming gRPC call (Stream of Requests -> Single Response).
    ///
    /// Requests are sent in the order the stream yields them. When the stream is exhausted the
    /// sending side is half-closed and the single response is awaited.
    pub async fn client_streaming(
        &mut self,
        method: &ResolvedMethod,
        requests: impl Stream<Item = DynamicMessage> + Send + 'static,
    ) -> Result<DynamicMessage, InvokeError> {
        check_shape(method, CallShape::ClientStreaming)?;
        let path = dispatch_path(method)?;
        self.ready().await?;

        tracing::debug!(path = %path, "client streaming call");
        let codec = DynamicCodec::new(method.input(), method.output());
        let response = self
            .client
            .client_streaming(tonic::Request::new(requests), path, codec)
            .await?;

        Ok(response.into_inner())
    }

    /// Performs a Bidirectional Streaming gRPC call (Stream of Requests -> Stream of Responses).
    ///
    /// This form drives sends from a stream. See [`super::bidi`] for the form where sends are
    /// issued one by one while a dedicated task drains the responses.
    pub async fn bidirectional_streaming(
        &mut self,
        method: &ResolvedMethod,
        requests: impl Stream<Item = DynamicMessage> + Send + 'static,
    ) -> Result<ResponseStream, InvokeError> {
        check_shape(method, CallShape::Bidirectional)?;
        let path = dispatch_path(method)?;
        self.ready().await?;

        tracing::debug!(path = %path, "bidirectional streaming call");
        let codec = DynamicCodec::new(method.input(), method.output());
        let response = self
            .client
            .streaming(tonic::Request::new(requests), path, codec)
            .await?;

        Ok(into_response_stream(response.into_inner()))
    }

    async fn ready(&mut self) -> Result<(), InvokeError> {
        self.client
            .ready()
            .await
            .map_err(|e| InvokeError::ClientNotReady(e.into()))
    }
}

/// Fails with [`InvokeError::ShapeMismatch`] if `method` does not declare the `requested` shape.
pub fn check_shape(method: &ResolvedMethod, requested: CallShape) -> Result<(), InvokeError> {
    let declared = method.shape();

    if declared == requested {
        Ok(())
    } else {
        Err(InvokeError::ShapeMismatch {
            method: method.symbol().to_string(),
            declared,
            requested,
        })
    }
}

pub(super) fn dispatch_path(
    method: &ResolvedMethod,
) -> Result<http::uri::PathAndQuery, InvokeError> {
    let path = method.dispatch_path();
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|source| InvokeError::InvalidPath { path, source })
}

fn into_response_stream(
    stream: impl Stream<Item = Result<DynamicMessage, tonic::Status>> + Send + 'static,
) -> ResponseStream {
    stream.map(|item| item.map_err(InvokeError::from)).boxed()
}
