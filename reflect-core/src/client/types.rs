use super::CallError;
use futures_util::stream::BoxStream;
use std::fmt;

/// A request object encapsulating all necessary information to perform a dynamic gRPC call.
#[derive(Debug, Clone)]
pub struct DynamicRequest {
    /// The service name, without the namespace (e.g., `TestService`).
    pub service: String,
    /// The name of the method to call (e.g., `Test`).
    pub method: String,
    /// The JSON body of the request.
    /// - For Unary/ServerStreaming: An Object `{}`.
    /// - For ClientStreaming/Bidirectional: An Array of Objects `[{}]`.
    pub body: serde_json::Value,
}

impl DynamicRequest {
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            body,
        }
    }
}

/// Responses of a streaming call, rendered to JSON as they arrive.
pub type JsonStream = BoxStream<'static, Result<serde_json::Value, CallError>>;

/// The result of a dynamic gRPC call.
pub enum DynamicResponse {
    /// A single response message (for Unary and Client Streaming calls).
    Unary(serde_json::Value),
    /// A stream of response messages (for Server Streaming and Bidirectional calls).
    ///
    /// The stream is lazy: nothing is received until it is polled.
    Streaming(JsonStream),
}

impl DynamicResponse {
    pub fn is_streaming(&self) -> bool {
        matches!(self, DynamicResponse::Streaming(_))
    }
}

impl fmt::Debug for DynamicResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicResponse::Unary(value) => f.debug_tuple("Unary").field(value).finish(),
            DynamicResponse::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}
