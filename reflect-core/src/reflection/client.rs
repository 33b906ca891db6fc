//! # Reflection Client
//!
//! A client implementation for `grpc.reflection.v1`.
//!
//! Every lookup opens its own `ServerReflectionInfo` stream on the shared connection, so
//! reflection queries never block, nor are blocked by, business calls running on the same channel.
//!
//! Two styles of lookup are offered:
//!
//! * **Single round trip** ([`ReflectionClient::file_containing_symbol`],
//!   [`ReflectionClient::file_by_filename`]): one request, one response, raw serialized files.
//! * **Transitive** ([`ReflectionClient::file_descriptor_set_by_symbol`]): keeps the stream
//!   open and requests every missing import by filename until the full `FileDescriptorSet`
//!   for the symbol is collected.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::{BoxError, ErrorKind};
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Streaming, client::GrpcService, transport::Channel};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(
        "Failed to start a stream request with the reflection server, reflection might not be supported: '{0}'"
    )]
    ServerStreamInitFailed(#[source] tonic::Status),

    #[error("The server stream returned an error status: '{0}'")]
    ServerStreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Internal error: Failed to send request to stream")]
    SendFailed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: Received unexpected response type: {0}")]
    UnexpectedResponseType(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),
}

impl ReflectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ServerStreamFailure(status) if status.code() == Code::NotFound => {
                ErrorKind::NotFound
            }
            Self::ServerError { code, .. } if *code == Code::NotFound as i32 => ErrorKind::NotFound,
            Self::DecodeError(_) => ErrorKind::Decode,
            _ => ErrorKind::Transport,
        }
    }
}

// The host defined in the reflection requests doesn't seem to be a mandatory field
// and there is no documentation about what it is about.
// So we won't enforce it from the user.
const EMPTY_HOST: &str = "";

/// A generic client for the gRPC Server Reflection Protocol.
#[derive(Debug, Clone)]
pub struct ReflectionClient<T = Channel> {
    client: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(channel: S) -> Self {
        let client = ServerReflectionClient::new(channel);
        Self { client }
    }

    /// Asks for the file that declares `symbol` (e.g. `reflect.TestService.Test`).
    ///
    /// # Returns
    ///
    /// * `Ok(files)` - The serialized `FileDescriptorProto`s exactly as the server sent them.
    ///   The list may be empty, or contain more than the file declaring the symbol.
    /// * `Err(ReflectionError)` - The exchange failed or the server answered with an error.
    pub async fn file_containing_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<Vec<Vec<u8>>, ReflectionError> {
        tracing::debug!(symbol, "reflection lookup by symbol");
        self.lookup(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await
    }

    /// Asks for a file by its name (e.g. `reflect.proto`).
    ///
    /// Same semantics as [`Self::file_containing_symbol`], only the request discriminant differs.
    pub async fn file_by_filename(
        &mut self,
        filename: &str,
    ) -> Result<Vec<Vec<u8>>, ReflectionError> {
        tracing::debug!(filename, "reflection lookup by filename");
        self.lookup(MessageRequest::FileByFilename(filename.to_string()))
            .await
    }

    /// Asks the reflection service for the file containing the requested symbol and all of its
    /// transitive imports.
    ///
    /// **Recursive Resolution**:
    ///    - The server returns a `FileDescriptorProto`.
    ///    - The client inspects the imports (dependencies) of that file.
    ///    - It recursively requests any missing dependencies until the full `FileDescriptorSet` is built.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        tracing::debug!(symbol, "transitive reflection lookup by symbol");

        let (tx, rx) = mpsc::channel(100);

        let mut response_stream = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionError::ServerStreamInitFailed)?
            .into_inner();

        let mut walk = ImportWalk::new(tx);
        walk.request(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;

        walk.run(&mut response_stream).await
    }

    /// Lists all services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        let response = self
            .exchange(MessageRequest::ListServices(String::new()))
            .await?;

        match response {
            MessageResponse::ListServicesResponse(resp) => {
                Ok(resp.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(unexpected_response(other)),
        }
    }

    async fn lookup(&mut self, request: MessageRequest) -> Result<Vec<Vec<u8>>, ReflectionError> {
        match self.exchange(request).await? {
            MessageResponse::FileDescriptorResponse(res) => Ok(res.file_descriptor_proto),
            other => Err(unexpected_response(other)),
        }
    }

    /// Opens a fresh reflection stream, sends a single request and waits for a single response.
    async fn exchange(
        &mut self,
        request: MessageRequest,
    ) -> Result<MessageResponse, ReflectionError> {
        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(request),
        };

        let mut response_stream = self
            .client
            .server_reflection_info(once(async { req }))
            .await
            .map_err(ReflectionError::ServerStreamInitFailed)?
            .into_inner();

        let response = response_stream
            .message()
            .await
            .map_err(ReflectionError::ServerStreamFailure)?
            .ok_or(ReflectionError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(message_response) => Ok(message_response),
            None => Err(ReflectionError::UnexpectedResponseType(
                "Empty Message".into(),
            )),
        }
    }
}

fn unexpected_response(response: MessageResponse) -> ReflectionError {
    match response {
        MessageResponse::ErrorResponse(e) => ReflectionError::ServerError {
            code: e.error_code,
            message: e.error_message,
        },
        other => ReflectionError::UnexpectedResponseType(format!("{other:?}")),
    }
}

/// State of a transitive lookup: the files received so far and the filenames already asked for.
///
/// Every request sent on the stream is answered by exactly one response, so the walk is over
/// once no request is pending.
struct ImportWalk {
    requests: mpsc::Sender<ServerReflectionRequest>,
    files: HashMap<String, FileDescriptorProto>,
    asked: HashSet<String>,
    pending: usize,
}

impl ImportWalk {
    fn new(requests: mpsc::Sender<ServerReflectionRequest>) -> Self {
        Self {
            requests,
            files: HashMap::new(),
            asked: HashSet::new(),
            pending: 0,
        }
    }

    async fn request(&mut self, request: MessageRequest) -> Result<(), ReflectionError> {
        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(request),
        };

        self.requests
            .send(req)
            .await
            .map_err(|_| ReflectionError::SendFailed)?;
        self.pending += 1;

        Ok(())
    }

    async fn run(
        mut self,
        responses: &mut Streaming<ServerReflectionResponse>,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        while self.pending > 0 {
            let response = responses
                .message()
                .await
                .map_err(ReflectionError::ServerStreamFailure)?
                .ok_or(ReflectionError::StreamClosed)?;

            self.pending -= 1;

            match response.message_response {
                Some(MessageResponse::FileDescriptorResponse(res)) => {
                    for raw in res.file_descriptor_proto {
                        self.absorb(FileDescriptorProto::decode(raw.as_slice())?)
                            .await?;
                    }
                }
                Some(other) => return Err(unexpected_response(other)),
                None => {
                    return Err(ReflectionError::UnexpectedResponseType(
                        "Empty Message".into(),
                    ));
                }
            }
        }

        Ok(FileDescriptorSet {
            file: self.files.into_values().collect(),
        })
    }

    /// Keeps `file` and asks for each of its imports not yet received nor asked for.
    async fn absorb(&mut self, file: FileDescriptorProto) -> Result<(), ReflectionError> {
        let name = file.name().to_string();
        if self.files.contains_key(&name) {
            return Ok(());
        }

        let missing: Vec<String> = file
            .dependency
            .iter()
            .filter(|dep| !self.files.contains_key(*dep) && !self.asked.contains(*dep))
            .cloned()
            .collect();

        self.files.insert(name, file);

        for dep in missing {
            tracing::debug!(dependency = %dep, "requesting imported file");
            self.asked.insert(dep.clone());
            self.request(MessageRequest::FileByFilename(dep)).await?;
        }

        Ok(())
    }
}
