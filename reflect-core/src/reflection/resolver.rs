//! # Descriptor Resolver
//!
//! Turns a [`ServiceSymbol`] into live `prost-reflect` descriptors.
//!
//! With the default [`ImportPolicy::FirstFileOnly`] a resolution goes like this:
//!
//! 1. Ask the reflection service for the file containing `<namespace>.<service>.<method>`.
//! 2. Keep the first serialized file of the response and ignore the rest.
//! 3. Decode it into a `FileDescriptorProto`.
//! 4. Link it into an **empty** `DescriptorPool`. Imports are not resolved, so a file that
//!    depends on another file fails here.
//! 5. Look up the service, then the method, by exact, case-sensitive name.
//!
//! [`ImportPolicy::Transitive`] replaces steps 1 to 4 by a full walk of the import tree.
//!
//! Nothing is cached: every call to [`DescriptorResolver::resolve`] fetches the schema again,
//! so a server whose schema changed is picked up on the next call.
use super::client::{ReflectionClient, ReflectionError};
use crate::{
    BoxError, ErrorKind, config::ImportPolicy, grpc::client::CallShape, symbol::ServiceSymbol,
};
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool, MessageDescriptor, MethodDescriptor};
use prost_types::FileDescriptorProto;
use tonic::{client::GrpcService, transport::Channel};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Reflection request for '{symbol}' failed: '{source}'")]
    Reflection {
        symbol: String,
        #[source]
        source: ReflectionError,
    },
    #[error("Failed to list services: '{0}'")]
    ListServices(#[source] ReflectionError),
    #[error("The server returned no file descriptor for '{0}'")]
    EmptyResponse(String),
    #[error("Failed to decode FileDescriptorProto: '{0}'")]
    Decode(#[from] prost::DecodeError),
    #[error("Failed to link file descriptor: '{0}'")]
    Link(#[from] DescriptorError),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Reflection { source, .. } | Self::ListServices(source) => source.kind(),
            Self::Decode(_) | Self::Link(_) => ErrorKind::Decode,
            Self::EmptyResponse(_) | Self::ServiceNotFound(_) | Self::MethodNotFound { .. } => {
                ErrorKind::NotFound
            }
        }
    }
}

/// A method resolved through reflection, together with the symbol it was resolved from.
///
/// The descriptors are only meaningful relative to the pool they were linked into; they are
/// never mixed with descriptors coming from another resolution.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    symbol: ServiceSymbol,
    method: MethodDescriptor,
}

impl ResolvedMethod {
    pub fn symbol(&self) -> &ServiceSymbol {
        &self.symbol
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn input(&self) -> MessageDescriptor {
        self.method.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.method.output()
    }

    /// The `(input, output)` message descriptors of the method.
    pub fn descriptors(&self) -> (MessageDescriptor, MessageDescriptor) {
        (self.method.input(), self.method.output())
    }

    /// Call shape declared by the method's streaming flags.
    pub fn shape(&self) -> CallShape {
        CallShape::of(&self.method)
    }

    /// HTTP/2 path the call is sent to, derived from the same symbol as the reflection query.
    pub fn dispatch_path(&self) -> String {
        self.symbol.dispatch_path()
    }
}

/// Resolves service symbols through a server's reflection service.
#[derive(Debug, Clone)]
pub struct DescriptorResolver<S = Channel> {
    client: ReflectionClient<S>,
    namespace: String,
    import_policy: ImportPolicy,
}

impl<S> DescriptorResolver<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(channel: S, namespace: impl Into<String>) -> Self {
        Self {
            client: ReflectionClient::new(channel),
            namespace: namespace.into(),
            import_policy: ImportPolicy::default(),
        }
    }

    pub fn with_import_policy(mut self, import_policy: ImportPolicy) -> Self {
        self.import_policy = import_policy;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Builds a symbol in this resolver's namespace.
    pub fn symbol(&self, service: &str, method: &str) -> ServiceSymbol {
        ServiceSymbol::new(self.namespace.clone(), service, method)
    }

    /// Resolves `symbol` to its method descriptor.
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedMethod)` - The method and its input/output descriptors.
    /// * `Err(ResolveError)` - See [`ResolveError::kind`] for the taxonomy. No partial result is
    ///   ever returned.
    pub async fn resolve(
        &mut self,
        symbol: &ServiceSymbol,
    ) -> Result<ResolvedMethod, ResolveError> {
        let query = symbol.reflection_query();

        let pool = match self.import_policy {
            ImportPolicy::FirstFileOnly => {
                let files = self
                    .client
                    .file_containing_symbol(&query)
                    .await
                    .map_err(|source| ResolveError::Reflection {
                        symbol: query.clone(),
                        source,
                    })?;
                link_first_file(&query, files)?
            }
            ImportPolicy::Transitive => {
                let fd_set = self
                    .client
                    .file_descriptor_set_by_symbol(&query)
                    .await
                    .map_err(|source| ResolveError::Reflection {
                        symbol: query.clone(),
                        source,
                    })?;
                DescriptorPool::from_file_descriptor_set(fd_set)?
            }
        };

        let method = find_method(&pool, symbol)?;

        tracing::debug!(
            symbol = %symbol,
            input = method.input().full_name(),
            output = method.output().full_name(),
            "resolved method"
        );

        Ok(ResolvedMethod {
            symbol: symbol.clone(),
            method,
        })
    }

    /// Fetches a whole file by name (e.g. `reflect.proto`) and decodes the first file returned.
    pub async fn fetch_file_by_filename(
        &mut self,
        filename: &str,
    ) -> Result<FileDescriptorProto, ResolveError> {
        let files = self
            .client
            .file_by_filename(filename)
            .await
            .map_err(|source| ResolveError::Reflection {
                symbol: filename.to_string(),
                source,
            })?;

        decode_first_file(filename, files)
    }

    /// Lists the fully qualified names of the services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ResolveError> {
        self.client
            .list_services()
            .await
            .map_err(ResolveError::ListServices)
    }
}

/// Decodes the first serialized file of a reflection response.
///
/// The server may return several files (e.g. the imports of the requested one). Only the first
/// one is used; callers needing imported types must use [`ImportPolicy::Transitive`].
fn decode_first_file(
    requested: &str,
    files: Vec<Vec<u8>>,
) -> Result<FileDescriptorProto, ResolveError> {
    let total = files.len();
    let first = files
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::EmptyResponse(requested.to_string()))?;

    if total > 1 {
        tracing::warn!(
            requested,
            ignored = total - 1,
            "ignoring extra file descriptors returned by the server"
        );
    }

    Ok(FileDescriptorProto::decode(first.as_slice())?)
}

fn link_first_file(requested: &str, files: Vec<Vec<u8>>) -> Result<DescriptorPool, ResolveError> {
    let file = decode_first_file(requested, files)?;

    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file)?;

    Ok(pool)
}

fn find_method(
    pool: &DescriptorPool,
    symbol: &ServiceSymbol,
) -> Result<MethodDescriptor, ResolveError> {
    let service_name = symbol.service_full_name();

    let service = pool
        .get_service_by_name(&service_name)
        .ok_or_else(|| ResolveError::ServiceNotFound(service_name.clone()))?;

    service
        .methods()
        .find(|m| m.name() == symbol.method())
        .ok_or_else(|| ResolveError::MethodNotFound {
            service: service_name,
            method: symbol.method().to_string(),
        })
}
