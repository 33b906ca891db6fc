//! # Reflect Core
//!
//! `reflect-core` invokes gRPC methods on a remote server without compile-time generated
//! client stubs. Method and message shapes are discovered at runtime through the gRPC Server
//! Reflection Protocol, and requests are built and dispatched against those shapes.
//!
//! ## Key Components
//!
//! * **[`symbol::ServiceSymbol`]:** A `(namespace, service, method)` triple. It derives both the
//!   reflection query string and the HTTP/2 dispatch path, so the two never disagree.
//! * **[`reflection::resolver::DescriptorResolver`]:** Fetches the file descriptor containing a
//!   symbol and resolves it to a [`reflection::resolver::ResolvedMethod`].
//! * **[`message`]:** Allocates `DynamicMessage`s from descriptors and converts them from and to JSON.
//! * **[`grpc::client::Invoker`]:** Performs unary and streaming calls with `DynamicMessage` payloads.
//! * **[`client::DynamicClient`]:** Ties everything together: JSON in, JSON out.
//!
//! ## Errors
//!
//! Every module has its own error enum. All of them can be classified with a `kind()` method
//! returning an [`ErrorKind`], so callers can decide whether to abort a call or simply stop
//! consuming a stream.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod config;
pub mod grpc;
pub mod message;
pub mod reflection;
pub mod symbol;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification shared by every error type of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A stream could not be opened, or a send/receive on it failed.
    Transport,
    /// The requested service or method is not known to the server.
    NotFound,
    /// A descriptor returned by the server could not be decoded or linked.
    Decode,
    /// A JSON input is malformed or does not match the message schema.
    Parse,
    /// A message could not be rendered back to JSON.
    Encode,
}
