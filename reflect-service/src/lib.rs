//! # Reflect Service
//!
//! The demo gRPC services that the dynamic client is exercised against, together with the
//! encoded `FileDescriptorSet` needed to register them with a server reflection service.
//!
//! * [`TestServiceImpl`]: fixed responses for every call shape.
//! * [`SyncServiceImpl`]: echoes the request back, optionally pacing server streams.
//! * [`AnnotatedServiceImpl`]: its messages import types from another file, which makes it
//!   useful to exercise cross-file descriptor resolution.

mod annotated_service;
mod sync_service;
mod test_service;

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/reflect.rs"));
}

pub use annotated_service::AnnotatedServiceImpl;
pub use pb::annotated_service_server::{AnnotatedService, AnnotatedServiceServer};
pub use pb::sync_service_server::{SyncService, SyncServiceServer};
pub use pb::test_service_server::{TestService, TestServiceServer};
pub use sync_service::SyncServiceImpl;
pub use test_service::{SERVER_STREAM_LEN, TestServiceImpl};

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
