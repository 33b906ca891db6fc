//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol
//! and to turn what the server returns into usable descriptors.
//!
//! * [`client`] speaks the wire protocol (`grpc.reflection.v1`).
//! * [`resolver`] decodes and links the returned files and looks up methods in them.
pub mod client;
pub mod resolver;
