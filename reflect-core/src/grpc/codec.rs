//! # DynamicMessage <-> Protobuf Codec
//!
//! This module implements `tonic::codec::Codec` so that `tonic` can transport
//! `prost_reflect::DynamicMessage`s directly, bypassing the need for generated Rust structs.
//!
//! 1. **Encoder**: checks that the outgoing message was built from the request descriptor and
//!    writes its Protobuf encoding to the gRPC buffer.
//! 2. **Decoder**: allocates a fresh message of the response descriptor for every frame and
//!    merges the received bytes into it.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A Codec for messages whose schema is only known at runtime.
///
/// It holds the descriptors (schemas) for both the request and the response messages.
pub struct DynamicCodec {
    /// Schema for the input message.
    req_desc: MessageDescriptor,
    /// Schema for the output message.
    res_desc: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(req_desc: MessageDescriptor, res_desc: MessageDescriptor) -> Self {
        Self { req_desc, res_desc }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder(self.req_desc.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.res_desc.clone())
    }
}

/// Responsible for encoding a `DynamicMessage` into Protobuf bytes.
pub struct DynamicEncoder(MessageDescriptor);

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        // Descriptors from different resolutions are never interchangeable.
        if item.descriptor() != self.0 {
            return Err(Status::internal(format!(
                "Request message '{}' does not match the method input '{}'",
                item.descriptor().full_name(),
                self.0.full_name()
            )));
        }

        item.encode_raw(dst);
        Ok(())
    }
}

/// Responsible for decoding Protobuf bytes into a `DynamicMessage`.
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode Protobuf bytes: {}", e)))?;

        Ok(Some(msg))
    }
}
