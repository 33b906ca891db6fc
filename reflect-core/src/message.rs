//! # Dynamic Messages
//!
//! Allocation of runtime messages from descriptors, and conversion between those messages and
//! their JSON representation (proto3 JSON mapping, as implemented by `prost-reflect`).
//!
//! ## Populating
//!
//! [`populate`] is deliberately lenient:
//!
//! * members are matched by the field's JSON name (`retryCount`) or its proto name (`retry_count`);
//! * unknown members are dropped;
//! * a `null` member leaves its field unset;
//! * fields are assigned one at a time, so an invalid member aborts the operation but leaves the
//!   members before it assigned.
//!
//! ## Rendering
//!
//! [`render`] and [`render_pretty`] emit fields in the order of the descriptor, recursing into
//! nested messages. [`to_value`] produces the same members as a `serde_json::Value`. Fields
//! holding their default value are omitted.
use crate::ErrorKind;
use prost_reflect::{
    DeserializeOptions, DynamicMessage, MessageDescriptor, ReflectMessage, SerializeOptions,
};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid JSON: '{0}'")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Expected a JSON object for message '{message}', got: {found}")]
    NotAnObject { message: String, found: String },
    #[error("Invalid value for field '{field}' of message '{message}': '{source}'")]
    InvalidField {
        message: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to render message '{message}' to JSON: '{source}'")]
    Render {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Render { .. } => ErrorKind::Encode,
            _ => ErrorKind::Parse,
        }
    }
}

/// Allocates an empty message shaped by `descriptor`. Every field starts unset.
pub fn new_instance(descriptor: &MessageDescriptor) -> DynamicMessage {
    DynamicMessage::new(descriptor.clone())
}

/// Allocates a message for `descriptor` and populates it from `value`.
pub fn from_value(
    descriptor: &MessageDescriptor,
    value: Value,
) -> Result<DynamicMessage, BridgeError> {
    let mut message = new_instance(descriptor);
    populate_value(&mut message, value)?;
    Ok(message)
}

/// Parses `input` as JSON and assigns its members onto `message`.
pub fn populate(message: &mut DynamicMessage, input: &str) -> Result<(), BridgeError> {
    let value = serde_json::from_str(input).map_err(BridgeError::InvalidJson)?;
    populate_value(message, value)
}

/// Assigns the members of a JSON object onto `message`, field by field.
pub fn populate_value(message: &mut DynamicMessage, value: Value) -> Result<(), BridgeError> {
    let descriptor = message.descriptor();

    let members = match value {
        Value::Object(members) => members,
        other => {
            return Err(BridgeError::NotAnObject {
                message: descriptor.full_name().to_string(),
                found: kind_of(&other).to_string(),
            });
        }
    };

    let options = DeserializeOptions::new().deny_unknown_fields(false);

    for (name, member) in members {
        let Some(field) = descriptor
            .get_field_by_json_name(&name)
            .or_else(|| descriptor.get_field_by_name(&name))
        else {
            tracing::warn!(
                message = descriptor.full_name(),
                member = %name,
                "dropping unknown JSON member"
            );
            continue;
        };

        // Decode the member on its own, through a single-member object, so that the proto3 JSON
        // rules for its type apply, then move the decoded value over.
        let mut single = Map::new();
        single.insert(name, member);

        let decoded = DynamicMessage::deserialize_with_options(
            descriptor.clone(),
            Value::Object(single),
            &options,
        )
        .map_err(|source| BridgeError::InvalidField {
            message: descriptor.full_name().to_string(),
            field: field.name().to_string(),
            source,
        })?;

        // A null member decodes to an unset field, which must stay unset.
        if decoded.has_field(&field) {
            message.set_field(&field, decoded.get_field(&field).into_owned());
        } else {
            message.clear_field(&field);
        }
    }

    Ok(())
}

/// Converts `message` to a JSON value.
pub fn to_value(message: &DynamicMessage) -> Result<Value, BridgeError> {
    message
        .serialize_with_options(serde_json::value::Serializer, &SerializeOptions::new())
        .map_err(|source| BridgeError::Render {
            message: message.descriptor().full_name().to_string(),
            source,
        })
}

/// Renders `message` as compact JSON text.
pub fn render(message: &DynamicMessage) -> Result<String, BridgeError> {
    let mut out = Vec::new();
    write_json(message, &mut serde_json::Serializer::new(&mut out))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Renders `message` as indented JSON text.
pub fn render_pretty(message: &DynamicMessage) -> Result<String, BridgeError> {
    let mut out = Vec::new();
    write_json(message, &mut serde_json::Serializer::pretty(&mut out))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// Serializing straight to text keeps the descriptor's field order, which a `Value` would not.
fn write_json<W, F>(
    message: &DynamicMessage,
    serializer: &mut serde_json::Serializer<W, F>,
) -> Result<(), BridgeError>
where
    W: std::io::Write,
    F: serde_json::ser::Formatter,
{
    message
        .serialize_with_options(serializer, &SerializeOptions::new())
        .map_err(|source| BridgeError::Render {
            message: message.descriptor().full_name().to_string(),
            source,
        })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
