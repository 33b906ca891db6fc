use prost_types::FileDescriptorProto;
use reflect_core::{
    message::{self, BridgeError},
    prost_reflect::ReflectMessage,
};
use std::fmt::Display;

/// A wrapper struct for a formatted string, ready to be printed.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

impl Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {svc}\n"));
        }
        FormattedString(out.trim_end().to_string())
    }
}

/// Renders the whole descriptor, message definitions included, as indented JSON.
impl TryFrom<&FileDescriptorProto> for FormattedString {
    type Error = BridgeError;

    fn try_from(file: &FileDescriptorProto) -> Result<Self, Self::Error> {
        message::render_pretty(&file.transcode_to_dynamic()).map(FormattedString)
    }
}
