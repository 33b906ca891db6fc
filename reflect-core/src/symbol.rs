//! # Service Symbols
//!
//! A [`ServiceSymbol`] names one method of one service inside a package namespace.
//!
//! The same symbol is rendered in two different forms:
//!
//! * the reflection query, `reflect.TestService.Test`, sent as `file_containing_symbol`;
//! * the dispatch path, `/reflect.TestService/Test`, used as the HTTP/2 `:path` of the call.
//!
//! Both are computed from the same fields, so a schema can never be resolved for one method
//! while the request is sent to another.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceSymbol {
    namespace: String,
    service: String,
    method: String,
}

impl ServiceSymbol {
    pub fn new(
        namespace: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
            method: method.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Fully qualified service name, e.g. `reflect.TestService`.
    pub fn service_full_name(&self) -> String {
        qualify(&self.namespace, &self.service)
    }

    /// Symbol sent to the reflection service, e.g. `reflect.TestService.Test`.
    pub fn reflection_query(&self) -> String {
        format!("{}.{}", self.service_full_name(), self.method)
    }

    /// HTTP/2 path of the method, e.g. `/reflect.TestService/Test`.
    pub fn dispatch_path(&self) -> String {
        format!("/{}/{}", self.service_full_name(), self.method)
    }
}

impl fmt::Display for ServiceSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_full_name(), self.method)
    }
}

// An empty namespace addresses services declared without a package.
fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}
