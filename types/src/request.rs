//! Immutable request descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// HTTP verb supported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    /// Only reads consult and populate the response cache.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Get)
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" | "del" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("request url must not be empty")]
    EmptyUrl,
    #[error("query parameters must be a JSON object, got {0}")]
    ParamsNotObject(&'static str),
    #[error("request body must be a JSON object or array, got {0}")]
    BodyNotStructured(&'static str),
    #[error("header name must not be empty")]
    EmptyHeaderName,
}

/// A fully-specified outbound call.
///
/// Built once through the consuming `with_*` methods and never mutated
/// afterwards. Validation happens at construction, so a descriptor that
/// exists can always be fingerprinted and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    params: Map<String, Value>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Result<Self, DescriptorError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(DescriptorError::EmptyUrl);
        }
        Ok(Self {
            method,
            url,
            params: Map::new(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
        })
    }

    /// Attach query parameters. `null` is treated as "no parameters".
    pub fn with_params(mut self, params: Value) -> Result<Self, DescriptorError> {
        match params {
            Value::Null => self.params = Map::new(),
            Value::Object(map) => self.params = map,
            other => return Err(DescriptorError::ParamsNotObject(json_type_name(&other))),
        }
        Ok(self)
    }

    /// Attach a JSON body. `null` clears the body.
    pub fn with_body(mut self, body: Value) -> Result<Self, DescriptorError> {
        self.body = match body {
            Value::Null => None,
            structured @ (Value::Object(_) | Value::Array(_)) => Some(structured),
            other => return Err(DescriptorError::BodyNotStructured(json_type_name(&other))),
        };
        Ok(self)
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DescriptorError::EmptyHeaderName);
        }
        self.headers.insert(name, value.into());
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Query parameters rendered as string pairs for the wire.
    ///
    /// Strings are sent verbatim; other JSON values use their compact JSON text.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
