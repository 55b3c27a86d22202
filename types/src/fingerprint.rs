//! Deterministic request identity.

use std::fmt;

use serde_json::Value;

use crate::request::RequestDescriptor;

/// Identity key shared by every semantically identical request.
///
/// Layout: `{method}-{url}-{canonical params}-{canonical body}`, where the
/// canonical form sorts object keys recursively so insertion order never
/// leaks into the key. A missing body and an empty object body share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn of(descriptor: &RequestDescriptor) -> Self {
        let mut key = String::with_capacity(descriptor.url().len() + 16);
        key.push_str(descriptor.method().as_str());
        key.push('-');
        key.push_str(descriptor.url());
        key.push('-');
        write_canonical_map(descriptor.params().iter(), &mut key);
        key.push('-');
        match descriptor.body() {
            Some(body) => write_canonical(body, &mut key),
            None => key.push_str("{}"),
        }
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render `value` as compact JSON with object keys in sorted order.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_map(map.iter(), out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars (including strings) already have a single compact rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_map<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
    out: &mut String,
) {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}
