//! Upload policy documents.
//!
//! A policy document is the JSON object a client submits for signing before
//! uploading directly to an object store. Conditions arrive in two shapes:
//! objects (`{"bucket": "my-bucket"}`) and triplets
//! (`["content-length-range", 0, 1000]`). The parser is tolerant: absent or
//! malformed fields become `None` rather than errors, so validation logic can
//! decide what is mandatory.

use serde_json::Value;

/// The conditions extracted from a policy document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Target bucket (or equivalent container) the client declared.
    pub bucket: Option<String>,
    /// Object key, when declared as an equality condition.
    pub key: Option<String>,
    /// Canned ACL, when declared.
    pub acl: Option<String>,
    /// Declared `content-length-range` bounds, kept as raw strings so exact
    /// string comparison against configured limits is possible.
    pub content_length_range: Option<(String, String)>,
    /// The `x-amz-credential` condition, carrying the signing scope.
    pub credential: Option<String>,
    /// Policy expiration timestamp, passed through unparsed.
    pub expiration: Option<String>,
}

impl PolicyDocument {
    /// Extract the known conditions from a policy JSON value.
    pub fn parse(policy: &Value) -> Self {
        let mut doc = Self {
            expiration: policy
                .get("expiration")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Self::default()
        };

        let Some(conditions) = policy.get("conditions").and_then(Value::as_array) else {
            return doc;
        };

        for condition in conditions {
            match condition {
                Value::Object(map) => {
                    for (name, value) in map {
                        let value = scalar_to_string(value);
                        match name.as_str() {
                            "bucket" => doc.bucket = value,
                            "key" => doc.key = value,
                            "acl" => doc.acl = value,
                            "x-amz-credential" => doc.credential = value,
                            _ => {}
                        }
                    }
                }
                Value::Array(items) => {
                    if items.len() == 3
                        && items[0].as_str() == Some("content-length-range")
                        && let (Some(min), Some(max)) =
                            (scalar_to_string(&items[1]), scalar_to_string(&items[2]))
                    {
                        doc.content_length_range = Some((min, max));
                    }
                }
                _ => {}
            }
        }

        doc
    }
}

/// Render a JSON scalar as the string an exact-match comparison expects.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
