//! Cache key derivation
//!
//! A key is derived from an account, a namespace naming the logical query
//! and a parameter object. Parameters are rendered with object properties
//! sorted by name, so `{a:1,b:2}` and `{b:2,a:1}` produce the same key.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{CacheError, Result};

/// Query parameters in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct Params(Value);

impl Params {
    /// Empty parameter object
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Add or replace one parameter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self.0 {
            Value::Object(map) => {
                map.insert(name.into(), value.into());
            }
            other => {
                let mut map = Map::new();
                map.insert(name.into(), value.into());
                *other = Value::Object(map);
            }
        }
        self
    }

    /// Build parameters from any serializable filter/query struct
    pub fn from_serialize<T: Serialize + ?Sized>(params: &T) -> Result<Self> {
        serde_json::to_value(params)
            .map(Self)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// The raw JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Canonical string form with object properties sorted by name
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        write_canonical(&self.0, &mut out);
        out
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Identity of one cached query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryKey {
    account_id: String,
    namespace: String,
    params: Params,
}

impl QueryKey {
    /// Key with empty parameters
    pub fn new(account_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            namespace: namespace.into(),
            params: Params::new(),
        }
    }

    /// Attach parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Fully-qualified key under the given prefix
    ///
    /// Account, namespace and params are written as one JSON array, so no
    /// character inside a component can move the boundary between them.
    pub fn full_key(&self, prefix: &str) -> String {
        format!(
            "{}:[{},{},{}]",
            prefix,
            Value::String(self.account_id.clone()),
            Value::String(self.namespace.clone()),
            self.params.canonical()
        )
    }
}
