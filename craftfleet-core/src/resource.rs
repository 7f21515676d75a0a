//! Resource - Descriptors for provisioned infrastructure
//!
//! A topology is made of `Resource` values. Attributes may point at other
//! resources through `Value::ResourceRef`; those references are the edges
//! of the dependency graph.

use std::collections::{BTreeSet, HashMap};

use serde_json::json;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "ecs.service", "efs.file_system")
    pub resource_type: String,
    /// Physical resource name
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Reference one of this resource's attributes (e.g., "arn", "id")
    pub fn attr(&self, attribute: impl Into<String>) -> Value {
        Value::ResourceRef(self.clone(), attribute.into())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (target, attribute_name)
    ResourceRef(ResourceId, String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Collect every resource referenced anywhere inside this value
    pub fn collect_refs(&self, out: &mut BTreeSet<ResourceId>) {
        match self {
            Value::ResourceRef(id, _) => {
                out.insert(id.clone());
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Value::Map(map) => map.values().for_each(|v| v.collect_refs(out)),
            Value::String(_) | Value::Int(_) | Value::Bool(_) => {}
        }
    }

    /// Returns true if any string literal inside this value contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            Value::String(s) => s.contains(needle),
            Value::ResourceRef(id, _) => id.name.contains(needle),
            Value::List(items) => items.iter().any(|v| v.mentions(needle)),
            Value::Map(map) => map
                .iter()
                .any(|(k, v)| k.contains(needle) || v.mentions(needle)),
            Value::Int(_) | Value::Bool(_) => false,
        }
    }

    /// Render as JSON. References become `{"ref": "<type>.<name>", "attribute": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Int(i) => json!(i),
            Value::Bool(b) => json!(b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::ResourceRef(id, attribute) => {
                json!({ "ref": id.to_string(), "attribute": attribute })
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Desired state of a single provisioned resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (lookup) that is never modified
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Resources referenced by this resource's attributes, sorted and deduplicated
    pub fn dependencies(&self) -> Vec<ResourceId> {
        let mut refs = BTreeSet::new();
        for value in self.attributes.values() {
            value.collect_refs(&mut refs);
        }
        refs.remove(&self.id);
        refs.into_iter().collect()
    }

    /// Returns true if any attribute mentions `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.attributes.values().any(|v| v.mentions(needle))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let attributes: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({
            "type": self.id.resource_type,
            "name": self.id.name,
            "read_only": self.read_only,
            "attributes": attributes,
        })
    }
}
