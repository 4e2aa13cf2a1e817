use serde_json::{Map, Value};

/// Identifies a single row: partition key plus row key.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct EntityKey {
    pub partition_key: String,
    pub row_key: String,
}

impl EntityKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

/// A row with its user-defined properties. Key columns and service metadata
/// (timestamps, etags) are never part of `properties`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    pub properties: Map<String, Value>,
}

impl Entity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            properties: Map::new(),
        }
    }

    pub fn with_properties(key: EntityKey, properties: Map<String, Value>) -> Self {
        Self {
            key,
            properties,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.properties.get(name).and_then(Value::as_i64)
    }
}

/// Outcome of a point lookup. A missing row is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityLookup {
    Found(Entity),
    NotFound,
}

impl EntityLookup {
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Self::Found(entity) => Some(entity),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UpdateMode {
    /// Stored properties are overwritten by the given ones; properties not present are dropped.
    Replace,
    /// Given properties are written over the stored ones; other stored properties are kept.
    Merge,
}
