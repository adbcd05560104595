//! Store configuration
//!
//! Tables and their seed items are declared in TOML. Seed items use the
//! typed attribute notation, one single-key table per attribute:
//!
//! ```toml
//! [[tables]]
//! name = "users"
//! hash_key = "id"
//! items = [
//!   { id = { N = "5" }, name = { S = "alice" }, tags = { SS = ["a", "b"] } },
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::{KeySchema, StoreError, StoreResult};
use crate::{AttributeValue, Item, Number};

/// Configuration for a [`MemoryStore`](crate::MemoryStore)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// One table declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,

    #[serde(default = "default_hash_key")]
    pub hash_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_key: Option<String>,

    #[serde(default)]
    pub items: Vec<JsonValue>,
}

fn default_hash_key() -> String {
    "id".to_string()
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Add a table declaration (builder style)
    pub fn with_table(mut self, table: TableConfig) -> Self {
        self.tables.push(table);
        self
    }
}

impl TableConfig {
    pub fn new(name: &str, schema: KeySchema) -> Self {
        TableConfig {
            name: name.to_string(),
            hash_key: schema.hash_key,
            range_key: schema.range_key,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: JsonValue) -> Self {
        self.items.push(item);
        self
    }

    pub fn key_schema(&self) -> KeySchema {
        KeySchema {
            hash_key: self.hash_key.clone(),
            range_key: self.range_key.clone(),
        }
    }

    /// Decode the seed items
    pub fn seed_items(&self) -> StoreResult<Vec<Item>> {
        self.items
            .iter()
            .map(|item| {
                item_from_json(item).map_err(|e| {
                    StoreError::Config(format!("table {}: {}", self.name, e))
                })
            })
            .collect()
    }
}

/// Decode an item written in typed attribute notation
pub fn item_from_json(value: &JsonValue) -> StoreResult<Item> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("item must be a table of attributes", value))?;
    object
        .iter()
        .map(|(name, value)| Ok((name.clone(), attribute_from_json(value)?)))
        .collect()
}

/// Decode one attribute value: `{ S = "x" }`, `{ N = "1" }`, `{ L = [...] }`, ...
pub fn attribute_from_json(value: &JsonValue) -> StoreResult<AttributeValue> {
    let object = value
        .as_object()
        .filter(|object| object.len() == 1)
        .ok_or_else(|| invalid("attribute must have exactly one type key", value))?;
    let (tag, inner) = object
        .iter()
        .next()
        .ok_or_else(|| invalid("attribute must have exactly one type key", value))?;

    match tag.as_str() {
        "S" => string(inner).map(AttributeValue::String),
        "N" => number(inner).map(AttributeValue::Number),
        "B" => binary(inner).map(AttributeValue::Binary),
        "BOOL" => inner
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| invalid("BOOL must be a boolean", inner)),
        "NULL" => match inner.as_bool() {
            Some(true) => Ok(AttributeValue::Null),
            _ => Err(invalid("NULL must be true", inner)),
        },
        "L" => array(inner)?
            .iter()
            .map(attribute_from_json)
            .collect::<StoreResult<Vec<_>>>()
            .map(AttributeValue::List),
        "M" => inner
            .as_object()
            .ok_or_else(|| invalid("M must be a table", inner))?
            .iter()
            .map(|(name, value)| Ok((name.clone(), attribute_from_json(value)?)))
            .collect::<StoreResult<HashMap<_, _>>>()
            .map(AttributeValue::Map),
        "SS" => non_empty(array(inner)?, inner)?
            .iter()
            .map(string)
            .collect::<StoreResult<Vec<_>>>()
            .map(AttributeValue::StringSet),
        "NS" => non_empty(array(inner)?, inner)?
            .iter()
            .map(number)
            .collect::<StoreResult<Vec<_>>>()
            .map(AttributeValue::NumberSet),
        "BS" => non_empty(array(inner)?, inner)?
            .iter()
            .map(binary)
            .collect::<StoreResult<Vec<_>>>()
            .map(AttributeValue::BinarySet),
        other => Err(StoreError::Config(format!(
            "unknown attribute type {}",
            other
        ))),
    }
}

fn invalid(message: &str, value: &JsonValue) -> StoreError {
    StoreError::Config(format!("{}: {}", message, value))
}

fn string(value: &JsonValue) -> StoreResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid("expected a string", value))
}

fn number(value: &JsonValue) -> StoreResult<Number> {
    value
        .as_str()
        .and_then(Number::parse)
        .ok_or_else(|| invalid("expected numeric text", value))
}

fn binary(value: &JsonValue) -> StoreResult<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| invalid("expected base64 text", value))?;
    STANDARD
        .decode(text)
        .map_err(|e| invalid(&format!("invalid base64 ({})", e), value))
}

fn array(value: &JsonValue) -> StoreResult<&Vec<JsonValue>> {
    value
        .as_array()
        .ok_or_else(|| invalid("expected an array", value))
}

fn non_empty<'a>(values: &'a Vec<JsonValue>, original: &JsonValue) -> StoreResult<&'a Vec<JsonValue>> {
    if values.is_empty() {
        Err(invalid("sets must not be empty", original))
    } else {
        Ok(values)
    }
}
