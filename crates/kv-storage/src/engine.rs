//! Item store trait definition

use crate::{AttributeValue, Item};
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("cursor is closed")]
    CursorClosed,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Key attribute names of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub hash_key: String,
    pub range_key: Option<String>,
}

impl KeySchema {
    pub fn hash(name: &str) -> Self {
        KeySchema {
            hash_key: name.to_string(),
            range_key: None,
        }
    }

    pub fn composite(hash: &str, range: &str) -> Self {
        KeySchema {
            hash_key: hash.to_string(),
            range_key: Some(range.to_string()),
        }
    }

    /// Extract the key of an item, failing when a key attribute is missing
    pub fn key_of(&self, item: &Item) -> StoreResult<ItemKey> {
        let attribute = |name: &str| {
            item.get(name)
                .filter(|value| value.is_scalar_key())
                .map(|value| KeyAttribute::new(name, value.clone()))
                .ok_or_else(|| {
                    StoreError::Validation(format!(
                        "item is missing key attribute {} (string, number or binary)",
                        name
                    ))
                })
        };

        Ok(ItemKey {
            hash: attribute(self.hash_key.as_str())?,
            range: self.range_key.as_deref().map(attribute).transpose()?,
        })
    }

    /// Check that a lookup key names exactly this schema's key attributes
    pub fn check(&self, key: &ItemKey) -> StoreResult<()> {
        let range_matches = match (&self.range_key, &key.range) {
            (None, None) => true,
            (Some(expected), Some(range)) => *expected == range.name,
            _ => false,
        };
        if key.hash.name != self.hash_key || !range_matches {
            return Err(StoreError::Validation(
                "the provided key element does not match the schema".to_string(),
            ));
        }
        Ok(())
    }
}

/// One named key attribute
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttribute {
    pub name: String,
    pub value: AttributeValue,
}

impl KeyAttribute {
    pub fn new(name: &str, value: AttributeValue) -> Self {
        KeyAttribute {
            name: name.to_string(),
            value,
        }
    }
}

/// Primary key of an item: hash part plus optional range part
#[derive(Debug, Clone, PartialEq)]
pub struct ItemKey {
    pub hash: KeyAttribute,
    pub range: Option<KeyAttribute>,
}

impl ItemKey {
    pub fn hash(name: &str, value: AttributeValue) -> Self {
        ItemKey {
            hash: KeyAttribute::new(name, value),
            range: None,
        }
    }

    pub fn composite(hash: KeyAttribute, range: KeyAttribute) -> Self {
        ItemKey {
            hash,
            range: Some(range),
        }
    }
}

/// A pull-based source of rows
///
/// `next` yields rows until it returns `Ok(None)`. `close` releases the
/// underlying resource; callers close each cursor exactly once.
pub trait Cursor {
    type Item;

    fn next(&mut self) -> StoreResult<Option<Self::Item>>;

    fn close(&mut self);
}

/// Trait for pluggable item stores
pub trait ItemStore {
    type Cursor: Cursor<Item = Item> + 'static;

    /// Names of all tables, sorted
    fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Fetch the item with the given key, if present
    fn get(&self, table: &str, key: &ItemKey) -> StoreResult<Option<Item>>;

    /// Insert an item, replacing any item with the same key
    fn put(&self, table: &str, item: Item) -> StoreResult<()>;

    /// Remove the item with the given key; absent items are not an error
    fn delete(&self, table: &str, key: &ItemKey) -> StoreResult<()>;

    /// Open a cursor over every item of a table
    fn scan(&self, table: &str) -> StoreResult<Self::Cursor>;
}
