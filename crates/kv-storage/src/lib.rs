//! Key-value item store trait and implementations
//!
//! This crate defines the item store interface (tables of items addressed by
//! a hash key and optional range key), a pull-based [`Cursor`] for scans, and
//! an in-memory implementation configured from TOML.

mod config;
mod engine;
mod memory;
mod value;

pub use config::{attribute_from_json, item_from_json, StoreConfig, TableConfig};
pub use engine::{
    Cursor, ItemKey, ItemStore, KeyAttribute, KeySchema, StoreError, StoreResult,
};
pub use memory::{MemoryCursor, MemoryStore};
pub use value::{AttributeValue, Item, Number};
