//! In-memory item store implementation

use crate::config::StoreConfig;
use crate::engine::{Cursor, ItemKey, ItemStore, KeySchema, StoreError, StoreResult};
use crate::Item;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// In-memory item store
///
/// Clones share the same tables. Items keep insertion order; a put that
/// replaces an item keeps the replaced item's position.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<BTreeMap<String, TableData>>>,
}

#[derive(Debug, Clone)]
struct TableData {
    schema: KeySchema,
    rows: Vec<Item>,
}

impl TableData {
    fn position(&self, key: &ItemKey) -> StoreResult<Option<usize>> {
        self.schema.check(key)?;
        for (idx, row) in self.rows.iter().enumerate() {
            if self.schema.key_of(row)? == *key {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configuration: create every table, then insert its seed items
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let store = Self::new();
        for table in &config.tables {
            store.create_table(&table.name, table.key_schema())?;
            for item in table.seed_items()? {
                store.put(&table.name, item)?;
            }
            debug!(table = %table.name, items = table.items.len(), "seeded table");
        }
        Ok(store)
    }

    pub fn create_table(&self, name: &str, schema: KeySchema) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StoreError::TableExists(name.to_string()));
        }
        tables.insert(
            name.to_string(),
            TableData {
                schema,
                rows: Vec::new(),
            },
        );
        debug!(table = name, "created table");
        Ok(())
    }

    /// Number of items in a table
    pub fn len(&self, table: &str) -> StoreResult<usize> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

impl ItemStore for MemoryStore {
    type Cursor = MemoryCursor;

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().keys().cloned().collect())
    }

    fn get(&self, table: &str, key: &ItemKey) -> StoreResult<Option<Item>> {
        let tables = self.tables.read();
        let table_data = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(table_data
            .position(key)?
            .map(|idx| table_data.rows[idx].clone()))
    }

    fn put(&self, table: &str, item: Item) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let key = table_data.schema.key_of(&item)?;
        match table_data.position(&key)? {
            Some(idx) => {
                trace!(table, "replacing item");
                table_data.rows[idx] = item;
            }
            None => table_data.rows.push(item),
        }
        Ok(())
    }

    fn delete(&self, table: &str, key: &ItemKey) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        if let Some(idx) = table_data.position(key)? {
            table_data.rows.remove(idx);
        }
        Ok(())
    }

    fn scan(&self, table: &str) -> StoreResult<MemoryCursor> {
        if !self.tables.read().contains_key(table) {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        Ok(MemoryCursor {
            tables: Arc::clone(&self.tables),
            table: table.to_string(),
            position: 0,
            closed: false,
        })
    }
}

/// Cursor over the rows of one table
///
/// Rows are read one at a time under a short read lock, so writes made while
/// the cursor is open are visible to it.
#[derive(Debug)]
pub struct MemoryCursor {
    tables: Arc<RwLock<BTreeMap<String, TableData>>>,
    table: String,
    position: usize,
    closed: bool,
}

impl Cursor for MemoryCursor {
    type Item = Item;

    fn next(&mut self) -> StoreResult<Option<Item>> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        let tables = self.tables.read();
        let table_data = tables
            .get(&self.table)
            .ok_or_else(|| StoreError::TableNotFound(self.table.clone()))?;
        let row = table_data.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.closed = true;
        trace!(table = %self.table, rows = self.position, "scan cursor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeValue, KeyAttribute, Number};

    fn s(text: &str) -> AttributeValue {
        AttributeValue::String(text.to_string())
    }

    fn n(value: i64) -> AttributeValue {
        AttributeValue::Number(Number::from(value))
    }

    fn user(id: i64, name: &str) -> Item {
        Item::from([("id".to_string(), n(id)), ("name".to_string(), s(name))])
    }

    fn users_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("users", KeySchema::hash("id")).unwrap();
        store
    }

    fn drain(mut cursor: MemoryCursor) -> Vec<Item> {
        let mut rows = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            rows.push(row);
        }
        cursor.close();
        rows
    }

    #[test]
    fn test_create_table_twice() {
        let store = users_store();
        assert_eq!(
            store.create_table("users", KeySchema::hash("id")),
            Err(StoreError::TableExists("users".to_string()))
        );
    }

    #[test]
    fn test_list_tables_sorted() {
        let store = MemoryStore::new();
        store.create_table("zeta", KeySchema::hash("id")).unwrap();
        store.create_table("alpha", KeySchema::hash("id")).unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_put_get_replace() {
        let store = users_store();
        store.put("users", user(5, "alice")).unwrap();
        store.put("users", user(6, "bob")).unwrap();
        store.put("users", user(5, "carol")).unwrap();

        assert_eq!(store.len("users").unwrap(), 2);
        let key = ItemKey::hash("id", n(5));
        assert_eq!(store.get("users", &key).unwrap(), Some(user(5, "carol")));
        assert_eq!(store.get("users", &ItemKey::hash("id", n(7))).unwrap(), None);
    }

    #[test]
    fn test_put_without_key_attribute() {
        let store = users_store();
        let item = Item::from([("name".to_string(), s("nobody"))]);
        assert!(matches!(
            store.put("users", item),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_get_with_wrong_key_name() {
        let store = users_store();
        let key = ItemKey::hash("email", s("a@b"));
        assert!(matches!(
            store.get("users", &key),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryStore::new();
        let key = ItemKey::hash("id", n(1));
        assert_eq!(
            store.get("missing", &key),
            Err(StoreError::TableNotFound("missing".to_string()))
        );
        assert!(matches!(
            store.scan("missing"),
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_delete() {
        let store = users_store();
        store.put("users", user(5, "alice")).unwrap();
        let key = ItemKey::hash("id", n(5));
        store.delete("users", &key).unwrap();
        assert_eq!(store.get("users", &key).unwrap(), None);
        // deleting again is fine
        store.delete("users", &key).unwrap();
    }

    #[test]
    fn test_composite_key() {
        let store = MemoryStore::new();
        store
            .create_table("events", KeySchema::composite("UserID", "Timestamp"))
            .unwrap();
        let item = Item::from([
            ("UserID".to_string(), n(4002)),
            ("Timestamp".to_string(), n(1)),
            ("kind".to_string(), s("login")),
        ]);
        store.put("events", item.clone()).unwrap();

        let key = ItemKey::composite(
            KeyAttribute::new("UserID", n(4002)),
            KeyAttribute::new("Timestamp", n(1)),
        );
        assert_eq!(store.get("events", &key).unwrap(), Some(item));

        let hash_only = ItemKey::hash("UserID", n(4002));
        assert!(matches!(
            store.get("events", &hash_only),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_scan_insertion_order() {
        let store = users_store();
        store.put("users", user(3, "c")).unwrap();
        store.put("users", user(1, "a")).unwrap();
        store.put("users", user(2, "b")).unwrap();

        let rows = drain(store.scan("users").unwrap());
        let ids: Vec<_> = rows.iter().map(|row| row["id"].clone()).collect();
        assert_eq!(ids, vec![n(3), n(1), n(2)]);
    }

    #[test]
    fn test_cursor_after_close() {
        let store = users_store();
        store.put("users", user(1, "a")).unwrap();
        let mut cursor = store.scan("users").unwrap();
        cursor.close();
        assert_eq!(cursor.next(), Err(StoreError::CursorClosed));
    }

    #[test]
    fn test_clones_share_tables() {
        let store = users_store();
        let other = store.clone();
        other.put("users", user(1, "a")).unwrap();
        assert_eq!(store.len("users").unwrap(), 1);
    }
}
