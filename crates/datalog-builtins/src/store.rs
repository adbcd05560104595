//! Predicates over an item store
//!
//! Argument errors are reported when the predicate is called. Store
//! requests run when the first solution is pulled, so a goal that is never
//! reached never touches the store.

use std::sync::Arc;

use datalog_core::Substitution;
use datalog_parser::{Term, Value};
use kv_storage::{Item, ItemStore};
use tracing::{debug, warn};

use crate::codec::{decode, decode_item, encode, encode_item, simplify};
use crate::error::{BuiltinError, BuiltinResult};
use crate::keys::item_key;
use crate::registry::Builtins;
use crate::stream::{deferred, unify_once, unify_stream, ItemStream, LookupCursor, NameCursor, Solutions};

/// Table names are atoms
pub fn table_name(term: &Term, subst: &Substitution) -> BuiltinResult<String> {
    match subst.resolve(term) {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Atom(name)) => Ok(name.as_str().to_string()),
        other => Err(BuiltinError::type_error("atom", subst.apply(other))),
    }
}

/// `attribute_value(?Attr, ?Value)`
///
/// With `Attr` unbound, `Value` is normalised to its tagged form. Otherwise
/// the tags are stripped from `Attr` and the result unified with `Value`.
pub fn attribute_value(attr: &Term, value: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
    match subst.resolve(attr) {
        Term::Variable(_) => {
            let tagged = decode(&encode(value, subst)?);
            Ok(unify_once(attr, &tagged, subst))
        }
        _ => {
            let plain = simplify(attr, subst)?;
            Ok(unify_once(value, &plain, subst))
        }
    }
}

pub struct StorePredicates<S> {
    store: Arc<S>,
}

impl<S: ItemStore + 'static> StorePredicates<S> {
    pub fn new(store: S) -> Self {
        StorePredicates {
            store: Arc::new(store),
        }
    }

    /// `list_tables(?Name)`
    pub fn list_tables(&self, name: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
        debug!("list_tables");
        let store = Arc::clone(&self.store);
        let stream = ItemStream::new(
            move || store.list_tables().map(NameCursor::new),
            |name: String| Term::atom(&name),
        );
        Ok(unify_stream(stream, name.clone(), subst.clone()))
    }

    /// `scan(+Table, ?Item)`
    pub fn scan(&self, table: &Term, item: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
        let table = table_name(table, subst)?;
        debug!(%table, "scan");
        let store = Arc::clone(&self.store);
        let stream = ItemStream::new(move || store.scan(&table), |row: Item| decode_item(&row));
        Ok(unify_stream(stream, item.clone(), subst.clone()))
    }

    /// `get_item(+Table, +Key, ?Item)`
    pub fn get_item(
        &self,
        table: &Term,
        key: &Term,
        item: &Term,
        subst: &Substitution,
    ) -> BuiltinResult<Solutions> {
        let table = table_name(table, subst)?;
        let key = item_key(key, subst)?;
        debug!(%table, ?key, "get_item");
        let store = Arc::clone(&self.store);
        let stream = ItemStream::new(
            move || Ok(LookupCursor::new(move || store.get(&table, &key))),
            |row: Item| decode_item(&row),
        );
        Ok(unify_stream(stream, item.clone(), subst.clone()))
    }

    /// `put_item(+Table, +Item)`
    pub fn put_item(&self, table: &Term, item: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
        let table = table_name(table, subst)?;
        let item = encode_item(item, subst)?;
        let store = Arc::clone(&self.store);
        let subst = subst.clone();
        Ok(deferred(move || {
            debug!(%table, "put_item");
            store.put(&table, item).map_err(|error| {
                warn!(%table, %error, "put_item failed");
                error
            })?;
            Ok(Some(subst))
        }))
    }

    /// `delete_item(+Table, +Key)`
    pub fn delete_item(&self, table: &Term, key: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
        let table = table_name(table, subst)?;
        let key = item_key(key, subst)?;
        let store = Arc::clone(&self.store);
        let subst = subst.clone();
        Ok(deferred(move || {
            debug!(%table, ?key, "delete_item");
            store.delete(&table, &key).map_err(|error| {
                warn!(%table, %error, "delete_item failed");
                error
            })?;
            Ok(Some(subst))
        }))
    }

    /// Register every store predicate
    pub fn register(self, builtins: &mut Builtins) {
        let predicates = Arc::new(self);

        let this = Arc::clone(&predicates);
        builtins.register("list_tables", 1, move |args: &[Term], subst: &Substitution| {
            this.list_tables(&args[0], subst)
        });
        let this = Arc::clone(&predicates);
        builtins.register("scan", 2, move |args: &[Term], subst: &Substitution| {
            this.scan(&args[0], &args[1], subst)
        });
        let this = Arc::clone(&predicates);
        builtins.register("get_item", 3, move |args: &[Term], subst: &Substitution| {
            this.get_item(&args[0], &args[1], &args[2], subst)
        });
        let this = Arc::clone(&predicates);
        builtins.register("put_item", 2, move |args: &[Term], subst: &Substitution| {
            this.put_item(&args[0], &args[1], subst)
        });
        let this = Arc::clone(&predicates);
        builtins.register("delete_item", 2, move |args: &[Term], subst: &Substitution| {
            this.delete_item(&args[0], &args[1], subst)
        });
        builtins.register("attribute_value", 2, |args: &[Term], subst: &Substitution| {
            attribute_value(&args[0], &args[1], subst)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_parser::{parse_term, SrcId};
    use internment::Intern;
    use kv_storage::{AttributeValue, KeySchema, MemoryStore, Number, StoreError};

    fn term(text: &str) -> Term {
        parse_term(text, SrcId::empty()).unwrap()
    }

    fn var(name: &str) -> datalog_parser::Symbol {
        Intern::new(name.to_string())
    }

    fn n(value: i64) -> AttributeValue {
        AttributeValue::Number(Number::from(value))
    }

    fn s(text: &str) -> AttributeValue {
        AttributeValue::String(text.to_string())
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("users", KeySchema::hash("id")).unwrap();
        store
            .create_table("events", KeySchema::composite("UserID", "Timestamp"))
            .unwrap();
        store
            .put(
                "users",
                Item::from([("id".to_string(), n(5)), ("name".to_string(), s("alice"))]),
            )
            .unwrap();
        store
            .put(
                "users",
                Item::from([("id".to_string(), n(6)), ("name".to_string(), s("bob"))]),
            )
            .unwrap();
        store
    }

    fn bindings(solutions: Solutions, name: &str) -> Vec<Term> {
        solutions
            .map(|solution| solution.unwrap().apply(&Term::var(name)))
            .collect()
    }

    #[test]
    fn test_list_tables() {
        let predicates = StorePredicates::new(store());
        let names = bindings(
            predicates.list_tables(&term("T"), &Substitution::new()).unwrap(),
            "T",
        );
        assert_eq!(names, vec![Term::atom("events"), Term::atom("users")]);

        let checked = predicates
            .list_tables(&term("users"), &Substitution::new())
            .unwrap();
        assert_eq!(checked.count(), 1);
    }

    #[test]
    fn test_scan_decodes_rows() {
        let predicates = StorePredicates::new(store());
        let rows = bindings(
            predicates
                .scan(&term("users"), &term("Item"), &Substitution::new())
                .unwrap(),
            "Item",
        );
        assert_eq!(
            rows,
            vec![
                term("[id-n('5'), name-s(alice)]"),
                term("[id-n('6'), name-s(bob)]"),
            ]
        );
    }

    #[test]
    fn test_scan_with_pattern() {
        let predicates = StorePredicates::new(store());
        let names = bindings(
            predicates
                .scan(&term("users"), &term("[id-n('6'), name-s(N)]"), &Substitution::new())
                .unwrap(),
            "N",
        );
        assert_eq!(names, vec![Term::atom("bob")]);
    }

    #[test]
    fn test_scan_argument_errors_are_eager() {
        let predicates = StorePredicates::new(store());
        assert_eq!(
            predicates.scan(&term("T"), &term("I"), &Substitution::new()).err(),
            Some(BuiltinError::Instantiation)
        );
        assert_eq!(
            predicates.scan(&term("42"), &term("I"), &Substitution::new()).err(),
            Some(BuiltinError::type_error("atom", Term::integer(42)))
        );
    }

    #[test]
    fn test_scan_unknown_table_fails_on_pull() {
        let predicates = StorePredicates::new(store());
        let mut solutions = predicates
            .scan(&term("missing"), &term("I"), &Substitution::new())
            .unwrap();
        assert_eq!(
            solutions.next(),
            Some(Err(BuiltinError::Store(StoreError::TableNotFound(
                "missing".to_string()
            ))))
        );
        assert!(solutions.next().is_none());
    }

    #[test]
    fn test_get_item() {
        let predicates = StorePredicates::new(store());
        let found = bindings(
            predicates
                .get_item(&term("users"), &term("id-5"), &term("I"), &Substitution::new())
                .unwrap(),
            "I",
        );
        assert_eq!(found, vec![term("[id-n('5'), name-s(alice)]")]);

        let missing = predicates
            .get_item(&term("users"), &term("id-7"), &term("I"), &Substitution::new())
            .unwrap();
        assert_eq!(missing.count(), 0);
    }

    #[test]
    fn test_get_item_unknown_table() {
        let predicates = StorePredicates::new(store());
        let mut solutions = predicates
            .get_item(&term("missing"), &term("id-5"), &term("I"), &Substitution::new())
            .unwrap();
        assert_eq!(
            solutions.next(),
            Some(Err(BuiltinError::Store(StoreError::TableNotFound(
                "missing".to_string()
            ))))
        );
        assert!(solutions.next().is_none());
    }

    #[test]
    fn test_get_item_key_errors() {
        let predicates = StorePredicates::new(store());
        assert_eq!(
            predicates
                .get_item(&term("users"), &term("K"), &term("I"), &Substitution::new())
                .err(),
            Some(BuiltinError::Instantiation)
        );

        let mut wrong_name = predicates
            .get_item(&term("users"), &term("email-x"), &term("I"), &Substitution::new())
            .unwrap();
        assert!(matches!(
            wrong_name.next(),
            Some(Err(BuiltinError::Store(StoreError::Validation(_))))
        ));
    }

    #[test]
    fn test_put_then_get_then_delete() {
        let backing = store();
        let predicates = StorePredicates::new(backing.clone());
        let subst = Substitution::new();

        let put = predicates
            .put_item(
                &term("events"),
                &term("['UserID'-4002, 'Timestamp'-1, kind-login]"),
                &subst,
            )
            .unwrap();
        assert_eq!(put.count(), 1);
        assert_eq!(backing.len("events").unwrap(), 1);

        let key = term("'UserID'-4002 -&- 'Timestamp'-1");
        let found = bindings(
            predicates
                .get_item(&term("events"), &key, &term("I"), &subst)
                .unwrap(),
            "I",
        );
        assert_eq!(
            found,
            vec![term("['Timestamp'-n('1'), 'UserID'-n('4002'), kind-s(login)]")]
        );

        assert_eq!(
            predicates.delete_item(&term("events"), &key, &subst).unwrap().count(),
            1
        );
        assert_eq!(
            predicates
                .get_item(&term("events"), &key, &term("I"), &subst)
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_put_is_deferred() {
        let backing = store();
        let predicates = StorePredicates::new(backing.clone());
        let solutions = predicates
            .put_item(&term("users"), &term("[id-9]"), &Substitution::new())
            .unwrap();
        assert_eq!(backing.len("users").unwrap(), 2);
        drop(solutions);
        assert_eq!(backing.len("users").unwrap(), 2);
    }

    #[test]
    fn test_put_validation_error() {
        let predicates = StorePredicates::new(store());
        let mut solutions = predicates
            .put_item(&term("users"), &term("[name-nobody]"), &Substitution::new())
            .unwrap();
        assert!(matches!(
            solutions.next(),
            Some(Err(BuiltinError::Store(StoreError::Validation(_))))
        ));
    }

    #[test]
    fn test_put_item_encode_error_is_eager() {
        let predicates = StorePredicates::new(store());
        assert_eq!(
            predicates
                .put_item(&term("users"), &term("[id-X]"), &Substitution::new())
                .err(),
            Some(BuiltinError::Instantiation)
        );
    }

    #[test]
    fn test_attribute_value_normalises() {
        let solution = attribute_value(&term("A"), &term("[name-alice, age-30]"), &Substitution::new())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(
            solution.apply(&term("A")),
            term("m([age-n('30'), name-s(alice)])")
        );
    }

    #[test]
    fn test_attribute_value_simplifies() {
        let solution = attribute_value(&term("n('42')"), &term("V"), &Substitution::new())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(solution.get(&var("V")), Some(&Term::integer(42)));

        let mismatch = attribute_value(&term("s(a)"), &term("b"), &Substitution::new()).unwrap();
        assert_eq!(mismatch.count(), 0);
    }

    #[test]
    fn test_attribute_value_errors() {
        assert_eq!(
            attribute_value(&term("A"), &term("V"), &Substitution::new()).err(),
            Some(BuiltinError::Instantiation)
        );
    }
}
