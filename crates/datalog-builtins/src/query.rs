//! Query evaluation
//!
//! A query is a conjunction of goals. Solutions are found depth-first and
//! produced one at a time; dropping the iterator abandons the search and
//! closes every open cursor.
//!
//! # Example
//!
//! ```ignore
//! // ?- scan(users, Item), Item = [id-_, name-s(Name)|_].
//! for solution in evaluate_query(&builtins, &query) {
//!     println!("{}", solution?.apply(&Term::var("Name")));
//! }
//! ```

use datalog_core::Substitution;
use datalog_parser::{Atom, Query, Symbol, Term};
use tracing::debug;

use crate::error::BuiltinResult;
use crate::registry::Builtins;
use crate::stream::{succeed, Solutions};

/// Lazy solutions of a query
pub struct QuerySolutions<'a> {
    builtins: &'a Builtins,
    goals: Vec<Atom>,
    /// `stack[i]` yields the substitutions that satisfy `goals[..i]`
    stack: Vec<Solutions>,
}

impl QuerySolutions<'_> {
    /// Abandon the search
    fn stop(&mut self) {
        self.stack.clear();
    }
}

impl Iterator for QuerySolutions<'_> {
    type Item = BuiltinResult<Substitution>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.len().checked_sub(1)?;
            match self.stack[level].next() {
                None => {
                    self.stack.pop();
                }
                Some(Err(error)) => {
                    debug!(%error, level, "query stopped");
                    self.stop();
                    return Some(Err(error));
                }
                Some(Ok(subst)) if level == self.goals.len() => return Some(Ok(subst)),
                Some(Ok(subst)) => match self.builtins.call(&self.goals[level], &subst) {
                    Ok(solutions) => self.stack.push(solutions),
                    Err(error) => {
                        debug!(%error, level, "query stopped");
                        self.stop();
                        return Some(Err(error));
                    }
                },
            }
        }
    }
}

/// Evaluate a query
pub fn evaluate_query<'a>(builtins: &'a Builtins, query: &Query) -> QuerySolutions<'a> {
    debug!(goals = query.body.len(), "evaluating query");
    QuerySolutions {
        builtins,
        goals: query.body.clone(),
        stack: vec![succeed(Substitution::new())],
    }
}

/// Variables of a query in order of first appearance
///
/// `_` and variables starting with `_` are left out.
pub fn query_variables(query: &Query) -> Vec<Symbol> {
    fn collect_term_vars(term: &Term, vars: &mut Vec<Symbol>) {
        match term {
            Term::Variable(v) => {
                if !v.starts_with('_') && !vars.contains(v) {
                    vars.push(*v);
                }
            }
            Term::Compound(_, args) => {
                for arg in args {
                    collect_term_vars(arg, vars);
                }
            }
            Term::Constant(_) => {}
        }
    }

    let mut vars = Vec::new();
    for atom in &query.body {
        for term in &atom.terms {
            collect_term_vars(term, &mut vars);
        }
    }
    vars
}

/// Fully resolved value of each variable
pub fn extract_bindings(subst: &Substitution, variables: &[Symbol]) -> Vec<(Symbol, Term)> {
    variables
        .iter()
        .map(|var| (*var, subst.apply(&Term::Variable(*var))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuiltinError;
    use datalog_parser::{parse_query, SrcId};
    use kv_storage::{
        AttributeValue, Cursor, Item, ItemKey, ItemStore, KeySchema, MemoryCursor, MemoryStore,
        Number, StoreError, StoreResult,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s.to_string())
    }

    fn query(text: &str) -> Query {
        parse_query(text, SrcId::empty()).unwrap()
    }

    fn users() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("users", KeySchema::hash("id")).unwrap();
        for (id, name) in [(1, "ann"), (2, "bob"), (3, "cy")] {
            store
                .put(
                    "users",
                    Item::from([
                        ("id".to_string(), AttributeValue::Number(Number::from(id))),
                        ("name".to_string(), AttributeValue::String(name.to_string())),
                    ]),
                )
                .unwrap();
        }
        store
    }

    fn answers(builtins: &Builtins, text: &str, var: &str) -> Vec<Term> {
        evaluate_query(builtins, &query(text))
            .map(|solution| solution.unwrap().apply(&Term::var(var)))
            .collect()
    }

    // ===== Conjunctions =====

    #[test]
    fn test_empty_conjunction_is_true() {
        let builtins = Builtins::new();
        assert_eq!(evaluate_query(&builtins, &query("true.")).count(), 1);
        assert_eq!(evaluate_query(&builtins, &query("fail.")).count(), 0);
    }

    #[test]
    fn test_backtracking_across_goals() {
        let builtins = Builtins::new();
        let results: Vec<(Term, Term)> = evaluate_query(
            &builtins,
            &query("between(1, 2, X), between(X, 3, Y)."),
        )
        .map(|solution| {
            let solution = solution.unwrap();
            (
                solution.apply(&Term::var("X")),
                solution.apply(&Term::var("Y")),
            )
        })
        .collect();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0], (Term::integer(1), Term::integer(1)));
        assert_eq!(results[4], (Term::integer(2), Term::integer(3)));
    }

    #[test]
    fn test_unification_goals() {
        let builtins = Builtins::new();
        assert_eq!(
            answers(&builtins, "X = f(Y), Y = 1.", "X"),
            vec![Term::compound("f", vec![Term::integer(1)])]
        );
        assert_eq!(answers(&builtins, "a \\= b, X = ok.", "X"), vec![Term::atom("ok")]);
        assert!(answers(&builtins, "a \\= a.", "X").is_empty());
    }

    #[test]
    fn test_json_goals_chain() {
        let builtins = Builtins::new();
        assert_eq!(
            answers(&builtins, "json_prolog(_JS, [a-1]), json_atom(_JS, JSON).", "JSON"),
            vec![Term::atom(r#"{"a":1}"#)]
        );
        assert_eq!(
            answers(&builtins, "json_atom(_JS, '[\"a\", 1]'), json_prolog(_JS, X).", "X"),
            vec![Term::list(vec![Term::atom("a"), Term::integer(1)])]
        );
    }

    #[test]
    fn test_infinite_goal_is_lazy() {
        let builtins = Builtins::new();
        let first: Vec<Term> = evaluate_query(&builtins, &query("between(1, inf, X)."))
            .take(3)
            .map(|solution| solution.unwrap().apply(&Term::var("X")))
            .collect();
        assert_eq!(first, vec![Term::integer(1), Term::integer(2), Term::integer(3)]);
    }

    // ===== Store Queries =====

    #[test]
    fn test_scan_and_filter() {
        let builtins = Builtins::with_store(users());
        assert_eq!(
            answers(
                &builtins,
                "scan(users, Item), Item = [id-n('2'), name-s(Name)].",
                "Name"
            ),
            vec![Term::atom("bob")]
        );
    }

    #[test]
    fn test_put_then_query() {
        let store = users();
        let builtins = Builtins::with_store(store.clone());
        let solutions = answers(
            &builtins,
            "put_item(users, [id-4, name-dee]), get_item(users, id-4, Item).",
            "Item",
        );
        assert_eq!(solutions.len(), 1);
        assert_eq!(store.len("users").unwrap(), 4);
    }

    #[test]
    fn test_attribute_value_in_query() {
        let builtins = Builtins::with_store(users());
        assert_eq!(
            answers(
                &builtins,
                "get_item(users, id-1, [_, name-N]), attribute_value(N, Name).",
                "Name"
            ),
            vec![Term::atom("ann")]
        );
    }

    #[test]
    fn test_error_stops_search() {
        let builtins = Builtins::with_store(users());
        let mut solutions = evaluate_query(&builtins, &query("between(1, 3, X), scan(nope, _)."));
        assert!(matches!(
            solutions.next(),
            Some(Err(BuiltinError::Store(StoreError::TableNotFound(_))))
        ));
        assert!(solutions.next().is_none());
    }

    #[test]
    fn test_unknown_predicate_stops_search() {
        let builtins = Builtins::new();
        let mut solutions = evaluate_query(&builtins, &query("true, nope(1)."));
        assert!(matches!(
            solutions.next(),
            Some(Err(BuiltinError::UnknownPredicate { .. }))
        ));
        assert!(solutions.next().is_none());
    }

    // ===== Cancellation =====

    /// Store whose scan cursors count how often they are closed
    #[derive(Clone)]
    struct CountingStore {
        inner: MemoryStore,
        closes: Arc<AtomicUsize>,
    }

    struct CountingCursor {
        inner: MemoryCursor,
        closes: Arc<AtomicUsize>,
    }

    impl Cursor for CountingCursor {
        type Item = Item;

        fn next(&mut self) -> StoreResult<Option<Item>> {
            self.inner.next()
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close();
        }
    }

    impl ItemStore for CountingStore {
        type Cursor = CountingCursor;

        fn list_tables(&self) -> StoreResult<Vec<String>> {
            self.inner.list_tables()
        }

        fn get(&self, table: &str, key: &ItemKey) -> StoreResult<Option<Item>> {
            self.inner.get(table, key)
        }

        fn put(&self, table: &str, item: Item) -> StoreResult<()> {
            self.inner.put(table, item)
        }

        fn delete(&self, table: &str, key: &ItemKey) -> StoreResult<()> {
            self.inner.delete(table, key)
        }

        fn scan(&self, table: &str) -> StoreResult<CountingCursor> {
            Ok(CountingCursor {
                inner: self.inner.scan(table)?,
                closes: Arc::clone(&self.closes),
            })
        }
    }

    #[test]
    fn test_dropping_solutions_closes_cursor() {
        let closes = Arc::new(AtomicUsize::new(0));
        let builtins = Builtins::with_store(CountingStore {
            inner: users(),
            closes: Arc::clone(&closes),
        });
        let mut solutions = evaluate_query(&builtins, &query("scan(users, Item)."));
        assert!(matches!(solutions.next(), Some(Ok(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(solutions);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhausted_scan_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let builtins = Builtins::with_store(CountingStore {
            inner: users(),
            closes: Arc::clone(&closes),
        });
        assert_eq!(evaluate_query(&builtins, &query("scan(users, _).")).count(), 3);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    // ===== Variables =====

    #[test]
    fn test_query_variables() {
        let q = query("scan(T, [id-X|_Rest]), X = Y, Y = T.");
        assert_eq!(query_variables(&q), vec![sym("T"), sym("X"), sym("Y")]);
    }

    #[test]
    fn test_extract_bindings() {
        let builtins = Builtins::new();
        let q = query("X = f(Y), Y = 2.");
        let solution = evaluate_query(&builtins, &q).next().unwrap().unwrap();
        let bindings = extract_bindings(&solution, &query_variables(&q));
        assert_eq!(
            bindings,
            vec![
                (sym("X"), Term::compound("f", vec![Term::integer(2)])),
                (sym("Y"), Term::integer(2)),
            ]
        );
    }
}
