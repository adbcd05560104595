//! Predicate registry
//!
//! Predicates are looked up by name and arity. Each call receives the goal's
//! arguments and the caller's substitution and returns a lazy sequence of
//! extended substitutions.

use std::collections::HashMap;

use datalog_core::Substitution;
use datalog_parser::{Atom, Term};
use kv_storage::ItemStore;
use tracing::trace;

use crate::builtins;
use crate::error::{BuiltinError, BuiltinResult};
use crate::json::{json_atom, json_prolog};
use crate::store::StorePredicates;
use crate::stream::Solutions;

/// A callable predicate
pub trait Predicate {
    fn call(&self, args: &[Term], subst: &Substitution) -> BuiltinResult<Solutions>;
}

impl<F> Predicate for F
where
    F: Fn(&[Term], &Substitution) -> BuiltinResult<Solutions>,
{
    fn call(&self, args: &[Term], subst: &Substitution) -> BuiltinResult<Solutions> {
        self(args, subst)
    }
}

/// Predicates by name and arity
pub struct Builtins {
    predicates: HashMap<(String, usize), Box<dyn Predicate>>,
}

impl Builtins {
    /// Control, unification, range, type-check and JSON predicates
    pub fn new() -> Self {
        let mut builtins = Builtins {
            predicates: HashMap::new(),
        };
        builtins::register(&mut builtins);
        builtins.register("json_prolog", 2, |args: &[Term], subst: &Substitution| {
            json_prolog(&args[0], &args[1], subst)
        });
        builtins.register("json_atom", 2, |args: &[Term], subst: &Substitution| {
            json_atom(&args[0], &args[1], subst)
        });
        builtins
    }

    /// Everything from [`Builtins::new`] plus the store predicates
    pub fn with_store<S: ItemStore + 'static>(store: S) -> Self {
        let mut builtins = Self::new();
        StorePredicates::new(store).register(&mut builtins);
        builtins
    }

    /// Add or replace a predicate
    pub fn register<P>(&mut self, name: &str, arity: usize, predicate: P)
    where
        P: Predicate + 'static,
    {
        self.predicates
            .insert((name.to_string(), arity), Box::new(predicate));
    }

    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.predicates.contains_key(&(name.to_string(), arity))
    }

    /// Call a goal
    pub fn call(&self, goal: &Atom, subst: &Substitution) -> BuiltinResult<Solutions> {
        let name = goal.predicate.as_str();
        let arity = goal.terms.len();
        trace!(goal = %name, arity, "call");
        match self.predicates.get(&(name.to_string(), arity)) {
            Some(predicate) => predicate.call(&goal.terms, subst),
            None => Err(BuiltinError::UnknownPredicate {
                name: name.to_string(),
                arity,
            }),
        }
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}
