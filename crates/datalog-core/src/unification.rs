//! Unification algorithm (Robinson's unification)
//!
//! This module implements first-order unification, which finds substitutions
//! that make two terms equal. Every predicate threads a [`Substitution`]
//! through its solutions.
//!
//! # Algorithm
//!
//! Implements Robinson's unification algorithm with occurs check to prevent
//! infinite structures. The variable `_` is anonymous: it unifies with
//! anything and is never bound.
//!
//! # Example
//!
//! ```ignore
//! // Unify [id-K|Rest] with [id-n('5'), name-s(ann)]
//! // Result: K=n('5'), Rest=[name-s(ann)]
//! let ok = unify(&pattern, &item, &mut subst);
//! ```

use datalog_parser::{Symbol, Term};
use std::collections::HashMap;

/// A substitution maps variables to terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    bindings: HashMap<Symbol, Term>,
}

impl Default for Substitution {
    fn default() -> Self {
        Self::new()
    }
}

impl Substitution {
    pub fn new() -> Self {
        Substitution {
            bindings: HashMap::new(),
        }
    }

    /// Bind a variable to a term
    pub fn bind(&mut self, var: Symbol, term: Term) {
        self.bindings.insert(var, term);
    }

    /// Get the binding for a variable
    pub fn get(&self, var: &Symbol) -> Option<&Term> {
        self.bindings.get(var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over bindings
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Term)> {
        self.bindings.iter()
    }

    /// Follow variable bindings until reaching an unbound variable or a
    /// non-variable term. Arguments of compounds are left untouched.
    pub fn resolve<'a>(&'a self, term: &'a Term) -> &'a Term {
        let mut current = term;
        while let Term::Variable(var) = current {
            match self.get(var) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current
    }

    /// Apply substitution to a term
    pub fn apply(&self, term: &Term) -> Term {
        match term {
            Term::Variable(var) => {
                if let Some(bound_term) = self.get(var) {
                    // Recursively apply in case bound term contains variables
                    self.apply(bound_term)
                } else {
                    term.clone()
                }
            }
            Term::Constant(_) => term.clone(),
            Term::Compound(functor, args) => {
                let new_args = args.iter().map(|arg| self.apply(arg)).collect();
                Term::Compound(*functor, new_args)
            }
        }
    }
}

fn is_anonymous(var: &Symbol) -> bool {
    var.as_str() == "_"
}

/// Unify two terms, extending `subst` on success.
///
/// On failure `subst` may hold partial bindings; callers unify into a clone
/// when they need the original afterwards (see [`unify_into`]).
pub fn unify(term1: &Term, term2: &Term, subst: &mut Substitution) -> bool {
    let t1 = subst.resolve(term1).clone();
    let t2 = subst.resolve(term2).clone();

    match (&t1, &t2) {
        (Term::Constant(v1), Term::Constant(v2)) => v1 == v2,

        // Anonymous variable "_" unifies with anything without binding
        (Term::Variable(var), _) if is_anonymous(var) => true,
        (_, Term::Variable(var)) if is_anonymous(var) => true,

        (Term::Variable(v1), Term::Variable(v2)) if v1 == v2 => true,

        (Term::Variable(var), t) | (t, Term::Variable(var)) => {
            if occurs_check(var, t, subst) {
                false
            } else {
                subst.bind(*var, t.clone());
                true
            }
        }

        // Compound terms unify if functors match and all arguments unify
        (Term::Compound(f1, args1), Term::Compound(f2, args2)) => {
            if f1 != f2 || args1.len() != args2.len() {
                false
            } else {
                args1
                    .iter()
                    .zip(args2.iter())
                    .all(|(arg1, arg2)| unify(arg1, arg2, subst))
            }
        }

        _ => false,
    }
}

/// Unify into a copy of `subst`, returning the extended copy on success
pub fn unify_into(term1: &Term, term2: &Term, subst: &Substitution) -> Option<Substitution> {
    let mut extended = subst.clone();
    if unify(term1, term2, &mut extended) {
        Some(extended)
    } else {
        None
    }
}

/// Occurs check: does variable occur in term (through bindings)?
fn occurs_check(var: &Symbol, term: &Term, subst: &Substitution) -> bool {
    match subst.resolve(term) {
        Term::Variable(v) => v == var,
        Term::Constant(_) => false,
        Term::Compound(_, args) => args.iter().any(|arg| occurs_check(var, arg, subst)),
    }
}
