//! Walking list terms under a substitution

use datalog_parser::{Term, Value, CONS, NIL};
use std::fmt;

use crate::Substitution;

/// Why a term could not be read as a proper list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// The list ends in an unbound variable
    Partial,
    /// The term (or its tail) is neither a list cell nor `[]`
    NotAList(Term),
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListError::Partial => write!(f, "partial list"),
            ListError::NotAList(term) => write!(f, "not a list: {}", term),
        }
    }
}

impl std::error::Error for ListError {}

/// Collect the elements of a proper list. Elements are returned as written,
/// without applying the substitution to them.
pub fn list_elements(term: &Term, subst: &Substitution) -> Result<Vec<Term>, ListError> {
    let mut elements = Vec::new();
    let mut current = subst.resolve(term);
    loop {
        match current {
            Term::Constant(Value::Atom(name)) if name.as_str() == NIL => return Ok(elements),
            Term::Compound(functor, args) if functor.as_str() == CONS && args.len() == 2 => {
                elements.push(args[0].clone());
                current = subst.resolve(&args[1]);
            }
            Term::Variable(_) => return Err(ListError::Partial),
            _ => return Err(ListError::NotAList(subst.apply(term))),
        }
    }
}

/// Is the term a proper list (ending in `[]`)?
pub fn is_proper_list(term: &Term, subst: &Substitution) -> bool {
    list_elements(term, subst).is_ok()
}
