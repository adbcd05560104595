//! Standard order of terms
//!
//! Variables < Numbers < Atoms < Strings < Compound terms. Numbers compare by
//! value, with a Float ordered before an Integer of equal value. Compound
//! terms compare by arity, then name, then arguments left to right.

use datalog_parser::{Term, Value};
use std::cmp::Ordering;

fn rank(term: &Term) -> u8 {
    match term {
        Term::Variable(_) => 0,
        Term::Constant(Value::Float(_)) | Term::Constant(Value::Integer(_)) => 1,
        Term::Constant(Value::Atom(_)) => 2,
        Term::Constant(Value::String(_)) => 3,
        Term::Compound(_, _) => 4,
    }
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Float(x), Value::Integer(y)) => {
            x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Less).then(Ordering::Less)
        }
        (Value::Integer(x), Value::Float(y)) => {
            (*x as f64).partial_cmp(y).unwrap_or(Ordering::Greater).then(Ordering::Greater)
        }
        _ => Ordering::Equal,
    }
}

/// Compare two terms in the standard order
pub fn compare_terms(a: &Term, b: &Term) -> Ordering {
    let by_rank = rank(a).cmp(&rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }

    match (a, b) {
        (Term::Variable(x), Term::Variable(y)) => x.as_str().cmp(y.as_str()),
        (Term::Constant(Value::Atom(x)), Term::Constant(Value::Atom(y)))
        | (Term::Constant(Value::String(x)), Term::Constant(Value::String(y))) => {
            x.as_str().cmp(y.as_str())
        }
        (Term::Constant(x), Term::Constant(y)) => compare_numbers(x, y),
        (Term::Compound(f1, args1), Term::Compound(f2, args2)) => args1
            .len()
            .cmp(&args2.len())
            .then_with(|| f1.as_str().cmp(f2.as_str()))
            .then_with(|| {
                args1
                    .iter()
                    .zip(args2.iter())
                    .map(|(x, y)| compare_terms(x, y))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
        _ => Ordering::Equal,
    }
}
