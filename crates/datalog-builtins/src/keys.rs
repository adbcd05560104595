//! Key specifications
//!
//! A key is written `Name-Value` for a hash key, or
//! `Hash-&-Range` / `key(Hash, Range)` for a composite key.

use datalog_core::Substitution;
use datalog_parser::{Term, Value, KEY_JOIN, PAIR};
use kv_storage::{ItemKey, KeyAttribute};

use crate::codec::encode;
use crate::error::{BuiltinError, BuiltinResult};

/// Split a key specification into its hash part and optional range part
pub fn split_key_spec(term: &Term, subst: &Substitution) -> BuiltinResult<(Term, Option<Term>)> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Compound(functor, args) if args.len() == 2 => match functor.as_str() {
            PAIR => Ok((resolved.clone(), None)),
            KEY_JOIN | "key" => Ok((args[0].clone(), Some(args[1].clone()))),
            _ => Err(BuiltinError::type_error("compound", subst.apply(resolved))),
        },
        Term::Compound(_, _) => Err(BuiltinError::type_error("compound", subst.apply(resolved))),
        other => Err(BuiltinError::type_error("pair", other.clone())),
    }
}

/// Split `Name-Value`; the value comes back unresolved
pub fn split_pair(term: &Term, subst: &Substitution) -> BuiltinResult<(String, Term)> {
    match subst.resolve(term) {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Compound(functor, args) if functor.as_str() == PAIR && args.len() == 2 => {
            match subst.resolve(&args[0]) {
                Term::Variable(_) => Err(BuiltinError::Instantiation),
                Term::Constant(Value::Atom(name)) if !name.is_empty() => {
                    Ok((name.as_str().to_string(), args[1].clone()))
                }
                other => Err(BuiltinError::type_error("atom", subst.apply(other))),
            }
        }
        other => Err(BuiltinError::type_error("pair", subst.apply(other))),
    }
}

pub fn resolve_key(term: &Term, subst: &Substitution) -> BuiltinResult<KeyAttribute> {
    let (name, value) = split_pair(term, subst)?;
    Ok(KeyAttribute::new(&name, encode(&value, subst)?))
}

/// Build a store key from a key specification
pub fn item_key(term: &Term, subst: &Substitution) -> BuiltinResult<ItemKey> {
    let (hash, range) = split_key_spec(term, subst)?;
    Ok(ItemKey {
        hash: resolve_key(&hash, subst)?,
        range: range
            .map(|range| resolve_key(&range, subst))
            .transpose()?,
    })
}
