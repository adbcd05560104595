//! General built-in predicates
//!
//! # Supported Built-ins
//!
//! - **Control**: `true`, `fail`, `false`
//! - **Unification**: `=`, `\=`
//! - **Ranges**: `between(Low, High, X)`, `High` may be `inf` or `infinite`
//! - **Type checks**: `is_list(T)`

use datalog_core::{is_proper_list, unify_into, Substitution};
use datalog_parser::{Term, Value};

use crate::error::{BuiltinError, BuiltinResult};
use crate::registry::Builtins;
use crate::stream::{fail, succeed, unify_once, unify_stream, ItemStream, RangeCursor, Solutions};

fn integer(term: &Term, subst: &Substitution) -> BuiltinResult<i64> {
    match subst.resolve(term) {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Integer(n)) => Ok(*n),
        other => Err(BuiltinError::type_error("integer", subst.apply(other))),
    }
}

/// Upper bound of a range: an integer or `inf`/`infinite`
fn upper_bound(term: &Term, subst: &Substitution) -> BuiltinResult<i64> {
    match subst.resolve(term).as_atom() {
        Some("inf") | Some("infinite") => Ok(i64::MAX),
        _ => integer(term, subst),
    }
}

/// `between(+Low, +High, ?X)`
///
/// With `X` unbound the integers `Low..=High` are enumerated lazily.
pub fn between(low: &Term, high: &Term, x: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
    let low = integer(low, subst)?;
    let high = upper_bound(high, subst)?;

    match subst.resolve(x) {
        Term::Variable(_) => {
            let stream = ItemStream::new(move || Ok(RangeCursor::new(low, high)), Term::integer);
            Ok(unify_stream(stream, x.clone(), subst.clone()))
        }
        Term::Constant(Value::Integer(n)) if (low..=high).contains(n) => Ok(succeed(subst.clone())),
        Term::Constant(Value::Integer(_)) => Ok(fail()),
        other => Err(BuiltinError::type_error("integer", subst.apply(other))),
    }
}

/// `is_list(@T)`: proper lists only
pub fn is_list(term: &Term, subst: &Substitution) -> Solutions {
    if is_proper_list(term, subst) {
        succeed(subst.clone())
    } else {
        fail()
    }
}

/// `\=(X, Y)`: X and Y do not unify; never binds
pub fn not_unifiable(left: &Term, right: &Term, subst: &Substitution) -> Solutions {
    match unify_into(left, right, subst) {
        Some(_) => fail(),
        None => succeed(subst.clone()),
    }
}

/// Register the general built-ins
pub fn register(builtins: &mut Builtins) {
    builtins.register("true", 0, |_: &[Term], subst: &Substitution| {
        Ok(succeed(subst.clone()))
    });
    builtins.register("fail", 0, |_: &[Term], _: &Substitution| Ok(fail()));
    builtins.register("false", 0, |_: &[Term], _: &Substitution| Ok(fail()));
    builtins.register("=", 2, |args: &[Term], subst: &Substitution| {
        Ok(unify_once(&args[0], &args[1], subst))
    });
    builtins.register("\\=", 2, |args: &[Term], subst: &Substitution| {
        Ok(not_unifiable(&args[0], &args[1], subst))
    });
    builtins.register("between", 3, |args: &[Term], subst: &Substitution| {
        between(&args[0], &args[1], &args[2], subst)
    });
    builtins.register("is_list", 1, |args: &[Term], subst: &Substitution| {
        Ok(is_list(&args[0], subst))
    });
}
