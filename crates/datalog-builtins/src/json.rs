//! JSON text to and from terms
//!
//! JSON documents are atoms holding JSON text. Objects are pair lists, arrays are lists, `true`/`false` are `@(true)` and
//! `@(false)`, and `null` is `[]`.

use datalog_core::Substitution;
use datalog_parser::{Term, Value, CONS, NIL, PAIR};
use serde_json::{Map, Number, Value as JsonValue};

use crate::codec::{elements_of, is_pair_list};
use crate::error::{BuiltinError, BuiltinResult};
use crate::stream::{fail, succeed, unify_once, Solutions};

const BOOLEAN: &str = "@";

/// Convert parsed JSON to a term
pub fn json_to_term(value: &JsonValue) -> Term {
    match value {
        JsonValue::Null => Term::nil(),
        JsonValue::Bool(flag) => {
            Term::compound(BOOLEAN, vec![Term::atom(if *flag { "true" } else { "false" })])
        }
        JsonValue::Number(number) => match number.as_i64() {
            Some(n) => Term::integer(n),
            None => Term::float(number.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(text) => Term::atom(text),
        JsonValue::Array(values) => Term::list(values.iter().map(json_to_term)),
        JsonValue::Object(map) => Term::list(
            map.iter()
                .map(|(key, value)| Term::pair(Term::atom(key), json_to_term(value))),
        ),
    }
}

/// Convert a ground term to JSON
pub fn term_to_json(term: &Term, subst: &Substitution) -> BuiltinResult<JsonValue> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Atom(name)) if name.as_str() == NIL => Ok(JsonValue::Array(Vec::new())),
        Term::Constant(Value::Atom(text)) | Term::Constant(Value::String(text)) => {
            Ok(JsonValue::String(text.as_str().to_string()))
        }
        Term::Constant(Value::Integer(n)) => Ok(JsonValue::from(*n)),
        Term::Constant(Value::Float(f)) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| BuiltinError::type_error("number", resolved.clone())),
        Term::Compound(functor, args) if functor.as_str() == CONS && args.len() == 2 => {
            let elements = elements_of(resolved, subst)?;
            match object_entries(&elements, subst) {
                Some(entries) => {
                    let mut map = Map::new();
                    for (key, value) in entries {
                        map.insert(key, term_to_json(&value, subst)?);
                    }
                    Ok(JsonValue::Object(map))
                }
                None => elements
                    .iter()
                    .map(|element| term_to_json(element, subst))
                    .collect::<BuiltinResult<Vec<_>>>()
                    .map(JsonValue::Array),
            }
        }
        Term::Compound(functor, args) if functor.as_str() == BOOLEAN && args.len() == 1 => {
            match subst.resolve(&args[0]).as_atom() {
                Some("true") => Ok(JsonValue::Bool(true)),
                Some("false") => Ok(JsonValue::Bool(false)),
                _ => compound_text(resolved, subst),
            }
        }
        Term::Compound(_, _) => compound_text(resolved, subst),
    }
}

/// Other compounds are written out as their quoted text
fn compound_text(term: &Term, subst: &Substitution) -> BuiltinResult<JsonValue> {
    let applied = subst.apply(term);
    if !applied.is_ground() {
        return Err(BuiltinError::Instantiation);
    }
    Ok(JsonValue::String(applied.to_string()))
}

/// `Key-Value` entries when every element is a pair with an atom key
fn object_entries(elements: &[Term], subst: &Substitution) -> Option<Vec<(String, Term)>> {
    if !is_pair_list(elements, subst) {
        return None;
    }
    elements
        .iter()
        .map(|element| match subst.resolve(element) {
            Term::Compound(functor, args) if functor.as_str() == PAIR => {
                match subst.resolve(&args[0]) {
                    Term::Constant(Value::Atom(key)) => Some((key.as_str().to_string(), args[1].clone())),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

/// `json_prolog(?Json, ?Term)`
///
/// With `Json` bound to JSON text it is parsed and unified with `Term`.
/// Otherwise `Term` must be a list, which is written out as JSON text.
pub fn json_prolog(json: &Term, term: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
    match subst.resolve(json) {
        Term::Variable(_) => {
            let value = match subst.resolve(term) {
                Term::Variable(_) => return Err(BuiltinError::Instantiation),
                list if list.as_atom() == Some(NIL) || list.is_functor(CONS, 2) => {
                    term_to_json(list, subst)?
                }
                other => return Err(BuiltinError::type_error("list", subst.apply(other))),
            };
            let text = serde_json::to_string(&value).map_err(|e| BuiltinError::Json(e.to_string()))?;
            Ok(unify_once(json, &Term::atom(&text), subst))
        }
        text => {
            let value = parse_json(text, subst)?;
            Ok(unify_once(term, &json_to_term(&value), subst))
        }
    }
}

/// `json_atom(?Json, ?Atom)`
///
/// Relates a JSON document to an atom holding the same document. The bound
/// side must be valid JSON; an unbound side receives the compact text, so
/// `json_atom(J, '{ "a" : 1 }')` binds `J = '{"a":1}'`. With both sides
/// bound the parsed documents are compared.
pub fn json_atom(json: &Term, atom: &Term, subst: &Substitution) -> BuiltinResult<Solutions> {
    let (source, target) = match (subst.resolve(json), subst.resolve(atom)) {
        (Term::Variable(_), Term::Variable(_)) => return Err(BuiltinError::Instantiation),
        (Term::Variable(_), text) => (text, json),
        (text, _) => (text, atom),
    };
    let value = parse_json(source, subst)?;
    match subst.resolve(target) {
        Term::Variable(_) => {
            let text = serde_json::to_string(&value).map_err(|e| BuiltinError::Json(e.to_string()))?;
            Ok(unify_once(target, &Term::atom(&text), subst))
        }
        other if parse_json(other, subst)? == value => Ok(succeed(subst.clone())),
        _ => Ok(fail()),
    }
}

fn parse_json(text: &Term, subst: &Substitution) -> BuiltinResult<JsonValue> {
    match text {
        Term::Constant(Value::Atom(text)) | Term::Constant(Value::String(text)) => {
            serde_json::from_str(text).map_err(|e| BuiltinError::Json(e.to_string()))
        }
        other => Err(BuiltinError::type_error("atom", subst.apply(other))),
    }
}
