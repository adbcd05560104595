//! Conversion between attribute values and terms
//!
//! Every value kind has a tagged term form:
//!
//! | Value        | Term                           |
//! |--------------|--------------------------------|
//! | Binary       | `b(Base64)`                    |
//! | BinarySet    | `ss([b(Base64), ...])`         |
//! | Bool         | `bool(true)` / `bool(false)`   |
//! | List         | `l([...])`                     |
//! | Map          | `m([Key-Value, ...])`          |
//! | Number       | `n('123.45')`                  |
//! | NumberSet    | `ns([n('1'), ...])`            |
//! | Null         | `null(true)`                   |
//! | String       | `s(Atom)`                      |
//! | StringSet    | `ss([s(Atom), ...])`           |
//!
//! String sets and binary sets share the `ss` tag; their elements keep their
//! own `s`/`b` tags so that [`encode`] can tell them apart again.
//!
//! [`encode`] also accepts untagged shorthand: atoms become strings, numbers
//! become numbers, and plain lists are classified structurally. A list whose
//! elements are all `Key-Value` pairs is a map; any other list (including
//! `[]`) is a list. A list of pairs meant as plain data therefore encodes as
//! a map.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use datalog_core::{compare_terms, list_elements, ListError, Substitution};
use datalog_parser::{Term, Value, CONS, NIL, PAIR};
use kv_storage::{AttributeValue, Item, Number};

use crate::error::{BuiltinError, BuiltinResult};
use crate::keys::split_pair;

const BINARY: &str = "b";
const BINARY_SET: &str = "bs";
const BOOL: &str = "bool";
const LIST: &str = "l";
const MAP: &str = "m";
const NUMBER: &str = "n";
const NUMBER_SET: &str = "ns";
const NULL: &str = "null";
const STRING: &str = "s";
const SET: &str = "ss";

fn tagged(tag: &str, arg: Term) -> Term {
    Term::compound(tag, vec![arg])
}

fn binary_atom(bytes: &[u8]) -> Term {
    Term::atom(&STANDARD.encode(bytes))
}

fn number_atom(number: &Number) -> Term {
    tagged(NUMBER, Term::atom(number.as_str()))
}

/// Convert a value to its tagged term form. Never fails.
pub fn decode(value: &AttributeValue) -> Term {
    match value {
        AttributeValue::Binary(bytes) => tagged(BINARY, binary_atom(bytes)),
        AttributeValue::BinarySet(set) => tagged(
            SET,
            Term::list(set.iter().map(|bytes| tagged(BINARY, binary_atom(bytes)))),
        ),
        AttributeValue::Bool(flag) => {
            tagged(BOOL, Term::atom(if *flag { "true" } else { "false" }))
        }
        AttributeValue::List(values) => tagged(LIST, Term::list(values.iter().map(decode))),
        AttributeValue::Map(map) => tagged(MAP, decode_pairs(map)),
        AttributeValue::Number(number) => number_atom(number),
        AttributeValue::NumberSet(numbers) => {
            tagged(NUMBER_SET, Term::list(numbers.iter().map(number_atom)))
        }
        AttributeValue::Null => tagged(NULL, Term::atom("true")),
        AttributeValue::String(text) => tagged(STRING, Term::atom(text)),
        AttributeValue::StringSet(set) => tagged(
            SET,
            Term::list(set.iter().map(|text| tagged(STRING, Term::atom(text)))),
        ),
    }
}

/// `Key-Value` pairs in the standard order of terms
fn decode_pairs(map: &HashMap<String, AttributeValue>) -> Term {
    let mut pairs: Vec<Term> = map
        .iter()
        .map(|(key, value)| Term::pair(Term::atom(key), decode(value)))
        .collect();
    pairs.sort_by(compare_terms);
    Term::list(pairs)
}

/// Convert an item to a bare list of `Name-Value` pairs
pub fn decode_item(item: &Item) -> Term {
    decode_pairs(item)
}

fn mismatch(expected: &'static str, culprit: &Term, subst: &Substitution) -> BuiltinError {
    BuiltinError::type_error(expected, subst.apply(culprit))
}

/// Elements of a proper list; a partial list is an instantiation error
pub(crate) fn elements_of(term: &Term, subst: &Substitution) -> BuiltinResult<Vec<Term>> {
    list_elements(term, subst).map_err(|error| match error {
        ListError::Partial => BuiltinError::Instantiation,
        ListError::NotAList(culprit) => BuiltinError::type_error("list", culprit),
    })
}

/// Every element is a `-/2` compound (and there is at least one)
pub(crate) fn is_pair_list(elements: &[Term], subst: &Substitution) -> bool {
    !elements.is_empty()
        && elements
            .iter()
            .all(|element| subst.resolve(element).is_functor(PAIR, 2))
}

/// Convert a term to a value.
pub fn encode(term: &Term, subst: &Substitution) -> BuiltinResult<AttributeValue> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Atom(name)) if name.as_str() == NIL => {
            Ok(AttributeValue::List(Vec::new()))
        }
        Term::Constant(Value::Atom(text)) | Term::Constant(Value::String(text)) => {
            Ok(AttributeValue::String(text.as_str().to_string()))
        }
        Term::Constant(Value::Integer(n)) => Ok(AttributeValue::Number(Number::from(*n))),
        Term::Constant(Value::Float(f)) => {
            float_number(*f, resolved, subst).map(AttributeValue::Number)
        }
        Term::Compound(functor, args) if functor.as_str() == CONS && args.len() == 2 => {
            let elements = elements_of(resolved, subst)?;
            if is_pair_list(&elements, subst) {
                encode_map(&elements, subst).map(AttributeValue::Map)
            } else {
                encode_all(&elements, subst).map(AttributeValue::List)
            }
        }
        Term::Compound(functor, args) if args.len() == 1 => {
            encode_tagged(functor.as_str(), &args[0], resolved, subst)
        }
        other => Err(mismatch("attribute_value", other, subst)),
    }
}

fn encode_tagged(
    tag: &str,
    arg: &Term,
    whole: &Term,
    subst: &Substitution,
) -> BuiltinResult<AttributeValue> {
    match tag {
        BINARY => binary(arg, subst).map(AttributeValue::Binary),
        BINARY_SET => non_empty(elements_of(arg, subst)?, arg, subst)?
            .iter()
            .map(|element| binary_element(element, subst))
            .collect::<BuiltinResult<Vec<_>>>()
            .map(AttributeValue::BinarySet),
        BOOL => match subst.resolve(arg) {
            Term::Variable(_) => Err(BuiltinError::Instantiation),
            flag => match flag.as_atom() {
                Some("true") => Ok(AttributeValue::Bool(true)),
                Some("false") => Ok(AttributeValue::Bool(false)),
                _ => Err(mismatch("boolean", flag, subst)),
            },
        },
        LIST => encode_all(&elements_of(arg, subst)?, subst).map(AttributeValue::List),
        MAP => encode_map(&elements_of(arg, subst)?, subst).map(AttributeValue::Map),
        NUMBER => number(arg, subst).map(AttributeValue::Number),
        NUMBER_SET => non_empty(elements_of(arg, subst)?, arg, subst)?
            .iter()
            .map(|element| number_element(element, subst))
            .collect::<BuiltinResult<Vec<_>>>()
            .map(AttributeValue::NumberSet),
        NULL => match subst.resolve(arg) {
            Term::Variable(_) => Err(BuiltinError::Instantiation),
            flag if flag.as_atom() == Some("true") => Ok(AttributeValue::Null),
            flag => Err(mismatch("null", flag, subst)),
        },
        STRING => text(arg, subst).map(AttributeValue::String),
        SET => encode_set(arg, subst),
        _ => Err(mismatch("attribute_value", whole, subst)),
    }
}

fn encode_all(elements: &[Term], subst: &Substitution) -> BuiltinResult<Vec<AttributeValue>> {
    elements
        .iter()
        .map(|element| encode(element, subst))
        .collect()
}

fn encode_map(
    elements: &[Term],
    subst: &Substitution,
) -> BuiltinResult<HashMap<String, AttributeValue>> {
    let mut map = HashMap::with_capacity(elements.len());
    for element in elements {
        let (name, value) = split_pair(element, subst)?;
        map.insert(name, encode(&value, subst)?);
    }
    Ok(map)
}

fn non_empty(elements: Vec<Term>, list: &Term, subst: &Substitution) -> BuiltinResult<Vec<Term>> {
    if elements.is_empty() {
        Err(mismatch("non_empty_set", list, subst))
    } else {
        Ok(elements)
    }
}

fn text(term: &Term, subst: &Substitution) -> BuiltinResult<String> {
    match subst.resolve(term) {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Atom(text)) | Term::Constant(Value::String(text)) => {
            Ok(text.as_str().to_string())
        }
        other => Err(mismatch("atom", other, subst)),
    }
}

fn binary(term: &Term, subst: &Substitution) -> BuiltinResult<Vec<u8>> {
    match subst.resolve(term) {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        atom @ Term::Constant(Value::Atom(text)) => STANDARD
            .decode(text.as_str())
            .map_err(|_| mismatch("base64", atom, subst)),
        other => Err(mismatch("atom", other, subst)),
    }
}

/// `b(A)` or a bare base64 atom
fn binary_element(term: &Term, subst: &Substitution) -> BuiltinResult<Vec<u8>> {
    match subst.resolve(term) {
        Term::Compound(functor, args) if functor.as_str() == BINARY && args.len() == 1 => {
            binary(&args[0], subst)
        }
        other => binary(other, subst),
    }
}

fn float_number(value: f64, culprit: &Term, subst: &Substitution) -> BuiltinResult<Number> {
    Number::from_f64(value).ok_or_else(|| mismatch("number", culprit, subst))
}

fn number(term: &Term, subst: &Substitution) -> BuiltinResult<Number> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Atom(text)) => {
            Number::parse(text).ok_or_else(|| mismatch("number", resolved, subst))
        }
        Term::Constant(Value::Integer(n)) => Ok(Number::from(*n)),
        Term::Constant(Value::Float(f)) => float_number(*f, resolved, subst),
        other => Err(mismatch("number", other, subst)),
    }
}

/// `n(X)` or a bare number or numeric atom
fn number_element(term: &Term, subst: &Substitution) -> BuiltinResult<Number> {
    match subst.resolve(term) {
        Term::Compound(functor, args) if functor.as_str() == NUMBER && args.len() == 1 => {
            number(&args[0], subst)
        }
        other => number(other, subst),
    }
}

enum SetElement {
    Text(String),
    Bytes(Vec<u8>),
}

fn set_element(term: &Term, subst: &Substitution) -> BuiltinResult<SetElement> {
    match subst.resolve(term) {
        Term::Compound(functor, args) if args.len() == 1 && functor.as_str() == STRING => {
            text(&args[0], subst).map(SetElement::Text)
        }
        Term::Compound(functor, args) if args.len() == 1 && functor.as_str() == BINARY => {
            binary(&args[0], subst).map(SetElement::Bytes)
        }
        other => text(other, subst).map(SetElement::Text),
    }
}

/// `ss([...])`: all `s`/bare atoms give a string set, all `b` give a binary set
fn encode_set(list: &Term, subst: &Substitution) -> BuiltinResult<AttributeValue> {
    let elements = non_empty(elements_of(list, subst)?, list, subst)?;
    let mut texts = Vec::new();
    let mut blobs = Vec::new();
    for element in &elements {
        match set_element(element, subst)? {
            SetElement::Text(text) => texts.push(text),
            SetElement::Bytes(bytes) => blobs.push(bytes),
        }
    }
    match (texts.is_empty(), blobs.is_empty()) {
        (false, true) => Ok(AttributeValue::StringSet(texts)),
        (true, false) => Ok(AttributeValue::BinarySet(blobs)),
        _ => Err(mismatch("set", list, subst)),
    }
}

/// Convert a list of `Name-Value` pairs (or `m([...])`) to an item
pub fn encode_item(term: &Term, subst: &Substitution) -> BuiltinResult<Item> {
    let resolved = subst.resolve(term);
    let list = match resolved {
        Term::Compound(functor, args) if functor.as_str() == MAP && args.len() == 1 => &args[0],
        _ => resolved,
    };
    encode_map(&elements_of(list, subst)?, subst)
}

/// Strip tags from a term: `l`/`m` become plain lists, `n` becomes a number,
/// `s` becomes an atom. Other compounds come back unchanged.
pub fn simplify(term: &Term, subst: &Substitution) -> BuiltinResult<Term> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(_) => Ok(resolved.clone()),
        Term::Compound(functor, args) if args.len() == 1 => match functor.as_str() {
            LIST => elements_of(&args[0], subst)?
                .iter()
                .map(|element| simplify(element, subst))
                .collect::<BuiltinResult<Vec<_>>>()
                .map(Term::list),
            MAP => elements_of(&args[0], subst)?
                .iter()
                .map(|element| {
                    let (name, value) = split_pair(element, subst)?;
                    Ok(Term::pair(Term::atom(&name), simplify(&value, subst)?))
                })
                .collect::<BuiltinResult<Vec<_>>>()
                .map(Term::list),
            NUMBER => simplify_number(&args[0], subst),
            STRING => match subst.resolve(&args[0]) {
                Term::Variable(_) => Err(BuiltinError::Instantiation),
                atom @ Term::Constant(Value::Atom(_)) => Ok(atom.clone()),
                Term::Constant(Value::String(text)) => Ok(Term::atom(text)),
                other => Err(mismatch("atom", other, subst)),
            },
            _ => Ok(subst.apply(resolved)),
        },
        Term::Compound(_, _) => Ok(subst.apply(resolved)),
    }
}

fn simplify_number(term: &Term, subst: &Substitution) -> BuiltinResult<Term> {
    let resolved = subst.resolve(term);
    match resolved {
        Term::Variable(_) => Err(BuiltinError::Instantiation),
        Term::Constant(Value::Integer(_)) | Term::Constant(Value::Float(_)) => Ok(resolved.clone()),
        Term::Constant(Value::Atom(text)) => {
            let parsed = Number::parse(text).and_then(|number| {
                if number.is_integral() {
                    number.as_i64().map(Term::integer)
                } else {
                    number.as_f64().map(Term::float)
                }
            });
            parsed.ok_or_else(|| mismatch("number", resolved, subst))
        }
        other => Err(mismatch("number", other, subst)),
    }
}
