//! Abstract Syntax Tree (AST) definitions for terms and goals
//!
//! This module defines the data structures the predicates operate on.
//!
//! # Key Components
//!
//! - **Term**: Variables, constants, or compound terms
//! - **Value**: Constant values (integers, floats, atoms, strings)
//! - **Atom**: A goal, i.e. a predicate applied to terms (e.g., `scan(T, Item)`)
//! - **Query**: A conjunction of goals
//!
//! # Syntax Examples
//!
//! - **Pairs**: `id-5`, `'UserID'-n(4002)`
//! - **Lists**: `[a, b, c]`, `[H|T]`, `[]`
//! - **Queries**: `?- list_tables(T), scan(T, Item).`
//!
//! Lists are right-nested `'.'/2` compounds terminated by the atom `[]`.

use internment::Intern;
use std::fmt;

/// Interned string for efficient storage and comparison
pub type Symbol = Intern<String>;

/// Functor of a list cell
pub const CONS: &str = ".";
/// The empty list atom
pub const NIL: &str = "[]";
/// Functor of a key-value pair
pub const PAIR: &str = "-";
/// Functor joining the hash and range parts of a composite key
pub const KEY_JOIN: &str = "-&-";

/// A query: `?- list_tables(T), scan(T, Item).`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub body: Vec<Atom>,
}

/// A goal is a predicate applied to terms: `get_item(users, id-5, Item)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub predicate: Symbol,
    pub terms: Vec<Term>,
}

/// A term can be a variable, constant, or compound term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable: uppercase or starts with underscore (X, Y, _tmp)
    Variable(Symbol),
    /// Constant value
    Constant(Value),
    /// Compound term: functor with arguments (f(a, b))
    Compound(Symbol, Vec<Term>),
}

/// Constant values
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    /// Atom (interned text constant: `foo`, `'Hello World'`, `[]`)
    Atom(Symbol),
    /// Double-quoted string object
    String(Symbol),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Integer(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Atom(a) => {
                2u8.hash(state);
                a.hash(state);
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl Term {
    pub fn var(name: &str) -> Term {
        Term::Variable(Intern::new(name.to_string()))
    }

    pub fn atom(name: &str) -> Term {
        Term::Constant(Value::Atom(Intern::new(name.to_string())))
    }

    pub fn integer(value: i64) -> Term {
        Term::Constant(Value::Integer(value))
    }

    pub fn float(value: f64) -> Term {
        Term::Constant(Value::Float(value))
    }

    pub fn string(value: &str) -> Term {
        Term::Constant(Value::String(Intern::new(value.to_string())))
    }

    pub fn compound(functor: &str, args: Vec<Term>) -> Term {
        Term::Compound(Intern::new(functor.to_string()), args)
    }

    /// `Key-Value`
    pub fn pair(key: Term, value: Term) -> Term {
        Term::compound(PAIR, vec![key, value])
    }

    pub fn nil() -> Term {
        Term::atom(NIL)
    }

    pub fn cons(head: Term, tail: Term) -> Term {
        Term::compound(CONS, vec![head, tail])
    }

    /// Build a proper list from its elements
    pub fn list(items: impl IntoIterator<Item = Term>) -> Term {
        Term::list_with_tail(items, Term::nil())
    }

    /// Build a list ending in `tail` (a partial list when `tail` is a variable)
    pub fn list_with_tail(items: impl IntoIterator<Item = Term>, tail: Term) -> Term {
        let items: Vec<Term> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(tail, |tail, head| Term::cons(head, tail))
    }

    /// The atom's text, if this term is an atom
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Constant(Value::Atom(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Is this a compound with the given name and arity?
    pub fn is_functor(&self, name: &str, arity: usize) -> bool {
        match self {
            Term::Compound(functor, args) => functor.as_str() == name && args.len() == arity,
            _ => false,
        }
    }

    /// Check whether the term contains no variables
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Constant(_) => true,
            Term::Compound(_, args) => args.iter().all(Term::is_ground),
        }
    }
}

impl Atom {
    pub fn new(predicate: &str, terms: Vec<Term>) -> Self {
        Atom {
            predicate: Intern::new(predicate.to_string()),
            terms,
        }
    }

    /// The goal as a term (`p` for arity 0, `p(...)` otherwise)
    pub fn to_term(&self) -> Term {
        if self.terms.is_empty() {
            Term::Constant(Value::Atom(self.predicate))
        } else {
            Term::Compound(self.predicate, self.terms.clone())
        }
    }
}

impl Query {
    pub fn new(body: Vec<Atom>) -> Self {
        Query { body }
    }
}

const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

fn is_symbol_char(c: char) -> bool {
    SYMBOL_CHARS.contains(c)
}

fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_lowercase() => {
            !name.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        Some(_) if name == NIL || name == "!" || name == ";" => false,
        Some(_) if name != "." && name.chars().all(is_symbol_char) => false,
        Some(_) => true,
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    write!(f, "{}", quote)?;
    for c in text.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", quote)
}

fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if needs_quotes(name) {
        write_quoted(f, name, '\'')
    } else {
        write!(f, "{}", name)
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        write!(f, "{:.1}", value)
    } else {
        write!(f, "{}", value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write_float(f, *n),
            Value::Atom(name) => write_atom(f, name),
            Value::String(text) => write_quoted(f, text, '"'),
        }
    }
}

/// Writes terms in quoted form, so the output parses back to the same term.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "{}", name),
            Term::Constant(value) => write!(f, "{}", value),
            Term::Compound(functor, args) if functor.as_str() == CONS && args.len() == 2 => {
                write!(f, "[{}", args[0])?;
                let mut tail = &args[1];
                loop {
                    match tail {
                        Term::Compound(functor, rest)
                            if functor.as_str() == CONS && rest.len() == 2 =>
                        {
                            write!(f, ",{}", rest[0])?;
                            tail = &rest[1];
                        }
                        Term::Constant(Value::Atom(name)) if name.as_str() == NIL => break,
                        other => {
                            write!(f, "|{}", other)?;
                            break;
                        }
                    }
                }
                write!(f, "]")
            }
            Term::Compound(functor, args) if functor.as_str() == PAIR && args.len() == 2 => {
                // yfx 500: only the right operand of a nested pair needs parentheses
                write!(f, "{}", args[0])?;
                write!(f, "-")?;
                match &args[1] {
                    right if right.is_functor(PAIR, 2) => write!(f, "({})", right),
                    Term::Constant(Value::Integer(n)) if *n < 0 => write!(f, " {}", n),
                    Term::Constant(Value::Float(n)) if *n < 0.0 => write!(f, " {}", args[1]),
                    right => write!(f, "{}", right),
                }
            }
            Term::Compound(functor, args) => {
                write_atom(f, functor)?;
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_construction() {
        let list = Term::list(vec![Term::atom("a"), Term::integer(1)]);
        assert_eq!(
            list,
            Term::cons(Term::atom("a"), Term::cons(Term::integer(1), Term::nil()))
        );
        assert_eq!(Term::list(vec![]), Term::nil());
    }

    #[test]
    fn test_display_atoms() {
        assert_eq!(Term::atom("foo").to_string(), "foo");
        assert_eq!(Term::atom("TestDB").to_string(), "'TestDB'");
        assert_eq!(Term::atom("hello world").to_string(), "'hello world'");
        assert_eq!(Term::atom("").to_string(), "''");
        assert_eq!(Term::atom("[]").to_string(), "[]");
        assert_eq!(Term::atom("-&-").to_string(), "-&-");
        assert_eq!(Term::atom("it's").to_string(), "'it\\'s'");
    }

    #[test]
    fn test_display_numbers_and_strings() {
        assert_eq!(Term::integer(-5).to_string(), "-5");
        assert_eq!(Term::float(42.0).to_string(), "42.0");
        assert_eq!(Term::float(0.5).to_string(), "0.5");
        assert_eq!(Term::string("a\"b").to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_display_lists_and_pairs() {
        let list = Term::list(vec![
            Term::pair(Term::atom("id"), Term::integer(5)),
            Term::pair(Term::atom("n"), Term::integer(-1)),
        ]);
        assert_eq!(list.to_string(), "[id-5,n- -1]");

        let partial = Term::list_with_tail(vec![Term::atom("a")], Term::var("T"));
        assert_eq!(partial.to_string(), "[a|T]");

        let nested = Term::pair(
            Term::atom("a"),
            Term::pair(Term::atom("b"), Term::atom("c")),
        );
        assert_eq!(nested.to_string(), "a-(b-c)");
    }

    #[test]
    fn test_display_compound() {
        let term = Term::compound("m", vec![Term::list(vec![Term::pair(
            Term::atom("UserID"),
            Term::compound("n", vec![Term::atom("4002")]),
        )])]);
        assert_eq!(term.to_string(), "m(['UserID'-n('4002')])");
    }

    #[test]
    fn test_is_ground() {
        assert!(Term::list(vec![Term::atom("a")]).is_ground());
        assert!(!Term::list(vec![Term::var("X")]).is_ground());
    }
}
