//! Parser for Prolog-style terms and queries
//!
//! This crate implements a parser combinator-based parser using the Chumsky library.
//! It parses terms and queries from text into an AST (Abstract Syntax Tree), and
//! writes terms back out in quoted form.
//!
//! # Supported Syntax
//!
//! - **Atoms**: `foo`, `'Hello World'`, `[]`, `-&-`
//! - **Numbers**: `42`, `-7`, `3.14`
//! - **Strings**: `"text"`
//! - **Compounds**: `n('42')`, `m([a-s(b)])`
//! - **Lists**: `[1, 2, 3]`, `[H|T]`
//! - **Pairs and keys**: `id-5`, `'UserID'-n(1) -&- 'Timestamp'-n(2)`
//! - **Queries**: `?- list_tables(T), scan(T, Item).`
//!
//! # Example
//!
//! ```ignore
//! use datalog_parser::{parse_query, SrcId};
//!
//! let query = parse_query("?- get_item(users, id-5, Item).", SrcId::repl()).expect("Parse error");
//! ```

mod ast;
mod parser;
mod span;
mod src;
mod token;

pub use ast::*;
pub use parser::{parse_query, parse_term, ParseError};
pub use span::Span;
pub use src::SrcId;
pub use token::{LexError, Token};
