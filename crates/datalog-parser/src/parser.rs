//! Parser implementation for terms and queries.
//!
//! Supports parsing:
//! - Terms: `m([id-n(5), name-s(alice)])`
//! - Lists: `[a, b | T]`
//! - Pairs: `'UserID'-n(4002)` (left-associative `-`)
//! - Queries: `?- list_tables(T), scan(T, X).`
//! - Unification goals: `X = Y`, `X \= Y`

use chumsky::prelude::*;
use chumsky::stream::Stream;
use internment::Intern;
use std::fmt;

use crate::ast::*;
use crate::token::{lexer, LexError, SpannedToken, Token};
use crate::{Span, SrcId};

type ParserError = Simple<Token, Span>;

#[derive(Debug, Clone)]
pub enum ParseError {
    Lex(LexError),
    Parse(ParserError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(error) => write!(f, "lex error at {}: {}", error.span(), error),
            ParseError::Parse(error) => write!(f, "parse error at {}: {}", error.span(), error),
        }
    }
}

impl std::error::Error for ParseError {}

fn ident_token() -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! {
        Token::Ident(ident) => ident,
        Token::Quoted(ident) => ident,
    }
    .labelled("atom")
}

fn variable_token() -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! { Token::Variable(ident) => ident }.labelled("variable")
}

fn string_token() -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! { Token::String(value) => value }.labelled("string")
}

/// A number with an optional leading `-`, parsed as one literal so that
/// `i64::MIN` is in range
fn number_token() -> impl Parser<Token, Value, Error = ParserError> + Clone {
    symbol_token("-")
        .or_not()
        .then(select! { Token::Number(number) => number })
        .try_map(|(sign, digits), span| {
            let text = format!("{}{}", sign.unwrap_or_default(), digits);
            if text.contains('.') {
                text.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ParserError::custom(span, "invalid float"))
            } else {
                text.parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| ParserError::custom(span, "invalid integer"))
            }
        })
        .labelled("number")
}

fn symbol_token(symbol: &'static str) -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! { Token::Symbol(value) if value == symbol => value }
}

fn any_symbol_token() -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! { Token::Symbol(value) => value }
}

fn token(kind: Token) -> impl Parser<Token, Token, Error = ParserError> + Clone {
    just(kind)
}

fn lex_with_src(input: &str, src: SrcId) -> Result<Vec<SpannedToken>, Vec<ParseError>> {
    let len = input.chars().count();
    let eoi = Span::new(src, len..len);
    let stream = Stream::from_iter(
        eoi,
        input
            .chars()
            .enumerate()
            .map(|(idx, ch)| (ch, Span::new(src, idx..idx + 1))),
    );
    lexer()
        .parse(stream)
        .map_err(|errors| errors.into_iter().map(ParseError::Lex).collect())
}

#[cfg(test)]
fn lex(input: &str) -> Result<Vec<SpannedToken>, Vec<ParseError>> {
    lex_with_src(input, SrcId::empty())
}

fn parse_with<T>(
    parser: impl Parser<Token, T, Error = ParserError>,
    input: &str,
    src: SrcId,
) -> Result<T, Vec<ParseError>> {
    let tokens = lex_with_src(input, src)?;
    let end = input.chars().count();
    let eoi = Span::new(src, end..end);
    let stream = Stream::from_iter(eoi, tokens.into_iter());
    parser
        .parse(stream)
        .map_err(|errors| errors.into_iter().map(ParseError::Parse).collect())
}

fn primary_parser<'a>(
    term: Recursive<'a, Token, Term, ParserError>,
) -> impl Parser<Token, Term, Error = ParserError> + Clone + 'a {
    let variable = variable_token().map(|s| Term::Variable(Intern::new(s)));

    let number_const = number_token().map(Term::Constant);

    let string_const = string_token().map(|s| Term::Constant(Value::String(Intern::new(s))));

    let parens = term
        .clone()
        .delimited_by(token(Token::LParen), token(Token::RParen));

    let empty_list = token(Token::LBracket)
        .then(token(Token::RBracket))
        .to(Term::nil());

    let list = term
        .clone()
        .separated_by(token(Token::Comma))
        .at_least(1)
        .then(token(Token::Bar).ignore_then(term.clone()).or_not())
        .delimited_by(token(Token::LBracket), token(Token::RBracket))
        .map(|(items, tail)| Term::list_with_tail(items, tail.unwrap_or_else(Term::nil)));

    let compound_or_atom = choice((ident_token(), any_symbol_token()))
        .then(
            term.clone()
                .separated_by(token(Token::Comma))
                .at_least(1)
                .delimited_by(token(Token::LParen), token(Token::RParen))
                .or_not(),
        )
        .map(|(name, args)| match args {
            Some(args) => Term::Compound(Intern::new(name), args),
            None => Term::Constant(Value::Atom(Intern::new(name))),
        });

    choice((
        variable,
        number_const,
        string_const,
        parens,
        empty_list,
        list,
        compound_or_atom,
    ))
}

/// Parse a term. `-` associates to the left; `-&-` binds looser and joins
/// two pairs into a composite key.
fn term() -> impl Parser<Token, Term, Error = ParserError> + Clone {
    recursive(|term| {
        let primary = primary_parser(term);
        let pair = primary
            .clone()
            .then(symbol_token(PAIR).ignore_then(primary).repeated())
            .foldl(Term::pair);
        pair.clone()
            .then(symbol_token(KEY_JOIN).ignore_then(pair).or_not())
            .map(|(left, right)| match right {
                Some(right) => Term::compound(KEY_JOIN, vec![left, right]),
                None => left,
            })
    })
    .labelled("term")
}

/// Parse a goal: a callable term, or `Left = Right` / `Left \= Right`
fn goal() -> impl Parser<Token, Atom, Error = ParserError> + Clone {
    let relation = choice((symbol_token("="), symbol_token("\\=")));

    term()
        .then(relation.then(term()).or_not())
        .try_map(|(left, relation), span| match relation {
            Some((op, right)) => Ok(Atom::new(&op, vec![left, right])),
            None => match left {
                Term::Constant(Value::Atom(predicate)) => Ok(Atom {
                    predicate,
                    terms: Vec::new(),
                }),
                Term::Compound(predicate, terms) => Ok(Atom { predicate, terms }),
                other => Err(ParserError::custom(
                    span,
                    format!("goal is not callable: {}", other),
                )),
            },
        })
        .labelled("goal")
}

/// Parse a query: `?- goal, goal.` (the `?-` prefix and final dot are optional)
fn query() -> impl Parser<Token, Query, Error = ParserError> + Clone {
    symbol_token("?-")
        .or_not()
        .ignore_then(goal().separated_by(token(Token::Comma)).at_least(1))
        .then_ignore(token(Token::Dot).or_not())
        .then_ignore(end())
        .map(|body| Query { body })
        .labelled("query")
}

/// Parse a single term from text, optionally terminated by a dot
pub fn parse_term(input: &str, src: SrcId) -> Result<Term, Vec<ParseError>> {
    let parser = term()
        .then_ignore(token(Token::Dot).or_not())
        .then_ignore(end());
    parse_with(parser, input, src)
}

/// Parse a query from text
pub fn parse_query(input: &str, src: SrcId) -> Result<Query, Vec<ParseError>> {
    parse_with(query(), input, src)
}
