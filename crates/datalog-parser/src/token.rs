use chumsky::prelude::*;
use std::fmt;

use crate::Span;

pub type SpannedToken = (Token, Span);
pub type LexError = Simple<char, Span>;

const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Unquoted atom or functor name: `foo`, `get_item`
    Ident(String),
    /// Quoted atom: `'Hello World'`
    Quoted(String),
    Variable(String),
    Number(String),
    String(String),
    /// A run of symbol characters: `-`, `-&-`, `=`, `?-`, `@`
    Symbol(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Bar,
    Comma,
    Dot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(text) => write!(f, "{}", text),
            Token::Quoted(text) => write!(f, "'{}'", text),
            Token::Variable(text) => write!(f, "{}", text),
            Token::Number(text) => write!(f, "{}", text),
            Token::String(text) => write!(f, "\"{}\"", text),
            Token::Symbol(text) => write!(f, "{}", text),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Bar => write!(f, "|"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
        }
    }
}

fn quoted_body(quote: char) -> impl Parser<char, String, Error = LexError> + Clone {
    let escape_sequence = just('\\').ignore_then(choice((
        just('"').to('"'),
        just('\'').to('\''),
        just('n').to('\n'),
        just('t').to('\t'),
        just('\\').to('\\'),
    )));

    let doubled = just(quote).then(just(quote)).to(quote);

    let plain = filter(move |c: &char| *c != quote && *c != '\\' && *c != '\n');

    just(quote)
        .ignore_then(choice((escape_sequence, doubled, plain)).repeated())
        .then_ignore(just(quote))
        .collect::<String>()
}

fn string_literal() -> impl Parser<char, String, Error = LexError> + Clone {
    quoted_body('"').labelled("string")
}

fn quoted_atom() -> impl Parser<char, String, Error = LexError> + Clone {
    quoted_body('\'').labelled("quoted atom")
}

fn number_literal() -> impl Parser<char, String, Error = LexError> + Clone {
    let digits = text::int(10);

    digits
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .map(|(whole, frac)| {
            if let Some(frac) = frac {
                format!("{}.{}", whole, frac)
            } else {
                whole
            }
        })
        .labelled("number")
}

fn identifier() -> impl Parser<char, Token, Error = LexError> + Clone {
    text::ident()
        .map(|ident: String| {
            if ident.starts_with(|c: char| c.is_uppercase() || c == '_') {
                Token::Variable(ident)
            } else {
                Token::Ident(ident)
            }
        })
        .labelled("identifier")
}

fn symbol_run() -> impl Parser<char, Token, Error = LexError> + Clone {
    filter(|c: &char| SYMBOL_CHARS.contains(*c))
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(|text| {
            if text == "." {
                Token::Dot
            } else {
                Token::Symbol(text)
            }
        })
        .labelled("symbol")
}

fn line_comment() -> impl Parser<char, (), Error = LexError> + Clone {
    just('%')
        .then(filter(|c| *c != '\n').repeated())
        .ignored()
        .labelled("line comment")
}

fn block_comment() -> impl Parser<char, (), Error = LexError> + Clone {
    just("/*")
        .then(take_until(just("*/")))
        .ignored()
        .labelled("block comment")
}

fn comment() -> impl Parser<char, (), Error = LexError> + Clone {
    block_comment().or(line_comment()).labelled("comment")
}

fn spacing() -> impl Parser<char, (), Error = LexError> + Clone {
    comment()
        .or(text::whitespace().at_least(1).ignored())
        .repeated()
        .ignored()
}

pub fn lexer() -> impl Parser<char, Vec<SpannedToken>, Error = LexError> + Clone {
    let punct = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('|').to(Token::Bar),
        just(',').to(Token::Comma),
    ));

    let token = choice((
        string_literal().map(Token::String),
        quoted_atom().map(Token::Quoted),
        number_literal().map(Token::Number),
        identifier(),
        punct,
        symbol_run(),
    ))
    .map_with_span(|token, span| (token, span))
    .padded_by(spacing());

    token.repeated().then_ignore(end())
}
