//! Reader: source text to [`Value`] trees.
//!
//! Tokens are maximal runs of characters other than whitespace and parentheses. A token is a
//! boolean if it is exactly `#t`/`#f`, a number if the whole token matches
//! `-?digits(.digits)?`, and a symbol otherwise; any other token starting with `#` is
//! rejected, as is a numeral too large for a finite double. Comments are not handled here,
//! see [`crate::runner::strip_comments`].

use nom::{
    IResult, Parser,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    error::{ErrorKind, ParseError},
};

use crate::ast::{NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, SyntaxError, SyntaxErrorKind};

/// Parser error carrying the reader's own error kinds alongside nom's
#[derive(Debug, Clone, PartialEq)]
struct ReadError<'a> {
    input: &'a str,
    kind: ReadErrorKind<'a>,
}

#[derive(Debug, Clone, PartialEq)]
enum ReadErrorKind<'a> {
    Syntax {
        kind: SyntaxErrorKind,
        message: &'static str,
        found: Option<&'a str>,
    },
    Nom(ErrorKind),
}

impl<'a> ReadError<'a> {
    fn syntax(
        input: &'a str,
        kind: SyntaxErrorKind,
        message: &'static str,
        found: Option<&'a str>,
    ) -> nom::Err<Self> {
        nom::Err::Failure(ReadError {
            input,
            kind: ReadErrorKind::Syntax {
                kind,
                message,
                found,
            },
        })
    }
}

impl<'a> ParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        ReadError {
            input,
            kind: ReadErrorKind::Nom(kind),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type ReadResult<'a, T> = IResult<&'a str, T, ReadError<'a>>;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

fn whitespace(input: &str) -> ReadResult<'_, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn token(input: &str) -> ReadResult<'_, &str> {
    take_while1(|c: char| !is_delimiter(c)).parse(input)
}

/// `-?digits(.digits)?`
fn number_syntax(input: &str) -> IResult<&str, &str> {
    recognize((opt(char('-')), digit1, opt((char('.'), digit1)))).parse(input)
}

fn is_number_literal(token: &str) -> bool {
    all_consuming(number_syntax).parse(token).is_ok()
}

fn parse_atom(input: &str) -> ReadResult<'_, Value> {
    let (rest, tok) = token(input)?;
    let value = match tok {
        "#t" => Value::Bool(true),
        "#f" => Value::Bool(false),
        _ if tok.starts_with('#') => {
            return Err(ReadError::syntax(
                input,
                SyntaxErrorKind::InvalidBoolean,
                "invalid boolean literal",
                Some(tok),
            ));
        }
        _ if is_number_literal(tok) => match tok.parse::<NumberType>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => {
                return Err(ReadError::syntax(
                    input,
                    SyntaxErrorKind::NumberOutOfRange,
                    "number out of range",
                    Some(tok),
                ));
            }
        },
        _ => Value::Symbol(tok.to_owned()),
    };
    Ok((rest, value))
}

fn parse_list(input: &str, depth: usize) -> ReadResult<'_, Value> {
    let open = input;
    let (mut input, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    loop {
        let (rest, _) = whitespace(input)?;
        if rest.is_empty() {
            return Err(ReadError::syntax(
                open,
                SyntaxErrorKind::UnbalancedParenthesis,
                "unbalanced parenthesis",
                None,
            ));
        }
        if let Ok((rest, _)) = char::<_, ReadError<'_>>(')').parse(rest) {
            return Ok((rest, Value::List(elements)));
        }
        let (rest, element) = parse_sexpr(rest, depth + 1)?;
        elements.push(element);
        input = rest;
    }
}

fn parse_sexpr(input: &str, depth: usize) -> ReadResult<'_, Value> {
    let (input, _) = whitespace(input)?;
    if depth >= MAX_PARSE_DEPTH {
        return Err(ReadError::syntax(
            input,
            SyntaxErrorKind::TooDeeplyNested,
            "expression too deeply nested",
            None,
        ));
    }
    match input.chars().next() {
        None => Err(ReadError::syntax(
            input,
            SyntaxErrorKind::UnexpectedEof,
            "unexpected end of input",
            None,
        )),
        Some(')') => Err(ReadError::syntax(
            input,
            SyntaxErrorKind::UnexpectedCloseParen,
            "unexpected ')'",
            Some(")"),
        )),
        Some('(') => parse_list(input, depth),
        Some(_) => parse_atom(input),
    }
}

/// Convert a nom failure into a [`SyntaxError`] positioned within `source`
fn to_error(source: &str, err: nom::Err<ReadError<'_>>) -> Error {
    let e = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return Error::syntax(SyntaxErrorKind::UnexpectedEof, "incomplete input");
        }
    };
    let byte_offset = source.len().saturating_sub(e.input.len());
    let offset = source
        .get(..byte_offset)
        .map_or(0, |prefix| prefix.chars().count());

    let (kind, message, found) = match e.kind {
        ReadErrorKind::Syntax {
            kind,
            message,
            found,
        } => (kind, message.to_owned(), found.map(str::to_owned)),
        ReadErrorKind::Nom(code) => (
            SyntaxErrorKind::UnexpectedEof,
            format!("invalid syntax ({code:?})"),
            None,
        ),
    };
    SyntaxError::at(kind, message, source, offset, found).into()
}

/// Read exactly one expression from the front of `input`, returning it with the
/// unconsumed remainder. Leading whitespace is skipped; trailing text is left alone.
pub fn read(input: &str) -> Result<(Value, &str), Error> {
    match parse_sexpr(input, 0) {
        Ok((rest, value)) => Ok((value, rest)),
        Err(e) => Err(to_error(input, e)),
    }
}

/// Parse a source text that must contain exactly one expression.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    let (value, rest) = read(input)?;
    let (trailing, _) = whitespace(rest).map_err(|e| to_error(input, e))?;
    match trailing.chars().next() {
        None => Ok(value),
        Some(')') => Err(to_error(
            input,
            ReadError::syntax(
                trailing,
                SyntaxErrorKind::UnexpectedCloseParen,
                "unexpected ')'",
                Some(")"),
            ),
        )),
        Some(_) => {
            let found = token(trailing).map(|(_, tok)| tok).ok();
            Err(to_error(
                input,
                ReadError::syntax(
                    trailing,
                    SyntaxErrorKind::TrailingContent,
                    "unexpected input after expression",
                    found,
                ),
            ))
        }
    }
}

/// Read every top-level expression in `input`, in order
pub fn read_all(input: &str) -> Result<Vec<Value>, Error> {
    let mut values = Vec::new();
    let mut rest = input;
    loop {
        let (remaining, _) = whitespace(rest).map_err(|e| to_error(input, e))?;
        if remaining.is_empty() {
            return Ok(values);
        }
        match parse_sexpr(remaining, 0) {
            Ok((next, value)) => {
                values.push(value);
                rest = next;
            }
            Err(e) => return Err(to_error(input, e)),
        }
    }
}
