//! minischeme - a minimal Scheme-like tree-walking interpreter
//!
//! The crate implements a small, strictly evaluated Scheme dialect: numbers (IEEE doubles),
//! booleans, symbols and lists, the `if`/`define`/`lambda`/`and`/`or` special forms, closures,
//! and a handful of arithmetic, comparison and logic primitives.
//!
//! ```scheme
//! (define fib (lambda (n) (if (<= n 1) n (+ (fib (- n 1)) (fib (- n 2))))))
//! (fib 10)            ; 55
//! ((lambda (x) (+ x 1)) 10)  ; 11
//! (and #f (undefined))       ; #f, second operand never evaluated
//! ```
//!
//! ## Semantics
//!
//! - Only `#f` is false; every other value (including `0`) is true for `if`.
//! - `and`/`or` short-circuit and require boolean operands.
//! - Closures capture the frame they were created in, by reference.
//! - `define` always binds in the current frame.
//! - Primitives check their own arity and operand types; nothing is coerced.
//!
//! ## Modules
//!
//! - `scheme`: the reader, text to [`ast::Value`] trees
//! - `ast`: the value/expression model and printer
//! - `environment`: arena of binding frames with generational ids and a sweep pass
//! - `evaluator`: `eval` and the special forms
//! - `builtinops`: the primitive library registry
//! - `runner`: comment stripping and multi-form source evaluation used by the CLI

use thiserror::Error;

use crate::evaluator::Arity;

/// Maximum list nesting accepted by the reader before it gives up with
/// [`SyntaxErrorKind::TooDeeplyNested`].
pub const MAX_PARSE_DEPTH: usize = 1024;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SyntaxErrorKind {
    /// A `)` with no matching `(`
    UnexpectedCloseParen,
    /// Input ended inside a list
    UnbalancedParenthesis,
    /// A `#` token other than `#t` or `#f`
    InvalidBoolean,
    /// Nothing left to read
    UnexpectedEof,
    /// Extra input after a complete expression (only for [`scheme::parse_scheme`])
    TrailingContent,
    /// Nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// A numeral too large to be represented as a finite double
    NumberOutOfRange,
}

/// A structured error describing malformed source text.
#[derive(Debug, PartialEq, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    /// Snippet of the input around the error position (max 100 chars)
    pub context: Option<String>,
    /// The offending token, if identifiable
    pub found: Option<String>,
}

impl SyntaxError {
    pub fn new(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        SyntaxError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    pub fn from_message(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Build an error whose context is the slice of `input` surrounding `offset`.
    pub fn at(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        input: &str,
        offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;
        const LEAD: usize = 20;

        let start = offset.saturating_sub(LEAD);
        let snippet: String = input.chars().skip(start).take(MAX_CONTEXT).collect();
        let total = input.chars().count();

        let mut context = String::new();
        if start > 0 {
            context.push_str("[...]");
        }
        context.push_str(&snippet);
        if start + snippet.chars().count() < total {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(context), found)
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    SyntaxError(#[from] SyntaxError),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn arity_message(expected: &Arity, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("ArityError: {expr}: expected {expected} arguments, got {got}"),
        None => format!("ArityError: expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// ArityError for an exact expected count, without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected: Arity::Exact(expected),
            got,
            expression: None,
        }
    }

    /// ArityError naming the form that was called with the wrong operand count
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    pub(crate) fn syntax(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Error::SyntaxError(SyntaxError::from_message(kind, message))
    }

    /// The syntax error kind, if this is a reader failure.
    pub fn syntax_kind(&self) -> Option<SyntaxErrorKind> {
        match self {
            Error::SyntaxError(e) => Some(e.kind),
            _ => None,
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;

#[cfg(feature = "scheme")]
pub mod runner;

#[cfg(feature = "scheme")]
pub mod scheme;
