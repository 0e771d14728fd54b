//! Core value/expression type shared by the reader, the evaluator and the printer.
//!
//! Source syntax and runtime results use the same [`Value`] enum: self-evaluating atoms
//! (numbers and booleans) double as values, symbols and lists are the syntax the reader
//! produces, and closures, primitives and the unspecified marker only ever come out of the
//! evaluator. Helper functions [`val`], [`sym`] and [`nil`] make it easy to build trees in
//! code and tests, and `From` conversions cover Rust numbers, booleans, arrays and vectors.

use crate::Error;
use crate::environment::FrameId;
use crate::evaluator::intooperation::OperationFn;

/// Type alias for number values in interpreter
pub(crate) type NumberType = f64;

/// Core value type in interpreter
///
/// To build a tree, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// IEEE-754 double
    Number(NumberType),
    /// Symbols (identifiers)
    Symbol(String),
    /// Boolean values
    Bool(bool),
    /// Flat ordered list; source syntax such as `(op arg1 arg2)`
    List(Vec<Value>),
    /// Host-implemented procedure. Compared by name, not by function pointer.
    Primitive {
        name: String,
        func: std::sync::Arc<OperationFn>,
    },
    /// User-defined procedure created by `lambda`
    Closure {
        params: Vec<String>,
        body: Box<Value>,
        env: FrameId,
    },
    /// Result of `define`. Never equal to anything, itself included.
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Primitive { name, .. } => write!(f, "Primitive({name})"),
            Value::Closure { params, body, env } => {
                write!(f, "Closure(params={params:?}, body={body:?}, env={env:?})")
            }
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

// Only integer types that convert to f64 losslessly
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<bool, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::TypeError(format!(
                "expected boolean, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Helper for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
pub fn nil() -> Value {
    Value::List(vec![])
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Computed overflow has no numeral; use the R7RS spellings
            Value::Number(n) if n.is_nan() => write!(f, "+nan.0"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}inf.0", if n.is_sign_positive() { "+" } else { "-" })
            }
            // f64 Display is the shortest form that reads back to the same double
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Primitive { name, .. } => write!(f, "#<procedure:{name}>"),
            Value::Closure { .. } => write!(f, "#<procedure>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

/// Printer entry point: the text shown for a top-level result, or `None` for the
/// unspecified value produced by `define`.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Unspecified => None,
        other => Some(other.to_string()),
    }
}

impl Value {
    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Primitive { .. } | Value::Closure { .. })
    }

    /// Short kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Primitive { .. } | Value::Closure { .. } => "procedure",
            Value::Unspecified => "unspecified",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Primitive { name: n1, .. }, Value::Primitive { name: n2, .. }) => n1 == n2,
            (
                Value::Closure {
                    params: p1,
                    body: b1,
                    env: e1,
                },
                Value::Closure {
                    params: p2,
                    body: b2,
                    env: e2,
                },
            ) => p1 == p2 && b1 == b2 && e1 == e2,
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}
