//! Registry of built-in operations: primitive procedures and special forms.
//!
//! ```scheme
//! (+ 1 2 3)     ; 6, folds over any number of operands
//! (- 5)         ; -5, unary negation
//! (/ 4)         ; 0.25, unary reciprocal
//! (< 1 2)       ; #t, comparisons take exactly two numbers
//! (not #f)      ; #t
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive evaluated arguments (`+`, `not`, `<`). They are bound as
//!   ordinary global variables by [`crate::evaluator::create_global_env`], so they can be
//!   passed around and shadowed like any other value.
//! - **Special Forms**: receive their operands unevaluated (`if`, `define`, `lambda`,
//!   `and`, `or`). The evaluator dispatches on the literal head symbol, so rebinding the
//!   name never changes how the form behaves.
//!
//! ## Strictness
//!
//! Nothing is coerced. `(+ 1 #t)` and `(not 0)` are type errors, a zero divisor is a
//! `DivisionByZero` error rather than an infinity, and every function checks its arity
//! against the entry in this table before running.

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::environment::Environment;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, OperationFn, with_arity_check,
};
use crate::evaluator::{
    Arity, NumIter, Scope, eval_and, eval_define, eval_if, eval_lambda, eval_or,
};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Special form signature: unevaluated operands, the environment and the current scope
pub type SpecialFormFn = fn(&[Value], &mut Environment, &Scope<'_>) -> Result<Value, Error>;

/// How a built-in is implemented
#[derive(Clone)]
pub enum OpKind {
    /// Takes evaluated arguments
    Function(Arc<OperationFn>),
    /// Takes unevaluated operands
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name the operation is known by in source code
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Expected number of arguments (operands for special forms)
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }
}

//
// Builtin Function Implementations
//

macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> bool {
            a $op b
        }
    };
}

numeric_comparison!(builtin_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn builtin_add(args: NumIter<'_>) -> NumberType {
    args.sum()
}

fn builtin_mul(args: NumIter<'_>) -> NumberType {
    args.product()
}

fn builtin_sub(first: NumberType, mut rest: NumIter<'_>) -> NumberType {
    match rest.next() {
        Some(subtrahend) => first - subtrahend,
        None => -first,
    }
}

fn builtin_div(first: NumberType, mut rest: NumIter<'_>) -> Result<NumberType, Error> {
    let (dividend, divisor) = match rest.next() {
        Some(divisor) => (first, divisor),
        None => (1.0, first),
    };
    if divisor == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(dividend / divisor)
}

fn builtin_not(b: bool) -> bool {
    !b
}

static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn fixed<Args, F: IntoOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_operation()
    }

    fn variadic<Args, F: IntoVariadicOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_variadic_operation()
    }

    // The table's arity is enforced before the function sees its arguments
    fn function(id: &'static str, arity: Arity, func: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::Function(with_arity_check(arity, func)),
            arity,
        }
    }

    fn special_form(id: &'static str, arity: Arity, form: SpecialFormFn) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    type Num = NumberType;
    type Rest = NumIter<'static>;

    vec![
        function("+", Arity::Any, variadic::<(Rest,), _>(builtin_add)),
        function("*", Arity::Any, variadic::<(Rest,), _>(builtin_mul)),
        function("-", Arity::Range(1, 2), variadic::<(Num, Rest), _>(builtin_sub)),
        function("/", Arity::Range(1, 2), variadic::<(Num, Rest), _>(builtin_div)),
        function("=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_eq)),
        function("<", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_lt)),
        function(">", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_gt)),
        function("<=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_le)),
        function(">=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_ge)),
        function("not", Arity::Exact(1), fixed::<(bool,), _>(builtin_not)),
        special_form("if", Arity::Exact(3), eval_if),
        special_form("define", Arity::Exact(2), eval_define),
        special_form("lambda", Arity::Exact(2), eval_lambda),
        special_form("and", Arity::Any, eval_and),
        special_form("or", Arity::Any, eval_or),
    ]
});

static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Every built-in operation, primitives and special forms alike
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;

    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin through the registry using the erased signature
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        match &op.op_kind {
            OpKind::Function(func) => func(args.to_vec()),
            OpKind::SpecialForm(_) => {
                panic!("expected function builtin in tests, got special form: {name}")
            }
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let not_op = find_builtin_op("not").unwrap();
        assert_eq!(not_op.arity, Arity::Exact(1));
        assert!(!not_op.is_special_form());

        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::Any);
        if let OpKind::Function(func) = &add_op.op_kind {
            assert_eq!(func(vec![val(1), val(2)]).unwrap(), val(3));
        } else {
            panic!("Expected Function variant");
        }

        for form in ["if", "define", "lambda", "and", "or"] {
            assert!(find_builtin_op(form).unwrap().is_special_form(), "{form}");
        }
        assert_eq!(find_builtin_op("if").unwrap().arity, Arity::Exact(3));
        assert_eq!(find_builtin_op("-").unwrap().arity, Arity::Range(1, 2));

        assert!(find_builtin_op("quote").is_none());
        assert!(find_builtin_op("car").is_none());
        assert_eq!(get_builtin_ops().len(), 15);
    }

    /// (name, result, expected value or None for an error)
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();

        let test_cases: Vec<TestCase> = vec![
            // Addition and multiplication fold
            test!("+", &[], success(0)),
            test!("+", &[val(5)], success(5)),
            test!("+", &[val(1), val(2), val(3)], success(6)),
            test!("+", &many_ones, success(100)),
            test!("+", &[val(0.5), val(0.25)], success(0.75)),
            test!("+", &[val(1), val(true)], None),
            test!("*", &[], success(1)),
            test!("*", &[val(2), val(3), val(4)], success(24)),
            test!("*", &[val(2), val(-0.5)], success(-1)),
            test!("*", &[val(false)], None),
            // Subtraction: unary negation, binary difference
            test!("-", &[val(5)], success(-5)),
            test!("-", &[val(10), val(3)], success(7)),
            test!("-", &[val(1.5), val(2)], success(-0.5)),
            test!("-", &[], None),
            test!("-", &[val(1), val(2), val(3)], None),
            test!("-", &[val(true), val(1)], None),
            // Division: unary reciprocal, binary quotient
            test!("/", &[val(4)], success(0.25)),
            test!("/", &[val(10), val(4)], success(2.5)),
            test!("/", &[val(0), val(5)], success(0)),
            test!("/", &[val(1), val(0)], None),
            test!("/", &[val(0)], None),
            test!("/", &[val(1), val(2), val(3)], None),
            // Comparisons take exactly two numbers
            test!("=", &[val(3), val(3)], success(true)),
            test!("=", &[val(3), val(3.5)], success(false)),
            test!("<", &[val(1), val(2)], success(true)),
            test!("<", &[val(2), val(1)], success(false)),
            test!(">", &[val(2), val(1)], success(true)),
            test!("<=", &[val(2), val(2)], success(true)),
            test!(">=", &[val(1), val(2)], success(false)),
            test!("<", &[val(1)], None),
            test!("<", &[val(1), val(2), val(3)], None),
            test!("=", &[val(true), val(true)], None),
            // not
            test!("not", &[val(true)], success(false)),
            test!("not", &[val(false)], success(true)),
            test!("not", &[val(0)], None),
            test!("not", &[], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "case {} ({name})", i + 1);
                }
                (Err(_), None) => {}
                (result, expected) => {
                    panic!("case {} ({name}): expected {expected:?}, got {result:?}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            call_builtin("/", &[val(1), val(0)]),
            Err(Error::DivisionByZero)
        );
        assert_eq!(call_builtin("/", &[val(0)]), Err(Error::DivisionByZero));
        assert!(matches!(
            call_builtin("-", &[val(1), val(2), val(3)]),
            Err(Error::ArityError {
                expected: Arity::Range(1, 2),
                got: 3,
                ..
            })
        ));
        assert!(matches!(
            call_builtin("not", &[val(1)]),
            Err(Error::TypeError(msg)) if msg == "expected boolean, got number"
        ));
        assert!(matches!(
            call_builtin("+", &[val(1), val(false)]),
            Err(Error::TypeError(msg)) if msg == "expected number, got boolean"
        ));
    }
}
