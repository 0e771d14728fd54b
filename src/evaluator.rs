use log::trace;

use crate::Error;
use crate::ast::Value;
use crate::builtinops::{BuiltinOp, OpKind, find_builtin_op, get_builtin_ops};
use crate::environment::{Environment, FrameId};

pub mod intooperation;

pub use intooperation::{BoolIter, NumIter, ValueIter};

/// Expected number of arguments for a primitive or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// At least this many arguments
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn validate(self, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&got),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::ArityError {
                expected: self,
                got,
                expression: None,
            })
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Knobs for a single evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of evaluation steps; `None` means unbounded (host stack permitting).
    pub max_depth: Option<usize>,
}

impl EvalConfig {
    pub fn with_max_depth(max_depth: usize) -> Self {
        EvalConfig {
            max_depth: Some(max_depth),
        }
    }
}

/// Where an expression is being evaluated: current frame, nesting depth and config.
/// Special forms receive one of these.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'c> {
    frame: FrameId,
    depth: usize,
    config: &'c EvalConfig,
}

impl<'c> Scope<'c> {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    fn deeper(&self) -> Scope<'c> {
        Scope {
            depth: self.depth + 1,
            ..*self
        }
    }

    fn enter(&self, frame: FrameId) -> Scope<'c> {
        Scope {
            frame,
            depth: self.depth + 1,
            config: self.config,
        }
    }
}

/// Evaluate an expression in the global frame without a depth bound
pub fn eval(expr: &Value, env: &mut Environment) -> Result<Value, Error> {
    eval_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an expression in the global frame
pub fn eval_with_config(
    expr: &Value,
    env: &mut Environment,
    config: &EvalConfig,
) -> Result<Value, Error> {
    let global = env.global();
    eval_in(expr, env, global, config)
}

/// Evaluate an expression in an arbitrary frame of `env`
pub fn eval_in(
    expr: &Value,
    env: &mut Environment,
    frame: FrameId,
    config: &EvalConfig,
) -> Result<Value, Error> {
    let scope = Scope {
        frame,
        depth: 0,
        config,
    };
    eval_with_depth_tracking(expr, env, &scope)
}

fn eval_with_depth_tracking(
    expr: &Value,
    env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    if let Some(max) = scope.config.max_depth
        && scope.depth >= max
    {
        return Err(Error::EvalError(format!(
            "evaluation depth limit exceeded (max: {max})"
        )));
    }
    match expr {
        Value::Number(_) | Value::Bool(_) | Value::Primitive { .. } | Value::Closure { .. } => {
            Ok(expr.clone())
        }

        Value::Symbol(name) => env.lookup(scope.frame, name),

        Value::List(elements) => {
            eval_list(expr, elements, env, scope).map_err(|err| add_context(err, expr))
        }

        Value::Unspecified => Err(Error::EvalError(
            "cannot evaluate the unspecified value".to_owned(),
        )),
    }
}

/// Append a context line to EvalError/TypeError messages. Only the innermost
/// line with a given label is kept.
fn with_context(error: Error, label: &str, expr: &Value) -> Error {
    let annotate = |msg: String| {
        if msg.contains(label) {
            msg
        } else {
            format!("{msg}\n  {label} {expr}")
        }
    };
    match error {
        Error::EvalError(msg) => Error::EvalError(annotate(msg)),
        Error::TypeError(msg) => Error::TypeError(annotate(msg)),
        other => other,
    }
}

fn add_context(error: Error, expr: &Value) -> Error {
    with_context(error, "Context: while evaluating:", expr)
}

/// Evaluate one operand whose value is going to be used, rejecting `Unspecified`.
fn eval_operand(
    expr: &Value,
    env: &mut Environment,
    scope: &Scope<'_>,
    role: &str,
) -> Result<Value, Error> {
    match eval_with_depth_tracking(expr, env, &scope.deeper())? {
        Value::Unspecified => Err(Error::EvalError(format!(
            "use of unspecified value as {role}: {expr}"
        ))),
        value => Ok(value),
    }
}

fn eval_list(
    expr: &Value,
    elements: &[Value],
    env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    let [head, operands @ ..] = elements else {
        return Err(Error::EvalError("cannot evaluate empty list".to_owned()));
    };

    // Special forms are recognized by the literal head symbol, whatever it is bound to
    if let Value::Symbol(name) = head
        && let Some(BuiltinOp {
            op_kind: OpKind::SpecialForm(form),
            arity,
            ..
        }) = find_builtin_op(name)
    {
        if arity.validate(operands.len()).is_err() {
            return Err(Error::arity_error_with_expr(
                *arity,
                operands.len(),
                expr.to_string(),
            ));
        }
        return form(operands, env, scope);
    }

    let func = eval_with_depth_tracking(head, env, &scope.deeper())?;
    // The head is checked before any operand runs
    if !func.is_procedure() {
        return Err(not_a_procedure(&func));
    }
    let args = operands
        .iter()
        .map(|arg| eval_operand(arg, env, scope, "argument"))
        .collect::<Result<Vec<_>, _>>()?;

    apply(&func, args, env, scope)
}

fn apply(
    func: &Value,
    args: Vec<Value>,
    env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    match func {
        Value::Primitive { func, .. } => func(args),
        Value::Closure {
            params,
            body,
            env: captured,
        } => {
            if params.len() != args.len() {
                return Err(Error::arity_error(params.len(), args.len()));
            }

            let frame = env.new_child(*captured)?;
            for (param, arg) in params.iter().zip(args) {
                env.define(frame, param.as_str(), arg)?;
            }
            trace!(
                "applying closure ({}) in frame {}",
                params.join(" "),
                frame.index()
            );

            eval_with_depth_tracking(body, env, &scope.enter(frame))
                .map_err(|err| with_context(err, "In lambda:", body))
        }
        other => Err(not_a_procedure(other)),
    }
}

fn not_a_procedure(value: &Value) -> Error {
    Error::TypeError(format!("cannot apply non-procedure: {value}"))
}

pub(crate) fn eval_define(
    args: &[Value],
    env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_operand(expr, env, scope, "define value")?;
            trace!("define {name} in frame {}", scope.frame.index());
            env.define(scope.frame, name.as_str(), value)?;
            Ok(Value::Unspecified)
        }
        [target, _] => Err(Error::TypeError(format!(
            "define requires a symbol, got {}",
            target.type_name()
        ))),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

pub(crate) fn eval_if(
    args: &[Value],
    env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    match args {
        [test, conseq, alt] => {
            // Only #f selects the alternative
            let branch = if eval_operand(test, env, scope, "if test")?.is_truthy() {
                conseq
            } else {
                alt
            };
            eval_with_depth_tracking(branch, env, &scope.deeper())
        }
        _ => Err(Error::arity_error(3, args.len())),
    }
}

pub(crate) fn eval_lambda(
    args: &[Value],
    _env: &mut Environment,
    scope: &Scope<'_>,
) -> Result<Value, Error> {
    match args {
        [Value::List(param_list), body] => {
            let mut params: Vec<String> = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Value::Symbol(name) => {
                        if params.contains(name) {
                            return Err(Error::EvalError(format!(
                                "duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    other => {
                        return Err(Error::TypeError(format!(
                            "lambda parameters must be symbols, got {}",
                            other.type_name()
                        )));
                    }
                }
            }

            Ok(Value::Closure {
                params,
                body: Box::new(body.clone()),
                env: scope.frame,
            })
        }
        [_, _] => Err(Error::TypeError(
            "lambda parameters must be a list".to_owned(),
        )),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

macro_rules! boolean_logic_op {
    ($name:ident, $op_name:literal, $short_circuit:literal, $default:literal) => {
        pub(crate) fn $name(
            args: &[Value],
            env: &mut Environment,
            scope: &Scope<'_>,
        ) -> Result<Value, Error> {
            for arg in args {
                match eval_operand(arg, env, scope, concat!("'", $op_name, "' operand"))? {
                    Value::Bool($short_circuit) => return Ok(Value::Bool($short_circuit)),
                    Value::Bool(_) => {}
                    other => {
                        return Err(Error::TypeError(format!(
                            concat!("'", $op_name, "' requires boolean operands, got {}"),
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Bool($default))
        }
    };
}

boolean_logic_op!(eval_and, "and", false, true);
boolean_logic_op!(eval_or, "or", true, false);

/// Create an environment whose global frame holds every primitive from the registry
pub fn create_global_env() -> Environment {
    let mut env = Environment::new();
    for op in get_builtin_ops() {
        if let OpKind::Function(func) = &op.op_kind {
            env.bind_primitive(op.id, func.clone());
        }
    }
    env
}
