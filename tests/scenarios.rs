//! Language scenarios driven through the public API: read, evaluate, render.

#![expect(clippy::unwrap_used)] // test code OK

use minischeme::Error;
use minischeme::ast::{Value, render};
use minischeme::environment::Environment;
use minischeme::evaluator::{create_global_env, eval};
use minischeme::runner::{RunOptions, run_source};
use minischeme::scheme::{parse_scheme, read_all};

/// Evaluate every form of `program` and return the last result
fn eval_program(env: &mut Environment, program: &str) -> Result<Value, Error> {
    let mut last = Ok(Value::Unspecified);
    for form in read_all(program)? {
        last = eval(&form, env);
        if last.is_err() {
            break;
        }
    }
    last
}

fn shown(program: &str) -> String {
    let mut env = create_global_env();
    render(&eval_program(&mut env, program).unwrap()).unwrap_or_default()
}

#[test]
fn test_printed_results() {
    let cases = [
        ("((lambda (x) (+ x 1)) 10)", "11"),
        ("(define add-one (lambda (x) (+ x 1))) (add-one 99)", "100"),
        (
            "(define fib (lambda (n) (if (<= n 1) n (+ (fib (- n 1)) (fib (- n 2)))))) (fib 10)",
            "55",
        ),
        ("(if (if #f #t #f) 1 0)", "0"),
        ("(not #t)", "#f"),
        ("(not #f)", "#t"),
        ("(if #t 1 2)", "1"),
        ("(if #f 1 2)", "2"),
        ("(if 0 1 2)", "1"),
        ("(and #f (undefined-thing))", "#f"),
        ("(or #t (undefined-thing))", "#t"),
        ("(/ 1 2)", "0.5"),
        ("(- 3)", "-3"),
        ("(define x 1)", ""),
        ("+", "#<procedure:+>"),
        ("(lambda (x) x)", "#<procedure>"),
    ];

    for (program, expected) in cases {
        assert_eq!(shown(program), expected, "program: {program}");
    }
}

#[test]
fn test_overflow_prints_infinity() {
    let big = format!("1{}", "0".repeat(300));
    assert_eq!(shown(&format!("(* {big} {big})")), "+inf.0");
    assert_eq!(shown(&format!("(- 0 (* {big} {big}))")), "-inf.0");
}

#[test]
fn test_closures_capture_defining_frame() {
    let mut env = create_global_env();
    let result = eval_program(
        &mut env,
        "(define x 100)
         (define make-adder (lambda (x) (lambda (y) (+ x y))))
         ((make-adder 5) 10)",
    );
    assert_eq!(result.unwrap(), Value::Number(15.0));
    // The global x is untouched by the parameter of the same name
    assert_eq!(eval_program(&mut env, "x").unwrap(), Value::Number(100.0));
}

#[test]
fn test_shadowing_is_local_to_closure() {
    let mut env = create_global_env();
    eval_program(
        &mut env,
        "(define n 7) (define square (lambda (n) (* n n)))",
    )
    .unwrap();
    assert_eq!(eval_program(&mut env, "(square 3)").unwrap(), Value::Number(9.0));
    assert_eq!(eval_program(&mut env, "n").unwrap(), Value::Number(7.0));
}

#[test]
fn test_define_inside_closure_binds_locally() {
    let mut env = create_global_env();
    let result = eval_program(
        &mut env,
        "(define g (lambda (v) (define b (* v 2))))
         (g 4)",
    );
    assert!(matches!(result, Ok(Value::Unspecified)));
    assert!(matches!(
        eval_program(&mut env, "b"),
        Err(Error::UnboundVariable(name)) if name == "b"
    ));
}

#[test]
fn test_error_kinds() {
    let mut env = create_global_env();
    assert!(matches!(
        eval_program(&mut env, "(/ 1 0)"),
        Err(Error::DivisionByZero)
    ));
    assert!(matches!(
        eval_program(&mut env, "(foo 1)"),
        Err(Error::UnboundVariable(name)) if name == "foo"
    ));
    assert!(matches!(
        eval_program(&mut env, "(+ 1 #t)"),
        Err(Error::TypeError(_))
    ));
    assert!(matches!(
        eval_program(&mut env, "(not 1 2)"),
        Err(Error::ArityError { got: 2, .. })
    ));
    assert!(matches!(
        eval_program(&mut env, "(1 2 3)"),
        Err(Error::TypeError(msg)) if msg.starts_with("cannot apply non-procedure")
    ));
    assert!(matches!(
        eval_program(&mut env, "(lambda (x x) x)"),
        Err(Error::EvalError(_))
    ));
    assert!(matches!(
        eval_program(&mut env, "(+ 1"),
        Err(Error::SyntaxError(_))
    ));
}

#[test]
fn test_reader_round_trip() {
    for text in ["42", "-3.5", "#t", "#f", "foo", "()", "(a (b c) 1 #f)"] {
        let value = parse_scheme(text).unwrap();
        assert_eq!(value.to_string(), text);
        assert_eq!(parse_scheme(&value.to_string()).unwrap(), value);
    }
}

#[test]
fn test_sweep_keeps_captured_frames() {
    let mut env = create_global_env();
    let summary = run_source(
        "(define make-counter-base (lambda (start) (lambda (step) (+ start step))))
         (define from-ten (make-counter-base 10))
         (define triple (lambda (n) (* 3 n)))
         (triple (triple 2))
         (from-ten 5)",
        &mut env,
        &RunOptions::default(),
        |_| {},
    );
    assert!(summary.is_success());
    // Global frame plus the one captured by from-ten; the triple call frames are gone
    assert_eq!(env.live_frames(), 2);
    assert_eq!(eval_program(&mut env, "(from-ten 1)").unwrap(), Value::Number(11.0));

    // Dropping the last reference frees the captured frame along with the call frame above
    eval_program(&mut env, "(define from-ten #f)").unwrap();
    assert_eq!(env.collect_garbage(&[]), 2);
    assert_eq!(env.live_frames(), 1);
}
