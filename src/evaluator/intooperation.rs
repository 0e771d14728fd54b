//! Adapters that turn strongly-typed Rust functions into the erased [`OperationFn`]
//! stored in [`Value::Primitive`].
//!
//! Fixed-arity functions take parameters implementing [`FromParam`] (`f64`, `bool`,
//! `Value`). Variadic functions end in a rest iterator ([`NumIter`], [`BoolIter`] or
//! [`ValueIter`]) and may have up to three fixed parameters in front of it. Conversion
//! failures surface as `TypeError`, count mismatches as `ArityError`.

use crate::Error;
use crate::ast::Value;
use crate::evaluator::Arity;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

/// Erased primitive signature. Primitives own their argument vector.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

/// Wrap `inner` so the argument count is validated against `arity` first.
pub(crate) fn with_arity_check(arity: Arity, inner: Arc<OperationFn>) -> Arc<OperationFn> {
    Arc::new(move |args: Vec<Value>| {
        arity.validate(args.len())?;
        inner(args)
    })
}

/// Conversion of one evaluated argument into a typed parameter.
#[doc(hidden)]
pub trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Unspecified))
    }
}

// Covers f64 and bool through the TryFrom impls in ast.rs
impl<T> FromParam for T
where
    Value: TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        std::mem::replace(value, Value::Unspecified).try_into()
    }
}

/// How to view a slice of arguments as typed elements. `precheck` validates the whole
/// slice up front so `project` never fails.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project<'a>(v: &'a Value) -> Option<Self::Item<'a>>;
}

/// Iterator over a slice of arguments, typed by a [`ValueElementKind`].
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K: ValueElementKind> TypedValueIter<'a, K> {
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K: ValueElementKind> Iterator for TypedValueIter<'a, K> {
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find_map(K::project)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: ValueElementKind> ExactSizeIterator for TypedValueIter<'_, K> {}
impl<K: ValueElementKind> FusedIterator for TypedValueIter<'_, K> {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Value) -> Option<Self::Item<'a>> {
        Some(v)
    }
}

macro_rules! element_kind {
    ($kind:ident, $item:ty, $variant:ident, $expected:literal) => {
        #[doc(hidden)]
        pub struct $kind;

        impl ValueElementKind for $kind {
            type Item<'a> = $item;

            fn precheck(slice: &[Value]) -> Result<(), Error> {
                match slice.iter().find(|v| !matches!(v, Value::$variant(_))) {
                    Some(bad) => Err(Error::TypeError(format!(
                        concat!("expected ", $expected, ", got {}"),
                        bad.type_name()
                    ))),
                    None => Ok(()),
                }
            }

            fn project<'a>(v: &'a Value) -> Option<Self::Item<'a>> {
                match v {
                    Value::$variant(x) => Some(*x),
                    _ => None,
                }
            }
        }
    };
}

element_kind!(NumberKind, f64, Number, "number");
element_kind!(BoolKind, bool, Bool, "boolean");

/// Borrowed iterator over arbitrary argument values
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Iterator over numeric arguments; a non-number anywhere fails before iteration starts
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Iterator over boolean arguments
pub type BoolIter<'a> = TypedValueIter<'a, BoolKind>;

/// Construction of a rest parameter from the trailing arguments.
#[doc(hidden)]
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K: ValueElementKind> FromRest for TypedValueIter<'static, K> {
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

/// Normalizes `T` and `Result<T, Error>` returns to `Result<Value, Error>`.
#[doc(hidden)]
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T: Into<Value>> IntoValueResult for Result<T, Error> {
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T: Into<Value>> IntoValueResult for T {
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Fixed-arity functions, keyed by their parameter tuple.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Functions ending in a rest iterator, keyed by their parameter tuple
/// (for example `(f64, NumIter<'static>)`).
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| (self)(I::from_rest(&args)?).into_value_result())
    }
}

macro_rules! impl_variadic_with_prefix {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+, <I as FromRest>::Param<'a> ) -> R
                + Send
                + Sync
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        [ $( $v ),+, rest @ .. ] => {
                            $( let $p = $A::from_arg($v)?; )+
                            let rest = I::from_rest(rest)?;
                            (self)( $( $p ),+, rest ).into_value_result()
                        }
                        _ => Err(Error::ArityError {
                            expected: Arity::AtLeast($prefix),
                            got: len,
                            expression: None,
                        }),
                    }
                })
            }
        }
    };
}

impl_variadic_with_prefix!(1, v0, p0: A1);
impl_variadic_with_prefix!(2, v0, p0: A1, v1, p1: A2);
impl_variadic_with_prefix!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }
            (self)().into_value_result()
        })
    }
}

macro_rules! impl_fixed_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        [ $( $v ),+ ] => {
                            $( let $p = $A::from_arg($v)?; )+
                            (self)( $( $p ),+ ).into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

impl_fixed_arity!(1, v0, p0: A1);
impl_fixed_arity!(2, v0, p0: A1, v1, p1: A2);
impl_fixed_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
impl_fixed_arity!(4, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;

    fn signed(a: f64, positive: bool) -> f64 {
        if positive { a } else { -a }
    }

    fn seven() -> f64 {
        7.0
    }

    fn is_procedure(v: Value) -> bool {
        v.is_procedure()
    }

    fn sum(args: NumIter<'_>) -> f64 {
        args.sum()
    }

    fn all_true(mut args: BoolIter<'_>) -> bool {
        args.all(|b| b)
    }

    fn count(args: ValueIter<'_>) -> Result<f64, Error> {
        Ok(args.len() as f64)
    }

    fn subtract_all(first: f64, rest: NumIter<'_>) -> f64 {
        rest.fold(first, |acc, n| acc - n)
    }

    #[test]
    fn test_fixed_arity_conversion() {
        let op = IntoOperation::<(f64, bool)>::into_operation(signed);
        assert_eq!(op(vec![val(3), val(false)]).unwrap(), val(-3));
        assert!(matches!(
            op(vec![val(true), val(false)]),
            Err(Error::TypeError(msg)) if msg == "expected number, got boolean"
        ));
        assert!(matches!(
            op(vec![val(1)]),
            Err(Error::ArityError { got: 1, .. })
        ));
    }

    #[test]
    fn test_zero_arity() {
        let op = IntoOperation::<()>::into_operation(seven);
        assert_eq!(op(vec![]).unwrap(), val(7));
        assert!(op(vec![val(1)]).is_err());
    }

    #[test]
    fn test_value_parameter_passes_through() {
        let op = IntoOperation::<(Value,)>::into_operation(is_procedure);
        assert_eq!(op(vec![val(1)]).unwrap(), val(false));
    }

    #[test]
    fn test_rest_iterators() {
        let sum = IntoVariadicOperation::<(NumIter<'static>,)>::into_variadic_operation(sum);
        assert_eq!(sum(vec![]).unwrap(), val(0));
        assert_eq!(sum(vec![val(1), val(2.5)]).unwrap(), val(3.5));
        assert!(matches!(
            sum(vec![val(1), val(true)]),
            Err(Error::TypeError(msg)) if msg.contains("got boolean")
        ));

        let all =
            IntoVariadicOperation::<(BoolIter<'static>,)>::into_variadic_operation(all_true);
        assert_eq!(all(vec![val(true), val(true)]).unwrap(), val(true));
        assert_eq!(all(vec![val(true), val(false)]).unwrap(), val(false));

        let count = IntoVariadicOperation::<(ValueIter<'static>,)>::into_variadic_operation(count);
        assert_eq!(count(vec![val(1), val(true)]).unwrap(), val(2));
    }

    #[test]
    fn test_prefix_and_rest() {
        let op = IntoVariadicOperation::<(f64, NumIter<'static>)>::into_variadic_operation(
            subtract_all,
        );
        assert_eq!(op(vec![val(10), val(1), val(2)]).unwrap(), val(7));
        assert_eq!(op(vec![val(10)]).unwrap(), val(10));
        assert!(matches!(
            op(vec![]),
            Err(Error::ArityError { got: 0, .. })
        ));
    }
}
