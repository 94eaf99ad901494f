//! Bidirectional conversion between script values and host types (§4.2), plus the
//! variadic-to-uniform adapter that turns a typed host function into a `NativeFunc`.
//!
//! A live host variable is modelled as an `Rc<RefCell<T>>` shared between the host
//! and the interpreter rather than a raw borrowed reference: the host keeps its own
//! clone of the `Rc` and may read it again after `run()` returns, and the
//! interpreter never needs to reason about the host reference's lifetime (§3.2's
//! "the interpreter never stores raw host pointers outside `Extern<T>` holders" is
//! satisfied because the only pointer it stores is the reference-counted cell
//! itself).

use std::{any, cell::RefCell, fmt, rc::Rc};

use crate::{error::ErrorKind, value::Value};

/// Type-directed conversion from a script [`Value`] into a host type.
///
/// Built-in for the three scalar kinds named in §4.2; a host may implement this
/// for additional types to extend the registry (the conversion table is "a small,
/// ordinary registry", not a hardcoded switch — see §9).
pub trait FromScriptValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ErrorKind>;
}

/// Type-directed conversion from a host type into a script [`Value`].
pub trait IntoScriptValue {
    fn into_value(self) -> Value;
}

impl FromScriptValue for i32 {
    fn from_value(value: &Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as Self),
            other => Err(ErrorKind::TypeMismatch {
                expected: "Int",
                found: other.kind(),
            }),
        }
    }
}

impl IntoScriptValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl FromScriptValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as Self),
            other => Err(ErrorKind::TypeMismatch {
                expected: "Float",
                found: other.kind(),
            }),
        }
    }
}

impl IntoScriptValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromScriptValue for String {
    fn from_value(value: &Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Str(s) => Ok(s.as_str().to_owned()),
            other => Err(ErrorKind::TypeMismatch {
                expected: "Str",
                found: other.kind(),
            }),
        }
    }
}

impl IntoScriptValue for String {
    fn into_value(self) -> Value {
        Value::Str(Rc::new(self))
    }
}

/// A live reference into host memory, wrapped as `Value::Extern` (§3.2).
pub trait ExternCell {
    fn read(&self) -> Value;
    fn write(&self, value: Value) -> Result<(), ErrorKind>;
    fn type_name(&self) -> &'static str;
}

struct HostCell<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> ExternCell for HostCell<T>
where
    T: Clone + FromScriptValue + IntoScriptValue + 'static,
{
    fn read(&self) -> Value {
        self.cell.borrow().clone().into_value()
    }

    fn write(&self, value: Value) -> Result<(), ErrorKind> {
        let converted = T::from_value(&value).map_err(|_| ErrorKind::IncompatibleTypes {
            host_type: any::type_name::<T>(),
            found: value.kind(),
        })?;
        *self.cell.borrow_mut() = converted;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// Wraps a host-owned `Rc<RefCell<T>>` as a `Value::Extern`, for use by
/// [`crate::script::Script::link`].
pub fn extern_value<T>(cell: Rc<RefCell<T>>) -> Value
where
    T: Clone + FromScriptValue + IntoScriptValue + 'static,
{
    Value::Extern(Rc::new(HostCell { cell }))
}

/// A typed host function converted into the uniform `(&[Value]) -> Result<Value,
/// ErrorKind>` shape every `NativeFunc` must have (§4.2.2).
///
/// `Args` is a marker type parameter (the tuple of argument types) that lets a
/// single method name, `Script::link_function`, accept closures of any arity
/// without an explicit count — the classic "variadic generics over tuples" trick.
pub trait IntoNativeFn<Args> {
    fn into_native(self) -> crate::value::NativeFn;
}

fn arity_check(expected: usize, args: &[Value]) -> Result<(), ErrorKind> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ErrorKind::ArityMismatch {
            expected,
            found: args.len(),
        })
    }
}

impl<Func, R> IntoNativeFn<()> for Func
where
    Func: Fn() -> R + 'static,
    R: IntoScriptValue,
{
    fn into_native(self) -> crate::value::NativeFn {
        Rc::new(move |args: &[Value]| {
            arity_check(0, args)?;
            Ok(self().into_value())
        })
    }
}

macro_rules! impl_into_native_fn {
    ($($arg:ident),+) => {
        impl<Func, $($arg),+, R> IntoNativeFn<($($arg,)+)> for Func
        where
            Func: Fn($($arg),+) -> R + 'static,
            $($arg: FromScriptValue,)+
            R: IntoScriptValue,
        {
            #[allow(non_snake_case)]
            fn into_native(self) -> crate::value::NativeFn {
                Rc::new(move |args: &[Value]| {
                    const N: usize = impl_into_native_fn!(@count $($arg),+);
                    arity_check(N, args)?;
                    let mut iter = args.iter();
                    $(let $arg = <$arg as FromScriptValue>::from_value(iter.next().unwrap())?;)+
                    Ok(self($($arg),+).into_value())
                })
            }
        }
    };
    (@count $($arg:ident),+) => {
        <[()]>::len(&[$(impl_into_native_fn!(@unit $arg)),+])
    };
    (@unit $arg:ident) => { () };
}

impl_into_native_fn!(A1);
impl_into_native_fn!(A1, A2);
impl_into_native_fn!(A1, A2, A3);
impl_into_native_fn!(A1, A2, A3, A4);

impl fmt::Debug for dyn ExternCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternCell<{}>", self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn scalar_round_trip() {
        let v = 42_i32.into_value();
        assert_eq!(i32::from_value(&v).unwrap(), 42);

        let v = 3.5_f32.into_value();
        assert_eq!(f32::from_value(&v).unwrap(), 3.5);

        let v = "hi".to_owned().into_value();
        assert_eq!(String::from_value(&v).unwrap(), "hi");
    }

    #[test]
    fn extern_cell_reads_current_host_value() {
        let host = Rc::new(RefCell::new(10_i32));
        let extern_value = extern_value(host.clone());
        let Value::Extern(cell) = extern_value else {
            unreachable!()
        };
        assert!(matches!(cell.read(), Value::Int(10)));
        *host.borrow_mut() = 99;
        assert!(matches!(cell.read(), Value::Int(99)));
    }

    #[test]
    fn extern_cell_write_through() {
        let host = Rc::new(RefCell::new(0_i32));
        let extern_value = extern_value(host.clone());
        let Value::Extern(cell) = extern_value else {
            unreachable!()
        };
        cell.write(Value::Int(5)).unwrap();
        assert_eq!(*host.borrow(), 5);
    }

    #[test]
    fn extern_cell_rejects_incompatible_write() {
        let host = Rc::new(RefCell::new(0_i32));
        let extern_value = extern_value(host);
        let Value::Extern(cell) = extern_value else {
            unreachable!()
        };
        let err = cell.write(Value::Str(Rc::new("nope".to_owned()))).unwrap_err();
        assert!(matches!(err, ErrorKind::IncompatibleTypes { .. }));
    }

    #[test]
    fn native_fn_checks_arity() {
        let f: crate::value::NativeFn = (|a: i32, b: i32| a - b).into_native();
        let err = f(&[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ErrorKind::ArityMismatch { expected: 2, found: 1 }));
        let ok = f(&[Value::Int(10), Value::Int(4)]).unwrap();
        assert!(matches!(ok, Value::Int(6)));
    }
}
