//! Polymorphic runtime values and the capability contract of §4.1.
//!
//! `Map` and `List` are heap-allocated cells shared by reference-counted handles
//! with interior mutability (`Rc<RefCell<_>>`); `Range`, `Function`, and
//! `NativeFunc` are immutable once built. `Extern` wraps a type-erased read/write
//! pair into host memory (see [`crate::host`]).

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::Stat,
    error::ErrorKind,
    host::ExternCell,
};

pub type MapCell = Rc<RefCell<IndexMap<String, Value>>>;
pub type ListCell = Rc<RefCell<Vec<Value>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeVal {
    pub begin: i32,
    pub end: i32,
    pub step: i32,
}

impl RangeVal {
    /// `length = ⌊(end-begin)/step⌋ + 1`, clamped to zero when negative (§8).
    #[must_use]
    pub fn length(&self) -> i32 {
        let len = (self.end - self.begin) / self.step + 1;
        len.max(0)
    }

    #[must_use]
    pub fn at(&self, i: i32) -> i32 {
        self.begin + self.step * i
    }
}

#[derive(Debug, Clone)]
pub struct FunctionVal {
    pub params: Vec<String>,
    pub body: Stat,
}

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, ErrorKind>>;

/// A runtime value. Cloning a `Value` clones the handle, not the data it points to
/// (§3.2's "shared by reference" ownership discipline).
#[derive(Clone)]
pub enum Value {
    None,
    Int(i32),
    Float(f32),
    Str(Rc<String>),
    Map(MapCell),
    List(ListCell),
    Range(Rc<RangeVal>),
    Function(Rc<FunctionVal>),
    NativeFunc(NativeFn),
    Extern(Rc<dyn ExternCell>),
}

/// An assignable location inside a `Map` or `List` (§4.1's `atRef`/`getRef`).
#[derive(Clone)]
pub enum Slot {
    MapEntry { map: MapCell, key: String },
    ListEntry { list: ListCell, index: usize },
}

impl Slot {
    #[must_use]
    pub fn get(&self) -> Value {
        match self {
            Self::MapEntry { map, key } => map.borrow().get(key).cloned().unwrap_or(Value::None),
            Self::ListEntry { list, index } => list.borrow()[*index].clone(),
        }
    }

    /// Overwrites the slot with `v`, sharing (no copy). Does not special-case
    /// `Extern` — callers that need the §4.3 interception do that check themselves
    /// before calling `set`.
    pub fn set(&self, v: Value) {
        match self {
            Self::MapEntry { map, key } => {
                map.borrow_mut().insert(key.clone(), v);
            }
            Self::ListEntry { list, index } => {
                list.borrow_mut()[*index] = v;
            }
        }
    }
}

pub const KIND_NONE: &str = "None";
pub const KIND_INT: &str = "Int";
pub const KIND_FLOAT: &str = "Float";
pub const KIND_STR: &str = "Str";
pub const KIND_MAP: &str = "Map";
pub const KIND_LIST: &str = "List";
pub const KIND_RANGE: &str = "Range";
pub const KIND_FUNCTION: &str = "Function";
pub const KIND_NATIVE_FUNC: &str = "NativeFunc";
pub const KIND_EXTERN: &str = "Extern";

impl Value {
    #[must_use]
    pub fn new_map() -> Self {
        Self::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    #[must_use]
    pub fn new_list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => KIND_NONE,
            Self::Int(_) => KIND_INT,
            Self::Float(_) => KIND_FLOAT,
            Self::Str(_) => KIND_STR,
            Self::Map(_) => KIND_MAP,
            Self::List(_) => KIND_LIST,
            Self::Range(_) => KIND_RANGE,
            Self::Function(_) => KIND_FUNCTION,
            Self::NativeFunc(_) => KIND_NATIVE_FUNC,
            Self::Extern(_) => KIND_EXTERN,
        }
    }

    /// Substitutes a freshly materialised scalar for `Extern` values; every other
    /// kind is returned unchanged. Evaluation of any expression ends with this
    /// step (§4.3 "External-reference read").
    #[must_use]
    pub fn deref_extern(self) -> Self {
        match self {
            Self::Extern(cell) => cell.read(),
            other => other,
        }
    }

    fn unsupported(&self, op: &str) -> ErrorKind {
        ErrorKind::UnsupportedOp {
            op: op.to_owned(),
            kind: self.kind(),
        }
    }

    pub fn unop(&self, op: crate::ast::UnOp) -> Result<Self, ErrorKind> {
        use crate::ast::UnOp;
        match (op, self) {
            (UnOp::Neg, Self::Int(i)) => Ok(Self::Int(-i)),
            (UnOp::Neg, Self::Float(f)) => Ok(Self::Float(-f)),
            (UnOp::Not, Self::Int(i)) => Ok(Self::Int(i32::from(*i == 0))),
            (UnOp::Not, Self::Float(f)) => Ok(Self::Int(i32::from(*f == 0.0))),
            (UnOp::Neg, other) => Err(other.unsupported("-")),
            (UnOp::Not, other) => Err(other.unsupported("not")),
        }
    }

    #[allow(clippy::float_cmp, reason = "exact float equality is the documented semantics, not a bug")]
    pub fn binop(&self, op: crate::ast::BinOp, rhs: &Self) -> Result<Self, ErrorKind> {
        use crate::ast::BinOp;

        if let (Self::Str(a), Self::Str(b)) = (self, rhs) {
            return match op {
                BinOp::Add => Ok(Self::Str(Rc::new(format!("{a}{b}")))),
                _ => Err(self.unsupported(binop_symbol(op))),
            };
        }

        let (Some(lf), Some(rf)) = (as_number(self), as_number(rhs)) else {
            return Err(self.unsupported(binop_symbol(op)));
        };
        let both_int = matches!((self, rhs), (Self::Int(_), Self::Int(_)));

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if both_int {
                    let (a, b) = (lf as i32, rf as i32);
                    if matches!(op, BinOp::Div) && b == 0 {
                        return Err(ErrorKind::DivisionByZero);
                    }
                    Ok(Self::Int(match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Div => a / b,
                        _ => unreachable!(),
                    }))
                } else {
                    Ok(Self::Float(match op {
                        BinOp::Add => lf + rf,
                        BinOp::Sub => lf - rf,
                        BinOp::Mul => lf * rf,
                        BinOp::Div => lf / rf,
                        _ => unreachable!(),
                    }))
                }
            }
            BinOp::Mod => {
                let (a, b) = (lf as i32, rf as i32);
                if b == 0 {
                    return Err(ErrorKind::DivisionByZero);
                }
                Ok(Self::Int(a % b))
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if both_int {
                    let (Self::Int(a), Self::Int(b)) = (self, rhs) else {
                        unreachable!()
                    };
                    Ok(Self::Int(i32::from(match op {
                        BinOp::Eq => a == b,
                        BinOp::Ne => a != b,
                        BinOp::Lt => a < b,
                        BinOp::Le => a <= b,
                        BinOp::Gt => a > b,
                        BinOp::Ge => a >= b,
                        _ => unreachable!(),
                    })))
                } else {
                    Ok(Self::Int(i32::from(match op {
                        BinOp::Eq => lf == rf,
                        BinOp::Ne => lf != rf,
                        BinOp::Lt => lf < rf,
                        BinOp::Le => lf <= rf,
                        BinOp::Gt => lf > rf,
                        BinOp::Ge => lf >= rf,
                        _ => unreachable!(),
                    })))
                }
            }
            BinOp::And => Ok(Self::Int(i32::from(lf != 0.0 && rf != 0.0))),
            BinOp::Or => Ok(Self::Int(i32::from(lf != 0.0 || rf != 0.0))),
        }
    }

    pub fn is_true(&self) -> Result<bool, ErrorKind> {
        match self {
            Self::Int(i) => Ok(*i != 0),
            Self::Float(f) => Ok(*f != 0.0),
            other => Err(ErrorKind::NotACondition { kind: other.kind() }),
        }
    }

    pub fn length(&self) -> Result<i32, ErrorKind> {
        match self {
            Self::List(list) => Ok(list.borrow().len() as i32),
            Self::Range(r) => Ok(r.length()),
            other => Err(ErrorKind::NotIterable { kind: other.kind() }),
        }
    }

    pub fn at(&self, i: i32) -> Result<Self, ErrorKind> {
        match self {
            Self::List(list) => {
                let list = list.borrow();
                list.get(index_for(i, list.len())).cloned().ok_or(ErrorKind::TypeMismatch {
                    expected: "in-bounds index",
                    found: "out-of-bounds index",
                })
            }
            Self::Range(r) => {
                if i < 0 || i >= r.length() {
                    return Err(ErrorKind::TypeMismatch {
                        expected: "in-bounds index",
                        found: "out-of-bounds index",
                    });
                }
                Ok(Self::Int(r.at(i)))
            }
            other => Err(ErrorKind::NotIterable { kind: other.kind() }),
        }
    }

    /// List member assignment target. Per the original `ValueList::atRef`, an
    /// index past the current end grows the list (filling the gap with
    /// `None`) rather than erroring; only a negative index is rejected.
    pub fn at_ref(&self, i: i32) -> Result<Slot, ErrorKind> {
        match self {
            Self::List(list) => {
                let Ok(idx) = usize::try_from(i) else {
                    return Err(ErrorKind::TypeMismatch {
                        expected: "non-negative index",
                        found: "negative index",
                    });
                };
                let mut entries = list.borrow_mut();
                if idx >= entries.len() {
                    entries.resize(idx + 1, Self::None);
                }
                drop(entries);
                Ok(Slot::ListEntry {
                    list: list.clone(),
                    index: idx,
                })
            }
            other => Err(other.unsupported("atRef")),
        }
    }

    /// Map member read. Per §3.2, a miss auto-vivifies the entry to `None`.
    pub fn get(&self, name: &str) -> Result<Self, ErrorKind> {
        match self {
            Self::Map(map) => {
                if let Some(v) = map.borrow().get(name) {
                    return Ok(v.clone());
                }
                map.borrow_mut().insert(name.to_owned(), Self::None);
                Ok(Self::None)
            }
            other => Err(other.unsupported("get")),
        }
    }

    pub fn get_ref(&self, name: &str) -> Result<Slot, ErrorKind> {
        match self {
            Self::Map(map) => {
                if !map.borrow().contains_key(name) {
                    map.borrow_mut().insert(name.to_owned(), Self::None);
                }
                Ok(Slot::MapEntry {
                    map: map.clone(),
                    key: name.to_owned(),
                })
            }
            other => Err(other.unsupported("getRef")),
        }
    }

    /// Built-in methods invoked via the `recv.method(args)` call form that are not
    /// routed through a `Map` (§4.3, "delegate to `vctx.call(name, args)`").
    pub fn call_method(&self, name: &str, args: &[Self]) -> Result<Self, ErrorKind> {
        match (self, name) {
            (Self::List(list), "length") => {
                if !args.is_empty() {
                    return Err(ErrorKind::ArityMismatch {
                        expected: 0,
                        found: args.len(),
                    });
                }
                Ok(Self::Int(list.borrow().len() as i32))
            }
            (other, _) => Err(ErrorKind::UnknownMethod {
                kind: other.kind(),
                method: name.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn print(&self) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => format!("\"{s}\""),
            Self::Map(map) => {
                let mut out = String::from("{");
                for (k, v) in map.borrow().iter() {
                    out.push_str(k);
                    out.push(':');
                    out.push_str(&v.print());
                    out.push(';');
                }
                out.push('}');
                out
            }
            Self::List(list) => {
                let mut out = String::from("[");
                for v in list.borrow().iter() {
                    out.push_str(&v.print());
                    out.push(',');
                }
                out.push(']');
                out
            }
            Self::Range(r) => {
                if r.step == 1 {
                    format!("[{}..{}]", r.begin, r.end)
                } else {
                    format!("[{}..{}..{}]", r.begin, r.end, r.step)
                }
            }
            Self::Function(f) => format!("function({})", f.params.len()),
            Self::NativeFunc(_) => "nativefunction".to_owned(),
            Self::Extern(cell) => format!("externvalue<{}>", cell.type_name()),
        }
    }
}

/// Converts a possibly-negative index to a `usize`, clamping negatives (and
/// anything else out of range) to `len` so the caller's bounds check rejects it
/// uniformly instead of wrapping.
fn index_for(i: i32, len: usize) -> usize {
    usize::try_from(i).unwrap_or(usize::MAX).min(len)
}

fn as_number(v: &Value) -> Option<f32> {
    match v {
        Value::Int(i) => Some(*i as f32),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

const fn binop_symbol(op: crate::ast::BinOp) -> &'static str {
    use crate::ast::BinOp;
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value::{}({})", self.kind(), self.print())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, UnOp};

    #[test]
    fn range_length_and_at() {
        let r = RangeVal {
            begin: 1,
            end: 5,
            step: 1,
        };
        assert_eq!(r.length(), 5);
        assert_eq!(r.at(0), 1);
        assert_eq!(r.at(4), 5);
    }

    #[test]
    fn range_negative_length_clamps_to_zero() {
        let r = RangeVal {
            begin: 0,
            end: -1,
            step: 1,
        };
        assert_eq!(r.length(), 0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn int_float_promotion_yields_float() {
        let a = Value::Int(3);
        let b = Value::Float(4.0);
        let r = a.binop(BinOp::Add, &b).unwrap();
        assert!(matches!(r, Value::Float(f) if f == 7.0));
    }

    #[test]
    fn int_comparison_keeps_full_precision() {
        let a = Value::Int(16_777_217);
        let b = Value::Int(16_777_216);
        assert!(matches!(a.binop(BinOp::Gt, &b).unwrap(), Value::Int(1)));

        let a = Value::Int(1_000_000_000);
        let b = Value::Int(999_999_999);
        assert!(matches!(a.binop(BinOp::Eq, &b).unwrap(), Value::Int(0)));
    }

    #[test]
    fn str_equality_is_unsupported() {
        let a = Value::Str(Rc::new("a".to_owned()));
        let b = Value::Str(Rc::new("b".to_owned()));
        let err = a.binop(BinOp::Eq, &b).unwrap_err();
        assert!(matches!(err, ErrorKind::UnsupportedOp { .. }));
    }

    #[test]
    fn str_concatenation_still_works() {
        let a = Value::Str(Rc::new("a".to_owned()));
        let b = Value::Str(Rc::new("b".to_owned()));
        let r = a.binop(BinOp::Add, &b).unwrap();
        assert!(matches!(r, Value::Str(s) if *s == "ab"));
    }

    #[test]
    fn at_ref_grows_list_past_the_end() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        let slot = list.at_ref(5).unwrap();
        slot.set(Value::Int(9));
        let Value::List(entries) = &list else { unreachable!() };
        let entries = entries.borrow();
        assert_eq!(entries.len(), 6);
        assert!(matches!(entries[5], Value::Int(9)));
        assert!(matches!(entries[2], Value::None));
    }

    #[test]
    fn at_ref_rejects_negative_index() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Int(1)])));
        let Err(err) = list.at_ref(-1) else {
            panic!("expected an error");
        };
        assert!(matches!(err, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn not_not_roundtrips_truthiness() {
        let truthy = Value::Int(5);
        let once = truthy.unop(UnOp::Not).unwrap();
        let twice = once.unop(UnOp::Not).unwrap();
        assert!(matches!(twice, Value::Int(1)));

        let falsy = Value::Int(0);
        let once = falsy.unop(UnOp::Not).unwrap();
        let twice = once.unop(UnOp::Not).unwrap();
        assert!(matches!(twice, Value::Int(0)));
    }

    #[test]
    fn map_print_preserves_insertion_order() {
        let m = Value::new_map();
        m.get_ref("a").unwrap().set(Value::Int(1));
        m.get_ref("b").unwrap().set(Value::Int(2));
        assert_eq!(m.print(), "{a:1;b:2;}");
    }

    #[test]
    fn map_get_auto_vivifies_missing_key() {
        let m = Value::new_map();
        let v = m.get("missing").unwrap();
        assert!(matches!(v, Value::None));
        assert_eq!(m.print(), "{missing:None;}");
    }

    #[test]
    fn sharing_through_aliases() {
        let a = Value::new_map();
        let b = a.clone();
        a.get_ref("x").unwrap().set(Value::Int(7));
        let Value::Map(bm) = b else { unreachable!() };
        assert!(matches!(bm.borrow().get("x"), Some(Value::Int(7))));
    }
}
