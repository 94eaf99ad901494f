//! An embeddable tree-walking interpreter for a small dynamically-typed
//! scripting language: a host links native state and functions into a global
//! scope, then runs a parsed script against it.
#![expect(clippy::cast_possible_truncation, reason = "Int/List-length narrowing is bounded by i32/usize in practice")]
#![expect(clippy::cast_possible_wrap, reason = "list lengths never approach i32::MAX")]
#![expect(clippy::cast_precision_loss, reason = "Int->Float promotion is the documented arithmetic model, not incidental")]
#![expect(clippy::needless_pass_by_value, reason = "getRef/link take owned Strings and typed closures by value to match the host-facing API shape")]
#![expect(clippy::missing_panics_doc, reason = "the only panics are on a fresh Map's getRef, which cannot fail")]

mod ast;
mod diagnostic;
mod error;
mod eval;
mod host;
mod parser;
mod resource;
mod script;
mod value;

pub use crate::{
    diagnostic::InterpreterError,
    error::{ErrorKind, ScriptError},
    host::{extern_value, FromScriptValue, IntoNativeFn, IntoScriptValue},
    resource::Limits,
    script::Script,
    value::Value,
};
