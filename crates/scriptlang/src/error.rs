//! Error kinds raised by the value model, the evaluator, and the host-binding layer.
//!
//! Mirrors the teacher crate's practice of a hand-written `Display` on a plain
//! enum rather than pulling in a derive-macro error crate: this library has no
//! `thiserror`/`snafu` dependency, matching `ouros`'s own core crate.

use std::fmt;

use crate::ast::SourceInfo;

/// The reason an interpreter operation failed, independent of *where* it failed.
#[derive(Debug, Clone, strum::Display)]
pub enum ErrorKind {
    #[strum(to_string = "unsupported operation '{op}' on {kind}")]
    UnsupportedOp { op: String, kind: &'static str },

    #[strum(to_string = "type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[strum(to_string = "cannot write a {found} into a host variable of type {host_type}")]
    IncompatibleTypes {
        host_type: &'static str,
        found: &'static str,
    },

    #[strum(to_string = "expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[strum(to_string = "{kind} has no method '{method}'")]
    UnknownMethod { kind: &'static str, method: String },

    #[strum(to_string = "unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[strum(to_string = "not assignable")]
    NonAssignable,

    #[strum(to_string = "{kind} is not iterable")]
    NotIterable { kind: &'static str },

    #[strum(to_string = "{kind} has no truth value")]
    NotACondition { kind: &'static str },

    #[strum(to_string = "parameter named 'this' is reserved")]
    ReservedParam,

    #[strum(to_string = "Assertion failed")]
    AssertionFailed,

    #[strum(to_string = "{message}")]
    ParseError { message: String },

    #[strum(to_string = "internal error: {message}")]
    InternalError { message: String },

    #[strum(to_string = "{message}")]
    Io { message: String },

    #[strum(to_string = "maximum call depth ({limit}) exceeded")]
    RecursionLimitExceeded { limit: usize },

    #[strum(to_string = "division by zero")]
    DivisionByZero,
}

/// A raised interpreter failure, decorated with the span active when it was raised.
///
/// This is the type threaded through `exec`/`eval`/`evalRef` via `?`; it carries no
/// filename or source text of its own; [`crate::diagnostic::InterpreterError`] adds
/// that context at the `Script::run` boundary.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub info: Option<SourceInfo>,
}

impl ScriptError {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, info: None }
    }

    #[must_use]
    pub fn at(kind: ErrorKind, info: SourceInfo) -> Self {
        Self {
            kind,
            info: Some(info),
        }
    }

    /// Attaches `info` unless this error is already annotated.
    ///
    /// Per §7's propagation rule, the deepest node's span is the useful one: once an
    /// inner frame has stamped a span, outer frames must not overwrite it.
    #[must_use]
    pub fn with_info_if_unset(mut self, info: SourceInfo) -> Self {
        if self.info.is_none() {
            self.info = Some(info);
        }
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ScriptError {}
