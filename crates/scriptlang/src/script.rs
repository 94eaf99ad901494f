//! The embedding façade (§6.1): load a script, link host state into it, run it.

use std::{fs, path::Path, rc::Rc};

use crate::{
    diagnostic::InterpreterError,
    error::{ErrorKind, ScriptError},
    eval::Evaluator,
    host::{extern_value, FromScriptValue, IntoNativeFn, IntoScriptValue},
    parser,
    resource::Limits,
    value::Value,
};

/// An interpreter bound to one parsed script and one global scope.
///
/// Mirrors the teacher's `Runner`/`ReplSession` split between "build once" and
/// "drive repeatedly": here the whole lifecycle is `new` (load + parse), any
/// number of `link`/`link_function` calls, then a single `run`.
pub struct Script {
    filename: String,
    source: String,
    root: crate::ast::Stat,
    globals: Value,
    limits: Limits,
}

impl Script {
    /// Loads and parses the file at `path`, installing the `assert` intrinsic
    /// into a fresh global scope. Does not execute anything.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, InterpreterError> {
        let path = path.as_ref();
        let filename = path.display().to_string();
        let source = fs::read_to_string(path).map_err(|e| {
            InterpreterError::new(
                filename.clone(),
                String::new(),
                ScriptError::new(ErrorKind::Io {
                    message: e.to_string(),
                }),
            )
        })?;
        Self::from_source(filename, source)
    }

    /// Parses `source` directly, as if it had been loaded from a file named
    /// `filename`. Exposed for hosts that already have the script text in memory
    /// (and for this crate's own tests).
    pub fn from_source(filename: impl Into<String>, source: impl Into<String>) -> Result<Self, InterpreterError> {
        let filename = filename.into();
        let source = source.into();
        let root = parser::parse_source(&source).map_err(|kind| {
            InterpreterError::new(filename.clone(), source.clone(), ScriptError::new(kind))
        })?;

        let globals = Value::new_map();
        install_assert(&globals);

        Ok(Self {
            filename,
            source,
            root,
            globals,
            limits: Limits::default(),
        })
    }

    /// Installs an `Extern<T>` at `name` in the global scope, sharing `cell` with
    /// the host (§4.2's live-reference contract).
    pub fn link<T>(&self, name: &str, cell: Rc<std::cell::RefCell<T>>)
    where
        T: Clone + FromScriptValue + IntoScriptValue + 'static,
    {
        self.globals
            .get_ref(name)
            .expect("globals is always a Map")
            .set(extern_value(cell));
    }

    /// Installs a typed native function at `name` (§4.2.2); `f` may take zero to
    /// four arguments convertible via [`crate::host::FromScriptValue`].
    pub fn link_function<F, Args>(&self, name: &str, f: F)
    where
        F: IntoNativeFn<Args>,
    {
        self.globals
            .get_ref(name)
            .expect("globals is always a Map")
            .set(Value::NativeFunc(f.into_native()));
    }

    /// Overrides the default resource limits (§10.2) for subsequent `run` calls.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Executes the script's top-level block against the global scope.
    pub fn run(&self) -> Result<(), InterpreterError> {
        let mut evaluator = Evaluator::new(self.globals.clone(), self.limits);
        evaluator
            .run_block(&self.globals, &self.root)
            .map(|_| ())
            .map_err(|err| InterpreterError::new(self.filename.clone(), self.source.clone(), err))
    }

    /// Always `false` in this version; the field exists for a future
    /// staged-execution interface (§6.1).
    #[must_use]
    pub const fn is_over(&self) -> bool {
        false
    }
}

fn install_assert(globals: &Value) {
    let native: crate::value::NativeFn = Rc::new(|args: &[Value]| {
        if args.len() != 1 {
            return Err(ErrorKind::ArityMismatch {
                expected: 1,
                found: args.len(),
            });
        }
        if args[0].clone().deref_extern().is_true()? {
            Ok(Value::None)
        } else {
            Err(ErrorKind::AssertionFailed)
        }
    });
    globals
        .get_ref("assert")
        .expect("globals is always a Map")
        .set(Value::NativeFunc(native));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn runs_simple_script() {
        let script = Script::from_source("t.script", "a = 1 + 2;\nassert(a == 3);").unwrap();
        script.run().unwrap();
    }

    #[test]
    fn surfaces_diagnostic_on_assertion_failure() {
        let script = Script::from_source("t.script", "assert(1 == 2);").unwrap();
        let err = script.run().unwrap_err();
        assert!(err.to_string().contains("Assertion failed"));
    }

    #[test]
    fn links_host_state_both_ways() {
        let x = Rc::new(RefCell::new(10_i32));
        let script = Script::from_source("t.script", "x = x + 1;").unwrap();
        script.link("x", x.clone());
        script.run().unwrap();
        assert_eq!(*x.borrow(), 11);
    }

    #[test]
    fn links_native_function() {
        let script = Script::from_source("t.script", "y = sub(10, 4);\nassert(y == 6);").unwrap();
        script.link_function("sub", |a: i32, b: i32| a - b);
        script.run().unwrap();
    }
}
