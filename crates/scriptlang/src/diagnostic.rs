//! Turns a bare [`ScriptError`] into the compiler-style diagnostic described by
//! §6.3: a one-line summary, the quoted source line, and a caret/tilde span.

use std::fmt;

use crate::error::ScriptError;

/// A [`ScriptError`] decorated with the filename and source text active when it
/// was raised. This is what [`crate::script::Script::run`] returns on failure.
#[derive(Debug, Clone)]
pub struct InterpreterError {
    filename: String,
    source: String,
    error: ScriptError,
}

impl InterpreterError {
    #[must_use]
    pub fn new(filename: impl Into<String>, source: impl Into<String>, error: ScriptError) -> Self {
        Self {
            filename: filename.into(),
            source: source.into(),
            error,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &crate::error::ErrorKind {
        &self.error.kind
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.error.info.filter(crate::ast::SourceInfo::is_known);

        let Some(info) = info else {
            return write!(f, "{}:error: {}", self.filename, self.error.kind);
        };

        writeln!(
            f,
            "{}:{}:{}:error: {}",
            self.filename, info.line, info.column, self.error.kind
        )?;

        let Some(line_text) = self.source.lines().nth(info.line as usize - 1) else {
            return Ok(());
        };
        writeln!(f, "{line_text}")?;

        let col = info.column as usize;
        let span = (info.end_index - info.start_index) as usize;
        let remaining = line_text.len().saturating_sub(col);
        write!(
            f,
            "{}^{}",
            " ".repeat(col.saturating_sub(1)),
            "~".repeat(span.min(remaining))
        )
    }
}

impl std::error::Error for InterpreterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::SourceInfo, error::ErrorKind};

    #[test]
    fn formats_with_caret_and_tildes() {
        let err = ScriptError::at(
            ErrorKind::DivisionByZero,
            SourceInfo::new(3, 12, 11, 16),
        );
        let diag = InterpreterError::new("demo.script", "x = 0\ny = 1\nassert(1/0 == 0)\n", err);
        let rendered = diag.to_string();
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap(), "demo.script:3:12:error: division by zero");
        assert_eq!(lines.next().unwrap(), "assert(1/0 == 0)");
        assert_eq!(lines.next().unwrap(), "           ^~~~~");
    }

    #[test]
    fn formats_without_span_when_unknown() {
        let err = ScriptError::new(ErrorKind::InternalError {
            message: "boom".to_owned(),
        });
        let diag = InterpreterError::new("demo.script", "", err);
        assert_eq!(diag.to_string(), "demo.script:error: internal error: boom");
    }
}
