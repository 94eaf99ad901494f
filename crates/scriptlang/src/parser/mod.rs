//! Minimal lexer/parser (§10.4) that makes the crate independently runnable.
//! Only the AST shape in [`crate::ast`] is part of the specified surface; this
//! concrete grammar exists so `Script::new` has a source language to parse.

mod grammar;
mod lexer;

use crate::{ast::Stat, error::ErrorKind};

pub fn parse_source(source: &str) -> Result<Stat, ErrorKind> {
    let tokens = lexer::tokenize(source)?;
    grammar::parse(tokens)
}
