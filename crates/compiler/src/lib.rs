//! GoxLang Compiler Library
//!
//! Lexes, parses, checks and lowers GoxLang source into the IR consumed
//! by `goxlang_vm`. The four stages are independent modules connected by
//! [`compile_source`]; each one is usable standalone for tooling that
//! only needs part of the pipeline (an editor wanting tokens, a linter
//! wanting the checked AST, and so on).
//!
//! # Example
//!
//! ```
//! let module = goxc::compile_source("var x int = 2 + 3; print x;").unwrap();
//! assert!(module.functions.contains_key("main"));
//! ```

pub mod ast;
pub mod checker;
pub mod codegen;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod symtab;
pub mod token;
pub mod types;

pub use ast::Program;
pub use checker::{CheckerError, check_program};
pub use codegen::CodeGenError;
pub use config::{CompilerConfig, ConfigError};
pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser};
pub use token::{Token, TokenKind};
pub use types::Type;

use goxlang_core::ir::IrModule;
use std::fmt;
use std::fs;
use std::path::Path;

/// Any error from any pipeline stage, carrying enough to print the
/// `"Line N: <category>: <message>"` diagnostic the CLI promises.
#[derive(Debug, Clone, PartialEq)]
pub enum GoxError {
    Io(String),
    Lex(LexError),
    Parse(ParseError),
    Check(CheckerError),
    CodeGen(CodeGenError),
}

impl fmt::Display for GoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoxError::Io(msg) => write!(f, "{msg}"),
            GoxError::Lex(e) => write!(f, "{e}"),
            GoxError::Parse(e) => write!(f, "{e}"),
            GoxError::Check(e) => write!(f, "{e}"),
            GoxError::CodeGen(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GoxError {}

impl From<LexError> for GoxError {
    fn from(e: LexError) -> Self {
        GoxError::Lex(e)
    }
}

impl From<ParseError> for GoxError {
    fn from(e: ParseError) -> Self {
        GoxError::Parse(e)
    }
}

impl From<CheckerError> for GoxError {
    fn from(e: CheckerError) -> Self {
        GoxError::Check(e)
    }
}

impl From<CodeGenError> for GoxError {
    fn from(e: CodeGenError) -> Self {
        GoxError::CodeGen(e)
    }
}

/// Runs the full pipeline over a source string: lex, parse, check,
/// generate. Returns the lowered IR module ready for `goxlang_vm::Vm`.
pub fn compile_source(source: &str) -> Result<IrModule, GoxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    check_program(&program)?;
    let module = codegen::generate(&program)?;
    Ok(module)
}

/// Same as [`compile_source`] but also hands back the parsed (and
/// checked) AST, for callers that want `--dump-ast`.
pub fn compile_source_with_ast(source: &str) -> Result<(Program, IrModule), GoxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    check_program(&program)?;
    let module = codegen::generate(&program)?;
    Ok((program, module))
}

/// Reads a source file and runs it through [`compile_source_with_ast`].
pub fn compile_file(path: &Path) -> Result<(Program, IrModule), GoxError> {
    let source = fs::read_to_string(path).map_err(|e| GoxError::Io(format!("{}: {e}", path.display())))?;
    compile_source_with_ast(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_runs_minimal_program() {
        let module = compile_source("var x int = 2 + 3 * 4 - 5; print x;").unwrap();
        assert!(module.functions.contains_key("main"));
        assert!(module.globals.contains_key("x"));
    }

    #[test]
    fn lex_error_surfaces_through_gox_error() {
        let err = compile_source("var @ x int = 1;").unwrap_err();
        assert!(matches!(err, GoxError::Lex(_)));
    }

    #[test]
    fn checker_error_surfaces_through_gox_error() {
        let err = compile_source("var x int = 1.5;").unwrap_err();
        assert!(matches!(err, GoxError::Check(_)));
    }
}
