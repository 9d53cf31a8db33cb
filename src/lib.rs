//! A tree-walking interpreter for a small dynamically typed scripting
//! language: scanning, recursive-descent parsing and evaluation against a
//! chain of lexical scopes.

mod stack;
mod stdlib;

pub mod environment;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod stmt;
pub mod value;

pub use environment::{EnvRef, Environment};
pub use error::{Error, ParseError, RuntimeError, ScanError};
pub use interpreter::{Flow, Interpreter};
pub use scanner::{Token, TokenType};
pub use stmt::Stmt;
pub use value::Value;

pub type ExecutionResult = Result<(), Error>;

pub fn scan(source: &str) -> Result<Vec<Token>, Vec<ScanError>> {
    scanner::scan_tokens(source)
}

pub fn parse(tokens: &[Token]) -> Result<Vec<Stmt>, Vec<ParseError>> {
    parser::parse(tokens)
}

/// Scan, parse and run `code` in the interpreter's global scope.
///
/// Nothing runs unless the whole source scans and parses cleanly. Execution
/// stops at the first runtime error, keeping whatever the earlier statements
/// defined.
pub fn execute(code: &str, interpreter: &mut Interpreter) -> ExecutionResult {
    let tokens = scan(code)?;
    let statements = parse(&tokens)?;
    interpreter.interpret_all(&statements)?;
    Ok(())
}
