use std::error::Error as StdError;
use std::fmt;
use std::result;

use thiserror::Error;

pub type GenericResult<T> = result::Result<T, Box<dyn StdError>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("[line {line}] Error: Unterminated string.")]
    UnterminatedString { line: u32 },
    #[error("[line {line}] Error: Unexpected character '{character}'.")]
    UnexpectedCharacter { character: char, line: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error {location}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub location: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("[line {line}] Undefined variable '{name}'.")]
    UndefinedVariable { name: String, line: u32 },
    #[error("[line {line}] Expected {expected} arguments but got {found}.")]
    ArityMismatch { expected: usize, found: usize, line: u32 },
    #[error("[line {line}] {message}")]
    InvalidOperand { message: String, line: u32 },
    #[error("[line {line}] Division by zero.")]
    DivisionByZero { line: u32 },
    #[error("[line {line}] Can only call functions.")]
    NotCallable { line: u32 },
    #[error("[line {line}] Stack overflow.")]
    StackOverflow { line: u32 },
    #[error("[line {line}] Error in native function '{name}': {message}")]
    Native { name: String, message: String, line: u32 },
    #[error("Failed to write program output: {message}")]
    Output { message: String },
}

impl RuntimeError {
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::UndefinedVariable { line, .. }
            | Self::ArityMismatch { line, .. }
            | Self::InvalidOperand { line, .. }
            | Self::DivisionByZero { line }
            | Self::NotCallable { line }
            | Self::StackOverflow { line }
            | Self::Native { line, .. } => Some(*line),
            Self::Output { .. } => None,
        }
    }
}

/// Lookup failure raised by the environment chain. The interpreter attaches
/// the source line when turning it into a [`RuntimeError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Undefined variable '{0}'.")]
pub struct UndefinedVariable(pub String);

impl UndefinedVariable {
    pub fn at_line(self, line: u32) -> RuntimeError {
        RuntimeError::UndefinedVariable { name: self.0, line }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{}", display_all(.0))]
    Scan(Vec<ScanError>),
    #[error("{}", display_all(.0))]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<Vec<ScanError>> for Error {
    fn from(errors: Vec<ScanError>) -> Self {
        Error::Scan(errors)
    }
}

impl From<Vec<ParseError>> for Error {
    fn from(errors: Vec<ParseError>) -> Self {
        Error::Parse(errors)
    }
}

// one diagnostic per line
fn display_all<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
