//! Shared error types used across the compilation pipeline.
//!
//! There are two failure taxonomies: parse errors, raised when the
//! top-level parser cannot consume the whole input, and compile-time
//! errors, raised while lowering the AST. Both unwind to the driver;
//! nothing is recovered.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Fatal failures surfaced by the parser and the code generator.
#[derive(Debug, Snafu)]
pub enum CompileError {
  /// The parser missed at top level, or stopped before end of input.
  #[snafu(display("Parse error at index {index}"))]
  Syntax { index: usize },

  /// Raised by an `error` parser, including forward references that are
  /// applied before their definition is installed.
  #[snafu(display("{message}"))]
  Grammar { message: String },

  /// A variable reference or assignment target with no frame slot.
  #[snafu(display("Undefined variable: {name}"))]
  UndefinedVariable { name: String },

  #[snafu(display("More than 4 arguments are not supported"))]
  TooManyArguments,

  #[snafu(display("More than 4 params is not supported"))]
  TooManyParameters,
}
