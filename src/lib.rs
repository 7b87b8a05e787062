//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be
//! evolved independently:
//! - `source` is the cursor the combinators advance over the input.
//! - `combinator` is the PEG parser algebra the grammar is built from.
//! - `parser` owns all syntactic knowledge and produces the block AST.
//! - `ast` is the pure data model shared by parser and emitter.
//! - `codegen` lowers the AST into 32-bit ARM assembly text.
//! - `error` centralises the failures shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod combinator;
pub mod error;
pub mod parser;
pub mod source;

pub use error::{CompileError, CompileResult};

/// Compile a source string into an ARM assembly listing.
pub fn compile(source: &str) -> CompileResult<String> {
  let program = parser::parse(source)?;
  codegen::generate(&program)
}
