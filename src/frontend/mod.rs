//! Frontend: Lexer, Parser, and AST for the kernel description language.
//!
//! ## Language Overview
//!
//! A kernel is described by up to three sections:
//!
//! ```text
//! TENSORS: A: f32[1024, 1024], B: f32[1024, 1024], C: f32[1024, 1024]
//! LOOPS: i=0:N:1, j=0:M:1
//! BODY: C[i, j] = A[i, j] + B[i, j]
//! ```
//!
//! `TENSORS` is optional; undeclared names are looked up in a
//! [`TensorTable`] during lowering.

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod tensors;

// Re-exports
pub use lexer::Lexer;
pub use parser::Parser;
pub use ast::*;
pub use tensors::TensorTable;
pub use token::{Token, TokenKind};
pub use crate::utils::errors::ParseError;

use anyhow::Result;
use log::info;

/// Parse source code into a kernel AST.
pub fn parse(source: &str) -> Result<KernelDecl> {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer)?;
    let kernel = parser.parse_kernel()?;
    info!("parsed kernel with {} loop(s)", kernel.loops.len());
    Ok(kernel)
}
