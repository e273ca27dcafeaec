//! Error types for the loop tiler.
//!
//! Each phase has its own error struct carrying a message and a kind;
//! [`LoopTileError`] wraps them for callers that drive the whole pipeline.

use thiserror::Error;
use crate::utils::location::Span;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum LoopTileError {
    /// Error during lexing/tokenization
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error while resolving names in the kernel description
    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    /// Error while constructing IR nodes
    #[error("IR error: {0}")]
    Ir(#[from] IrError),

    /// Error during transformation
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// Error during code generation
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during lexical analysis.
#[derive(Error, Debug, Clone)]
#[error("{message} at {span}")]
pub struct LexerError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of lexer error
    pub kind: LexerErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// Unexpected character
    UnexpectedChar,
    /// Invalid number literal
    InvalidNumber,
}

/// Error during parsing.
#[derive(Error, Debug, Clone)]
#[error("{message} at {span}{}", expected_suffix(.expected, .found))]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of parse error
    pub kind: ParseErrorKind,
    /// Expected tokens (if applicable)
    pub expected: Vec<String>,
    /// What was found
    pub found: Option<String>,
}

fn expected_suffix(expected: &[String], found: &Option<String>) -> String {
    let mut s = String::new();
    if !expected.is_empty() {
        s.push_str(&format!(" (expected: {})", expected.join(", ")));
    }
    if let Some(found) = found {
        s.push_str(&format!(" (found: {})", found));
    }
    s
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unexpected token
    UnexpectedToken,
    /// A required section (`LOOPS:`, `BODY:`) is missing
    MissingSection,
    /// Expected an expression
    ExpectedExpression,
    /// Invalid assignment target
    InvalidTarget,
    /// Invalid literal value
    InvalidLiteral,
}

/// Error while resolving tensor names and declarations.
#[derive(Error, Debug, Clone)]
#[error("{message} at {span}")]
pub struct SemanticError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of semantic error
    pub kind: SemanticErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// Tensor name not declared and not in the tensor table
    UndefinedTensor,
    /// Tensor declared twice
    DuplicateTensor,
    /// Unknown element type name
    UnknownType,
    /// Declared shape rejected by the tensor model
    InvalidDeclaration,
    /// The kernel has no loops
    EmptyNest,
}

/// Validation failure raised by an IR node constructor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct IrError {
    /// The error message
    pub message: String,
    /// The kind of IR error
    pub kind: IrErrorKind,
}

impl IrError {
    pub(crate) fn new(kind: IrErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrErrorKind {
    /// Load/Store index count differs from the tensor's dimensionality
    DimensionMismatch,
    /// Assign target is neither a Store nor a scalar reference
    InvalidAssignTarget,
    /// Tensor descriptor is malformed
    InvalidTensor,
}

/// Error during transformation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} in {transform}")]
pub struct TransformError {
    /// The error message
    pub message: String,
    /// The kind of transformation error
    pub kind: TransformErrorKind,
    /// The transformation that failed
    pub transform: String,
}

impl TransformError {
    pub(crate) fn new(
        transform: &str,
        kind: TransformErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            transform: transform.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Input is not the loop nest shape the pass requires
    NotPerfectNest(NestViolation),
    /// Pass configuration is unusable for this input
    InvalidConfig,
    /// Node model and traversal logic disagree; a defect, not bad input
    InternalInvariant,
}

impl TransformErrorKind {
    /// Whether this is a structural precondition failure of the input tree.
    pub fn is_precondition(&self) -> bool {
        matches!(self, TransformErrorKind::NotPerfectNest(_))
    }

    /// Whether this signals an internal defect.
    pub fn is_internal(&self) -> bool {
        matches!(self, TransformErrorKind::InternalInvariant)
    }
}

/// The specific way a tree fails to be a strict two-level perfect nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestViolation {
    /// Root is not a Loop
    RootNotLoop,
    /// Outer loop body does not hold exactly one statement
    OuterBodyNotSingle,
    /// Outer loop's single statement is not a Loop
    MissingInnerLoop,
    /// Inner loop body does not hold exactly one statement
    InnerBodyNotSingle,
    /// Inner loop's statement is itself a Loop
    TooDeep,
    /// A loop of the nest does not step by the constant 1
    NonUnitStep,
    /// Inner loop bounds or step mention the outer loop index
    DependentInnerBounds,
}

impl NestViolation {
    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            NestViolation::RootNotLoop => "root is not a loop",
            NestViolation::OuterBodyNotSingle => "outer loop must hold exactly one statement",
            NestViolation::MissingInnerLoop => "outer loop does not contain an inner loop",
            NestViolation::InnerBodyNotSingle => "inner loop must hold exactly one statement",
            NestViolation::TooDeep => "loop nest is deeper than two levels",
            NestViolation::NonUnitStep => "loops of the nest must have unit step",
            NestViolation::DependentInnerBounds => "inner loop bounds depend on the outer index",
        }
    }
}

/// Error during code generation.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// A statement node appeared where an expression was expected
    StatementInExpression,
    /// An expression node appeared where a statement was expected
    ExpressionAsStatement,
    /// Invalid emission settings
    InvalidConfig,
}

/// Result type using LoopTileError.
pub type LoopTileResult<T> = Result<T, LoopTileError>;
