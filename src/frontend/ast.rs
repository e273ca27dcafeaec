//! Abstract Syntax Tree (AST) for the kernel description language.
//!
//! The AST mirrors the three sections of a kernel description and keeps
//! source spans for diagnostics. Tensor names are plain strings here;
//! they are resolved during lowering.

use crate::utils::location::Span;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A parsed kernel description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelDecl {
    /// Tensors declared in the `TENSORS:` section
    pub tensors: Vec<TensorDecl>,
    /// Loop specifications, outermost first
    pub loops: Vec<LoopSpec>,
    /// Statements of the innermost loop body
    pub body: Vec<AssignStmt>,
    /// Source span
    pub span: Span,
}

impl KernelDecl {
    /// Create an empty kernel.
    pub fn new() -> Self {
        Self {
            tensors: Vec::new(),
            loops: Vec::new(),
            body: Vec::new(),
            span: Span::dummy(),
        }
    }

    /// Find a declared tensor by name.
    pub fn find_tensor(&self, name: &str) -> Option<&TensorDecl> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Loop index names, outermost first.
    pub fn loop_indices(&self) -> impl Iterator<Item = &str> {
        self.loops.iter().map(|l| l.index.as_str())
    }
}

impl Default for KernelDecl {
    fn default() -> Self {
        Self::new()
    }
}

/// `name: dtype[extent, ...]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorDecl {
    pub name: String,
    /// Element type name as written (`f32`, `i64`, ...)
    pub dtype: String,
    pub extents: Vec<usize>,
    pub span: Span,
}

/// `index = lower : upper : step`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    pub index: String,
    pub lower: Expr,
    pub upper: Expr,
    pub step: Expr,
    pub span: Span,
}

/// An assignment statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStmt {
    pub target: AssignTarget,
    pub value: Expr,
    pub span: Span,
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    /// `T[e, ...]`
    Tensor {
        name: String,
        indices: Vec<Expr>,
    },
    /// A bare scalar name
    Scalar(String),
}

impl AssignTarget {
    pub fn name(&self) -> &str {
        match self {
            AssignTarget::Tensor { name, .. } => name,
            AssignTarget::Scalar(name) => name,
        }
    }
}

/// An expression with its source span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    /// Create a new expression.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create an integer literal.
    pub fn int_lit(value: i64, span: Span) -> Self {
        Self::new(ExprKind::IntLiteral(value), span)
    }

    /// Create a float literal.
    pub fn float_lit(value: f64, span: Span) -> Self {
        Self::new(ExprKind::FloatLiteral(value), span)
    }

    /// Create a variable reference.
    pub fn var(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Variable(name.into()), span)
    }

    /// Build a binary expression spanning both operands.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let span = left.span.merge(&right.span);
        Self::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span)
    }

    /// Strip any grouping parentheses.
    pub fn ungrouped(&self) -> &Expr {
        match &self.kind {
            ExprKind::Grouped(inner) => inner.ungrouped(),
            _ => self,
        }
    }
}

/// The kind of an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    /// Loop index or free symbol
    Variable(String),
    /// Tensor read `T[e, ...]`
    Access {
        tensor: String,
        indices: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `min(a, b)`
    Min(Box<Expr>, Box<Expr>),
    /// Parenthesized expression
    Grouped(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Mul,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Mul => write!(f, "*"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::IntLiteral(v) => write!(f, "{}", v),
            ExprKind::FloatLiteral(v) => write!(f, "{}", v),
            ExprKind::Variable(name) => write!(f, "{}", name),
            ExprKind::Access { tensor, indices } => {
                write!(f, "{}[", tensor)?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, "]")
            }
            ExprKind::Binary { op, left, right } => write!(f, "{} {} {}", left, op, right),
            ExprKind::Min(a, b) => write!(f, "min({}, {})", a, b),
            ExprKind::Grouped(inner) => write!(f, "({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::location::SourceLocation;

    fn span(start: usize, end: usize) -> Span {
        Span::from_locations(
            SourceLocation::new(1, start + 1, start),
            SourceLocation::new(1, end + 1, end),
        )
    }

    #[test]
    fn test_binary_span_merge() {
        let a = Expr::var("i", span(0, 1));
        let b = Expr::int_lit(1, span(4, 5));
        let sum = Expr::binary(BinaryOp::Add, a, b);
        assert_eq!(sum.to_string(), "i + 1");
        assert_eq!(sum.span.start_column, 1);
        assert_eq!(sum.span.end_column, 6);
    }

    #[test]
    fn test_ungrouped() {
        let inner = Expr::var("N", Span::dummy());
        let grouped = Expr::new(ExprKind::Grouped(Box::new(inner)), Span::dummy());
        assert!(matches!(grouped.ungrouped().kind, ExprKind::Variable(ref n) if n == "N"));
    }
}
