//! AST to IR lowering.
//!
//! The lowering process:
//! - Resolves tensor names against the kernel's declarations and the
//!   caller's [`TensorTable`]
//! - Nests loops outermost first, with every body statement in order in
//!   the innermost loop
//! - Checks index counts through the node model's constructors

use crate::frontend::ast::{AssignStmt, AssignTarget, BinaryOp, Expr, ExprKind, KernelDecl};
use crate::frontend::tensors::TensorTable;
use crate::ir::node::{Literal, Node};
use crate::utils::errors::{SemanticError, SemanticErrorKind};
use anyhow::{Context, Result};
use log::{debug, info};

/// Lower a parsed kernel to an IR tree rooted at the outermost loop.
pub fn lower_kernel(kernel: &KernelDecl, table: &TensorTable) -> Result<Node> {
    if kernel.loops.is_empty() {
        return Err(SemanticError {
            message: "Kernel has no loops".to_string(),
            span: kernel.span,
            kind: SemanticErrorKind::EmptyNest,
        }
        .into());
    }

    let mut tensors = table.clone();
    tensors.declare(&kernel.tensors)?;

    let ctx = LoweringContext { tensors: &tensors };

    let mut body = kernel
        .body
        .iter()
        .map(|stmt| ctx.lower_stmt(stmt))
        .collect::<Result<Vec<_>>>()?;

    for spec in kernel.loops.iter().rev() {
        let lp = Node::for_loop(
            spec.index.as_str(),
            ctx.lower_expr(&spec.lower)?,
            ctx.lower_expr(&spec.upper)?,
            ctx.lower_expr(&spec.step)?,
            body,
        );
        debug!("lowered loop {}", spec.index);
        body = vec![lp];
    }

    let root = body.remove(0);
    info!("lowered kernel: {} loops, {} nodes", kernel.loops.len(), root.size());
    Ok(root)
}

/// Context for lowering, holding the resolved tensors.
struct LoweringContext<'t> {
    tensors: &'t TensorTable,
}

impl LoweringContext<'_> {
    fn lower_stmt(&self, stmt: &AssignStmt) -> Result<Node> {
        let target = match &stmt.target {
            AssignTarget::Tensor { name, indices } => {
                let tensor = self.tensors.resolve(name, stmt.span)?;
                let indices = self.lower_exprs(indices)?;
                Node::store(tensor, indices)
                    .with_context(|| format!("in assignment at {}", stmt.span))?
            }
            AssignTarget::Scalar(name) => Node::scalar(name.as_str()),
        };
        let value = self.lower_expr(&stmt.value)?;
        Ok(Node::assign(target, value)?)
    }

    fn lower_exprs(&self, exprs: &[Expr]) -> Result<Vec<Node>> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_expr(&self, expr: &Expr) -> Result<Node> {
        Ok(match &expr.kind {
            ExprKind::IntLiteral(v) => match i32::try_from(*v) {
                Ok(small) => Node::int(small),
                Err(_) => Node::constant(Literal::I64(*v)),
            },
            ExprKind::FloatLiteral(v) => Node::constant(Literal::F32(*v as f32)),
            ExprKind::Variable(name) => Node::var(name.as_str()),
            ExprKind::Access { tensor, indices } => {
                let tensor = self.tensors.resolve(tensor, expr.span)?;
                let indices = self.lower_exprs(indices)?;
                Node::load(tensor, indices).with_context(|| format!("in access at {}", expr.span))?
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.lower_expr(left)?;
                let rhs = self.lower_expr(right)?;
                match op {
                    BinaryOp::Add => Node::add(lhs, rhs),
                    BinaryOp::Mul => Node::mul(lhs, rhs),
                }
            }
            ExprKind::Min(a, b) => Node::min(self.lower_expr(a)?, self.lower_expr(b)?),
            ExprKind::Grouped(inner) => self.lower_expr(inner)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend;
    use crate::ir::node::NodeKind;
    use crate::ir::visit::{collect_tensors, loop_indices};
    use crate::utils::errors::{IrError, IrErrorKind};
    use std::sync::Arc;

    fn lower(source: &str) -> Result<Node> {
        let kernel = frontend::parse(source)?;
        lower_kernel(&kernel, &TensorTable::with_defaults())
    }

    #[test]
    fn test_lower_add_kernel() {
        let root = lower("LOOPS: i=0:N:1, j=0:M:1 BODY: C[i, j] = A[i, j] + B[i, j]").unwrap();
        assert_eq!(loop_indices(&root), vec!["i", "j"]);

        let outer = root.as_loop().unwrap();
        assert_eq!(*outer.lower, Node::int(0));
        assert_eq!(*outer.upper, Node::var("N"));
        let inner = outer.single_stmt().and_then(Node::as_loop).unwrap();
        let stmt = inner.single_stmt().and_then(Node::as_assign).unwrap();
        assert_eq!(stmt.target().kind(), NodeKind::Store);
        assert_eq!(stmt.value().kind(), NodeKind::Add);
        assert_eq!(
            root.to_string(),
            "for i = 0 to N step 1 { for j = 0 to M step 1 { C[i, j] = (A[i, j] + B[i, j]); }; }"
        );
    }

    #[test]
    fn test_shared_tensor_handles() {
        let table = TensorTable::with_defaults();
        let kernel = frontend::parse("LOOPS: i=0:N BODY: C[i, i] = A[i, i] * A[i, i]").unwrap();
        let root = lower_kernel(&kernel, &table).unwrap();
        let tensors = collect_tensors(&root);
        assert_eq!(tensors.len(), 2);
        assert!(Arc::ptr_eq(tensors[1], table.get("A").unwrap()));
    }

    #[test]
    fn test_literals() {
        let root = lower("LOOPS: i=0:4 BODY: s = 2.5 + 3000000000").unwrap();
        let stmt = root.as_loop().unwrap().single_stmt().and_then(Node::as_assign).unwrap();
        let (lhs, rhs) = stmt.value().operands().unwrap();
        assert_eq!(lhs.literal(), Some(Literal::F32(2.5)));
        assert_eq!(rhs.literal(), Some(Literal::I64(3_000_000_000)));
        assert_eq!(stmt.target().kind(), NodeKind::ScalarRef);
    }

    #[test]
    fn test_declared_tensor() {
        let root = lower("TENSORS: v: f64[32] LOOPS: i=0:32 BODY: v[i] = v[i] * 2").unwrap();
        let tensors = collect_tensors(&root);
        assert_eq!(tensors[0].name(), "v");
        assert_eq!(tensors[0].dims(), 1);
    }

    #[test]
    fn test_multiple_statements_in_innermost_loop() {
        let root = lower("LOOPS: i=0:N, j=0:M BODY: s = A[i, j]; C[i, j] = s").unwrap();
        let inner = root.as_loop().unwrap().single_stmt().and_then(Node::as_loop).unwrap();
        assert_eq!(inner.body.len(), 2);
    }

    #[test]
    fn test_undefined_tensor() {
        let err = lower("LOOPS: i=0:N BODY: D[i] = 0").unwrap_err();
        let sem = err.downcast_ref::<SemanticError>().unwrap();
        assert_eq!(sem.kind, SemanticErrorKind::UndefinedTensor);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = lower("LOOPS: i=0:N BODY: C[i] = A[i, i]").unwrap_err();
        let ir = err.downcast_ref::<IrError>().unwrap();
        assert_eq!(ir.kind, IrErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_empty_nest() {
        let err = lower_kernel(&KernelDecl::new(), &TensorTable::new()).unwrap_err();
        let sem = err.downcast_ref::<SemanticError>().unwrap();
        assert_eq!(sem.kind, SemanticErrorKind::EmptyNest);
    }
}
