//! C and C++ code generation.

use crate::codegen::{EmitConfig, Target};
use crate::ir::node::{Access, Literal, Node};
use crate::ir::tensor::DType;
use crate::ir::visit::{collect_nodes, collect_tensors, free_symbols};
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use crate::utils::pretty::CodeFormatter;

/// C/C++ code generator for a single kernel function.
pub struct CCodeGen<'c> {
    config: &'c EmitConfig,
}

impl<'c> CCodeGen<'c> {
    pub fn new(config: &'c EmitConfig) -> Self {
        Self { config }
    }

    /// Includes or macros needed by any of `roots`.
    pub fn emit_prelude(&self, f: &mut CodeFormatter, roots: &[&Node]) {
        let uses_min = roots
            .iter()
            .any(|root| collect_nodes(root).iter().any(|n| matches!(n, Node::Min { .. })));
        if !uses_min {
            return;
        }
        match self.config.target {
            Target::Cpp => f.writeln("#include <algorithm>"),
            Target::C => {
                f.writeln("#ifndef MIN");
                f.writeln("#define MIN(a, b) ((a) < (b) ? (a) : (b))");
                f.writeln("#endif");
            }
        }
        f.newline();
    }

    /// Emit `void name(...) { ... }` for `root`.
    pub fn emit_function(
        &self,
        f: &mut CodeFormatter,
        name: &str,
        root: &Node,
    ) -> Result<(), CodegenError> {
        f.writeln(&format!("void {}({}) {{", name, self.signature(root).join(", ")));
        f.indent();

        if let Some(size) = self.config.tile_size {
            if free_symbols(root).contains(&self.config.tile_symbol) {
                f.writeln(&format!("const int {} = {};", self.config.tile_symbol, size));
            }
        }
        for (scalar, dtype) in scalar_locals(root) {
            f.writeln(&format!("{} {} = 0;", dtype.map(|d| d.c_type()).unwrap_or("int"), scalar));
        }

        self.emit_stmt(f, root)?;

        f.dedent();
        f.writeln("}");
        Ok(())
    }

    /// Tensor pointers sorted by name, then `int` free symbols sorted.
    fn signature(&self, root: &Node) -> Vec<String> {
        let mut tensors = collect_tensors(root);
        tensors.sort_by(|a, b| a.name().cmp(b.name()));

        let mut params: Vec<String> = tensors
            .iter()
            .map(|t| format!("{}* {}", t.dtype().c_type(), t.name()))
            .collect();

        let locals: Vec<String> = scalar_locals(root).into_iter().map(|(name, _)| name).collect();
        for symbol in free_symbols(root) {
            if self.config.tile_size.is_some() && symbol == self.config.tile_symbol {
                continue;
            }
            if locals.contains(&symbol) {
                continue;
            }
            params.push(format!("int {}", symbol));
        }
        params
    }

    fn emit_stmt(&self, f: &mut CodeFormatter, node: &Node) -> Result<(), CodegenError> {
        match node {
            Node::Loop(lp) => {
                f.writeln(&format!(
                    "for (int {i} = {}; {i} < {}; {i} += {}) {{",
                    self.expr(&lp.lower)?,
                    self.expr(&lp.upper)?,
                    self.expr(&lp.step)?,
                    i = lp.index,
                ));
                f.indent();
                for stmt in &lp.body {
                    self.emit_stmt(f, stmt)?;
                }
                f.dedent();
                f.writeln("}");
                Ok(())
            }
            Node::Assign(assign) => {
                let target = match assign.target() {
                    Node::Store(acc) => self.access(acc)?,
                    Node::ScalarRef(name) => name.clone(),
                    other => {
                        return Err(CodegenError {
                            message: format!("cannot assign to {}", other.kind()),
                            kind: CodegenErrorKind::ExpressionAsStatement,
                        })
                    }
                };
                f.writeln(&format!("{} = {};", target, self.expr(assign.value())?));
                Ok(())
            }
            other => Err(CodegenError {
                message: format!("{} is not a statement", other.kind()),
                kind: CodegenErrorKind::ExpressionAsStatement,
            }),
        }
    }

    /// Render an expression.
    pub fn expr(&self, node: &Node) -> Result<String, CodegenError> {
        Ok(match node {
            Node::Const(lit) => literal(*lit),
            Node::Variable(name) | Node::ScalarRef(name) => name.clone(),
            Node::Add { lhs, rhs } => format!("({} + {})", self.expr(lhs)?, self.expr(rhs)?),
            Node::Mul { lhs, rhs } => format!("({} * {})", self.expr(lhs)?, self.expr(rhs)?),
            Node::Min { lhs, rhs } => {
                let func = match self.config.target {
                    Target::Cpp => "std::min",
                    Target::C => "MIN",
                };
                format!("{}({}, {})", func, self.expr(lhs)?, self.expr(rhs)?)
            }
            Node::Load(acc) => self.access(acc)?,
            Node::Store(_) | Node::Assign(_) | Node::Loop(_) => {
                return Err(CodegenError {
                    message: format!("{} cannot appear in an expression", node.kind()),
                    kind: CodegenErrorKind::StatementInExpression,
                })
            }
        })
    }

    /// Row-major flattened access, `A[i * 1024 + j]`.
    fn access(&self, acc: &Access) -> Result<String, CodegenError> {
        let tensor = acc.tensor();
        let terms = acc
            .indices()
            .iter()
            .zip(tensor.strides())
            .map(|(idx, &stride)| {
                let idx = self.expr(idx)?;
                Ok(if stride == 1 { idx } else { format!("{} * {}", idx, stride) })
            })
            .collect::<Result<Vec<_>, CodegenError>>()?;
        Ok(format!("{}[{}]", tensor.name(), terms.join(" + ")))
    }
}

fn literal(lit: Literal) -> String {
    match lit {
        Literal::I32(v) => v.to_string(),
        Literal::I64(v) => format!("{}LL", v),
        Literal::F32(v) => format!("{:?}f", v),
        Literal::F64(v) => format!("{:?}", v),
    }
}

/// Scalars assigned in the tree, in first-assignment order, with the element
/// type of the first value assigned to each when one can be inferred.
fn scalar_locals(root: &Node) -> Vec<(String, Option<DType>)> {
    let mut out: Vec<(String, Option<DType>)> = Vec::new();
    for node in collect_nodes(root) {
        if let Some(assign) = node.as_assign() {
            if let Node::ScalarRef(name) = assign.target() {
                if !out.iter().any(|(seen, _)| seen == name) {
                    out.push((name.clone(), value_dtype(assign.value())));
                }
            }
        }
    }
    out
}

fn value_dtype(node: &Node) -> Option<DType> {
    match node {
        Node::Const(lit) => Some(lit.dtype()),
        Node::Load(acc) => Some(acc.tensor().dtype()),
        Node::Add { lhs, rhs } | Node::Mul { lhs, rhs } | Node::Min { lhs, rhs } => {
            match (value_dtype(lhs), value_dtype(rhs)) {
                (Some(l), Some(r)) if r.is_float() && !l.is_float() => Some(r),
                (Some(l), _) => Some(l),
                (None, r) => r,
            }
        }
        _ => None,
    }
}
