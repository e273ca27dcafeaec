//! Tensor name resolution.

use crate::frontend::ast::TensorDecl;
use crate::ir::tensor::{DType, Tensor, TensorRef};
use crate::utils::errors::{SemanticError, SemanticErrorKind};
use crate::utils::location::Span;
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Extent used for the default square tensors.
pub const DEFAULT_EXTENT: usize = 1024;

/// Named tensors available to a kernel.
///
/// Names declared in a kernel's `TENSORS:` section shadow entries that
/// were already in the table.
#[derive(Debug, Clone, Default)]
pub struct TensorTable {
    tensors: BTreeMap<String, TensorRef>,
}

impl TensorTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// `A`, `B` and `C` as `f32[1024, 1024]`.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for name in ["A", "B", "C"] {
            let extents = vec![DEFAULT_EXTENT, DEFAULT_EXTENT];
            let tensor = Tensor::with_extents(name, DType::Float32, extents).map(Tensor::shared);
            if let Ok(tensor) = tensor {
                table.insert(tensor);
            }
        }
        table
    }

    /// Add a tensor, returning the entry it replaced.
    pub fn insert(&mut self, tensor: TensorRef) -> Option<TensorRef> {
        self.tensors.insert(tensor.name().to_string(), tensor)
    }

    pub fn get(&self, name: &str) -> Option<&TensorRef> {
        self.tensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Tensors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TensorRef> {
        self.tensors.values()
    }

    /// Resolve `name`, or fail with an `UndefinedTensor` error at `span`.
    pub fn resolve(&self, name: &str, span: Span) -> Result<&TensorRef, SemanticError> {
        self.get(name).ok_or_else(|| SemanticError {
            message: format!("Undefined tensor '{}'", name),
            span,
            kind: SemanticErrorKind::UndefinedTensor,
        })
    }

    /// Add the tensors of a `TENSORS:` section.
    pub fn declare(&mut self, decls: &[TensorDecl]) -> Result<(), SemanticError> {
        let mut seen = HashSet::new();
        for decl in decls {
            if !seen.insert(decl.name.as_str()) {
                return Err(SemanticError {
                    message: format!("Tensor '{}' declared twice", decl.name),
                    span: decl.span,
                    kind: SemanticErrorKind::DuplicateTensor,
                });
            }

            let dtype = DType::from_name(&decl.dtype).ok_or_else(|| SemanticError {
                message: format!("Unknown element type '{}'", decl.dtype),
                span: decl.span,
                kind: SemanticErrorKind::UnknownType,
            })?;

            let tensor = Tensor::with_extents(decl.name.as_str(), dtype, decl.extents.clone())
                .map_err(|e| SemanticError {
                    message: e.message,
                    span: decl.span,
                    kind: SemanticErrorKind::InvalidDeclaration,
                })?;

            debug!("declared tensor {}", tensor);
            self.insert(tensor.shared());
        }
        Ok(())
    }
}
