//! Tensor descriptors.
//!
//! A [`Tensor`] is immutable once built. IR nodes hold it through
//! [`TensorRef`], so any number of Load/Store nodes across any number of
//! trees can point at the same descriptor without owning it.

use crate::utils::errors::{IrError, IrErrorKind};
use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::Arc;

/// Shared, read-only handle to a tensor descriptor.
pub type TensorRef = Arc<Tensor>;

/// Element kind of a tensor or literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl DType {
    /// Parse a DSL type name (`f32`, `f64`, `i32`, `i64`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(DType::Float32),
            "f64" => Some(DType::Float64),
            "i32" => Some(DType::Int32),
            "i64" => Some(DType::Int64),
            _ => None,
        }
    }

    /// The C spelling of this element type.
    pub fn c_type(&self) -> &'static str {
        match self {
            DType::Float32 => "float",
            DType::Float64 => "double",
            DType::Int32 => "int",
            DType::Int64 => "long long",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "f32",
            DType::Float64 => "f64",
            DType::Int32 => "i32",
            DType::Int64 => "i64",
        };
        write!(f, "{}", name)
    }
}

/// A named, row-major, multi-dimensional array descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tensor {
    name: String,
    dtype: DType,
    extents: Vec<usize>,
    strides: Vec<usize>,
}

impl Tensor {
    /// Build a tensor with the declared dimensionality `dims`.
    ///
    /// `extents.len()` must equal `dims` and every extent must be positive.
    /// Strides are derived row-major: the last dimension has stride 1 and
    /// dimension `k` has the product of the extents after it.
    pub fn new(
        name: impl Into<String>,
        dtype: DType,
        dims: usize,
        extents: Vec<usize>,
    ) -> Result<Self, IrError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IrError::new(IrErrorKind::InvalidTensor, "tensor name must not be empty"));
        }
        if extents.len() != dims {
            return Err(IrError::new(
                IrErrorKind::InvalidTensor,
                format!(
                    "tensor {} declares {} dimensions but has {} extents",
                    name, dims, extents.len()
                ),
            ));
        }
        if let Some(pos) = extents.iter().position(|&e| e == 0) {
            return Err(IrError::new(
                IrErrorKind::InvalidTensor,
                format!("tensor {} has zero extent in dimension {}", name, pos),
            ));
        }

        let mut strides = vec![0; dims];
        let mut current: usize = 1;
        for d in (0..dims).rev() {
            strides[d] = current;
            current = current.checked_mul(extents[d]).ok_or_else(|| {
                IrError::new(
                    IrErrorKind::InvalidTensor,
                    format!("tensor {} has too many elements to address", name),
                )
            })?;
        }

        Ok(Self { name, dtype, extents, strides })
    }

    /// Build a tensor whose dimensionality is the length of `extents`.
    pub fn with_extents(
        name: impl Into<String>,
        dtype: DType,
        extents: Vec<usize>,
    ) -> Result<Self, IrError> {
        let dims = extents.len();
        Self::new(name, dtype, dims, extents)
    }

    /// Wrap into a shared handle.
    pub fn shared(self) -> TensorRef {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of dimensions.
    pub fn dims(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Total element count. Fits in `usize`, checked at construction.
    pub fn num_elements(&self) -> usize {
        self.extents.iter().product()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extents: Vec<String> = self.extents.iter().map(|e| e.to_string()).collect();
        write!(f, "{}: {}[{}]", self.name, self.dtype, extents.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_strides() {
        let t = Tensor::new("A", DType::Float32, 3, vec![4, 5, 6]).unwrap();
        assert_eq!(t.strides(), &[30, 6, 1]);
        assert_eq!(t.num_elements(), 120);
        assert_eq!(t.dims(), 3);
    }

    #[test]
    fn test_one_dimensional() {
        let t = Tensor::with_extents("v", DType::Int64, vec![7]).unwrap();
        assert_eq!(t.strides(), &[1]);
    }

    #[test]
    fn test_dims_must_match_extents() {
        let err = Tensor::new("A", DType::Float32, 2, vec![4]).unwrap_err();
        assert_eq!(err.kind, IrErrorKind::InvalidTensor);
    }

    #[test]
    fn test_zero_extent_rejected() {
        let err = Tensor::with_extents("A", DType::Float32, vec![4, 0]).unwrap_err();
        assert_eq!(err.kind, IrErrorKind::InvalidTensor);
        assert!(err.message.contains("dimension 1"));
    }

    #[test]
    fn test_element_count_overflow_rejected() {
        let huge = 1usize << (usize::BITS / 2);
        let err = Tensor::with_extents("X", DType::Float32, vec![huge, huge, huge]).unwrap_err();
        assert_eq!(err.kind, IrErrorKind::InvalidTensor);
        assert!(err.message.contains("too many elements"));

        let t = Tensor::with_extents("Y", DType::Float32, vec![huge - 1, 1]).unwrap();
        assert_eq!(t.strides(), &[1, 1]);
    }

    #[test]
    fn test_display() {
        let t = Tensor::with_extents("B", DType::Float64, vec![2, 3]).unwrap();
        assert_eq!(t.to_string(), "B: f64[2, 3]");
    }
}
