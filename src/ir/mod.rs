//! Intermediate representation for loop-nest kernels.
//!
//! - `tensor`: shared tensor descriptors
//! - `node`: the IR tree
//! - `copy`: deep copy of subtrees
//! - `visit`: read-only traversal
//! - `lower`: lowering from the front-end AST

pub mod tensor;
pub mod node;
pub mod copy;
pub mod visit;
pub mod lower;

pub use tensor::{DType, Tensor, TensorRef};
pub use node::{Access, Assign, Literal, Loop, Node, NodeKind};
pub use copy::{deep_copy, deep_copy_all, deep_copy_opt};
pub use visit::NodeVisitor;
pub use lower::lower_kernel;
