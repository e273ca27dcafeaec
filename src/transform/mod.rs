//! Loop transformations over the IR.
//!
//! A pass reads its input tree and returns a new, independently owned tree.
//! Inputs are never mutated, so the caller can keep using the original
//! (for example to emit both versions side by side).

pub mod tiling;

pub use tiling::{tile, PerfectNest, Tiling};

use crate::ir::Node;
use crate::utils::errors::TransformError;

/// Transformation pass trait.
pub trait Transform {
    /// Apply the transformation, producing a new tree.
    fn apply(&self, root: &Node) -> Result<Node, TransformError>;

    /// Check whether the pass accepts this tree.
    fn is_applicable(&self, root: &Node) -> bool {
        let _ = root;
        true
    }

    /// Get transformation name.
    fn name(&self) -> &str;
}

/// Apply `passes` in order, each to the output of the previous one.
pub fn apply_all(root: &Node, passes: &[&dyn Transform]) -> Result<Node, TransformError> {
    let mut current = crate::ir::copy::deep_copy(root);
    for pass in passes {
        current = pass.apply(&current)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::visit::loop_depth;

    struct Identity;

    impl Transform for Identity {
        fn apply(&self, root: &Node) -> Result<Node, TransformError> {
            Ok(root.clone())
        }

        fn name(&self) -> &str {
            "identity"
        }
    }

    fn nest() -> Node {
        let stmt = Node::assign(Node::scalar("s"), Node::var("j")).unwrap();
        let inner = Node::for_loop("j", Node::int(0), Node::var("M"), Node::int(1), vec![stmt]);
        Node::for_loop("i", Node::int(0), Node::var("N"), Node::int(1), vec![inner])
    }

    #[test]
    fn test_apply_all() {
        let root = nest();
        let tiling = Tiling::default();
        let out = apply_all(&root, &[&Identity, &tiling]).unwrap();
        assert_eq!(loop_depth(&out), 4);
        assert_eq!(loop_depth(&root), 2);
        assert!(Identity.is_applicable(&root));
    }

    #[test]
    fn test_apply_all_stops_on_error() {
        let root = nest();
        let tiling = Tiling::default();
        // The second tiling sees a four-level nest.
        let err = apply_all(&root, &[&tiling, &tiling]).unwrap_err();
        assert!(err.kind.is_precondition());
    }

    #[test]
    fn test_no_passes_copies() {
        let root = nest();
        assert_eq!(apply_all(&root, &[]).unwrap(), root);
    }
}
