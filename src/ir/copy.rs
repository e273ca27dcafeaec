//! Deep copy of IR subtrees.
//!
//! A copy owns every node it contains; only the tensor handles inside
//! Load/Store accesses are shared with the source tree. Copying reads
//! nothing but its argument, so two copies of one tree are equal to each
//! other and to the source, and independent of both.
//!
//! `Clone for Node` is this deep copy.

use crate::ir::node::{Access, Assign, Loop, Node};
use std::sync::Arc;

/// Copy `node` and its entire subtree.
pub fn deep_copy(node: &Node) -> Node {
    match node {
        Node::Const(lit) => Node::Const(*lit),
        Node::Variable(name) => Node::Variable(name.clone()),
        Node::ScalarRef(name) => Node::ScalarRef(name.clone()),
        Node::Add { lhs, rhs } => Node::Add {
            lhs: Box::new(deep_copy(lhs)),
            rhs: Box::new(deep_copy(rhs)),
        },
        Node::Mul { lhs, rhs } => Node::Mul {
            lhs: Box::new(deep_copy(lhs)),
            rhs: Box::new(deep_copy(rhs)),
        },
        Node::Min { lhs, rhs } => Node::Min {
            lhs: Box::new(deep_copy(lhs)),
            rhs: Box::new(deep_copy(rhs)),
        },
        Node::Load(acc) => Node::Load(copy_access(acc)),
        Node::Store(acc) => Node::Store(copy_access(acc)),
        Node::Assign(assign) => Node::Assign(copy_assign(assign)),
        Node::Loop(lp) => Node::Loop(copy_loop(lp)),
    }
}

/// Copy an optional subtree; an absent node copies to an absent node.
pub fn deep_copy_opt(node: Option<&Node>) -> Option<Node> {
    node.map(deep_copy)
}

/// Copy a sequence of nodes, preserving order.
pub fn deep_copy_all(nodes: &[Node]) -> Vec<Node> {
    nodes.iter().map(deep_copy).collect()
}

/// Copy a loop, header and body.
pub fn copy_loop(lp: &Loop) -> Loop {
    Loop {
        index: lp.index.clone(),
        lower: Box::new(deep_copy(&lp.lower)),
        upper: Box::new(deep_copy(&lp.upper)),
        step: Box::new(deep_copy(&lp.step)),
        body: deep_copy_all(&lp.body),
    }
}

fn copy_access(acc: &Access) -> Access {
    // The source access already passed the dimensionality check against
    // this same tensor, and the copy has the same index count.
    Access::from_parts(Arc::clone(acc.tensor()), deep_copy_all(acc.indices()))
}

fn copy_assign(assign: &Assign) -> Assign {
    Assign::from_parts(deep_copy(assign.target()), deep_copy(assign.value()))
}

impl Clone for Node {
    fn clone(&self) -> Self {
        deep_copy(self)
    }
}

impl Clone for Loop {
    fn clone(&self) -> Self {
        copy_loop(self)
    }
}
