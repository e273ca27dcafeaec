//! Read-only traversal over IR trees.
//!
//! This is the contract emitters and analyses build on: every node's
//! variant and children are reachable without knowing how the tree was
//! produced.

use crate::ir::node::{Access, Assign, Loop, Node};
use crate::ir::tensor::TensorRef;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Visitor trait for traversing an IR tree.
///
/// Every method defaults to walking its children, so implementors only
/// override the cases they care about.
pub trait NodeVisitor<'a> {
    /// Visit any node.
    fn visit_node(&mut self, node: &'a Node) {
        walk_node(self, node);
    }

    /// Visit a loop: header expressions, then body in order.
    fn visit_loop(&mut self, lp: &'a Loop) {
        walk_loop(self, lp);
    }

    /// Visit an assignment: target, then value.
    fn visit_assign(&mut self, assign: &'a Assign) {
        walk_assign(self, assign);
    }

    /// Visit a Load (`is_store == false`) or Store access.
    fn visit_access(&mut self, access: &'a Access, is_store: bool) {
        let _ = is_store;
        walk_access(self, access);
    }

    /// Visit a Const, Variable or ScalarRef.
    fn visit_terminal(&mut self, _node: &'a Node) {}
}

pub fn walk_node<'a, V: NodeVisitor<'a> + ?Sized>(v: &mut V, node: &'a Node) {
    match node {
        Node::Const(_) | Node::Variable(_) | Node::ScalarRef(_) => v.visit_terminal(node),
        Node::Add { lhs, rhs } | Node::Mul { lhs, rhs } | Node::Min { lhs, rhs } => {
            v.visit_node(lhs);
            v.visit_node(rhs);
        }
        Node::Load(acc) => v.visit_access(acc, false),
        Node::Store(acc) => v.visit_access(acc, true),
        Node::Assign(assign) => v.visit_assign(assign),
        Node::Loop(lp) => v.visit_loop(lp),
    }
}

pub fn walk_loop<'a, V: NodeVisitor<'a> + ?Sized>(v: &mut V, lp: &'a Loop) {
    v.visit_node(&lp.lower);
    v.visit_node(&lp.upper);
    v.visit_node(&lp.step);
    for stmt in &lp.body {
        v.visit_node(stmt);
    }
}

pub fn walk_assign<'a, V: NodeVisitor<'a> + ?Sized>(v: &mut V, assign: &'a Assign) {
    v.visit_node(assign.target());
    v.visit_node(assign.value());
}

pub fn walk_access<'a, V: NodeVisitor<'a> + ?Sized>(v: &mut V, access: &'a Access) {
    for idx in access.indices() {
        v.visit_node(idx);
    }
}

struct NodeCollector<'a> {
    nodes: Vec<&'a Node>,
}

impl<'a> NodeVisitor<'a> for NodeCollector<'a> {
    fn visit_node(&mut self, node: &'a Node) {
        self.nodes.push(node);
        walk_node(self, node);
    }
}

/// All nodes of a tree in pre-order.
pub fn collect_nodes(root: &Node) -> Vec<&Node> {
    let mut collector = NodeCollector { nodes: Vec::new() };
    collector.visit_node(root);
    collector.nodes
}

struct TensorCollector<'a> {
    tensors: Vec<&'a TensorRef>,
}

impl<'a> NodeVisitor<'a> for TensorCollector<'a> {
    fn visit_access(&mut self, access: &'a Access, _is_store: bool) {
        let t = access.tensor();
        if !self.tensors.iter().any(|seen| Arc::ptr_eq(seen, t)) {
            self.tensors.push(t);
        }
        walk_access(self, access);
    }
}

/// Distinct tensors referenced by a tree, in first-use order.
pub fn collect_tensors(root: &Node) -> Vec<&TensorRef> {
    let mut collector = TensorCollector { tensors: Vec::new() };
    collector.visit_node(root);
    collector.tensors
}

struct FreeSymbols<'a> {
    bound: Vec<&'a str>,
    free: BTreeSet<String>,
}

impl<'a> NodeVisitor<'a> for FreeSymbols<'a> {
    fn visit_loop(&mut self, lp: &'a Loop) {
        // Header expressions are evaluated outside the loop's own scope.
        self.visit_node(&lp.lower);
        self.visit_node(&lp.upper);
        self.visit_node(&lp.step);
        self.bound.push(&lp.index);
        for stmt in &lp.body {
            self.visit_node(stmt);
        }
        self.bound.pop();
    }

    fn visit_terminal(&mut self, node: &'a Node) {
        if let Node::Variable(name) = node {
            if !self.bound.contains(&name.as_str()) {
                self.free.insert(name.clone());
            }
        }
    }
}

/// Variables read somewhere in the tree but not bound by an enclosing loop,
/// e.g. problem sizes `N`, `M` and the tile-size symbol.
pub fn free_symbols(root: &Node) -> BTreeSet<String> {
    let mut v = FreeSymbols { bound: Vec::new(), free: BTreeSet::new() };
    v.visit_node(root);
    v.free
}

/// Maximum number of nested loops on any path from `root`.
pub fn loop_depth(root: &Node) -> usize {
    match root {
        Node::Loop(lp) => 1 + lp.body.iter().map(loop_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Loop index names from the outermost loop down the first-statement chain.
pub fn loop_indices(root: &Node) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = root;
    while let Node::Loop(lp) = current {
        out.push(lp.index.as_str());
        match lp.body.first() {
            Some(next) => current = next,
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::NodeKind;
    use crate::ir::tensor::{DType, Tensor};

    fn kernel() -> Node {
        let a = Tensor::with_extents("A", DType::Float32, vec![4, 4]).unwrap().shared();
        let stmt = Node::assign(
            Node::store(&a, vec![Node::var("i"), Node::var("j")]).unwrap(),
            Node::mul(
                Node::load(&a, vec![Node::var("j"), Node::var("i")]).unwrap(),
                Node::var("alpha"),
            ),
        )
        .unwrap();
        let inner = Node::for_loop("j", Node::var("i"), Node::var("M"), Node::int(1), vec![stmt]);
        Node::for_loop("i", Node::int(0), Node::var("N"), Node::int(1), vec![inner])
    }

    #[test]
    fn test_preorder_collection() {
        let root = kernel();
        let nodes = collect_nodes(&root);
        assert_eq!(nodes.len(), root.size());
        assert_eq!(nodes[0].kind(), NodeKind::Loop);
        assert_eq!(nodes[1].kind(), NodeKind::Const);
    }

    #[test]
    fn test_free_symbols() {
        let root = kernel();
        let free: Vec<String> = free_symbols(&root).into_iter().collect();
        assert_eq!(free, vec!["M", "N", "alpha"]);
    }

    #[test]
    fn test_distinct_tensors() {
        let root = kernel();
        let tensors = collect_tensors(&root);
        assert_eq!(tensors.len(), 1);
        assert_eq!(tensors[0].name(), "A");
    }

    #[test]
    fn test_depth_and_indices() {
        let root = kernel();
        assert_eq!(loop_depth(&root), 2);
        assert_eq!(loop_indices(&root), vec!["i", "j"]);
        assert_eq!(loop_depth(&Node::int(0)), 0);
    }

    struct LoadCounter(usize);

    impl<'a> NodeVisitor<'a> for LoadCounter {
        fn visit_access(&mut self, access: &'a Access, is_store: bool) {
            if !is_store {
                self.0 += 1;
            }
            walk_access(self, access);
        }
    }

    #[test]
    fn test_custom_visitor() {
        let root = kernel();
        let mut counter = LoadCounter(0);
        counter.visit_node(&root);
        assert_eq!(counter.0, 1);
    }
}
