//! Loop tiling transformation.
//!
//! Tiling (also called blocking) restructures a two-level loop nest so that
//! it processes the iteration space in `T x T` blocks.
//!
//! Example:
//! ```text
//! for i = lb_i to ub_i:
//!   for j = lb_j to ub_j:
//!     S
//! ```
//! becomes:
//! ```text
//! for II = lb_i to ub_i step T:
//!   for JJ = lb_j to ub_j step T:
//!     for i = II to min(II + T, ub_i):
//!       for j = JJ to min(JJ + T, ub_j):
//!         S
//! ```
//!
//! The `Min` clamps the last partial tile in each dimension, so any positive
//! binding of `T` visits every `(i, j)` of the original nest exactly once.
//! This holds for unit-step loops whose inner bounds do not mention `i`;
//! other nests are rejected.
//! `T` stays a free variable in the result; binding it is up to the emitter.
//!
//! The pass is split into [`Tiling::validate`], which checks the input shape
//! and touches nothing, and [`Tiling::synthesize`], which builds the new tree
//! from deep copies. The input tree is never modified.

use crate::ir::copy::{copy_loop, deep_copy};
use crate::ir::node::{Loop, Node};
use crate::ir::visit::free_symbols;
use crate::transform::Transform;
use crate::utils::errors::{NestViolation, TransformError, TransformErrorKind};

const PASS_NAME: &str = "tiling";

/// Two-level loop tiling with a symbolic tile size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiling {
    /// Name of the free tile-size variable
    pub tile_symbol: String,
    /// Index of the tile loop over the outer dimension
    pub outer_tile_index: String,
    /// Index of the tile loop over the inner dimension
    pub inner_tile_index: String,
}

impl Default for Tiling {
    fn default() -> Self {
        Self {
            tile_symbol: "T".to_string(),
            outer_tile_index: "II".to_string(),
            inner_tile_index: "JJ".to_string(),
        }
    }
}

/// A validated strict two-level perfect nest, borrowed from the input tree.
#[derive(Debug, Clone, Copy)]
pub struct PerfectNest<'a> {
    /// The loop over `I`
    pub outer: &'a Loop,
    /// The loop over `J`, the single statement of `outer`
    pub inner: &'a Loop,
    /// The single statement of `inner`
    pub stmt: &'a Node,
}

impl Tiling {
    /// Tiling with the default names `II`, `JJ` and `T`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `symbol` for the tile-size variable.
    pub fn with_tile_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.tile_symbol = symbol.into();
        self
    }

    /// Use `outer` and `inner` as the tile loop indices.
    pub fn with_tile_indices(
        mut self,
        outer: impl Into<String>,
        inner: impl Into<String>,
    ) -> Self {
        self.outer_tile_index = outer.into();
        self.inner_tile_index = inner.into();
        self
    }

    /// Check that `root` is a strict two-level perfect nest and that the
    /// synthesized names are usable for it.
    pub fn validate<'a>(&self, root: &'a Node) -> Result<PerfectNest<'a>, TransformError> {
        let outer = root.as_loop().ok_or_else(|| violation(NestViolation::RootNotLoop))?;
        let first = match outer.body.as_slice() {
            [only] => only,
            _ => return Err(violation(NestViolation::OuterBodyNotSingle)),
        };
        let inner = first.as_loop().ok_or_else(|| violation(NestViolation::MissingInnerLoop))?;
        let stmt = match inner.body.as_slice() {
            [only] => only,
            _ => return Err(violation(NestViolation::InnerBodyNotSingle)),
        };
        if stmt.as_loop().is_some() {
            return Err(violation(NestViolation::TooDeep));
        }
        if !is_unit(&outer.step) || !is_unit(&inner.step) {
            return Err(violation(NestViolation::NonUnitStep));
        }
        // The JJ tile loop sits outside the point loop that binds the outer index.
        let inner_header = [&*inner.lower, &*inner.upper, &*inner.step];
        if inner_header.iter().any(|e| free_symbols(e).contains(&outer.index)) {
            return Err(violation(NestViolation::DependentInnerBounds));
        }

        self.check_names(root, outer, inner)?;
        Ok(PerfectNest { outer, inner, stmt })
    }

    fn check_names(&self, root: &Node, outer: &Loop, inner: &Loop) -> Result<(), TransformError> {
        let names = [
            self.outer_tile_index.as_str(),
            self.inner_tile_index.as_str(),
            self.tile_symbol.as_str(),
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(invalid_config("synthesized names must not be empty".to_string()));
        }
        for (k, name) in names.iter().enumerate() {
            if names[k + 1..].contains(name) {
                return Err(invalid_config(format!("synthesized name '{}' is used twice", name)));
            }
        }

        let free = free_symbols(root);
        for name in names {
            if name == outer.index || name == inner.index {
                return Err(invalid_config(format!(
                    "synthesized name '{}' collides with a loop index of the nest",
                    name
                )));
            }
            if free.contains(name) {
                return Err(invalid_config(format!(
                    "synthesized name '{}' is already a free variable of the nest",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Build the four-level tiled nest for a validated input.
    pub fn synthesize(&self, nest: &PerfectNest<'_>) -> Result<Node, TransformError> {
        let PerfectNest { outer, inner, .. } = *nest;

        // Point loops: a full copy of the two-level nest, re-bounded to one tile.
        let mut point = copy_loop(outer);
        point.lower = Box::new(Node::var(self.outer_tile_index.as_str()));
        point.upper = Box::new(self.clamp(&self.outer_tile_index, &outer.upper));

        let point_inner = point
            .single_stmt_mut()
            .and_then(Node::as_loop_mut)
            .ok_or_else(|| {
                TransformError::new(
                    PASS_NAME,
                    TransformErrorKind::InternalInvariant,
                    "copied nest lost its inner loop",
                )
            })?;
        point_inner.lower = Box::new(Node::var(self.inner_tile_index.as_str()));
        point_inner.upper = Box::new(self.clamp(&self.inner_tile_index, &inner.upper));

        let inner_tiles = Loop::new(
            self.inner_tile_index.as_str(),
            deep_copy(&inner.lower),
            deep_copy(&inner.upper),
            Node::var(self.tile_symbol.as_str()),
        )
        .with_stmt(Node::Loop(point));

        let outer_tiles = Loop::new(
            self.outer_tile_index.as_str(),
            deep_copy(&outer.lower),
            deep_copy(&outer.upper),
            Node::var(self.tile_symbol.as_str()),
        )
        .with_stmt(Node::Loop(inner_tiles));

        Ok(Node::Loop(outer_tiles))
    }

    /// `min(tile + T, upper)`
    fn clamp(&self, tile_index: &str, upper: &Node) -> Node {
        Node::min(
            Node::add(Node::var(tile_index), Node::var(self.tile_symbol.as_str())),
            deep_copy(upper),
        )
    }
}

impl Transform for Tiling {
    fn apply(&self, root: &Node) -> Result<Node, TransformError> {
        let nest = self.validate(root)?;
        self.synthesize(&nest)
    }

    fn is_applicable(&self, root: &Node) -> bool {
        self.validate(root).is_ok()
    }

    fn name(&self) -> &str {
        PASS_NAME
    }
}

/// Tile a two-level nest with the default names (`II`, `JJ`, `T`).
pub fn tile(root: &Node) -> Result<Node, TransformError> {
    Tiling::default().apply(root)
}

fn is_unit(step: &Node) -> bool {
    step.literal().and_then(|lit| lit.as_i64()) == Some(1)
}

fn violation(v: NestViolation) -> TransformError {
    TransformError::new(PASS_NAME, TransformErrorKind::NotPerfectNest(v), v.describe())
}

fn invalid_config(message: String) -> TransformError {
    TransformError::new(PASS_NAME, TransformErrorKind::InvalidConfig, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::tensor::{DType, Tensor, TensorRef};
    use crate::ir::visit::{collect_nodes, collect_tensors, loop_depth, loop_indices};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn tensor(name: &str) -> TensorRef {
        Tensor::with_extents(name, DType::Float32, vec![64, 64]).unwrap().shared()
    }

    fn ij() -> Vec<Node> {
        vec![Node::var("i"), Node::var("j")]
    }

    fn add_stmt(a: &TensorRef, b: &TensorRef, c: &TensorRef) -> Node {
        Node::assign(
            Node::store(c, ij()).unwrap(),
            Node::add(Node::load(a, ij()).unwrap(), Node::load(b, ij()).unwrap()),
        )
        .unwrap()
    }

    fn nest(upper_i: Node, upper_j: Node, stmt: Node) -> Node {
        let inner = Node::for_loop("j", Node::int(0), upper_j, Node::int(1), vec![stmt]);
        Node::for_loop("i", Node::int(0), upper_i, Node::int(1), vec![inner])
    }

    fn add_kernel() -> (Node, [TensorRef; 3]) {
        let (a, b, c) = (tensor("A"), tensor("B"), tensor("C"));
        let root = nest(Node::var("N"), Node::var("M"), add_stmt(&a, &b, &c));
        (root, [a, b, c])
    }

    /// `for index = 0 to upper step 1`
    fn unit_loop(index: &str, upper: &str, body: Vec<Node>) -> Node {
        Node::for_loop(index, Node::int(0), Node::var(upper), Node::int(1), body)
    }

    fn scalar_stmt() -> Node {
        Node::assign(Node::scalar("s"), Node::var("i")).unwrap()
    }

    fn eval(node: &Node, env: &HashMap<String, i64>) -> i64 {
        match node {
            Node::Const(lit) => lit.as_i64().unwrap(),
            Node::Variable(name) => env[name],
            Node::Add { lhs, rhs } => eval(lhs, env) + eval(rhs, env),
            Node::Mul { lhs, rhs } => eval(lhs, env) * eval(rhs, env),
            Node::Min { lhs, rhs } => eval(lhs, env).min(eval(rhs, env)),
            other => panic!("not a bound expression: {}", other),
        }
    }

    /// Every `(i, j)` at which the statement runs, in execution order.
    fn iterations(node: &Node, env: &mut HashMap<String, i64>, out: &mut Vec<(i64, i64)>) {
        match node {
            Node::Loop(lp) => {
                let lb = eval(&lp.lower, env);
                let ub = eval(&lp.upper, env);
                let step = eval(&lp.step, env);
                assert!(step > 0);
                let mut v = lb;
                while v < ub {
                    env.insert(lp.index.clone(), v);
                    for stmt in &lp.body {
                        iterations(stmt, env, out);
                    }
                    v += step;
                }
                env.remove(&lp.index);
            }
            Node::Assign(_) => out.push((env["i"], env["j"])),
            other => panic!("unexpected statement {}", other),
        }
    }

    fn run(root: &Node, bindings: &[(&str, i64)]) -> Vec<(i64, i64)> {
        let mut env: HashMap<String, i64> =
            bindings.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let mut out = Vec::new();
        iterations(root, &mut env, &mut out);
        out
    }

    #[test]
    fn test_tiled_shape() {
        let (root, [a, b, c]) = add_kernel();
        let tiled = tile(&root).unwrap();

        let point = Node::for_loop(
            "j",
            Node::var("JJ"),
            Node::min(Node::add(Node::var("JJ"), Node::var("T")), Node::var("M")),
            Node::int(1),
            vec![add_stmt(&a, &b, &c)],
        );
        let point = Node::for_loop(
            "i",
            Node::var("II"),
            Node::min(Node::add(Node::var("II"), Node::var("T")), Node::var("N")),
            Node::int(1),
            vec![point],
        );
        let jj = Node::for_loop("JJ", Node::int(0), Node::var("M"), Node::var("T"), vec![point]);
        let expected = Node::for_loop("II", Node::int(0), Node::var("N"), Node::var("T"), vec![jj]);

        assert_eq!(tiled, expected);
        assert_eq!(loop_depth(&tiled), 4);
        assert_eq!(loop_indices(&tiled), vec!["II", "JJ", "i", "j"]);
    }

    #[test]
    fn test_partition_property() {
        let (root, _) = add_kernel();
        let tiled = tile(&root).unwrap();

        for &(n, m, t) in &[(10, 10, 4), (7, 13, 3), (10, 10, 1), (5, 3, 8), (12, 12, 4)] {
            let expected = run(&root, &[("N", n), ("M", m)]);
            let mut got = run(&tiled, &[("N", n), ("M", m), ("T", t)]);
            assert_eq!(got.len(), expected.len(), "N={} M={} T={}", n, m, t);
            got.sort();
            got.dedup();
            assert_eq!(got, expected, "N={} M={} T={}", n, m, t);
        }
    }

    #[test]
    fn test_partial_last_tile() {
        let (root, _) = add_kernel();
        let tiled = tile(&root).unwrap();

        let mut env: HashMap<String, i64> =
            [("N", 10), ("T", 4)].iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let ii_loop = tiled.as_loop().unwrap();
        let point = ii_loop
            .single_stmt()
            .and_then(Node::as_loop)
            .and_then(Loop::single_stmt)
            .and_then(Node::as_loop)
            .unwrap();

        let mut tiles = Vec::new();
        let mut ii = eval(&ii_loop.lower, &env);
        while ii < eval(&ii_loop.upper, &env) {
            env.insert("II".to_string(), ii);
            tiles.push((eval(&point.lower, &env), eval(&point.upper, &env)));
            ii += eval(&ii_loop.step, &env);
        }
        assert_eq!(tiles, vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn test_input_left_untouched() {
        let (root, _) = add_kernel();
        let snapshot = deep_copy(&root);
        let tiled = tile(&root).unwrap();

        assert_eq!(root, snapshot);
        assert_eq!(loop_indices(&root), vec!["i", "j"]);

        let original: Vec<*const Node> =
            collect_nodes(&root).into_iter().map(|n| n as *const Node).collect();
        for node in collect_nodes(&tiled) {
            assert!(!original.contains(&(node as *const Node)));
        }
    }

    #[test]
    fn test_tensors_shared_with_input() {
        let (root, [a, b, c]) = add_kernel();
        let tiled = tile(&root).unwrap();
        let tensors = collect_tensors(&tiled);
        assert_eq!(tensors.len(), 3);
        assert!(Arc::ptr_eq(tensors[0], &c));
        assert!(Arc::ptr_eq(tensors[1], &a));
        assert!(Arc::ptr_eq(tensors[2], &b));
    }

    #[test]
    fn test_non_unit_step_rejected() {
        let two = Node::int(2);
        let inner = Node::for_loop("j", Node::int(0), Node::var("M"), two, vec![scalar_stmt()]);
        let root = unit_loop("i", "N", vec![inner]);
        assert_eq!(violation_of(&root), NestViolation::NonUnitStep);

        let inner = unit_loop("j", "M", vec![scalar_stmt()]);
        let root = Node::for_loop("i", Node::int(0), Node::var("N"), Node::var("S"), vec![inner]);
        assert_eq!(violation_of(&root), NestViolation::NonUnitStep);
    }

    #[test]
    fn test_point_loops_have_unit_step() {
        let (root, _) = add_kernel();
        let tiled = tile(&root).unwrap();
        let chain = loop_chain(&tiled);
        assert_eq!(*chain[2].step, Node::int(1));
        assert_eq!(*chain[3].step, Node::int(1));
    }

    #[test]
    fn test_triangular_nest_rejected() {
        let lower = Node::var("i");
        let inner = Node::for_loop("j", lower, Node::var("N"), Node::int(1), vec![scalar_stmt()]);
        let root = unit_loop("i", "N", vec![inner]);
        assert_eq!(violation_of(&root), NestViolation::DependentInnerBounds);

        let upper = Node::add(Node::var("i"), Node::int(1));
        let inner = Node::for_loop("j", Node::int(0), upper, Node::int(1), vec![scalar_stmt()]);
        let root = unit_loop("i", "N", vec![inner]);
        let err = tile(&root).unwrap_err();
        assert!(err.kind.is_precondition());
        assert!(!Tiling::default().is_applicable(&root));
    }

    fn loop_chain(root: &Node) -> Vec<&Loop> {
        let mut out = Vec::new();
        let mut current = root;
        while let Some(lp) = current.as_loop() {
            out.push(lp);
            match lp.body.first() {
                Some(next) => current = next,
                None => break,
            }
        }
        out
    }

    fn violation_of(root: &Node) -> NestViolation {
        match tile(root).unwrap_err().kind {
            TransformErrorKind::NotPerfectNest(v) => v,
            other => panic!("expected precondition error, got {:?}", other),
        }
    }

    #[test]
    fn test_precondition_violations() {
        assert_eq!(violation_of(&scalar_stmt()), NestViolation::RootNotLoop);

        let single = unit_loop("i", "N", vec![scalar_stmt()]);
        assert_eq!(violation_of(&single), NestViolation::MissingInnerLoop);

        let empty = Node::for_loop("i", Node::int(0), Node::var("N"), Node::int(1), vec![]);
        assert_eq!(violation_of(&empty), NestViolation::OuterBodyNotSingle);

        let inner = unit_loop("j", "M", vec![scalar_stmt()]);
        let two = unit_loop("i", "N", vec![inner, scalar_stmt()]);
        assert_eq!(violation_of(&two), NestViolation::OuterBodyNotSingle);

        let wide = nest(Node::var("N"), Node::var("M"), scalar_stmt());
        let mut wide = deep_copy(&wide);
        wide.as_loop_mut()
            .and_then(Loop::single_stmt_mut)
            .and_then(Node::as_loop_mut)
            .unwrap()
            .body
            .push(scalar_stmt());
        assert_eq!(violation_of(&wide), NestViolation::InnerBodyNotSingle);

        let k = unit_loop("k", "K", vec![scalar_stmt()]);
        let deep = nest(Node::var("N"), Node::var("M"), k);
        assert_eq!(violation_of(&deep), NestViolation::TooDeep);
    }

    #[test]
    fn test_precondition_error_reporting() {
        let err = tile(&scalar_stmt()).unwrap_err();
        assert!(err.kind.is_precondition());
        assert!(!err.kind.is_internal());
        assert_eq!(err.transform, "tiling");
        assert_eq!(err.to_string(), "root is not a loop in tiling");
    }

    #[test]
    fn test_name_collisions() {
        let (root, _) = add_kernel();

        let err = Tiling::new().with_tile_indices("i", "JJ").apply(&root).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::InvalidConfig);

        let err = Tiling::new().with_tile_symbol("N").apply(&root).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::InvalidConfig);

        let err = Tiling::new().with_tile_indices("X", "X").apply(&root).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::InvalidConfig);

        let err = Tiling::new().with_tile_symbol("").apply(&root).unwrap_err();
        assert_eq!(err.kind, TransformErrorKind::InvalidConfig);
    }

    #[test]
    fn test_custom_names() {
        let (root, _) = add_kernel();
        let pass = Tiling::new().with_tile_symbol("TS").with_tile_indices("it", "jt");
        assert!(pass.is_applicable(&root));
        let tiled = pass.apply(&root).unwrap();
        assert_eq!(loop_indices(&tiled), vec!["it", "jt", "i", "j"]);
        assert_eq!(*tiled.as_loop().unwrap().step, Node::var("TS"));

        let got = run(&tiled, &[("N", 9), ("M", 6), ("TS", 4)]);
        assert_eq!(got.len(), 54);
    }

    #[test]
    fn test_validate_borrows_statement() {
        let (root, _) = add_kernel();
        let pass = Tiling::default();
        let nest = pass.validate(&root).unwrap();
        assert_eq!(nest.outer.index, "i");
        assert_eq!(nest.inner.index, "j");
        let stmt = &root.as_loop().unwrap().body[0].as_loop().unwrap().body[0];
        assert!(std::ptr::eq(nest.stmt, stmt));
    }
}
