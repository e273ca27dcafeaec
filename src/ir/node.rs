//! The IR node model.
//!
//! A kernel is a tree of [`Node`]s rooted at a `Loop` or an `Assign`. Every
//! child is owned by exactly one parent; the only sharing is through
//! [`TensorRef`] handles inside Load/Store accesses.

use crate::ir::tensor::{DType, TensorRef};
use crate::utils::errors::{IrError, IrErrorKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A numeric literal together with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    pub fn dtype(&self) -> DType {
        match self {
            Literal::I32(_) => DType::Int32,
            Literal::I64(_) => DType::Int64,
            Literal::F32(_) => DType::Float32,
            Literal::F64(_) => DType::Float64,
        }
    }

    /// The value as an integer, for integer literals.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Literal::I32(v) => Some(v as i64),
            Literal::I64(v) => Some(v),
            Literal::F32(_) | Literal::F64(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I32(v) => write!(f, "{}", v),
            Literal::I64(v) => write!(f, "{}", v),
            Literal::F32(v) => write!(f, "{:.2}", v),
            Literal::F64(v) => write!(f, "{:.2}", v),
        }
    }
}

/// Variant discriminator for [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Structural
    Loop,
    // Access
    Load,
    Store,
    // Computation
    Add,
    Mul,
    Min,
    Assign,
    // Terminals
    Const,
    Variable,
    ScalarRef,
}

impl NodeKind {
    /// Whether nodes of this kind can appear in a loop body.
    pub fn is_statement(&self) -> bool {
        matches!(self, NodeKind::Loop | NodeKind::Assign)
    }

    /// Whether nodes of this kind evaluate to a value.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Const | NodeKind::Variable | NodeKind::Add | NodeKind::Mul
                | NodeKind::Min | NodeKind::Load
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Loop => "Loop",
            NodeKind::Load => "Load",
            NodeKind::Store => "Store",
            NodeKind::Add => "Add",
            NodeKind::Mul => "Mul",
            NodeKind::Min => "Min",
            NodeKind::Assign => "Assign",
            NodeKind::Const => "Const",
            NodeKind::Variable => "Variable",
            NodeKind::ScalarRef => "ScalarRef",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An IR node.
#[derive(Debug, PartialEq, Serialize)]
pub enum Node {
    /// Numeric literal
    Const(Literal),
    /// Named value, e.g. a loop index or a symbolic size
    Variable(String),
    /// Named scalar storage location, only valid as an assignment target
    ScalarRef(String),
    Add { lhs: Box<Node>, rhs: Box<Node> },
    Mul { lhs: Box<Node>, rhs: Box<Node> },
    Min { lhs: Box<Node>, rhs: Box<Node> },
    /// Tensor read
    Load(Access),
    /// Tensor write target
    Store(Access),
    Assign(Assign),
    Loop(Loop),
}

/// A tensor access: a shared tensor plus one index expression per dimension.
#[derive(Debug, Serialize)]
pub struct Access {
    tensor: TensorRef,
    indices: Vec<Node>,
}

impl Access {
    /// Build an access, checking the index count against the tensor.
    pub fn new(tensor: &TensorRef, indices: Vec<Node>) -> Result<Self, IrError> {
        if indices.len() != tensor.dims() {
            return Err(IrError::new(
                IrErrorKind::DimensionMismatch,
                format!(
                    "tensor {} has {} dimensions but is accessed with {} indices",
                    tensor.name(),
                    tensor.dims(),
                    indices.len()
                ),
            ));
        }
        Ok(Self { tensor: Arc::clone(tensor), indices })
    }

    /// Unchecked constructor for callers that copy an already validated access.
    pub(crate) fn from_parts(tensor: TensorRef, indices: Vec<Node>) -> Self {
        Self { tensor, indices }
    }

    pub fn tensor(&self) -> &TensorRef {
        &self.tensor
    }

    pub fn indices(&self) -> &[Node] {
        &self.indices
    }
}

impl PartialEq for Access {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.tensor, &other.tensor) || *self.tensor == *other.tensor)
            && self.indices == other.indices
    }
}

/// An assignment statement.
#[derive(Debug, PartialEq, Serialize)]
pub struct Assign {
    target: Box<Node>,
    value: Box<Node>,
}

impl Assign {
    /// Build an assignment. The target must be a Store or a ScalarRef.
    pub fn new(target: Node, value: Node) -> Result<Self, IrError> {
        if !matches!(target, Node::Store(_) | Node::ScalarRef(_)) {
            return Err(IrError::new(
                IrErrorKind::InvalidAssignTarget,
                format!("{} node is not an assignable location", target.kind()),
            ));
        }
        Ok(Self {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub(crate) fn from_parts(target: Node, value: Node) -> Self {
        Self {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn value(&self) -> &Node {
        &self.value
    }
}

/// A counted loop `for index in [lower, upper) step step`.
#[derive(Debug, PartialEq, Serialize)]
pub struct Loop {
    /// Index variable name
    pub index: String,
    pub lower: Box<Node>,
    pub upper: Box<Node>,
    pub step: Box<Node>,
    /// Statements in execution order
    pub body: Vec<Node>,
}

impl Loop {
    /// A loop with an empty body.
    pub fn new(index: impl Into<String>, lower: Node, upper: Node, step: Node) -> Self {
        Self {
            index: index.into(),
            lower: Box::new(lower),
            upper: Box::new(upper),
            step: Box::new(step),
            body: Vec::new(),
        }
    }

    /// Builder-style body append.
    pub fn with_stmt(mut self, stmt: Node) -> Self {
        self.body.push(stmt);
        self
    }

    /// The body statement when there is exactly one.
    pub fn single_stmt(&self) -> Option<&Node> {
        match self.body.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn single_stmt_mut(&mut self) -> Option<&mut Node> {
        match self.body.as_mut_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

impl Node {
    /// Int32 constant.
    pub fn int(value: i32) -> Node {
        Node::Const(Literal::I32(value))
    }

    pub fn constant(value: Literal) -> Node {
        Node::Const(value)
    }

    pub fn var(name: impl Into<String>) -> Node {
        Node::Variable(name.into())
    }

    pub fn scalar(name: impl Into<String>) -> Node {
        Node::ScalarRef(name.into())
    }

    pub fn add(lhs: Node, rhs: Node) -> Node {
        Node::Add { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn mul(lhs: Node, rhs: Node) -> Node {
        Node::Mul { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn min(lhs: Node, rhs: Node) -> Node {
        Node::Min { lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// Tensor read; fails if the index count does not match the tensor.
    pub fn load(tensor: &TensorRef, indices: Vec<Node>) -> Result<Node, IrError> {
        Ok(Node::Load(Access::new(tensor, indices)?))
    }

    /// Tensor write target; fails if the index count does not match the tensor.
    pub fn store(tensor: &TensorRef, indices: Vec<Node>) -> Result<Node, IrError> {
        Ok(Node::Store(Access::new(tensor, indices)?))
    }

    pub fn assign(target: Node, value: Node) -> Result<Node, IrError> {
        Ok(Node::Assign(Assign::new(target, value)?))
    }

    /// A loop node with the given body.
    pub fn for_loop(
        index: impl Into<String>,
        lower: Node,
        upper: Node,
        step: Node,
        body: Vec<Node>,
    ) -> Node {
        let mut lp = Loop::new(index, lower, upper, step);
        lp.body = body;
        Node::Loop(lp)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Const(_) => NodeKind::Const,
            Node::Variable(_) => NodeKind::Variable,
            Node::ScalarRef(_) => NodeKind::ScalarRef,
            Node::Add { .. } => NodeKind::Add,
            Node::Mul { .. } => NodeKind::Mul,
            Node::Min { .. } => NodeKind::Min,
            Node::Load(_) => NodeKind::Load,
            Node::Store(_) => NodeKind::Store,
            Node::Assign(_) => NodeKind::Assign,
            Node::Loop(_) => NodeKind::Loop,
        }
    }

    /// Trees handed to passes and emitters are rooted at a Loop or an Assign.
    pub fn is_valid_root(&self) -> bool {
        matches!(self, Node::Loop(_) | Node::Assign(_))
    }

    pub fn as_loop(&self) -> Option<&Loop> {
        match self {
            Node::Loop(lp) => Some(lp),
            _ => None,
        }
    }

    pub fn as_loop_mut(&mut self) -> Option<&mut Loop> {
        match self {
            Node::Loop(lp) => Some(lp),
            _ => None,
        }
    }

    pub fn as_assign(&self) -> Option<&Assign> {
        match self {
            Node::Assign(a) => Some(a),
            _ => None,
        }
    }

    /// The access payload of a Load or Store.
    pub fn as_access(&self) -> Option<&Access> {
        match self {
            Node::Load(acc) | Node::Store(acc) => Some(acc),
            _ => None,
        }
    }

    /// The two operands of Add, Mul or Min.
    pub fn operands(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Add { lhs, rhs } | Node::Mul { lhs, rhs } | Node::Min { lhs, rhs } => {
                Some((lhs, rhs))
            }
            _ => None,
        }
    }

    /// The name carried by a Variable or ScalarRef.
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Variable(name) | Node::ScalarRef(name) => Some(name),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<Literal> {
        match self {
            Node::Const(lit) => Some(*lit),
            _ => None,
        }
    }

    /// Direct children in evaluation order: operands, indices,
    /// target then value, or lower/upper/step then body.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Const(_) | Node::Variable(_) | Node::ScalarRef(_) => Vec::new(),
            Node::Add { lhs, rhs } | Node::Mul { lhs, rhs } | Node::Min { lhs, rhs } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            Node::Load(acc) | Node::Store(acc) => acc.indices.iter().collect(),
            Node::Assign(a) => vec![a.target.as_ref(), a.value.as_ref()],
            Node::Loop(lp) => {
                let mut out = vec![lp.lower.as_ref(), lp.upper.as_ref(), lp.step.as_ref()];
                out.extend(lp.body.iter());
                out
            }
        }
    }

    /// Total number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Node::size).sum::<usize>()
    }
}

fn write_access(f: &mut fmt::Formatter<'_>, acc: &Access) -> fmt::Result {
    write!(f, "{}[", acc.tensor.name())?;
    for (i, idx) in acc.indices.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", idx)?;
    }
    write!(f, "]")
}

/// Inline form: `(a + b)`, `MIN(a, b)`, `C[i, j] = ...`,
/// `for i = lb to ub step s { ... }`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Const(lit) => write!(f, "{}", lit),
            Node::Variable(name) | Node::ScalarRef(name) => write!(f, "{}", name),
            Node::Add { lhs, rhs } => write!(f, "({} + {})", lhs, rhs),
            Node::Mul { lhs, rhs } => write!(f, "({} * {})", lhs, rhs),
            Node::Min { lhs, rhs } => write!(f, "MIN({}, {})", lhs, rhs),
            Node::Load(acc) | Node::Store(acc) => write_access(f, acc),
            Node::Assign(a) => write!(f, "{} = {}", a.target, a.value),
            Node::Loop(lp) => {
                write!(f, "for {} = {} to {} step {} {{ ", lp.index, lp.lower, lp.upper, lp.step)?;
                for stmt in &lp.body {
                    write!(f, "{}; ", stmt)?;
                }
                write!(f, "}}")
            }
        }
    }
}
