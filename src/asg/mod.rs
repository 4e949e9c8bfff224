//! ASG: the abstract semantic graph the `graph` API builds and executes.
//!
//! Nodes are pure descriptions. Building a [`crate::tensor::Tensor`] expression
//! only appends nodes here; a backend evaluates them later.

use ndarray::{arr0, ArrayD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type NodeId = usize;
pub type AsgId = usize;
pub type Shape = Vec<usize>;

pub type AsgResult<T> = std::result::Result<T, AsgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsgError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
    #[error("Graph {0} not found")]
    AsgNotFound(AsgId),
    #[error("External node does not point at a known graph")]
    InvalidExternalReference,
    #[error("Node {0} has no valid shape")]
    InvalidShape(NodeId),
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum DType {
    F32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: Option<String>,
    pub node_type: NodeType,
    pub shape: Option<Shape>,
    pub dtype: Option<DType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    // Data
    Input { name: String },
    Parameter { name: String },
    Literal(Value),
    /// A value computed by another graph (the forward graph, seen from a
    /// gradient graph).
    External { name: String, source_asg_id: AsgId, source_node_id: NodeId },

    // Binary, with numpy broadcasting
    Add(NodeId, NodeId),
    Subtract(NodeId, NodeId),
    Multiply(NodeId, NodeId),
    Divide(NodeId, NodeId),
    Power(NodeId, NodeId),
    /// 1.0 where `a > b`, else 0.0.
    GreaterThan(NodeId, NodeId),

    // Unary
    Negate(NodeId),
    Exp(NodeId),
    Log(NodeId),
    Sqrt(NodeId),
    Abs(NodeId),
    Sign(NodeId),
    Sin(NodeId),
    Cos(NodeId),
    Tan(NodeId),
    Atan(NodeId),
    Asinh(NodeId),
    Sinh(NodeId),
    Cosh(NodeId),
    Tanh(NodeId),
    Erf(NodeId),
    Sigmoid(NodeId),
    Softsign(NodeId),
    ReLU(NodeId),
    LambertW(NodeId),
    Softplus(NodeId, f32),
    ELU(NodeId, f32),
    Clamp(NodeId, f32, f32),

    // Jacobi cn(u | m) and its partials
    JacobiCn(NodeId, NodeId),
    JacobiCnGradU(NodeId, NodeId),
    JacobiCnGradM(NodeId, NodeId),
    /// `a^b · ln a`, 0 where `a <= 0`. Appears in the gradient of `Power`.
    PowerLog(NodeId, NodeId),
    /// `g · s`, 0 where either factor is 0. The chain-rule product in gradient graphs.
    Chain(NodeId, NodeId),

    // Reductions over every element, producing a scalar
    Sum(NodeId),
    Mean(NodeId),

    // Shape plumbing; the second operand only supplies the target shape.
    Broadcast(NodeId, NodeId),
    ReduceSumTo(NodeId, NodeId),
}

impl NodeType {
    /// The operand node ids, in order.
    pub fn inputs(&self) -> Vec<NodeId> {
        use NodeType::*;
        match *self {
            Input { .. } | Parameter { .. } | Literal(_) | External { .. } => vec![],
            Add(a, b)
            | Subtract(a, b)
            | Multiply(a, b)
            | Divide(a, b)
            | Power(a, b)
            | GreaterThan(a, b)
            | JacobiCn(a, b)
            | JacobiCnGradU(a, b)
            | JacobiCnGradM(a, b)
            | PowerLog(a, b)
            | Chain(a, b)
            | Broadcast(a, b)
            | ReduceSumTo(a, b) => vec![a, b],
            Negate(a) | Exp(a) | Log(a) | Sqrt(a) | Abs(a) | Sign(a) | Sin(a) | Cos(a)
            | Tan(a) | Atan(a) | Asinh(a) | Sinh(a) | Cosh(a) | Tanh(a) | Erf(a)
            | Sigmoid(a) | Softsign(a) | ReLU(a) | LambertW(a) | Softplus(a, _) | ELU(a, _)
            | Clamp(a, _, _) | Sum(a) | Mean(a) => vec![a],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Tensor(ArrayD<f32>),
    ScalarF32(f32),
}

impl Value {
    /// The value as an array; scalars become 0-d arrays.
    pub fn into_array(self) -> ArrayD<f32> {
        match self {
            Value::Tensor(arr) => arr,
            Value::ScalarF32(v) => arr0(v).into_dyn(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Tensor(arr) => arr.shape().to_vec(),
            Value::ScalarF32(_) => vec![],
        }
    }

    /// The only element of a one-element value, of any rank.
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Value::Tensor(arr) if arr.len() == 1 => arr.iter().next().copied(),
            Value::Tensor(_) => None,
            Value::ScalarF32(v) => Some(*v),
        }
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Tensor(arr) => arr.iter().all(|v| v.is_finite()),
            Value::ScalarF32(v) => v.is_finite(),
        }
    }
}

impl From<ArrayD<f32>> for Value {
    fn from(arr: ArrayD<f32>) -> Self {
        Value::Tensor(arr)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::ScalarF32(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asg {
    pub id: AsgId,
    pub name: Option<String>,
    pub nodes: HashMap<NodeId, Node>,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

impl Asg {
    pub fn new(id: AsgId, name: Option<String>) -> Self {
        Self { id, name, nodes: HashMap::new(), inputs: vec![], outputs: vec![] }
    }

    pub fn add_node(&mut self, name: Option<String>, node_type: NodeType) -> NodeId {
        let new_id = self.nodes.len();
        let mut node = Node { id: new_id, name, node_type, shape: None, dtype: None };

        // Literals carry their own shape so inference never has to ask for it.
        if let NodeType::Literal(value) = &node.node_type {
            node.shape = Some(value.shape());
            node.dtype = Some(DType::F32);
        }

        self.nodes.insert(new_id, node);
        new_id
    }

    pub fn set_outputs(&mut self, outputs: Vec<NodeId>) {
        self.outputs = outputs;
    }

    pub fn set_output(&mut self, output: NodeId) {
        self.set_outputs(vec![output]);
    }

    pub fn get_node(&self, id: NodeId) -> AsgResult<&Node> {
        self.nodes.get(&id).ok_or(AsgError::NodeNotFound(id))
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> AsgResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(AsgError::NodeNotFound(id))
    }

    /// Id of the `Input` or `Parameter` node registered under `name`.
    pub fn find_named(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find_map(|node| match &node.node_type {
            NodeType::Input { name: n } | NodeType::Parameter { name: n } if n == name => {
                Some(node.id)
            }
            _ => None,
        })
    }

    /// Names of every `Parameter` node, sorted by node id.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut params: Vec<(NodeId, String)> = self
            .nodes
            .values()
            .filter_map(|node| match &node.node_type {
                NodeType::Parameter { name } => Some((node.id, name.clone())),
                _ => None,
            })
            .collect();
        params.sort_by_key(|(id, _)| *id);
        params.into_iter().map(|(_, name)| name).collect()
    }
}
