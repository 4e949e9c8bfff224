//! Shape and dtype inference.
//!
//! Walks the graph in topological order and fills in the `shape` and `dtype`
//! of every node reachable from the outputs. Binary operators follow numpy
//! broadcasting; reductions produce a scalar.

use crate::asg::{Asg, AsgError, DType, Node, NodeId, NodeType, Shape};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeInferenceError {
    #[error("Graph error: {0}")]
    AsgError(#[from] AsgError),

    #[error("Shape information missing for node {0}. \
             The node has not been processed yet or the graph contains a cycle.")]
    MissingShapeInfo(NodeId),

    #[error("Initial shape not specified for '{0}'. \
             Add it to the initial_shapes map passed to ShapeInference::run().")]
    MissingInitialShape(String),

    #[error("Broadcast error in '{op}': cannot broadcast {left:?} with {right:?}.")]
    BroadcastError { op: String, left: Shape, right: Shape },
}

type Result<T> = std::result::Result<T, ShapeInferenceError>;

/// Common shape of two operands under numpy broadcasting, or `None` when a
/// pair of trailing dimensions differs and neither is 1.
pub fn broadcast_shape(left: &[usize], right: &[usize]) -> Option<Shape> {
    let rank = left.len().max(right.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let l = if i < rank - left.len() { 1 } else { left[i - (rank - left.len())] };
        let r = if i < rank - right.len() { 1 } else { right[i - (rank - right.len())] };
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return None,
        };
    }
    Some(out)
}

pub struct ShapeInference;

impl ShapeInference {
    /// Fills in `shape` and `dtype` for every node reachable from the outputs.
    ///
    /// `initial_shapes` must provide every `Input` and `Parameter` by name.
    /// `External` nodes keep the shape copied from their source graph and only
    /// fall back to the map when they have none.
    pub fn run(asg: &mut Asg, initial_shapes: &HashMap<String, (Shape, DType)>) -> Result<()> {
        let sorted_nodes = Self::topological_sort(asg)?;

        for node_id in sorted_nodes {
            let node = asg.get_node(node_id)?;
            let (shape, dtype) = Self::infer_node_shape(asg, node, initial_shapes)?;

            let node = asg.get_node_mut(node_id)?;
            node.shape = Some(shape);
            node.dtype = Some(dtype);
        }

        tracing::debug!(asg_id = asg.id, nodes = asg.nodes.len(), "shape inference done");
        Ok(())
    }

    fn infer_node_shape(
        asg: &Asg,
        node: &Node,
        initial_shapes: &HashMap<String, (Shape, DType)>,
    ) -> Result<(Shape, DType)> {
        match &node.node_type {
            NodeType::Input { name } | NodeType::Parameter { name } => initial_shapes
                .get(name)
                .cloned()
                .ok_or_else(|| ShapeInferenceError::MissingInitialShape(name.clone())),

            NodeType::External { name, .. } => match (&node.shape, node.dtype) {
                (Some(shape), Some(dtype)) => Ok((shape.clone(), dtype)),
                _ => initial_shapes
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ShapeInferenceError::MissingInitialShape(name.clone())),
            },

            NodeType::Literal(value) => Ok((value.shape(), DType::F32)),

            NodeType::Add(l, r)
            | NodeType::Subtract(l, r)
            | NodeType::Multiply(l, r)
            | NodeType::Divide(l, r)
            | NodeType::Power(l, r)
            | NodeType::GreaterThan(l, r)
            | NodeType::JacobiCn(l, r)
            | NodeType::JacobiCnGradU(l, r)
            | NodeType::JacobiCnGradM(l, r)
            | NodeType::PowerLog(l, r)
            | NodeType::Chain(l, r) => {
                let (ls, dtype) = Self::get_shape_dtype(asg, *l)?;
                let (rs, _) = Self::get_shape_dtype(asg, *r)?;
                let out = broadcast_shape(&ls, &rs).ok_or_else(|| {
                    ShapeInferenceError::BroadcastError {
                        op: op_name(&node.node_type),
                        left: ls.clone(),
                        right: rs.clone(),
                    }
                })?;
                Ok((out, dtype))
            }

            NodeType::Negate(id)
            | NodeType::Exp(id)
            | NodeType::Log(id)
            | NodeType::Sqrt(id)
            | NodeType::Abs(id)
            | NodeType::Sign(id)
            | NodeType::Sin(id)
            | NodeType::Cos(id)
            | NodeType::Tan(id)
            | NodeType::Atan(id)
            | NodeType::Asinh(id)
            | NodeType::Sinh(id)
            | NodeType::Cosh(id)
            | NodeType::Tanh(id)
            | NodeType::Erf(id)
            | NodeType::Sigmoid(id)
            | NodeType::Softsign(id)
            | NodeType::ReLU(id)
            | NodeType::LambertW(id)
            | NodeType::Softplus(id, _)
            | NodeType::ELU(id, _)
            | NodeType::Clamp(id, _, _) => Self::get_shape_dtype(asg, *id),

            NodeType::Sum(id) | NodeType::Mean(id) => {
                let (_, dtype) = Self::get_shape_dtype(asg, *id)?;
                Ok((vec![], dtype))
            }

            NodeType::Broadcast(source, target) => {
                let (ss, dtype) = Self::get_shape_dtype(asg, *source)?;
                let (ts, _) = Self::get_shape_dtype(asg, *target)?;
                match broadcast_shape(&ss, &ts) {
                    Some(out) if out == ts => Ok((ts, dtype)),
                    _ => Err(ShapeInferenceError::BroadcastError {
                        op: "Broadcast".to_string(),
                        left: ss,
                        right: ts,
                    }),
                }
            }

            NodeType::ReduceSumTo(source, target) => {
                let (ss, dtype) = Self::get_shape_dtype(asg, *source)?;
                let (ts, _) = Self::get_shape_dtype(asg, *target)?;
                match broadcast_shape(&ts, &ss) {
                    Some(out) if out == ss => Ok((ts, dtype)),
                    _ => Err(ShapeInferenceError::BroadcastError {
                        op: "ReduceSumTo".to_string(),
                        left: ss,
                        right: ts,
                    }),
                }
            }
        }
    }

    fn get_shape_dtype(asg: &Asg, node_id: NodeId) -> Result<(Shape, DType)> {
        let node = asg.get_node(node_id)?;
        match (&node.shape, &node.dtype) {
            (Some(s), Some(d)) => Ok((s.clone(), *d)),
            _ => Err(ShapeInferenceError::MissingShapeInfo(node_id)),
        }
    }

    /// Node ids reachable from the outputs, operands before their users.
    pub fn topological_sort(asg: &Asg) -> Result<Vec<NodeId>> {
        let mut sorted = Vec::new();
        let mut visited = HashSet::new();
        for output_id in &asg.outputs {
            Self::build_sorted_graph(*output_id, asg, &mut visited, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn build_sorted_graph(
        node_id: NodeId,
        asg: &Asg,
        visited: &mut HashSet<NodeId>,
        sorted: &mut Vec<NodeId>,
    ) -> Result<()> {
        if visited.contains(&node_id) {
            return Ok(());
        }

        let node = asg.get_node(node_id)?;
        for input_id in node.node_type.inputs() {
            Self::build_sorted_graph(input_id, asg, visited, sorted)?;
        }

        if visited.insert(node_id) {
            sorted.push(node_id);
        }
        Ok(())
    }
}

fn op_name(node_type: &NodeType) -> String {
    let debug = format!("{:?}", node_type);
    debug.split('(').next().unwrap_or_default().to_string()
}
