//! CPU backend.
//!
//! Walks the ASG and evaluates every node with `ndarray`. Binary operators
//! broadcast numpy-style; scalars are treated as 0-d arrays.

use super::backend::{Backend, Memo, RuntimeError};
use crate::analysis::shape_inference::{broadcast_shape, ShapeInference};
use crate::asg::{Asg, AsgId, NodeId, NodeType, Value};
use crate::special;
use ndarray::{arr0, ArrayD, Axis, IxDyn, Zip};
use std::collections::HashMap;

/// Execution state for one run: the graph and the shared memo.
struct ExecutionContext<'a> {
    graphs: HashMap<AsgId, &'a Asg>,
    memo: Memo<Value>,
}

impl<'a> ExecutionContext<'a> {
    fn new(main_asg: &'a Asg, initial_memo: Memo<Value>) -> Self {
        let mut graphs = HashMap::new();
        graphs.insert(main_asg.id, main_asg);
        Self { graphs, memo: initial_memo }
    }

    /// Computes (or fetches from the memo) the value of one node.
    fn evaluate_node(&mut self, asg_id: AsgId, node_id: NodeId) -> Result<Value, RuntimeError> {
        if let Some(value) = self.memo.get(&(asg_id, node_id)) {
            return Ok(value.clone());
        }

        let asg = *self.graphs.get(&asg_id).ok_or(RuntimeError::GraphNotFound(asg_id))?;
        let node = asg.nodes.get(&node_id).ok_or(RuntimeError::NodeNotFound(node_id, asg_id))?;

        let result = match &node.node_type {
            NodeType::Input { name } => {
                return Err(RuntimeError::MissingInput(name.clone(), node.id));
            }
            NodeType::Parameter { name } => {
                return Err(RuntimeError::MissingParameter(name.clone(), node.id));
            }
            NodeType::Literal(value) => Ok(value.clone()),
            NodeType::External { name, source_asg_id, source_node_id } => self
                .memo
                .get(&(*source_asg_id, *source_node_id))
                .cloned()
                .ok_or_else(|| RuntimeError::MissingExternal(name.clone())),

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
                let lhs = self.evaluate_node(asg_id, *l)?;
                let rhs = self.evaluate_node(asg_id, *r)?;
                let f: fn(f32, f32) -> f32 = match &node.node_type {
                    NodeType::Add(..) => |a, b| a + b,
                    NodeType::Subtract(..) => |a, b| a - b,
                    NodeType::Multiply(..) => |a, b| a * b,
                    NodeType::Divide(..) => |a, b| a / b,
                    NodeType::Power(..) => f32::powf,
                    NodeType::GreaterThan(..) => |a, b| if a > b { 1.0 } else { 0.0 },
                    NodeType::JacobiCn(..) => special::ellipj_cn,
                    NodeType::JacobiCnGradU(..) => special::ellipj_cn_grad_u,
                    NodeType::JacobiCnGradM(..) => special::ellipj_cn_grad_m,
                    NodeType::Chain(..) => chain,
                    _ => power_log,
                };
                op_binary(lhs, rhs, f)
            }

            NodeType::Broadcast(source, target) => {
                let source = self.evaluate_node(asg_id, *source)?;
                let target = self.evaluate_node(asg_id, *target)?;
                op_broadcast(source, target)
            }
            NodeType::ReduceSumTo(source, target) => {
                let source = self.evaluate_node(asg_id, *source)?;
                let target = self.evaluate_node(asg_id, *target)?;
                op_reduce_sum_to(source, target)
            }

            NodeType::Sum(op) => {
                let operand = self.evaluate_node(asg_id, *op)?.into_array();
                Ok(Value::Tensor(arr0(operand.sum()).into_dyn()))
            }
            NodeType::Mean(op) => {
                let operand = self.evaluate_node(asg_id, *op)?.into_array();
                let mean = operand.mean().unwrap_or(0.0);
                Ok(Value::Tensor(arr0(mean).into_dyn()))
            }

            NodeType::Softplus(op, beta) => {
                let beta = *beta;
                let operand = self.evaluate_node(asg_id, *op)?;
                Ok(op_unary(operand, |x| special::softplus(x, beta)))
            }
            NodeType::ELU(op, alpha) => {
                let alpha = *alpha;
                let operand = self.evaluate_node(asg_id, *op)?;
                Ok(op_unary(operand, |x| special::elu(x, alpha)))
            }
            NodeType::Clamp(op, min, max) => {
                let (min, max) = (*min, *max);
                let operand = self.evaluate_node(asg_id, *op)?;
                Ok(op_unary(operand, |x| x.max(min).min(max)))
            }

            NodeType::Negate(op)
            | NodeType::Exp(op)
            | NodeType::Log(op)
            | NodeType::Sqrt(op)
            | NodeType::Abs(op)
            | NodeType::Sign(op)
            | NodeType::Sin(op)
            | NodeType::Cos(op)
            | NodeType::Tan(op)
            | NodeType::Atan(op)
            | NodeType::Asinh(op)
            | NodeType::Sinh(op)
            | NodeType::Cosh(op)
            | NodeType::Tanh(op)
            | NodeType::Erf(op)
            | NodeType::Sigmoid(op)
            | NodeType::Softsign(op)
            | NodeType::ReLU(op)
            | NodeType::LambertW(op) => {
                let operand = self.evaluate_node(asg_id, *op)?;
                let f: fn(f32) -> f32 = match &node.node_type {
                    NodeType::Negate(_) => |x| -x,
                    NodeType::Exp(_) => f32::exp,
                    NodeType::Log(_) => f32::ln,
                    NodeType::Sqrt(_) => f32::sqrt,
                    NodeType::Abs(_) => f32::abs,
                    NodeType::Sign(_) => special::sign,
                    NodeType::Sin(_) => f32::sin,
                    NodeType::Cos(_) => f32::cos,
                    NodeType::Tan(_) => f32::tan,
                    NodeType::Atan(_) => f32::atan,
                    NodeType::Asinh(_) => f32::asinh,
                    NodeType::Sinh(_) => f32::sinh,
                    NodeType::Cosh(_) => f32::cosh,
                    NodeType::Tanh(_) => f32::tanh,
                    NodeType::Erf(_) => special::erf,
                    NodeType::Sigmoid(_) => special::sigmoid,
                    NodeType::Softsign(_) => |x| x / (1.0 + x.abs()),
                    NodeType::ReLU(_) => |x| x.max(0.0),
                    _ => special::lambert_w,
                };
                Ok(op_unary(operand, f))
            }
        }?;

        self.memo.insert((asg_id, node_id), result.clone());
        Ok(result)
    }
}

/// Reference backend: evaluates every node on the host with `ndarray`.
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    type DeviceData = Value;

    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError> {
        Ok(data.clone())
    }

    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError> {
        let sorted_nodes = ShapeInference::topological_sort(main_asg)
            .map_err(|e| RuntimeError::ShapeError(format!("Topological sort failed: {e}")))?;
        tracing::trace!(asg_id = main_asg.id, nodes = sorted_nodes.len(), "cpu run");

        let mut context = ExecutionContext::new(main_asg, initial_memo);
        for node_id in sorted_nodes {
            context.evaluate_node(main_asg.id, node_id)?;
        }

        let mut results = Vec::with_capacity(main_asg.outputs.len());
        for output_node_id in &main_asg.outputs {
            let result = context
                .memo
                .get(&(main_asg.id, *output_node_id))
                .ok_or(RuntimeError::NodeNotFound(*output_node_id, main_asg.id))?
                .clone();
            results.push(result);
        }
        Ok((results, context.memo))
    }

    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError> {
        Ok(device_data.to_vec())
    }
}

/// `a^b · ln a`, 0 for `a <= 0` (the limit as `a -> 0+` when `b > 0`).
fn power_log(a: f32, b: f32) -> f32 {
    if a > 0.0 {
        a.powf(b) * a.ln()
    } else {
        0.0
    }
}

/// `g * s` with `0 * inf = 0`: a zero upstream or a zero local slope wins.
fn chain(g: f32, s: f32) -> f32 {
    if g == 0.0 || s == 0.0 {
        0.0
    } else {
        g * s
    }
}

fn op_unary(operand: Value, f: impl Fn(f32) -> f32) -> Value {
    Value::Tensor(operand.into_array().mapv(f))
}

fn op_binary(lhs: Value, rhs: Value, f: impl Fn(f32, f32) -> f32) -> Result<Value, RuntimeError> {
    let a = lhs.into_array();
    let b = rhs.into_array();
    let shape = broadcast_shape(a.shape(), b.shape()).ok_or_else(|| {
        RuntimeError::ShapeError(format!("cannot broadcast {:?} with {:?}", a.shape(), b.shape()))
    })?;
    let a = broadcast_view(&a, &shape)?;
    let b = broadcast_view(&b, &shape)?;
    Ok(Value::Tensor(Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y))))
}

fn broadcast_view<'a>(
    arr: &'a ArrayD<f32>,
    shape: &[usize],
) -> Result<ndarray::ArrayViewD<'a, f32>, RuntimeError> {
    arr.broadcast(IxDyn(shape)).ok_or_else(|| {
        RuntimeError::ShapeError(format!("cannot broadcast {:?} to {:?}", arr.shape(), shape))
    })
}

fn op_broadcast(source: Value, target: Value) -> Result<Value, RuntimeError> {
    let source = source.into_array();
    let target_shape = target.shape();
    Ok(Value::Tensor(broadcast_view(&source, &target_shape)?.to_owned()))
}

/// Sums `source` down to the shape of `target`: leading extra axes are summed
/// away, then every axis where the target has size 1.
fn op_reduce_sum_to(source: Value, target: Value) -> Result<Value, RuntimeError> {
    let mut out = source.into_array();
    let target_shape = target.shape();

    while out.ndim() > target_shape.len() {
        out = out.sum_axis(Axis(0));
    }
    if out.ndim() == target_shape.len() {
        for (axis, &dim) in target_shape.iter().enumerate() {
            if dim == 1 && out.shape()[axis] != 1 {
                out = out.sum_axis(Axis(axis)).insert_axis(Axis(axis));
            }
        }
    }

    Ok(Value::Tensor(broadcast_view(&out, &target_shape)?.to_owned()))
}
