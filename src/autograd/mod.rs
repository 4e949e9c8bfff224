//! Reverse-mode autograd: builds a gradient graph `d(loss)/d(node)`.
//!
//! The gradient graph is a separate ASG with id `forward.id + 1`. It reads
//! forward values through `External` nodes named `external_{asg}_{node}`, so
//! it has to be run with the memo produced by running the forward graph.
//!
//! Algorithm:
//!  - walk the forward graph in reverse topological order from the loss;
//!  - for every node holding an upstream gradient, add its contribution to
//!    each operand that leads back to a requested node, summing contributions;
//!  - broadcast operands get their contribution summed back to their own shape
//!    with `ReduceSumTo`.
//!
//! Upstream gradients meet local slopes through `Chain`, which treats
//! `0 * inf` as 0 so an infinite slope behind a zero one (`|x|^b` at 0 with
//! `b < 1`) contributes nothing.
//!
//! The seed is the scalar 1.0. A non-scalar loss is treated as its sum.
//! Nodes that only appear inside gradient graphs (`PowerLog`, `JacobiCnGrad*`, `Chain`)
//! and the step functions (`Sign`, `GreaterThan`) pass no gradient.

use crate::analysis::shape_inference::{ShapeInference, ShapeInferenceError};
use crate::asg::{Asg, AsgError, DType, NodeId, NodeType, Shape, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutogradError {
    #[error("ASG: {0}")]
    Asg(#[from] AsgError),
    #[error("Shape: {0}")]
    Shape(#[from] ShapeInferenceError),
    #[error("Node {0} has no inferred shape; run shape inference on the forward graph first")]
    MissingShape(NodeId),
}

pub type AutogradResult<T> = Result<T, AutogradError>;

/// Gradient graph builder for one forward graph.
pub struct Gradients {
    forward: Asg,
}

impl Gradients {
    /// `forward` must already carry shapes (see [`ShapeInference::run`]).
    pub fn new(forward: Asg) -> Self {
        Self { forward }
    }

    /// Builds the graph of `d(loss)/d(w)` for every `w` in `wrt`.
    ///
    /// The returned graph has one output per entry of `wrt`, in order, each
    /// with the shape of that node.
    pub fn build(&self, loss: NodeId, wrt: &[NodeId]) -> AutogradResult<Asg> {
        let mut builder = Builder::new(&self.forward, wrt)?;
        builder.run(loss)?;

        let mut outputs = Vec::with_capacity(wrt.len());
        for &w in wrt {
            let g = match builder.gmap.get(&w).copied() {
                Some(g) => g,
                None => {
                    let zero = builder.lit_scalar(0.0);
                    let target = builder.ext(w)?;
                    builder.add_node(NodeType::Broadcast(zero, target))
                }
            };
            if let NodeType::Input { name } | NodeType::Parameter { name } =
                &self.forward.get_node(w)?.node_type
            {
                builder.grad.get_node_mut(g)?.name = Some(format!("grad_{name}"));
            }
            outputs.push(g);
        }
        builder.grad.set_outputs(outputs);

        tracing::debug!(
            forward_nodes = self.forward.nodes.len(),
            grad_nodes = builder.grad.nodes.len(),
            wrt = wrt.len(),
            "built gradient graph"
        );
        Ok(builder.grad)
    }

    /// [`Gradients::build`] followed by shape inference on the result.
    pub fn build_and_infer(&self, loss: NodeId, wrt: &[NodeId]) -> AutogradResult<Asg> {
        let mut grad = self.build(loss, wrt)?;
        let initial_shapes: HashMap<String, (Shape, DType)> = HashMap::new();
        ShapeInference::run(&mut grad, &initial_shapes)?;
        Ok(grad)
    }
}

struct Builder<'a> {
    src: &'a Asg,
    grad: Asg,
    /// forward node -> accumulated gradient node in `grad`
    gmap: HashMap<NodeId, NodeId>,
    /// forward node -> `External` node mirroring it in `grad`
    externals: HashMap<NodeId, NodeId>,
    /// Forward nodes that depend on something in `wrt`.
    requires: HashSet<NodeId>,
}

impl<'a> Builder<'a> {
    fn new(src: &'a Asg, wrt: &[NodeId]) -> AutogradResult<Self> {
        for &w in wrt {
            src.get_node(w)?;
        }
        Ok(Self {
            src,
            grad: Asg::new(src.id + 1, Some("grad".to_string())),
            gmap: HashMap::new(),
            externals: HashMap::new(),
            requires: wrt.iter().copied().collect(),
        })
    }

    fn run(&mut self, loss: NodeId) -> AutogradResult<()> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.collect(loss, &mut visited, &mut order)?;

        for &id in &order {
            let node = self.src.get_node(id)?;
            if node.node_type.inputs().iter().any(|i| self.requires.contains(i)) {
                self.requires.insert(id);
            }
        }
        if !self.requires.contains(&loss) {
            return Ok(());
        }

        let seed = self.lit_scalar(1.0);
        let seed = if self.shape_of(loss)?.is_empty() {
            seed
        } else {
            let target = self.ext(loss)?;
            self.add_node(NodeType::Broadcast(seed, target))
        };
        self.gmap.insert(loss, seed);

        for &id in order.iter().rev() {
            let g = match self.gmap.get(&id).copied() {
                Some(g) => g,
                None => continue,
            };
            let src = self.src;
            self.backward(id, &src.get_node(id)?.node_type, g)?;
        }
        Ok(())
    }

    fn collect(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> AutogradResult<()> {
        if !visited.insert(id) {
            return Ok(());
        }
        for input in self.src.get_node(id)?.node_type.inputs() {
            self.collect(input, visited, order)?;
        }
        order.push(id);
        Ok(())
    }

    /// Adds the contributions of `d(loss)/d(id) = g` to the operands of `id`.
    fn backward(&mut self, id: NodeId, node_type: &NodeType, g: NodeId) -> AutogradResult<()> {
        use NodeType::*;
        match *node_type {
            Input { .. } | Parameter { .. } | Literal(_) | External { .. } => {}

            Sign(_) | GreaterThan(_, _) | PowerLog(_, _) | JacobiCnGradU(_, _)
            | JacobiCnGradM(_, _) | Chain(_, _) => {}

            Add(a, b) => {
                if self.wants(a) {
                    self.acc_reduced(id, a, g)?;
                }
                if self.wants(b) {
                    self.acc_reduced(id, b, g)?;
                }
            }
            Subtract(a, b) => {
                if self.wants(a) {
                    self.acc_reduced(id, a, g)?;
                }
                if self.wants(b) {
                    let neg = self.add_node(Negate(g));
                    self.acc_reduced(id, b, neg)?;
                }
            }
            Multiply(a, b) => {
                if self.wants(a) {
                    let b_val = self.ext(b)?;
                    let g_a = self.add_node(Chain(g, b_val));
                    self.acc_reduced(id, a, g_a)?;
                }
                if self.wants(b) {
                    let a_val = self.ext(a)?;
                    let g_b = self.add_node(Chain(g, a_val));
                    self.acc_reduced(id, b, g_b)?;
                }
            }
            Divide(a, b) => {
                let b_val = self.ext(b)?;
                if self.wants(a) {
                    let g_a = self.add_node(Divide(g, b_val));
                    self.acc_reduced(id, a, g_a)?;
                }
                if self.wants(b) {
                    // -g * y / b
                    let y = self.ext(id)?;
                    let gy = self.add_node(Chain(g, y));
                    let q = self.add_node(Divide(gy, b_val));
                    let g_b = self.add_node(Negate(q));
                    self.acc_reduced(id, b, g_b)?;
                }
            }
            Power(a, b) => {
                let a_val = self.ext(a)?;
                let b_val = self.ext(b)?;
                if self.wants(a) {
                    // g * b * a^(b-1)
                    let one = self.lit_scalar(1.0);
                    let b_minus_one = self.add_node(Subtract(b_val, one));
                    let a_pow = self.add_node(Power(a_val, b_minus_one));
                    let slope = self.add_node(Chain(b_val, a_pow));
                    let g_a = self.add_node(Chain(g, slope));
                    self.acc_reduced(id, a, g_a)?;
                }
                if self.wants(b) {
                    // g * a^b * ln a
                    let slope = self.add_node(PowerLog(a_val, b_val));
                    let g_b = self.add_node(Chain(g, slope));
                    self.acc_reduced(id, b, g_b)?;
                }
            }
            JacobiCn(u, m) => {
                let u_val = self.ext(u)?;
                let m_val = self.ext(m)?;
                if self.wants(u) {
                    let slope = self.add_node(JacobiCnGradU(u_val, m_val));
                    let g_u = self.add_node(Chain(g, slope));
                    self.acc_reduced(id, u, g_u)?;
                }
                if self.wants(m) {
                    let slope = self.add_node(JacobiCnGradM(u_val, m_val));
                    let g_m = self.add_node(Chain(g, slope));
                    self.acc_reduced(id, m, g_m)?;
                }
            }

            Negate(x) => self.unary(x, |b, g| Ok(b.add_node(Negate(g))), g)?,
            Exp(x) => {
                let y = self.ext(id)?;
                self.unary(x, |b, g| Ok(b.add_node(Chain(g, y))), g)?
            }
            Log(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    Ok(b.add_node(Divide(g, xv)))
                },
                g,
            )?,
            Sqrt(x) => {
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let two = b.lit_scalar(2.0);
                        let denom = b.add_node(Multiply(two, y));
                        Ok(b.add_node(Divide(g, denom)))
                    },
                    g,
                )?
            }
            Abs(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let sign = b.add_node(Sign(xv));
                    Ok(b.add_node(Chain(g, sign)))
                },
                g,
            )?,
            Sin(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let cos = b.add_node(Cos(xv));
                    Ok(b.add_node(Chain(g, cos)))
                },
                g,
            )?,
            Cos(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let sin = b.add_node(Sin(xv));
                    let prod = b.add_node(Chain(g, sin));
                    Ok(b.add_node(Negate(prod)))
                },
                g,
            )?,
            Tan(x) => {
                // 1 + tan^2
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let one = b.lit_scalar(1.0);
                        let y2 = b.add_node(Multiply(y, y));
                        let slope = b.add_node(Add(one, y2));
                        Ok(b.add_node(Chain(g, slope)))
                    },
                    g,
                )?
            }
            Atan(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let one = b.lit_scalar(1.0);
                    let x2 = b.add_node(Multiply(xv, xv));
                    let denom = b.add_node(Add(one, x2));
                    Ok(b.add_node(Divide(g, denom)))
                },
                g,
            )?,
            Asinh(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let one = b.lit_scalar(1.0);
                    let x2 = b.add_node(Multiply(xv, xv));
                    let sum = b.add_node(Add(x2, one));
                    let denom = b.add_node(Sqrt(sum));
                    Ok(b.add_node(Divide(g, denom)))
                },
                g,
            )?,
            Sinh(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let cosh = b.add_node(Cosh(xv));
                    Ok(b.add_node(Chain(g, cosh)))
                },
                g,
            )?,
            Cosh(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let sinh = b.add_node(Sinh(xv));
                    Ok(b.add_node(Chain(g, sinh)))
                },
                g,
            )?,
            Tanh(x) => {
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let one = b.lit_scalar(1.0);
                        let y2 = b.add_node(Multiply(y, y));
                        let slope = b.add_node(Subtract(one, y2));
                        Ok(b.add_node(Chain(g, slope)))
                    },
                    g,
                )?
            }
            Erf(x) => self.unary(
                x,
                |b, g| {
                    // 2/sqrt(pi) * exp(-x^2)
                    let xv = b.ext(x)?;
                    let x2 = b.add_node(Multiply(xv, xv));
                    let neg = b.add_node(Negate(x2));
                    let gauss = b.add_node(Exp(neg));
                    let k = b.lit_scalar(std::f32::consts::FRAC_2_SQRT_PI);
                    let slope = b.add_node(Multiply(k, gauss));
                    Ok(b.add_node(Chain(g, slope)))
                },
                g,
            )?,
            Sigmoid(x) => {
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let one = b.lit_scalar(1.0);
                        let one_minus = b.add_node(Subtract(one, y));
                        let slope = b.add_node(Multiply(y, one_minus));
                        Ok(b.add_node(Chain(g, slope)))
                    },
                    g,
                )?
            }
            Softsign(x) => self.unary(
                x,
                |b, g| {
                    // 1 / (1 + |x|)^2
                    let xv = b.ext(x)?;
                    let abs = b.add_node(Abs(xv));
                    let one = b.lit_scalar(1.0);
                    let d = b.add_node(Add(one, abs));
                    let d2 = b.add_node(Multiply(d, d));
                    Ok(b.add_node(Divide(g, d2)))
                },
                g,
            )?,
            ReLU(x) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let zero = b.lit_scalar(0.0);
                    let mask = b.add_node(GreaterThan(xv, zero));
                    Ok(b.add_node(Chain(g, mask)))
                },
                g,
            )?,
            LambertW(x) => {
                // W'(z) = exp(-W) / (1 + W)
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let neg = b.add_node(Negate(y));
                        let num = b.add_node(Exp(neg));
                        let one = b.lit_scalar(1.0);
                        let denom = b.add_node(Add(one, y));
                        let slope = b.add_node(Divide(num, denom));
                        Ok(b.add_node(Chain(g, slope)))
                    },
                    g,
                )?
            }
            Softplus(x, beta) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let k = b.lit_scalar(beta);
                    let bx = b.add_node(Multiply(k, xv));
                    let slope = b.add_node(Sigmoid(bx));
                    Ok(b.add_node(Chain(g, slope)))
                },
                g,
            )?,
            ELU(x, alpha) => {
                // 1 where x > 0, y + alpha elsewhere
                let y = self.ext(id)?;
                self.unary(
                    x,
                    |b, g| {
                        let xv = b.ext(x)?;
                        let zero = b.lit_scalar(0.0);
                        let mask = b.add_node(GreaterThan(xv, zero));
                        let one = b.lit_scalar(1.0);
                        let inv_mask = b.add_node(Subtract(one, mask));
                        let a = b.lit_scalar(alpha);
                        let neg_slope = b.add_node(Add(y, a));
                        let neg_part = b.add_node(Multiply(inv_mask, neg_slope));
                        let slope = b.add_node(Add(mask, neg_part));
                        Ok(b.add_node(Chain(g, slope)))
                    },
                    g,
                )?
            }
            Clamp(x, min, max) => self.unary(
                x,
                |b, g| {
                    let xv = b.ext(x)?;
                    let lo = b.lit_scalar(min);
                    let hi = b.lit_scalar(max);
                    let above = b.add_node(GreaterThan(xv, lo));
                    let below = b.add_node(GreaterThan(hi, xv));
                    let mask = b.add_node(Multiply(above, below));
                    Ok(b.add_node(Chain(g, mask)))
                },
                g,
            )?,

            Sum(x) => {
                if self.wants(x) {
                    let target = self.ext(x)?;
                    let g_x = self.add_node(Broadcast(g, target));
                    self.acc(x, g_x);
                }
            }
            Mean(x) => {
                if self.wants(x) {
                    let n = self.shape_of(x)?.iter().product::<usize>().max(1) as f32;
                    let inv_n = self.lit_scalar(1.0 / n);
                    let scaled = self.add_node(Chain(g, inv_n));
                    let target = self.ext(x)?;
                    let g_x = self.add_node(Broadcast(scaled, target));
                    self.acc(x, g_x);
                }
            }
            Broadcast(x, _) => {
                if self.wants(x) {
                    let target = self.ext(x)?;
                    let g_x = self.add_node(ReduceSumTo(g, target));
                    self.acc(x, g_x);
                }
            }
            ReduceSumTo(x, _) => {
                if self.wants(x) {
                    let target = self.ext(x)?;
                    let g_x = self.add_node(Broadcast(g, target));
                    self.acc(x, g_x);
                }
            }
        }
        Ok(())
    }

    /// Shape-preserving op: `d/dx = rule(g)`, skipped when `x` needs no gradient.
    fn unary<F>(&mut self, x: NodeId, rule: F, g: NodeId) -> AutogradResult<()>
    where
        F: FnOnce(&mut Self, NodeId) -> AutogradResult<NodeId>,
    {
        if self.wants(x) {
            let g_x = rule(self, g)?;
            self.acc(x, g_x);
        }
        Ok(())
    }

    fn wants(&self, id: NodeId) -> bool {
        self.requires.contains(&id)
    }

    fn add_node(&mut self, node_type: NodeType) -> NodeId {
        self.grad.add_node(None, node_type)
    }

    fn lit_scalar(&mut self, v: f32) -> NodeId {
        self.grad.add_node(None, NodeType::Literal(Value::ScalarF32(v)))
    }

    fn shape_of(&self, src_id: NodeId) -> AutogradResult<Shape> {
        self.src
            .get_node(src_id)?
            .shape
            .clone()
            .ok_or(AutogradError::MissingShape(src_id))
    }

    /// The forward value of `src_id`, seen from the gradient graph.
    fn ext(&mut self, src_id: NodeId) -> AutogradResult<NodeId> {
        if let Some(&id) = self.externals.get(&src_id) {
            return Ok(id);
        }
        let src = self.src.get_node(src_id)?;
        let shape = src.shape.clone().ok_or(AutogradError::MissingShape(src_id))?;
        let dtype = src.dtype.unwrap_or(DType::F32);

        let name = format!("external_{}_{}", self.src.id, src_id);
        let id = self.grad.add_node(
            Some(name.clone()),
            NodeType::External { name, source_asg_id: self.src.id, source_node_id: src_id },
        );
        let node = self.grad.get_node_mut(id)?;
        node.shape = Some(shape);
        node.dtype = Some(dtype);

        self.externals.insert(src_id, id);
        Ok(id)
    }

    /// `dL/d(target) += contrib`
    fn acc(&mut self, target: NodeId, contrib: NodeId) {
        let total = match self.gmap.get(&target).copied() {
            Some(prev) => self.add_node(NodeType::Add(prev, contrib)),
            None => contrib,
        };
        self.gmap.insert(target, total);
    }

    /// Accumulates a contribution from the broadcasting binary op `node`,
    /// summing it back to the operand's shape when the operand was broadcast.
    fn acc_reduced(&mut self, node: NodeId, target: NodeId, contrib: NodeId) -> AutogradResult<()> {
        let contrib = if self.shape_of(node)? != self.shape_of(target)? {
            let shape_src = self.ext(target)?;
            self.add_node(NodeType::ReduceSumTo(contrib, shape_src))
        } else {
            contrib
        };
        self.acc(target, contrib);
        Ok(())
    }
}
