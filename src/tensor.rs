//! `Tensor` handles and the `GraphContext` they share.
//!
//! A `Tensor` holds no data. It names a node in the ASG owned by a
//! [`GraphContext`]; every operation on it appends a node and returns a new
//! handle. Values only exist once a backend runs the graph.

use crate::asg::{Asg, NodeId, NodeType, Value};
use ndarray::ArrayD;
use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// Owns the graph that `Tensor` handles append to.
///
/// Shared between handles as `Rc<RefCell<GraphContext>>`.
#[derive(Debug, Clone)]
pub struct GraphContext {
    main_graph: Asg,
}

impl GraphContext {
    pub fn new() -> Self {
        Self { main_graph: Asg::new(0, Some("main".to_string())) }
    }

    /// A fresh context already wrapped for sharing.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn main_graph_mut(&mut self) -> &mut Asg {
        &mut self.main_graph
    }

    pub fn main_graph(&self) -> &Asg {
        &self.main_graph
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbolic handle to one node of the graph.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub node_id: NodeId,
    pub context: Rc<RefCell<GraphContext>>,
}

impl Tensor {
    /// A graph input, fed with data at run time. Registered in `Asg::inputs`.
    pub fn new_input(context: &Rc<RefCell<GraphContext>>, name: &str) -> Self {
        let mut ctx = context.borrow_mut();
        let graph = ctx.main_graph_mut();
        let node_id = graph.add_node(Some(name.to_string()), NodeType::Input { name: name.to_string() });
        graph.inputs.push(node_id);
        Self { node_id, context: Rc::clone(context) }
    }

    /// A trainable parameter.
    pub fn new_parameter(context: &Rc<RefCell<GraphContext>>, name: &str) -> Self {
        let node_id = context
            .borrow_mut()
            .main_graph_mut()
            .add_node(Some(name.to_string()), NodeType::Parameter { name: name.to_string() });
        Self { node_id, context: Rc::clone(context) }
    }

    /// A constant embedded in the graph.
    pub fn new_literal(context: &Rc<RefCell<GraphContext>>, data: ArrayD<f32>, name: &str) -> Self {
        let node_id = context
            .borrow_mut()
            .main_graph_mut()
            .add_node(Some(name.to_string()), NodeType::Literal(Value::Tensor(data)));
        Self { node_id, context: Rc::clone(context) }
    }

    /// A scalar constant.
    pub fn scalar(context: &Rc<RefCell<GraphContext>>, value: f32) -> Self {
        let node_id = context
            .borrow_mut()
            .main_graph_mut()
            .add_node(None, NodeType::Literal(Value::ScalarF32(value)));
        Self { node_id, context: Rc::clone(context) }
    }

    fn push(&self, node_type: NodeType) -> Tensor {
        let node_id = self.context.borrow_mut().main_graph_mut().add_node(None, node_type);
        Tensor { node_id, context: Rc::clone(&self.context) }
    }

    // --- Element-wise math ---

    pub fn pow(&self, power: &Tensor) -> Tensor {
        self.push(NodeType::Power(self.node_id, power.node_id))
    }

    pub fn powf(&self, power: f32) -> Tensor {
        let exponent = Tensor::scalar(&self.context, power);
        self.pow(&exponent)
    }

    pub fn square(&self) -> Tensor {
        self * self
    }

    /// `1 / self`.
    pub fn recip(&self) -> Tensor {
        1.0 / self
    }

    /// 1.0 where `self > other`, else 0.0.
    pub fn greater_than(&self, other: &Tensor) -> Tensor {
        self.push(NodeType::GreaterThan(self.node_id, other.node_id))
    }

    pub fn exp(&self) -> Tensor {
        self.push(NodeType::Exp(self.node_id))
    }

    pub fn log(&self) -> Tensor {
        self.push(NodeType::Log(self.node_id))
    }

    pub fn sqrt(&self) -> Tensor {
        self.push(NodeType::Sqrt(self.node_id))
    }

    pub fn abs(&self) -> Tensor {
        self.push(NodeType::Abs(self.node_id))
    }

    pub fn sign(&self) -> Tensor {
        self.push(NodeType::Sign(self.node_id))
    }

    pub fn sin(&self) -> Tensor {
        self.push(NodeType::Sin(self.node_id))
    }

    pub fn cos(&self) -> Tensor {
        self.push(NodeType::Cos(self.node_id))
    }

    pub fn tan(&self) -> Tensor {
        self.push(NodeType::Tan(self.node_id))
    }

    pub fn atan(&self) -> Tensor {
        self.push(NodeType::Atan(self.node_id))
    }

    pub fn asinh(&self) -> Tensor {
        self.push(NodeType::Asinh(self.node_id))
    }

    pub fn sinh(&self) -> Tensor {
        self.push(NodeType::Sinh(self.node_id))
    }

    pub fn cosh(&self) -> Tensor {
        self.push(NodeType::Cosh(self.node_id))
    }

    pub fn tanh(&self) -> Tensor {
        self.push(NodeType::Tanh(self.node_id))
    }

    pub fn erf(&self) -> Tensor {
        self.push(NodeType::Erf(self.node_id))
    }

    /// Principal branch of Lambert W.
    pub fn lambert_w(&self) -> Tensor {
        self.push(NodeType::LambertW(self.node_id))
    }

    /// Jacobi elliptic `cn(self | m)`, `m` clamped to `[0, 1]` by the backend.
    pub fn jacobi_cn(&self, m: &Tensor) -> Tensor {
        self.push(NodeType::JacobiCn(self.node_id, m.node_id))
    }

    pub fn clamp(&self, min: f32, max: f32) -> Tensor {
        self.push(NodeType::Clamp(self.node_id, min, max))
    }

    // --- Activation primitives ---

    pub fn relu(&self) -> Tensor {
        self.push(NodeType::ReLU(self.node_id))
    }

    pub fn sigmoid(&self) -> Tensor {
        self.push(NodeType::Sigmoid(self.node_id))
    }

    pub fn softsign(&self) -> Tensor {
        self.push(NodeType::Softsign(self.node_id))
    }

    pub fn softplus(&self, beta: f32) -> Tensor {
        self.push(NodeType::Softplus(self.node_id, beta))
    }

    pub fn elu(&self, alpha: f32) -> Tensor {
        self.push(NodeType::ELU(self.node_id, alpha))
    }

    // --- Reductions ---

    pub fn sum(&self) -> Tensor {
        self.push(NodeType::Sum(self.node_id))
    }

    /// Mean over every element.
    pub fn mean(&self) -> Tensor {
        self.push(NodeType::Mean(self.node_id))
    }
}

// Operators for `a + b`, `a * 2.0`, `1.0 - a` and friends, on owned and
// borrowed handles alike.
macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $variant:ident, $op:tt) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Tensor;
            fn $method(self, rhs: &Tensor) -> Tensor {
                self.push(NodeType::$variant(self.node_id, rhs.node_id))
            }
        }

        impl $trait<Tensor> for Tensor {
            type Output = Tensor;
            fn $method(self, rhs: Tensor) -> Tensor {
                &self $op &rhs
            }
        }

        impl $trait<&Tensor> for Tensor {
            type Output = Tensor;
            fn $method(self, rhs: &Tensor) -> Tensor {
                &self $op rhs
            }
        }

        impl $trait<Tensor> for &Tensor {
            type Output = Tensor;
            fn $method(self, rhs: Tensor) -> Tensor {
                self $op &rhs
            }
        }

        impl $trait<f32> for &Tensor {
            type Output = Tensor;
            fn $method(self, rhs: f32) -> Tensor {
                let rhs = Tensor::scalar(&self.context, rhs);
                self $op &rhs
            }
        }

        impl $trait<f32> for Tensor {
            type Output = Tensor;
            fn $method(self, rhs: f32) -> Tensor {
                &self $op rhs
            }
        }

        impl $trait<&Tensor> for f32 {
            type Output = Tensor;
            fn $method(self, rhs: &Tensor) -> Tensor {
                let lhs = Tensor::scalar(&rhs.context, self);
                &lhs $op rhs
            }
        }

        impl $trait<Tensor> for f32 {
            type Output = Tensor;
            fn $method(self, rhs: Tensor) -> Tensor {
                self $op &rhs
            }
        }
    };
}

impl_binary_op!(Add, add, Add, +);
impl_binary_op!(Sub, sub, Subtract, -);
impl_binary_op!(Mul, mul, Multiply, *);
impl_binary_op!(Div, div, Divide, /);

impl Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        self.push(NodeType::Negate(self.node_id))
    }
}

impl Neg for Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_append_nodes() {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x");
        let y = 1.0 - (&x * 2.0).tanh();

        let ctx = ctx.borrow();
        let graph = ctx.main_graph();
        assert_eq!(graph.inputs, vec![x.node_id]);
        // x, 2.0, mul, tanh, 1.0, sub
        assert_eq!(graph.nodes.len(), 6);
        assert!(matches!(graph.get_node(y.node_id).unwrap().node_type, NodeType::Subtract(_, _)));
    }

    #[test]
    fn scalar_literals_live_in_the_same_graph() {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x");
        let half = Tensor::scalar(&x.context, 0.5);
        assert!(Rc::ptr_eq(&x.context, &half.context));
        assert_eq!(
            ctx.borrow().main_graph().get_node(half.node_id).unwrap().node_type,
            NodeType::Literal(Value::ScalarF32(0.5))
        );
    }
}
