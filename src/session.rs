//! Running one activation through the graph stack.
//!
//! An [`ActivationSession`] owns two graphs built from the same activation:
//!
//! * inference: `y = f(x)`;
//! * training: `y = f(x)` and `loss = sum(y * upstream)`, whose gradient with
//!   respect to `x` and each parameter is the vector-Jacobian product with
//!   `upstream`.
//!
//! Shapes are inferred per input shape, and the last shape-specialised
//! training and gradient graphs are cached.

use crate::analysis::shape_inference::ShapeInference;
use crate::asg::{Asg, DType, NodeId, Shape, Value};
use crate::autograd::Gradients;
use crate::config::ActivationConfig;
use crate::error::{ActixError, Result};
use crate::nn::{ActivationModule, Module};
use crate::registry::ActivationKind;
use crate::runtime::backend::{bind_inputs, Backend};
use crate::runtime::cpu_backend::CpuBackend;
use crate::tensor::{GraphContext, Tensor};
use ndarray::ArrayD;
use std::collections::HashMap;

const LAYER: &str = "act";
const INPUT: &str = "x";
const UPSTREAM: &str = "upstream";

/// Gradients returned by [`ActivationSession::backward`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationGradients {
    /// d(loss)/dx, same shape as x.
    pub input: ArrayD<f32>,
    /// d(loss)/dθ per parameter, by parameter name, in registry order.
    pub params: Vec<(String, f32)>,
}

/// A graph built once for a given input shape.
#[derive(Debug)]
struct Compiled {
    shape: Shape,
    forward: Asg,
    grad: Asg,
}

/// Forward and backward evaluation of one activation on the CPU backend.
#[derive(Debug)]
pub struct ActivationSession {
    module: ActivationModule,
    inference: Asg,
    training: Asg,
    loss: NodeId,
    wrt: Vec<NodeId>,
    values: HashMap<String, Value>,
    compiled: Option<Compiled>,
    backend: CpuBackend,
}

impl ActivationSession {
    pub fn new(config: impl Into<ActivationConfig>) -> Result<Self> {
        let config = config.into();
        config.validate()?;

        let inference = {
            let ctx = GraphContext::shared();
            let x = Tensor::new_input(&ctx, INPUT);
            let y = ActivationModule::new(&ctx, config.kind, LAYER).forward(&x);
            let mut ctx = ctx.borrow_mut();
            ctx.main_graph_mut().set_output(y.node_id);
            ctx.main_graph().clone()
        };

        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, INPUT);
        let upstream = Tensor::new_input(&ctx, UPSTREAM);
        let module = ActivationModule::new(&ctx, config.kind, LAYER);
        let y = module.forward(&x);
        let loss = (&y * &upstream).sum();
        ctx.borrow_mut().main_graph_mut().set_outputs(vec![y.node_id, loss.node_id]);
        let training = ctx.borrow().main_graph().clone();

        let wrt = std::iter::once(x.node_id)
            .chain(module.parameters().iter().map(|p| p.node_id))
            .collect();
        let values = module.values_from_config(&config)?;

        tracing::debug!(kind = %config.kind, nodes = training.nodes.len(), "activation session built");
        Ok(Self {
            module,
            inference,
            training,
            loss: loss.node_id,
            wrt,
            values,
            compiled: None,
            backend: CpuBackend::new(),
        })
    }

    pub fn kind(&self) -> ActivationKind {
        self.module.kind()
    }

    /// Current parameter values.
    pub fn parameter_values(&self) -> Result<ActivationConfig> {
        self.module.config_from_values(&self.values)
    }

    /// Replaces the parameter values. The kind must match the session's.
    pub fn set_parameters(&mut self, config: &ActivationConfig) -> Result<()> {
        self.values = self.module.values_from_config(config)?;
        Ok(())
    }

    /// `f(x)`, element-wise.
    pub fn forward(&self, x: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mut data = self.values.clone();
        data.insert(INPUT.to_string(), Value::Tensor(x.clone()));
        let memo = bind_inputs(&self.inference, &data)?;
        let (outputs, _) = self.backend.run(&self.inference, memo)?;
        Ok(first(outputs))
    }

    /// Vector-Jacobian products with `upstream`: `upstream * f'(x)` for the
    /// input and `sum(upstream * df/dθ)` for every parameter.
    pub fn backward(&mut self, x: &ArrayD<f32>, upstream: &ArrayD<f32>) -> Result<ActivationGradients> {
        if x.shape() != upstream.shape() {
            return Err(ActixError::ShapeMismatch {
                expected: x.shape().to_vec(),
                actual: upstream.shape().to_vec(),
            });
        }

        let mut data = self.values.clone();
        data.insert(INPUT.to_string(), Value::Tensor(x.clone()));
        data.insert(UPSTREAM.to_string(), Value::Tensor(upstream.clone()));
        let grads = self.run_gradients(x.shape(), &data)?;

        let mut grads = grads.into_iter();
        let input = grads.next().map(Value::into_array).unwrap_or_else(|| ArrayD::zeros(x.raw_dim()));
        let params = self
            .kind()
            .parameters()
            .iter()
            .zip(grads)
            .map(|(spec, g)| (spec.name.to_string(), g.into_array().sum()))
            .collect();
        Ok(ActivationGradients { input, params })
    }

    /// Runs the training graph, then its gradient graph on the forward memo.
    /// Gradients come back in `wrt` order.
    fn run_gradients(&mut self, shape: &[usize], data: &HashMap<String, Value>) -> Result<Vec<Value>> {
        let compiled = match self.compiled.take() {
            Some(compiled) if compiled.shape == shape => compiled,
            _ => self.compile(shape)?,
        };
        let result = self.execute(&compiled, data);
        self.compiled = Some(compiled);
        result
    }

    fn execute(&self, compiled: &Compiled, data: &HashMap<String, Value>) -> Result<Vec<Value>> {
        let memo = bind_inputs(&compiled.forward, data)?;
        let (_, memo) = self.backend.run(&compiled.forward, memo)?;
        let (grads, _) = self.backend.run(&compiled.grad, memo)?;
        Ok(grads)
    }

    fn compile(&self, shape: &[usize]) -> Result<Compiled> {
        let mut forward = self.training.clone();
        let mut initial_shapes: HashMap<String, (Shape, DType)> = HashMap::from([
            (INPUT.to_string(), (shape.to_vec(), DType::F32)),
            (UPSTREAM.to_string(), (shape.to_vec(), DType::F32)),
        ]);
        for name in self.module.parameter_names() {
            initial_shapes.insert(name, (Vec::new(), DType::F32));
        }
        ShapeInference::run(&mut forward, &initial_shapes)?;
        let grad = Gradients::new(forward.clone()).build_and_infer(self.loss, &self.wrt)?;
        tracing::debug!(?shape, grad_nodes = grad.nodes.len(), "compiled gradient graph");
        Ok(Compiled { shape: shape.to_vec(), forward, grad })
    }
}

fn first(outputs: Vec<Value>) -> ArrayD<f32> {
    outputs.into_iter().next().map(Value::into_array).unwrap_or_else(|| ArrayD::zeros(Vec::new()))
}

#[cfg(all(test, feature = "eager"))]
mod tests {
    use super::*;
    use crate::functional::Activation;
    use ndarray::{array, ArrayD};

    fn xs() -> ArrayD<f32> {
        array![[-1.5_f32, -0.2, 0.6], [1.1, 2.0, -0.9]].into_dyn()
    }

    #[test]
    fn forward_matches_eager() {
        let session = ActivationSession::new(ActivationKind::OptimA).unwrap();
        let eager = Activation::new(ActivationKind::OptimA);
        let (graph, reference) = (session.forward(&xs()).unwrap(), eager.forward(&xs()));
        assert_eq!(graph.shape(), &[2, 3]);
        for (a, b) in graph.iter().zip(reference.iter()) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn backward_with_ones_is_the_derivative() {
        let mut session = ActivationSession::new(ActivationKind::ParametricLogish).unwrap();
        let eager = Activation::new(ActivationKind::ParametricLogish);
        let x = xs();
        let grads = session.backward(&x, &ArrayD::ones(x.raw_dim())).unwrap();

        let dx = eager.derivative(&x);
        for (a, b) in grads.input.iter().zip(dx.iter()) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }

        let expected = eager.parameter_gradients(&x);
        assert_eq!(grads.params.len(), 2);
        for ((name, g), e) in grads.params.iter().zip(expected) {
            assert!((g - e.sum()).abs() < 1e-3, "{name}: {g} vs {}", e.sum());
        }
    }

    #[test]
    fn static_kinds_have_only_input_gradients() {
        let mut session = ActivationSession::new(ActivationKind::SinhGate).unwrap();
        let x = array![0.5_f32, -0.25].into_dyn();
        let grads = session.backward(&x, &array![2.0_f32, 1.0].into_dyn()).unwrap();
        assert!(grads.params.is_empty());
        // d/dx x sinh x = sinh x + x cosh x
        let expected = 2.0 * (0.5_f32.sinh() + 0.5 * 0.5_f32.cosh());
        assert!((grads.input[[0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn upstream_shape_must_match() {
        let mut session = ActivationSession::new(ActivationKind::SoftRBF).unwrap();
        let err = session.backward(&xs(), &ArrayD::ones(vec![3])).unwrap_err();
        assert!(matches!(err, ActixError::ShapeMismatch { .. }));
    }

    #[test]
    fn recompiles_for_a_new_shape() {
        let mut session = ActivationSession::new(ActivationKind::TanhArc).unwrap();
        let a = array![0.3_f32].into_dyn();
        let b = xs();
        assert_eq!(session.backward(&a, &a).unwrap().input.shape(), &[1]);
        assert_eq!(session.backward(&b, &b).unwrap().input.shape(), &[2, 3]);
    }

    #[test]
    fn parameters_can_be_replaced() {
        let mut session = ActivationSession::new(ActivationKind::ParametricLogish).unwrap();
        let config = ActivationConfig::new(ActivationKind::ParametricLogish).with_param("alpha", 2.0).unwrap();
        session.set_parameters(&config).unwrap();
        assert_eq!(session.parameter_values().unwrap().resolved_params(), vec![2.0, 1.0]);

        let x = array![1.0_f32].into_dyn();
        let y = session.forward(&x).unwrap();
        assert!((y[[0]] - 2.0 * crate::special::sigmoid(1.0)).abs() < 1e-6);

        let wrong = ActivationConfig::new(ActivationKind::OptimA);
        assert!(session.set_parameters(&wrong).is_err());
    }
}
