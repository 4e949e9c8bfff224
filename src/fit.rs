//! Fitting activation parameters to samples.
//!
//! Builds `mean((f(x; θ) - target)^2)` as a graph, differentiates it with
//! respect to every parameter and runs SGD on the result.

use crate::analysis::shape_inference::ShapeInference;
use crate::asg::{Asg, DType, NodeId, Shape, Value};
use crate::autograd::Gradients;
use crate::config::ActivationConfig;
use crate::error::{ActixError, Result};
use crate::losses::mse_loss_mean;
use crate::nn::{ActivationModule, Module};
use crate::optimizers::{Optimizer, Sgd};
use crate::runtime::backend::{bind_inputs, Backend};
use crate::runtime::cpu_backend::CpuBackend;
use crate::tensor::{GraphContext, Tensor};
use ndarray::{Array1, ArrayD};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const LAYER: &str = "act";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    /// Log the loss every `log_every` epochs; 0 disables progress logs.
    pub log_every: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { epochs: 500, learning_rate: 0.05, momentum: 0.9, log_every: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    /// Fitted parameter values.
    pub config: ActivationConfig,
    pub initial_loss: f32,
    pub final_loss: f32,
    /// Loss before each epoch's update. Shorter than `epochs` when the run
    /// diverged; the reported parameters are then the last finite ones.
    pub history: Vec<f32>,
}

/// Fits the parameters of `config.kind`, starting from `config`'s values, so
/// that `f(xs)` approaches `targets`.
pub fn fit(
    config: &ActivationConfig,
    xs: &ArrayD<f32>,
    targets: &ArrayD<f32>,
    options: &FitOptions,
) -> Result<FitReport> {
    if !config.kind.is_parametric() {
        return Err(ActixError::NotParametric(config.kind.name().to_string()));
    }
    if xs.shape() != targets.shape() {
        return Err(ActixError::ShapeMismatch {
            expected: xs.shape().to_vec(),
            actual: targets.shape().to_vec(),
        });
    }
    config.validate()?;

    let problem = Problem::build(config, xs.shape())?;
    let backend = CpuBackend::new();
    let mut values = problem.module.values_from_config(config)?;
    let mut optimizer = Sgd::new(options.learning_rate).with_momentum(options.momentum);
    let mut history = Vec::with_capacity(options.epochs);

    // The last point whose loss and gradient were finite.
    let mut best = values.clone();
    let mut final_loss = None;
    for epoch in 0..=options.epochs {
        let (loss, grads) = problem.step(&backend, &values, xs, targets)?;
        if !loss.is_finite() || !grads.values().all(Value::is_finite) {
            tracing::warn!(epoch, loss, "fit diverged, keeping the last finite parameters");
            break;
        }
        best.clone_from(&values);
        final_loss = Some(loss);
        if epoch == options.epochs {
            break;
        }

        history.push(loss);
        if options.log_every > 0 && epoch % options.log_every == 0 {
            tracing::info!(epoch, loss, "fitting {}", config.kind);
        }
        optimizer.step(&mut values, &grads);
    }

    let final_loss = final_loss.unwrap_or(f32::NAN);
    let initial_loss = history.first().copied().unwrap_or(final_loss);
    tracing::info!(initial_loss, final_loss, epochs = history.len(), "fit finished");

    Ok(FitReport {
        config: problem.module.config_from_values(&best)?,
        initial_loss,
        final_loss,
        history,
    })
}

/// `n` inputs drawn uniformly from `[start, end)`, reproducible from `seed`.
pub fn sample_inputs(n: usize, start: f32, end: f32, seed: u64) -> Result<ArrayD<f32>> {
    if n == 0 || !(start < end) {
        return Err(ActixError::InvalidRange { start, end, steps: n });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(Array1::random_using(n, Uniform::new(start, end), &mut rng).into_dyn())
}

/// The loss graph and its gradient graph for one input shape.
struct Problem {
    module: ActivationModule,
    forward: Asg,
    grad: Asg,
}

impl Problem {
    fn build(config: &ActivationConfig, shape: &[usize]) -> Result<Self> {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x");
        let target = Tensor::new_input(&ctx, "target");
        let module = ActivationModule::new(&ctx, config.kind, LAYER);
        let loss = mse_loss_mean(&module.forward(&x), &target);
        ctx.borrow_mut().main_graph_mut().set_output(loss.node_id);
        let mut forward = ctx.borrow().main_graph().clone();

        let mut shapes: HashMap<String, (Shape, DType)> = HashMap::from([
            ("x".to_string(), (shape.to_vec(), DType::F32)),
            ("target".to_string(), (shape.to_vec(), DType::F32)),
        ]);
        for name in module.parameter_names() {
            shapes.insert(name, (Vec::new(), DType::F32));
        }
        ShapeInference::run(&mut forward, &shapes)?;

        let wrt: Vec<NodeId> = module.parameters().iter().map(|p| p.node_id).collect();
        let grad = Gradients::new(forward.clone()).build_and_infer(loss.node_id, &wrt)?;
        Ok(Self { module, forward, grad })
    }

    /// Loss at `values` and its gradient, keyed by parameter graph name.
    fn step(
        &self,
        backend: &CpuBackend,
        values: &HashMap<String, Value>,
        xs: &ArrayD<f32>,
        targets: &ArrayD<f32>,
    ) -> Result<(f32, HashMap<String, Value>)> {
        let mut data = values.clone();
        data.insert("x".to_string(), Value::Tensor(xs.clone()));
        data.insert("target".to_string(), Value::Tensor(targets.clone()));

        let memo = bind_inputs(&self.forward, &data)?;
        let (outputs, memo) = backend.run(&self.forward, memo)?;
        let loss = outputs.into_iter().next().map(|v| v.into_array().sum()).unwrap_or(f32::NAN);

        let (grads, _) = backend.run(&self.grad, memo)?;
        let grads = self.module.parameter_names().into_iter().zip(grads).collect();
        Ok((loss, grads))
    }
}
