//! Optimizers that update parameter values from computed gradients.
//!
//! They work on host values (`Value`), after the gradient graph has run.

use crate::asg::Value;
use ndarray::ArrayD;
use std::collections::HashMap;

/// Common interface of all optimizers.
pub trait Optimizer {
    /// Applies one update to `parameters` using `gradients`.
    ///
    /// Both maps are keyed by parameter name. Gradients without a matching
    /// parameter are ignored.
    fn step(&mut self, parameters: &mut HashMap<String, Value>, gradients: &HashMap<String, Value>);
}

/// Stochastic gradient descent with optional momentum.
///
/// With momentum `m`: `v = m * v + g; p = p - lr * v`.
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocity: HashMap<String, ArrayD<f32>>,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        Self { lr, momentum: 0.0, velocity: HashMap::new() }
    }

    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, parameters: &mut HashMap<String, Value>, gradients: &HashMap<String, Value>) {
        for (name, grad) in gradients {
            let Some(param) = parameters.get_mut(name) else {
                continue;
            };
            let grad = grad.clone().into_array();
            let mut value = param.clone().into_array();
            if value.shape() != grad.shape() {
                tracing::warn!(parameter = %name, "gradient shape {:?} does not match {:?}", grad.shape(), value.shape());
                continue;
            }

            let update = if self.momentum > 0.0 {
                let velocity = self
                    .velocity
                    .entry(name.clone())
                    .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
                let m = self.momentum;
                ndarray::azip!((v in &mut *velocity, &g in &grad) *v = m * *v + g);
                velocity.clone()
            } else {
                grad
            };

            let lr = self.lr;
            ndarray::azip!((p in &mut value, &u in &update) *p -= lr * u);
            *param = Value::Tensor(value);
        }
    }
}
