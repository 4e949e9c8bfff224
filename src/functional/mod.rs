//! # Eager activation API
//!
//! Every activation is written once, generically over [`Scalar`], in
//! [`definitions`]. Evaluating that definition on `f32` gives the value;
//! evaluating it on [`Dual`] numbers gives the exact derivative with respect to
//! whichever input was seeded (`x` or one of the parameters).
//!
//! ```
//! use actix::functional::Activation;
//! use actix::registry::ActivationKind;
//! use ndarray::array;
//!
//! let act = Activation::new(ActivationKind::SoftRBF);
//! let x = array![[-1.0_f32, 0.0, 1.0]].into_dyn();
//! let y = act.forward(&x);
//! let dy = act.derivative(&x);
//! assert_eq!(y.shape(), x.shape());
//! assert_eq!(dy.shape(), x.shape());
//! ```

mod definitions;
pub mod dual;
pub mod scalar;

pub(crate) use definitions::evaluate;
pub use dual::Dual;
pub use scalar::Scalar;

use crate::config::ActivationConfig;
use crate::error::Result;
use crate::registry::ActivationKind;
use ndarray::ArrayD;

/// An activation bound to concrete parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    kind: ActivationKind,
    params: Vec<f32>,
}

impl Activation {
    /// The activation with its default parameters.
    pub fn new(kind: ActivationKind) -> Self {
        Self { kind, params: kind.default_parameters() }
    }

    pub fn from_config(config: &ActivationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { kind: config.kind, params: config.resolved_params() })
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    /// Parameter values in registry order.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// The current parameters as a config (every parameter written out).
    pub fn to_config(&self) -> ActivationConfig {
        let mut config = ActivationConfig::new(self.kind);
        for (spec, &value) in self.kind.parameters().iter().zip(&self.params) {
            config.params.insert(spec.name.to_string(), value);
        }
        config
    }

    pub fn forward_scalar(&self, x: f32) -> f32 {
        evaluate(self.kind, &self.params, x)
    }

    /// `df/dx` at `x`.
    pub fn derivative_scalar(&self, x: f32) -> f32 {
        let params: Vec<Dual> = self.params.iter().map(|&p| Dual::constant(p)).collect();
        evaluate(self.kind, &params, Dual::variable(x)).d
    }

    /// Element-wise `f(x)`; the output has the shape of `x`.
    pub fn forward(&self, x: &ArrayD<f32>) -> ArrayD<f32> {
        x.mapv(|v| self.forward_scalar(v))
    }

    /// Element-wise `df/dx`; the output has the shape of `x`.
    pub fn derivative(&self, x: &ArrayD<f32>) -> ArrayD<f32> {
        let params: Vec<Dual> = self.params.iter().map(|&p| Dual::constant(p)).collect();
        x.mapv(|v| evaluate(self.kind, &params, Dual::variable(v)).d)
    }

    /// Element-wise `df/dθ_i` for every parameter, in registry order.
    ///
    /// Static activations return an empty vector.
    pub fn parameter_gradients(&self, x: &ArrayD<f32>) -> Vec<ArrayD<f32>> {
        (0..self.params.len())
            .map(|seeded| {
                let params: Vec<Dual> = self
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| if i == seeded { Dual::variable(p) } else { Dual::constant(p) })
                    .collect();
                x.mapv(|v| evaluate(self.kind, &params, Dual::constant(v)).d)
            })
            .collect()
    }
}

impl From<ActivationKind> for Activation {
    fn from(kind: ActivationKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    const H: f32 = 1e-3;

    fn sample_points() -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![-2.0, -0.7, -0.3, 0.4, 0.9, 1.3]).unwrap()
    }

    fn assert_close(analytic: f32, numeric: f32, context: &str) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff / scale < 1e-2,
            "{context}: analytic {analytic:.6} vs numeric {numeric:.6}"
        );
    }

    #[test]
    fn shapes_are_preserved() {
        let x = sample_points();
        for &kind in ActivationKind::ALL {
            let act = Activation::new(kind);
            assert_eq!(act.forward(&x).shape(), x.shape(), "{kind}");
            assert_eq!(act.derivative(&x).shape(), x.shape(), "{kind}");
            for grad in act.parameter_gradients(&x) {
                assert_eq!(grad.shape(), x.shape(), "{kind}");
            }
        }
    }

    #[test]
    fn derivatives_match_central_differences() {
        let x = sample_points();
        for &kind in ActivationKind::ALL {
            let act = Activation::new(kind);
            let dy = act.derivative(&x);
            for (&xi, &di) in x.iter().zip(dy.iter()) {
                let numeric = (act.forward_scalar(xi + H) - act.forward_scalar(xi - H)) / (2.0 * H);
                assert_close(di, numeric, &format!("{kind} at x={xi}"));
            }
        }
    }

    #[test]
    fn parameter_gradients_match_central_differences() {
        let x = sample_points();
        for kind in ActivationKind::parametric() {
            let act = Activation::new(kind);
            let grads = act.parameter_gradients(&x);
            assert_eq!(grads.len(), kind.parameters().len());

            for (i, grad) in grads.iter().enumerate() {
                let mut plus = act.params.clone();
                let mut minus = act.params.clone();
                plus[i] += H;
                minus[i] -= H;
                for (&xi, &gi) in x.iter().zip(grad.iter()) {
                    let numeric = (evaluate(kind, &plus, xi) - evaluate(kind, &minus, xi)) / (2.0 * H);
                    let name = kind.parameters()[i].name;
                    assert_close(gi, numeric, &format!("{kind}.{name} at x={xi}"));
                }
            }
        }
    }

    #[test]
    fn scalar_and_array_paths_agree() {
        let act = Activation::new(ActivationKind::SinhGate);
        let dy = act.derivative(&sample_points());
        for (&xi, &di) in sample_points().iter().zip(dy.iter()) {
            assert_eq!(act.derivative_scalar(xi), di);
        }
        assert!((act.forward_scalar(1.0) - 1.0_f32.sinh()).abs() < 1e-6);
    }

    #[test]
    fn static_kinds_have_no_parameter_gradients() {
        let act = Activation::new(ActivationKind::TanhArc);
        assert!(act.parameter_gradients(&sample_points()).is_empty());
    }

    #[test]
    fn config_overrides_reach_evaluation() {
        let config = ActivationConfig::new(ActivationKind::ParametricLogish)
            .with_param("alpha", 2.0)
            .unwrap();
        let act = Activation::from_config(&config).unwrap();
        let base = Activation::new(ActivationKind::ParametricLogish);
        assert!((act.forward_scalar(1.5) - 2.0 * base.forward_scalar(1.5)).abs() < 1e-6);
        assert_eq!(act.to_config().resolved_params(), vec![2.0, 1.0]);
    }
}
