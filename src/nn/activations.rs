//! Activation layers for the graph API.
//!
//! [`ActivationModule`] covers every [`ActivationKind`]: it registers one
//! scalar (0-d) `Parameter` node per activation parameter, named
//! `"{module}.{param}"`, and builds the activation's expression on `forward`.
//! The named structs (`OptimA`, `SinhGate`, ...) are thin typed wrappers.

use crate::asg::Value;
use crate::config::ActivationConfig;
use crate::error::{ActixError, Result};
use crate::nn::module::Module;
use crate::registry::ActivationKind;
use crate::tensor::{GraphContext, Tensor};
use ndarray::{arr0, ArrayD};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const EPS: f32 = 1e-7;

/// Any activation from the catalogue, as a graph layer.
#[derive(Debug, Clone)]
pub struct ActivationModule {
    kind: ActivationKind,
    name: String,
    params: Vec<Tensor>,
}

impl ActivationModule {
    pub fn new(context: &Rc<RefCell<GraphContext>>, kind: ActivationKind, name: &str) -> Self {
        let params = kind
            .parameters()
            .iter()
            .map(|spec| Tensor::new_parameter(context, &format!("{name}.{}", spec.name)))
            .collect();
        Self { kind, name: name.to_string(), params }
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Graph names of the parameters, in registry order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.kind
            .parameters()
            .iter()
            .map(|spec| format!("{}.{}", self.name, spec.name))
            .collect()
    }

    /// Registry defaults, keyed by graph name.
    pub fn initial_values(&self) -> HashMap<String, Value> {
        self.values(&self.kind.default_parameters())
    }

    /// The values of `config`, keyed by graph name.
    pub fn values_from_config(&self, config: &ActivationConfig) -> Result<HashMap<String, Value>> {
        if config.kind != self.kind {
            return Err(ActixError::KindMismatch {
                expected: config.kind.name().to_string(),
                actual: self.kind.name().to_string(),
            });
        }
        config.validate()?;
        Ok(self.values(&config.resolved_params()))
    }

    /// Reads the parameter values back into a config.
    ///
    /// Names this module does not own are ignored; missing ones keep their
    /// defaults.
    pub fn config_from_values(&self, values: &HashMap<String, Value>) -> Result<ActivationConfig> {
        let mut config = ActivationConfig::new(self.kind);
        for (spec, graph_name) in self.kind.parameters().iter().zip(self.parameter_names()) {
            if let Some(value) = values.get(&graph_name) {
                let v = value.as_scalar().ok_or_else(|| ActixError::ShapeMismatch {
                    expected: Vec::new(),
                    actual: value.shape(),
                })?;
                config.set_param(spec.name, v)?;
            }
        }
        Ok(config)
    }

    fn values(&self, params: &[f32]) -> HashMap<String, Value> {
        self.parameter_names()
            .into_iter()
            .zip(params)
            .map(|(name, &v)| (name, Value::Tensor(scalar_param(v))))
            .collect()
    }
}

impl Module for ActivationModule {
    fn forward(&self, inputs: &Tensor) -> Tensor {
        build(self.kind, inputs, &self.params)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.params.clone()
    }
}

/// Appends the expression of `kind` applied to `x` to the graph.
///
/// `p` are the parameter handles in registry order, as held by
/// [`ActivationModule`]. Static kinds ignore it.
pub(crate) fn build(kind: ActivationKind, x: &Tensor, p: &[Tensor]) -> Tensor {
    use ActivationKind as K;

    match kind {
        K::OptimA => {
            let (alpha, beta, gamma, delta, lambda) = (&p[0], &p[1], &p[2], &p[3], &p[4]);
            alpha * (beta * x).tanh() + gamma * (delta * x).softplus(1.0) * (lambda * x).sigmoid()
        }
        K::ParametricPolyTanh => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * (beta * x.square() + gamma * x + delta).tanh()
        }
        K::AdaptiveRationalSoftsign => {
            let (alpha, beta, gamma) = (&p[0], &p[1], &p[2]);
            (alpha * x) / (1.0 + (beta * x).abs().pow(gamma))
        }
        K::OptimXTemporal => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * (beta * x).tanh() + gamma * (delta * x).sigmoid()
        }
        K::ParametricGaussianActivation => {
            let (alpha, beta) = (&p[0], &p[1]);
            alpha * x * (-beta * x.square()).exp()
        }
        K::LearnableFourierActivation => {
            let (alpha, beta, gamma, delta, lambda, phi) = (&p[0], &p[1], &p[2], &p[3], &p[4], &p[5]);
            alpha * (beta * x + gamma).sin() + delta * (lambda * x + phi).cos()
        }
        K::AELuC => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * (beta * x).elu(1.0) + gamma * x * (delta * x).sigmoid()
        }
        K::ParametricSmoothStep => {
            let (alpha, beta, gamma, delta, mu) = (&p[0], &p[1], &p[2], &p[3], &p[4]);
            alpha * (beta * (x - gamma)).sigmoid() - alpha * (delta * (x + mu)).sigmoid()
        }
        K::AdaptiveBiHyperbolic => {
            let (alpha, beta, gamma) = (&p[0], &p[1], &p[2]);
            let t = (gamma * x).tanh();
            alpha * (beta * x).tanh() + (1.0 - alpha) * &t * &t * &t
        }
        K::ParametricLogish => {
            let (alpha, beta) = (&p[0], &p[1]);
            alpha * x * (beta * x).sigmoid()
        }
        K::AdaptSigmoidReLU => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * x * (beta * x).sigmoid() + gamma * (delta * x).relu()
        }
        K::ParametricLambertWActivation => {
            let (alpha, beta, gamma) = (&p[0], &p[1], &p[2]);
            alpha * x * (beta.abs() * (gamma * x).exp()).lambert_w()
        }
        K::AdaptiveHyperbolicLogarithm => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * (beta * x).asinh() + gamma * (delta.abs() + x.square() + EPS).log()
        }
        K::ParametricGeneralizedGompertzActivation => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            alpha * (-beta * (-gamma * x).exp()).exp() - delta
        }
        K::ComplexHarmonicActivation => {
            let (alpha, beta, gamma, delta, lambda) = (&p[0], &p[1], &p[2], &p[3], &p[4]);
            alpha * (beta * x).tanh() + gamma * (delta * x.square() + lambda).sin()
        }
        K::WeibullSoftplusActivation => {
            let (alpha, beta, gamma, delta, lambda, mu) = (&p[0], &p[1], &p[2], &p[3], &p[4], &p[5]);
            let gate = alpha * x * (beta * (x - gamma)).sigmoid();
            let exponent = lambda.abs() * (x.abs() + EPS).pow(&mu.abs());
            gate + delta * (1.0 - (-exponent).exp())
        }
        K::AdaptiveErfSwish => {
            let (alpha, beta, gamma) = (&p[0], &p[1], &p[2]);
            alpha * x * (beta * x).erf() * (gamma * x).sigmoid()
        }
        K::ParametricBetaSoftsign => {
            let (alpha, beta, gamma) = (&p[0], &p[1], &p[2]);
            let abs_x = x.abs();
            let numerator = abs_x.pow(&beta.abs());
            let denominator = 1.0 + abs_x.pow(&gamma.abs()) + EPS;
            alpha * (numerator / denominator) * x.sign()
        }
        K::ParametricArcSinhGate => {
            let (alpha, beta) = (&p[0], &p[1]);
            alpha * x * (beta * x).asinh()
        }
        K::GeneralizedAlphaSigmoid => {
            let (alpha, beta, gamma, delta) = (&p[0], &p[1], &p[2], &p[3]);
            let base = 1.0 + (beta * x).abs().pow(&gamma.abs());
            let inv_delta = 1.0 / (delta.abs() + EPS);
            (alpha * x) / (base.pow(&inv_delta) + EPS)
        }
        K::EllipticGaussianActivation => {
            let m = p[0].clamp(0.0, 1.0);
            x * (-x.jacobi_cn(&m)).exp()
        }

        K::SinhGate => x * x.sinh(),
        K::SoftRBF => x * (-x.square()).exp(),
        K::ATanSigmoid => x.atan() * x.sigmoid(),
        K::ExpoSoft => x.softsign() * (-x.abs()).exp(),
        K::HarmonicTanh => x.tanh() + x.sin(),
        K::RationalSoftplus => {
            let swish = x * x.sigmoid();
            &swish / (0.5 + &swish + EPS)
        }
        K::UnifiedSineExp => x * (-x.square()).exp().sin(),
        K::SigmoidErf => x.sigmoid() * x.erf(),
        K::LogCoshGate => x * (x.cosh() + EPS).log(),
        K::TanhArc => x.tanh() * x.atan(),
        K::RiemannianSoftsignActivation => (x.atan() * x.erf()) / (1.0 + x.abs() + EPS),
        K::QuantumTanhActivation => x.tanh() * (-x.tan().square()).exp(),
        K::LogExponentialActivation => {
            let abs_x = x.abs();
            let exponent = &abs_x - (&abs_x + EPS).recip();
            x.sign() * (1.0 + exponent.exp() + EPS).log()
        }
        K::BipolarGaussianArctanActivation => x.atan() * (-x.square()).exp(),
        K::ExpArcTanHarmonicActivation => (-x.square()).exp() * x.atan() * x.sin(),
        K::LogisticWActivation => {
            let w = x.exp().lambert_w();
            x / (1.0 + (-x * w).exp() + EPS)
        }
    }
}

macro_rules! parametric_modules {
    ($($name:ident),+ $(,)?) => {
        $(
            #[doc = concat!("The `", stringify!($name), "` activation with trainable parameters.")]
            #[derive(Debug, Clone)]
            pub struct $name(ActivationModule);

            impl $name {
                pub fn new(context: &Rc<RefCell<GraphContext>>, name: &str) -> Self {
                    Self(ActivationModule::new(context, ActivationKind::$name, name))
                }
            }

            impl std::ops::Deref for $name {
                type Target = ActivationModule;
                fn deref(&self) -> &ActivationModule {
                    &self.0
                }
            }

            impl Module for $name {
                fn forward(&self, inputs: &Tensor) -> Tensor {
                    self.0.forward(inputs)
                }

                fn parameters(&self) -> Vec<Tensor> {
                    self.0.parameters()
                }
            }
        )+
    };
}

macro_rules! static_modules {
    ($($name:ident),+ $(,)?) => {
        $(
            #[doc = concat!("The `", stringify!($name), "` activation. No trainable parameters.")]
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl $name {
                pub fn new() -> Self {
                    $name
                }
            }

            impl Module for $name {
                fn forward(&self, inputs: &Tensor) -> Tensor {
                    build(ActivationKind::$name, inputs, &[])
                }

                fn parameters(&self) -> Vec<Tensor> {
                    Vec::new()
                }
            }
        )+
    };
}

parametric_modules!(
    OptimA,
    ParametricPolyTanh,
    AdaptiveRationalSoftsign,
    OptimXTemporal,
    ParametricGaussianActivation,
    LearnableFourierActivation,
    AELuC,
    ParametricSmoothStep,
    AdaptiveBiHyperbolic,
    ParametricLogish,
    AdaptSigmoidReLU,
    ParametricLambertWActivation,
    AdaptiveHyperbolicLogarithm,
    ParametricGeneralizedGompertzActivation,
    ComplexHarmonicActivation,
    WeibullSoftplusActivation,
    AdaptiveErfSwish,
    ParametricBetaSoftsign,
    ParametricArcSinhGate,
    GeneralizedAlphaSigmoid,
    EllipticGaussianActivation,
);

static_modules!(
    SinhGate,
    SoftRBF,
    ATanSigmoid,
    ExpoSoft,
    HarmonicTanh,
    RationalSoftplus,
    UnifiedSineExp,
    SigmoidErf,
    LogCoshGate,
    TanhArc,
    RiemannianSoftsignActivation,
    QuantumTanhActivation,
    LogExponentialActivation,
    BipolarGaussianArctanActivation,
    ExpArcTanHarmonicActivation,
    LogisticWActivation,
);

/// A parameter value as the 0-d array the graph expects.
pub(crate) fn scalar_param(value: f32) -> ArrayD<f32> {
    arr0(value).into_dyn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::NodeType;

    #[test]
    fn parameters_are_named_after_the_module() {
        let ctx = GraphContext::shared();
        let act = ActivationModule::new(&ctx, ActivationKind::ParametricLogish, "act");
        assert_eq!(act.parameter_names(), vec!["act.alpha", "act.beta"]);
        assert_eq!(act.parameters().len(), 2);
        assert_eq!(ctx.borrow().main_graph().parameter_names(), vec!["act.alpha", "act.beta"]);

        let values = act.initial_values();
        assert_eq!(values["act.alpha"], Value::Tensor(scalar_param(1.0)));
    }

    #[test]
    fn config_values_must_match_the_kind() {
        let ctx = GraphContext::shared();
        let act = ActivationModule::new(&ctx, ActivationKind::OptimA, "a");
        let other = ActivationConfig::new(ActivationKind::ParametricLogish);
        assert!(matches!(act.values_from_config(&other), Err(ActixError::KindMismatch { .. })));

        let config = ActivationConfig::new(ActivationKind::OptimA).with_param("beta", 0.25).unwrap();
        let values = act.values_from_config(&config).unwrap();
        assert_eq!(values["a.beta"], Value::Tensor(scalar_param(0.25)));
        assert_eq!(act.config_from_values(&values).unwrap().resolved_params(), config.resolved_params());
    }

    #[test]
    fn parameter_values_hold_one_element() {
        let ctx = GraphContext::shared();
        let act = ActivationModule::new(&ctx, ActivationKind::ParametricLogish, "act");

        let one = HashMap::from([("act.alpha".to_string(), Value::Tensor(ArrayD::from_elem(vec![1, 1], 1.5)))]);
        assert_eq!(act.config_from_values(&one).unwrap().resolved_params(), vec![1.5, 1.0]);

        let wide = HashMap::from([("act.alpha".to_string(), Value::Tensor(ArrayD::from_elem(vec![3], 1.5)))]);
        assert!(matches!(act.config_from_values(&wide), Err(ActixError::ShapeMismatch { .. })));
    }

    #[test]
    fn static_layers_add_no_parameters() {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x");
        let y = SoftRBF::new().forward(&x);
        let ctx = ctx.borrow();
        let graph = ctx.main_graph();
        assert!(graph.parameter_names().is_empty());
        assert!(matches!(graph.get_node(y.node_id).unwrap().node_type, NodeType::Multiply(_, _)));
    }

    #[test]
    fn typed_wrappers_expose_the_module() {
        let ctx = GraphContext::shared();
        let gate = ParametricArcSinhGate::new(&ctx, "gate");
        assert_eq!(gate.kind(), ActivationKind::ParametricArcSinhGate);
        assert_eq!(gate.parameters().len(), 2);
    }
}
