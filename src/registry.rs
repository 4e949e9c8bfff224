//! Registry of every activation the crate provides.
//!
//! `ActivationKind` is the single source of truth for names, parameter lists
//! and defaults. Both execution systems (`nn` for the graph, `functional` for
//! eager evaluation) dispatch on it, and the CLI resolves names through it.

use crate::error::ActixError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trainable scalar parameter of a parametric activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f32,
}

const fn p(name: &'static str, default: f32) -> ParamSpec {
    ParamSpec { name, default }
}

macro_rules! activation_kinds {
    (
        parametric { $( $pvariant:ident => ($pname:literal, $pdisplay:literal, [$($param:expr),+ $(,)?]) ),+ $(,)? }
        fixed { $( $svariant:ident => ($sname:literal, $sdisplay:literal) ),+ $(,)? }
    ) => {
        /// Every activation function known to the crate.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum ActivationKind {
            $( $pvariant, )+
            $( $svariant, )+
        }

        impl ActivationKind {
            /// All kinds: parametric first, then static.
            pub const ALL: &'static [ActivationKind] = &[
                $( ActivationKind::$pvariant, )+
                $( ActivationKind::$svariant, )+
            ];

            /// Stable snake_case identifier.
            pub fn name(self) -> &'static str {
                match self {
                    $( ActivationKind::$pvariant => $pname, )+
                    $( ActivationKind::$svariant => $sname, )+
                }
            }

            /// Human-readable name.
            pub fn display_name(self) -> &'static str {
                match self {
                    $( ActivationKind::$pvariant => $pdisplay, )+
                    $( ActivationKind::$svariant => $sdisplay, )+
                }
            }

            /// Trainable parameters, in the order the formulas consume them.
            pub fn parameters(self) -> &'static [ParamSpec] {
                match self {
                    $( ActivationKind::$pvariant => {
                        const SPECS: &[ParamSpec] = &[$($param),+];
                        SPECS
                    } )+
                    $( ActivationKind::$svariant => &[], )+
                }
            }
        }
    };
}

activation_kinds! {
    parametric {
        OptimA => ("optim_a", "OptimA",
            [p("alpha", 1.0), p("beta", 0.5), p("gamma", 1.0), p("delta", 0.5), p("lambda", 1.0)]),
        ParametricPolyTanh => ("parametric_poly_tanh", "ParametricPolyTanh",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 0.0), p("delta", 0.0)]),
        AdaptiveRationalSoftsign => ("adaptive_rational_softsign", "AdaptiveRationalSoftsign",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 2.0)]),
        OptimXTemporal => ("optim_x_temporal", "OptimXTemporal",
            [p("alpha", 0.5), p("beta", 1.0), p("gamma", 0.5), p("delta", 1.0)]),
        ParametricGaussianActivation => ("parametric_gaussian", "ParametricGaussianActivation",
            [p("alpha", 1.0), p("beta", 1.0)]),
        LearnableFourierActivation => ("learnable_fourier", "LearnableFourierActivation",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 0.0), p("delta", 1.0), p("lambda", 1.0), p("phi", 0.0)]),
        AELuC => ("a_eluc", "A_ELuC",
            [p("alpha", 0.5), p("beta", 1.0), p("gamma", 0.5), p("delta", 1.0)]),
        ParametricSmoothStep => ("parametric_smooth_step", "ParametricSmoothStep",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 0.0), p("delta", 1.0), p("mu", 0.0)]),
        AdaptiveBiHyperbolic => ("adaptive_bi_hyperbolic", "AdaptiveBiHyperbolic",
            [p("alpha", 0.5), p("beta", 1.0), p("gamma", 1.0)]),
        ParametricLogish => ("parametric_logish", "ParametricLogish",
            [p("alpha", 1.0), p("beta", 1.0)]),
        AdaptSigmoidReLU => ("adapt_sigmoid_relu", "AdaptSigmoidReLU",
            [p("alpha", 0.5), p("beta", 1.0), p("gamma", 0.5), p("delta", 1.0)]),
        ParametricLambertWActivation => ("parametric_lambert_w", "ParametricLambertWActivation",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0)]),
        AdaptiveHyperbolicLogarithm => ("adaptive_hyperbolic_logarithm", "AdaptiveHyperbolicLogarithm",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0), p("delta", 0.5)]),
        ParametricGeneralizedGompertzActivation => ("parametric_generalized_gompertz", "ParametricGeneralizedGompertzActivation",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0), p("delta", 0.0)]),
        ComplexHarmonicActivation => ("complex_harmonic", "ComplexHarmonicActivation",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0), p("delta", 1.0), p("lambda", 0.0)]),
        WeibullSoftplusActivation => ("weibull_softplus", "WeibullSoftplusActivation",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 0.0), p("delta", 1.0), p("lambda", 1.0), p("mu", 1.0)]),
        AdaptiveErfSwish => ("adaptive_erf_swish", "AdaptiveErfSwish",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0)]),
        ParametricBetaSoftsign => ("parametric_beta_softsign", "ParametricBetaSoftsign",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0)]),
        ParametricArcSinhGate => ("parametric_arcsinh_gate", "ParametricArcSinhGate",
            [p("alpha", 1.0), p("beta", 1.0)]),
        GeneralizedAlphaSigmoid => ("generalized_alpha_sigmoid", "GeneralizedAlphaSigmoid",
            [p("alpha", 1.0), p("beta", 1.0), p("gamma", 1.0), p("delta", 1.0)]),
        EllipticGaussianActivation => ("elliptic_gaussian", "EllipticGaussianActivation",
            [p("m", 0.5)]),
    }
    fixed {
        SinhGate => ("sinh_gate", "SinhGate"),
        SoftRBF => ("soft_rbf", "SoftRBF"),
        ATanSigmoid => ("atan_sigmoid", "ATanSigmoid"),
        ExpoSoft => ("expo_soft", "ExpoSoft"),
        HarmonicTanh => ("harmonic_tanh", "HarmonicTanh"),
        RationalSoftplus => ("rational_softplus", "RationalSoftplus"),
        UnifiedSineExp => ("unified_sine_exp", "UnifiedSineExp"),
        SigmoidErf => ("sigmoid_erf", "SigmoidErf"),
        LogCoshGate => ("log_cosh_gate", "LogCoshGate"),
        TanhArc => ("tanh_arc", "TanhArc"),
        RiemannianSoftsignActivation => ("riemannian_softsign", "RiemannianSoftsignActivation"),
        QuantumTanhActivation => ("quantum_tanh", "QuantumTanhActivation"),
        LogExponentialActivation => ("log_exponential", "LogExponentialActivation"),
        BipolarGaussianArctanActivation => ("bipolar_gaussian_arctan", "BipolarGaussianArctanActivation"),
        ExpArcTanHarmonicActivation => ("exp_arctan_harmonic", "ExpArcTanHarmonicActivation"),
        LogisticWActivation => ("logistic_w", "LogisticWActivation"),
    }
}

impl ActivationKind {
    pub fn is_parametric(self) -> bool {
        !self.parameters().is_empty()
    }

    pub fn default_parameters(self) -> Vec<f32> {
        self.parameters().iter().map(|spec| spec.default).collect()
    }

    /// Position of a parameter in [`ActivationKind::parameters`].
    pub fn parameter_index(self, name: &str) -> Option<usize> {
        self.parameters().iter().position(|spec| spec.name == name)
    }

    pub fn parametric() -> impl Iterator<Item = ActivationKind> {
        Self::ALL.iter().copied().filter(|kind| kind.is_parametric())
    }

    pub fn fixed() -> impl Iterator<Item = ActivationKind> {
        Self::ALL.iter().copied().filter(|kind| !kind.is_parametric())
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationKind {
    type Err = ActixError;

    /// Accepts the snake_case name or the display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| {
                kind.name().eq_ignore_ascii_case(wanted)
                    || kind.display_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ActixError::UnknownActivation(wanted.to_string()))
    }
}

impl TryFrom<String> for ActivationKind {
    type Error = ActixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActivationKind> for String {
    fn from(kind: ActivationKind) -> Self {
        kind.name().to_string()
    }
}
