//! Activation layers for the graph API.
//!
//! Every activation in the catalogue is available as a [`Module`]. Parametric
//! ones register their parameters as `Parameter` nodes named
//! `"{layer}.{param}"`; static ones are unit structs.
//!
//! ```ignore
//! use actix::nn::{Module, OptimA, SinhGate};
//! use actix::tensor::{GraphContext, Tensor};
//!
//! let ctx = GraphContext::shared();
//! let x = Tensor::new_input(&ctx, "x");
//! let h = OptimA::new(&ctx, "act1").forward(&x);
//! let y = SinhGate::new().forward(&h);
//! ```

pub mod activations;
pub mod module;

pub use activations::{
    ActivationModule, AELuC, ATanSigmoid, AdaptSigmoidReLU, AdaptiveBiHyperbolic,
    AdaptiveErfSwish, AdaptiveHyperbolicLogarithm, AdaptiveRationalSoftsign,
    BipolarGaussianArctanActivation, ComplexHarmonicActivation, EllipticGaussianActivation,
    ExpArcTanHarmonicActivation, ExpoSoft, GeneralizedAlphaSigmoid, HarmonicTanh,
    LearnableFourierActivation, LogCoshGate, LogExponentialActivation, LogisticWActivation,
    OptimA, OptimXTemporal, ParametricArcSinhGate, ParametricBetaSoftsign,
    ParametricGaussianActivation, ParametricGeneralizedGompertzActivation,
    ParametricLambertWActivation, ParametricLogish, ParametricPolyTanh, ParametricSmoothStep,
    QuantumTanhActivation, RationalSoftplus, RiemannianSoftsignActivation, SigmoidErf,
    SinhGate, SoftRBF, TanhArc, UnifiedSineExp, WeibullSoftplusActivation,
};
pub use module::Module;
