//! Generic scalar definitions of every activation.
//!
//! `p` holds the parameters in [`ActivationKind::parameters`] order; static
//! kinds ignore it.

use super::scalar::Scalar;
use crate::registry::ActivationKind;

const EPS: f32 = 1e-7;

/// Evaluates `kind` at `x`. `p` holds every parameter of `kind`, in registry
/// order; [`super::Activation`] guarantees that.
pub(crate) fn evaluate<S: Scalar>(kind: ActivationKind, p: &[S], x: S) -> S {
    use ActivationKind::*;

    let one = S::cst(1.0);
    let eps = S::cst(EPS);

    match kind {
        OptimA => {
            let (alpha, beta, gamma, delta, lambda) = (p[0], p[1], p[2], p[3], p[4]);
            alpha * (beta * x).tanh() + gamma * (delta * x).softplus() * (lambda * x).sigmoid()
        }
        ParametricPolyTanh => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * (beta * x.square() + gamma * x + delta).tanh()
        }
        AdaptiveRationalSoftsign => {
            let (alpha, beta, gamma) = (p[0], p[1], p[2]);
            (alpha * x) / (one + (beta * x).abs().powf(gamma))
        }
        OptimXTemporal => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * (beta * x).tanh() + gamma * (delta * x).sigmoid()
        }
        ParametricGaussianActivation => {
            let (alpha, beta) = (p[0], p[1]);
            alpha * x * (-beta * x.square()).exp()
        }
        LearnableFourierActivation => {
            let (alpha, beta, gamma, delta, lambda, phi) = (p[0], p[1], p[2], p[3], p[4], p[5]);
            alpha * (beta * x + gamma).sin() + delta * (lambda * x + phi).cos()
        }
        AELuC => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * (beta * x).elu() + gamma * x * (delta * x).sigmoid()
        }
        ParametricSmoothStep => {
            let (alpha, beta, gamma, delta, mu) = (p[0], p[1], p[2], p[3], p[4]);
            alpha * (beta * (x - gamma)).sigmoid() - alpha * (delta * (x + mu)).sigmoid()
        }
        AdaptiveBiHyperbolic => {
            let (alpha, beta, gamma) = (p[0], p[1], p[2]);
            let t = (gamma * x).tanh();
            alpha * (beta * x).tanh() + (one - alpha) * t * t * t
        }
        ParametricLogish => {
            let (alpha, beta) = (p[0], p[1]);
            alpha * x * (beta * x).sigmoid()
        }
        AdaptSigmoidReLU => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * x * (beta * x).sigmoid() + gamma * (delta * x).relu()
        }
        ParametricLambertWActivation => {
            let (alpha, beta, gamma) = (p[0], p[1], p[2]);
            alpha * x * (beta.abs() * (gamma * x).exp()).lambert_w()
        }
        AdaptiveHyperbolicLogarithm => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * (beta * x).asinh() + gamma * (delta.abs() + x.square() + eps).ln()
        }
        ParametricGeneralizedGompertzActivation => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            alpha * (-beta * (-gamma * x).exp()).exp() - delta
        }
        ComplexHarmonicActivation => {
            let (alpha, beta, gamma, delta, lambda) = (p[0], p[1], p[2], p[3], p[4]);
            alpha * (beta * x).tanh() + gamma * (delta * x.square() + lambda).sin()
        }
        WeibullSoftplusActivation => {
            let (alpha, beta, gamma, delta, lambda, mu) = (p[0], p[1], p[2], p[3], p[4], p[5]);
            let gate = alpha * x * (beta * (x - gamma)).sigmoid();
            let exponent = lambda.abs() * (x.abs() + eps).powf(mu.abs());
            gate + delta * (one - (-exponent).exp())
        }
        AdaptiveErfSwish => {
            let (alpha, beta, gamma) = (p[0], p[1], p[2]);
            alpha * x * (beta * x).erf() * (gamma * x).sigmoid()
        }
        ParametricBetaSoftsign => {
            let (alpha, beta, gamma) = (p[0], p[1], p[2]);
            let abs_x = x.abs();
            let numerator = abs_x.powf(beta.abs());
            let denominator = one + abs_x.powf(gamma.abs()) + eps;
            alpha * (numerator / denominator) * x.sign()
        }
        ParametricArcSinhGate => {
            let (alpha, beta) = (p[0], p[1]);
            alpha * x * (beta * x).asinh()
        }
        GeneralizedAlphaSigmoid => {
            let (alpha, beta, gamma, delta) = (p[0], p[1], p[2], p[3]);
            let base = one + (beta * x).abs().powf(gamma.abs());
            let inv_delta = one / (delta.abs() + eps);
            (alpha * x) / (base.powf(inv_delta) + eps)
        }
        EllipticGaussianActivation => {
            let m = p[0].clamp(0.0, 1.0);
            x * (-x.cn(m)).exp()
        }

        SinhGate => x * x.sinh(),
        SoftRBF => x * (-x.square()).exp(),
        ATanSigmoid => x.atan() * x.sigmoid(),
        ExpoSoft => x.softsign() * (-x.abs()).exp(),
        HarmonicTanh => x.tanh() + x.sin(),
        RationalSoftplus => {
            let swish = x * x.sigmoid();
            swish / (S::cst(0.5) + swish + eps)
        }
        UnifiedSineExp => x * (-x.square()).exp().sin(),
        SigmoidErf => x.sigmoid() * x.erf(),
        LogCoshGate => x * (x.cosh() + eps).ln(),
        TanhArc => x.tanh() * x.atan(),
        RiemannianSoftsignActivation => (x.atan() * x.erf()) / (one + x.abs() + eps),
        QuantumTanhActivation => x.tanh() * (-x.tan().square()).exp(),
        LogExponentialActivation => {
            let abs_x = x.abs();
            let exponent = abs_x - (abs_x + eps).recip();
            x.sign() * (one + exponent.exp() + eps).ln()
        }
        BipolarGaussianArctanActivation => x.atan() * (-x.square()).exp(),
        ExpArcTanHarmonicActivation => (-x.square()).exp() * x.atan() * x.sin(),
        LogisticWActivation => {
            let w = x.exp().lambert_w();
            x / (one + (-x * w).exp() + eps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::E;

    fn eval(kind: ActivationKind, x: f32) -> f32 {
        evaluate(kind, &kind.default_parameters(), x)
    }

    #[test]
    fn static_reference_values() {
        assert!((eval(ActivationKind::SinhGate, 1.0) - 1.0_f32.sinh()).abs() < 1e-6);
        assert!((eval(ActivationKind::SoftRBF, 1.0) - 1.0 / E).abs() < 1e-6);
        assert!((eval(ActivationKind::HarmonicTanh, 0.0)).abs() < 1e-7);
        assert!((eval(ActivationKind::TanhArc, 1.0) - 1.0_f32.tanh() * 1.0_f32.atan()).abs() < 1e-6);
    }

    #[test]
    fn logish_with_defaults_is_swish() {
        for x in [-3.0_f32, -0.5, 0.0, 0.7, 4.0] {
            let swish = x / (1.0 + (-x).exp());
            assert!((eval(ActivationKind::ParametricLogish, x) - swish).abs() < 1e-6);
        }
    }

    #[test]
    fn gompertz_defaults() {
        // alpha * exp(-beta * exp(-gamma * 0)) - delta = exp(-1)
        assert!((eval(ActivationKind::ParametricGeneralizedGompertzActivation, 0.0) - 1.0 / E).abs() < 1e-6);
    }

    #[test]
    fn symmetric_activations_keep_their_parity() {
        let cases = [
            (ActivationKind::SinhGate, true),
            (ActivationKind::SoftRBF, false),
            (ActivationKind::ExpoSoft, false),
            (ActivationKind::BipolarGaussianArctanActivation, false),
            (ActivationKind::ParametricBetaSoftsign, false),
        ];
        for (kind, even) in cases {
            let (a, b) = (eval(kind, 0.8), eval(kind, -0.8));
            if even {
                assert!((a - b).abs() < 1e-6, "{kind} should be even");
            } else {
                assert!((a + b).abs() < 1e-6, "{kind} should be odd");
            }
        }
    }

    #[test]
    fn elliptic_gaussian_at_origin() {
        // cn(0 | m) = 1, so f(0) = 0 * e^-1 = 0 and f is smooth there.
        assert_eq!(eval(ActivationKind::EllipticGaussianActivation, 0.0), 0.0);
    }

    #[test]
    fn lambert_w_activation_defaults() {
        // x * W(e^x) at x = 1 is W(e) = 1.
        assert!((eval(ActivationKind::ParametricLambertWActivation, 1.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn log_exponential_is_zero_at_origin() {
        assert_eq!(eval(ActivationKind::LogExponentialActivation, 0.0), 0.0);
    }
}
