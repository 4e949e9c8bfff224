//! Scalar special functions shared by the graph backend and the eager API.
//!
//! Both execution paths call into this module so that the two agree bit-for-bit
//! on the non-elementary pieces (`erf`, Lambert W, Jacobi `cn`).

use std::f64::consts::PI;

/// Newton iterations used by [`lambert_w`].
pub const LAMBERT_W_ITERATIONS: usize = 8;

/// Threshold above which `softplus(x)` returns `x` unchanged.
pub const SOFTPLUS_THRESHOLD: f32 = 20.0;

/// Logistic sigmoid, evaluated without overflowing `exp` for large `|x|`.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^(beta*x)) / beta`, linear above [`SOFTPLUS_THRESHOLD`].
pub fn softplus(x: f32, beta: f32) -> f32 {
    let bx = beta * x;
    if bx > SOFTPLUS_THRESHOLD {
        x
    } else {
        bx.exp().ln_1p() / beta
    }
}

/// ELU: `x` for positive inputs, `alpha * (e^x - 1)` otherwise.
pub fn elu(x: f32, alpha: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        alpha * x.exp_m1()
    }
}

/// Sign with `sign(0) = 0`, unlike `f32::signum`.
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Gauss error function.
///
/// Rational approximation (Abramowitz & Stegun 7.1.26) evaluated in `f64`;
/// absolute error stays below `1.5e-7`, which is under `f32` resolution for
/// the range where `erf` is not saturated.
pub fn erf(x: f32) -> f32 {
    const P: f64 = 0.327_591_1;
    const A: [f64; 5] = [
        0.254_829_592,
        -0.284_496_736,
        1.421_413_741,
        -1.453_152_027,
        1.061_405_429,
    ];

    let x = x as f64;
    let ax = x.abs();
    let t = 1.0 / (1.0 + P * ax);
    let poly = A.iter().rev().fold(0.0, |acc, &a| acc * t + a) * t;
    let y = 1.0 - poly * (-ax * ax).exp();
    (y.copysign(x)) as f32
}

/// `d/dx erf(x) = 2/sqrt(pi) * exp(-x^2)`.
pub fn erf_derivative(x: f32) -> f32 {
    let x = x as f64;
    (2.0 / PI.sqrt() * (-x * x).exp()) as f32
}

/// Principal branch of the Lambert W function for `z >= 0`.
///
/// Starts from `z` (for `z < 1`) or `ln z`, then runs
/// [`LAMBERT_W_ITERATIONS`] Newton steps, keeping the iterate non-negative.
pub fn lambert_w(z: f32) -> f32 {
    if z.is_nan() {
        return f32::NAN;
    }
    if z.is_infinite() {
        return f32::INFINITY;
    }

    let z = z as f64;
    let mut w = if z < 1.0 { z } else { (z + 1e-38).ln() };
    w = w.max(0.0);
    for _ in 0..LAMBERT_W_ITERATIONS {
        let ew = w.exp();
        let residual = w * ew - z;
        let denominator = ew * (w + 1.0) + 1e-20;
        w = (w - residual / denominator).max(0.0);
    }
    w as f32
}

/// Derivative of W expressed through its value: `W'(z) = e^(-W) / (1 + W)`.
///
/// This form stays finite at `z = 0`, where the textbook `W / (z (1 + W))`
/// is `0/0`.
pub fn lambert_w_derivative_from_value(w: f32) -> f32 {
    (-w).exp() / (1.0 + w)
}

/// Unclamped four-term Maclaurin series of `cn(u | m)`.
fn cn_series(u: f32, m: f32) -> f32 {
    let u2 = u * u;
    let u4 = u2 * u2;
    let u6 = u4 * u2;
    1.0 - u2 / 2.0 + (u4 / 24.0) * (1.0 + 4.0 * m) - (u6 / 720.0) * (1.0 + 44.0 * m + 16.0 * m * m)
}

/// Jacobi elliptic function `cn(u | m)` from its truncated series, clamped to `[-1, 1]`.
pub fn ellipj_cn(u: f32, m: f32) -> f32 {
    cn_series(u, m).clamp(-1.0, 1.0)
}

fn cn_clamped(u: f32, m: f32) -> bool {
    let raw = cn_series(u, m);
    !(-1.0..=1.0).contains(&raw)
}

/// `d cn / du` of the clamped series. Zero where the clamp is active.
pub fn ellipj_cn_grad_u(u: f32, m: f32) -> f32 {
    if cn_clamped(u, m) {
        return 0.0;
    }
    let u3 = u * u * u;
    let u5 = u3 * u * u;
    -u + (u3 / 6.0) * (1.0 + 4.0 * m) - (u5 / 120.0) * (1.0 + 44.0 * m + 16.0 * m * m)
}

/// `d cn / dm` of the clamped series. Zero where the clamp is active.
pub fn ellipj_cn_grad_m(u: f32, m: f32) -> f32 {
    if cn_clamped(u, m) {
        return 0.0;
    }
    let u4 = u * u * u * u;
    let u6 = u4 * u * u;
    u4 / 6.0 - (u6 / 720.0) * (44.0 + 32.0 * m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erf_matches_reference_values() {
        // Reference values from tables of the error function.
        let cases = [(0.0, 0.0), (0.5, 0.520_499_9), (1.0, 0.842_700_8), (2.0, 0.995_322_3)];
        for (x, expected) in cases {
            assert!((erf(x) - expected).abs() < 1e-6, "erf({x}) = {}", erf(x));
            assert!((erf(-x) + expected).abs() < 1e-6);
        }
    }

    #[test]
    fn lambert_w_inverts_w_exp_w() {
        assert_eq!(lambert_w(0.0), 0.0);
        assert!((lambert_w(std::f32::consts::E) - 1.0).abs() < 1e-5);
        for z in [0.1_f32, 0.5, 2.0, 10.0, 150.0] {
            let w = lambert_w(z);
            assert!((w * w.exp() - z).abs() / z < 1e-4, "W({z}) = {w}");
        }
    }

    #[test]
    fn lambert_w_derivative_matches_finite_difference() {
        for z in [0.3_f32, 1.0, 4.0] {
            let h = 1e-3;
            let numeric = (lambert_w(z + h) - lambert_w(z - h)) / (2.0 * h);
            let analytic = lambert_w_derivative_from_value(lambert_w(z));
            assert!((numeric - analytic).abs() < 1e-3, "z={z}: {numeric} vs {analytic}");
        }
    }

    #[test]
    fn cn_is_one_at_origin_and_clamped() {
        assert_eq!(ellipj_cn(0.0, 0.5), 1.0);
        assert_eq!(ellipj_cn(3.0, 0.5), -1.0);
        assert_eq!(ellipj_cn_grad_u(3.0, 0.5), 0.0);
        assert_eq!(ellipj_cn_grad_m(3.0, 0.5), 0.0);
    }

    #[test]
    fn cn_gradients_match_finite_differences() {
        let (u, m) = (0.8_f32, 0.3_f32);
        let h = 1e-3;
        let du = (ellipj_cn(u + h, m) - ellipj_cn(u - h, m)) / (2.0 * h);
        let dm = (ellipj_cn(u, m + h) - ellipj_cn(u, m - h)) / (2.0 * h);
        assert!((du - ellipj_cn_grad_u(u, m)).abs() < 1e-3);
        assert!((dm - ellipj_cn_grad_m(u, m)).abs() < 1e-3);
    }

    #[test]
    fn softplus_and_sigmoid_are_stable() {
        assert_eq!(softplus(50.0, 1.0), 50.0);
        assert!((softplus(0.0, 1.0) - std::f32::consts::LN_2).abs() < 1e-6);
        assert!(sigmoid(-100.0) >= 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-7);
        assert_eq!(sign(0.0), 0.0);
    }
}
