//! The element type the eager activations are written against.

use crate::special;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Arithmetic plus the transcendental functions the activation catalogue uses.
///
/// Implemented for `f32` (plain evaluation) and [`Dual`](super::dual::Dual)
/// (value and derivative in one pass).
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// A constant (derivative zero).
    fn cst(value: f32) -> Self;
    /// The primal value.
    fn value(self) -> f32;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn asinh(self) -> Self;
    fn abs(self) -> Self;
    /// `sign(0) = 0`.
    fn sign(self) -> Self;
    fn powf(self, exponent: Self) -> Self;
    fn erf(self) -> Self;
    fn sigmoid(self) -> Self;
    /// `softplus` with `beta = 1` and threshold 20.
    fn softplus(self) -> Self;
    /// ELU with `alpha = 1`.
    fn elu(self) -> Self;
    fn relu(self) -> Self;
    fn clamp(self, min: f32, max: f32) -> Self;
    /// Principal branch of Lambert W.
    fn lambert_w(self) -> Self;
    /// Jacobi elliptic `cn(self | m)`.
    fn cn(self, m: Self) -> Self;

    fn square(self) -> Self {
        self * self
    }

    fn recip(self) -> Self {
        Self::cst(1.0) / self
    }

    fn softsign(self) -> Self {
        self / (Self::cst(1.0) + self.abs())
    }
}

impl Scalar for f32 {
    fn cst(value: f32) -> Self {
        value
    }

    fn value(self) -> f32 {
        self
    }

    fn exp(self) -> Self {
        f32::exp(self)
    }

    fn ln(self) -> Self {
        f32::ln(self)
    }

    fn sin(self) -> Self {
        f32::sin(self)
    }

    fn cos(self) -> Self {
        f32::cos(self)
    }

    fn tan(self) -> Self {
        f32::tan(self)
    }

    fn atan(self) -> Self {
        f32::atan(self)
    }

    fn sinh(self) -> Self {
        f32::sinh(self)
    }

    fn cosh(self) -> Self {
        f32::cosh(self)
    }

    fn tanh(self) -> Self {
        f32::tanh(self)
    }

    fn asinh(self) -> Self {
        f32::asinh(self)
    }

    fn abs(self) -> Self {
        f32::abs(self)
    }

    fn sign(self) -> Self {
        special::sign(self)
    }

    fn powf(self, exponent: Self) -> Self {
        f32::powf(self, exponent)
    }

    fn erf(self) -> Self {
        special::erf(self)
    }

    fn sigmoid(self) -> Self {
        special::sigmoid(self)
    }

    fn softplus(self) -> Self {
        special::softplus(self, 1.0)
    }

    fn elu(self) -> Self {
        special::elu(self, 1.0)
    }

    fn relu(self) -> Self {
        self.max(0.0)
    }

    fn clamp(self, min: f32, max: f32) -> Self {
        f32::clamp(self, min, max)
    }

    fn lambert_w(self) -> Self {
        special::lambert_w(self)
    }

    fn cn(self, m: Self) -> Self {
        special::ellipj_cn(self, m)
    }
}
