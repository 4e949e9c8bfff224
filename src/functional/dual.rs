//! Forward-mode dual numbers: `v + d·ε` with `ε² = 0`.

use super::scalar::Scalar;
use crate::special;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A value and its derivative with respect to one seeded input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    pub v: f32,
    pub d: f32,
}

impl Dual {
    pub fn new(v: f32, d: f32) -> Self {
        Self { v, d }
    }

    /// An input we differentiate with respect to (`d = 1`).
    pub fn variable(v: f32) -> Self {
        Self { v, d: 1.0 }
    }

    pub fn constant(v: f32) -> Self {
        Self { v, d: 0.0 }
    }

    /// Applies the chain rule for a unary function with value `v` and slope `slope`.
    fn chain(self, v: f32, slope: f32) -> Self {
        // 0 * inf would be NaN
        let d = if self.d == 0.0 { 0.0 } else { self.d * slope };
        Self { v, d }
    }
}

impl Add for Dual {
    type Output = Dual;
    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.v + rhs.v, self.d + rhs.d)
    }
}

impl Sub for Dual {
    type Output = Dual;
    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.v - rhs.v, self.d - rhs.d)
    }
}

impl Mul for Dual {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(self.v * rhs.v, self.d * rhs.v + self.v * rhs.d)
    }
}

impl Div for Dual {
    type Output = Dual;
    fn div(self, rhs: Dual) -> Dual {
        Dual::new(
            self.v / rhs.v,
            (self.d * rhs.v - self.v * rhs.d) / (rhs.v * rhs.v),
        )
    }
}

impl Neg for Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual::new(-self.v, -self.d)
    }
}

impl Scalar for Dual {
    fn cst(value: f32) -> Self {
        Dual::constant(value)
    }

    fn value(self) -> f32 {
        self.v
    }

    fn exp(self) -> Self {
        let e = self.v.exp();
        self.chain(e, e)
    }

    fn ln(self) -> Self {
        self.chain(self.v.ln(), 1.0 / self.v)
    }

    fn sin(self) -> Self {
        self.chain(self.v.sin(), self.v.cos())
    }

    fn cos(self) -> Self {
        self.chain(self.v.cos(), -self.v.sin())
    }

    fn tan(self) -> Self {
        let t = self.v.tan();
        self.chain(t, 1.0 + t * t)
    }

    fn atan(self) -> Self {
        self.chain(self.v.atan(), 1.0 / (1.0 + self.v * self.v))
    }

    fn sinh(self) -> Self {
        self.chain(self.v.sinh(), self.v.cosh())
    }

    fn cosh(self) -> Self {
        self.chain(self.v.cosh(), self.v.sinh())
    }

    fn tanh(self) -> Self {
        let t = self.v.tanh();
        self.chain(t, 1.0 - t * t)
    }

    fn asinh(self) -> Self {
        self.chain(self.v.asinh(), 1.0 / (self.v * self.v + 1.0).sqrt())
    }

    fn abs(self) -> Self {
        self.chain(self.v.abs(), special::sign(self.v))
    }

    fn sign(self) -> Self {
        Dual::constant(special::sign(self.v))
    }

    fn powf(self, exponent: Self) -> Self {
        let v = self.v.powf(exponent.v);
        let mut d = 0.0;
        if self.d != 0.0 && exponent.v != 0.0 {
            d += exponent.v * self.v.powf(exponent.v - 1.0) * self.d;
        }
        // d/db a^b = a^b ln a, which tends to 0 as a -> 0+.
        if exponent.d != 0.0 && self.v > 0.0 {
            d += v * self.v.ln() * exponent.d;
        }
        Dual::new(v, d)
    }

    fn erf(self) -> Self {
        self.chain(special::erf(self.v), special::erf_derivative(self.v))
    }

    fn sigmoid(self) -> Self {
        let s = special::sigmoid(self.v);
        self.chain(s, s * (1.0 - s))
    }

    fn softplus(self) -> Self {
        let slope = if self.v > special::SOFTPLUS_THRESHOLD {
            1.0
        } else {
            special::sigmoid(self.v)
        };
        self.chain(special::softplus(self.v, 1.0), slope)
    }

    fn elu(self) -> Self {
        let slope = if self.v > 0.0 { 1.0 } else { self.v.exp() };
        self.chain(special::elu(self.v, 1.0), slope)
    }

    fn relu(self) -> Self {
        let slope = if self.v > 0.0 { 1.0 } else { 0.0 };
        self.chain(self.v.max(0.0), slope)
    }

    fn clamp(self, min: f32, max: f32) -> Self {
        let slope = if self.v > min && self.v < max { 1.0 } else { 0.0 };
        self.chain(self.v.clamp(min, max), slope)
    }

    fn lambert_w(self) -> Self {
        let w = special::lambert_w(self.v);
        self.chain(w, special::lambert_w_derivative_from_value(w))
    }

    fn cn(self, m: Self) -> Self {
        let v = special::ellipj_cn(self.v, m.v);
        let mut d = 0.0;
        if self.d != 0.0 {
            d += special::ellipj_cn_grad_u(self.v, m.v) * self.d;
        }
        if m.d != 0.0 {
            d += special::ellipj_cn_grad_m(self.v, m.v) * m.d;
        }
        Dual::new(v, d)
    }
}
