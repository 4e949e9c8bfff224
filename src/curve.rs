//! Sampled activation curves for plotting and export.

use crate::error::{ActixError, Result};
use crate::functional::Activation;
use crate::registry::ActivationKind;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// `f(x)` and `f'(x)` on an evenly spaced grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub kind: ActivationKind,
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
    pub dys: Vec<f32>,
}

impl Curve {
    /// Samples `steps` points from `start` to `end`, both included.
    pub fn sample(activation: &Activation, start: f32, end: f32, steps: usize) -> Result<Self> {
        if steps < 2 || !(start < end) || !start.is_finite() || !end.is_finite() {
            return Err(ActixError::InvalidRange { start, end, steps });
        }
        let xs = Array1::linspace(start, end, steps).into_dyn();
        let ys = activation.forward(&xs);
        let dys = activation.derivative(&xs);
        Ok(Self {
            kind: activation.kind(),
            xs: xs.into_iter().collect(),
            ys: ys.into_iter().collect(),
            dys: dys.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Smallest and largest finite value of `ys` (and of `dys` if `with_derivative`).
    pub fn value_range(&self, with_derivative: bool) -> Option<(f32, f32)> {
        let derivative = if with_derivative { self.dys.as_slice() } else { &[] };
        self.ys
            .iter()
            .chain(derivative)
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// `x,y,dy` rows with a header line.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("x,y,dy\n");
        for ((x, y), dy) in self.xs.iter().zip(&self.ys).zip(&self.dys) {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{x},{y},{dy}");
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_includes_both_ends() {
        let curve = Curve::sample(&Activation::new(ActivationKind::SoftRBF), -2.0, 2.0, 5).unwrap();
        assert_eq!(curve.xs, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(curve.len(), 5);
        assert_eq!(curve.ys[2], 0.0);
        // d/dx x e^{-x^2} at 0 is 1
        assert!((curve.dys[2] - 1.0).abs() < 1e-6);
        assert_eq!(curve.kind, ActivationKind::SoftRBF);
    }

    #[test]
    fn bad_ranges_are_rejected() {
        let act = Activation::new(ActivationKind::TanhArc);
        assert!(matches!(Curve::sample(&act, 0.0, 1.0, 1), Err(ActixError::InvalidRange { .. })));
        assert!(matches!(Curve::sample(&act, 1.0, -1.0, 10), Err(ActixError::InvalidRange { .. })));
        assert!(Curve::sample(&act, f32::NAN, 1.0, 10).is_err());
    }

    #[test]
    fn csv_and_json_exports() {
        let curve = Curve::sample(&Activation::new(ActivationKind::HarmonicTanh), 0.0, 1.0, 3).unwrap();
        let csv = curve.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("x,y,dy"));
        assert_eq!(lines.count(), 3);

        let json = curve.to_json().unwrap();
        assert!(json.contains("\"kind\": \"harmonic_tanh\""), "{json}");
        let back: Curve = serde_json::from_str(&json).unwrap();
        assert_eq!(back, curve);
    }

    #[test]
    fn value_range_skips_non_finite() {
        let curve = Curve {
            kind: ActivationKind::TanhArc,
            xs: vec![0.0, 1.0, 2.0],
            ys: vec![1.0, f32::INFINITY, -3.0],
            dys: vec![5.0, 0.0, 0.0],
        };
        assert_eq!(curve.value_range(false), Some((-3.0, 1.0)));
        assert_eq!(curve.value_range(true), Some((-3.0, 5.0)));
    }
}
