//! Crate-level error type.
//!
//! Each layer keeps its own `thiserror` enum (`AsgError`, `RuntimeError`, ...);
//! `ActixError` wraps them so public entry points can return one type.

use thiserror::Error;

#[cfg(feature = "graph")]
use crate::{
    analysis::shape_inference::ShapeInferenceError, asg::AsgError, autograd::AutogradError,
    runtime::backend::RuntimeError, serialization::SafeTensorsError,
};

#[derive(Error, Debug)]
pub enum ActixError {
    #[error("Unknown activation '{0}'. Run `actix list` to see the available names.")]
    UnknownActivation(String),

    #[error("Activation '{activation}' has no parameter named '{parameter}'")]
    UnknownParameter { activation: String, parameter: String },

    #[error("Invalid value {value} for parameter '{parameter}': parameters must be finite")]
    InvalidParameter { parameter: String, value: f32 },

    #[error("Activation '{0}' has no trainable parameters")]
    NotParametric(String),

    #[error("Config is for '{expected}', but was applied to '{actual}'")]
    KindMismatch { expected: String, actual: String },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid sampling range [{start}, {end}] with {steps} steps")]
    InvalidRange { start: f32, end: f32, steps: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "graph")]
    #[error("Graph error: {0}")]
    Asg(#[from] AsgError),

    #[cfg(feature = "graph")]
    #[error("Shape inference error: {0}")]
    Shape(#[from] ShapeInferenceError),

    #[cfg(feature = "graph")]
    #[error("Autograd error: {0}")]
    Autograd(#[from] AutogradError),

    #[cfg(feature = "graph")]
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[cfg(feature = "graph")]
    #[error("SafeTensors error: {0}")]
    SafeTensors(#[from] SafeTensorsError),
}

pub type Result<T> = std::result::Result<T, ActixError>;
