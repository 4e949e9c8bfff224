//! # actix: parametric and static activation functions
//!
//! A catalogue of activation functions, each available through two APIs:
//!
//! * **graph** (feature `graph`): symbolic [`tensor::Tensor`] handles build an
//!   abstract semantic graph (ASG). Activations are [`nn::Module`]s whose
//!   parameters are trainable graph nodes, differentiated by the reverse-mode
//!   [`autograd`] and executed by the CPU backend in [`runtime`].
//! * **eager** (feature `eager`): [`functional::Activation`] applies an
//!   activation to an `ndarray` directly, with exact derivatives from dual
//!   numbers.
//!
//! ## Usage Example
//!
//! ```no_run
//! use actix::nn::{Module, ParametricLogish};
//! use actix::session::ActivationSession;
//! use actix::registry::ActivationKind;
//! use actix::tensor::{GraphContext, Tensor};
//! use ndarray::array;
//!
//! // Build the graph by hand...
//! let ctx = GraphContext::shared();
//! let x = Tensor::new_input(&ctx, "x");
//! let y = ParametricLogish::new(&ctx, "act").forward(&x);
//!
//! // ...or let a session compile and run it.
//! let mut session = ActivationSession::new(ActivationKind::ParametricLogish).unwrap();
//! let xs = array![-1.0_f32, 0.5, 2.0].into_dyn();
//! let ys = session.forward(&xs).unwrap();
//! let grads = session.backward(&xs, &ys).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod special;

#[cfg(feature = "eager")]
pub mod curve;
#[cfg(feature = "eager")]
pub mod functional;

#[cfg(feature = "graph")]
pub mod analysis;
#[cfg(feature = "graph")]
pub mod asg;
#[cfg(feature = "graph")]
pub mod autograd;
#[cfg(feature = "graph")]
pub mod losses;
#[cfg(feature = "graph")]
pub mod nn;
#[cfg(feature = "graph")]
pub mod optimizers;
#[cfg(feature = "graph")]
pub mod runtime;
#[cfg(feature = "graph")]
pub mod serialization;
#[cfg(feature = "graph")]
pub mod tensor;

#[cfg(feature = "graph")]
pub mod fit;
#[cfg(feature = "graph")]
pub mod session;

#[cfg(feature = "viewer")]
pub mod viewer;

pub use config::ActivationConfig;
pub use error::{ActixError, Result};
pub use registry::{ActivationKind, ParamSpec};
