//! Graph executors.
//!
//! [`backend`] defines the interface and the shared memo; [`cpu_backend`] is
//! the `ndarray` implementation.

pub mod backend;
pub mod cpu_backend;
