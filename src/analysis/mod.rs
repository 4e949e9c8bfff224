//! # Graph analysis
//!
//! Passes that run over an ASG before execution.
//!
//! - [`ShapeInference`](shape_inference::ShapeInference) propagates shapes
//!   through the graph and reports broadcasting mismatches before any value is
//!   computed.
//!
//! ```text
//! ASG (untyped) -> Shape Inference -> ASG (with shapes/dtypes)
//! ```
//!
//! ```ignore
//! use actix::analysis::shape_inference::ShapeInference;
//!
//! let mut graph = context.borrow().main_graph().clone();
//! let shapes = HashMap::from([
//!     ("x".to_string(), (vec![4, 16], DType::F32)),
//!     ("act.alpha".to_string(), (vec![1], DType::F32)),
//! ]);
//! ShapeInference::run(&mut graph, &shapes)?;
//! ```

pub mod shape_inference;
