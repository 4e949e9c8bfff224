//! Persistence of parameter values in the SafeTensors format.
//!
//! ```rust,ignore
//! use actix::serialization::{load_parameters, save_parameters};
//!
//! save_parameters("act.safetensors", &values)?;
//! let restored = load_parameters("act.safetensors")?;
//! ```

pub mod safetensors_io;

pub use safetensors_io::{
    list_tensors, load_activation, load_parameters, save_activation, save_parameters,
    SafeTensorsError,
};
