//! Reading and writing SafeTensors files.
//!
//! Parameters are stored as little-endian `f32` tensors under their graph
//! names. [`save_activation`] additionally records the activation name in the
//! file's metadata so the whole config can be restored.

use crate::asg::Value;
use crate::config::ActivationConfig;
use crate::error::{ActixError, Result as ActixResult};
use crate::registry::ActivationKind;
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{Metadata, SafeTensors, TensorView};
use safetensors::{serialize_to_file, Dtype};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Metadata key holding the activation name.
pub const ACTIVATION_KEY: &str = "activation";

#[derive(Error, Debug)]
pub enum SafeTensorsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SafeTensors error: {0}")]
    Format(#[from] safetensors::SafeTensorError),

    #[error("Unsupported dtype {0}; only F32 tensors are stored")]
    UnsupportedDtype(String),

    #[error("Tensor '{name}' has shape {shape:?} but {len} elements")]
    ShapeMismatch { name: String, shape: Vec<usize>, len: usize },

    #[error("File has no '{0}' metadata entry")]
    MissingMetadata(&'static str),
}

type Result<T> = std::result::Result<T, SafeTensorsError>;

/// Writes every value to `path`. Scalars are stored as 0-d tensors.
pub fn save_parameters<P: AsRef<Path>>(path: P, values: &HashMap<String, Value>) -> Result<()> {
    write(path.as_ref(), values, None)
}

/// Reads every tensor of `path`.
pub fn load_parameters<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Value>> {
    let buffer = std::fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut values = HashMap::new();
    for (name, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(SafeTensorsError::UnsupportedDtype(format!("{:?}", view.dtype())));
        }
        let shape = view.shape().to_vec();
        let floats: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let len = floats.len();
        let array = ArrayD::from_shape_vec(IxDyn(&shape), floats)
            .map_err(|_| SafeTensorsError::ShapeMismatch { name: name.clone(), shape, len })?;
        values.insert(name, Value::Tensor(array));
    }
    tracing::debug!(tensors = values.len(), "loaded parameters");
    Ok(values)
}

/// Tensor names stored in `path`, sorted.
pub fn list_tensors<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let buffer = std::fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;
    let mut names: Vec<String> = tensors.names().into_iter().cloned().collect();
    names.sort();
    Ok(names)
}

/// Saves a config: one scalar tensor per parameter plus the activation name.
pub fn save_activation<P: AsRef<Path>>(path: P, config: &ActivationConfig) -> ActixResult<()> {
    config.validate()?;
    let values: HashMap<String, Value> = config
        .kind
        .parameters()
        .iter()
        .zip(config.resolved_params())
        .map(|(spec, v)| (spec.name.to_string(), Value::Tensor(ArrayD::from_elem(IxDyn(&[]), v))))
        .collect();
    let metadata = HashMap::from([(ACTIVATION_KEY.to_string(), config.kind.name().to_string())]);
    write(path.as_ref(), &values, Some(metadata))?;
    Ok(())
}

/// Loads a config written by [`save_activation`].
///
/// Tensors that are not parameters of the stored activation are rejected.
pub fn load_activation<P: AsRef<Path>>(path: P) -> ActixResult<ActivationConfig> {
    let path = path.as_ref();
    let buffer = std::fs::read(path)?;
    let (_, metadata) = SafeTensors::read_metadata(&buffer).map_err(SafeTensorsError::from)?;
    let kind: ActivationKind = activation_name(&metadata)?.parse()?;

    let mut config = ActivationConfig::new(kind);
    for (name, value) in load_parameters(path)? {
        let v = value.as_scalar().ok_or_else(|| ActixError::ShapeMismatch {
            expected: Vec::new(),
            actual: value.shape(),
        })?;
        config.set_param(&name, v)?;
    }
    Ok(config)
}

fn activation_name(metadata: &Metadata) -> Result<&str> {
    metadata
        .metadata()
        .as_ref()
        .and_then(|m| m.get(ACTIVATION_KEY))
        .map(String::as_str)
        .ok_or(SafeTensorsError::MissingMetadata(ACTIVATION_KEY))
}

fn write(path: &Path, values: &HashMap<String, Value>, metadata: Option<HashMap<String, String>>) -> Result<()> {
    // Views borrow the byte buffers, so those are built first.
    let encoded: Vec<(&str, Vec<usize>, Vec<u8>)> = values
        .iter()
        .map(|(name, value)| {
            let shape = value.shape();
            let bytes = match value {
                Value::Tensor(arr) => arr.iter().flat_map(|x| x.to_le_bytes()).collect(),
                Value::ScalarF32(x) => x.to_le_bytes().to_vec(),
            };
            (name.as_str(), shape, bytes)
        })
        .collect();

    let mut views = Vec::with_capacity(encoded.len());
    for (name, shape, bytes) in &encoded {
        views.push((*name, TensorView::new(Dtype::F32, shape.clone(), bytes)?));
    }
    serialize_to_file(views, &metadata, path)?;
    tracing::debug!(path = %path.display(), tensors = encoded.len(), "saved parameters");
    Ok(())
}
