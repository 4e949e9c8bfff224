//! The backend interface every executor implements.

use crate::asg::{Asg, AsgId, NodeId, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while executing a graph. Shared by all backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Node {0} not found in graph {1}. Check that the graph was built correctly.")]
    NodeNotFound(NodeId, AsgId),

    #[error("Graph {0} is not registered in the execution context.")]
    GraphNotFound(AsgId),

    #[error("Tensor shape error: {0}")]
    ShapeError(String),

    #[error("Missing value for input '{0}' (node {1}). Add it to the data passed to backend.run().")]
    MissingInput(String, NodeId),

    #[error("Missing value for parameter '{0}' (node {1}). Initialize the parameter before running the graph.")]
    MissingParameter(String, NodeId),

    #[error("External node '{0}' refers to a value that was not computed. Run the forward graph first and pass its memo.")]
    MissingExternal(String),

    #[error("No input or parameter named '{0}' in graph {1}")]
    UnknownName(String, AsgId),
}

/// Cache of computed node values, keyed by `(AsgId, NodeId)`.
pub type Memo<T> = HashMap<(AsgId, NodeId), T>;

/// A graph executor.
pub trait Backend {
    /// The backend's representation of a value.
    type DeviceData: std::fmt::Debug;

    /// Moves host values to the backend.
    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError>;

    /// Runs `main_asg`, seeded with `initial_memo`.
    ///
    /// The memo holds bound inputs and parameters, and for gradient graphs the
    /// memo of the forward run that their `External` nodes read from.
    ///
    /// Returns the values of `main_asg.outputs` and the final memo.
    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError>;

    /// Moves results back to host values.
    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError>;
}

/// Builds an initial memo by matching `data` keys against the names of the
/// graph's `Input` and `Parameter` nodes.
pub fn bind_inputs<T: Clone>(asg: &Asg, data: &HashMap<String, T>) -> Result<Memo<T>, RuntimeError> {
    let mut memo = Memo::new();
    for (name, value) in data {
        let node_id = asg
            .find_named(name)
            .ok_or_else(|| RuntimeError::UnknownName(name.clone(), asg.id))?;
        memo.insert((asg.id, node_id), value.clone());
    }
    Ok(memo)
}
