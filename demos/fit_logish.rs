//! Fitting example: learn the parameters of `ParametricLogish` from samples.
//!
//! Demonstrates:
//! - building an activation layer on a graph context
//! - a mean squared error loss and its gradient graph
//! - a training loop with SGD and momentum
//!
//! Run with: `cargo run --example fit_logish`

use actix::analysis::shape_inference::ShapeInference;
use actix::asg::{DType, Value};
use actix::autograd::Gradients;
use actix::functional::Activation;
use actix::losses::mse_loss_mean;
use actix::nn::{Module, ParametricLogish};
use actix::optimizers::{Optimizer, Sgd};
use actix::runtime::backend::{bind_inputs, Backend};
use actix::runtime::cpu_backend::CpuBackend;
use actix::tensor::{GraphContext, Tensor};
use actix::{ActivationConfig, ActivationKind};
use std::collections::HashMap;

const EPOCHS: usize = 300;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ParametricLogish fitting example ===\n");

    // Targets come from the same activation with alpha = 1.5, beta = 2.
    let truth = ActivationConfig::new(ActivationKind::ParametricLogish)
        .with_param("alpha", 1.5)?
        .with_param("beta", 2.0)?;
    let xs = actix::fit::sample_inputs(128, -3.0, 3.0, 11)?;
    let ys = Activation::from_config(&truth)?.forward(&xs);

    let context = GraphContext::shared();
    let x = Tensor::new_input(&context, "x");
    let y_true = Tensor::new_input(&context, "y_true");
    let layer = ParametricLogish::new(&context, "logish");
    let loss = mse_loss_mean(&layer.forward(&x), &y_true);
    context.borrow_mut().main_graph_mut().set_output(loss.node_id);

    let mut forward_graph = context.borrow().main_graph().clone();
    let mut shapes = HashMap::from([
        ("x".to_string(), (xs.shape().to_vec(), DType::F32)),
        ("y_true".to_string(), (ys.shape().to_vec(), DType::F32)),
    ]);
    for name in layer.parameter_names() {
        shapes.insert(name, (Vec::new(), DType::F32));
    }
    ShapeInference::run(&mut forward_graph, &shapes)?;

    let param_ids: Vec<_> = layer.parameters().iter().map(|p| p.node_id).collect();
    let grad_graph = Gradients::new(forward_graph.clone()).build_and_infer(loss.node_id, &param_ids)?;
    println!(
        "Forward graph: {} nodes, gradient graph: {} nodes\n",
        forward_graph.nodes.len(),
        grad_graph.nodes.len()
    );

    let backend = CpuBackend::new();
    let mut params = layer.initial_values();
    let mut optimizer = Sgd::new(0.05).with_momentum(0.9);

    for epoch in 0..EPOCHS {
        let mut data = params.clone();
        data.insert("x".to_string(), Value::Tensor(xs.clone()));
        data.insert("y_true".to_string(), Value::Tensor(ys.clone()));

        let memo = bind_inputs(&forward_graph, &data)?;
        let (outputs, memo) = backend.run(&forward_graph, memo)?;
        let (grads, _) = backend.run(&grad_graph, memo)?;

        if epoch % 50 == 0 || epoch == EPOCHS - 1 {
            let loss = outputs[0].clone().into_array().sum();
            println!("Epoch {epoch:>3}: loss = {loss:.6}");
        }

        let grads: HashMap<String, Value> = layer.parameter_names().into_iter().zip(grads).collect();
        optimizer.step(&mut params, &grads);
    }

    let fitted = layer.config_from_values(&params)?;
    println!("\nFitted:   {}", fitted.to_json_string()?);
    println!("Expected: {}", truth.to_json_string()?);
    Ok(())
}
