//! Integration tests for the correctness of automatic differentiation.

use actix::analysis::shape_inference::ShapeInference;
use actix::config::ActivationConfig;
use actix::asg::{DType, Value};
use actix::autograd::Gradients;
use actix::functional::Activation;
use actix::nn::{ActivationModule, Module};
use actix::registry::ActivationKind;
use actix::runtime::backend::{bind_inputs, Backend, Memo};
use actix::runtime::cpu_backend::CpuBackend;
use actix::tensor::{GraphContext, Tensor};

use ndarray::ArrayD;
use std::collections::HashMap;

const EPSILON: f32 = 1e-3;
const TOLERANCE: f32 = 1e-2;
/// Graph and dual-number derivatives are both exact up to rounding.
const EXACT_TOLERANCE: f32 = 1e-3;

fn sample_x() -> ArrayD<f32> {
    ArrayD::from_shape_vec(ndarray::IxDyn(&[2, 2]), vec![-2.0, -0.7, 0.4, 1.3]).unwrap()
}

/// Compares two tensors element-wise and panics if they are not close.
///
/// The error is relative for large values and absolute below 1.
fn assert_grads_are_close(analytic: &ArrayD<f32>, numeric: &ArrayD<f32>, tolerance: f32, context: &str) {
    assert_eq!(analytic.shape(), numeric.shape(), "{context}: gradient shapes do not match");

    for (a, n) in analytic.iter().zip(numeric.iter()) {
        let diff = (a - n).abs();
        let scale = a.abs().max(n.abs()).max(1.0);
        let error = diff / scale;
        if error > tolerance {
            panic!("{context}: gradients do not match. Analytic: {a:.6}, Numeric: {n:.6}, Error: {error:.6}");
        }
    }
}

/// d(f(x))/dx from the gradient graph, with `f` returning a scalar.
fn get_analytic_grad(graph_builder: fn(&Tensor) -> Tensor, initial_x: &ArrayD<f32>) -> ArrayD<f32> {
    let context = GraphContext::shared();
    let backend = CpuBackend::new();
    let x_tensor = Tensor::new_input(&context, "x");
    let y_tensor = graph_builder(&x_tensor);
    let mut forward_graph = context.borrow().main_graph().clone();
    forward_graph.set_output(y_tensor.node_id);

    let shapes = HashMap::from([("x".to_string(), (initial_x.shape().to_vec(), DType::F32))]);
    ShapeInference::run(&mut forward_graph, &shapes).unwrap();
    let grad_graph = Gradients::new(forward_graph.clone())
        .build_and_infer(y_tensor.node_id, &[x_tensor.node_id])
        .unwrap();

    let runtime_data = HashMap::from([("x".to_string(), Value::Tensor(initial_x.clone()))]);
    let device_data = backend.load_data(&runtime_data).unwrap();
    let mut initial_memo: Memo<Value> = HashMap::new();
    initial_memo.insert((forward_graph.id, x_tensor.node_id), device_data["x"].clone());

    let (_, forward_memo) = backend.run(&forward_graph, initial_memo).unwrap();
    let (grad_outputs, _) = backend.run(&grad_graph, forward_memo).unwrap();
    let grad_value = backend.retrieve_data(&grad_outputs).unwrap();
    grad_value.into_iter().next().unwrap().into_array()
}

/// Central finite differences of the forward graph.
fn get_numeric_grad(graph_builder: fn(&Tensor) -> Tensor, initial_x: &ArrayD<f32>) -> ArrayD<f32> {
    let backend = CpuBackend::new();
    let mut grad = ArrayD::zeros(initial_x.shape());
    for i in 0..initial_x.len() {
        let mut x_plus = initial_x.clone();
        x_plus.as_slice_mut().unwrap()[i] += EPSILON;
        let mut x_minus = initial_x.clone();
        x_minus.as_slice_mut().unwrap()[i] -= EPSILON;
        let y_plus = run_forward_pass(&backend, graph_builder, &x_plus);
        let y_minus = run_forward_pass(&backend, graph_builder, &x_minus);
        grad.as_slice_mut().unwrap()[i] = (y_plus - y_minus) / (2.0 * EPSILON);
    }
    grad
}

fn run_forward_pass(backend: &CpuBackend, graph_builder: fn(&Tensor) -> Tensor, input_data: &ArrayD<f32>) -> f32 {
    let context = GraphContext::shared();
    let x_tensor = Tensor::new_input(&context, "x");
    let y_tensor = graph_builder(&x_tensor);
    let mut graph = context.borrow().main_graph().clone();
    graph.set_output(y_tensor.node_id);

    let data = HashMap::from([("x".to_string(), Value::Tensor(input_data.clone()))]);
    let memo = bind_inputs(&graph, &data).unwrap();
    let (result, _) = backend.run(&graph, memo).unwrap();
    let tensor = result.into_iter().next().unwrap().into_array();
    assert_eq!(tensor.len(), 1, "output for a grad check must be a scalar");
    tensor.sum()
}

fn check(name: &str, graph_builder: fn(&Tensor) -> Tensor, x: &ArrayD<f32>) {
    let analytic = get_analytic_grad(graph_builder, x);
    let numeric = get_numeric_grad(graph_builder, x);
    assert_grads_are_close(&analytic, &numeric, TOLERANCE, name);
}

#[test]
fn test_grad_multiply() {
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 3]), vec![1.0, 2.0, 3.0]).unwrap();
    check("multiply", |x| (x * x).sum(), &x);
}

#[test]
fn test_grad_add_subtract() {
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 3]), vec![5.0, -10.0, 1.5]).unwrap();
    check("add/subtract", |x| ((x + x) - x * 0.5).sum(), &x);
}

#[test]
fn test_grad_divide_and_power() {
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[3]), vec![0.5, 1.0, 1.5]).unwrap();
    check("divide", |x| ((x + 3.0) / (x * x + 1.0)).sum(), &x);
    check("power", |x| x.powf(2.5).sum(), &x);
    check("power exponent", |x| Tensor::scalar(&x.context, 1.7).pow(x).sum(), &x);
}

#[test]
fn test_grad_sum_broadcast() {
    // y = sum(x * C) with C of shape [2, 3] and x of shape [1, 3]:
    // the gradient is C summed back over the broadcast axis.
    let test_fn = |x: &Tensor| {
        let data = ArrayD::from_shape_vec(ndarray::IxDyn(&[2, 3]), vec![10.0, 20.0, 30.0, 1.0, 2.0, 3.0]).unwrap();
        let c = Tensor::new_literal(&x.context, data, "C");
        (x * c).sum()
    };
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 3]), vec![1.0, 2.0, 3.0]).unwrap();
    let analytic = get_analytic_grad(test_fn, &x);
    assert_eq!(analytic.as_slice().unwrap(), &[11.0, 22.0, 33.0]);
    check("sum/broadcast", test_fn, &x);
}

#[test]
fn test_grad_mean_and_unary_ops() {
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[4]), vec![-1.2, -0.3, 0.6, 1.1]).unwrap();
    check("mean", |x| x.tanh().mean(), &x);
    check("sigmoid/exp", |x| (x.sigmoid() * (-x.square()).exp()).sum(), &x);
    check("erf/atan", |x| (x.erf() + x.atan() * x.sin()).sum(), &x);
    check("asinh/cosh", |x| (x.asinh() * x.cosh() - x.sinh()).sum(), &x);
    check("softsign/abs", |x| (x.softsign() + x.abs().sqrt()).sum(), &x);
    check("softplus/elu/relu", |x| (x.softplus(2.0) + x.elu(0.5) + x.relu()).sum(), &x);
    check("lambert_w", |x| x.exp().lambert_w().sum(), &x);
    check("jacobi_cn", |x| x.jacobi_cn(&Tensor::scalar(&x.context, 0.3)).sum(), &x);
}

/// Graph gradients of `sum(f(x; θ))` for `x` and every parameter.
fn activation_graph_grads(config: &ActivationConfig, x: &ArrayD<f32>) -> (ArrayD<f32>, Vec<f32>) {
    let context = GraphContext::shared();
    let backend = CpuBackend::new();
    let x_tensor = Tensor::new_input(&context, "x");
    let layer = ActivationModule::new(&context, config.kind, "act");
    let loss = layer.forward(&x_tensor).sum();
    let mut forward_graph = context.borrow().main_graph().clone();
    forward_graph.set_output(loss.node_id);

    let mut shapes = HashMap::from([("x".to_string(), (x.shape().to_vec(), DType::F32))]);
    for name in layer.parameter_names() {
        shapes.insert(name, (Vec::new(), DType::F32));
    }
    ShapeInference::run(&mut forward_graph, &shapes).unwrap();

    let wrt: Vec<_> = std::iter::once(x_tensor.node_id)
        .chain(layer.parameters().iter().map(|p| p.node_id))
        .collect();
    let grad_graph = Gradients::new(forward_graph.clone()).build_and_infer(loss.node_id, &wrt).unwrap();

    let mut data = layer.values_from_config(config).unwrap();
    data.insert("x".to_string(), Value::Tensor(x.clone()));
    let memo = bind_inputs(&forward_graph, &data).unwrap();
    let (_, forward_memo) = backend.run(&forward_graph, memo).unwrap();
    let (grads, _) = backend.run(&grad_graph, forward_memo).unwrap();

    let mut grads = grads.into_iter().map(Value::into_array);
    let dx = grads.next().unwrap();
    let dparams = grads.map(|g| g.sum()).collect();
    (dx, dparams)
}

#[test]
fn test_activation_input_grads_match_eager_derivatives() {
    let x = sample_x();
    for &kind in ActivationKind::ALL {
        let (dx, _) = activation_graph_grads(&kind.into(), &x);
        let expected = Activation::new(kind).derivative(&x);
        assert_grads_are_close(&dx, &expected, EXACT_TOLERANCE, &format!("{kind} d/dx"));
    }
}

#[test]
fn test_activation_parameter_grads_match_eager_derivatives() {
    let x = sample_x();
    for kind in ActivationKind::parametric() {
        let (_, dparams) = activation_graph_grads(&kind.into(), &x);
        let expected = Activation::new(kind).parameter_gradients(&x);
        assert_eq!(dparams.len(), expected.len(), "{kind}");

        for ((spec, got), want) in kind.parameters().iter().zip(&dparams).zip(&expected) {
            let got = ArrayD::from_elem(ndarray::IxDyn(&[1]), *got);
            let want = ArrayD::from_elem(ndarray::IxDyn(&[1]), want.sum());
            assert_grads_are_close(&got, &want, EXACT_TOLERANCE, &format!("{kind}.{}", spec.name));
        }
    }
}

#[test]
fn test_fractional_powers_of_zero_keep_grads_finite() {
    // |beta * x|^gamma at x = 0 with gamma < 1 has an infinite slope behind the
    // zero slope of |.|; the product must vanish, not turn into NaN.
    let x = ArrayD::from_shape_vec(ndarray::IxDyn(&[3]), vec![0.0, 0.5, -1.2]).unwrap();
    let cases = [
        (ActivationKind::GeneralizedAlphaSigmoid, 0.5),
        (ActivationKind::AdaptiveRationalSoftsign, 0.5),
        (ActivationKind::AdaptiveRationalSoftsign, 0.0),
    ];
    for (kind, gamma) in cases {
        let config = ActivationConfig::new(kind).with_param("gamma", gamma).unwrap();
        let (dx, dparams) = activation_graph_grads(&config, &x);
        let eager = Activation::from_config(&config).unwrap();
        let context = format!("{kind} gamma={gamma}");

        assert!(dx.iter().chain(&dparams).all(|v| v.is_finite()), "{context}: {dx:?} {dparams:?}");
        assert_grads_are_close(&dx, &eager.derivative(&x), EXACT_TOLERANCE, &format!("{context} d/dx"));
        for (got, want) in dparams.iter().zip(eager.parameter_gradients(&x)) {
            let got = ArrayD::from_elem(ndarray::IxDyn(&[1]), *got);
            let want = ArrayD::from_elem(ndarray::IxDyn(&[1]), want.sum());
            assert_grads_are_close(&got, &want, EXACT_TOLERANCE, &format!("{context} d/dθ"));
        }
    }
}

#[test]
fn test_static_activation_grads_match_finite_differences() {
    let x = sample_x();
    check("sinh_gate", |x| actix::nn::SinhGate::new().forward(x).sum(), &x);
    check("log_cosh_gate", |x| actix::nn::LogCoshGate::new().forward(x).sum(), &x);
    check("rational_softplus", |x| actix::nn::RationalSoftplus::new().forward(x).sum(), &x);
}
