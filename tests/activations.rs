//! The graph and eager APIs must agree on every activation.

use actix::functional::Activation;
use actix::registry::ActivationKind;
use actix::session::ActivationSession;
use actix::ActivationConfig;

use ndarray::{ArrayD, IxDyn};
use std::f32::consts::E;

const TOLERANCE: f32 = 1e-4;

fn grid() -> ArrayD<f32> {
    let values: Vec<f32> = (0..24).map(|i| -3.0 + 0.25 * i as f32 + 0.01).collect();
    ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), values).unwrap()
}

fn assert_close(graph: &ArrayD<f32>, eager: &ArrayD<f32>, context: &str) {
    assert_eq!(graph.shape(), eager.shape(), "{context}: shapes differ");
    for (g, e) in graph.iter().zip(eager.iter()) {
        let scale = g.abs().max(e.abs()).max(1.0);
        assert!((g - e).abs() / scale < TOLERANCE, "{context}: graph {g} vs eager {e}");
    }
}

#[test]
fn graph_and_eager_outputs_agree() {
    let x = grid();
    for &kind in ActivationKind::ALL {
        let session = ActivationSession::new(kind).unwrap();
        let graph = session.forward(&x).unwrap();
        let eager = Activation::new(kind).forward(&x);
        assert_close(&graph, &eager, kind.name());
    }
}

#[test]
fn graph_and_eager_agree_with_custom_parameters() {
    let x = grid();
    let config = ActivationConfig::new(ActivationKind::WeibullSoftplusActivation)
        .with_param("lambda", 0.7)
        .unwrap()
        .with_param("mu", 1.8)
        .unwrap();
    let session = ActivationSession::new(config.clone()).unwrap();
    let eager = Activation::from_config(&config).unwrap();
    assert_close(&session.forward(&x).unwrap(), &eager.forward(&x), "weibull");
}

#[test]
fn outputs_keep_the_input_shape() {
    let shapes: [&[usize]; 3] = [&[], &[5], &[2, 1, 3]];
    for shape in shapes {
        let x = ArrayD::from_elem(IxDyn(shape), 0.3_f32);
        for &kind in ActivationKind::ALL {
            let mut session = ActivationSession::new(kind).unwrap();
            assert_eq!(session.forward(&x).unwrap().shape(), shape, "{kind}");
            let grads = session.backward(&x, &x).unwrap();
            assert_eq!(grads.input.shape(), shape, "{kind}");
            assert_eq!(grads.params.len(), kind.parameters().len(), "{kind}");
        }
    }
}

#[test]
fn known_values() {
    let at = |kind: ActivationKind, x: f32| Activation::new(kind).forward_scalar(x);
    assert!((at(ActivationKind::SinhGate, 1.0) - 1.0_f32.sinh()).abs() < 1e-6);
    assert!((at(ActivationKind::SoftRBF, 1.0) - 1.0 / E).abs() < 1e-6);
    assert!((at(ActivationKind::ParametricLambertWActivation, 1.0) - 1.0).abs() < 1e-5);
    for x in [-2.0_f32, 0.5, 3.0] {
        let swish = x * actix::special::sigmoid(x);
        assert!((at(ActivationKind::ParametricLogish, x) - swish).abs() < 1e-6);
    }
    assert_eq!(actix::special::ellipj_cn(0.0, 0.25), 1.0);
}

#[test]
fn names_resolve_both_ways() {
    for &kind in ActivationKind::ALL {
        assert_eq!(kind.name().parse::<ActivationKind>().unwrap(), kind);
        assert_eq!(kind.display_name().parse::<ActivationKind>().unwrap(), kind);
    }
    assert!("no_such_activation".parse::<ActivationKind>().is_err());
}
