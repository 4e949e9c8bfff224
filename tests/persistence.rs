//! Configs and parameters survive a trip through the filesystem.

use actix::fit::{fit, sample_inputs, FitOptions};
use actix::functional::Activation;
use actix::nn::ActivationModule;
use actix::registry::ActivationKind;
use actix::serialization::{list_tensors, load_activation, load_parameters, save_activation, save_parameters};
use actix::tensor::GraphContext;
use actix::{ActivationConfig, ActixError};

#[test]
fn config_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("act.json");
    let config = ActivationConfig::new(ActivationKind::LearnableFourierActivation)
        .with_param("phi", 0.25)
        .unwrap();

    config.save(&path).unwrap();
    let loaded = ActivationConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn config_with_unknown_parameter_is_rejected() {
    let err = ActivationConfig::from_json_str(r#"{"kind": "soft_rbf", "params": {"alpha": 1.0}}"#)
        .and_then(|c| Activation::from_config(&c))
        .unwrap_err();
    assert!(matches!(err, ActixError::UnknownParameter { .. }));
}

#[test]
fn module_parameters_round_trip_through_safetensors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layer.safetensors");
    let ctx = GraphContext::shared();
    let layer = ActivationModule::new(&ctx, ActivationKind::AdaptiveErfSwish, "layer0");

    let values = layer.initial_values();
    save_parameters(&path, &values).unwrap();
    assert_eq!(list_tensors(&path).unwrap(), vec!["layer0.alpha", "layer0.beta", "layer0.gamma"]);

    let loaded = load_parameters(&path).unwrap();
    assert_eq!(loaded, values);
    assert_eq!(
        layer.config_from_values(&loaded).unwrap().resolved_params(),
        ActivationKind::AdaptiveErfSwish.default_parameters()
    );
}

#[test]
fn fitted_activation_can_be_saved_and_reloaded() {
    let xs = sample_inputs(48, -2.0, 2.0, 3).unwrap();
    let targets = Activation::new(ActivationKind::TanhArc).forward(&xs);
    let options = FitOptions { epochs: 150, log_every: 0, ..FitOptions::default() };
    let report = fit(&ActivationKind::OptimXTemporal.into(), &xs, &targets, &options).unwrap();
    assert!(report.final_loss < report.initial_loss);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitted.safetensors");
    save_activation(&path, &report.config).unwrap();
    let restored = load_activation(&path).unwrap();
    assert_eq!(restored.kind, ActivationKind::OptimXTemporal);
    assert_eq!(restored.resolved_params(), report.config.resolved_params());
}
