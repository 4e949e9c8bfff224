//! Serializable activation configuration: a kind plus parameter overrides.

use crate::error::{ActixError, Result};
use crate::registry::ActivationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// An activation together with the values of its parameters.
///
/// Only overridden parameters are stored; everything else resolves to the
/// registry default. Stored as JSON:
///
/// ```json
/// { "kind": "optim_a", "params": { "alpha": 0.8 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationConfig {
    pub kind: ActivationKind,
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl ActivationConfig {
    pub fn new(kind: ActivationKind) -> Self {
        Self { kind, params: BTreeMap::new() }
    }

    /// Overrides one parameter.
    pub fn with_param(mut self, name: &str, value: f32) -> Result<Self> {
        self.set_param(name, value)?;
        Ok(self)
    }

    pub fn set_param(&mut self, name: &str, value: f32) -> Result<()> {
        if self.kind.parameter_index(name).is_none() {
            return Err(ActixError::UnknownParameter {
                activation: self.kind.name().to_string(),
                parameter: name.to_string(),
            });
        }
        if !value.is_finite() {
            return Err(ActixError::InvalidParameter { parameter: name.to_string(), value });
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    /// Parameter values in registry order, defaults filled in.
    pub fn resolved_params(&self) -> Vec<f32> {
        self.kind
            .parameters()
            .iter()
            .map(|spec| self.params.get(spec.name).copied().unwrap_or(spec.default))
            .collect()
    }

    /// Checks overrides loaded from outside (e.g. a JSON file).
    pub fn validate(&self) -> Result<()> {
        for (name, &value) in &self.params {
            if self.kind.parameter_index(name).is_none() {
                return Err(ActixError::UnknownParameter {
                    activation: self.kind.name().to_string(),
                    parameter: name.clone(),
                });
            }
            if !value.is_finite() {
                return Err(ActixError::InvalidParameter { parameter: name.clone(), value });
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

impl From<ActivationKind> for ActivationConfig {
    fn from(kind: ActivationKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_resolved_in_order() {
        let config = ActivationConfig::new(ActivationKind::OptimXTemporal)
            .with_param("gamma", 2.0)
            .unwrap();
        assert_eq!(config.resolved_params(), vec![0.5, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn rejects_unknown_and_non_finite_parameters() {
        let config = ActivationConfig::new(ActivationKind::ParametricLogish);
        assert!(matches!(
            config.clone().with_param("gamma", 1.0),
            Err(ActixError::UnknownParameter { .. })
        ));
        assert!(matches!(
            config.with_param("alpha", f32::NAN),
            Err(ActixError::InvalidParameter { .. })
        ));
        assert!(ActivationConfig::new(ActivationKind::SinhGate).with_param("alpha", 1.0).is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = ActivationConfig::new(ActivationKind::OptimA)
            .with_param("alpha", 0.75)
            .unwrap();
        let json = config.to_json_string().unwrap();
        assert_eq!(ActivationConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn json_without_params_uses_defaults() {
        let config = ActivationConfig::from_json_str(r#"{ "kind": "SoftRBF" }"#).unwrap();
        assert_eq!(config.kind, ActivationKind::SoftRBF);
        assert!(config.resolved_params().is_empty());
    }

    #[test]
    fn json_with_unknown_parameter_is_rejected() {
        let json = r#"{ "kind": "parametric_logish", "params": { "zeta": 1.0 } }"#;
        assert!(ActivationConfig::from_json_str(json).is_err());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("act.json");
        let config = ActivationConfig::new(ActivationKind::EllipticGaussianActivation)
            .with_param("m", 0.25)
            .unwrap();
        config.save(&path).unwrap();
        assert_eq!(ActivationConfig::load(&path).unwrap(), config);
    }
}
