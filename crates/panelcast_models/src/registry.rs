//! Model registry for creating model configurations by name.
//!
//! The registry maps experiment-config model names to constructors that
//! parse a JSON configuration dictionary into a model configuration.
//! Unknown names fail before any training compute is spent.
//!
//! # Example
//!
//! ```rust,ignore
//! use panelcast_models::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry();
//! let config = json!({"output_size": 7, "input_size_multiplier": 3});
//! let model_config = registry.build("deepar", &config)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::deepar::DeepArConfig;
use crate::distribution::DistributionKind;
use crate::error::{ModelError, Result};

/// Constructor from a JSON configuration to a model configuration.
pub type ModelConstructor = Arc<dyn Fn(&Value) -> Result<DeepArConfig> + Send + Sync>;

/// Registry of model variants, keyed by name.
pub struct ModelRegistry {
    models: HashMap<String, ModelConstructor>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Register a constructor under a name.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value) -> Result<DeepArConfig> + Send + Sync + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(constructor));
    }

    /// Build the named variant's model configuration.
    pub fn build(&self, name: &str, config: &Value) -> Result<DeepArConfig> {
        let constructor = self
            .models
            .get(name)
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))?;
        constructor(config)
    }

    /// All registered names.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }
}

fn get_usize(config: &Value, key: &str) -> Result<usize> {
    config
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| ModelError::InvalidConfig(format!("missing or invalid '{key}'")))
}

fn get_usize_or(config: &Value, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(Value::as_u64)
        .map_or(default, |v| v as usize)
}

fn get_f64_or(config: &Value, key: &str, default: f64) -> f64 {
    config.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn get_dilations_or(config: &Value, key: &str, default: &[usize]) -> Vec<usize> {
    config
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_u64)
                .map(|v| v as usize)
                .collect()
        })
        .unwrap_or_else(|| default.to_vec())
}

fn deepar_from_config(config: &Value) -> Result<DeepArConfig> {
    let output_size = get_usize(config, "output_size")?;
    let input_size = match config.get("input_size") {
        Some(v) => v
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| ModelError::InvalidConfig("invalid 'input_size'".to_string()))?,
        None => get_usize(config, "input_size_multiplier")? * output_size,
    };

    let distribution = match config.get("loss") {
        Some(v) => serde_json::from_value::<DistributionKind>(v.clone())
            .map_err(|e| ModelError::InvalidConfig(format!("invalid 'loss': {e}")))?,
        None => DistributionKind::default(),
    };

    let mut model = DeepArConfig::new(input_size, output_size).with_distribution(distribution);
    model.stat_hidden_size = get_usize_or(config, "stat_hidden_size", model.stat_hidden_size);
    model.stat_dropout = get_f64_or(config, "stat_dropout", model.stat_dropout);
    model.encoder_hidden_size =
        get_usize_or(config, "encoder_hidden_size", model.encoder_hidden_size);
    model.kernel_size = get_usize_or(config, "kernel_size", model.kernel_size);
    model.dilations = get_dilations_or(config, "dilations", &model.dilations);
    model.context_size = get_usize_or(config, "context_size", model.context_size);
    model.decoder_hidden_size =
        get_usize_or(config, "decoder_hidden_size", model.decoder_hidden_size);
    model.decoder_layers = get_usize_or(config, "decoder_layers", model.decoder_layers);
    Ok(model)
}

/// The registry with all built-in variants.
///
/// `tcn_deepar` is an alias of `deepar`, kept for configurations that
/// name the encoder explicitly.
#[must_use]
pub fn default_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register("deepar", deepar_from_config);
    registry.register("tcn_deepar", deepar_from_config);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry();
        assert!(registry.contains("deepar"));
        assert!(registry.contains("tcn_deepar"));
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_build_from_experiment_keys() {
        let registry = default_registry();
        let config = json!({
            "output_size": 7,
            "input_size_multiplier": 3,
            "encoder_hidden_size": 32,
            "dilations": [1, 2, 4],
            "loss": {"name": "normal"}
        });
        let model = registry.build("deepar", &config).unwrap();
        assert_eq!(model.input_size, 21);
        assert_eq!(model.h, 7);
        assert_eq!(model.encoder_hidden_size, 32);
        assert_eq!(model.dilations, vec![1, 2, 4]);
        assert_eq!(model.distribution, DistributionKind::Normal);
    }

    #[test]
    fn test_explicit_input_size_wins() {
        let registry = default_registry();
        let config = json!({"output_size": 5, "input_size": 40});
        let model = registry.build("deepar", &config).unwrap();
        assert_eq!(model.input_size, 40);
    }

    #[test]
    fn test_unknown_model_fails_fast() {
        let registry = default_registry();
        let res = registry.build("esrnn", &json!({}));
        assert!(matches!(res, Err(ModelError::UnknownModel(name)) if name == "esrnn"));
    }

    #[test]
    fn test_missing_output_size_rejected() {
        let registry = default_registry();
        let res = registry.build("deepar", &json!({"input_size_multiplier": 2}));
        assert!(matches!(res, Err(ModelError::InvalidConfig(_))));
    }
}
