use std::{collections::BTreeMap, fs, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{PbtErr, Result};

/// Hyperparameter name to value. Ordered so that seeded runs draw in a stable order.
pub type Hyperparameters = BTreeMap<String, f64>;

/// Static keyword arguments handed to the train and evaluate capabilities.
pub type Kwargs = Map<String, Value>;

/// Per-hyperparameter randomization scale used when creating the population.
pub type RandScales = BTreeMap<String, f64>;

const REQUIRED_KEYS: [&str; 4] = ["generation", "hyperparameters", "trainer", "evaluator"];

/// The configuration of a single population member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Completed generations, informational only.
    pub generation: usize,
    pub hyperparameters: Hyperparameters,
    pub trainer: Kwargs,
    pub evaluator: Kwargs,
}

impl Config {
    /// Creates a new `Config` at generation 0.
    pub fn new(hyperparameters: Hyperparameters, trainer: Kwargs, evaluator: Kwargs) -> Self {
        Self {
            generation: 0,
            hyperparameters,
            trainer,
            evaluator,
        }
    }

    /// Builds a `Config` from a JSON document, reporting the first missing top-level entry by
    /// name.
    ///
    /// # Errors
    /// `PbtErr::MissingKey` for an absent entry, `PbtErr::InvalidConfig` if the document is not
    /// an object and `PbtErr::Json` if an entry has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(ref map) = value else {
            return Err(PbtErr::InvalidConfig(
                "configuration must be a JSON object".into(),
            ));
        };

        if let Some(key) = REQUIRED_KEYS.into_iter().find(|key| !map.contains_key(*key)) {
            return Err(PbtErr::MissingKey(key));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

/// Whether higher or lower scores are better.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    #[default]
    Maximize,
    Minimize,
}

/// The multipliers applied to every hyperparameter of an exploited member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExploreFactors {
    pub grow: f64,
    pub shrink: f64,
}

impl ExploreFactors {
    /// Creates a new `ExploreFactors`.
    ///
    /// # Errors
    /// `PbtErr::InvalidConfig` if either factor is not finite and positive.
    pub fn new(grow: f64, shrink: f64) -> Result<Self> {
        let factors = Self { grow, shrink };
        factors.validate()?;
        Ok(factors)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, factor) in [("grow", self.grow), ("shrink", self.shrink)] {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(PbtErr::InvalidConfig(format!(
                    "explore factor '{name}' must be finite and positive, got {factor}"
                )));
            }
        }

        Ok(())
    }
}

impl Default for ExploreFactors {
    fn default() -> Self {
        Self {
            grow: 1.2,
            shrink: 0.8,
        }
    }
}

/// Layer widths of the multi-layer perceptron trained by the `pbt` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub layers: Vec<usize>,
}

/// Inline samples, `x_size` inputs followed by `y_size` outputs per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub data: Vec<f32>,
    pub x_size: usize,
    pub y_size: usize,
}

/// The document accepted by the `pbt` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub population_size: NonZeroUsize,
    pub generations: usize,
    #[serde(default)]
    pub explore: ExploreFactors,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub parallel: bool,
    pub scales: RandScales,
    pub config: Value,
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let run: Self = serde_json::from_str(json)?;
        run.explore.validate()?;

        let layers = &run.model.layers;
        if layers.len() < 2 {
            return Err(PbtErr::InvalidConfig(
                "model must have an input and an output width".into(),
            ));
        }

        let (input, output) = (layers[0], layers[layers.len() - 1]);
        if input != run.dataset.x_size || output != run.dataset.y_size {
            return Err(PbtErr::InvalidConfig(format!(
                "model widths {input} -> {output} do not match the dataset's {} inputs and {} outputs",
                run.dataset.x_size, run.dataset.y_size
            )));
        }

        Ok(run)
    }

    /// Loads a `RunConfig` from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validates and returns the base member configuration.
    pub fn base_config(&self) -> Result<Config> {
        Config::from_value(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_top_level_key_is_named() {
        let value = json!({
            "generation": 0,
            "hyperparameters": { "lr": 0.1 },
            "evaluator": {}
        });

        let err = Config::from_value(value).unwrap_err();
        assert!(matches!(err, PbtErr::MissingKey("trainer")));
        assert!(err.to_string().contains("'trainer'"));
    }

    #[test]
    fn non_object_config_is_rejected() {
        let err = Config::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, PbtErr::InvalidConfig(_)));
    }

    #[test]
    fn config_round_trips_kwargs() {
        let config = Config::from_json(
            r#"{
                "generation": 0,
                "hyperparameters": { "lr": 0.1, "momentum": 0.9 },
                "trainer": { "epochs": 5 },
                "evaluator": { "metric": "mse" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.hyperparameters["lr"], 0.1);
        assert_eq!(config.trainer["epochs"], json!(5));
        assert_eq!(config.evaluator["metric"], json!("mse"));
    }

    #[test]
    fn rank_and_explore_defaults() {
        assert_eq!(Rank::default(), Rank::Maximize);
        assert_eq!(ExploreFactors::default(), ExploreFactors::new(1.2, 0.8).unwrap());
        assert_eq!(
            serde_json::from_str::<Rank>("\"minimize\"").unwrap(),
            Rank::Minimize
        );
    }

    fn run_json(layers: &str, x_size: usize, y_size: usize) -> String {
        format!(
            r#"{{
                "population_size": 2,
                "generations": 1,
                "scales": {{ "learning_rate": 2.0 }},
                "config": {{}},
                "model": {{ "layers": {layers} }},
                "dataset": {{ "data": [0.0, 1.0, 1.0], "x_size": {x_size}, "y_size": {y_size} }}
            }}"#
        )
    }

    #[test]
    fn run_config_checks_model_widths_against_dataset() {
        assert!(RunConfig::from_json(&run_json("[2, 4, 1]", 2, 1)).is_ok());

        for (layers, x_size, y_size) in [("[3, 4, 1]", 2, 1), ("[2, 4, 2]", 2, 1), ("[2]", 2, 1)] {
            let err = RunConfig::from_json(&run_json(layers, x_size, y_size)).unwrap_err();
            assert!(matches!(err, PbtErr::InvalidConfig(_)), "{layers}: {err}");
        }
    }

    #[test]
    fn explore_factors_must_be_positive() {
        assert!(ExploreFactors::new(0.0, 0.8).is_err());
        assert!(ExploreFactors::new(1.2, f64::NAN).is_err());
    }
}
