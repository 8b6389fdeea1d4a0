use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use machine_learning::{
    arch::{activations::ActFn, layers::Layer, Sequential},
    optimization::{Algorithm, UpdateRuleConfig},
    training::TrainerConfig,
};
use parameter_server::QuantizedSgdConfig;
use serde::{Deserialize, Serialize};

/// Serializable description of an `ActFn`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Tanh,
    Relu,
}

/// Serializable description of a `Layer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
}

/// Serializable description of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

/// Which `LossFn` to train with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    #[default]
    CrossEntropy,
    Mse,
}

/// Where the (decompressed) IDX files live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub train_images: PathBuf,
    pub train_labels: PathBuf,
    pub test_images: PathBuf,
    pub test_labels: PathBuf,
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentSpec {
    /// Train once per `(lr, algorithm)` pair with a proximal update rule.
    Prox {
        #[serde(default)]
        trainer: TrainerConfig,
        #[serde(default)]
        rules: UpdateRuleConfig,
        #[serde(default = "default_learning_rates")]
        learning_rates: Vec<f32>,
        #[serde(default = "default_algorithms")]
        algorithms: Vec<Algorithm>,
    },
    /// A single simulated distributed run with quantized gradients.
    Quantized {
        #[serde(default)]
        config: QuantizedSgdConfig,
    },
}

fn default_learning_rates() -> Vec<f32> {
    vec![1e-4, 1e-6, 0.]
}

fn default_algorithms() -> Vec<Algorithm> {
    Algorithm::ALL.to_vec()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

/// An experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset: DatasetSpec,
    pub model: ModelSpec,
    #[serde(default)]
    pub loss: LossFnSpec,
    pub experiment: ExperimentSpec,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl ExperimentConfig {
    /// Reads an experiment from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading experiment file {}", path.display()))?;

        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing experiment file {}", path.display()))?;
        Ok(config)
    }

    /// Builds a fresh, untrained model from its description.
    pub fn build_model(&self) -> Sequential {
        match &self.model {
            ModelSpec::Sequential { layers } => {
                Sequential::new(layers.iter().map(|spec| resolve_layer(*spec)))
            }
        }
    }
}

fn resolve_layer(spec: LayerSpec) -> Layer {
    match spec {
        LayerSpec::Dense { dim, act_fn } => Layer::dense(dim, act_fn.map(resolve_act_fn)),
    }
}

fn resolve_act_fn(spec: ActFnSpec) -> ActFn {
    match spec {
        ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
        ActFnSpec::Tanh => ActFn::tanh(),
        ActFnSpec::Relu => ActFn::relu(),
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::Model;

    use super::*;

    const PROX: &str = r#"{
        "dataset": {
            "train_images": "data/train-images-idx3-ubyte",
            "train_labels": "data/train-labels-idx1-ubyte",
            "test_images": "data/t10k-images-idx3-ubyte",
            "test_labels": "data/t10k-labels-idx1-ubyte"
        },
        "model": {
            "sequential": {
                "layers": [
                    { "dense": { "dim": [784, 500], "act_fn": "relu" } },
                    { "dense": { "dim": [500, 10], "act_fn": null } }
                ]
            }
        },
        "experiment": {
            "prox": {
                "trainer": { "epochs": 2, "batch_size": 32 },
                "algorithms": ["sb", "Hybrid-SGD"]
            }
        }
    }"#;

    #[test]
    fn prox_sweeps_fill_in_defaults() {
        let config: ExperimentConfig = serde_json::from_str(PROX).unwrap();

        assert_eq!(config.loss, LossFnSpec::CrossEntropy);
        assert_eq!(config.output_dir, PathBuf::from("results"));

        let ExperimentSpec::Prox {
            trainer,
            learning_rates,
            algorithms,
            ..
        } = config.experiment
        else {
            panic!("expected a prox experiment");
        };

        assert_eq!(trainer.epochs, 2);
        assert_eq!(trainer.batch_size.get(), 32);
        assert_eq!(trainer.test_batch_size.get(), 1000);
        assert_eq!(learning_rates, [1e-4, 1e-6, 0.]);
        assert_eq!(algorithms, [Algorithm::SpiderBoost, Algorithm::HybridSgd]);
    }

    #[test]
    fn builds_the_described_model() {
        let config: ExperimentConfig = serde_json::from_str(PROX).unwrap();
        let model = config.build_model();

        assert_eq!(
            model.shapes(),
            [vec![784, 500], vec![500], vec![500, 10], vec![10]]
        );
    }

    #[test]
    fn quantized_runs_parse() {
        let mut value: serde_json::Value = serde_json::from_str(PROX).unwrap();
        value["experiment"] = serde_json::json!({ "quantized": { "config": { "bits": 8 } } });
        let config: ExperimentConfig = serde_json::from_value(value).unwrap();

        let ExperimentSpec::Quantized { config } = config.experiment else {
            panic!("expected a quantized experiment");
        };
        assert_eq!(config.bits, 8);
        assert_eq!(config.workers, 10);
    }
}
