use crate::error::{Error, Result};
use crate::network::{Activation, Objective};
use crate::sgd::Sgd;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hyperparameter varied across the runs of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepVariable {
    #[default]
    BatchSize,
    HiddenWidth,
}

impl SweepVariable {
    pub fn label(self) -> &'static str {
        match self {
            SweepVariable::BatchSize => "batch_size",
            SweepVariable::HiddenWidth => "hidden_width",
        }
    }
}

/// Where the weight decay enters the update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    /// `decay * sum(w^2)` is added to the loss; biases are not penalized.
    #[default]
    Penalty,
    /// `p <- p - lr * (g + decay * p)` for every parameter.
    Coupled,
}

/// One sweep: the same classifier trained once per entry of `values`. Every field has a
/// default, so an empty JSON object describes the batch-size sweep over the satellite data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub variable: SweepVariable,
    pub values: Vec<usize>,
    pub epochs: usize,
    pub learning_rate: f64,
    pub decay: f64,
    pub decay_mode: DecayMode,
    /// Batch size used when the sweep varies the hidden width.
    pub batch_size: usize,
    /// Hidden width used when the sweep varies the batch size.
    pub hidden_width: usize,
    pub hidden_activation: Activation,
    pub seed: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            variable: SweepVariable::BatchSize,
            values: vec![4, 8, 16, 32, 64],
            epochs: 1000,
            learning_rate: 0.01,
            decay: 1e-6,
            decay_mode: DecayMode::Penalty,
            batch_size: 32,
            hidden_width: 10,
            hidden_activation: Activation::Sigmoid,
            seed: None,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(Error::InvalidConfig("sweep values must not be empty".into()));
        }
        if self.values.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "{} values must be positive, got {:?}",
                self.variable.label(),
                self.values
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(self.decay.is_finite() && self.decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "decay must be non-negative and finite, got {}",
                self.decay
            )));
        }
        if self.batch_size == 0 || self.hidden_width == 0 {
            return Err(Error::InvalidConfig(
                "batch size and hidden width must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn batch_size_for(&self, value: usize) -> usize {
        match self.variable {
            SweepVariable::BatchSize => value,
            SweepVariable::HiddenWidth => self.batch_size,
        }
    }

    pub fn hidden_width_for(&self, value: usize) -> usize {
        match self.variable {
            SweepVariable::BatchSize => self.hidden_width,
            SweepVariable::HiddenWidth => value,
        }
    }

    pub fn objective(&self) -> Objective {
        match self.decay_mode {
            DecayMode::Penalty => Objective::new(self.decay),
            DecayMode::Coupled => Objective::new(0.0),
        }
    }

    pub fn optimizer(&self) -> Sgd {
        match self.decay_mode {
            DecayMode::Penalty => Sgd::new(self.learning_rate),
            DecayMode::Coupled => Sgd::new(self.learning_rate).with_weight_decay(self.decay),
        }
    }
}

/// Source of the train and test sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Whitespace-delimited text files, last column the class label in `{1..5, 7}`.
    Satellite { train: PathBuf, test: PathBuf },
    /// Gzipped IDX files in `dir`, truncated to the given row counts.
    Mnist {
        dir: PathBuf,
        #[serde(default = "default_mnist_train_limit")]
        train_limit: Option<usize>,
        #[serde(default = "default_mnist_test_limit")]
        test_limit: Option<usize>,
    },
}

fn default_mnist_train_limit() -> Option<usize> {
    Some(12000)
}

fn default_mnist_test_limit() -> Option<usize> {
    Some(2000)
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig::Satellite {
            train: PathBuf::from("data/sat_train.txt"),
            test: PathBuf::from("data/sat_test.txt"),
        }
    }
}

/// Top-level experiment file: data source, sweep, and output directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub dataset: DatasetConfig,
    pub sweep: SweepConfig,
    /// Directory the result sinks write into.
    pub output_dir: Option<PathBuf>,
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<ExperimentConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::io(path, source))?;
        let config: ExperimentConfig = serde_json::from_str(&text)?;
        config.sweep.validate()?;
        Ok(config)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("results"))
    }
}
