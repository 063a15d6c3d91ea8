//! Minibatch SGD hyperparameter sweeps for small softmax classifiers.
//!
//! A sweep trains a one-hidden-layer network once per value of a single hyperparameter (the
//! batch size or the hidden width), each time from freshly initialized parameters, and records
//! the per-epoch training cost, test accuracy and update timing.

pub mod config;
pub mod dataset;
pub mod error;
pub mod gradient;
pub mod init;
pub mod labels;
pub mod mnist;
pub mod network;
pub mod report;
pub mod scaling;
pub mod sgd;
pub mod trainer;

pub use config::{DatasetConfig, DecayMode, ExperimentConfig, SweepConfig, SweepVariable};
pub use dataset::{Batch, Dataset};
pub use error::{Error, Result};
pub use gradient::{Backprop, GradientProvider, NumericGradient};
pub use network::{Activation, Architecture, ForwardModel, Mlp, Objective, ParameterSet};
pub use sgd::Sgd;
pub use trainer::{DriverState, EpochRecord, RunResult, SweepDriver, SweepReport};
