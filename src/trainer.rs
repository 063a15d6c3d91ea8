use crate::config::{SweepConfig, SweepVariable};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::gradient::{Backprop, GradientProvider};
use crate::network::{Architecture, ForwardModel, Mlp, Objective, ParameterSet};
use crate::sgd::Sgd;
use log::{debug, info};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Where the driver is in its sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Parameters for the first sweep value are drawn; no epoch has run.
    Initialized,
    /// The next call to `step` runs epoch `epoch` of sweep value `sweep_index`.
    Running { sweep_index: usize, epoch: usize },
    /// Every sweep value has run for the configured number of epochs.
    SweepComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// Mean minibatch loss over the epoch's full batches.
    pub train_cost: f64,
    /// Fraction of the test set classified correctly after the epoch.
    pub test_accuracy: f64,
}

/// Everything recorded while training from fresh parameters with one sweep value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub value: usize,
    pub batch_size: usize,
    pub hidden_width: usize,
    pub epochs: Vec<EpochRecord>,
    /// Mean wall-clock time of a single minibatch update, in milliseconds.
    pub mean_update_ms: f64,
}

impl RunResult {
    pub fn train_costs(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_cost).collect()
    }

    pub fn test_accuracies(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.test_accuracy).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub variable: SweepVariable,
    pub runs: Vec<RunResult>,
}

#[derive(Debug, Default)]
struct UpdateTimer {
    total: Duration,
    updates: u64,
}

impl UpdateTimer {
    fn mean_ms(&self) -> f64 {
        if self.updates == 0 {
            0.0
        } else {
            self.total.as_secs_f64() * 1000.0 / self.updates as f64
        }
    }
}

/// Runs a hyperparameter sweep: for each sweep value, `epochs` passes of shuffled minibatch SGD
/// from freshly drawn parameters, recording the mean training cost and the test accuracy after
/// every epoch.
pub struct SweepDriver<'a, P, M, R> {
    config: SweepConfig,
    train: &'a Dataset,
    test: &'a Dataset,
    provider: P,
    model: M,
    rng: R,
    objective: Objective,
    optimizer: Sgd,
    params: ParameterSet,
    state: DriverState,
    runs: Vec<RunResult>,
    timer: UpdateTimer,
}

impl<'a, R: Rng> SweepDriver<'a, Backprop, Mlp, R> {
    /// Driver for the fully connected classifier with analytic gradients.
    pub fn mlp(
        config: SweepConfig,
        train: &'a Dataset,
        test: &'a Dataset,
        rng: R,
    ) -> Result<Self> {
        SweepDriver::new(config, train, test, Backprop, Mlp, rng)
    }
}

impl<'a, P, M, R> SweepDriver<'a, P, M, R>
where
    P: GradientProvider,
    M: ForwardModel,
    R: Rng,
{
    pub fn new(
        config: SweepConfig,
        train: &'a Dataset,
        test: &'a Dataset,
        provider: P,
        model: M,
        mut rng: R,
    ) -> Result<Self> {
        config.validate()?;
        if train.feature_count() != test.feature_count() {
            return Err(Error::shape(
                "test feature columns",
                train.feature_count(),
                test.feature_count(),
            ));
        }
        if train.class_count() != test.class_count() {
            return Err(Error::shape(
                "test classes",
                train.class_count(),
                test.class_count(),
            ));
        }
        for &value in &config.values {
            let batch_size = config.batch_size_for(value);
            if train.full_batch_count(batch_size) == 0 {
                return Err(Error::NoFullBatch {
                    rows: train.len(),
                    batch_size,
                });
            }
        }

        let params = architecture(&config, train, config.values[0])?.initialize(&mut rng)?;
        let runs = vec![empty_run(&config, config.values[0])];

        Ok(SweepDriver {
            objective: config.objective(),
            optimizer: config.optimizer(),
            config,
            train,
            test,
            provider,
            model,
            rng,
            params,
            state: DriverState::Initialized,
            runs,
            timer: UpdateTimer::default(),
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Parameters the next epoch will start from.
    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    /// Results recorded so far, including the run in progress.
    pub fn runs(&self) -> &[RunResult] {
        &self.runs
    }

    /// Runs one epoch and advances the state. Returns `None` once the sweep is complete.
    pub fn step(&mut self) -> Result<Option<EpochRecord>> {
        let (sweep_index, epoch) = match self.state {
            DriverState::SweepComplete => return Ok(None),
            DriverState::Initialized => (0, 0),
            DriverState::Running { sweep_index, epoch } => (sweep_index, epoch),
        };
        let value = self.config.values[sweep_index];
        // Parameters for this value were drawn by `new` or by the previous `finish_run`.
        if epoch == 0 {
            info!(
                "training with {} = {value} for {} epochs",
                self.config.variable.label(),
                self.config.epochs
            );
        }

        let record = self.run_epoch(sweep_index, epoch)?;
        debug!(
            "{} = {value}, epoch {epoch}: cost {:.6}, test accuracy {:.4}",
            self.config.variable.label(),
            record.train_cost,
            record.test_accuracy
        );
        self.runs[sweep_index].epochs.push(record.clone());

        // Advance within the run, or close it and move to the next sweep value.
        self.state = if epoch + 1 < self.config.epochs {
            DriverState::Running {
                sweep_index,
                epoch: epoch + 1,
            }
        } else {
            self.finish_run(sweep_index)?
        };
        Ok(Some(record))
    }

    /// Runs every remaining epoch and returns the collected results.
    pub fn run(mut self) -> Result<SweepReport> {
        while self.step()?.is_some() {}
        Ok(self.into_report())
    }

    pub fn into_report(self) -> SweepReport {
        SweepReport {
            variable: self.config.variable,
            runs: self.runs,
        }
    }

    fn run_epoch(&mut self, sweep_index: usize, epoch: usize) -> Result<EpochRecord> {
        let batch_size = self.config.batch_size_for(self.config.values[sweep_index]);
        // Fresh joint permutation every epoch; the partial tail batch is skipped.
        let shuffled = self.train.shuffled(&mut self.rng);

        let mut cost = 0.0;
        let mut batches = 0usize;
        for batch in shuffled.full_batches(batch_size)? {
            // Only the gradient evaluation and the parameter write are timed.
            let started = Instant::now();
            cost += self.optimizer.train_batch(
                &self.provider,
                &self.objective,
                &mut self.params,
                batch,
            )?;
            self.timer.total += started.elapsed();
            self.timer.updates += 1;
            batches += 1;
        }

        // Epoch cost is the mean minibatch loss. A NaN or infinite cost means training diverged.
        let train_cost = cost / batches as f64;
        if !train_cost.is_finite() {
            return Err(Error::NonFiniteCost { epoch });
        }
        let test_accuracy = self.model.accuracy(
            &self.params,
            self.test.features().view(),
            self.test.labels().view(),
        )?;

        Ok(EpochRecord {
            epoch,
            train_cost,
            test_accuracy,
        })
    }

    /// Closes the run at `sweep_index` and, if another sweep value follows, draws fresh
    /// parameters for it.
    fn finish_run(&mut self, sweep_index: usize) -> Result<DriverState> {
        let timer = std::mem::take(&mut self.timer);
        let run = &mut self.runs[sweep_index];
        run.mean_update_ms = timer.mean_ms();
        if let Some(last) = run.epochs.last() {
            info!(
                "{} = {}: final cost {:.6}, test accuracy {:.4}, {:.4} ms per update",
                self.config.variable.label(),
                run.value,
                last.train_cost,
                last.test_accuracy,
                run.mean_update_ms
            );
        }

        // Reset: the next value trains from a fresh draw, never from this run's parameters.
        let next = sweep_index + 1;
        let Some(&value) = self.config.values.get(next) else {
            return Ok(DriverState::SweepComplete);
        };
        self.params = architecture(&self.config, self.train, value)?.initialize(&mut self.rng)?;
        self.runs.push(empty_run(&self.config, value));
        Ok(DriverState::Running {
            sweep_index: next,
            epoch: 0,
        })
    }
}

fn architecture(config: &SweepConfig, train: &Dataset, value: usize) -> Result<Architecture> {
    Architecture::single_hidden(
        train.feature_count(),
        config.hidden_width_for(value),
        train.class_count(),
        config.hidden_activation,
    )
}

fn empty_run(config: &SweepConfig, value: usize) -> RunResult {
    RunResult {
        value,
        batch_size: config.batch_size_for(value),
        hidden_width: config.hidden_width_for(value),
        epochs: Vec::with_capacity(config.epochs),
        mean_update_ms: 0.0,
    }
}
