use clap::Parser;
use log::{LevelFilter, error, info};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use std::process::ExitCode;
use sweep_trainer::dataset::load_labeled_table;
use sweep_trainer::labels::LabelEncoder;
use sweep_trainer::mnist::MnistData;
use sweep_trainer::report::{CsvSink, JsonSink, ResultSink};
use sweep_trainer::scaling::scale_global;
use sweep_trainer::{Dataset, DatasetConfig, ExperimentConfig, Result, SweepDriver};

/// Train a small classifier once per value of a hyperparameter sweep and write the learning
/// curves to disk.
#[derive(Parser, Debug)]
#[command(name = "sweep-trainer", version)]
struct Cli {
    /// JSON experiment configuration; defaults apply to every missing field
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of epochs per sweep value
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Override the learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Override the sweep values, comma separated
    #[arg(long, value_delimiter = ',')]
    values: Option<Vec<usize>>,

    /// Seed the random generator for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the result files
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Log every epoch
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => logger.parse_filters(&filters),
        Err(_) if cli.verbose => logger.filter_level(LevelFilter::Debug),
        Err(_) => logger.filter_level(LevelFilter::Info),
    };
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(epochs) = cli.epochs {
        config.sweep.epochs = epochs;
    }
    if let Some(lr) = cli.lr {
        config.sweep.learning_rate = lr;
    }
    if let Some(values) = cli.values {
        config.sweep.values = values;
    }
    if cli.seed.is_some() {
        config.sweep.seed = cli.seed;
    }
    if cli.out_dir.is_some() {
        config.output_dir = cli.out_dir;
    }
    config.sweep.validate()?;

    let (train, test) = load_datasets(&config.dataset)?;
    info!(
        "train set {} x {}, test set {} x {}, {} classes",
        train.len(),
        train.feature_count(),
        test.len(),
        test.feature_count(),
        train.class_count()
    );

    let rng = match config.sweep.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let report = SweepDriver::mlp(config.sweep.clone(), &train, &test, rng)?.run()?;

    let out_dir = config.output_dir();
    let prefix = report.variable.label();
    let mut sinks: Vec<Box<dyn ResultSink>> = vec![
        Box::new(JsonSink::new(out_dir.join(format!("{prefix}_sweep.json")))),
        Box::new(CsvSink::new(&out_dir, prefix)),
    ];
    for sink in &mut sinks {
        sink.publish(&report)?;
    }
    info!("results written to {}", out_dir.display());
    Ok(())
}

fn load_datasets(source: &DatasetConfig) -> Result<(Dataset, Dataset)> {
    match source {
        DatasetConfig::Satellite { train, test } => {
            let encoder = LabelEncoder::satellite();
            let load = |path: &PathBuf| -> Result<Dataset> {
                let table = load_labeled_table(path)?;
                Dataset::new(
                    scale_global(&table.features)?,
                    encoder.one_hot(&table.labels)?,
                )
            };
            Ok((load(train)?, load(test)?))
        }
        DatasetConfig::Mnist {
            dir,
            train_limit,
            test_limit,
        } => {
            let mnist = MnistData::load(dir, *train_limit, *test_limit)?;
            Ok((mnist.training_data, mnist.test_data))
        }
    }
}
