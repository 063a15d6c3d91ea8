use ndarray::{Array1, Array2, array};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use sweep_trainer::init::weight_limit;
use sweep_trainer::labels::LabelEncoder;
use sweep_trainer::scaling::scale_global;
use sweep_trainer::{
    Dataset, DriverState, GradientProvider, Mlp, NumericGradient, Objective, SweepConfig,
    SweepDriver, SweepVariable,
};

/// Ten rows, two features, three well separated classes.
fn synthetic() -> Dataset {
    let features = array![
        [0.0, 0.1],
        [0.2, 0.0],
        [0.1, 0.2],
        [4.0, 4.1],
        [4.2, 3.9],
        [3.9, 4.2],
        [8.0, 0.1],
        [8.1, 0.3],
        [7.9, 0.0],
        [0.1, 0.0]
    ];
    let raw = Array1::from_vec(vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 1.0]);
    let labels = LabelEncoder::new(3).one_hot(&raw).unwrap();
    Dataset::new(scale_global(&features).unwrap(), labels).unwrap()
}

fn sweep(values: Vec<usize>, epochs: usize) -> SweepConfig {
    SweepConfig {
        values,
        epochs,
        learning_rate: 0.5,
        hidden_width: 8,
        ..SweepConfig::default()
    }
}

#[test]
fn ten_rows_batch_four_records_one_cost_per_epoch() {
    let data = synthetic();
    assert_eq!(data.full_batch_count(4), 2);

    let report = SweepDriver::mlp(sweep(vec![4], 5), &data, &data, StdRng::seed_from_u64(1))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.variable, SweepVariable::BatchSize);
    assert_eq!(report.runs.len(), 1);
    let run = &report.runs[0];
    assert_eq!(run.train_costs().len(), 5);
    assert_eq!(
        run.epochs.iter().map(|e| e.epoch).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    assert!(run.train_costs().iter().all(|c| c.is_finite() && *c > 0.0));
    assert!(run.test_accuracies().iter().all(|a| (0.0..=1.0).contains(a)));
}

#[test]
fn training_cost_falls_on_separable_data() {
    let data = synthetic();
    let report = SweepDriver::mlp(sweep(vec![4], 300), &data, &data, StdRng::seed_from_u64(2))
        .unwrap()
        .run()
        .unwrap();

    let costs = report.runs[0].train_costs();
    let early: f64 = costs[..20].iter().sum::<f64>() / 20.0;
    let late: f64 = costs[costs.len() - 20..].iter().sum::<f64>() / 20.0;
    assert!(late < early, "mean cost rose from {early} to {late}");

    let accuracy = report.runs[0].epochs.last().unwrap().test_accuracy;
    assert!(accuracy >= 0.8, "final accuracy {accuracy}");
}

#[test]
fn sweep_values_start_from_fresh_parameters() {
    let data = synthetic();
    let mut driver =
        SweepDriver::mlp(sweep(vec![2, 4, 5], 3), &data, &data, StdRng::seed_from_u64(3)).unwrap();

    let mut starts = vec![driver.parameters().clone()];
    while driver.step().unwrap().is_some() {
        if let DriverState::Running { epoch: 0, .. } = driver.state() {
            starts.push(driver.parameters().clone());
        }
    }
    assert_eq!(driver.state(), DriverState::SweepComplete);
    assert_eq!(starts.len(), 3);

    let hidden_limit = weight_limit(2, 8, true);
    let output_limit = weight_limit(8, 3, false);
    for start in &starts {
        let layers = start.layers();
        assert_eq!(layers[0].weights.dim(), (2, 8));
        assert_eq!(layers[1].weights.dim(), (8, 3));
        assert!(layers[0].weights.iter().all(|w| w.abs() <= hidden_limit));
        assert!(layers[1].weights.iter().all(|w| w.abs() <= output_limit));
        assert!(layers.iter().all(|l| l.bias.iter().all(|&b| b == 0.0)));
    }
    assert_ne!(starts[0], starts[1]);
    assert_ne!(starts[1], starts[2]);

    let report = driver.into_report();
    assert_eq!(
        report.runs.iter().map(|r| r.value).collect::<Vec<_>>(),
        vec![2, 4, 5]
    );
    assert!(report.runs.iter().all(|r| r.epochs.len() == 3));
}

#[test]
fn seeded_sweeps_are_reproducible() {
    let data = synthetic();
    let run = |seed| {
        SweepDriver::mlp(sweep(vec![4, 5], 4), &data, &data, StdRng::seed_from_u64(seed))
            .unwrap()
            .run()
            .unwrap()
    };
    let first = run(9);
    let second = run(9);
    for (a, b) in first.runs.iter().zip(&second.runs) {
        assert_eq!(a.epochs, b.epochs);
    }
}

#[test]
fn driver_accepts_any_gradient_provider() {
    let data = synthetic();
    let provider = NumericGradient::new(Mlp, 1e-6);
    let config = SweepConfig {
        hidden_width: 3,
        ..sweep(vec![5], 2)
    };
    let report = SweepDriver::new(config, &data, &data, provider, Mlp, StdRng::seed_from_u64(4))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.runs[0].epochs.len(), 2);

    let mut rng = StdRng::seed_from_u64(5);
    let params = sweep_trainer::Architecture::single_hidden(2, 3, 3, Default::default())
        .unwrap()
        .initialize(&mut rng)
        .unwrap();
    let evaluation = provider
        .evaluate(&Objective::new(0.0), &params, data.as_batch())
        .unwrap();
    assert!(evaluation.loss.is_finite());
    assert!(evaluation.gradients.max_abs() > 0.0);
}

#[test]
fn labels_outside_the_domain_fail_fast() {
    let raw = Array1::from_vec(vec![1.0, 2.0, 8.0]);
    assert!(LabelEncoder::satellite().one_hot(&raw).is_err());

    let features: Array2<f64> = Array2::zeros((3, 2));
    let labels = Array2::zeros((2, 6));
    assert!(Dataset::new(features, labels).is_err());
}
