use std::num::NonZeroUsize;

use machine_learning::{
    MlErr,
    arch::{Sequential, layers::Layer, loss::CrossEntropy},
    dataset::Dataset,
    optimization::{Algorithm, UpdateRuleConfig},
    training::{ProxTrainer, TrainerConfig, evaluate},
};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Points in `[-1, 1]²` labelled by which coordinate is larger.
fn separable(n: usize, rng: &mut StdRng) -> Dataset {
    let x = Array2::from_shape_fn((n, 2), |_| rng.random_range(-1.0..1.0));
    let labels: Vec<u8> = x.outer_iter().map(|r| (r[1] > r[0]) as u8).collect();
    Dataset::from_labels(x, &labels, 2).unwrap()
}

fn config(epochs: usize) -> TrainerConfig {
    TrainerConfig {
        epochs,
        batch_size: NonZeroUsize::new(10).unwrap(),
        test_batch_size: NonZeroUsize::new(50).unwrap(),
        log_interval: NonZeroUsize::new(5).unwrap(),
        lr: 1e-4,
        max_steps_per_epoch: None,
        seed: 7,
    }
}

fn linear() -> Sequential {
    Sequential::new([Layer::dense((2, 2), None)])
}

#[test]
fn hybrid_sgd_learns_a_linear_boundary() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut train = separable(200, &mut rng);
    let test = separable(100, &mut rng);

    let model = linear();
    let mut params = model.init_params(&mut rng).unwrap();
    let batch = NonZeroUsize::new(50).unwrap();
    let before = evaluate(&mut linear(), &params, &CrossEntropy, &test, batch).unwrap();

    let mut trainer = ProxTrainer::new(
        model,
        CrossEntropy,
        Algorithm::HybridSgd,
        &UpdateRuleConfig::default(),
        config(10),
        rng,
    );
    let report = trainer.run(&mut params, &mut train, &test).unwrap();

    assert_eq!(report.label, "Hybrid-SGD");
    assert_eq!(report.file_stem(), "1e-4hsgd");
    assert_eq!(report.epochs.len(), 10);

    let last = report.epochs.last().unwrap();
    assert!(last.test_loss < before.loss);
    assert!(last.accuracy >= 85.0, "accuracy was {}", last.accuracy);
}

#[test]
fn every_algorithm_reports_each_epoch() {
    for algorithm in Algorithm::ALL {
        let mut rng = StdRng::seed_from_u64(3);
        let mut train = separable(60, &mut rng);
        let test = separable(20, &mut rng);

        let model = linear();
        let mut params = model.init_params(&mut rng).unwrap();
        let rules = UpdateRuleConfig::default();
        let mut trainer = ProxTrainer::new(model, CrossEntropy, algorithm, &rules, config(2), rng);

        let report = trainer.run(&mut params, &mut train, &test).unwrap();
        assert_eq!(report.tag, algorithm.tag());
        assert_eq!(report.epochs.len(), 2);

        for epoch in &report.epochs {
            let violation = epoch.violation.unwrap();
            assert!(violation.is_finite() && violation >= 0.0);
            assert!((0.0..=100.0).contains(&epoch.accuracy));
        }

        // 60 rows in batches of 10, for two epochs
        assert_eq!(trainer.context().iter(), 13);
    }
}

#[test]
fn epochs_can_stop_early() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut train = separable(100, &mut rng);

    let model = linear();
    let mut params = model.init_params(&mut rng).unwrap();
    let config = TrainerConfig {
        max_steps_per_epoch: Some(3),
        ..config(1)
    };
    let rules = UpdateRuleConfig::default();
    let mut trainer =
        ProxTrainer::new(model, CrossEntropy, Algorithm::HybridSgd, &rules, config, rng);

    let violation = trainer.train_epoch(0, &mut params, &mut train).unwrap();
    assert!(violation.is_some());
    assert_eq!(trainer.context().iter(), 4);
}

#[test]
fn failures_carry_the_step_and_algorithm() {
    let mut rng = StdRng::seed_from_u64(1);
    let train = separable(20, &mut rng);

    // parameters for a wider model than the one being trained
    let mut params = Sequential::new([Layer::dense((2, 3), None)])
        .init_params(&mut rng)
        .unwrap();
    let rules = UpdateRuleConfig::default();
    let mut trainer =
        ProxTrainer::new(linear(), CrossEntropy, Algorithm::PStorm, &rules, config(1), rng);

    let (x, y) = train.slice(0, 10).unwrap();
    match trainer.step(&mut params, x, y) {
        Err(MlErr::Step {
            iter, algorithm, ..
        }) => {
            assert_eq!(iter, 1);
            assert_eq!(algorithm, "PStorm");
        }
        other => panic!("expected a step error, got {other:?}"),
    }
}
