use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use machine_learning::{
    arch::loss::{CrossEntropy, LossFn, Mse},
    dataset::{idx, Dataset},
    optimization::{Algorithm, UpdateRuleConfig},
    training::{ProxTrainer, RunReport, TrainerConfig},
};
use parameter_server::{QuantizedSgd, QuantizedSgdConfig};
use rand::{rngs::StdRng, SeedableRng};

use crate::config::{DatasetSpec, ExperimentConfig, ExperimentSpec, LossFnSpec};

/// Runs an experiment and writes a CSV and a JSON report per run.
///
/// # Returns
/// The paths of every written report.
pub fn run(config: &ExperimentConfig) -> Result<Vec<PathBuf>> {
    let (train, test) = load(&config.dataset)?;
    info!(
        "loaded {} training and {} test examples",
        train.len(),
        test.len()
    );

    match config.loss {
        LossFnSpec::CrossEntropy => run_with(config, CrossEntropy::new(), &train, &test),
        LossFnSpec::Mse => run_with(config, Mse::new(), &train, &test),
    }
}

fn load(spec: &DatasetSpec) -> Result<(Dataset, Dataset)> {
    let train = idx::load_fashion_mnist(&spec.train_images, &spec.train_labels)
        .context("loading the training set")?;
    let test = idx::load_fashion_mnist(&spec.test_images, &spec.test_labels)
        .context("loading the test set")?;

    Ok((train, test))
}

fn run_with<L: LossFn + Clone>(
    config: &ExperimentConfig,
    loss_fn: L,
    train: &Dataset,
    test: &Dataset,
) -> Result<Vec<PathBuf>> {
    match &config.experiment {
        ExperimentSpec::Prox {
            trainer,
            rules,
            learning_rates,
            algorithms,
        } => {
            let mut written = Vec::new();

            for &lr in learning_rates {
                for &algorithm in algorithms {
                    let trainer = TrainerConfig { lr, ..*trainer };
                    let report = prox_run(
                        config,
                        loss_fn.clone(),
                        algorithm,
                        rules,
                        trainer,
                        train,
                        test,
                    )
                    .with_context(|| format!("{algorithm} with lr={lr}"))?;

                    written.extend(write(&report, &config.output_dir)?);
                }
            }

            Ok(written)
        }
        ExperimentSpec::Quantized { config: run_config } => {
            let report = quantized_run(config, loss_fn, *run_config, train, test)
                .context("quantized run")?;
            write(&report, &config.output_dir)
        }
    }
}

/// Every run of a sweep starts from the same seed, hence from the same parameters.
fn prox_run<L: LossFn>(
    config: &ExperimentConfig,
    loss_fn: L,
    algorithm: Algorithm,
    rules: &UpdateRuleConfig,
    trainer: TrainerConfig,
    train: &Dataset,
    test: &Dataset,
) -> Result<RunReport> {
    let mut rng = StdRng::seed_from_u64(trainer.seed);
    let model = config.build_model();
    let mut params = model.init_params(&mut rng)?;
    let mut train = train.clone();

    let mut trainer = ProxTrainer::new(model, loss_fn, algorithm, rules, trainer, rng);
    Ok(trainer.run(&mut params, &mut train, test)?)
}

fn quantized_run<L: LossFn>(
    config: &ExperimentConfig,
    loss_fn: L,
    run_config: QuantizedSgdConfig,
    train: &Dataset,
    test: &Dataset,
) -> Result<RunReport> {
    let mut rng = StdRng::seed_from_u64(run_config.seed);
    let model = config.build_model();
    let mut params = model.init_params(&mut rng)?;

    let mut session = QuantizedSgd::new(model, loss_fn, &params, train, run_config, rng)?;
    Ok(session.run(&mut params, test)?)
}

fn write(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>> {
    let csv = report
        .write_csv(dir)
        .with_context(|| format!("writing {} report", report.file_stem()))?;
    let json = report
        .write_json(dir)
        .with_context(|| format!("writing {} report", report.file_stem()))?;

    info!("wrote {} and {}", csv.display(), json.display());
    Ok(vec![csv, json])
}
