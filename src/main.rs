use std::{env, sync::Arc};

use anyhow::Context;
use log::info;
use machine_learning::dataset::Dataset;
use rand::random;

use pbt::{
    Hyperparameters, RunConfig, SchedulerBuilder,
    adapters::mlp::{MlpEvaluator, MlpFactory, MlpTrainer},
};

const DEMO: &str = include_str!("../demos/xor.json");

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let run = match env::args().nth(1) {
        Some(path) => RunConfig::load(&path).with_context(|| format!("loading '{path}'"))?,
        None => {
            info!("no run file given, using the built-in XOR demo");
            RunConfig::from_json(DEMO)?
        }
    };

    let config = run.base_config()?;
    let seed = run.seed.unwrap_or_else(random);
    let dataset = Dataset::new(
        run.dataset.data.clone(),
        run.dataset.x_size,
        run.dataset.y_size,
    )?;
    let dataset = Arc::new(dataset);

    let factory = MlpFactory::new(run.model.layers.clone(), seed);
    let mut scheduler = SchedulerBuilder::new(run.population_size, run.generations)
        .explore(run.explore)
        .rank(run.rank)
        .seed(seed)
        .build(
            |hyperparameters: &Hyperparameters| factory.create(hyperparameters),
            MlpTrainer::new(dataset.clone()),
            MlpEvaluator::new(dataset),
            &run.scales,
            &config,
        )?;

    if run.parallel {
        scheduler.run_par()?;
    } else {
        scheduler.run()?;
    }

    let best = scheduler.best()?;
    info!(
        "best member: {} (score {:?}) with hyperparameters {:?}",
        best.id(),
        best.last_score(),
        best.hyperparameters()
    );

    Ok(())
}
