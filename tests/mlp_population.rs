use std::sync::{Arc, mpsc};

use machine_learning::dataset::Dataset;
use serde_json::json;

use pbt::{
    Config, GenerationReport, Hyperparameters, PbtErr, Rank, RunConfig, Scheduler,
    SchedulerBuilder,
    adapters::mlp::{MlpEvaluator, MlpFactory, MlpTrainable, MlpTrainer},
};

const DEMO: &str = include_str!("../demos/xor.json");

type MlpScheduler = Scheduler<MlpTrainable, MlpTrainer, MlpEvaluator>;

fn mk_scheduler(run: &RunConfig, seed: u64) -> pbt::Result<MlpScheduler> {
    let config = run.base_config()?;
    let dataset = Arc::new(Dataset::new(
        run.dataset.data.clone(),
        run.dataset.x_size,
        run.dataset.y_size,
    )?);

    let factory = MlpFactory::new(run.model.layers.clone(), seed);
    SchedulerBuilder::new(run.population_size, run.generations)
        .explore(run.explore)
        .rank(run.rank)
        .seed(seed)
        .build(
            |hyperparameters: &Hyperparameters| factory.create(hyperparameters),
            MlpTrainer::new(dataset.clone()),
            MlpEvaluator::new(dataset),
            &run.scales,
            &config,
        )
}

fn small_demo() -> pbt::Result<RunConfig> {
    let mut run = RunConfig::from_json(DEMO)?;
    run.generations = 3;
    Ok(run)
}

#[test]
fn demo_run_completes() -> pbt::Result<()> {
    let run = small_demo()?;
    assert_eq!(run.rank, Rank::Minimize);

    let mut scheduler = mk_scheduler(&run, 42)?;
    scheduler.run()?;

    assert_eq!(scheduler.generation(), 3);
    assert_eq!(scheduler.scores().len(), 3);
    for scores in scheduler.scores() {
        assert_eq!(scores.len(), run.population_size.get());
    }

    let epochs = run.config["trainer"]["epochs"].as_u64().unwrap() as usize;
    for losses in scheduler.losses().iter().flatten() {
        assert_eq!(losses.len(), epochs);
    }

    let best = scheduler.best()?;
    assert_eq!(best.config().generation, 3);
    assert!(best.last_score().is_some());
    Ok(())
}

#[test]
fn exploited_member_inherits_the_weights() -> pbt::Result<()> {
    let run = small_demo()?;
    let mut scheduler = mk_scheduler(&run, 7)?;

    scheduler.run_generation()?;
    let ranking = scheduler.ranker()?;
    let source_params = scheduler.population()[ranking[0]].trainable().params().to_vec();
    let source_lr = scheduler.population()[ranking[0]].hyperparameters()["learning_rate"];

    let exploits = scheduler.exploit_explore()?;
    assert_eq!(exploits.len(), 2);
    assert_eq!(exploits[0].source, ranking[0]);
    assert_eq!(exploits[0].target, ranking[ranking.len() - 1]);

    let target = &scheduler.population()[exploits[0].target];
    assert_eq!(target.trainable().params(), source_params.as_slice());
    assert_eq!(
        target.hyperparameters()["learning_rate"],
        source_lr * exploits[0].factor
    );
    assert_eq!(
        target.trainable().learning_rate(),
        (source_lr * exploits[0].factor) as f32
    );
    Ok(())
}

#[test]
fn parallel_run_is_reproducible() -> pbt::Result<()> {
    let run = small_demo()?;

    let mut sequential = mk_scheduler(&run, 3)?;
    let mut parallel = mk_scheduler(&run, 3)?;
    sequential.run()?;
    parallel.run_par()?;

    assert_eq!(sequential.losses(), parallel.losses());
    assert_eq!(sequential.scores(), parallel.scores());
    Ok(())
}

#[test]
fn reports_flow_through_a_channel() -> pbt::Result<()> {
    let run = small_demo()?;
    let config = run.base_config()?;
    let dataset = Arc::new(Dataset::new(run.dataset.data.clone(), 2, 1)?);
    let factory = MlpFactory::new(run.model.layers.clone(), 0);
    let (tx, rx) = mpsc::channel::<GenerationReport>();

    let mut scheduler = SchedulerBuilder::new(run.population_size, 2)
        .rank(Rank::Minimize)
        .seed(0)
        .reporter(tx)
        .build(
            |hyperparameters: &Hyperparameters| factory.create(hyperparameters),
            MlpTrainer::new(dataset.clone()),
            MlpEvaluator::new(dataset),
            &run.scales,
            &config,
        )?;
    scheduler.run()?;
    drop(scheduler);

    let reports: Vec<_> = rx.iter().collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].generation, 2);
    assert!(reports[1].eta.is_zero());
    Ok(())
}

#[test]
fn incomplete_member_config_is_rejected() {
    let mut run = RunConfig::from_json(DEMO).unwrap();
    run.config = json!({
        "generation": 0,
        "hyperparameters": { "learning_rate": 1.0 },
        "trainer": {}
    });

    assert!(matches!(
        run.base_config(),
        Err(PbtErr::MissingKey("evaluator"))
    ));
}

#[test]
fn missing_learning_rate_fails_the_factory() {
    let run = RunConfig::from_json(DEMO).unwrap();
    let mut config: Config = run.base_config().unwrap();
    config.hyperparameters.remove("learning_rate");

    let mut scales = run.scales.clone();
    scales.remove("learning_rate");

    let dataset = Arc::new(Dataset::new(run.dataset.data.clone(), 2, 1).unwrap());
    let factory = MlpFactory::new(run.model.layers.clone(), 0);
    let result = SchedulerBuilder::new(run.population_size, 1).seed(0).build(
        |hyperparameters: &Hyperparameters| factory.create(hyperparameters),
        MlpTrainer::new(dataset.clone()),
        MlpEvaluator::new(dataset),
        &scales,
        &config,
    );

    assert!(matches!(result, Err(PbtErr::Factory { worker_id: 0, .. })));
}

#[test]
fn model_wider_than_the_dataset_fails_the_generation() {
    let run = RunConfig::from_json(DEMO).unwrap();
    let config = run.base_config().unwrap();
    let dataset = Arc::new(Dataset::new(run.dataset.data.clone(), 2, 1).unwrap());
    let factory = MlpFactory::new(vec![3, 4, 1], 0);

    let mut scheduler = SchedulerBuilder::new(run.population_size, 1)
        .seed(0)
        .build(
            |hyperparameters: &Hyperparameters| factory.create(hyperparameters),
            MlpTrainer::new(dataset.clone()),
            MlpEvaluator::new(dataset),
            &run.scales,
            &config,
        )
        .unwrap();

    let err = scheduler.run().unwrap_err();
    assert!(matches!(err, PbtErr::Training { worker_id: 0, .. }));
    assert!(err.to_string().contains("layer input width"));
}

#[test]
fn run_file_with_mismatched_widths_is_rejected() {
    let mut value: serde_json::Value = serde_json::from_str(DEMO).unwrap();
    value["model"]["layers"] = json!([3, 4, 1]);

    let err = RunConfig::from_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, PbtErr::InvalidConfig(_)));
}
