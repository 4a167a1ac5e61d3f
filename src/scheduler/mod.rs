mod builder;
mod ranking;

use std::time::{Duration, Instant};

use log::debug;
use rand::{Rng, rngs::StdRng};
use rayon::prelude::*;

pub use builder::SchedulerBuilder;
pub use ranking::{rank_indices, truncation_size};

use crate::{
    Evaluator, ExploreFactors, GenerationReport, Hyperparameters, PbtErr, Rank, Reporter, Result,
    Trainable, Trainer, Worker,
};

/// One truncation-selection pair applied by `Scheduler::exploit_explore`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exploit {
    /// Index of the top performer whose state and hyperparameters were copied.
    pub source: usize,
    /// Index of the bottom performer that was overwritten.
    pub target: usize,
    /// The multiplier applied to every copied hyperparameter.
    pub factor: f64,
}

/// Synchronous population based training scheduler.
///
/// Owns a fixed-size population and alternates train+evaluate rounds with exploit/explore
/// rounds for a fixed amount of generations.
pub struct Scheduler<T, Tr, Ev, R = StdRng> {
    population: Vec<Worker<T>>,
    generations: usize,
    generation: usize,
    scores: Vec<Vec<f64>>,
    losses: Vec<Vec<Vec<f64>>>,
    rank: Rank,
    explore: ExploreFactors,
    trainer: Tr,
    evaluator: Ev,
    rng: R,
    reporter: Box<dyn Reporter>,
}

impl<T, Tr, Ev, R> Scheduler<T, Tr, Ev, R> {
    pub fn population(&self) -> &[Worker<T>] {
        &self.population
    }

    /// Completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Generations executed by `run`.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Scores of every completed generation, aligned by population index.
    pub fn scores(&self) -> &[Vec<f64>] {
        &self.scores
    }

    /// Training losses of every completed generation, aligned by population index.
    pub fn losses(&self) -> &[Vec<Vec<f64>>] {
        &self.losses
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn explore(&self) -> ExploreFactors {
        self.explore
    }

    fn record(&mut self, results: Vec<(Vec<f64>, f64)>) {
        assert_eq!(
            results.len(),
            self.population.len(),
            "every member must report exactly once per generation"
        );

        let (losses, scores) = results.into_iter().unzip();
        self.losses.push(losses);
        self.scores.push(scores);
    }
}

impl<T, Tr, Ev, R> Scheduler<T, Tr, Ev, R>
where
    T: Trainable,
    Tr: Trainer<T>,
    Ev: Evaluator<T>,
    R: Rng,
{
    /// Runs every worker once, in population order, and records their losses and scores.
    ///
    /// # Errors
    /// The first collaborator failure, which aborts the generation without recording it.
    pub fn run_generation(&mut self) -> Result<()> {
        let size = self.population.len();
        let mut results = Vec::with_capacity(size);

        for worker in &mut self.population {
            results.push(worker.run(&self.trainer, &self.evaluator)?);
            debug!(worker_id = worker.id(); "finished {}/{size}", worker.id() + 1);
        }

        self.record(results);
        Ok(())
    }

    /// Ranks the latest generation from best to worst.
    ///
    /// # Returns
    /// A permutation of the population indices.
    ///
    /// # Errors
    /// `PbtErr::NoGenerations` if no generation has been recorded yet.
    pub fn ranker(&self) -> Result<Vec<usize>> {
        let scores = self.scores.last().ok_or(PbtErr::NoGenerations)?;
        assert_eq!(
            scores.len(),
            self.population.len(),
            "score history out of sync with the population"
        );

        Ok(rank_indices(scores, self.rank))
    }

    /// Truncation selection followed by perturbation: the top `ceil(0.2 * size)` members
    /// overwrite the bottom ones, paired by rank, and the copied hyperparameters are all scaled
    /// by one factor drawn per pair.
    ///
    /// # Returns
    /// The applied pairs, best-ranked source first.
    pub fn exploit_explore(&mut self) -> Result<Vec<Exploit>> {
        let ranking = self.ranker()?;
        let size = ranking.len();
        let num = truncation_size(size);
        let (best, worst) = (&ranking[..num], &ranking[size - num..]);

        let mut exploits = Vec::with_capacity(num);
        for (&source, &target) in best.iter().zip(worst) {
            let state = self.population[source].trainable().state();

            let factor = if self.rng.random::<f64>() < 0.5 {
                self.explore.grow
            } else {
                self.explore.shrink
            };

            let hyperparameters: Hyperparameters = self.population[source]
                .hyperparameters()
                .iter()
                .map(|(param, value)| (param.clone(), value * factor))
                .collect();

            self.population[target].exploit(state, hyperparameters)?;
            debug!(source = source, target = target, factor = factor; "exploited");

            exploits.push(Exploit {
                source,
                target,
                factor,
            });
        }

        Ok(exploits)
    }

    /// Returns the best member of the latest generation.
    pub fn best(&self) -> Result<&Worker<T>> {
        let ranking = self.ranker()?;
        Ok(&self.population[ranking[0]])
    }

    /// Runs every generation sequentially, reporting after each one.
    pub fn run(&mut self) -> Result<()> {
        self.run_with(Self::run_generation)
    }

    fn best_score(&self) -> Result<f64> {
        let ranking = self.ranker()?;
        let scores = self.scores.last().ok_or(PbtErr::NoGenerations)?;
        Ok(scores[ranking[0]])
    }

    fn run_with<G>(&mut self, mut run_generation: G) -> Result<()>
    where
        G: FnMut(&mut Self) -> Result<()>,
    {
        let mut speed = 0.0;

        for i in 0..self.generations {
            let tic = Instant::now();
            run_generation(self)?;
            self.exploit_explore()?;
            let elapsed = tic.elapsed().as_secs_f64();

            speed = blend_speed(speed, elapsed, i, self.generations);

            self.generation += 1;
            let generation = self.generation;
            for worker in &mut self.population {
                worker.set_generation(generation);
            }

            let eta = eta_secs(speed, i, self.generations);
            let report = GenerationReport {
                generation,
                best_score: self.best_score()?,
                speed: Duration::from_secs_f64(speed),
                eta: Duration::from_secs_f64(eta),
            };

            self.reporter.report(&report);
        }

        Ok(())
    }
}

impl<T, Tr, Ev, R> Scheduler<T, Tr, Ev, R>
where
    T: Trainable + Send,
    Tr: Trainer<T> + Sync,
    Ev: Evaluator<T> + Sync,
    R: Rng,
{
    /// Like `run_generation`, but runs the workers concurrently on the rayon thread pool.
    /// Results are still recorded in population order.
    pub fn run_generation_par(&mut self) -> Result<()> {
        let (trainer, evaluator) = (&self.trainer, &self.evaluator);
        let results = self
            .population
            .par_iter_mut()
            .map(|worker| worker.run(trainer, evaluator))
            .collect::<Result<Vec<_>>>()?;

        self.record(results);
        Ok(())
    }

    /// Like `run`, with every generation executed by `run_generation_par`.
    pub fn run_par(&mut self) -> Result<()> {
        self.run_with(Self::run_generation_par)
    }
}

/// Weights the previous speed estimate by the share of generations already run and the latest
/// generation's duration by the remaining share.
fn blend_speed(speed: f64, elapsed: f64, i: usize, generations: usize) -> f64 {
    let progress = i as f64 / generations as f64;
    speed * progress + elapsed * (1.0 - progress)
}

/// Seconds left after generation `i` completes, never negative.
fn eta_secs(speed: f64, i: usize, generations: usize) -> f64 {
    (speed * generations as f64 - speed * (i + 1) as f64).max(0.0)
}
