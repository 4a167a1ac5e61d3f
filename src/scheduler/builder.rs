use std::num::NonZeroUsize;

use log::{info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::Scheduler;
use crate::{
    BoxError, Config, Evaluator, ExploreFactors, Hyperparameters, LogReporter, PbtErr, RandScales,
    Rank, Reporter, Result, Trainable, Trainer, Worker,
};

/// Builds a `Scheduler`, creating its population.
pub struct SchedulerBuilder {
    population_size: NonZeroUsize,
    generations: usize,
    explore: ExploreFactors,
    rank: Rank,
    seed: Option<u64>,
    reporter: Box<dyn Reporter>,
}

impl SchedulerBuilder {
    /// Creates a new `SchedulerBuilder` with explore factors `(1.2, 0.8)`, maximized scores and
    /// progress reported through the `log` facade.
    ///
    /// # Arguments
    /// * `population_size` - The fixed amount of members.
    /// * `generations` - The amount of generations `run` executes.
    pub fn new(population_size: NonZeroUsize, generations: usize) -> Self {
        Self {
            population_size,
            generations,
            explore: ExploreFactors::default(),
            rank: Rank::default(),
            seed: None,
            reporter: Box::new(LogReporter),
        }
    }

    pub fn explore(mut self, explore: ExploreFactors) -> Self {
        self.explore = explore;
        self
    }

    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    /// Seeds the scheduler's random number generator, making randomization and perturbation
    /// reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn reporter<P: Reporter + 'static>(mut self, reporter: P) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Creates the population and returns the scheduler, using a `StdRng` seeded from the
    /// configured seed or from the operating system.
    ///
    /// # Arguments
    /// * `factory` - Builds a trainable unit from a member's hyperparameters.
    /// * `trainer` - The train capability.
    /// * `evaluator` - The evaluate capability.
    /// * `scales` - The randomization scale of every hyperparameter.
    /// * `config` - The base configuration every member is copied from.
    ///
    /// # Errors
    /// A configuration error for missing or invalid scales and explore factors, or the first
    /// factory failure.
    pub fn build<T, F, Tr, Ev>(
        self,
        factory: F,
        trainer: Tr,
        evaluator: Ev,
        scales: &RandScales,
        config: &Config,
    ) -> Result<Scheduler<T, Tr, Ev>>
    where
        T: Trainable,
        F: Fn(&Hyperparameters) -> std::result::Result<T, BoxError>,
        Tr: Trainer<T>,
        Ev: Evaluator<T>,
    {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        self.build_with_rng(factory, trainer, evaluator, scales, config, rng)
    }

    /// Like `build`, drawing every random value from `rng`.
    pub fn build_with_rng<T, F, Tr, Ev, R>(
        self,
        factory: F,
        trainer: Tr,
        evaluator: Ev,
        scales: &RandScales,
        config: &Config,
        mut rng: R,
    ) -> Result<Scheduler<T, Tr, Ev, R>>
    where
        T: Trainable,
        F: Fn(&Hyperparameters) -> std::result::Result<T, BoxError>,
        Tr: Trainer<T>,
        Ev: Evaluator<T>,
        R: Rng,
    {
        self.explore.validate()?;
        validate_scales(&config.hyperparameters, scales)?;

        let population = (0..self.population_size.get())
            .map(|id| {
                let member = randomized(config, scales, &mut rng);
                let trainable = factory(&member.hyperparameters)
                    .map_err(|source| PbtErr::Factory { worker_id: id, source })?;
                Ok::<_, PbtErr>(Worker::new(id, trainable, member))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            population_size = population.len(),
            generations = self.generations;
            "population created"
        );

        Ok(Scheduler {
            population,
            generations: self.generations,
            generation: 0,
            scores: Vec::new(),
            losses: Vec::new(),
            rank: self.rank,
            explore: self.explore,
            trainer,
            evaluator,
            rng,
            reporter: self.reporter,
        })
    }
}

/// Every hyperparameter needs a finite, positive scale. Scales without a hyperparameter are
/// ignored.
fn validate_scales(hyperparameters: &Hyperparameters, scales: &RandScales) -> Result<()> {
    for param in hyperparameters.keys() {
        let &scale = scales.get(param).ok_or_else(|| PbtErr::MissingScale {
            param: param.clone(),
        })?;

        if !scale.is_finite() || scale <= 0.0 {
            return Err(PbtErr::InvalidScale {
                param: param.clone(),
                scale,
            });
        }
    }

    for param in scales.keys().filter(|p| !hyperparameters.contains_key(*p)) {
        warn!("ignoring scale for unknown hyperparameter '{param}'");
    }

    Ok(())
}

/// Copies `base`, multiplying every hyperparameter by a factor drawn uniformly from
/// `[1/scale, scale]`.
fn randomized<R: Rng>(base: &Config, scales: &RandScales, rng: &mut R) -> Config {
    let mut member = base.clone();

    for (param, value) in member.hyperparameters.iter_mut() {
        let Some(&scale) = scales.get(param) else {
            continue;
        };

        let (lo, hi) = (scale.recip().min(scale), scale.recip().max(scale));
        let factor = if lo < hi {
            rng.random_range(lo..=hi)
        } else {
            lo
        };

        *value *= factor;
    }

    member
}
