use log::trace;

use crate::{Config, Evaluator, Hyperparameters, PbtErr, Result, Trainable, Trainer};

/// A single population member: a trainable unit plus its own configuration.
#[derive(Debug)]
pub struct Worker<T> {
    id: usize,
    trainable: T,
    config: Config,
    last_losses: Vec<f64>,
    last_score: Option<f64>,
}

impl<T: Trainable> Worker<T> {
    /// Creates a new `Worker`.
    ///
    /// # Args
    /// * `id` - The member's index in the population.
    /// * `trainable` - The unit built from `config.hyperparameters`.
    /// * `config` - This member's own configuration.
    ///
    /// # Returns
    /// A new worker instance.
    pub fn new(id: usize, trainable: T, config: Config) -> Self {
        Self {
            id,
            trainable,
            config,
            last_losses: Vec::new(),
            last_score: None,
        }
    }

    /// Trains the unit with the static trainer arguments.
    ///
    /// # Errors
    /// `PbtErr::Training` wrapping whatever the trainer returned.
    pub fn train<Tr: Trainer<T>>(&mut self, trainer: &Tr) -> Result<&[f64]> {
        self.last_losses = trainer
            .train(&mut self.trainable, &self.config.trainer)
            .map_err(|source| PbtErr::Training {
                worker_id: self.id,
                generation: self.config.generation,
                source,
            })?;

        Ok(&self.last_losses)
    }

    /// Scores the unit with the static evaluator arguments.
    ///
    /// # Errors
    /// `PbtErr::Evaluation` wrapping whatever the evaluator returned.
    pub fn evaluate<Ev: Evaluator<T>>(&mut self, evaluator: &Ev) -> Result<f64> {
        let score = evaluator
            .evaluate(&mut self.trainable, &self.config.evaluator)
            .map_err(|source| PbtErr::Evaluation {
                worker_id: self.id,
                generation: self.config.generation,
                source,
            })?;

        self.last_score = Some(score);
        Ok(score)
    }

    /// Trains, then evaluates the freshly trained unit.
    ///
    /// # Returns
    /// The training losses and the score.
    pub fn run<Tr, Ev>(&mut self, trainer: &Tr, evaluator: &Ev) -> Result<(Vec<f64>, f64)>
    where
        Tr: Trainer<T>,
        Ev: Evaluator<T>,
    {
        self.train(trainer)?;
        let score = self.evaluate(evaluator)?;
        trace!(worker_id = self.id, score = score; "worker finished");
        Ok((self.last_losses.clone(), score))
    }

    /// Overwrites the unit's state with `state` and adopts `hyperparameters`.
    pub(crate) fn exploit(
        &mut self,
        state: T::State,
        hyperparameters: Hyperparameters,
    ) -> Result<()> {
        self.trainable
            .set_state(state)
            .map_err(|source| PbtErr::State {
                worker_id: self.id,
                source,
            })?;
        self.trainable
            .set_hyperparameters(&hyperparameters)
            .map_err(|source| PbtErr::Hyperparameters {
                worker_id: self.id,
                source,
            })?;

        self.config.hyperparameters = hyperparameters;
        Ok(())
    }

    pub(crate) fn set_generation(&mut self, generation: usize) {
        self.config.generation = generation;
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn trainable(&self) -> &T {
        &self.trainable
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.config.hyperparameters
    }

    /// Losses returned by the most recent training call.
    pub fn last_losses(&self) -> &[f64] {
        &self.last_losses
    }

    /// Score returned by the most recent evaluation, if any.
    pub fn last_score(&self) -> Option<f64> {
        self.last_score
    }
}
