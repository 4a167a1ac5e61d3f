//! Synchronous population based training.
//!
//! A [`Scheduler`] owns a fixed-size population of [`Worker`]s, each wrapping a [`Trainable`]
//! unit and its own hyperparameters. Every generation trains and evaluates the whole population,
//! then the worst performers copy the state of the best ones and perturb their hyperparameters.

pub mod adapters;
pub mod config;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod trainable;
pub mod worker;

pub use config::{Config, ExploreFactors, Hyperparameters, Kwargs, RandScales, Rank, RunConfig};
pub use error::{BoxError, PbtErr, Result};
pub use report::{GenerationReport, LogReporter, Reporter};
pub use scheduler::{Exploit, Scheduler, SchedulerBuilder};
pub use trainable::{Evaluator, Trainable, Trainer};
pub use worker::Worker;
