use std::{sync::mpsc::Sender, time::Duration};

use log::{debug, info};

/// Progress of a run after a completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Generations completed so far, starting at 1.
    pub generation: usize,
    /// Best score of the generation that just completed.
    pub best_score: f64,
    /// Weighted estimate of the time a generation takes.
    pub speed: Duration,
    /// Estimated time until the run finishes.
    pub eta: Duration,
}

/// Receives a `GenerationReport` after every completed generation.
pub trait Reporter {
    fn report(&mut self, report: &GenerationReport);
}

/// Writes a human-readable progress line through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, report: &GenerationReport) {
        info!(
            "G {}: best score so far: {:.2}\ttime per generation: {:.2} secs\ttime remaining: {:.2} secs",
            report.generation,
            report.best_score,
            report.speed.as_secs_f64(),
            report.eta.as_secs_f64(),
        );
    }
}

/// Forwards every report through a channel. A dropped receiver is not an error.
impl Reporter for Sender<GenerationReport> {
    fn report(&mut self, report: &GenerationReport) {
        if self.send(report.clone()).is_err() {
            debug!(
                generation = report.generation;
                "report receiver disconnected, dropping report"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn report(generation: usize) -> GenerationReport {
        GenerationReport {
            generation,
            best_score: 0.5,
            speed: Duration::from_secs(1),
            eta: Duration::ZERO,
        }
    }

    #[test]
    fn channel_reporter_forwards_reports() {
        let (mut tx, rx) = mpsc::channel::<GenerationReport>();
        tx.report(&report(1));
        tx.report(&report(2));

        let generations: Vec<usize> = rx.try_iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![1, 2]);
    }

    #[test]
    fn channel_reporter_survives_a_dropped_receiver() {
        let (mut tx, rx) = mpsc::channel::<GenerationReport>();
        drop(rx);

        tx.report(&report(1));
        LogReporter.report(&report(1));
    }
}
