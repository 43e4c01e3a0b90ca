//! Reduction of a sample series into summary statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use super::SampleSeries;
use crate::probe::{ErrorKind, Outcome};

/// Summary of one monitor run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub attempts: u32,
    pub successes: u32,
    /// Fraction of successful attempts, in `[0, 1]`.
    pub success_rate: f64,
    /// Mean latency of the successful attempts; `None` when there were none.
    pub average_latency: Option<Duration>,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    /// Failed attempts per kind.
    pub failures: BTreeMap<ErrorKind, u32>,
}

impl AggregateStats {
    pub fn failed(&self) -> u32 {
        self.attempts - self.successes
    }
}

/// Reduce `series` to its statistics.
pub fn aggregate(series: &SampleSeries) -> AggregateStats {
    let attempts = series.len() as u32;
    let mut successes = 0u32;
    let mut total = Duration::ZERO;
    let mut min_latency: Option<Duration> = None;
    let mut max_latency: Option<Duration> = None;
    let mut failures = BTreeMap::new();

    for outcome in series.outcomes() {
        match outcome {
            Outcome::Success { latency, .. } => {
                successes += 1;
                total += *latency;
                min_latency = Some(min_latency.map_or(*latency, |m| m.min(*latency)));
                max_latency = Some(max_latency.map_or(*latency, |m| m.max(*latency)));
            }
            Outcome::Failure(failure) => {
                *failures.entry(failure.kind).or_insert(0) += 1;
            }
        }
    }

    let success_rate = if attempts == 0 {
        0.0
    } else {
        successes as f64 / attempts as f64
    };

    // Zero successes leaves the average absent rather than dividing by zero
    let average_latency = (successes > 0).then(|| total / successes);

    AggregateStats {
        attempts,
        successes,
        success_rate,
        average_latency,
        min_latency,
        max_latency,
        failures,
    }
}
