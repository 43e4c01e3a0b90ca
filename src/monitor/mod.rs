//! Monitor module for repeated probing of a single target.

mod stats;

pub use stats::*;

use std::time::Duration;

use thiserror::Error;

use crate::observer::{AttemptEvent, Observer, Silent};
use crate::probe::{Outcome, Probe, ProbeTarget};

/// Monitor error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("attempt count must be at least 1")]
    NoAttempts,
}

/// Ordered outcomes of one monitor run against one target.
///
/// Never empty: a run always makes at least one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSeries {
    target: ProbeTarget,
    outcomes: Vec<Outcome>,
}

impl SampleSeries {
    pub fn new(target: ProbeTarget, outcomes: Vec<Outcome>) -> Result<Self, MonitorError> {
        if outcomes.is_empty() {
            return Err(MonitorError::NoAttempts);
        }
        Ok(Self { target, outcomes })
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Drives a probe repeatedly against one target.
///
/// Attempts run strictly one after another. Each attempt is followed by the
/// interval, the last one included, so a run takes about
/// `count * (latency + interval)`. Failures never cut a run short.
pub struct Monitor<'a, P> {
    probe: &'a P,
    observer: &'a dyn Observer,
    timeout: Option<Duration>,
}

impl<'a, P: Probe> Monitor<'a, P> {
    pub fn new(probe: &'a P) -> Self {
        Self {
            probe,
            observer: &Silent,
            timeout: None,
        }
    }

    pub fn observer(mut self, observer: &'a dyn Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Per-attempt timeout; defaults to the target kind's timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn run(
        &self,
        target: &ProbeTarget,
        attempt_count: u32,
        interval: Duration,
    ) -> Result<SampleSeries, MonitorError> {
        if attempt_count == 0 {
            return Err(MonitorError::NoAttempts);
        }

        let timeout = self.timeout.unwrap_or_else(|| target.kind().default_timeout());
        tracing::info!(
            "Monitor: probing {} {} times every {:?}",
            target,
            attempt_count,
            interval
        );

        let mut outcomes = Vec::with_capacity(attempt_count as usize);
        for index in 1..=attempt_count {
            let outcome = self.probe.execute(target, timeout).await;

            self.observer.attempt(&AttemptEvent {
                index,
                count: attempt_count,
                target,
                outcome: &outcome,
            });
            outcomes.push(outcome);

            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        SampleSeries::new(target.clone(), outcomes)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::probe::{ErrorKind, Payload};
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    /// Probe replaying a fixed script of outcomes, then failing with `Timeout`.
    pub struct ScriptedProbe {
        script: Mutex<VecDeque<Outcome>>,
        pub calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        pub fn new(script: Vec<Outcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }
    }

    impl Probe for ScriptedProbe {
        async fn execute(&self, _target: &ProbeTarget, _timeout: Duration) -> Outcome {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Outcome::failure(ErrorKind::Timeout, "script exhausted"))
        }
    }

    pub fn connected(ms: u64) -> Outcome {
        let peer: SocketAddr = "192.0.2.10:80".parse().unwrap();
        Outcome::success(Duration::from_millis(ms), Payload::Connected { peer })
    }
}
