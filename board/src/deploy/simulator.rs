//! Demo-mode signal simulator.
//!
//! Keeps a preview board animating when no upstream signals arrive. Only
//! wired in when `simulate` is enabled; real integrations push signals
//! through the inbox instead.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::deploy::fsm::{Outcome, Signal};
use crate::deploy::signals::SignalSource;
use crate::models::record::{DeploymentRecord, DeploymentStatus};

/// Simulator tuning
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Chance per tick that a pending deployment starts
    pub start_probability: f64,

    /// Smallest progress step per tick
    pub min_step: u8,

    /// Largest progress step per tick
    pub max_step: u8,

    /// Progress at which a running deployment completes
    pub completion_threshold: u8,

    /// Chance that a completing deployment succeeds
    pub success_probability: f64,

    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            start_probability: 0.3,
            min_step: 5,
            max_step: 20,
            completion_threshold: 90,
            success_probability: 0.9,
            seed: None,
        }
    }
}

/// Randomized stand-in for upstream signals
pub struct DemoSimulator {
    options: SimulatorOptions,
    rng: Mutex<StdRng>,
}

impl DemoSimulator {
    pub fn new(options: SimulatorOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            options,
            rng: Mutex::new(rng),
        }
    }
}

impl SignalSource for DemoSimulator {
    fn next_signal(&self, record: &DeploymentRecord, _now: DateTime<Utc>) -> Option<Signal> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let opts = &self.options;

        match record.status {
            DeploymentStatus::Pending => rng
                .gen_bool(opts.start_probability.clamp(0.0, 1.0))
                .then_some(Signal::Started { started_at: None }),
            DeploymentStatus::Running => {
                if record.progress.unwrap_or(0) >= opts.completion_threshold {
                    let outcome = if rng.gen_bool(opts.success_probability.clamp(0.0, 1.0)) {
                        Outcome::Success
                    } else {
                        Outcome::Failed
                    };
                    Some(Signal::Completed { outcome, duration: None })
                } else {
                    let low = opts.min_step.max(1);
                    let high = opts.max_step.max(low);
                    Some(Signal::Progress { delta: rng.gen_range(low..=high) })
                }
            }
            DeploymentStatus::Success | DeploymentStatus::Failed => None,
        }
    }
}
