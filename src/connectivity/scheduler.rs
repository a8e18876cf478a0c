use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use log::{debug, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use crate::connectivity::csd::{compute_trial, CsdAccumulator, TrialOutcome};
use crate::connectivity::error::{ConnectivityError, FaultKind, TrialFault};
use crate::connectivity::spectral::SpectrumBuilder;
use crate::connectivity::taper::TaperSet;
use crate::connectivity::trial::TrialData;
/// Everything a worker needs besides the trial itself. Shared read-only.
pub struct TrialJob<'a> {
    pub builder: &'a SpectrumBuilder,
    pub tapers: &'a TaperSet,
    pub channels: usize,
    pub samples: usize,
}
/// What happened to a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub computed: usize,
    pub cached: usize,
    pub faults: Vec<TrialFault>,
}
impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.computed + self.cached
    }
}
/// Runs one task per trial on a rayon pool and blocks until all are merged.
#[derive(Debug)]
pub struct TrialScheduler {
    pool: Option<ThreadPool>,
}
impl TrialScheduler {
    /// `worker_threads == 0` uses rayon's global pool.
    pub fn new(worker_threads: usize) -> Result<Self, ConnectivityError> {
        if worker_threads == 0 {
            return Ok(Self { pool: None });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|idx| format!("csd-worker-{idx}"))
            .build()
            .map_err(|err| ConnectivityError::ThreadPool(err.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }
    pub fn worker_count(&self) -> usize {
        self.pool
            .as_ref()
            .map(ThreadPool::current_num_threads)
            .unwrap_or_else(rayon::current_num_threads)
    }
    pub fn run(
        &self,
        trials: &mut [TrialData],
        job: &TrialJob<'_>,
        accumulator: &CsdAccumulator,
    ) -> BatchReport {
        let mut work = || -> Vec<Result<TrialOutcome, TrialFault>> {
            trials
                .par_iter_mut()
                .enumerate()
                .map(|(index, trial)| process_trial(index, trial, job, accumulator))
                .collect()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        };
        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(TrialOutcome::Computed) => report.computed += 1,
                Ok(TrialOutcome::Cached) => report.cached += 1,
                Err(fault) => report.faults.push(fault),
            }
        }
        debug!(
            "batch done on {} workers: {} computed, {} cached, {} failed",
            self.worker_count(),
            report.computed,
            report.cached,
            report.faults.len()
        );
        if let Some(first) = report.faults.first() {
            warn!(
                "{} of {} trials excluded from the CSD sum (first: {})",
                report.faults.len(),
                trials.len(),
                first
            );
        }
        report
    }
}
/// Validates, computes and merges a single trial. A failed trial never
/// touches the accumulator and loses its caches.
fn process_trial(
    index: usize,
    trial: &mut TrialData,
    job: &TrialJob<'_>,
    accumulator: &CsdAccumulator,
) -> Result<TrialOutcome, TrialFault> {
    trial
        .validate(job.channels, job.samples)
        .map_err(|kind| TrialFault { trial: index, kind })?;
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| -> Result<TrialOutcome, FaultKind> {
        let outcome = compute_trial(trial, job.builder, job.tapers);
        if outcome == TrialOutcome::Computed {
            accumulator.merge(trial.pair_csd())?;
        }
        Ok(outcome)
    }));
    let result = match attempt {
        Ok(result) => result,
        Err(payload) => Err(FaultKind::Panicked(panic_message(payload.as_ref()))),
    };
    result.map_err(|kind| {
        trial.invalidate_cache();
        TrialFault { trial: index, kind }
    })
}
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
