//! Monte Carlo job controller.
//!
//! [`MonteCarloController`] hands out re-fit jobs for a fixed table of
//! repetitions per configuration and gives the results back in exactly the
//! order the jobs were handed out, whatever order the workers finish in.
//!
//! Every job carries the sending half of its own one-shot channel; the
//! controller keeps the receiving halves in a FIFO queue. Draining pops the
//! front of the queue and blocks on that job's channel alone.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{GasFitError, Result};
use crate::results::FitResults;

/// Answer to [`MonteCarloController::get_new_job`].
#[derive(Debug)]
pub enum JobRequest {
    Job(MonteCarloJob),
    /// No job will ever be handed out again.
    Exhausted,
}

/// Answer to [`MonteCarloController::get_next_result`].
#[derive(Debug)]
pub enum NextResult {
    Ready {
        configuration: usize,
        results: FitResults,
    },
    /// Every handed-out job has been collected and no more will be issued.
    Drained,
}

/// One Monte Carlo re-fit to perform.
///
/// Dropping a job without calling [`complete`](Self::complete) makes the
/// drain side report [`GasFitError::JobAbandoned`].
#[derive(Debug)]
pub struct MonteCarloJob {
    configuration: usize,
    sender: SyncSender<Result<FitResults>>,
}

impl MonteCarloJob {
    /// Index of the fit configuration to re-fit.
    pub fn configuration(&self) -> usize {
        self.configuration
    }

    /// Hand the outcome of the job back to the controller.
    pub fn complete(self, result: Result<FitResults>) {
        // The receiver is gone only after a cancel; the result is not needed then.
        let _ = self.sender.send(result);
    }
}

#[derive(Debug)]
struct PendingResult {
    configuration: usize,
    receiver: Receiver<Result<FitResults>>,
}

#[derive(Debug)]
struct ControllerState {
    /// Configuration the next job belongs to; `repetitions.len()` once exhausted.
    configuration: usize,
    /// Jobs already issued for `configuration`.
    done: usize,
    issued: usize,
    cancelled: bool,
    queue: VecDeque<PendingResult>,
}

/// Thread-safe job/result broker for Monte Carlo re-fits.
#[derive(Debug)]
pub struct MonteCarloController {
    repetitions: Vec<usize>,
    state: Mutex<ControllerState>,
    available: Condvar,
}

impl MonteCarloController {
    /// Create a controller issuing `repetitions[i]` jobs for configuration `i`.
    ///
    /// Configurations with zero repetitions never produce a job.
    pub fn new(repetitions: Vec<usize>) -> Self {
        let first = next_configuration(&repetitions, 0);
        Self {
            repetitions,
            state: Mutex::new(ControllerState {
                configuration: first,
                done: 0,
                issued: 0,
                cancelled: false,
                queue: VecDeque::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// Total number of jobs the controller will issue if not cancelled.
    pub fn total_jobs(&self) -> usize {
        self.repetitions.iter().sum()
    }

    /// Number of jobs handed out so far.
    pub fn issued_jobs(&self) -> usize {
        self.lock().issued
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Take the next job, or learn that there are none left.
    pub fn get_new_job(&self) -> JobRequest {
        let mut state = self.lock();
        if state.cancelled || state.configuration >= self.repetitions.len() {
            return JobRequest::Exhausted;
        }

        let configuration = state.configuration;
        state.done += 1;
        if state.done >= self.repetitions[configuration] {
            state.configuration = next_configuration(&self.repetitions, configuration + 1);
            state.done = 0;
        }
        state.issued += 1;

        let (sender, receiver) = mpsc::sync_channel(1);
        state.queue.push_back(PendingResult {
            configuration,
            receiver,
        });
        drop(state);
        self.available.notify_all();

        JobRequest::Job(MonteCarloJob {
            configuration,
            sender,
        })
    }

    /// Collect the result of the oldest outstanding job.
    ///
    /// Blocks while no job is outstanding but more can still be issued, and
    /// then until the oldest job is completed. Returns
    /// [`NextResult::Drained`] once every job has been collected, or after
    /// [`cancel`](Self::cancel).
    ///
    /// # Errors
    ///
    /// The error a worker completed the job with, or
    /// [`GasFitError::JobAbandoned`] if the job was dropped.
    pub fn get_next_result(&self) -> Result<NextResult> {
        let pending = {
            let mut state = self.lock();
            loop {
                if state.cancelled {
                    return Ok(NextResult::Drained);
                }
                if let Some(pending) = state.queue.pop_front() {
                    break pending;
                }
                if state.configuration >= self.repetitions.len() {
                    return Ok(NextResult::Drained);
                }
                state = self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        match pending.receiver.recv() {
            Ok(Ok(results)) => Ok(NextResult::Ready {
                configuration: pending.configuration,
                results,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GasFitError::JobAbandoned {
                configuration: pending.configuration,
            }),
        }
    }

    /// Stop issuing jobs and discard outstanding results.
    ///
    /// Wakes a drainer blocked waiting for jobs; it then sees
    /// [`NextResult::Drained`]. Jobs already handed out can still be
    /// completed, their results are dropped.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.cancelled = true;
        state.queue.clear();
        drop(state);
        self.available.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First configuration at or after `start` with a nonzero repetition count.
fn next_configuration(repetitions: &[usize], start: usize) -> usize {
    (start..repetitions.len())
        .find(|&i| repetitions[i] > 0)
        .unwrap_or(repetitions.len())
}
