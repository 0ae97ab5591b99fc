//! Fit orchestration.
//!
//! [`DefaultFitter`] runs every [`FitConfiguration`] against the dataset in
//! two phases on a fixed pool of worker threads:
//!
//! 1. One plain fit per configuration. Workers take configuration indices
//!    from a shared atomic counter; results are stored by index and handed
//!    to the sink in ascending index order once all workers are done.
//! 2. Monte Carlo re-fits. Workers take jobs from a [`MonteCarloController`],
//!    perturb the measured concentrations with normal noise scaled by their
//!    errors, re-fit and complete the job. The calling thread drains the
//!    results in hand-out order and hands them to the sink.
//!
//! Both phases check the [`CancellationToken`] once per job.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ndarray::Array1;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::FitterConfig;
use crate::data::{Concentration, ConcentrationDataset, SampleConcentrations};
use crate::error::{GasFitError, Result};
use crate::fit_configuration::FitConfiguration;
use crate::fitter::LmFitter;
use crate::monte_carlo::{JobRequest, MonteCarloController, NextResult};
use crate::random::{RandomNumberBuffer, RandomNumberGenerator, RandomSource};
use crate::residual::ResidualFunction;
use crate::results::FitResults;

/// Everything a sink receives about one finished fit.
#[derive(Debug, Clone, Copy)]
pub struct FitRecord<'a> {
    /// Index of the fit configuration.
    pub configuration: usize,
    pub results: &'a FitResults,
    /// Names of the fitted samples, in configuration order.
    pub sample_names: &'a [String],
    /// Names of the free fit parameters, parallel to `results.best_estimate`.
    pub parameter_names: &'a [String],
    /// The concentrations that were fitted (perturbed for Monte Carlo fits).
    pub concentrations: &'a [SampleConcentrations],
}

/// Consumer of finished fits.
///
/// Both callbacks run on the thread that called [`DefaultFitter::fit`]. An
/// error aborts the run and is returned from `fit`.
pub trait ResultSink {
    fn process_result(&mut self, record: &FitRecord<'_>) -> Result<()>;

    fn process_monte_carlo_result(&mut self, record: &FitRecord<'_>) -> Result<()>;
}

/// Cooperative cancellation of a running [`DefaultFitter::fit`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the fitter can run again.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// What a call to [`DefaultFitter::fit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitSummary {
    /// Plain fits forwarded to the sink.
    pub plain_fits: usize,
    /// Monte Carlo fits forwarded to the sink.
    pub monte_carlo_fits: usize,
    /// The run was stopped through the cancellation token.
    pub interrupted: bool,
    /// Size of the worker pool.
    pub workers: usize,
}

/// Per-configuration state shared read-only by the workers.
struct PreparedFit {
    function: ResidualFunction,
    initial: Array1<f64>,
    sample_names: Vec<String>,
    parameter_names: Vec<String>,
}

/// Runs plain and Monte Carlo fits for a set of configurations.
pub struct DefaultFitter {
    dataset: ConcentrationDataset,
    configurations: Vec<FitConfiguration>,
    config: FitterConfig,
    random_source: Option<Arc<dyn RandomSource>>,
    cancellation: CancellationToken,
}

impl DefaultFitter {
    /// Create a fitter over `dataset`.
    ///
    /// # Errors
    ///
    /// [`GasFitError::InvalidConfiguration`] if a configuration refers to a
    /// sample the dataset does not have, or to a disabled sample.
    pub fn new(
        dataset: ConcentrationDataset,
        configurations: Vec<FitConfiguration>,
    ) -> Result<Self> {
        let enabled = dataset.enabled_indices();
        for (index, configuration) in configurations.iter().enumerate() {
            for &sample in configuration.sample_indices() {
                if sample >= dataset.len() {
                    return Err(GasFitError::InvalidConfiguration(format!(
                        "configuration {} uses sample {} but the dataset has {} samples",
                        index,
                        sample,
                        dataset.len()
                    )));
                }
                if enabled.binary_search(&sample).is_err() {
                    return Err(GasFitError::InvalidConfiguration(format!(
                        "configuration {} uses disabled sample {}",
                        index, sample
                    )));
                }
            }
        }

        Ok(Self {
            dataset,
            configurations,
            config: FitterConfig::default(),
            random_source: None,
            cancellation: CancellationToken::new(),
        })
    }

    /// Use the given run configuration.
    pub fn with_config(mut self, config: FitterConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `source` for Monte Carlo perturbations instead of a generator
    /// built from the configuration's seed.
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.random_source = Some(source);
        self
    }

    pub fn dataset(&self) -> &ConcentrationDataset {
        &self.dataset
    }

    pub fn configurations(&self) -> &[FitConfiguration] {
        &self.configurations
    }

    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Handle that stops a running [`fit`](Self::fit) from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Run all plain fits, then all Monte Carlo fits, forwarding every result
    /// to `sink`.
    ///
    /// All worker threads are joined before this returns, including when it
    /// returns an error.
    pub fn fit(&self, sink: &mut dyn ResultSink) -> Result<FitSummary> {
        let workers = self.config.worker_count();
        let mut summary = FitSummary {
            workers,
            ..FitSummary::default()
        };
        if self.configurations.is_empty() {
            return Ok(summary);
        }

        self.config.lm.validate()?;
        let prepared = self.prepare()?;
        let fitter = LmFitter::new(self.config.lm.clone());
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gasfit-worker-{}", i))
            .build()
            .map_err(|e| GasFitError::ThreadPool(format!("failed to create thread pool: {}", e)))?;

        log::info!(
            "fitting {} configurations on {} workers",
            prepared.len(),
            workers
        );
        let plain = self.run_plain_fits(&pool, &prepared, &fitter);
        if self.cancellation.is_cancelled() {
            log::warn!("fit interrupted during plain fits");
            summary.interrupted = true;
            return Ok(summary);
        }

        for (index, (result, fit)) in plain.into_iter().zip(prepared.iter()).enumerate() {
            let results = result?;
            sink.process_result(&FitRecord {
                configuration: index,
                results: &results,
                sample_names: &fit.sample_names,
                parameter_names: &fit.parameter_names,
                concentrations: &results.measured_concentrations,
            })?;
            summary.plain_fits += 1;
        }

        let repetitions: Vec<usize> = self
            .configurations
            .iter()
            .map(FitConfiguration::monte_carlo_repetitions)
            .collect();
        let total: usize = repetitions.iter().sum();
        if total == 0 {
            log::info!("{} plain fits done, no Monte Carlo fits requested", summary.plain_fits);
            return Ok(summary);
        }

        log::info!("starting {} Monte Carlo fits", total);
        let controller = MonteCarloController::new(repetitions);
        summary.monte_carlo_fits =
            self.run_monte_carlo_fits(&pool, &controller, &prepared, &fitter, sink)?;

        if self.cancellation.is_cancelled() {
            log::warn!(
                "fit interrupted after {} of {} Monte Carlo fits",
                summary.monte_carlo_fits,
                total
            );
            summary.interrupted = true;
        } else {
            log::info!("{} Monte Carlo fits done", summary.monte_carlo_fits);
        }
        Ok(summary)
    }

    /// Build every configuration's residual function on the calling thread.
    fn prepare(&self) -> Result<Vec<PreparedFit>> {
        self.configurations
            .iter()
            .map(|configuration| {
                Ok(PreparedFit {
                    function: configuration.build_residual_function(&self.dataset)?,
                    initial: configuration.free_initial_values(),
                    sample_names: configuration.sample_names(&self.dataset)?,
                    parameter_names: configuration.free_parameter_names(),
                })
            })
            .collect()
    }

    /// Phase 1. Entries for configurations skipped after a cancellation are
    /// missing from the returned list.
    fn run_plain_fits(
        &self,
        pool: &ThreadPool,
        prepared: &[PreparedFit],
        fitter: &LmFitter,
    ) -> Vec<Result<FitResults>> {
        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<Result<FitResults>>>> =
            prepared.iter().map(|_| Mutex::new(None)).collect();

        let workers = pool.current_num_threads();
        pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| loop {
                    if self.cancellation.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(fit) = prepared.get(index) else {
                        break;
                    };
                    log::debug!("plain fit of configuration {}", index);
                    let mut function = fit.function.clone();
                    let result = fitter.fit(&mut function, fit.initial.clone());
                    *slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
                });
            }
        });

        slots
            .into_iter()
            .map_while(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    /// Phase 2. Returns the number of results forwarded to the sink.
    fn run_monte_carlo_fits(
        &self,
        pool: &ThreadPool,
        controller: &MonteCarloController,
        prepared: &[PreparedFit],
        fitter: &LmFitter,
        sink: &mut dyn ResultSink,
    ) -> Result<usize> {
        let source: Arc<dyn RandomSource> = match &self.random_source {
            Some(source) => Arc::clone(source),
            None => Arc::new(RandomNumberGenerator::new(self.config.random_seed)),
        };
        let cancellation = &self.cancellation;
        let workers = pool.current_num_threads();
        let buffer_size = self.config.random_buffer_size;

        pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let mut random = RandomNumberBuffer::new(Arc::clone(&source), buffer_size);
                scope.spawn(move |_| loop {
                    if cancellation.is_cancelled() {
                        controller.cancel();
                        break;
                    }
                    let job = match controller.get_new_job() {
                        JobRequest::Job(job) => job,
                        JobRequest::Exhausted => break,
                    };
                    let fit = &prepared[job.configuration()];
                    log::debug!("Monte Carlo fit of configuration {}", job.configuration());
                    job.complete(run_perturbed_fit(fit, fitter, &mut random));
                });
            }

            let drained = drain_results(controller, prepared, sink);
            if drained.is_err() {
                // Stop the workers; the scope joins them before the error leaves.
                controller.cancel();
            }
            drained
        })
    }
}

/// Re-fit `fit` against its measured data plus `N(0, 1) * error` noise.
fn run_perturbed_fit(
    fit: &PreparedFit,
    fitter: &LmFitter,
    random: &mut RandomNumberBuffer,
) -> Result<FitResults> {
    let perturbed = fit
        .function
        .measured()
        .iter()
        .map(|sample| {
            sample
                .iter()
                .map(|(gas, c)| {
                    let value = c.value + random.next_standard_normal() * c.error;
                    (*gas, Concentration::new(value, c.error))
                })
                .collect()
        })
        .collect();
    let mut function = fit.function.with_measured(perturbed)?;
    fitter.fit(&mut function, fit.initial.clone())
}

fn drain_results(
    controller: &MonteCarloController,
    prepared: &[PreparedFit],
    sink: &mut dyn ResultSink,
) -> Result<usize> {
    let mut forwarded = 0;
    loop {
        match controller.get_next_result()? {
            NextResult::Ready {
                configuration,
                results,
            } => {
                let fit = &prepared[configuration];
                sink.process_monte_carlo_result(&FitRecord {
                    configuration,
                    results: &results,
                    sample_names: &fit.sample_names,
                    parameter_names: &fit.parameter_names,
                    concentrations: &results.measured_concentrations,
                })?;
                forwarded += 1;
            }
            NextResult::Drained => return Ok(forwarded),
        }
    }
}
