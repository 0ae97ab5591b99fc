//! Tests for the Monte Carlo job controller under concurrent use

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use gasfit_rs::monte_carlo::{JobRequest, MonteCarloController, NextResult};
use gasfit_rs::{FitResults, GasFitError};

fn tagged(value: f64) -> FitResults {
    FitResults {
        chi_square: value,
        ..FitResults::new(0, 0)
    }
}

#[test]
fn test_results_come_back_in_hand_out_order() {
    let controller = MonteCarloController::new(vec![2, 0, 3]);
    let mut jobs = Vec::new();
    while let JobRequest::Job(job) = controller.get_new_job() {
        jobs.push(job);
    }
    assert_eq!(jobs.len(), 5);
    assert_eq!(
        jobs.iter().map(|j| j.configuration()).collect::<Vec<_>>(),
        vec![0, 0, 2, 2, 2]
    );

    // Complete in reverse order; the drain order must not change.
    for (i, job) in jobs.into_iter().enumerate().rev() {
        job.complete(Ok(tagged(i as f64)));
    }

    let mut order = Vec::new();
    while let NextResult::Ready {
        configuration,
        results,
    } = controller.get_next_result().unwrap()
    {
        order.push((configuration, results.chi_square));
    }
    assert_eq!(
        order,
        vec![(0, 0.0), (0, 1.0), (2, 2.0), (2, 3.0), (2, 4.0)]
    );
}

#[test]
fn test_worker_threads_with_random_delays() {
    let controller = MonteCarloController::new(vec![4, 1, 6]);
    let handed_out = Mutex::new(Vec::new());

    let drained = thread::scope(|scope| {
        for worker in 0..4u64 {
            let controller = &controller;
            let handed_out = &handed_out;
            scope.spawn(move || loop {
                let job = {
                    let mut log = handed_out.lock().unwrap();
                    match controller.get_new_job() {
                        JobRequest::Job(job) => {
                            log.push(job.configuration());
                            job
                        }
                        JobRequest::Exhausted => break,
                    }
                };
                thread::sleep(Duration::from_millis((worker * 7 + 3) % 5));
                let configuration = job.configuration() as f64;
                job.complete(Ok(tagged(configuration)));
            });
        }

        let mut drained = Vec::new();
        while let NextResult::Ready { configuration, .. } = controller.get_next_result().unwrap() {
            drained.push(configuration);
        }
        drained
    });

    assert_eq!(drained, *handed_out.lock().unwrap());
    assert_eq!(drained.len(), 11);
    assert_eq!(controller.issued_jobs(), controller.total_jobs());
}

#[test]
fn test_worker_error_surfaces_in_order() {
    let controller = MonteCarloController::new(vec![3]);
    let jobs: Vec<_> = (0..3)
        .map(|_| match controller.get_new_job() {
            JobRequest::Job(job) => job,
            JobRequest::Exhausted => panic!("controller ran out early"),
        })
        .collect();

    let mut jobs = jobs.into_iter();
    jobs.next().unwrap().complete(Ok(tagged(0.0)));
    jobs.next()
        .unwrap()
        .complete(Err(GasFitError::FunctionEvaluation("diverged".to_string())));
    drop(jobs);

    assert!(matches!(
        controller.get_next_result(),
        Ok(NextResult::Ready { configuration: 0, .. })
    ));
    assert!(matches!(
        controller.get_next_result(),
        Err(GasFitError::FunctionEvaluation(_))
    ));
    assert!(matches!(
        controller.get_next_result(),
        Err(GasFitError::JobAbandoned { configuration: 0 })
    ));
    assert!(matches!(controller.get_next_result(), Ok(NextResult::Drained)));
}
