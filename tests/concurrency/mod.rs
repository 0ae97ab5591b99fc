//! Monte Carlo controller and orchestrator tests

mod controller_tests;
mod orchestrator_tests;
