//! Residual function and least-squares fitter tests

mod lm_fitter_tests;
mod residual_function_tests;
