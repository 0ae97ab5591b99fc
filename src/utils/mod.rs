//! Utility functions and helpers for the gasfit-rs library.

pub mod finite_difference;
pub mod matrix_convert;
