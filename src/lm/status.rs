//! Termination status of a least-squares fit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why the solver stopped.
///
/// The numeric [`code`](TerminationStatus::code) follows the conventional
/// MINPACK-style numbering so that stored results stay comparable with
/// other least-squares tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationStatus {
    /// The solver was not run (no free parameters).
    NotStarted,

    /// The problem was under-determined or otherwise unsuitable.
    ImproperInput,

    /// The relative reduction of the cost fell below `ftol`.
    RelativeReductionTooSmall,

    /// The relative parameter change fell below `xtol`.
    RelativeErrorTooSmall,

    /// Both the `ftol` and `xtol` criteria were met on the same step.
    RelativeErrorAndReductionTooSmall,

    /// The gradient max-norm fell below `gtol`.
    GradientTooSmall,

    /// The iteration budget was exhausted.
    TooManyIterations,

    /// No acceptable step could be found before the damping hit its maximum.
    DampingSaturated,
}

impl TerminationStatus {
    pub fn code(&self) -> i32 {
        match self {
            TerminationStatus::NotStarted => -2,
            TerminationStatus::ImproperInput => 0,
            TerminationStatus::RelativeReductionTooSmall => 1,
            TerminationStatus::RelativeErrorTooSmall => 2,
            TerminationStatus::RelativeErrorAndReductionTooSmall => 3,
            TerminationStatus::GradientTooSmall => 4,
            TerminationStatus::TooManyIterations => 5,
            TerminationStatus::DampingSaturated => 6,
        }
    }

    /// Returns true if the solver stopped on a convergence criterion.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationStatus::RelativeReductionTooSmall
                | TerminationStatus::RelativeErrorTooSmall
                | TerminationStatus::RelativeErrorAndReductionTooSmall
                | TerminationStatus::GradientTooSmall
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            TerminationStatus::NotStarted => "solver not started",
            TerminationStatus::ImproperInput => "improper input",
            TerminationStatus::RelativeReductionTooSmall => "converged: small cost reduction",
            TerminationStatus::RelativeErrorTooSmall => "converged: small parameter change",
            TerminationStatus::RelativeErrorAndReductionTooSmall => {
                "converged: small cost reduction and parameter change"
            }
            TerminationStatus::GradientTooSmall => "converged: small gradient",
            TerminationStatus::TooManyIterations => "terminated: maximum iterations reached",
            TerminationStatus::DampingSaturated => "terminated: damping reached its maximum",
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
