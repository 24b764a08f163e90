//! Analyses that repeatedly solve perturbed versions of a model
//!
//! - [`parsimonious`]: minimal total flux at (a fraction of) the optimum
//! - [`variability`]: flux ranges compatible with (a fraction of) the optimum
//! - [`deletion`]: single and double gene or reaction knockout studies
//! - [`moma`]: minimization of metabolic adjustment after a perturbation
//! - [`sampling`]: random flux vectors from the feasible flux space
use thiserror::Error;

use crate::configuration::Configuration;
use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::OptimizationStatus;
use crate::utils::hashing::auxiliary_id;

pub mod deletion;
pub mod moma;
pub mod parsimonious;
pub mod sampling;
pub mod variability;

/// Errors from running an analysis
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    /// A solve the analysis depends on (usually the reference optimum) found no solution
    #[error("Optimization found no solution, status: {0}")]
    NoSolution(OptimizationStatus),
    #[error("Fraction of optimum must be between 0 and 1, got {0}")]
    InvalidFraction(f64),
    #[error("Could not start worker pool: {0}")]
    ThreadPool(String),
    #[error("Sampling failed: {0}")]
    Sampling(String),
}

impl From<rayon::ThreadPoolBuildError> for AnalysisError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        AnalysisError::ThreadPool(err.to_string())
    }
}

pub(crate) fn check_fraction(fraction_of_optimum: f64) -> Result<(), AnalysisError> {
    if !(0. ..=1.).contains(&fraction_of_optimum) {
        return Err(AnalysisError::InvalidFraction(fraction_of_optimum));
    }
    Ok(())
}

/// Optimum of the model's own objective, an error if the model can't be solved
pub(crate) fn reference_optimum(model: &mut Model) -> Result<f64, AnalysisError> {
    let solution = model.optimize()?;
    match solution.objective_value {
        Some(value) if solution.status.has_solution() => Ok(value),
        _ => Err(AnalysisError::NoSolution(solution.status)),
    }
}

pub(crate) fn worker_count(processes: Option<usize>) -> usize {
    processes.unwrap_or_else(|| Configuration::current().processes)
}

/// Constrain the model objective in `problem` to stay within `fraction_of_optimum` of
/// `optimum`
///
/// The floor is `optimum - (1 - f)|optimum|` when maximizing and `optimum + (1 - f)|optimum|`
/// when minimizing, loosened slightly so the optimum itself stays feasible under solver
/// tolerances. Does nothing for a model without objective.
pub(crate) fn add_objective_floor(
    problem: &mut Problem,
    model: &Model,
    optimum: f64,
    fraction_of_optimum: f64,
) -> Result<(), AnalysisError> {
    let objective = model.objective();
    if objective.is_empty() {
        return Ok(());
    }
    let ids: Vec<&str> = objective.keys().map(|id| id.as_str()).collect();
    let coefficients: Vec<f64> = objective.values().copied().collect();
    let slack = (1. - fraction_of_optimum) * optimum.abs();
    let relax = 10. * Configuration::current().tolerance * optimum.abs().max(1.);
    let (lower_bound, upper_bound) = match model.objective_sense() {
        ObjectiveSense::Maximize => (optimum - slack - relax, f64::INFINITY),
        ObjectiveSense::Minimize => (f64::NEG_INFINITY, optimum + slack + relax),
    };
    problem.add_new_inequality_constraint(
        &auxiliary_id("objective_floor", &ids),
        &ids,
        &coefficients,
        lower_bound,
        upper_bound,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::linear_pathway;

    #[test]
    fn fraction_is_checked() {
        assert!(check_fraction(0.).is_ok());
        assert!(check_fraction(1.).is_ok());
        assert!(matches!(
            check_fraction(1.5),
            Err(AnalysisError::InvalidFraction(_))
        ));
        assert!(check_fraction(f64::NAN).is_err());
    }

    #[test]
    fn floor_constraint_bounds() {
        let mut model = linear_pathway();
        let mut problem = model.problem().unwrap();
        add_objective_floor(&mut problem, &model, 10., 0.5).unwrap();
        assert_eq!(problem.num_constraints(), 4);
        let floor = problem.constraints().last().unwrap();
        let (lower, upper) = floor.bounds();
        assert!((lower - 5.).abs() < 1e-4 && lower < 5.);
        assert_eq!(upper, f64::INFINITY);
    }
}
