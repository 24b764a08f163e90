//! Backends which solve a [`Problem`]
//!
//! A backend only sees a finished problem description, so the same [`Problem`] can be solved
//! by any backend whose capabilities cover the problem type.
use std::fmt::Debug;
use std::sync::Arc;

use cfg_if::cfg_if;
use indexmap::IndexMap;
use thiserror::Error;

use crate::configuration::{Configuration, SolverChoice};
use crate::optimize::constraint::ConstraintTerm;
use crate::optimize::problem::Problem;
use crate::optimize::ProblemSolution;

pub mod clarabel;
#[cfg(feature = "microlp")]
pub mod microlp;

/// An optimization backend
pub trait Solver: Debug + Send + Sync {
    /// Name of the backend, used in log messages and errors
    fn name(&self) -> &'static str;

    /// Whether the backend can solve problems with quadratic objective terms
    fn quadratic_objective_capable(&self) -> bool;

    /// Whether the backend can solve problems with integer or binary variables
    fn integer_variable_capable(&self) -> bool;

    /// Whether the backend reports dual values and reduced costs
    fn dual_values_capable(&self) -> bool;

    /// Solve the problem
    ///
    /// Expected outcomes (infeasible, unbounded, limits reached) are reported in the
    /// solution status, an error means the backend could not run at all.
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError>;
}

/// Errors raised by a backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The backend rejected its settings or the problem data
    #[error("Solver setup failed: {0}")]
    Setup(String),
    /// The backend failed while solving
    #[error("Solver failed: {0}")]
    Internal(String),
}

/// Create the backend selected in the current [`Configuration`]
pub fn default_solver() -> Arc<dyn Solver> {
    let configuration = Configuration::current();
    match configuration.solver {
        SolverChoice::Clarabel => Arc::new(clarabel::ClarabelSolver::from_configuration(
            &configuration,
        )),
        SolverChoice::Microlp => microlp_solver(&configuration),
    }
}

cfg_if! {
    if #[cfg(feature = "microlp")] {
        fn microlp_solver(_configuration: &Configuration) -> Arc<dyn Solver> {
            Arc::new(microlp::MicrolpSolver::default())
        }
    } else {
        fn microlp_solver(configuration: &Configuration) -> Arc<dyn Solver> {
            tracing::warn!("microlp solver requested but the microlp feature is disabled, using clarabel");
            Arc::new(clarabel::ClarabelSolver::from_configuration(configuration))
        }
    }
}

/// Merge repeated variables in a row and drop zero coefficients, resolving variable ids
/// to column indices
pub(crate) fn merged_row(
    terms: &[ConstraintTerm],
    columns: &IndexMap<&str, usize>,
) -> Result<Vec<(usize, f64)>, SolverError> {
    let mut row: IndexMap<usize, f64> = IndexMap::new();
    for term in terms {
        let column = columns.get(term.variable.as_str()).ok_or_else(|| {
            SolverError::Setup(format!("Constraint references unknown variable {}", term.variable))
        })?;
        *row.entry(*column).or_insert(0.) += term.coefficient;
    }
    Ok(row.into_iter().filter(|(_, coef)| *coef != 0.).collect())
}

/// Map of variable id to column index, in problem order
pub(crate) fn column_indices(problem: &Problem) -> IndexMap<&str, usize> {
    problem
        .variables()
        .enumerate()
        .map(|(column, var)| (var.id.as_str(), column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_row_combines_terms() {
        let columns: IndexMap<&str, usize> = [("x", 0), ("y", 1)].into_iter().collect();
        let terms = vec![
            ConstraintTerm {
                variable: "x".to_string(),
                coefficient: 1.,
            },
            ConstraintTerm {
                variable: "y".to_string(),
                coefficient: 2.,
            },
            ConstraintTerm {
                variable: "x".to_string(),
                coefficient: -1.,
            },
        ];
        assert_eq!(merged_row(&terms, &columns).unwrap(), vec![(1, 2.)]);
        let unknown = vec![ConstraintTerm {
            variable: "z".to_string(),
            coefficient: 1.,
        }];
        assert!(merged_row(&unknown, &columns).is_err());
    }
}
