//! Module for constructing and solving optimization problems

pub mod constraint;
pub mod interface;
pub mod objective;
pub mod problem;
pub mod solvers;
pub mod variable;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Struct representing the solution to an optimization problem
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemSolution {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if the optimization was completed successfully, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum,
    ///
    /// Some(IndexMap), keyed by variable id, with values corresponding to variable
    /// values at optimum if the problem could be solved, None otherwise
    pub variable_values: Option<IndexMap<String, f64>>,
    /// Values of the dual variables at the optimum
    ///
    /// Some(IndexMap), keyed by constraint id, with values corresponding to dual
    /// variable values at optimum if the problem could be solved, and the solver
    /// supports retrieving the dual values, None otherwise
    pub dual_values: Option<IndexMap<String, f64>>,
    /// Reduced costs of the variables at the optimum, keyed by variable id
    ///
    /// Available under the same conditions as `dual_values`
    pub reduced_costs: Option<IndexMap<String, f64>>,
}

impl ProblemSolution {
    /// A solution carrying only a status, used when no values are available
    pub fn from_status(status: OptimizationStatus) -> Self {
        ProblemSolution {
            status,
            objective_value: None,
            variable_values: None,
            dual_values: None,
            reduced_costs: None,
        }
    }
}

/// Status of an optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizationStatus {
    /// Problem has not yet attempted to be optimized
    Unoptimized,
    /// Problem has been optimized
    Optimal,
    /// An approximate solution has been found
    AlmostOptimal,
    /// Problem can't be solved because it is infeasible (conflicting constraints)
    Infeasible,
    /// Problem can't be optimized because objective value is not bounded
    Unbounded,
    /// The solver hit the configured wall clock limit
    TimeLimit,
    /// The solver hit the configured iteration limit
    IterationLimit,
    /// A numerical error occurred during solving
    NumericalError,
    /// The solver stopped making progress
    SolverHalted,
}

impl OptimizationStatus {
    /// Whether the status carries usable primal values
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal
        )
    }
}

impl std::fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptimizationStatus::Unoptimized => "unoptimized",
            OptimizationStatus::Optimal => "optimal",
            OptimizationStatus::AlmostOptimal => "almost optimal",
            OptimizationStatus::Infeasible => "infeasible",
            OptimizationStatus::Unbounded => "unbounded",
            OptimizationStatus::TimeLimit => "time limit",
            OptimizationStatus::IterationLimit => "iteration limit",
            OptimizationStatus::NumericalError => "numerical error",
            OptimizationStatus::SolverHalted => "solver halted",
        };
        f.write_str(name)
    }
}
