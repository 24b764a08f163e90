//! Solver interface for the microlp simplex solver
use ::microlp::{
    ComparisonOp, Error as MicrolpError, LinearExpr, OptimizationDirection,
    Problem as MicrolpProblem,
};
use indexmap::IndexMap;

use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{column_indices, merged_row, Solver, SolverError};
use crate::optimize::variable::VariableType;
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Pure rust simplex backend, handles linear objectives with continuous, integer, or binary
/// variables, and reports no dual values
#[derive(Clone, Debug, Default)]
pub struct MicrolpSolver {}

impl Solver for MicrolpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn quadratic_objective_capable(&self) -> bool {
        false
    }

    fn integer_variable_capable(&self) -> bool {
        true
    }

    fn dual_values_capable(&self) -> bool {
        false
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let direction = match problem.objective_sense() {
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
        };
        let columns = column_indices(problem);
        let mut objective = vec![0.; columns.len()];
        for term in problem.objective().terms() {
            match term {
                ObjectiveTerm::Linear { var, coef } => {
                    let column = columns.get(var.as_str()).ok_or_else(|| {
                        SolverError::Setup(format!("Objective references unknown variable {}", var))
                    })?;
                    objective[*column] += coef;
                }
                ObjectiveTerm::Quadratic { .. } => {
                    return Err(SolverError::Setup(
                        "microlp can't solve quadratic objectives".to_string(),
                    ))
                }
            }
        }

        let mut lp = MicrolpProblem::new(direction);
        let variables: Vec<_> = problem
            .variables()
            .zip(&objective)
            .map(|(var, coef)| match var.variable_type {
                VariableType::Continuous => lp.add_var(*coef, (var.lower_bound, var.upper_bound)),
                VariableType::Integer => lp.add_integer_var(
                    *coef,
                    (saturating_bound(var.lower_bound), saturating_bound(var.upper_bound)),
                ),
                VariableType::Binary => lp.add_binary_var(*coef),
            })
            .collect();

        for constraint in problem.constraints() {
            let row = merged_row(constraint.terms(), &columns)?;
            let (lower, upper) = constraint.bounds();
            if row.is_empty() {
                if lower > 0. || upper < 0. {
                    return Ok(ProblemSolution::from_status(OptimizationStatus::Infeasible));
                }
                continue;
            }
            let expression = || {
                let mut expr = LinearExpr::empty();
                row.iter()
                    .for_each(|(column, coef)| expr.add(variables[*column], *coef));
                expr
            };
            if lower == upper {
                lp.add_constraint(expression(), ComparisonOp::Eq, lower);
                continue;
            }
            if upper.is_finite() {
                lp.add_constraint(expression(), ComparisonOp::Le, upper);
            }
            if lower.is_finite() {
                lp.add_constraint(expression(), ComparisonOp::Ge, lower);
            }
        }

        match lp.solve() {
            Ok(solution) => {
                let values: IndexMap<String, f64> = problem
                    .variables()
                    .zip(&variables)
                    .map(|(var, lp_var)| (var.id.clone(), solution[*lp_var]))
                    .collect();
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(problem.evaluate_objective(&values)),
                    variable_values: Some(values),
                    dual_values: None,
                    reduced_costs: None,
                })
            }
            Err(MicrolpError::Infeasible) => {
                Ok(ProblemSolution::from_status(OptimizationStatus::Infeasible))
            }
            Err(MicrolpError::Unbounded) => {
                Ok(ProblemSolution::from_status(OptimizationStatus::Unbounded))
            }
            Err(MicrolpError::InternalError(message)) => Err(SolverError::Internal(message)),
        }
    }
}

fn saturating_bound(bound: f64) -> i32 {
    if bound.is_nan() {
        0
    } else {
        bound.clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}
