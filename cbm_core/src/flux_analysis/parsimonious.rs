//! Parsimonious flux balance analysis
//!
//! Among all flux distributions reaching (a fraction of) the optimal objective, find the one
//! with the smallest total absolute flux.
use tracing::{debug, instrument};

use crate::flux_analysis::{add_objective_floor, check_fraction, reference_optimum, AnalysisError};
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::variable::VariableType;
use crate::solution::Solution;
use crate::utils::hashing::auxiliary_id;

/// Solve the model, then minimize the sum of absolute fluxes while keeping the objective
/// within `fraction_of_optimum` of its optimum
///
/// The returned solution's objective value is the minimized total flux. The model itself
/// is left unchanged.
#[instrument(skip(model))]
pub fn pfba(model: &mut Model, fraction_of_optimum: f64) -> Result<Solution, AnalysisError> {
    check_fraction(fraction_of_optimum)?;
    let optimum = reference_optimum(model)?;
    let mut problem = model.problem()?;
    add_objective_floor(&mut problem, model, optimum, fraction_of_optimum)?;

    // |v| <= a for every reaction, then minimize the sum of a
    let mut total_flux = Vec::with_capacity(model.reactions().len());
    for id in model.reactions().keys() {
        let magnitude = auxiliary_id("abs_flux", id);
        problem.add_new_variable(&magnitude, None, VariableType::Continuous, 0., f64::INFINITY)?;
        problem.add_new_inequality_constraint(
            &auxiliary_id("abs_flux_upper", id),
            &[magnitude.as_str(), id.as_str()],
            &[1., -1.],
            0.,
            f64::INFINITY,
        )?;
        problem.add_new_inequality_constraint(
            &auxiliary_id("abs_flux_lower", id),
            &[magnitude.as_str(), id.as_str()],
            &[1., 1.],
            0.,
            f64::INFINITY,
        )?;
        total_flux.push(magnitude);
    }
    let terms: Vec<(&str, f64)> = total_flux.iter().map(|id| (id.as_str(), 1.)).collect();
    problem.set_linear_objective(&terms)?;
    problem.update_objective_sense(ObjectiveSense::Minimize);

    debug!(optimum, "minimizing total flux");
    let solution = problem.solve()?;
    if !solution.status.has_solution() {
        return Err(AnalysisError::NoSolution(solution.status));
    }
    Ok(Solution::from_problem_solution(
        solution,
        model.reactions().keys(),
        model.metabolites().keys(),
    ))
}
