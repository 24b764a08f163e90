//! Minimization of metabolic adjustment
//!
//! After a perturbation, find the feasible flux distribution closest to a reference
//! distribution (usually the unperturbed optimum), either in Euclidean distance (quadratic
//! MOMA) or in total absolute deviation (linear MOMA).
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::flux_analysis::AnalysisError;
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::variable::VariableType;
use crate::solution::Solution;
use crate::utils::hashing::auxiliary_id;

/// Find the fluxes of the model closest to `reference`
///
/// Reactions missing from `reference` are free. When a solution exists, its objective value
/// is the model's own objective evaluated at the adjusted fluxes, not the distance.
#[instrument(skip(model, reference))]
pub fn moma(
    model: &mut Model,
    reference: &IndexMap<String, f64>,
    linear: bool,
) -> Result<Solution, AnalysisError> {
    let mut problem = model.problem()?;
    problem.remove_all_objective_terms();
    problem.update_objective_sense(ObjectiveSense::Minimize);

    let anchored = model
        .reactions()
        .keys()
        .filter_map(|id| reference.get(id).map(|flux| (id.as_str(), *flux)));
    for (id, flux) in anchored {
        if linear {
            // d >= |v - flux|
            let deviation = auxiliary_id("moma_deviation", &id);
            problem.add_new_variable(&deviation, None, VariableType::Continuous, 0., f64::INFINITY)?;
            problem.add_new_inequality_constraint(
                &auxiliary_id("moma_deviation_upper", &id),
                &[deviation.as_str(), id],
                &[1., -1.],
                -flux,
                f64::INFINITY,
            )?;
            problem.add_new_inequality_constraint(
                &auxiliary_id("moma_deviation_lower", &id),
                &[deviation.as_str(), id],
                &[1., 1.],
                flux,
                f64::INFINITY,
            )?;
            problem.add_new_linear_objective_term(&deviation, 1.)?;
        } else {
            // (v - flux)^2 without the constant
            problem.add_new_quadratic_objective_term(id, id, 1.)?;
            problem.add_new_linear_objective_term(id, -2. * flux)?;
        }
    }

    debug!(variables = problem.num_variables(), "solving adjustment problem");
    let solution = problem.solve()?;
    let mut solution = Solution::from_problem_solution(
        solution,
        model.reactions().keys(),
        model.metabolites().keys(),
    );
    if solution.status.has_solution() {
        solution.objective_value = Some(
            model
                .objective()
                .iter()
                .map(|(id, coefficient)| coefficient * solution.fluxes.get(id).copied().unwrap_or(0.))
                .sum(),
        );
    }
    Ok(solution)
}
