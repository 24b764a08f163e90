//! Flux variability analysis
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::configuration::Configuration;
use crate::flux_analysis::{
    add_objective_floor, check_fraction, reference_optimum, worker_count, AnalysisError,
};
use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::OptimizationStatus;
use crate::utils::parallel::run_tasks;

/// Minimum and maximum flux a reaction can carry
///
/// An end whose solve found no value (a limit was hit, or the solver failed) is NaN, and
/// `status` tells why. An unbounded end is infinite.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluxRange {
    pub minimum: f64,
    pub maximum: f64,
    /// `Optimal` when both ends were solved, otherwise the first other status met
    pub status: OptimizationStatus,
}

impl FluxRange {
    /// Whether the reaction is forced to carry no flux
    pub fn is_blocked(&self, tolerance: f64) -> bool {
        self.minimum.abs() <= tolerance && self.maximum.abs() <= tolerance
    }

    /// Whether both ends hold a value, possibly infinite
    pub fn is_resolved(&self) -> bool {
        !self.minimum.is_nan() && !self.maximum.is_nan()
    }
}

/// Find the range of flux each reaction can carry while the objective stays within
/// `fraction_of_optimum` of its optimum
///
/// `reactions` defaults to every reaction in the model, `processes` to the configured
/// worker count. The model is solved once, then the compiled problem is copied once per
/// worker and each reaction is minimized and maximized by swapping the objective. A flux
/// that is unbounded in one direction is reported as an infinite range end. A solve that
/// stops without a value (iteration or time limit, numerical trouble) doesn't abort the
/// analysis, it leaves a NaN end and its status in that reaction's [`FluxRange`].
///
/// The objective is held at `Z* - (1 - f)|Z*|` or above when maximizing, and at
/// `Z* + (1 - f)|Z*|` or below when minimizing, where `Z*` is the optimum and `f` the
/// fraction. For the usual signs this is `f·Z*` for a maximum, but a minimum is loosened
/// upwards from `Z*` rather than scaled, so the constraint never excludes the optimum.
#[instrument(skip(model, reactions))]
pub fn flux_variability_analysis(
    model: &mut Model,
    reactions: Option<&[&str]>,
    fraction_of_optimum: f64,
    processes: Option<usize>,
) -> Result<IndexMap<String, FluxRange>, AnalysisError> {
    check_fraction(fraction_of_optimum)?;
    let targets: Vec<String> = match reactions {
        Some(ids) => {
            for id in ids {
                if model.reaction(id).is_none() {
                    return Err(ModelError::ReactionNotFound(id.to_string()).into());
                }
            }
            ids.iter().map(|id| id.to_string()).collect()
        }
        None => model.reactions().keys().cloned().collect(),
    };

    let objective_is_empty = model.objective().is_empty();
    let mut problem = model.problem()?;
    if !objective_is_empty {
        let optimum = reference_optimum(model)?;
        add_objective_floor(&mut problem, model, optimum, fraction_of_optimum)?;
    }

    debug!(reactions = targets.len(), "running flux variability");
    let ranges = run_tasks(
        &mut problem,
        &targets,
        worker_count(processes),
        |problem, id| flux_range(problem, id),
    )?;
    targets
        .into_iter()
        .zip(ranges)
        .map(|(id, range)| range.map(|range| (id, range)))
        .collect()
}

fn flux_range(problem: &mut Problem, reaction_id: &str) -> Result<FluxRange, AnalysisError> {
    problem.set_linear_objective(&[(reaction_id, 1.)])?;
    let (minimum, min_status) = extreme_flux(problem, ObjectiveSense::Minimize)?;
    let (maximum, max_status) = extreme_flux(problem, ObjectiveSense::Maximize)?;
    let status = [min_status, max_status]
        .into_iter()
        .find(|status| *status != OptimizationStatus::Optimal)
        .unwrap_or(OptimizationStatus::Optimal);
    if minimum.is_nan() || maximum.is_nan() {
        warn!(reaction = reaction_id, %status, "flux range left incomplete");
    }
    // interior point noise can cross the ends of a collapsed range
    let (minimum, maximum) = if minimum > maximum {
        (maximum, minimum)
    } else {
        (minimum, maximum)
    };
    Ok(FluxRange {
        minimum,
        maximum,
        status,
    })
}

/// Extreme flux in one direction with the status of its solve, NaN when the solve gave no value
fn extreme_flux(
    problem: &mut Problem,
    sense: ObjectiveSense,
) -> Result<(f64, OptimizationStatus), AnalysisError> {
    problem.update_objective_sense(sense);
    let solution = problem.solve()?;
    let value = match (solution.status, solution.objective_value) {
        (OptimizationStatus::Unbounded, _) => match sense {
            ObjectiveSense::Minimize => f64::NEG_INFINITY,
            ObjectiveSense::Maximize => f64::INFINITY,
        },
        (status, Some(value)) if status.has_solution() => value,
        _ => f64::NAN,
    };
    Ok((value, solution.status))
}

/// Reactions that can't carry flux under any steady state
///
/// With `open_exchanges`, boundary reactions get the configured default bounds first, so
/// only reactions blocked by the network structure itself are reported. The model is left
/// unchanged.
#[instrument(skip(model))]
pub fn find_blocked_reactions(
    model: &mut Model,
    open_exchanges: bool,
    processes: Option<usize>,
) -> Result<Vec<String>, AnalysisError> {
    let tolerance = Configuration::current().tolerance;
    model.with_scope(|model| -> Result<Vec<String>, AnalysisError> {
        model.set_objective(&[])?;
        if open_exchanges {
            let (lower_bound, upper_bound) = Configuration::current().bounds();
            let boundary: Vec<String> = model
                .boundary_reactions()
                .into_iter()
                .map(|id| id.to_string())
                .collect();
            for id in boundary {
                model.set_reaction_bounds(&id, lower_bound, upper_bound)?;
            }
        }
        let ranges = flux_variability_analysis(model, None, 0., processes)?;
        // interior point solutions sit slightly off zero
        let threshold = 100. * tolerance;
        Ok(ranges
            .into_iter()
            .filter(|(_, range)| range.is_blocked(threshold))
            .map(|(id, _)| id)
            .collect())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::metabolic_model::model::OnInvalid;
    use crate::metabolic_model::reaction::ReactionBuilder;
    use crate::optimize::solvers::clarabel::ClarabelSolver;
    use crate::test_models::{branched_model, linear_pathway};

    #[test]
    fn ranges_at_optimum() {
        let mut model = branched_model();
        let ranges = flux_variability_analysis(&mut model, None, 1., Some(1)).unwrap();
        assert_eq!(ranges.len(), 5);
        assert_abs_diff_eq!(ranges["R3"].minimum, 0., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["R3"].maximum, 4., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["R1"].minimum, 6., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["R1"].maximum, 10., epsilon = 1e-4);
        // the objective reaction collapses onto its optimal flux
        assert_abs_diff_eq!(ranges["DM_C"].minimum, 10., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["DM_C"].maximum, 10., epsilon = 1e-4);
        for range in ranges.values() {
            assert!(range.is_resolved());
            assert!(range.minimum <= range.maximum);
        }
    }

    #[test]
    fn iteration_limit_is_recorded_per_reaction() {
        let mut model = branched_model();
        model.set_solver(Arc::new(ClarabelSolver {
            max_iterations: Some(6),
            ..Default::default()
        }));
        // enough iterations for the plain model, too few for some of the range solves
        assert_eq!(model.optimize().unwrap().status, OptimizationStatus::Optimal);
        let ranges = flux_variability_analysis(&mut model, None, 1., Some(1)).unwrap();
        assert_eq!(ranges.len(), 5);
        let limited: Vec<&FluxRange> = ranges
            .values()
            .filter(|range| range.status == OptimizationStatus::IterationLimit)
            .collect();
        assert!(!limited.is_empty());
        assert!(limited.iter().all(|range| !range.is_resolved()));
        assert!(limited.iter().all(|range| !range.is_blocked(1e-6)));
        for range in ranges.values().filter(|range| range.is_resolved()) {
            assert!(range.minimum <= range.maximum);
        }
    }

    #[test]
    fn minimized_objective_is_loosened_upwards() {
        let mut model = branched_model();
        model.set_objective(&[("DM_C", -1.)]).unwrap();
        model.set_objective_sense(ObjectiveSense::Minimize);
        // optimum is -10, so the objective may rise to -10 + 0.5 * 10
        let ranges =
            flux_variability_analysis(&mut model, Some(&["DM_C"][..]), 0.5, Some(1)).unwrap();
        assert_abs_diff_eq!(ranges["DM_C"].minimum, 5., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["DM_C"].maximum, 10., epsilon = 1e-4);
    }

    #[test]
    fn fraction_widens_ranges() {
        let mut model = branched_model();
        let ranges =
            flux_variability_analysis(&mut model, Some(&["DM_C", "R1"][..]), 0.5, Some(1)).unwrap();
        assert_eq!(ranges.keys().collect::<Vec<_>>(), vec!["DM_C", "R1"]);
        assert_abs_diff_eq!(ranges["DM_C"].minimum, 5., epsilon = 1e-4);
        assert_abs_diff_eq!(ranges["R1"].minimum, 1., epsilon = 1e-4);
    }

    #[test]
    fn parallel_matches_serial() {
        let mut model = branched_model();
        let serial = flux_variability_analysis(&mut model, None, 0.9, Some(1)).unwrap();
        let parallel = flux_variability_analysis(&mut model, None, 0.9, Some(3)).unwrap();
        assert_eq!(
            serial.keys().collect::<Vec<_>>(),
            parallel.keys().collect::<Vec<_>>()
        );
        for (id, range) in &serial {
            assert_abs_diff_eq!(range.minimum, parallel[id].minimum, epsilon = 1e-6);
            assert_abs_diff_eq!(range.maximum, parallel[id].maximum, epsilon = 1e-6);
        }
    }

    #[test]
    fn unknown_reaction() {
        let mut model = linear_pathway();
        assert!(matches!(
            flux_variability_analysis(&mut model, Some(&["nope"][..]), 1., None),
            Err(AnalysisError::Model(ModelError::ReactionNotFound(_)))
        ));
    }

    #[test]
    fn infeasible_model_is_an_error() {
        let mut model = linear_pathway();
        model.set_reaction_bounds("DM_C", 1., 1000.).unwrap();
        model.set_reaction_bounds("EX_A", 0., 0.).unwrap();
        assert!(matches!(
            flux_variability_analysis(&mut model, None, 1., None),
            Err(AnalysisError::NoSolution(OptimizationStatus::Infeasible))
        ));
    }

    #[test]
    fn dead_end_is_blocked() {
        let mut model = linear_pathway();
        let dead_end = ReactionBuilder::default()
            .id("B_D")
            .metabolite("B", -1.)
            .metabolite("D", 1.)
            .bounds(0., 1000.)
            .build()
            .unwrap();
        model.add_reactions(vec![dead_end], OnInvalid::Raise).unwrap();
        let blocked = find_blocked_reactions(&mut model, false, Some(1)).unwrap();
        assert_eq!(blocked, vec!["B_D".to_string()]);
        assert_eq!(model.objective().keys().collect::<Vec<_>>(), vec!["B_C"]);
    }
}
