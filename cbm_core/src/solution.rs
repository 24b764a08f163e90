//! Result of optimizing a model
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Fluxes and dual values from optimizing a [`Model`](crate::metabolic_model::model::Model)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: OptimizationStatus,
    /// Objective value, present only when the status carries a solution
    pub objective_value: Option<f64>,
    /// Flux of every reaction, keyed by reaction id, empty when there is no solution
    pub fluxes: IndexMap<String, f64>,
    /// Reduced cost of every reaction, when the backend reports duals
    pub reduced_costs: Option<IndexMap<String, f64>>,
    /// Shadow price of every metabolite's mass balance, when the backend reports duals
    pub shadow_prices: Option<IndexMap<String, f64>>,
}

impl Solution {
    pub(crate) fn from_problem_solution<'a>(
        solution: ProblemSolution,
        reactions: impl Iterator<Item = &'a String>,
        metabolites: impl Iterator<Item = &'a String>,
    ) -> Self {
        if !solution.status.has_solution() {
            return Solution {
                status: solution.status,
                objective_value: None,
                fluxes: IndexMap::new(),
                reduced_costs: None,
                shadow_prices: None,
            };
        }
        let pick = |values: &IndexMap<String, f64>, ids: &[&String]| -> IndexMap<String, f64> {
            ids.iter()
                .map(|id| ((*id).clone(), values.get(*id).copied().unwrap_or(0.)))
                .collect()
        };
        let reactions: Vec<&String> = reactions.collect();
        let metabolites: Vec<&String> = metabolites.collect();
        Solution {
            status: solution.status,
            objective_value: solution.objective_value,
            fluxes: solution
                .variable_values
                .as_ref()
                .map(|values| pick(values, &reactions))
                .unwrap_or_default(),
            reduced_costs: solution
                .reduced_costs
                .as_ref()
                .map(|values| pick(values, &reactions)),
            shadow_prices: solution
                .dual_values
                .as_ref()
                .map(|values| pick(values, &metabolites)),
        }
    }

    /// Flux of a single reaction
    pub fn flux(&self, reaction_id: &str) -> Option<f64> {
        self.fluxes.get(reaction_id).copied()
    }

    pub fn is_optimal(&self) -> bool {
        self.status == OptimizationStatus::Optimal
    }
}
