//! Translation of a [`Model`] into an optimization [`Problem`]
//!
//! Each reaction becomes a continuous variable bounded by the reaction's flux bounds, and
//! each metabolite becomes an equality constraint forcing its net production to zero
//! (`S·v = 0`). The objective is the linear combination of reaction fluxes given by the
//! reactions' objective coefficients.
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::problem::Problem;
use crate::optimize::variable::VariableType;
use crate::solution::Solution;

impl Model {
    /// Compile the current state of the model into a fresh [`Problem`]
    pub fn build_problem(&self) -> Result<Problem, ModelError> {
        let mut problem = Problem::new(self.objective_sense);
        problem.set_solver(self.solver.clone());
        for reaction in self.reactions.values() {
            problem.add_new_variable(
                &reaction.id,
                reaction.name.as_deref(),
                VariableType::Continuous,
                reaction.lower_bound,
                reaction.upper_bound,
            )?;
        }

        let mut rows: IndexMap<&str, (Vec<&str>, Vec<f64>)> = self
            .metabolites
            .keys()
            .map(|id| (id.as_str(), (Vec::new(), Vec::new())))
            .collect();
        for reaction in self.reactions.values() {
            for (metabolite, coefficient) in &reaction.metabolites {
                if let Some((variables, coefficients)) = rows.get_mut(metabolite.as_str()) {
                    variables.push(reaction.id.as_str());
                    coefficients.push(*coefficient);
                }
            }
        }
        for (metabolite, (variables, coefficients)) in rows {
            problem.add_new_equality_constraint(metabolite, &variables, &coefficients, 0.)?;
        }

        let objective = self.objective();
        let terms: Vec<(&str, f64)> = objective.iter().map(|(id, c)| (id.as_str(), *c)).collect();
        problem.set_linear_objective(&terms)?;
        Ok(problem)
    }

    /// The cached problem, compiled again if the structure changed since it was built
    pub(crate) fn ensure_problem(&mut self) -> Result<&mut Problem, ModelError> {
        let problem = match self.problem.take() {
            Some((version, problem)) if version == self.structure_version => problem,
            _ => {
                debug!(
                    reactions = self.reactions.len(),
                    metabolites = self.metabolites.len(),
                    "compiling model into optimization problem"
                );
                self.build_problem()?
            }
        };
        let (_, problem) = self.problem.insert((self.structure_version, problem));
        Ok(problem)
    }

    /// A copy of the compiled problem, for analyses that add their own variables or
    /// constraints
    pub fn problem(&mut self) -> Result<Problem, ModelError> {
        Ok(self.ensure_problem()?.clone())
    }

    /// Solve the model with its current bounds and objective
    pub fn optimize(&mut self) -> Result<Solution, ModelError> {
        let problem = self.ensure_problem()?;
        let solution = problem.solve()?;
        if !solution.status.has_solution() {
            warn!(status = %solution.status, "model optimization found no solution");
        }
        Ok(Solution::from_problem_solution(
            solution,
            self.reactions.keys(),
            self.metabolites.keys(),
        ))
    }

    /// Solve the model and report only the objective value, `None` when there is no solution
    pub fn slim_optimize(&mut self) -> Result<Option<f64>, ModelError> {
        let solution = self.ensure_problem()?.solve()?;
        Ok(solution
            .objective_value
            .filter(|_| solution.status.has_solution()))
    }

    /// Push a reaction's bounds into the cached problem
    pub(crate) fn sync_reaction_bounds(&mut self, reaction_id: &str) {
        let Some((version, problem)) = &mut self.problem else {
            return;
        };
        if *version != self.structure_version {
            return;
        }
        let synced = match self.reactions.get(reaction_id) {
            Some(reaction) => problem
                .update_variable_bounds(reaction_id, reaction.lower_bound, reaction.upper_bound)
                .is_ok(),
            None => false,
        };
        if !synced {
            self.problem = None;
        }
    }

    /// Push the objective coefficients and sense into the cached problem
    pub(crate) fn sync_objective(&mut self) {
        let Some((version, problem)) = &mut self.problem else {
            return;
        };
        if *version != self.structure_version {
            return;
        }
        problem.update_objective_sense(self.objective_sense);
        let terms: Vec<(&str, f64)> = self
            .reactions
            .values()
            .filter(|r| r.objective_coefficient != 0.)
            .map(|r| (r.id.as_str(), r.objective_coefficient))
            .collect();
        if problem.set_linear_objective(&terms).is_err() {
            self.problem = None;
        }
    }
}
