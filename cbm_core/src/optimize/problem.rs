//! Provides struct representing an optimization problem
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{Objective, ObjectiveSense, ObjectiveTerm};
use crate::optimize::solvers::{default_solver, Solver, SolverError};
use crate::optimize::variable::{Variable, VariableBuilder, VariableType};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// An optimization problem
///
/// Variables, constraints, and objective terms refer to each other by id. The problem is
/// solver agnostic, the [`Solver`] it holds is only consulted by [`Problem::solve`].
#[derive(Debug, Clone)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem, in column order
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem, in row order
    constraints: IndexMap<String, Constraint>,
    /// Status of the most recent solve
    status: OptimizationStatus,
    /// Type of problem
    problem_type: ProblemType,
    /// Backend used to solve the problem
    solver: Arc<dyn Solver>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem using the configured default solver
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
            status: OptimizationStatus::Unoptimized,
            problem_type: ProblemType::LinearContinuous,
            solver: default_solver(),
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new minimization problem
    pub fn new_minimization() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    /// Replace the backend used to solve this problem
    pub fn set_solver(&mut self, solver: Arc<dyn Solver>) {
        self.solver = solver;
    }

    /// Backend used to solve this problem
    pub fn solver(&self) -> &Arc<dyn Solver> {
        &self.solver
    }
    // endregion Creation Functions

    // region Accessors
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn objective_sense(&self) -> ObjectiveSense {
        self.objective.sense()
    }

    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Status of the most recent call to [`Problem::solve`]
    pub fn status(&self) -> OptimizationStatus {
        self.status
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }
    // endregion Accessors

    // region Update Objective Sense
    /// Update the objective sense of the problem
    pub fn update_objective_sense(&mut self, sense: ObjectiveSense) {
        self.objective.set_sense(sense);
    }
    // endregion Update Objective Sense

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), ProblemError> {
        self.validate_variable(&variable)?;
        variable.index = self.variables.len();
        self.variables.insert(variable.id.clone(), variable);
        self.fix_problem_type();
        Ok(())
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        name: Option<&str>,
        variable_type: VariableType,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let mut builder = VariableBuilder::default();
        builder
            .id(id)
            .variable_type(variable_type)
            .lower_bound(lower_bound)
            .upper_bound(upper_bound);
        if let Some(name) = name {
            builder.name(name);
        }
        let variable = builder.build().map_err(|_| ProblemError::InvalidVariableBounds {
            id: id.to_string(),
            lower_bound,
            upper_bound,
        })?;
        self.add_variable(variable)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(&constraint)?;
        self.constraints
            .insert(constraint.id().to_string(), constraint);
        Ok(())
    }

    /// Create a new equality constraint using variable ids, and add it to the problem
    pub fn add_new_equality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        Self::check_term_lengths(id, variables, coefficients)?;
        self.add_constraint(Constraint::new_equality(id, variables, coefficients, equals))
    }

    /// Create a new inequality constraint using variable ids, and add it to the problem
    pub fn add_new_inequality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        Self::check_term_lengths(id, variables, coefficients)?;
        self.add_constraint(Constraint::new_inequality(
            id,
            variables,
            coefficients,
            lower_bound,
            upper_bound,
        ))
    }
    // endregion Adding Constraints

    // region Adding Objective Terms
    /// Add a new term to the objective
    pub fn add_objective_term(&mut self, objective_term: ObjectiveTerm) -> Result<(), ProblemError> {
        self.validate_objective_term(&objective_term)?;
        self.objective.add_term(objective_term);
        self.fix_problem_type();
        Ok(())
    }

    /// Add a new linear term to the objective
    pub fn add_new_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        self.add_objective_term(ObjectiveTerm::new_linear(variable_id, coefficient))
    }

    /// Add a new quadratic term, `coefficient * variable1 * variable2`, to the objective
    pub fn add_new_quadratic_objective_term(
        &mut self,
        variable1: &str,
        variable2: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        self.add_objective_term(ObjectiveTerm::new_quadratic(variable1, variable2, coefficient))
    }

    /// Replace the objective with a linear one, keeping the sense
    ///
    /// The objective is left untouched if any variable is missing.
    pub fn set_linear_objective(&mut self, terms: &[(&str, f64)]) -> Result<(), ProblemError> {
        for (variable_id, _) in terms {
            if !self.variables.contains_key(*variable_id) {
                return Err(ProblemError::NonExistentVariablesInObjective(
                    variable_id.to_string(),
                ));
            }
        }
        self.objective.remove_all_terms();
        for (variable_id, coefficient) in terms {
            self.objective.add_linear_term(variable_id, *coefficient);
        }
        self.fix_problem_type();
        Ok(())
    }
    // endregion Adding Objective Terms

    // region update bounds
    /// Update the bounds of a variable
    pub fn update_variable_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds {
                id: id.to_string(),
                lower_bound,
                upper_bound,
            });
        }
        match self.variables.get_mut(id) {
            Some(var) => {
                var.lower_bound = lower_bound;
                var.upper_bound = upper_bound;
            }
            None => return Err(ProblemError::NonExistentVariable(id.to_string())),
        };
        Ok(())
    }

    /// Update the range of a constraint, an equality constraint given a non-degenerate
    /// range becomes an inequality constraint
    pub fn update_constraint_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidConstraintBounds(id.to_string()));
        }
        let constraint = self
            .constraints
            .get_mut(id)
            .ok_or_else(|| ProblemError::NonExistentConstraint(id.to_string()))?;
        let terms = constraint.terms().to_vec();
        *constraint = if lower_bound == upper_bound {
            Constraint::Equality {
                id: id.to_string(),
                terms,
                equals: lower_bound,
            }
        } else {
            Constraint::Inequality {
                id: id.to_string(),
                terms,
                lower_bound,
                upper_bound,
            }
        };
        Ok(())
    }
    // endregion update bounds

    // region Remove Variables
    /// Remove a variable from the problem, will also remove it as a term from all constraints
    /// and any terms in the objective that include this variable
    pub fn delete_variable(&mut self, variable_id: &str) -> Result<(), ProblemError> {
        if !self.variables.contains_key(variable_id) {
            return Err(ProblemError::NonExistentVariable(variable_id.to_string()));
        }
        self.objective.remove_terms_with_variable(variable_id);
        self.constraints
            .values_mut()
            .for_each(|cons| cons.remove_variable(variable_id));
        self.variables.shift_remove(variable_id);
        self.fix_variable_indices();
        self.fix_problem_type();
        Ok(())
    }
    // endregion Remove Variables

    // region Remove Constraints
    /// Remove a constraint (by id) from the problem
    pub fn remove_constraint(&mut self, constraint_id: &str) -> Result<Constraint, ProblemError> {
        self.constraints
            .shift_remove(constraint_id)
            .ok_or_else(|| ProblemError::NonExistentConstraint(constraint_id.to_string()))
    }
    // endregion Remove Constraints

    // region Remove Objective Terms
    /// Remove all terms from the objective
    pub fn remove_all_objective_terms(&mut self) {
        self.objective.remove_all_terms();
        self.fix_problem_type();
    }
    // endregion Remove Objective Terms

    // region Solve
    /// Solve the problem with its backend
    ///
    /// Infeasible, unbounded, or halted solves are reported through the returned
    /// [`ProblemSolution::status`]. Errors are reserved for problems the backend can't accept.
    pub fn solve(&mut self) -> Result<ProblemSolution, ProblemError> {
        self.check_solver_capabilities()?;
        let solver = self.solver.clone();
        let solution = solver.solve(self)?;
        self.status = solution.status;
        Ok(solution)
    }

    /// Value of the objective for the given variable values, missing variables count as zero
    pub fn evaluate_objective(&self, values: &IndexMap<String, f64>) -> f64 {
        let value_of = |id: &str| values.get(id).copied().unwrap_or(0.);
        self.objective
            .terms()
            .iter()
            .map(|term| match term {
                ObjectiveTerm::Linear { var, coef } => coef * value_of(var),
                ObjectiveTerm::Quadratic { var1, var2, coef } => {
                    coef * value_of(var1) * value_of(var2)
                }
            })
            .sum()
    }

    fn check_solver_capabilities(&self) -> Result<(), ProblemError> {
        let supported = match self.problem_type {
            ProblemType::LinearContinuous => true,
            ProblemType::QuadraticContinuous => self.solver.quadratic_objective_capable(),
            ProblemType::LinearMixedInteger => self.solver.integer_variable_capable(),
            ProblemType::QuadraticMixedInteger => {
                self.solver.quadratic_objective_capable() && self.solver.integer_variable_capable()
            }
        };
        if supported {
            Ok(())
        } else {
            Err(ProblemError::UnsupportedProblemType {
                solver: self.solver.name().to_string(),
                problem_type: self.problem_type,
            })
        }
    }
    // endregion Solve

    // region Validation Functions
    /// Check that a variable to be added is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists(variable.id.clone()));
        };
        let (lb, ub) = (variable.lower_bound, variable.upper_bound);
        if lb.is_nan() || ub.is_nan() || lb > ub {
            return Err(ProblemError::InvalidVariableBounds {
                id: variable.id.clone(),
                lower_bound: lb,
                upper_bound: ub,
            });
        }
        Ok(())
    }

    /// Check that a constraint to be added is valid to add to this Problem
    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), ProblemError> {
        let id = constraint.id();
        if self.constraints.contains_key(id) {
            return Err(ProblemError::ConstraintAlreadyExists(id.to_string()));
        }
        let (lower_bound, upper_bound) = constraint.bounds();
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidConstraintBounds(id.to_string()));
        }
        for term in constraint.terms() {
            if !self.variables.contains_key(&term.variable) {
                return Err(ProblemError::NonExistentVariablesInConstraint(
                    term.variable.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Check that an objective term to be added is valid to add to this Problem
    fn validate_objective_term(&self, objective_term: &ObjectiveTerm) -> Result<(), ProblemError> {
        let missing = match objective_term {
            ObjectiveTerm::Quadratic { var1, var2, .. } => [var1, var2]
                .into_iter()
                .find(|var| !self.variables.contains_key(*var)),
            ObjectiveTerm::Linear { var, .. } => {
                Some(var).filter(|var| !self.variables.contains_key(*var))
            }
        };
        match missing {
            Some(var) => Err(ProblemError::NonExistentVariablesInObjective(var.clone())),
            None => Ok(()),
        }
    }

    fn check_term_lengths(
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
    ) -> Result<(), ProblemError> {
        if variables.len() != coefficients.len() {
            return Err(ProblemError::MismatchedTerms(id.to_string()));
        }
        Ok(())
    }
    // endregion Validation Functions

    // region Fix Problem Functions
    fn fix_variable_indices(&mut self) {
        self.variables
            .values_mut()
            .enumerate()
            .for_each(|(ind, var)| var.index = ind);
    }

    fn fix_problem_type(&mut self) {
        let integer_variables = self.has_integer_variables();
        let quadratic_objective = self.has_quadratic_objective_terms();
        self.problem_type = match (integer_variables, quadratic_objective) {
            (true, true) => ProblemType::QuadraticMixedInteger,
            (false, true) => ProblemType::QuadraticContinuous,
            (true, false) => ProblemType::LinearMixedInteger,
            (false, false) => ProblemType::LinearContinuous,
        };
    }
    // endregion Fix Problem Functions

    // region Check Problem
    pub fn has_integer_variables(&self) -> bool {
        self.variables
            .values()
            .any(|var| var.variable_type != VariableType::Continuous)
    }

    pub fn has_quadratic_objective_terms(&self) -> bool {
        self.objective.contains_quadratic()
    }
    // endregion Check Problem
}

/// Types of optimization problems
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    /// Problem with linear objectives and constraints, and continuous variables
    LinearContinuous,
    /// Problem with quadratic objective, linear constraints, and continuous variables
    QuadraticContinuous,
    /// Problem with linear objective and constraints, with integer and continuous variables
    LinearMixedInteger,
    /// Problem with a quadratic objective function, and some integer variables
    ///
    /// # Note:
    /// This problem type is not currently supported by any of the solvers
    QuadraticMixedInteger,
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add a variable with the same id as an existing variable: {0}")]
    VariableIdAlreadyExists(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Invalid bounds for variable {id}: {lower_bound} > {upper_bound}")]
    InvalidVariableBounds {
        id: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add a constraint with the same id as an existing constraint: {0}")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Tried to give constraint {0} a lower bound greater than its upper bound")]
    InvalidConstraintBounds(String),
    /// Error when the number of variables and coefficients of a constraint differ
    #[error("Constraint {0} has a different number of variables and coefficients")]
    MismatchedTerms(String),
    /// Error when trying to add a constraint that contains variables not in the problem
    #[error("Tried to add a constraint with variable {0}, which is not in the problem")]
    NonExistentVariablesInConstraint(String),
    /// Error when trying to add an objective term which includes variables not in the problem
    #[error("Tried adding an objective term with variable {0}, which is not in the problem")]
    NonExistentVariablesInObjective(String),
    /// Error when trying to perform an update or drop on a variable that doesn't exist
    #[error("Tried to access variable {0}, which doesn't exist")]
    NonExistentVariable(String),
    /// Error when trying to perform an update or drop on a constraint that doesn't exist
    #[error("Tried to access constraint {0}, which doesn't exist")]
    NonExistentConstraint(String),
    /// The backend can't handle this kind of problem
    #[error("Solver {solver} can't solve {problem_type:?} problems")]
    UnsupportedProblemType {
        solver: String,
        problem_type: ProblemType,
    },
    /// The backend failed to set up or run the solve
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::optimize::solvers::clarabel::ClarabelSolver;

    fn clarabel_problem(sense: ObjectiveSense) -> Problem {
        let mut problem = Problem::new(sense);
        problem.set_solver(Arc::new(ClarabelSolver::default()));
        problem
    }

    #[test]
    fn new_problem() {
        let max_problem = Problem::new_maximization();
        assert_eq!(max_problem.objective_sense(), ObjectiveSense::Maximize);

        let min_problem = Problem::new_minimization();
        assert_eq!(min_problem.objective_sense(), ObjectiveSense::Minimize);
        assert_eq!(min_problem.status(), OptimizationStatus::Unoptimized);
    }

    #[test]
    fn update_objective_sense() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem.update_objective_sense(ObjectiveSense::Minimize);
        assert_eq!(problem.objective_sense(), ObjectiveSense::Minimize);
        problem.update_objective_sense(ObjectiveSense::Maximize);
        assert_eq!(problem.objective_sense(), ObjectiveSense::Maximize);
    }

    #[test]
    fn add_variables() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);

        problem
            .add_new_variable("x", None, VariableType::Continuous, 64., 100.)
            .unwrap();
        let var = problem.variable("x").expect("Variable not added to problem");
        assert_eq!(var.variable_type, VariableType::Continuous);
        assert_eq!(var.index(), 0);
        assert_eq!((var.lower_bound, var.upper_bound), (64., 100.));
        assert_eq!(problem.problem_type(), ProblemType::LinearContinuous);

        // Adding an integer variable changes the problem type
        problem
            .add_new_variable("y", Some("why"), VariableType::Integer, 64., 100.)
            .unwrap();
        let var = problem.variable("y").unwrap();
        assert_eq!(var.index(), 1);
        assert_eq!(var.name.as_deref(), Some("why"));
        assert_eq!(problem.problem_type(), ProblemType::LinearMixedInteger);

        // Duplicate ids are rejected
        assert!(matches!(
            problem.add_new_variable("x", None, VariableType::Continuous, 0., 1.),
            Err(ProblemError::VariableIdAlreadyExists(_))
        ));
    }

    #[test]
    fn add_bad_variable() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        let res = problem.add_new_variable("x", None, VariableType::Continuous, 100., 64.);
        assert!(matches!(res, Err(ProblemError::InvalidVariableBounds { .. })));
    }

    #[test]
    fn add_constraint() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 64., 100.)
            .unwrap();
        problem
            .add_new_variable("y", None, VariableType::Continuous, 64., 100.)
            .unwrap();

        problem
            .add_new_equality_constraint("eq", &["x", "y"], &[2., 3.], 200.)
            .unwrap();
        match problem.constraint("eq").unwrap() {
            Constraint::Equality { equals, .. } => assert_eq!(*equals, 200.),
            Constraint::Inequality { .. } => panic!("Incorrect constraint type added"),
        }

        problem
            .add_new_inequality_constraint("ineq", &["x", "y"], &[2., 3.], 100., 200.)
            .unwrap();
        assert_eq!(problem.constraint("ineq").unwrap().bounds(), (100., 200.));
        assert_eq!(problem.num_constraints(), 2);

        assert!(matches!(
            problem.add_new_equality_constraint("eq", &["x"], &[1.], 0.),
            Err(ProblemError::ConstraintAlreadyExists(_))
        ));
        assert!(matches!(
            problem.add_new_equality_constraint("missing", &["z"], &[1.], 0.),
            Err(ProblemError::NonExistentVariablesInConstraint(_))
        ));
        assert!(matches!(
            problem.add_new_equality_constraint("short", &["x", "y"], &[1.], 0.),
            Err(ProblemError::MismatchedTerms(_))
        ));
    }

    #[test]
    fn add_bad_constraint() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 64., 100.)
            .unwrap();
        problem
            .add_new_variable("y", None, VariableType::Continuous, 64., 100.)
            .unwrap();
        let res = problem.add_new_inequality_constraint(
            "bad_constraint",
            &["x", "y"],
            &[2., 3.],
            200.,
            100.,
        );
        assert!(matches!(res, Err(ProblemError::InvalidConstraintBounds(_))));
    }

    #[test]
    fn delete_variable() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        for id in ["x", "y", "z"] {
            problem
                .add_new_variable(id, None, VariableType::Continuous, 0., 1.)
                .unwrap();
        }
        problem
            .add_new_equality_constraint("c", &["x", "y"], &[1., 1.], 1.)
            .unwrap();
        problem.add_new_linear_objective_term("x", 1.).unwrap();
        problem.add_new_quadratic_objective_term("x", "z", 1.).unwrap();
        assert_eq!(problem.problem_type(), ProblemType::QuadraticContinuous);

        problem.delete_variable("x").unwrap();
        assert_eq!(problem.variable("z").unwrap().index(), 1);
        assert_eq!(problem.constraint("c").unwrap().terms().len(), 1);
        assert!(problem.objective().is_empty());
        assert_eq!(problem.problem_type(), ProblemType::LinearContinuous);
        assert!(matches!(
            problem.delete_variable("x"),
            Err(ProblemError::NonExistentVariable(_))
        ));
    }

    #[test]
    fn update_constraint_bounds() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 0., 10.)
            .unwrap();
        problem
            .add_new_equality_constraint("c", &["x"], &[1.], 1.)
            .unwrap();
        problem.update_constraint_bounds("c", 0., 2.).unwrap();
        assert!(matches!(
            problem.constraint("c").unwrap(),
            Constraint::Inequality { .. }
        ));
        assert!(problem.update_constraint_bounds("c", 3., 2.).is_err());
        assert!(problem.update_constraint_bounds("d", 0., 2.).is_err());
        let removed = problem.remove_constraint("c").unwrap();
        assert_eq!(removed.bounds(), (0., 2.));
        assert_eq!(problem.num_constraints(), 0);
    }

    #[test]
    fn set_linear_objective_is_atomic() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 0., 10.)
            .unwrap();
        problem.set_linear_objective(&[("x", 2.)]).unwrap();
        assert!(problem.set_linear_objective(&[("x", 1.), ("y", 1.)]).is_err());
        assert_eq!(problem.objective().terms(), &[ObjectiveTerm::new_linear("x", 2.)]);
    }

    #[test]
    fn evaluate_objective() {
        let mut problem = Problem::new(ObjectiveSense::Minimize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 0., 10.)
            .unwrap();
        problem
            .add_new_variable("y", None, VariableType::Continuous, 0., 10.)
            .unwrap();
        problem.add_new_linear_objective_term("x", 2.).unwrap();
        problem.add_new_quadratic_objective_term("x", "y", 0.5).unwrap();
        let values: IndexMap<String, f64> =
            [("x".to_string(), 3.), ("y".to_string(), 4.)].into_iter().collect();
        assert_abs_diff_eq!(problem.evaluate_objective(&values), 12.);
    }

    #[test]
    fn solve_small_lp() {
        // max x + y, x + 2y <= 4, 3x + y <= 6, x,y >= 0 -> optimum at (1.6, 1.2)
        let mut problem = clarabel_problem(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_variable("y", None, VariableType::Continuous, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_inequality_constraint("c1", &["x", "y"], &[1., 2.], f64::NEG_INFINITY, 4.)
            .unwrap();
        problem
            .add_new_inequality_constraint("c2", &["x", "y"], &[3., 1.], f64::NEG_INFINITY, 6.)
            .unwrap();
        problem.set_linear_objective(&[("x", 1.), ("y", 1.)]).unwrap();
        let solution = problem.solve().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_eq!(problem.status(), OptimizationStatus::Optimal);
        let values = solution.variable_values.unwrap();
        assert_abs_diff_eq!(values["x"], 1.6, epsilon = 1e-5);
        assert_abs_diff_eq!(values["y"], 1.2, epsilon = 1e-5);
        assert_abs_diff_eq!(solution.objective_value.unwrap(), 2.8, epsilon = 1e-5);
    }

    #[test]
    fn solve_reports_infeasible() {
        let mut problem = clarabel_problem(ObjectiveSense::Maximize);
        problem
            .add_new_variable("x", None, VariableType::Continuous, 0., 1.)
            .unwrap();
        problem
            .add_new_inequality_constraint("c", &["x"], &[1.], 2., 3.)
            .unwrap();
        problem.add_new_linear_objective_term("x", 1.).unwrap();
        let solution = problem.solve().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
        assert!(solution.objective_value.is_none());
    }
}
