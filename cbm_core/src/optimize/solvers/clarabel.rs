//! Implements a solver interface for Clarabel
//!
//! Clarabel solves `min 1/2 x'Px + q'x` subject to `Ax + s = b` with `s` in a product of
//! cones. Equalities become rows of a zero cone, and every finite side of an inequality or
//! a variable bound becomes a `<=` row of a nonnegative cone.
use ::clarabel::algebra::CscMatrix as ClarabelCsc;
use ::clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use indexmap::IndexMap;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use tracing::debug;

use crate::configuration::Configuration;
use crate::optimize::objective::{ObjectiveSense, ObjectiveTerm};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{column_indices, merged_row, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Interior point backend, handles linear and convex quadratic objectives
#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver {
    /// Wall clock limit in seconds
    pub time_limit: Option<f64>,
    /// Maximum number of interior point iterations
    pub max_iterations: Option<u32>,
}

impl ClarabelSolver {
    /// Create a solver using the limits in `configuration`
    pub fn from_configuration(configuration: &Configuration) -> Self {
        ClarabelSolver {
            time_limit: configuration.time_limit,
            max_iterations: configuration.max_iterations,
        }
    }
}

/// Which dual a row of the cone program contributes to
#[derive(Clone, Copy, Debug)]
enum RowOrigin {
    Constraint(usize),
    Variable(usize),
}

/// A row of `Ax + s = b`
#[derive(Debug)]
struct Row {
    entries: Vec<(usize, f64)>,
    rhs: f64,
    origin: RowOrigin,
    /// -1 for rows that express a lower bound as `-a'x <= -lb`
    sign: f64,
}

/// The problem in Clarabel's standard form
#[derive(Debug)]
struct ConeProgram {
    equalities: Vec<Row>,
    inequalities: Vec<Row>,
    q: Vec<f64>,
    p_entries: Vec<(usize, usize, f64)>,
    /// Problem maximizes, so the program minimizes the negated objective
    maximize: bool,
}

impl ConeProgram {
    /// Translate a problem, returns None if a constraint without terms can't be satisfied
    fn from_problem(problem: &Problem) -> Result<Option<Self>, SolverError> {
        let columns = column_indices(problem);
        let maximize = problem.objective_sense() == ObjectiveSense::Maximize;
        let sense = if maximize { -1. } else { 1. };
        let mut program = ConeProgram {
            equalities: Vec::new(),
            inequalities: Vec::new(),
            q: vec![0.; columns.len()],
            p_entries: Vec::new(),
            maximize,
        };

        for (index, constraint) in problem.constraints().enumerate() {
            let entries = merged_row(constraint.terms(), &columns)?;
            let (lower, upper) = constraint.bounds();
            if entries.is_empty() {
                // Nothing to hand to the solver, the row is satisfied iff 0 lies in its range
                if lower > 0. || upper < 0. {
                    return Ok(None);
                }
                continue;
            }
            program.push_range(entries, lower, upper, RowOrigin::Constraint(index));
        }

        for (column, variable) in problem.variables().enumerate() {
            program.push_range(
                vec![(column, 1.)],
                variable.lower_bound,
                variable.upper_bound,
                RowOrigin::Variable(column),
            );
        }

        for term in problem.objective().terms() {
            match term {
                ObjectiveTerm::Linear { var, coef } => {
                    let column = Self::column(&columns, var)?;
                    program.q[column] += sense * coef;
                }
                ObjectiveTerm::Quadratic { var1, var2, coef } => {
                    let first = Self::column(&columns, var1)?;
                    let second = Self::column(&columns, var2)?;
                    // P is symmetric and only its upper triangle is passed, x'Px/2 counts
                    // off-diagonal entries twice
                    let (row, col) = (first.min(second), first.max(second));
                    let value = if row == col { 2. * coef } else { *coef };
                    program.p_entries.push((row, col, sense * value));
                }
            }
        }
        Ok(Some(program))
    }

    fn column(columns: &IndexMap<&str, usize>, id: &str) -> Result<usize, SolverError> {
        columns
            .get(id)
            .copied()
            .ok_or_else(|| SolverError::Setup(format!("Objective references unknown variable {}", id)))
    }

    fn push_range(&mut self, entries: Vec<(usize, f64)>, lower: f64, upper: f64, origin: RowOrigin) {
        if lower == upper && lower.is_finite() {
            self.equalities.push(Row {
                entries,
                rhs: lower,
                origin,
                sign: 1.,
            });
            return;
        }
        if upper.is_finite() {
            self.inequalities.push(Row {
                entries: entries.clone(),
                rhs: upper,
                origin,
                sign: 1.,
            });
        }
        if lower.is_finite() {
            self.inequalities.push(Row {
                entries: entries.iter().map(|(c, v)| (*c, -v)).collect(),
                rhs: -lower,
                origin,
                sign: -1.,
            });
        }
    }

    fn rows(&self) -> impl Iterator<Item = &Row> {
        self.equalities.iter().chain(self.inequalities.iter())
    }

    fn constraint_matrix(&self) -> ClarabelCsc<f64> {
        let mut coo = CooMatrix::new(self.equalities.len() + self.inequalities.len(), self.q.len());
        for (row_index, row) in self.rows().enumerate() {
            for (column, value) in &row.entries {
                coo.push(row_index, *column, *value);
            }
        }
        to_clarabel(CscMatrix::from(&coo))
    }

    fn quadratic_matrix(&self) -> ClarabelCsc<f64> {
        let mut coo = CooMatrix::new(self.q.len(), self.q.len());
        for (row, col, value) in &self.p_entries {
            coo.push(*row, *col, *value);
        }
        to_clarabel(CscMatrix::from(&coo))
    }
}

fn to_clarabel(matrix: CscMatrix<f64>) -> ClarabelCsc<f64> {
    let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
    let (col_offsets, row_indices, values) = matrix.disassemble();
    ClarabelCsc::new(nrows, ncols, col_offsets, row_indices, values)
}

fn convert_status(status: SolverStatus) -> OptimizationStatus {
    match status {
        SolverStatus::Solved => OptimizationStatus::Optimal,
        SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            OptimizationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            OptimizationStatus::Unbounded
        }
        SolverStatus::MaxIterations => OptimizationStatus::IterationLimit,
        SolverStatus::MaxTime => OptimizationStatus::TimeLimit,
        SolverStatus::NumericalError => OptimizationStatus::NumericalError,
        SolverStatus::InsufficientProgress => OptimizationStatus::SolverHalted,
        SolverStatus::Unsolved => OptimizationStatus::Unoptimized,
        #[allow(unreachable_patterns)]
        _ => OptimizationStatus::SolverHalted,
    }
}

impl Solver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn quadratic_objective_capable(&self) -> bool {
        true
    }

    fn integer_variable_capable(&self) -> bool {
        false
    }

    fn dual_values_capable(&self) -> bool {
        true
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let program = match ConeProgram::from_problem(problem)? {
            Some(program) => program,
            None => return Ok(ProblemSolution::from_status(OptimizationStatus::Infeasible)),
        };
        let num_equalities = program.equalities.len();
        let num_inequalities = program.inequalities.len();
        if num_equalities + num_inequalities == 0 && program.p_entries.is_empty() {
            // No rows at all, the linear objective is unbounded unless it is zero
            let status = if program.q.iter().all(|c| *c == 0.) {
                OptimizationStatus::Optimal
            } else {
                OptimizationStatus::Unbounded
            };
            return Ok(solution_from_primal(problem, status, vec![0.; program.q.len()], None));
        }

        let mut cones = Vec::new();
        if num_equalities > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_equalities));
        }
        if num_inequalities > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_inequalities));
        }
        let b: Vec<f64> = program.rows().map(|row| row.rhs).collect();

        let mut settings = DefaultSettingsBuilder::<f64>::default();
        settings.verbose(false);
        if let Some(time_limit) = self.time_limit {
            settings.time_limit(time_limit);
        }
        if let Some(max_iterations) = self.max_iterations {
            settings.max_iter(max_iterations);
        }
        let settings = settings
            .build()
            .map_err(|err| SolverError::Setup(err.to_string()))?;

        debug!(
            variables = program.q.len(),
            equalities = num_equalities,
            inequalities = num_inequalities,
            "solving with clarabel"
        );
        let p = program.quadratic_matrix();
        let a = program.constraint_matrix();
        let mut solver = DefaultSolver::new(&p, &program.q, &a, &b, &cones, settings);
        solver.solve();

        let status = convert_status(solver.solution.status);
        if !status.has_solution() {
            return Ok(ProblemSolution::from_status(status));
        }
        let duals = Duals::from_cone_duals(problem, &program, &solver.solution.z);
        Ok(solution_from_primal(
            problem,
            status,
            solver.solution.x.clone(),
            Some(duals),
        ))
    }
}

/// Shadow prices and reduced costs, as the change in objective per unit change of the
/// active bound
struct Duals {
    constraints: Vec<f64>,
    variables: Vec<f64>,
}

impl Duals {
    fn from_cone_duals(problem: &Problem, program: &ConeProgram, z: &[f64]) -> Self {
        let mut duals = Duals {
            constraints: vec![0.; problem.num_constraints()],
            variables: vec![0.; problem.num_variables()],
        };
        // Clarabel's duals are sensitivities of the minimized objective with respect to -b
        let sense = if program.maximize { 1. } else { -1. };
        for (row, dual) in program.rows().zip(z) {
            let value = sense * row.sign * dual;
            match row.origin {
                RowOrigin::Constraint(index) => duals.constraints[index] += value,
                RowOrigin::Variable(index) => duals.variables[index] += value,
            }
        }
        duals
    }
}

fn solution_from_primal(
    problem: &Problem,
    status: OptimizationStatus,
    x: Vec<f64>,
    duals: Option<Duals>,
) -> ProblemSolution {
    let variable_values: IndexMap<String, f64> = problem
        .variables()
        .zip(x)
        .map(|(var, value)| (var.id.clone(), value))
        .collect();
    let objective_value = if status.has_solution() {
        Some(problem.evaluate_objective(&variable_values))
    } else {
        None
    };
    let (dual_values, reduced_costs) = match duals {
        Some(duals) => (
            Some(
                problem
                    .constraints()
                    .zip(duals.constraints)
                    .map(|(cons, value)| (cons.id().to_string(), value))
                    .collect(),
            ),
            Some(
                problem
                    .variables()
                    .zip(duals.variables)
                    .map(|(var, value)| (var.id.clone(), value))
                    .collect(),
            ),
        ),
        None => (None, None),
    };
    ProblemSolution {
        status,
        objective_value,
        variable_values: Some(variable_values),
        dual_values,
        reduced_costs,
    }
}
