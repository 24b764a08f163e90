//! Small models shared by the unit tests
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::metabolic_model::model::{Model, OnInvalid};
use crate::metabolic_model::reaction::{Reaction, ReactionBuilder};
use crate::optimize::problem::Problem;
use crate::optimize::solvers::clarabel::ClarabelSolver;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

fn reaction(id: &str, metabolites: &[(&str, f64)], bounds: (f64, f64), rule: &str) -> Reaction {
    let mut builder = ReactionBuilder::default();
    builder.id(id).bounds(bounds.0, bounds.1);
    for (metabolite, coefficient) in metabolites {
        builder.metabolite(metabolite, *coefficient);
    }
    if !rule.is_empty() {
        builder.gene_reaction_rule(rule).unwrap();
    }
    builder.build().unwrap()
}

/// `-> A -> B -> C ->`, with `A_B` limited to 10 and `B_C` as the maximized objective
pub(crate) fn linear_pathway() -> Model {
    let mut model = Model::new("linear_pathway");
    let reactions = vec![
        reaction("EX_A", &[("A", 1.)], (0., 1000.), ""),
        reaction("A_B", &[("A", -1.), ("B", 1.)], (0., 10.), ""),
        reaction("B_C", &[("B", -1.), ("C", 1.)], (0., 1000.), ""),
        reaction("DM_C", &[("C", -1.)], (0., 1000.), ""),
    ];
    model.add_reactions(reactions, OnInvalid::Raise).unwrap();
    model.set_objective(&[("B_C", 1.)]).unwrap();
    model
}

/// Uptake of A limited to 10, converted to C either through B (`R1`, `R2`) or directly
/// through `R3` (limited to 4), with the demand for C maximized
///
/// Genes: `R1` needs `g1 or g2`, `R2` needs `g3`, `R3` needs `g4`.
pub(crate) fn branched_model() -> Model {
    let mut model = Model::new("branched");
    let reactions = vec![
        reaction("EX_A", &[("A", 1.)], (0., 10.), ""),
        reaction("R1", &[("A", -1.), ("B", 1.)], (0., 1000.), "g1 or g2"),
        reaction("R2", &[("B", -1.), ("C", 1.)], (0., 1000.), "g3"),
        reaction("R3", &[("A", -1.), ("C", 1.)], (0., 4.), "g4"),
        reaction("DM_C", &[("C", -1.)], (0., 1000.), ""),
    ];
    model.add_reactions(reactions, OnInvalid::Raise).unwrap();
    model.set_objective(&[("DM_C", 1.)]).unwrap();
    model
}

/// Clarabel, except that every `period`-th solve stops early with `status` and no values
#[derive(Debug)]
pub(crate) struct StallingSolver {
    inner: ClarabelSolver,
    status: OptimizationStatus,
    period: usize,
    calls: AtomicUsize,
}

impl StallingSolver {
    pub(crate) fn new(status: OptimizationStatus, period: usize) -> Arc<Self> {
        Arc::new(StallingSolver {
            inner: ClarabelSolver::default(),
            status,
            period: period.max(1),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Solver for StallingSolver {
    fn name(&self) -> &'static str {
        "stalling"
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
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % self.period == 0 {
            return Ok(ProblemSolution::from_status(self.status));
        }
        self.inner.solve(problem)
    }
}
