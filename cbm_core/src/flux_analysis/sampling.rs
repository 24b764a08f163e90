//! Flux sampling with artificial centering hit-and-run (ACHR)
//!
//! The sampler first collects warm-up points by minimizing and maximizing every reaction's
//! flux. Each step then picks a random warm-up point, walks along the direction from the
//! running center of all visited points towards it, and jumps to a uniformly random point of
//! that line which stays within the reaction bounds. Since both ends of every direction
//! satisfy the steady-state constraints, so does every visited point; the current point is
//! periodically projected back onto the steady-state subspace to clear rounding drift.
use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, warn};

use crate::flux_analysis::AnalysisError;
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::OptimizationStatus;

/// Shortest direction worth stepping along
const MIN_DIRECTION_NORM: f64 = 1e-9;
/// Direction components below this don't limit the step length
const MIN_DIRECTION_COMPONENT: f64 = 1e-12;
/// Relative size below which an eigenvalue of `SᵀS` counts as zero
const NULL_SPACE_TOLERANCE: f64 = 1e-10;

#[derive(Clone, Debug)]
pub struct SamplingOptions {
    /// Steps taken between two returned samples
    pub thinning: usize,
    /// Steps between projections of the current point onto the steady-state subspace
    pub reprojection_interval: usize,
    /// Seed of the random number generator, drawn at random when `None`
    pub seed: Option<u64>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        SamplingOptions {
            thinning: 100,
            reprojection_interval: 1000,
            seed: None,
        }
    }
}

/// Random walk over the flux space of a model
///
/// The sampler owns a snapshot of the model's bounds and stoichiometry taken at
/// construction, later edits to the model don't affect it.
#[derive(Clone, Debug)]
pub struct AchrSampler {
    reactions: Vec<String>,
    lower_bounds: DVector<f64>,
    upper_bounds: DVector<f64>,
    /// Orthogonal projector onto the null space of the stoichiometric matrix
    projector: DMatrix<f64>,
    /// One warm-up point per column
    warmup: DMatrix<f64>,
    initial_center: DVector<f64>,
    center: DVector<f64>,
    current: DVector<f64>,
    points_seen: usize,
    steps: usize,
    thinning: usize,
    reprojection_interval: usize,
    seed: u64,
    rng: StdRng,
}

impl AchrSampler {
    /// Build a sampler for the current state of the model
    ///
    /// Fails if the model has no reactions, can't be solved, or allows unbounded flux. A
    /// warm-up solve that stops without a solution (e.g. at an iteration limit) only loses
    /// its point, construction fails when no point is left.
    #[instrument(skip(model))]
    pub fn new(model: &mut Model, options: &SamplingOptions) -> Result<Self, AnalysisError> {
        if model.reactions().is_empty() {
            return Err(AnalysisError::Sampling("model has no reactions".to_string()));
        }
        let reactions: Vec<String> = model.reactions().keys().cloned().collect();
        let size = reactions.len();
        let lower_bounds =
            DVector::from_iterator(size, model.reactions().values().map(|r| r.lower_bound));
        let upper_bounds =
            DVector::from_iterator(size, model.reactions().values().map(|r| r.upper_bound));
        let projector = null_space_projector(model);

        let mut problem = model.problem()?;
        let mut points = Vec::with_capacity(2 * size);
        let mut last_failure = None;
        for id in &reactions {
            problem.set_linear_objective(&[(id.as_str(), 1.)])?;
            for sense in [ObjectiveSense::Minimize, ObjectiveSense::Maximize] {
                problem.update_objective_sense(sense);
                let solution = problem.solve()?;
                let values = match (solution.status, solution.variable_values) {
                    (OptimizationStatus::Unbounded, _) => {
                        return Err(AnalysisError::Sampling(format!(
                            "flux through {} is unbounded",
                            id
                        )))
                    }
                    (OptimizationStatus::Infeasible, _) => {
                        return Err(AnalysisError::NoSolution(OptimizationStatus::Infeasible))
                    }
                    (status, Some(values)) if status.has_solution() => values,
                    (status, _) => {
                        warn!(reaction = %id, ?sense, %status, "skipping warm-up point");
                        last_failure = Some(status);
                        continue;
                    }
                };
                let point = DVector::from_iterator(
                    size,
                    reactions
                        .iter()
                        .map(|r| values.get(r).copied().unwrap_or(0.)),
                );
                points.push(&projector * point);
            }
        }
        if points.is_empty() {
            return Err(AnalysisError::NoSolution(
                last_failure.unwrap_or(OptimizationStatus::Unoptimized),
            ));
        }
        let warmup = DMatrix::from_columns(&points);
        let initial_center = warmup.column_mean();
        debug!(warmup = warmup.ncols(), "collected warm-up points");

        let seed = options.seed.unwrap_or_else(rand::random::<u64>);
        Ok(AchrSampler {
            reactions,
            lower_bounds,
            upper_bounds,
            projector,
            points_seen: warmup.ncols(),
            warmup,
            center: initial_center.clone(),
            current: initial_center.clone(),
            initial_center,
            steps: 0,
            thinning: options.thinning.max(1),
            reprojection_interval: options.reprojection_interval.max(1),
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Reaction ids, in the order of the sampled flux vectors
    pub fn reactions(&self) -> &[String] {
        &self.reactions
    }

    /// Seed the sequence was started from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the walk, the following samples repeat the sequence from the beginning
    pub fn reset(&mut self) {
        self.center = self.initial_center.clone();
        self.current = self.initial_center.clone();
        self.points_seen = self.warmup.ncols();
        self.steps = 0;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Lazily draw the next `count` samples
    pub fn samples(&mut self, count: usize) -> impl Iterator<Item = IndexMap<String, f64>> + '_ {
        (0..count).map(move |_| self.next_sample())
    }

    /// Advance the walk by one thinning interval and return the flux vector reached
    pub fn next_sample(&mut self) -> IndexMap<String, f64> {
        for _ in 0..self.thinning {
            self.step();
        }
        self.reactions
            .iter()
            .cloned()
            .zip(self.current.iter().copied())
            .collect()
    }

    fn step(&mut self) {
        let pick = self.rng.gen_range(0..self.warmup.ncols());
        let direction = self.warmup.column(pick) - &self.center;
        if direction.norm() > MIN_DIRECTION_NORM {
            if let Some((shortest, longest)) = self.step_range(&direction) {
                let alpha = self.rng.gen_range(shortest..longest);
                self.current.axpy(alpha, &direction, 1.);
            }
        }
        self.steps += 1;
        if self.steps % self.reprojection_interval == 0 {
            self.current = &self.projector * &self.current;
        }
        let seen = self.points_seen as f64;
        self.center = (&self.center * seen + &self.current) / (seen + 1.);
        self.points_seen += 1;
    }

    /// Range of step lengths along `direction` which keep every flux within its bounds
    fn step_range(&self, direction: &DVector<f64>) -> Option<(f64, f64)> {
        let mut shortest = f64::NEG_INFINITY;
        let mut longest = f64::INFINITY;
        for (i, d) in direction.iter().enumerate() {
            if d.abs() <= MIN_DIRECTION_COMPONENT {
                continue;
            }
            let to_lower = (self.lower_bounds[i] - self.current[i]) / d;
            let to_upper = (self.upper_bounds[i] - self.current[i]) / d;
            let (low, high) = if *d > 0. {
                (to_lower, to_upper)
            } else {
                (to_upper, to_lower)
            };
            shortest = shortest.max(low);
            longest = longest.min(high);
        }
        (shortest.is_finite() && longest.is_finite() && shortest < longest)
            .then_some((shortest, longest))
    }
}

/// Projector onto the flux vectors satisfying `S·v = 0`
fn null_space_projector(model: &Model) -> DMatrix<f64> {
    let size = model.reactions().len();
    let stoichiometry = DMatrix::from(&model.stoichiometric_matrix());
    let gram = stoichiometry.transpose() * &stoichiometry;
    let eigen = SymmetricEigen::new(gram);
    let scale = eigen
        .eigenvalues
        .iter()
        .fold(1f64, |largest, value| largest.max(value.abs()));
    let basis: Vec<DVector<f64>> = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .filter(|(_, value)| value.abs() <= NULL_SPACE_TOLERANCE * scale)
        .map(|(i, _)| eigen.eigenvectors.column(i).into_owned())
        .collect();
    if basis.is_empty() {
        return DMatrix::zeros(size, size);
    }
    let basis = DMatrix::from_columns(&basis);
    &basis * basis.transpose()
}

/// Draw `count` flux samples from the model
#[instrument(skip(model))]
pub fn sample(
    model: &mut Model,
    count: usize,
    options: &SamplingOptions,
) -> Result<Vec<IndexMap<String, f64>>, AnalysisError> {
    let mut sampler = AchrSampler::new(model, options)?;
    Ok(sampler.samples(count).collect())
}
