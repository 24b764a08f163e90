//! Gene and reaction deletion studies
//!
//! Every candidate knockout is applied inside a model scope, the model is solved, and the
//! scope reverts the knockout before the next candidate. Double deletions nest a second
//! scope inside the first. A candidate which leaves the model infeasible is a result, not
//! an error, so a study always covers its full candidate list.
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::flux_analysis::moma::moma;
use crate::flux_analysis::parsimonious::pfba;
use crate::flux_analysis::{reference_optimum, worker_count, AnalysisError};
use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::OptimizationStatus;
use crate::utils::parallel::run_tasks;

/// How each perturbed model is solved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionMethod {
    /// Optimize the model objective
    #[default]
    Fba,
    /// Quadratic minimization of adjustment from the unperturbed parsimonious fluxes
    Moma,
    /// Linear minimization of adjustment from the unperturbed parsimonious fluxes
    LinearMoma,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeletionOptions {
    pub method: DeletionMethod,
    /// Worker threads, defaults to the configured process count
    pub processes: Option<usize>,
}

/// Outcome of one knockout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionResult {
    /// Knocked out genes or reactions
    pub ids: Vec<String>,
    /// Model objective after the knockout, `None` without a solution
    pub objective_value: Option<f64>,
    pub status: OptimizationStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Reactions,
    Genes,
}

impl Target {
    fn all_ids(self, model: &Model) -> Vec<String> {
        match self {
            Target::Reactions => model.reactions().keys().cloned().collect(),
            Target::Genes => model.genes().keys().cloned().collect(),
        }
    }

    fn check(self, model: &Model, ids: &[&str]) -> Result<(), ModelError> {
        for id in ids {
            match self {
                Target::Reactions if model.reaction(id).is_none() => {
                    return Err(ModelError::ReactionNotFound(id.to_string()))
                }
                Target::Genes if model.gene(id).is_none() => {
                    return Err(ModelError::GeneNotFound(id.to_string()))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve(self, model: &Model, ids: Option<&[&str]>) -> Result<Vec<String>, ModelError> {
        match ids {
            Some(ids) => {
                self.check(model, ids)?;
                let unique: IndexSet<String> = ids.iter().map(|id| id.to_string()).collect();
                Ok(unique.into_iter().collect())
            }
            None => Ok(self.all_ids(model)),
        }
    }

    fn knock_out(self, model: &mut Model, id: &str) -> Result<(), ModelError> {
        match self {
            Target::Reactions => model.knock_out_reactions(&[id]),
            Target::Genes => model.knock_out_genes(&[id]).map(|_| ()),
        }
    }
}

/// Knock out each reaction in turn, `reactions` defaults to every reaction in the model
#[instrument(skip(model, reactions))]
pub fn single_reaction_deletion(
    model: &mut Model,
    reactions: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    single_deletion(model, Target::Reactions, reactions, options)
}

/// Knock out each gene in turn, `genes` defaults to every gene in the model
#[instrument(skip(model, genes))]
pub fn single_gene_deletion(
    model: &mut Model,
    genes: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    single_deletion(model, Target::Genes, genes, options)
}

/// Knock out every pair of distinct reactions drawn from the two lists
///
/// Both lists default to every reaction in the model. A pair appears once regardless of
/// order, results follow the order of the first list.
#[instrument(skip(model, reactions1, reactions2))]
pub fn double_reaction_deletion(
    model: &mut Model,
    reactions1: Option<&[&str]>,
    reactions2: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    double_deletion(model, Target::Reactions, reactions1, reactions2, options)
}

/// Knock out every pair of distinct genes drawn from the two lists
///
/// Both lists default to every gene in the model. A pair appears once regardless of
/// order, results follow the order of the first list.
#[instrument(skip(model, genes1, genes2))]
pub fn double_gene_deletion(
    model: &mut Model,
    genes1: Option<&[&str]>,
    genes2: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    double_deletion(model, Target::Genes, genes1, genes2, options)
}

/// Reactions whose knockout drops the objective below `threshold`, or leaves no solution
///
/// `threshold` defaults to 1% of the unperturbed optimum.
#[instrument(skip(model))]
pub fn find_essential_reactions(
    model: &mut Model,
    threshold: Option<f64>,
    processes: Option<usize>,
) -> Result<Vec<String>, AnalysisError> {
    find_essential(model, Target::Reactions, threshold, processes)
}

/// Genes whose knockout drops the objective below `threshold`, or leaves no solution
///
/// `threshold` defaults to 1% of the unperturbed optimum.
#[instrument(skip(model))]
pub fn find_essential_genes(
    model: &mut Model,
    threshold: Option<f64>,
    processes: Option<usize>,
) -> Result<Vec<String>, AnalysisError> {
    find_essential(model, Target::Genes, threshold, processes)
}

fn find_essential(
    model: &mut Model,
    target: Target,
    threshold: Option<f64>,
    processes: Option<usize>,
) -> Result<Vec<String>, AnalysisError> {
    let threshold = match threshold {
        Some(threshold) => threshold,
        None => reference_optimum(model)? * 1e-2,
    };
    let options = DeletionOptions {
        method: DeletionMethod::Fba,
        processes,
    };
    let results = single_deletion(model, target, None, &options)?;
    let essential: Vec<String> = results
        .into_iter()
        .filter(|result| result.objective_value.map_or(true, |value| value < threshold))
        .flat_map(|result| result.ids)
        .collect();
    info!(count = essential.len(), "found essential {:?}", target);
    Ok(essential)
}

/// Unperturbed fluxes the adjustment methods measure distance from
fn reference_fluxes(
    model: &mut Model,
    method: DeletionMethod,
) -> Result<Option<IndexMap<String, f64>>, AnalysisError> {
    match method {
        DeletionMethod::Fba => Ok(None),
        DeletionMethod::Moma | DeletionMethod::LinearMoma => Ok(Some(pfba(model, 1.)?.fluxes)),
    }
}

/// Solve the model as it stands with the chosen method
fn evaluate(
    model: &mut Model,
    method: DeletionMethod,
    reference: Option<&IndexMap<String, f64>>,
    ids: Vec<String>,
) -> Result<DeletionResult, AnalysisError> {
    let solution = match (method, reference) {
        (DeletionMethod::Moma, Some(reference)) => moma(model, reference, false)?,
        (DeletionMethod::LinearMoma, Some(reference)) => moma(model, reference, true)?,
        _ => model.optimize()?,
    };
    debug!(?ids, status = %solution.status, "evaluated deletion");
    Ok(DeletionResult {
        ids,
        objective_value: solution.objective_value,
        status: solution.status,
    })
}

fn single_deletion(
    model: &mut Model,
    target: Target,
    ids: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    let candidates = target.resolve(model, ids)?;
    let reference = reference_fluxes(model, options.method)?;
    let method = options.method;
    model.ensure_problem()?;

    let results = run_tasks(
        model,
        &candidates,
        worker_count(options.processes),
        |model, id| {
            model.with_scope(|model| -> Result<DeletionResult, AnalysisError> {
                target.knock_out(model, id)?;
                evaluate(model, method, reference.as_ref(), vec![id.clone()])
            })
        },
    )?;
    results.into_iter().collect()
}

fn double_deletion(
    model: &mut Model,
    target: Target,
    ids1: Option<&[&str]>,
    ids2: Option<&[&str]>,
    options: &DeletionOptions,
) -> Result<Vec<DeletionResult>, AnalysisError> {
    let first = target.resolve(model, ids1)?;
    let second = target.resolve(model, ids2)?;

    // group unordered pairs by their first member so the outer knockout is shared
    let mut seen: IndexSet<(String, String)> = IndexSet::new();
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for a in &first {
        for b in &second {
            if a == b {
                continue;
            }
            let key = if a < b {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            if seen.insert(key) {
                groups.entry(a.clone()).or_default().push(b.clone());
            }
        }
    }
    let groups: Vec<(String, Vec<String>)> = groups.into_iter().collect();
    let reference = reference_fluxes(model, options.method)?;
    let method = options.method;
    model.ensure_problem()?;

    let results = run_tasks(
        model,
        &groups,
        worker_count(options.processes),
        |model, group: &(String, Vec<String>)| -> Result<Vec<DeletionResult>, AnalysisError> {
            let (outer, inners) = group;
            let mut outer_scope = model.scope();
            target.knock_out(&mut outer_scope, outer)?;
            inners
                .iter()
                .map(|inner| {
                    outer_scope.with_scope(|model| -> Result<DeletionResult, AnalysisError> {
                        target.knock_out(model, inner)?;
                        evaluate(
                            model,
                            method,
                            reference.as_ref(),
                            vec![outer.clone(), inner.clone()],
                        )
                    })
                })
                .collect()
        },
    )?;
    let mut flattened = Vec::new();
    for group in results {
        flattened.extend(group?);
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::optimize::solvers::clarabel::ClarabelSolver;
    use crate::test_models::{branched_model, linear_pathway, StallingSolver};

    fn objective_of(results: &[DeletionResult], ids: &[&str]) -> f64 {
        results
            .iter()
            .find(|r| r.ids == ids)
            .and_then(|r| r.objective_value)
            .unwrap()
    }

    #[test]
    fn single_reaction_deletions() {
        let mut model = branched_model();
        let results =
            single_reaction_deletion(&mut model, None, &DeletionOptions::default()).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].ids, vec!["EX_A".to_string()]);
        assert_abs_diff_eq!(objective_of(&results, &["EX_A"]), 0., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["R2"]), 4., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["R3"]), 10., epsilon = 1e-4);
        assert!(results
            .iter()
            .all(|r| r.status == OptimizationStatus::Optimal));
        // every knockout was reverted
        assert_abs_diff_eq!(model.slim_optimize().unwrap().unwrap(), 10., epsilon = 1e-4);
        assert_eq!(model.reaction("R2").unwrap().bounds(), (0., 1000.));
    }

    #[test]
    fn single_gene_deletions() {
        let mut model = branched_model();
        let results =
            single_gene_deletion(&mut model, None, &DeletionOptions::default()).unwrap();
        assert_eq!(results.len(), 4);
        assert_abs_diff_eq!(objective_of(&results, &["g1"]), 10., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["g3"]), 4., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["g4"]), 10., epsilon = 1e-4);
        assert!(model.inactive_genes().is_empty());
    }

    #[test]
    fn parallel_deletions_keep_order() {
        let mut model = branched_model();
        let serial =
            single_reaction_deletion(&mut model, None, &DeletionOptions::default()).unwrap();
        let options = DeletionOptions {
            processes: Some(3),
            ..Default::default()
        };
        let parallel = single_reaction_deletion(&mut model, None, &options).unwrap();
        assert_eq!(serial.len(), parallel.len());
        for (s, p) in serial.iter().zip(&parallel) {
            assert_eq!(s.ids, p.ids);
            assert_abs_diff_eq!(
                s.objective_value.unwrap(),
                p.objective_value.unwrap(),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn double_gene_deletions() {
        let mut model = branched_model();
        let results =
            double_gene_deletion(&mut model, None, None, &DeletionOptions::default()).unwrap();
        // four genes give six unordered pairs
        assert_eq!(results.len(), 6);
        assert_eq!(results[0].ids, vec!["g1".to_string(), "g2".to_string()]);
        assert_abs_diff_eq!(objective_of(&results, &["g1", "g2"]), 4., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["g3", "g4"]), 0., epsilon = 1e-4);
        assert_abs_diff_eq!(objective_of(&results, &["g1", "g3"]), 4., epsilon = 1e-4);
        assert!(model.inactive_genes().is_empty());
        assert_eq!(model.reaction("R1").unwrap().bounds(), (0., 1000.));
    }

    #[test]
    fn double_reaction_deletions_with_lists() {
        let mut model = branched_model();
        let results = double_reaction_deletion(
            &mut model,
            Some(&["R2", "R3"][..]),
            Some(&["R3", "R2", "R1"][..]),
            &DeletionOptions::default(),
        )
        .unwrap();
        let ids: Vec<Vec<String>> = results.iter().map(|r| r.ids.clone()).collect();
        assert_eq!(
            ids,
            vec![
                vec!["R2".to_string(), "R3".to_string()],
                vec!["R2".to_string(), "R1".to_string()],
                vec!["R3".to_string(), "R1".to_string()],
            ]
        );
        assert_abs_diff_eq!(objective_of(&results, &["R3", "R1"]), 0., epsilon = 1e-4);
    }

    #[test]
    fn infeasible_candidate_does_not_abort() {
        let mut model = linear_pathway();
        model.set_reaction_bounds("DM_C", 1., 1000.).unwrap();
        let results =
            single_reaction_deletion(&mut model, None, &DeletionOptions::default()).unwrap();
        assert_eq!(results.len(), 4);
        let knocked = results.iter().find(|r| r.ids == ["A_B"]).unwrap();
        assert_eq!(knocked.status, OptimizationStatus::Infeasible);
        assert!(knocked.objective_value.is_none());
    }

    #[test]
    fn iteration_limit_keeps_every_candidate() {
        let mut model = branched_model();
        model.set_solver(Arc::new(ClarabelSolver {
            max_iterations: Some(1),
            ..Default::default()
        }));
        let results =
            single_reaction_deletion(&mut model, None, &DeletionOptions::default()).unwrap();
        assert_eq!(results.len(), 5);
        for result in &results {
            assert_eq!(result.status, OptimizationStatus::IterationLimit);
            assert!(result.objective_value.is_none());
        }
        assert_eq!(model.reaction("R3").unwrap().bounds(), (0., 4.));
    }

    #[test]
    fn time_limited_candidates_are_recorded() {
        let mut model = branched_model();
        // every second candidate runs out of time
        model.set_solver(StallingSolver::new(OptimizationStatus::TimeLimit, 2));
        let results = single_gene_deletion(
            &mut model,
            None,
            &DeletionOptions {
                processes: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        let statuses: Vec<OptimizationStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                OptimizationStatus::Optimal,
                OptimizationStatus::TimeLimit,
                OptimizationStatus::Optimal,
                OptimizationStatus::TimeLimit,
            ]
        );
        assert_abs_diff_eq!(objective_of(&results, &["g3"]), 4., epsilon = 1e-4);
    }

    #[test]
    fn moma_deletions() {
        let mut model = branched_model();
        let options = DeletionOptions {
            method: DeletionMethod::Moma,
            processes: Some(1),
        };
        let results = single_reaction_deletion(&mut model, Some(&["R3"][..]), &options).unwrap();
        assert_abs_diff_eq!(results[0].objective_value.unwrap(), 8., epsilon = 1e-3);
    }

    #[test]
    fn essential_entities() {
        let mut model = branched_model();
        assert_eq!(
            find_essential_reactions(&mut model, None, None).unwrap(),
            vec!["EX_A".to_string(), "DM_C".to_string()]
        );
        assert!(find_essential_genes(&mut model, None, None)
            .unwrap()
            .is_empty());
        assert_eq!(
            find_essential_genes(&mut model, Some(5.), None).unwrap(),
            vec!["g3".to_string()]
        );
    }

    #[test]
    fn unknown_candidate() {
        let mut model = branched_model();
        assert!(matches!(
            single_gene_deletion(&mut model, Some(&["nope"][..]), &DeletionOptions::default()),
            Err(AnalysisError::Model(ModelError::GeneNotFound(_)))
        ));
    }
}
