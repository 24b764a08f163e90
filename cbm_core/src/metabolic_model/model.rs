//! This module provides the Model struct for representing an entire metabolic model
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::configuration::Configuration;
use crate::metabolic_model::context::UndoOperation;
use crate::metabolic_model::gene::{Gene, GeneActivity};
use crate::metabolic_model::gpr::{parse_gpr, GprParseError};
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::{
    check_bounds, check_coefficient, combined_stoichiometry, parse_reaction_equation, Reaction,
    ReactionError,
};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::solvers::{default_solver, Solver};

/// What to do when one entity in a batch mutation is invalid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnInvalid {
    /// Fail the whole call, leaving the model unchanged
    Raise,
    /// Log a warning, leave the entity out, and apply the rest of the batch
    Skip,
}

/// Represents a Genome Scale Metabolic Model
///
/// The stoichiometric matrix is implied by the reactions' metabolite coefficients. The
/// compiled optimization problem is cached and rebuilt when the structure changes, while
/// bound and objective edits are pushed into the cached problem directly.
#[derive(Debug)]
pub struct Model {
    /// Id associated with the Model
    pub id: Option<String>,
    /// Compartments in the model
    ///
    /// An IndexMap<String, String> of {short name: long name}
    pub compartments: Option<IndexMap<String, String>>,
    /// A version identifier for the Model, stored as a string
    pub version: Option<String>,
    /// Map of reaction ids to Reactions
    pub(crate) reactions: IndexMap<String, Reaction>,
    /// Map of metabolite ids to Metabolites
    pub(crate) metabolites: IndexMap<String, Metabolite>,
    /// Map of gene ids to Genes
    pub(crate) genes: IndexMap<String, Gene>,
    /// Whether the objective is maximized or minimized
    pub(crate) objective_sense: ObjectiveSense,
    /// Compiled problem, tagged with the structure version it was compiled from
    pub(crate) problem: Option<(u64, Problem)>,
    /// Bumped by every structural mutation
    pub(crate) structure_version: u64,
    /// Backend handed to compiled problems
    pub(crate) solver: Arc<dyn Solver>,
    /// One frame of inverse operations per open scope, innermost last
    pub(crate) undo_stack: Vec<Vec<UndoOperation>>,
}

impl Clone for Model {
    /// Copies the model in its current state, the copy has no open scopes
    fn clone(&self) -> Self {
        Model {
            id: self.id.clone(),
            compartments: self.compartments.clone(),
            version: self.version.clone(),
            reactions: self.reactions.clone(),
            metabolites: self.metabolites.clone(),
            genes: self.genes.clone(),
            objective_sense: self.objective_sense,
            problem: self.problem.clone(),
            structure_version: self.structure_version,
            solver: self.solver.clone(),
            undo_stack: Vec::new(),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::new_empty()
    }
}

impl Model {
    // region Creation
    /// Create a model with no reactions, maximizing an empty objective
    pub fn new_empty() -> Self {
        Model {
            id: None,
            compartments: None,
            version: None,
            reactions: IndexMap::new(),
            metabolites: IndexMap::new(),
            genes: IndexMap::new(),
            objective_sense: ObjectiveSense::Maximize,
            problem: None,
            structure_version: 0,
            solver: default_solver(),
            undo_stack: Vec::new(),
        }
    }

    /// Create an empty model with an id
    pub fn new(id: &str) -> Self {
        Model {
            id: Some(id.to_string()),
            ..Model::new_empty()
        }
    }
    // endregion Creation

    // region Accessors
    pub fn reactions(&self) -> &IndexMap<String, Reaction> {
        &self.reactions
    }

    pub fn reaction(&self, id: &str) -> Option<&Reaction> {
        self.reactions.get(id)
    }

    pub fn metabolites(&self) -> &IndexMap<String, Metabolite> {
        &self.metabolites
    }

    pub fn metabolite(&self, id: &str) -> Option<&Metabolite> {
        self.metabolites.get(id)
    }

    pub fn genes(&self) -> &IndexMap<String, Gene> {
        &self.genes
    }

    pub fn gene(&self, id: &str) -> Option<&Gene> {
        self.genes.get(id)
    }

    pub fn objective_sense(&self) -> ObjectiveSense {
        self.objective_sense
    }

    /// Reactions with a nonzero objective coefficient, mapped to that coefficient
    pub fn objective(&self) -> IndexMap<String, f64> {
        self.reactions
            .values()
            .filter(|r| r.objective_coefficient != 0.)
            .map(|r| (r.id.clone(), r.objective_coefficient))
            .collect()
    }

    /// Backend used to solve the model
    pub fn solver(&self) -> &Arc<dyn Solver> {
        &self.solver
    }

    /// Change the backend used to solve the model
    pub fn set_solver(&mut self, solver: Arc<dyn Solver>) {
        if let Some((_, problem)) = &mut self.problem {
            problem.set_solver(solver.clone());
        }
        self.solver = solver;
    }

    /// Genes currently marked as not functional
    pub fn inactive_genes(&self) -> HashSet<String> {
        self.genes
            .values()
            .filter(|g| !g.is_functional())
            .map(|g| g.id.clone())
            .collect()
    }
    // endregion Accessors

    // region Adding Entities
    /// Add metabolites to the model
    ///
    /// Returns the ids of metabolites left out under [`OnInvalid::Skip`].
    pub fn add_metabolites(
        &mut self,
        metabolites: Vec<Metabolite>,
        on_invalid: OnInvalid,
    ) -> Result<Vec<String>, ModelError> {
        let mut accepted: IndexMap<String, Metabolite> = IndexMap::new();
        let mut skipped = Vec::new();
        for metabolite in metabolites {
            if self.metabolites.contains_key(&metabolite.id) || accepted.contains_key(&metabolite.id)
            {
                let err = ModelError::DuplicateId {
                    kind: "metabolite",
                    id: metabolite.id.clone(),
                };
                Self::handle_invalid(err, on_invalid, &mut skipped, &metabolite.id)?;
                continue;
            }
            accepted.insert(metabolite.id.clone(), metabolite);
        }
        if !accepted.is_empty() {
            self.record(UndoOperation::RemoveMetabolites(
                accepted.keys().cloned().collect(),
            ));
            self.metabolites.extend(accepted);
            self.structure_changed();
        }
        Ok(skipped)
    }

    /// Add genes to the model
    ///
    /// Returns the ids of genes left out under [`OnInvalid::Skip`].
    pub fn add_genes(
        &mut self,
        genes: Vec<Gene>,
        on_invalid: OnInvalid,
    ) -> Result<Vec<String>, ModelError> {
        let mut accepted: IndexMap<String, Gene> = IndexMap::new();
        let mut skipped = Vec::new();
        for gene in genes {
            if self.genes.contains_key(&gene.id) || accepted.contains_key(&gene.id) {
                let err = ModelError::DuplicateId {
                    kind: "gene",
                    id: gene.id.clone(),
                };
                Self::handle_invalid(err, on_invalid, &mut skipped, &gene.id)?;
                continue;
            }
            accepted.insert(gene.id.clone(), gene);
        }
        if !accepted.is_empty() {
            self.record(UndoOperation::RemoveGenes(accepted.keys().cloned().collect()));
            self.genes.extend(accepted);
        }
        Ok(skipped)
    }

    /// Add reactions to the model
    ///
    /// Metabolites referenced by a reaction's stoichiometry and genes referenced by its GPR
    /// that are not yet part of the model are created with default attributes, and each
    /// creation is logged.
    ///
    /// Returns the ids of reactions left out under [`OnInvalid::Skip`].
    pub fn add_reactions(
        &mut self,
        reactions: Vec<Reaction>,
        on_invalid: OnInvalid,
    ) -> Result<Vec<String>, ModelError> {
        let mut accepted: IndexMap<String, Reaction> = IndexMap::new();
        let mut skipped = Vec::new();
        for reaction in reactions {
            match self.validate_new_reaction(&reaction, &accepted) {
                Ok(()) => {
                    accepted.insert(reaction.id.clone(), reaction);
                }
                Err(err) => Self::handle_invalid(err, on_invalid, &mut skipped, &reaction.id)?,
            }
        }
        if accepted.is_empty() {
            return Ok(skipped);
        }

        let mut new_metabolites: IndexSet<String> = IndexSet::new();
        let mut new_genes: IndexSet<String> = IndexSet::new();
        for reaction in accepted.values() {
            for metabolite in reaction.metabolites.keys() {
                if !self.metabolites.contains_key(metabolite) {
                    new_metabolites.insert(metabolite.clone());
                }
            }
            for gene in reaction.genes() {
                if !self.genes.contains_key(gene) {
                    new_genes.insert(gene.to_string());
                }
            }
        }
        self.create_implicit_metabolites(new_metabolites);
        self.create_implicit_genes(new_genes);

        self.record(UndoOperation::RemoveReactions(accepted.keys().cloned().collect()));
        self.reactions.extend(accepted);
        self.structure_changed();
        Ok(skipped)
    }

    fn create_implicit_metabolites(&mut self, ids: IndexSet<String>) {
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            info!(metabolite = %id, "adding metabolite referenced by a reaction");
            self.metabolites.insert(id.clone(), Metabolite::new(id));
        }
        self.record(UndoOperation::RemoveMetabolites(ids.into_iter().collect()));
    }

    fn create_implicit_genes(&mut self, ids: IndexSet<String>) {
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            info!(gene = %id, "adding gene referenced by a GPR");
            self.genes.insert(id.clone(), Gene::new(id));
        }
        self.record(UndoOperation::RemoveGenes(ids.into_iter().collect()));
    }

    fn validate_new_reaction(
        &self,
        reaction: &Reaction,
        batch: &IndexMap<String, Reaction>,
    ) -> Result<(), ModelError> {
        if self.reactions.contains_key(&reaction.id) || batch.contains_key(&reaction.id) {
            return Err(ModelError::DuplicateId {
                kind: "reaction",
                id: reaction.id.clone(),
            });
        }
        check_bounds(&reaction.id, reaction.lower_bound, reaction.upper_bound)?;
        for (metabolite, coefficient) in &reaction.metabolites {
            check_coefficient(&reaction.id, metabolite, *coefficient)?;
        }
        Ok(())
    }

    fn handle_invalid(
        err: ModelError,
        on_invalid: OnInvalid,
        skipped: &mut Vec<String>,
        id: &str,
    ) -> Result<(), ModelError> {
        match on_invalid {
            OnInvalid::Raise => Err(err),
            OnInvalid::Skip => {
                warn!(id = %id, error = %err, "skipping invalid entity");
                skipped.push(id.to_string());
                Ok(())
            }
        }
    }
    // endregion Adding Entities

    // region Removing Entities
    /// Remove reactions from the model, returning the removed reactions
    ///
    /// Metabolites and genes used by the removed reactions stay in the model.
    pub fn remove_reactions(
        &mut self,
        ids: &[&str],
        on_invalid: OnInvalid,
    ) -> Result<Vec<Reaction>, ModelError> {
        let mut targets: IndexSet<&str> = IndexSet::new();
        let mut skipped = Vec::new();
        for id in ids {
            if self.reactions.contains_key(*id) {
                targets.insert(*id);
            } else {
                let err = ModelError::ReactionNotFound(id.to_string());
                Self::handle_invalid(err, on_invalid, &mut skipped, id)?;
            }
        }
        let mut removed = Vec::new();
        let mut restore = Vec::new();
        for id in targets {
            if let Some((index, _, reaction)) = self.reactions.shift_remove_full(id) {
                restore.push((index, reaction.clone()));
                removed.push(reaction);
            }
        }
        if !restore.is_empty() {
            self.record(UndoOperation::RestoreReactions(restore));
            self.structure_changed();
        }
        Ok(removed)
    }

    /// Remove metabolites from the model, returning the removed metabolites
    ///
    /// A metabolite still participating in a reaction can only be removed with `force`,
    /// which strips it from every such reaction. Without `force` the metabolite is
    /// invalid and handled according to `on_invalid`.
    pub fn remove_metabolites(
        &mut self,
        ids: &[&str],
        force: bool,
        on_invalid: OnInvalid,
    ) -> Result<Vec<Metabolite>, ModelError> {
        let mut targets: IndexSet<&str> = IndexSet::new();
        let mut skipped = Vec::new();
        for id in ids {
            let check = if !self.metabolites.contains_key(*id) {
                Err(ModelError::MetaboliteNotFound(id.to_string()))
            } else {
                let reactions = self.reactions_for_metabolite(id);
                if !force && !reactions.is_empty() {
                    Err(ModelError::ReferentialIntegrity {
                        entity: id.to_string(),
                        reactions: reactions.iter().map(|r| r.to_string()).collect(),
                    })
                } else {
                    Ok(())
                }
            };
            match check {
                Ok(()) => {
                    targets.insert(*id);
                }
                Err(err) => Self::handle_invalid(err, on_invalid, &mut skipped, id)?,
            }
        }

        let mut removed = Vec::new();
        let mut restore = Vec::new();
        for id in targets {
            let referencing: Vec<String> = self
                .reactions_for_metabolite(id)
                .into_iter()
                .map(|r| r.to_string())
                .collect();
            for reaction_id in referencing {
                if let Some(reaction) = self.reactions.get_mut(&reaction_id) {
                    let previous = reaction.metabolites.clone();
                    reaction.metabolites.shift_remove(id);
                    self.record(UndoOperation::Stoichiometry {
                        reaction: reaction_id,
                        metabolites: previous,
                    });
                }
            }
            if let Some((index, _, metabolite)) = self.metabolites.shift_remove_full(id) {
                restore.push((index, metabolite.clone()));
                removed.push(metabolite);
            }
        }
        if !restore.is_empty() {
            self.record(UndoOperation::RestoreMetabolites(restore));
            self.structure_changed();
        }
        Ok(removed)
    }

    /// Remove genes from the model, returning the removed genes
    ///
    /// A gene still referenced by a GPR can only be removed with `force`, which rewrites
    /// every such GPR as if the gene had never been part of it.
    pub fn remove_genes(
        &mut self,
        ids: &[&str],
        force: bool,
        on_invalid: OnInvalid,
    ) -> Result<Vec<Gene>, ModelError> {
        let mut targets: IndexSet<&str> = IndexSet::new();
        let mut skipped = Vec::new();
        for id in ids {
            let check = if !self.genes.contains_key(*id) {
                Err(ModelError::GeneNotFound(id.to_string()))
            } else {
                let reactions = self.reactions_for_gene(id);
                if !force && !reactions.is_empty() {
                    Err(ModelError::ReferentialIntegrity {
                        entity: id.to_string(),
                        reactions: reactions.iter().map(|r| r.to_string()).collect(),
                    })
                } else {
                    Ok(())
                }
            };
            match check {
                Ok(()) => {
                    targets.insert(*id);
                }
                Err(err) => Self::handle_invalid(err, on_invalid, &mut skipped, id)?,
            }
        }

        let mut removed = Vec::new();
        let mut restore = Vec::new();
        for id in targets {
            let referencing: Vec<String> = self
                .reactions_for_gene(id)
                .into_iter()
                .map(|r| r.to_string())
                .collect();
            for reaction_id in referencing {
                if let Some(reaction) = self.reactions.get_mut(&reaction_id) {
                    let previous = reaction.gpr.clone();
                    reaction.gpr = previous.as_ref().and_then(|gpr| gpr.without_gene(id));
                    self.record(UndoOperation::Gpr {
                        reaction: reaction_id,
                        gpr: previous,
                    });
                }
            }
            if let Some((index, _, gene)) = self.genes.shift_remove_full(id) {
                restore.push((index, gene.clone()));
                removed.push(gene);
            }
        }
        if !restore.is_empty() {
            self.record(UndoOperation::RestoreGenes(restore));
        }
        Ok(removed)
    }
    // endregion Removing Entities

    // region Reaction Edits
    /// Set both flux bounds of a reaction
    ///
    /// Fails, leaving the bounds unchanged, if `lower_bound > upper_bound`.
    pub fn set_reaction_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ModelError> {
        let reaction = self
            .reactions
            .get_mut(id)
            .ok_or_else(|| ModelError::ReactionNotFound(id.to_string()))?;
        let (previous_lower, previous_upper) = reaction.bounds();
        reaction.set_bounds(lower_bound, upper_bound)?;
        self.record(UndoOperation::Bounds {
            reaction: id.to_string(),
            lower_bound: previous_lower,
            upper_bound: previous_upper,
        });
        self.sync_reaction_bounds(id);
        Ok(())
    }

    /// Set the lower flux bound of a reaction
    pub fn set_lower_bound(&mut self, id: &str, lower_bound: f64) -> Result<(), ModelError> {
        let upper_bound = self.bounds_of(id)?.1;
        self.set_reaction_bounds(id, lower_bound, upper_bound)
    }

    /// Set the upper flux bound of a reaction
    pub fn set_upper_bound(&mut self, id: &str, upper_bound: f64) -> Result<(), ModelError> {
        let lower_bound = self.bounds_of(id)?.0;
        self.set_reaction_bounds(id, lower_bound, upper_bound)
    }

    fn bounds_of(&self, id: &str) -> Result<(f64, f64), ModelError> {
        self.reactions
            .get(id)
            .map(|r| r.bounds())
            .ok_or_else(|| ModelError::ReactionNotFound(id.to_string()))
    }

    /// Add metabolites to a reaction's stoichiometry (see [`Reaction::add_metabolites`])
    ///
    /// Metabolites not yet in the model are created, as in [`Model::add_reactions`].
    pub fn add_metabolites_to_reaction(
        &mut self,
        reaction_id: &str,
        metabolites: &[(&str, f64)],
        combine: bool,
    ) -> Result<(), ModelError> {
        let reaction = self
            .reactions
            .get(reaction_id)
            .ok_or_else(|| ModelError::ReactionNotFound(reaction_id.to_string()))?;
        for (metabolite, coefficient) in metabolites {
            check_coefficient(reaction_id, metabolite, *coefficient)?;
        }
        let previous = reaction.metabolites.clone();
        let updated = combined_stoichiometry(&previous, metabolites, combine);

        let new_metabolites: IndexSet<String> = updated
            .keys()
            .filter(|m| !self.metabolites.contains_key(*m))
            .cloned()
            .collect();
        self.create_implicit_metabolites(new_metabolites);
        if let Some(reaction) = self.reactions.get_mut(reaction_id) {
            reaction.metabolites = updated;
        }
        self.record(UndoOperation::Stoichiometry {
            reaction: reaction_id.to_string(),
            metabolites: previous,
        });
        self.structure_changed();
        Ok(())
    }

    /// Replace a reaction's GPR with a parsed rule, a blank rule removes the GPR
    ///
    /// Genes named by the rule that are not yet in the model are created.
    pub fn set_gpr(&mut self, reaction_id: &str, rule: &str) -> Result<(), ModelError> {
        if !self.reactions.contains_key(reaction_id) {
            return Err(ModelError::ReactionNotFound(reaction_id.to_string()));
        }
        let gpr = parse_gpr(rule)?;
        if let Some(gpr) = &gpr {
            let new_genes: IndexSet<String> = gpr
                .genes()
                .into_iter()
                .filter(|g| !self.genes.contains_key(*g))
                .map(|g| g.to_string())
                .collect();
            self.create_implicit_genes(new_genes);
        }
        if let Some(reaction) = self.reactions.get_mut(reaction_id) {
            let previous = std::mem::replace(&mut reaction.gpr, gpr);
            self.record(UndoOperation::Gpr {
                reaction: reaction_id.to_string(),
                gpr: previous,
            });
        }
        Ok(())
    }
    /// Rebuild a reaction from an equation such as `a + 2 b --> c`
    ///
    /// The stoichiometry is replaced and the bounds follow the arrow (see
    /// [`Reaction::build_from_string`]). Metabolites not yet in the model are created.
    pub fn build_reaction_from_string(
        &mut self,
        reaction_id: &str,
        equation: &str,
    ) -> Result<(), ModelError> {
        if !self.reactions.contains_key(reaction_id) {
            return Err(ModelError::ReactionNotFound(reaction_id.to_string()));
        }
        let (metabolites, direction) = parse_reaction_equation(equation)?;
        let (lower_bound, upper_bound) = direction.default_bounds();
        check_bounds(reaction_id, lower_bound, upper_bound)?;

        let new_metabolites: IndexSet<String> = metabolites
            .keys()
            .filter(|m| !self.metabolites.contains_key(*m))
            .cloned()
            .collect();
        self.create_implicit_metabolites(new_metabolites);
        if let Some(reaction) = self.reactions.get_mut(reaction_id) {
            let previous = std::mem::replace(&mut reaction.metabolites, metabolites);
            self.record(UndoOperation::Stoichiometry {
                reaction: reaction_id.to_string(),
                metabolites: previous,
            });
        }
        self.structure_changed();
        self.set_reaction_bounds(reaction_id, lower_bound, upper_bound)
    }

    /// Multiply a reaction's coefficients by `factor` (see [`Reaction::scale`])
    pub fn scale_reaction(&mut self, reaction_id: &str, factor: f64) -> Result<(), ModelError> {
        let reaction = self
            .reactions
            .get_mut(reaction_id)
            .ok_or_else(|| ModelError::ReactionNotFound(reaction_id.to_string()))?;
        let previous = reaction.metabolites.clone();
        let (lower_bound, upper_bound) = reaction.bounds();
        reaction.scale(factor)?;
        self.record(UndoOperation::Stoichiometry {
            reaction: reaction_id.to_string(),
            metabolites: previous,
        });
        self.record(UndoOperation::Bounds {
            reaction: reaction_id.to_string(),
            lower_bound,
            upper_bound,
        });
        self.structure_changed();
        Ok(())
    }

    /// Change a reaction's id, keeping its position in the model
    ///
    /// The compiled problem is rebuilt on the next solve, so its flux variable takes the new
    /// id as well.
    pub fn rename_reaction(&mut self, reaction_id: &str, new_id: &str) -> Result<(), ModelError> {
        if !self.reactions.contains_key(reaction_id) {
            return Err(ModelError::ReactionNotFound(reaction_id.to_string()));
        }
        if reaction_id == new_id {
            return Ok(());
        }
        if self.reactions.contains_key(new_id) {
            return Err(ModelError::DuplicateId {
                kind: "reaction",
                id: new_id.to_string(),
            });
        }
        self.move_reaction_id(reaction_id, new_id);
        self.record(UndoOperation::RenameReaction {
            from: new_id.to_string(),
            to: reaction_id.to_string(),
        });
        Ok(())
    }

    pub(crate) fn move_reaction_id(&mut self, reaction_id: &str, new_id: &str) {
        if let Some((index, _, mut reaction)) = self.reactions.shift_remove_full(reaction_id) {
            reaction.id = new_id.to_string();
            self.reactions.shift_insert(index, new_id.to_string(), reaction);
            self.structure_changed();
        }
    }

    /// Move a metabolite to another compartment, `None` clears it
    pub fn set_metabolite_compartment(
        &mut self,
        metabolite_id: &str,
        compartment: Option<&str>,
    ) -> Result<(), ModelError> {
        let metabolite = self
            .metabolites
            .get_mut(metabolite_id)
            .ok_or_else(|| ModelError::MetaboliteNotFound(metabolite_id.to_string()))?;
        let previous = std::mem::replace(
            &mut metabolite.compartment,
            compartment.map(|c| c.to_string()),
        );
        self.record(UndoOperation::MetaboliteCompartment {
            metabolite: metabolite_id.to_string(),
            compartment: previous,
        });
        Ok(())
    }
    // endregion Reaction Edits

    // region Objective
    /// Replace the objective, every reaction not listed gets a coefficient of zero
    pub fn set_objective(&mut self, terms: &[(&str, f64)]) -> Result<(), ModelError> {
        for (id, _) in terms {
            if !self.reactions.contains_key(*id) {
                return Err(ModelError::ReactionNotFound(id.to_string()));
            }
        }
        let previous = self.objective();
        self.reactions
            .values_mut()
            .for_each(|r| r.objective_coefficient = 0.);
        for (id, coefficient) in terms {
            if let Some(reaction) = self.reactions.get_mut(*id) {
                reaction.objective_coefficient += coefficient;
            }
        }
        self.record(UndoOperation::Objective(previous));
        self.sync_objective();
        Ok(())
    }

    /// Set whether the objective is maximized or minimized
    pub fn set_objective_sense(&mut self, sense: ObjectiveSense) {
        let previous = self.objective_sense;
        self.objective_sense = sense;
        self.record(UndoOperation::ObjectiveSense(previous));
        self.sync_objective();
    }
    // endregion Objective

    // region Knockouts
    /// Force reactions to carry no flux
    pub fn knock_out_reactions(&mut self, ids: &[&str]) -> Result<(), ModelError> {
        for id in ids {
            if !self.reactions.contains_key(*id) {
                return Err(ModelError::ReactionNotFound(id.to_string()));
            }
        }
        for id in ids {
            self.set_reaction_bounds(id, 0., 0.)?;
        }
        Ok(())
    }

    /// Mark genes as not functional, and knock out every reaction whose GPR no longer holds
    ///
    /// Returns the ids of the reactions knocked out.
    pub fn knock_out_genes(&mut self, ids: &[&str]) -> Result<Vec<String>, ModelError> {
        for id in ids {
            if !self.genes.contains_key(*id) {
                return Err(ModelError::GeneNotFound(id.to_string()));
            }
        }
        for id in ids {
            if let Some(gene) = self.genes.get_mut(*id) {
                if gene.activity == GeneActivity::Active {
                    gene.activity = GeneActivity::Inactive;
                    self.record(UndoOperation::GeneActivity {
                        gene: id.to_string(),
                        activity: GeneActivity::Active,
                    });
                }
            }
        }
        let inactive = self.inactive_genes();
        let knocked: Vec<String> = self
            .reactions
            .values()
            .filter(|r| match &r.gpr {
                Some(gpr) => ids.iter().any(|g| gpr.contains_gene(g)) && !gpr.eval(&inactive),
                None => false,
            })
            .map(|r| r.id.clone())
            .collect();
        for reaction_id in &knocked {
            debug!(reaction = %reaction_id, "knocking out reaction with inactive GPR");
            self.set_reaction_bounds(reaction_id, 0., 0.)?;
        }
        Ok(knocked)
    }

    /// Whether a reaction's GPR holds given the genes currently marked inactive
    pub fn reaction_is_functional(&self, id: &str) -> Result<bool, ModelError> {
        let reaction = self
            .reactions
            .get(id)
            .ok_or_else(|| ModelError::ReactionNotFound(id.to_string()))?;
        Ok(match &reaction.gpr {
            Some(gpr) => gpr.eval_with(&|gene: &str| {
                self.genes.get(gene).map_or(true, |g| g.is_functional())
            }),
            None => true,
        })
    }
    // endregion Knockouts

    // region Queries
    /// Compartments of the metabolites taking part in a reaction
    pub fn reaction_compartments(&self, reaction_id: &str) -> Result<IndexSet<&str>, ModelError> {
        let reaction = self
            .reactions
            .get(reaction_id)
            .ok_or_else(|| ModelError::ReactionNotFound(reaction_id.to_string()))?;
        Ok(reaction
            .metabolites
            .keys()
            .filter_map(|id| self.metabolites.get(id))
            .filter_map(|m| m.compartment.as_deref())
            .collect())
    }

    /// Ids of reactions in which the metabolite participates
    pub fn reactions_for_metabolite(&self, metabolite_id: &str) -> Vec<&str> {
        self.reactions
            .values()
            .filter(|r| r.metabolites.contains_key(metabolite_id))
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Ids of reactions whose GPR mentions the gene
    pub fn reactions_for_gene(&self, gene_id: &str) -> Vec<&str> {
        self.reactions
            .values()
            .filter(|r| r.gpr.as_ref().is_some_and(|gpr| gpr.contains_gene(gene_id)))
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Ids of exchange, demand, and sink reactions
    pub fn boundary_reactions(&self) -> Vec<&str> {
        self.reactions
            .values()
            .filter(|r| r.is_boundary())
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Element and charge imbalance of a reaction
    ///
    /// Maps each element (and `"charge"`) to the net amount produced by one unit of flux,
    /// leaving out balanced entries. An empty map means the reaction is balanced.
    pub fn check_mass_balance(&self, reaction_id: &str) -> Result<IndexMap<String, f64>, ModelError> {
        let reaction = self
            .reactions
            .get(reaction_id)
            .ok_or_else(|| ModelError::ReactionNotFound(reaction_id.to_string()))?;
        let mut balance: IndexMap<String, f64> = IndexMap::new();
        for (metabolite_id, coefficient) in &reaction.metabolites {
            let metabolite = self
                .metabolites
                .get(metabolite_id)
                .ok_or_else(|| ModelError::MetaboliteNotFound(metabolite_id.clone()))?;
            let elements = metabolite
                .elements()
                .ok_or_else(|| ModelError::MissingFormula(metabolite_id.clone()))?;
            for (element, count) in elements {
                *balance.entry(element).or_insert(0.) += coefficient * count;
            }
            *balance.entry("charge".to_string()).or_insert(0.) +=
                coefficient * metabolite.charge as f64;
        }
        let tolerance = Configuration::current().tolerance;
        balance.retain(|_, amount| amount.abs() > tolerance);
        Ok(balance)
    }

    /// Sparse stoichiometric matrix, rows in metabolite order and columns in reaction order
    pub fn stoichiometric_matrix(&self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.metabolites.len(), self.reactions.len());
        for (column, reaction) in self.reactions.values().enumerate() {
            for (metabolite, coefficient) in &reaction.metabolites {
                if let Some(row) = self.metabolites.get_index_of(metabolite) {
                    coo.push(row, column, *coefficient);
                }
            }
        }
        CscMatrix::from(&coo)
    }
    // endregion Queries

    pub(crate) fn structure_changed(&mut self) {
        self.structure_version += 1;
        debug!(version = self.structure_version, "model structure changed");
    }
}

/// Errors from editing or solving a model
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("A {kind} with id {id} already exists")]
    DuplicateId { kind: &'static str, id: String },
    #[error("Reaction {0} not found in model")]
    ReactionNotFound(String),
    #[error("Metabolite {0} not found in model")]
    MetaboliteNotFound(String),
    #[error("Gene {0} not found in model")]
    GeneNotFound(String),
    /// Invalid bounds or stoichiometric coefficient
    #[error(transparent)]
    Reaction(#[from] ReactionError),
    /// Tried to remove an entity which reactions still reference
    #[error("{entity} is still used by reactions {reactions:?}")]
    ReferentialIntegrity {
        entity: String,
        reactions: Vec<String>,
    },
    #[error("Metabolite {0} has no usable formula")]
    MissingFormula(String),
    #[error(transparent)]
    Gpr(#[from] GprParseError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::metabolic_model::metabolite::MetaboliteBuilder;
    use crate::metabolic_model::reaction::ReactionBuilder;
    use crate::test_models::{branched_model, linear_pathway};

    #[test]
    fn add_reactions_creates_metabolites_and_genes() {
        let model = branched_model();
        assert_eq!(model.reactions().len(), 5);
        assert_eq!(
            model.metabolites().keys().collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        assert_eq!(
            model.genes().keys().collect::<Vec<_>>(),
            vec!["g1", "g2", "g3", "g4"]
        );
    }

    #[test]
    fn add_reactions_raise_is_atomic() {
        let mut model = linear_pathway();
        let good = ReactionBuilder::default()
            .id("NEW")
            .metabolite("D", 1.)
            .build()
            .unwrap();
        let mut bad = Reaction::new("A_B");
        bad.lower_bound = 0.;
        let res = model.add_reactions(vec![good.clone(), bad.clone()], OnInvalid::Raise);
        assert!(matches!(res, Err(ModelError::DuplicateId { .. })));
        assert!(model.reaction("NEW").is_none());
        assert!(model.metabolite("D").is_none());

        let skipped = model
            .add_reactions(vec![good, bad], OnInvalid::Skip)
            .unwrap();
        assert_eq!(skipped, vec!["A_B".to_string()]);
        assert!(model.reaction("NEW").is_some());
        assert!(model.metabolite("D").is_some());
    }

    #[test]
    fn add_reactions_rejects_invalid_bounds() {
        let mut model = Model::new_empty();
        let mut reaction = Reaction::new("R");
        reaction.lower_bound = 5.;
        reaction.upper_bound = 1.;
        assert!(matches!(
            model.add_reactions(vec![reaction], OnInvalid::Raise),
            Err(ModelError::Reaction(ReactionError::InvalidBounds { .. }))
        ));

        // both bounds at the same infinity would leave the flux unconstrained
        let mut reaction = Reaction::new("R");
        reaction.lower_bound = f64::INFINITY;
        reaction.upper_bound = f64::INFINITY;
        assert!(matches!(
            model.add_reactions(vec![reaction], OnInvalid::Raise),
            Err(ModelError::Reaction(ReactionError::InvalidBounds { .. }))
        ));
        let mut model = linear_pathway();
        assert!(model
            .set_reaction_bounds("A_B", f64::NEG_INFINITY, f64::NEG_INFINITY)
            .is_err());
        assert_eq!(model.reaction("A_B").unwrap().bounds(), (0., 10.));
    }

    #[test]
    fn remove_then_add_round_trip() {
        let mut model = linear_pathway();
        let before: Vec<(String, (f64, f64))> = model
            .reactions()
            .values()
            .map(|r| (r.id.clone(), r.bounds()))
            .collect();
        let removed = model
            .remove_reactions(&["A_B", "B_C"], OnInvalid::Raise)
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert!(model.reaction("A_B").is_none());
        model.add_reactions(removed, OnInvalid::Raise).unwrap();
        for (id, bounds) in before {
            assert_eq!(model.reaction(&id).unwrap().bounds(), bounds);
        }
    }

    #[test]
    fn remove_missing_reaction() {
        let mut model = linear_pathway();
        assert!(matches!(
            model.remove_reactions(&["A_B", "nope"], OnInvalid::Raise),
            Err(ModelError::ReactionNotFound(_))
        ));
        assert!(model.reaction("A_B").is_some());
        let removed = model
            .remove_reactions(&["A_B", "nope"], OnInvalid::Skip)
            .unwrap();
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn remove_metabolite_referential_integrity() {
        let mut model = linear_pathway();
        match model.remove_metabolites(&["B"], false, OnInvalid::Raise) {
            Err(ModelError::ReferentialIntegrity { entity, reactions }) => {
                assert_eq!(entity, "B");
                assert_eq!(reactions, vec!["A_B".to_string(), "B_C".to_string()]);
            }
            other => panic!("Expected referential integrity error, got {:?}", other),
        }
        let removed = model
            .remove_metabolites(&["B"], true, OnInvalid::Raise)
            .unwrap();
        assert_eq!(removed[0].id, "B");
        assert_eq!(model.reaction("A_B").unwrap().get_coefficient("B"), None);
        assert!(model.reactions_for_metabolite("B").is_empty());
    }

    #[test]
    fn add_dangling_metabolite() {
        let mut model = linear_pathway();
        let skipped = model
            .add_metabolites(
                vec![Metabolite::new("lonely"), Metabolite::new("A")],
                OnInvalid::Skip,
            )
            .unwrap();
        assert_eq!(skipped, vec!["A".to_string()]);
        assert!(model.metabolite("lonely").is_some());
        let removed = model
            .remove_metabolites(&["lonely"], false, OnInvalid::Raise)
            .unwrap();
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn remove_genes_force_rewrites_gpr() {
        let mut model = branched_model();
        assert!(matches!(
            model.remove_genes(&["g1"], false, OnInvalid::Raise),
            Err(ModelError::ReferentialIntegrity { .. })
        ));
        model.remove_genes(&["g1"], true, OnInvalid::Raise).unwrap();
        assert_eq!(model.reaction("R1").unwrap().gene_reaction_rule(), "g2");
        assert!(model.gene("g1").is_none());
        model.add_genes(vec![Gene::new("g9")], OnInvalid::Raise).unwrap();
        assert!(model.add_genes(vec![Gene::new("g9")], OnInvalid::Raise).is_err());
    }

    #[test]
    fn bounds_are_validated() {
        let mut model = linear_pathway();
        assert!(model.set_reaction_bounds("A_B", 5., 1.).is_err());
        assert_eq!(model.reaction("A_B").unwrap().bounds(), (0., 10.));
        model.set_upper_bound("A_B", 20.).unwrap();
        model.set_lower_bound("A_B", 2.).unwrap();
        assert_eq!(model.reaction("A_B").unwrap().bounds(), (2., 20.));
        assert!(model.set_lower_bound("A_B", 21.).is_err());
        assert!(matches!(
            model.set_upper_bound("nope", 1.),
            Err(ModelError::ReactionNotFound(_))
        ));
    }

    #[test]
    fn set_objective_replaces() {
        let mut model = linear_pathway();
        assert_eq!(model.objective().keys().collect::<Vec<_>>(), vec!["B_C"]);
        model.set_objective(&[("DM_C", 2.)]).unwrap();
        let objective = model.objective();
        assert_eq!(objective.len(), 1);
        assert_eq!(objective["DM_C"], 2.);
        assert!(model.set_objective(&[("nope", 1.)]).is_err());
        assert_eq!(model.objective()["DM_C"], 2.);
    }

    #[test]
    fn gene_knockout_uses_gpr() {
        let mut model = branched_model();
        assert!(model.knock_out_genes(&["g1"]).unwrap().is_empty());
        assert!(model.reaction_is_functional("R1").unwrap());
        assert_eq!(model.knock_out_genes(&["g2"]).unwrap(), vec!["R1".to_string()]);
        assert!(!model.reaction_is_functional("R1").unwrap());
        assert_eq!(model.reaction("R1").unwrap().bounds(), (0., 0.));
        assert_eq!(model.inactive_genes().len(), 2);
        assert!(model.knock_out_genes(&["nope"]).is_err());
    }

    #[test]
    fn set_gpr_creates_genes() {
        let mut model = linear_pathway();
        model.set_gpr("A_B", "x1 and x2").unwrap();
        assert!(model.gene("x1").is_some());
        assert_eq!(model.reactions_for_gene("x2"), vec!["A_B"]);
        assert!(matches!(
            model.set_gpr("A_B", "x1 and"),
            Err(ModelError::Gpr(_))
        ));
        assert_eq!(model.reaction("A_B").unwrap().gene_reaction_rule(), "x1 and x2");
    }

    #[test]
    fn stoichiometry_edits() {
        let mut model = linear_pathway();
        model
            .add_metabolites_to_reaction("B_C", &[("atp", -1.)], true)
            .unwrap();
        assert!(model.metabolite("atp").is_some());
        assert_eq!(model.reaction("B_C").unwrap().get_coefficient("atp"), Some(-1.));
        assert!(model
            .add_metabolites_to_reaction("B_C", &[("atp", 0.)], true)
            .is_err());
    }

    #[test]
    fn boundary_reactions() {
        let model = linear_pathway();
        assert_eq!(model.boundary_reactions(), vec!["EX_A", "DM_C"]);
    }

    #[test]
    fn mass_balance() {
        let mut model = Model::new_empty();
        let metabolites = vec![
            MetaboliteBuilder::default()
                .id("glc")
                .formula(Some("C6H12O6".to_string()))
                .build()
                .unwrap(),
            MetaboliteBuilder::default()
                .id("g6p")
                .formula(Some("C6H11O9P".to_string()))
                .charge(-2)
                .build()
                .unwrap(),
            MetaboliteBuilder::default()
                .id("pi")
                .formula(Some("HO4P".to_string()))
                .charge(-2)
                .build()
                .unwrap(),
            MetaboliteBuilder::default()
                .id("h2o")
                .formula(Some("H2O".to_string()))
                .build()
                .unwrap(),
        ];
        model.add_metabolites(metabolites, OnInvalid::Raise).unwrap();
        let balanced = ReactionBuilder::default()
            .id("HEX")
            .metabolite("glc", -1.)
            .metabolite("pi", -1.)
            .metabolite("g6p", 1.)
            .metabolite("h2o", 1.)
            .build()
            .unwrap();
        let unbalanced = ReactionBuilder::default()
            .id("BAD")
            .metabolite("glc", -1.)
            .metabolite("g6p", 1.)
            .build()
            .unwrap();
        model
            .add_reactions(vec![balanced, unbalanced], OnInvalid::Raise)
            .unwrap();
        assert!(model.check_mass_balance("HEX").unwrap().is_empty());
        let imbalance = model.check_mass_balance("BAD").unwrap();
        assert_abs_diff_eq!(imbalance["H"], -1.);
        assert_abs_diff_eq!(imbalance["O"], 3.);
        assert_abs_diff_eq!(imbalance["P"], 1.);
        assert_abs_diff_eq!(imbalance["charge"], -2.);
        assert!(!imbalance.contains_key("C"));

        model
            .add_metabolites(vec![Metabolite::new("x")], OnInvalid::Raise)
            .unwrap();
        model
            .add_metabolites_to_reaction("BAD", &[("x", 1.)], true)
            .unwrap();
        assert!(matches!(
            model.check_mass_balance("BAD"),
            Err(ModelError::MissingFormula(_))
        ));
    }

    #[test]
    fn stoichiometric_matrix() {
        let model = linear_pathway();
        let matrix = model.stoichiometric_matrix();
        assert_eq!((matrix.nrows(), matrix.ncols()), (3, 4));
        assert_eq!(matrix.nnz(), 6);
        let dense = nalgebra::DMatrix::from(&matrix);
        // A_B consumes A and produces B
        assert_eq!(dense[(0, 1)], -1.);
        assert_eq!(dense[(1, 1)], 1.);
        assert_eq!(dense[(2, 3)], -1.);
    }

    #[test]
    fn clone_is_independent() {
        let model = linear_pathway();
        let mut copy = model.clone();
        copy.set_reaction_bounds("A_B", 0., 1.).unwrap();
        assert_eq!(model.reaction("A_B").unwrap().bounds(), (0., 10.));
    }

    #[test]
    fn build_reaction_from_string_in_scope() {
        let mut model = linear_pathway();
        {
            let mut scope = model.scope();
            scope
                .build_reaction_from_string("A_B", "2 A <== foo + B")
                .unwrap();
            let reaction = scope.reaction("A_B").unwrap();
            assert_eq!(reaction.get_coefficient("A"), Some(-2.));
            assert_eq!(reaction.get_coefficient("foo"), Some(1.));
            assert_eq!(reaction.get_coefficient("B"), Some(1.));
            assert_eq!(reaction.bounds(), (-1000., 0.));
            assert!(scope.metabolite("foo").is_some());
        }
        assert!(model.metabolite("foo").is_none());
        let reaction = model.reaction("A_B").unwrap();
        assert_eq!(reaction.reaction_string(), "A --> B");
        assert_eq!(reaction.bounds(), (0., 10.));
        assert_abs_diff_eq!(model.slim_optimize().unwrap().unwrap(), 10., epsilon = 1e-6);

        assert!(matches!(
            model.build_reaction_from_string("missing", "A --> B"),
            Err(ModelError::ReactionNotFound(_))
        ));
        assert!(matches!(
            model.build_reaction_from_string("A_B", "A B"),
            Err(ModelError::Reaction(ReactionError::InvalidEquation { .. }))
        ));
        assert_eq!(model.reaction("A_B").unwrap().reaction_string(), "A --> B");
    }

    #[test]
    fn rename_reaction() {
        let mut model = linear_pathway();
        model.optimize().unwrap();
        {
            let mut scope = model.scope();
            scope.rename_reaction("B_C", "convert_b").unwrap();
            assert!(scope.reaction("B_C").is_none());
            assert_eq!(scope.reaction("convert_b").unwrap().id, "convert_b");
            assert_eq!(scope.reactions().get_index_of("convert_b"), Some(2));
            let problem = scope.problem().unwrap();
            assert!(problem.variable("convert_b").is_some());
            assert!(problem.variable("B_C").is_none());
            let solution = scope.optimize().unwrap();
            assert_abs_diff_eq!(solution.objective_value.unwrap(), 10., epsilon = 1e-6);
            assert_abs_diff_eq!(solution.fluxes["convert_b"], 10., epsilon = 1e-6);
            assert_eq!(scope.objective().keys().collect::<Vec<_>>(), vec!["convert_b"]);
        }
        assert_eq!(
            model.reactions().keys().collect::<Vec<_>>(),
            vec!["EX_A", "A_B", "B_C", "DM_C"]
        );
        assert_eq!(model.reaction("B_C").unwrap().id, "B_C");
        assert!(model.problem().unwrap().variable("B_C").is_some());

        model.rename_reaction("A_B", "A_B").unwrap();
        assert!(matches!(
            model.rename_reaction("A_B", "DM_C"),
            Err(ModelError::DuplicateId { kind: "reaction", .. })
        ));
        assert!(matches!(
            model.rename_reaction("missing", "other"),
            Err(ModelError::ReactionNotFound(_))
        ));
        assert!(model.reaction("A_B").is_some());
    }

    #[test]
    fn scale_reaction_in_scope() {
        let mut model = linear_pathway();
        {
            let mut scope = model.scope();
            scope.scale_reaction("EX_A", -2.).unwrap();
            let reaction = scope.reaction("EX_A").unwrap();
            assert_eq!(reaction.get_coefficient("A"), Some(-2.));
            assert_eq!(reaction.bounds(), (-1000., 0.));
            // Uptake of A is now a negative flux
            let solution = scope.optimize().unwrap();
            assert_abs_diff_eq!(solution.fluxes["EX_A"], -5., epsilon = 1e-6);
            assert!(matches!(
                scope.scale_reaction("EX_A", 0.),
                Err(ModelError::Reaction(ReactionError::InvalidFactor { .. }))
            ));
        }
        let reaction = model.reaction("EX_A").unwrap();
        assert_eq!(reaction.get_coefficient("A"), Some(1.));
        assert_eq!(reaction.bounds(), (0., 1000.));
    }

    #[test]
    fn reaction_compartments_follow_metabolites() {
        let mut model = linear_pathway();
        assert!(model.reaction_compartments("A_B").unwrap().is_empty());
        model.set_metabolite_compartment("A", Some("e")).unwrap();
        model.set_metabolite_compartment("B", Some("c")).unwrap();
        let compartments = model.reaction_compartments("A_B").unwrap();
        assert_eq!(compartments.into_iter().collect::<Vec<_>>(), vec!["e", "c"]);
        {
            let mut scope = model.scope();
            scope.set_metabolite_compartment("B", Some("e")).unwrap();
            let compartments = scope.reaction_compartments("A_B").unwrap();
            assert_eq!(compartments.into_iter().collect::<Vec<_>>(), vec!["e"]);
        }
        assert_eq!(model.metabolite("B").unwrap().compartment.as_deref(), Some("c"));
        assert!(matches!(
            model.set_metabolite_compartment("missing", None),
            Err(ModelError::MetaboliteNotFound(_))
        ));
        assert!(matches!(
            model.reaction_compartments("missing"),
            Err(ModelError::ReactionNotFound(_))
        ));
    }
}
