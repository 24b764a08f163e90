//! Scoped, reversible edits to a [`Model`]
//!
//! While a [`ModelScope`] is open, every mutation of the model records its inverse. Dropping
//! the scope (normally, through `?`, or while unwinding from a panic) replays those inverses
//! newest first, so the model leaves the scope exactly as it entered it. Scopes nest, and an
//! inner scope only reverts its own edits.
//!
//! ```
//! use cbm_core::metabolic_model::model::{Model, OnInvalid};
//! use cbm_core::metabolic_model::reaction::ReactionBuilder;
//!
//! let mut model = Model::new("toy");
//! let uptake = ReactionBuilder::default()
//!     .id("EX_a")
//!     .metabolite("a", 1.)
//!     .bounds(0., 10.)
//!     .build()
//!     .unwrap();
//! model.add_reactions(vec![uptake], OnInvalid::Raise).unwrap();
//! {
//!     let mut scope = model.scope();
//!     scope.set_reaction_bounds("EX_a", 0., 0.).unwrap();
//!     assert_eq!(scope.reaction("EX_a").unwrap().bounds(), (0., 0.));
//! }
//! assert_eq!(model.reaction("EX_a").unwrap().bounds(), (0., 10.));
//! ```
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use tracing::debug;

use crate::metabolic_model::gene::{Gene, GeneActivity};
use crate::metabolic_model::gpr::Gpr;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::objective::ObjectiveSense;

/// Inverse of a single recorded mutation
#[derive(Debug, Clone)]
pub(crate) enum UndoOperation {
    /// Restore a reaction's bounds
    Bounds {
        reaction: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    /// Restore the full objective, reactions not listed get a coefficient of zero
    Objective(IndexMap<String, f64>),
    ObjectiveSense(ObjectiveSense),
    GeneActivity {
        gene: String,
        activity: GeneActivity,
    },
    Gpr {
        reaction: String,
        gpr: Option<Gpr>,
    },
    Stoichiometry {
        reaction: String,
        metabolites: IndexMap<String, f64>,
    },
    /// Give a renamed reaction its previous id
    RenameReaction {
        from: String,
        to: String,
    },
    MetaboliteCompartment {
        metabolite: String,
        compartment: Option<String>,
    },
    /// Remove reactions which were added
    RemoveReactions(Vec<String>),
    /// Re-insert removed reactions at their former positions
    RestoreReactions(Vec<(usize, Reaction)>),
    RemoveMetabolites(Vec<String>),
    RestoreMetabolites(Vec<(usize, Metabolite)>),
    RemoveGenes(Vec<String>),
    RestoreGenes(Vec<(usize, Gene)>),
}

/// An open scope on a model, see the [module docs](self)
///
/// Derefs to the [`Model`], so the full model API is available through the scope.
#[derive(Debug)]
pub struct ModelScope<'a> {
    model: &'a mut Model,
    depth: usize,
}

impl Deref for ModelScope<'_> {
    type Target = Model;

    fn deref(&self) -> &Self::Target {
        self.model
    }
}

impl DerefMut for ModelScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.model
    }
}

impl Drop for ModelScope<'_> {
    fn drop(&mut self) {
        self.model.revert_to(self.depth - 1);
    }
}

impl Model {
    /// Open a scope, edits made through it are undone when it is dropped
    pub fn scope(&mut self) -> ModelScope<'_> {
        self.undo_stack.push(Vec::new());
        let depth = self.undo_stack.len();
        debug!(depth, "opened model scope");
        ModelScope { model: self, depth }
    }

    /// Run `f` inside a scope, every edit it makes to the model is undone afterwards
    pub fn with_scope<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Model) -> T,
    {
        let mut scope = self.scope();
        f(&mut scope)
    }

    /// Whether any scope is currently open
    pub fn in_scope(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Record the inverse of a mutation in the innermost scope, a no-op outside of scopes
    pub(crate) fn record(&mut self, operation: UndoOperation) {
        if let Some(frame) = self.undo_stack.last_mut() {
            frame.push(operation);
        }
    }

    /// Close scopes until only `depth` remain, undoing their edits
    fn revert_to(&mut self, depth: usize) {
        while self.undo_stack.len() > depth {
            if let Some(frame) = self.undo_stack.pop() {
                debug!(operations = frame.len(), "reverting model scope");
                for operation in frame.into_iter().rev() {
                    self.undo(operation);
                }
            }
        }
    }

    fn undo(&mut self, operation: UndoOperation) {
        match operation {
            UndoOperation::Bounds {
                reaction,
                lower_bound,
                upper_bound,
            } => {
                if let Some(r) = self.reactions.get_mut(&reaction) {
                    r.lower_bound = lower_bound;
                    r.upper_bound = upper_bound;
                }
                self.sync_reaction_bounds(&reaction);
            }
            UndoOperation::Objective(objective) => {
                for reaction in self.reactions.values_mut() {
                    reaction.objective_coefficient =
                        objective.get(&reaction.id).copied().unwrap_or(0.);
                }
                self.sync_objective();
            }
            UndoOperation::ObjectiveSense(sense) => {
                self.objective_sense = sense;
                self.sync_objective();
            }
            UndoOperation::GeneActivity { gene, activity } => {
                if let Some(g) = self.genes.get_mut(&gene) {
                    g.activity = activity;
                }
            }
            UndoOperation::Gpr { reaction, gpr } => {
                if let Some(r) = self.reactions.get_mut(&reaction) {
                    r.gpr = gpr;
                }
            }
            UndoOperation::Stoichiometry {
                reaction,
                metabolites,
            } => {
                if let Some(r) = self.reactions.get_mut(&reaction) {
                    r.metabolites = metabolites;
                }
                self.structure_changed();
            }
            UndoOperation::RenameReaction { from, to } => self.move_reaction_id(&from, &to),
            UndoOperation::MetaboliteCompartment {
                metabolite,
                compartment,
            } => {
                if let Some(m) = self.metabolites.get_mut(&metabolite) {
                    m.compartment = compartment;
                }
            }
            UndoOperation::RemoveReactions(ids) => {
                for id in ids {
                    self.reactions.shift_remove(&id);
                }
                self.structure_changed();
            }
            UndoOperation::RestoreReactions(removed) => {
                for (index, reaction) in removed.into_iter().rev() {
                    self.reactions.shift_insert(index, reaction.id.clone(), reaction);
                }
                self.structure_changed();
            }
            UndoOperation::RemoveMetabolites(ids) => {
                for id in ids {
                    self.metabolites.shift_remove(&id);
                }
                self.structure_changed();
            }
            UndoOperation::RestoreMetabolites(removed) => {
                for (index, metabolite) in removed.into_iter().rev() {
                    self.metabolites
                        .shift_insert(index, metabolite.id.clone(), metabolite);
                }
                self.structure_changed();
            }
            UndoOperation::RemoveGenes(ids) => {
                for id in ids {
                    self.genes.shift_remove(&id);
                }
            }
            UndoOperation::RestoreGenes(removed) => {
                for (index, gene) in removed.into_iter().rev() {
                    self.genes.shift_insert(index, gene.id.clone(), gene);
                }
            }
        }
    }
}
