//! This module provides a struct for representing reactions
use std::ops::{Add, AddAssign, Sub, SubAssign};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::Configuration;
use crate::metabolic_model::gpr::{parse_gpr, Gpr, GprParseError};

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Reaction {
    /// Used to identify the reaction
    #[builder(setter(into))]
    pub id: String,
    /// Metabolite stoichiometry of the reaction, keyed by metabolite id
    ///
    /// Negative coefficients are consumed, positive coefficients are produced. A coefficient
    /// is never zero, a metabolite that does not participate is simply absent.
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Gene Protein Reaction rule to determine if reaction is active, None means the
    /// reaction is always active (spontaneous or unannotated)
    #[builder(default = "None")]
    pub gpr: Option<Gpr>,
    /// Lower flux bound
    #[builder(default = "Configuration::current().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "Configuration::current().upper_bound")]
    pub upper_bound: f64,
    /// Coefficient of the reaction's flux in the model objective
    #[builder(default = "0.")]
    pub objective_coefficient: f64,
    /// Reaction subsystem
    #[builder(default = "None")]
    pub subsystem: Option<String>,
    /// Notes about the reaction
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Reaction Annotations
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl ReactionBuilder {
    /// Add a single metabolite with its stoichiometric coefficient
    pub fn metabolite(&mut self, id: &str, coefficient: f64) -> &mut Self {
        self.metabolites
            .get_or_insert_with(IndexMap::new)
            .insert(id.to_string(), coefficient);
        self
    }

    /// Set the GPR by parsing a rule string, a blank rule leaves the reaction always active
    pub fn gene_reaction_rule(&mut self, rule: &str) -> Result<&mut Self, GprParseError> {
        self.gpr = Some(parse_gpr(rule)?);
        Ok(self)
    }

    /// Set both flux bounds
    pub fn bounds(&mut self, lower_bound: f64, upper_bound: f64) -> &mut Self {
        self.lower_bound = Some(lower_bound);
        self.upper_bound = Some(upper_bound);
        self
    }

    fn validate(&self) -> Result<(), String> {
        let defaults = Configuration::current();
        let lower_bound = self.lower_bound.unwrap_or(defaults.lower_bound);
        let upper_bound = self.upper_bound.unwrap_or(defaults.upper_bound);
        if let Err(err) = check_bounds("reaction", lower_bound, upper_bound) {
            return Err(err.to_string());
        }
        if let Some(metabolites) = &self.metabolites {
            for (metabolite, coefficient) in metabolites {
                if let Err(err) = check_coefficient("reaction", metabolite, *coefficient) {
                    return Err(err.to_string());
                }
            }
        }
        Ok(())
    }
}

impl Reaction {
    /// Create a new reaction with only an id, using the configured default bounds
    pub fn new(id: &str) -> Reaction {
        let defaults = Configuration::current();
        Reaction {
            id: id.to_string(),
            metabolites: IndexMap::new(),
            name: None,
            gpr: None,
            lower_bound: defaults.lower_bound,
            upper_bound: defaults.upper_bound,
            objective_coefficient: 0.,
            subsystem: None,
            notes: None,
            annotation: None,
        }
    }

    /// Flux bounds as a `(lower, upper)` pair
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }

    /// Set both flux bounds, failing if `lower_bound > upper_bound` (the bounds are never clamped)
    pub fn set_bounds(&mut self, lower_bound: f64, upper_bound: f64) -> Result<(), ReactionError> {
        check_bounds(&self.id, lower_bound, upper_bound)?;
        self.lower_bound = lower_bound;
        self.upper_bound = upper_bound;
        Ok(())
    }

    /// Set the lower flux bound, keeping the upper bound
    pub fn set_lower_bound(&mut self, lower_bound: f64) -> Result<(), ReactionError> {
        self.set_bounds(lower_bound, self.upper_bound)
    }

    /// Set the upper flux bound, keeping the lower bound
    pub fn set_upper_bound(&mut self, upper_bound: f64) -> Result<(), ReactionError> {
        self.set_bounds(self.lower_bound, upper_bound)
    }

    /// Force the reaction to carry no flux
    pub fn knock_out(&mut self) {
        self.lower_bound = 0.;
        self.upper_bound = 0.;
    }

    /// Whether the reaction can carry flux in both directions
    pub fn reversibility(&self) -> bool {
        self.lower_bound < 0. && self.upper_bound > 0.
    }

    /// Whether the reaction is a boundary reaction (exchange, demand, or sink), i.e. it
    /// involves only a single metabolite
    pub fn is_boundary(&self) -> bool {
        self.metabolites.len() == 1
    }

    /// Ids of metabolites consumed by the reaction
    pub fn reactants(&self) -> Vec<&str> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef < 0.)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Ids of metabolites produced by the reaction
    pub fn products(&self) -> Vec<&str> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef > 0.)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Stoichiometric coefficient of a metabolite, None if it does not participate
    pub fn get_coefficient(&self, metabolite_id: &str) -> Option<f64> {
        self.metabolites.get(metabolite_id).copied()
    }

    /// Add metabolites to the reaction
    ///
    /// # Parameters
    /// - `metabolites`: pairs of metabolite id and stoichiometric coefficient
    /// - `combine`: if true, coefficients are added to existing ones (a metabolite whose
    ///   combined coefficient reaches zero stops participating), otherwise they replace them
    ///
    /// Nothing is changed if any coefficient is zero or not finite.
    pub fn add_metabolites(
        &mut self,
        metabolites: &[(&str, f64)],
        combine: bool,
    ) -> Result<(), ReactionError> {
        for (metabolite, coefficient) in metabolites {
            check_coefficient(&self.id, metabolite, *coefficient)?;
        }
        self.metabolites = combined_stoichiometry(&self.metabolites, metabolites, combine);
        Ok(())
    }

    /// Subtract metabolites from the reaction, i.e. add them with negated coefficients
    pub fn subtract_metabolites(&mut self, metabolites: &[(&str, f64)]) -> Result<(), ReactionError> {
        let negated: Vec<(&str, f64)> = metabolites.iter().map(|(m, c)| (*m, -c)).collect();
        self.add_metabolites(&negated, true)
    }

    /// Set the GPR by parsing a rule string
    pub fn set_gene_reaction_rule(&mut self, rule: &str) -> Result<(), GprParseError> {
        self.gpr = parse_gpr(rule)?;
        Ok(())
    }

    /// String form of the GPR, empty if the reaction has none
    pub fn gene_reaction_rule(&self) -> String {
        match &self.gpr {
            Some(gpr) => gpr.to_string(),
            None => String::new(),
        }
    }

    /// Ids of genes in the reaction's GPR
    pub fn genes(&self) -> Vec<&str> {
        match &self.gpr {
            Some(gpr) => gpr.genes().into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Human readable reaction equation, e.g. `a + 2 b --> c`
    ///
    /// The arrow reflects the bounds: `<=>` reversible, `-->` forward only, `<--` reverse only.
    pub fn reaction_string(&self) -> String {
        let side = |sign: f64| {
            self.metabolites
                .iter()
                .filter(|(_, coef)| **coef * sign > 0.)
                .map(|(id, coef)| {
                    let coef = coef.abs();
                    if coef == 1. {
                        id.clone()
                    } else {
                        format!("{} {}", coef, id)
                    }
                })
                .collect::<Vec<_>>()
                .join(" + ")
        };
        let arrow = if self.reversibility() {
            "<=>"
        } else if self.lower_bound < 0. {
            "<--"
        } else {
            "-->"
        };
        format!("{} {} {}", side(-1.), arrow, side(1.))
    }

    /// Replace the stoichiometry and bounds with those of an equation such as `a + 2 b --> c`
    ///
    /// The bounds follow the arrow (see [`ReactionDirection::default_bounds`]). Nothing is
    /// changed if the equation can't be parsed.
    pub fn build_from_string(&mut self, equation: &str) -> Result<(), ReactionError> {
        let (metabolites, direction) = parse_reaction_equation(equation)?;
        let (lower_bound, upper_bound) = direction.default_bounds();
        check_bounds(&self.id, lower_bound, upper_bound)?;
        self.metabolites = metabolites;
        self.lower_bound = lower_bound;
        self.upper_bound = upper_bound;
        Ok(())
    }

    /// Multiply every stoichiometric coefficient by `factor`
    ///
    /// A negative factor reverses the reaction, so the bounds are mirrored as well.
    pub fn scale(&mut self, factor: f64) -> Result<(), ReactionError> {
        if factor == 0. || !factor.is_finite() {
            return Err(ReactionError::InvalidFactor {
                id: self.id.clone(),
                factor,
            });
        }
        for coefficient in self.metabolites.values_mut() {
            *coefficient *= factor;
        }
        if factor < 0. {
            (self.lower_bound, self.upper_bound) = (-self.upper_bound, -self.lower_bound);
        }
        Ok(())
    }

    fn merge(&mut self, other: &Reaction, sign: f64) {
        let additions: Vec<(&str, f64)> = other
            .metabolites
            .iter()
            .map(|(id, coefficient)| (id.as_str(), sign * coefficient))
            .collect();
        self.metabolites = combined_stoichiometry(&self.metabolites, &additions, true);
        self.gpr = match (self.gpr.take(), other.gpr.clone()) {
            (Some(own), Some(other)) => Some(Gpr::and(vec![own, other])),
            (own, None) => own,
            (None, other) => other,
        };
    }
}

/// Merge `additions` into `current`, dropping metabolites whose coefficient becomes zero
pub(crate) fn combined_stoichiometry(
    current: &IndexMap<String, f64>,
    additions: &[(&str, f64)],
    combine: bool,
) -> IndexMap<String, f64> {
    let mut merged = current.clone();
    for (metabolite, coefficient) in additions {
        let entry = merged.entry(metabolite.to_string()).or_insert(0.);
        if combine {
            *entry += coefficient;
        } else {
            *entry = *coefficient;
        }
    }
    merged.retain(|_, coef| *coef != 0.);
    merged
}

/// Adds the other reaction's stoichiometry, both GPRs are required
impl AddAssign<&Reaction> for Reaction {
    fn add_assign(&mut self, other: &Reaction) {
        self.merge(other, 1.);
    }
}

/// Subtracts the other reaction's stoichiometry, both GPRs are required
impl SubAssign<&Reaction> for Reaction {
    fn sub_assign(&mut self, other: &Reaction) {
        self.merge(other, -1.);
    }
}

/// A copy of the left reaction (id, bounds, annotations) with the right one added
impl Add<&Reaction> for &Reaction {
    type Output = Reaction;

    fn add(self, other: &Reaction) -> Reaction {
        let mut sum = self.clone();
        sum += other;
        sum
    }
}

impl Sub<&Reaction> for &Reaction {
    type Output = Reaction;

    fn sub(self, other: &Reaction) -> Reaction {
        let mut difference = self.clone();
        difference -= other;
        difference
    }
}

/// Which way the arrow of a reaction equation points
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionDirection {
    Forward,
    Reverse,
    Reversible,
}

impl ReactionDirection {
    /// Bounds of a reaction written with this arrow, from the configured defaults
    ///
    /// `Forward` gives `(0, upper)`, `Reverse` gives `(lower, 0)`.
    pub fn default_bounds(self) -> (f64, f64) {
        let (lower_bound, upper_bound) = Configuration::current().bounds();
        match self {
            ReactionDirection::Forward => (0., upper_bound),
            ReactionDirection::Reverse => (lower_bound, 0.),
            ReactionDirection::Reversible => (lower_bound, upper_bound),
        }
    }

    /// Arrow tokens are a run of `-` or `=` with a head on one or both ends: `-->`, `<==`,
    /// `<=>`, `<->`, ...
    fn from_arrow(token: &str) -> Option<ReactionDirection> {
        let left = token.starts_with('<');
        let right = token.ends_with('>');
        let shaft = token.trim_start_matches('<').trim_end_matches('>');
        let valid_shaft = !shaft.is_empty()
            && (shaft.chars().all(|c| c == '-') || shaft.chars().all(|c| c == '='));
        match (valid_shaft, left, right) {
            (true, false, true) => Some(ReactionDirection::Forward),
            (true, true, false) => Some(ReactionDirection::Reverse),
            (true, true, true) => Some(ReactionDirection::Reversible),
            _ => None,
        }
    }
}

/// Parse a reaction equation such as `a + 2 b --> c` into its stoichiometry and direction
///
/// Terms are separated by ` + `, a coefficient is written before its metabolite id and
/// defaults to 1. Tokens are whitespace separated, and either side may be empty (e.g. the
/// exchange `glc__D_e <=> `). A metabolite on both sides gets the net coefficient.
pub fn parse_reaction_equation(
    equation: &str,
) -> Result<(IndexMap<String, f64>, ReactionDirection), ReactionError> {
    let invalid = |reason: String| ReactionError::InvalidEquation {
        equation: equation.to_string(),
        reason,
    };
    let tokens: Vec<&str> = equation.split_whitespace().collect();
    let arrows: Vec<(usize, ReactionDirection)> = tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| ReactionDirection::from_arrow(token).map(|d| (i, d)))
        .collect();
    let (position, direction) = match arrows.as_slice() {
        [arrow] => *arrow,
        [] => return Err(invalid("no reaction arrow".to_string())),
        _ => return Err(invalid("more than one reaction arrow".to_string())),
    };

    let mut terms: Vec<(&str, f64)> = Vec::new();
    for (side, sign) in [(&tokens[..position], -1.), (&tokens[position + 1..], 1.)] {
        if side.is_empty() {
            continue;
        }
        for term in side.split(|token| *token == "+") {
            let (coefficient, metabolite) = match term {
                [metabolite] => (1., *metabolite),
                [coefficient, metabolite] => match coefficient.parse::<f64>() {
                    Ok(value) if value > 0. && value.is_finite() => (value, *metabolite),
                    _ => return Err(invalid(format!("bad coefficient {}", coefficient))),
                },
                [] => return Err(invalid("empty term".to_string())),
                _ => return Err(invalid(format!("can't read term {}", term.join(" ")))),
            };
            terms.push((metabolite, sign * coefficient));
        }
    }
    Ok((combined_stoichiometry(&IndexMap::new(), &terms, true), direction))
}

/// Check that a pair of bounds is usable: ordered, not NaN, and admitting a finite flux
pub(crate) fn check_bounds(id: &str, lower_bound: f64, upper_bound: f64) -> Result<(), ReactionError> {
    if lower_bound.is_nan()
        || upper_bound.is_nan()
        || lower_bound > upper_bound
        || lower_bound == f64::INFINITY
        || upper_bound == f64::NEG_INFINITY
    {
        return Err(ReactionError::InvalidBounds {
            id: id.to_string(),
            lower_bound,
            upper_bound,
        });
    }
    Ok(())
}

pub(crate) fn check_coefficient(
    reaction: &str,
    metabolite: &str,
    coefficient: f64,
) -> Result<(), ReactionError> {
    if coefficient == 0. || !coefficient.is_finite() {
        return Err(ReactionError::InvalidCoefficient {
            reaction: reaction.to_string(),
            metabolite: metabolite.to_string(),
            coefficient,
        });
    }
    Ok(())
}

/// Errors from editing a reaction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReactionError {
    #[error("Invalid bounds for {id}: ({lower_bound}, {upper_bound}), the lower bound must not exceed the upper bound and a finite flux must lie between them")]
    InvalidBounds {
        id: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    #[error("Invalid coefficient {coefficient} for metabolite {metabolite} in {reaction}, coefficients must be finite and nonzero")]
    InvalidCoefficient {
        reaction: String,
        metabolite: String,
        coefficient: f64,
    },
    #[error("Can't scale {id} by {factor}, the factor must be finite and nonzero")]
    InvalidFactor { id: String, factor: f64 },
    #[error("Invalid reaction equation '{equation}': {reason}")]
    InvalidEquation { equation: String, reason: String },
}
