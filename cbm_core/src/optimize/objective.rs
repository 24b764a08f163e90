//! Provides struct for representing an optimization problem's objective

use serde::{Deserialize, Serialize};

/// Represents the Objective of an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Terms included in the objective (See [`ObjectiveTerm`])
    pub(crate) terms: Vec<ObjectiveTerm>,
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    pub(crate) sense: ObjectiveSense,
}

impl Objective {
    /// Create a new empty objective, with a given sense
    pub fn new(sense: ObjectiveSense) -> Self {
        Self {
            terms: Vec::new(),
            sense,
        }
    }

    /// Create a new empty maximization objective
    pub fn new_maximize() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new empty minimization objective
    pub fn new_minimize() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    /// Sense of the objective
    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Change the sense of the objective
    pub fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    /// Terms of the objective
    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    /// Add a new term to the objective
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.terms.push(term);
    }

    /// Add a new Linear term to the objective
    pub fn add_linear_term(&mut self, variable: &str, coefficient: f64) {
        self.terms
            .push(ObjectiveTerm::new_linear(variable, coefficient));
    }

    /// Add a new Quadratic term to the objective
    pub fn add_quadratic_term(&mut self, variable1: &str, variable2: &str, coefficient: f64) {
        self.terms
            .push(ObjectiveTerm::new_quadratic(variable1, variable2, coefficient));
    }

    /// Remove all terms from the objective
    pub fn remove_all_terms(&mut self) {
        self.terms.clear();
    }

    /// Remove every term involving `variable_id`
    pub fn remove_terms_with_variable(&mut self, variable_id: &str) {
        self.terms.retain(|term| !term.involves(variable_id));
    }

    /// Whether any term is quadratic
    pub fn contains_quadratic(&self) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, ObjectiveTerm::Quadratic { .. }))
    }

    /// Whether the objective has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl ObjectiveSense {
    /// The opposite sense
    pub fn flip(self) -> Self {
        match self {
            ObjectiveSense::Minimize => ObjectiveSense::Maximize,
            ObjectiveSense::Maximize => ObjectiveSense::Minimize,
        }
    }
}

// region Objective Terms
/// A term in the objective
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveTerm {
    /// A quadratic term in the objective, `coef * var1 * var2`
    Quadratic {
        /// First variable in the objective term
        var1: String,
        /// Second variable in the objective term
        var2: String,
        /// Coefficient for quadratic term
        coef: f64,
    },
    /// A linear term in the objective, `coef * var`
    Linear {
        /// Variable in objective term
        var: String,
        /// Coefficient for linear term
        coef: f64,
    },
}

impl ObjectiveTerm {
    /// Create a new quadratic objective term
    pub fn new_quadratic(var1: &str, var2: &str, coef: f64) -> Self {
        ObjectiveTerm::Quadratic {
            var1: var1.to_string(),
            var2: var2.to_string(),
            coef,
        }
    }

    /// Create a new linear objective term
    pub fn new_linear(var: &str, coef: f64) -> Self {
        ObjectiveTerm::Linear {
            var: var.to_string(),
            coef,
        }
    }

    /// Whether the term references `variable_id`
    pub fn involves(&self, variable_id: &str) -> bool {
        match self {
            ObjectiveTerm::Linear { var, .. } => var == variable_id,
            ObjectiveTerm::Quadratic { var1, var2, .. } => var1 == variable_id || var2 == variable_id,
        }
    }
}

// endregion Objective Terms

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_terms() {
        let mut objective = Objective::new_maximize();
        objective.add_linear_term("x", 1.);
        objective.add_quadratic_term("x", "y", 2.);
        objective.add_linear_term("y", 3.);
        assert!(objective.contains_quadratic());
        objective.remove_terms_with_variable("x");
        assert_eq!(objective.terms(), &[ObjectiveTerm::new_linear("y", 3.)]);
        assert!(!objective.contains_quadratic());
        objective.remove_all_terms();
        assert!(objective.is_empty());
    }

    #[test]
    fn flip_sense() {
        assert_eq!(ObjectiveSense::Maximize.flip(), ObjectiveSense::Minimize);
        assert_eq!(Objective::new_minimize().sense().flip(), ObjectiveSense::Maximize);
    }
}
