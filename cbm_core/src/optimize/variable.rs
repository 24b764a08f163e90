//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

/// A decision variable of an optimization problem
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Variable {
    /// Used to identify the variable, must be unique within a problem
    #[builder(setter(into))]
    pub id: String,
    /// Optional human readable name
    #[builder(setter(into, strip_option), default = "None")]
    pub name: Option<String>,
    /// Type of the variable, see [`VariableType`]
    #[builder(default = "VariableType::Continuous")]
    pub variable_type: VariableType,
    /// Lowest value the variable can take
    #[builder(default = "f64::NEG_INFINITY")]
    pub lower_bound: f64,
    /// Highest value the variable can take
    #[builder(default = "f64::INFINITY")]
    pub upper_bound: f64,
    /// Position of the variable's column in the problem, assigned by the problem
    #[builder(setter(skip))]
    pub(crate) index: usize,
}

impl VariableBuilder {
    fn validate(&self) -> Result<(), String> {
        let lower_bound = self.lower_bound.unwrap_or(f64::NEG_INFINITY);
        let upper_bound = self.upper_bound.unwrap_or(f64::INFINITY);
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(format!(
                "Invalid variable bounds: {} > {}",
                lower_bound, upper_bound
            ));
        }
        Ok(())
    }
}

impl Variable {
    /// Position of the variable's column in its problem
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the variable is fixed to a single value
    pub fn is_fixed(&self) -> bool {
        self.lower_bound == self.upper_bound
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", name, self.variable_type),
            None => write!(f, "{}:{}", self.id, self.variable_type),
        }
    }
}

/// Represents the type of variable in an optimization problem
///
/// # Notes:
/// Not all variable types are supported for all solvers, currently both bundled solvers
/// only support Continuous variables
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq)]
pub enum VariableType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary Variable
    Binary,
}

impl Display for VariableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "CONTINUOUS"),
            VariableType::Integer => write!(f, "INTEGER"),
            VariableType::Binary => write!(f, "BINARY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let x = VariableBuilder::default().id("x").build().unwrap();
        assert_eq!(x.lower_bound, f64::NEG_INFINITY);
        assert_eq!(x.upper_bound, f64::INFINITY);
        assert_eq!(x.variable_type, VariableType::Continuous);
        assert_eq!(x.to_string(), "x:CONTINUOUS");
    }

    #[test]
    fn builder_validates_bounds() {
        assert!(VariableBuilder::default()
            .id("x")
            .lower_bound(2.)
            .upper_bound(1.)
            .build()
            .is_err());
        let fixed = VariableBuilder::default()
            .id("y")
            .name("fixed")
            .lower_bound(1.)
            .upper_bound(1.)
            .build()
            .unwrap();
        assert!(fixed.is_fixed());
        assert_eq!(fixed.to_string(), "fixed:CONTINUOUS");
    }
}
