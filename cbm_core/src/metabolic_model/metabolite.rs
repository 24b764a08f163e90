//! This module provides the metabolite struct representing a metabolite

use std::hash::Hash;

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Represents a metabolite
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metabolite {
    /// Used to identify the metabolite (must be unique)
    #[builder(setter(into))]
    pub id: String,
    /// Human Readable name of the metabolite
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Which compartment the metabolite is in
    #[builder(default = "None")]
    pub compartment: Option<String>,
    /// Electrical charge of the Metabolite
    #[builder(default = "0")]
    pub charge: i32,
    /// Chemical Formula of the metabolite
    #[builder(default = "None")]
    pub formula: Option<String>,
    /// Notes about the metabolite
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Metabolite annotations
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl Hash for Metabolite {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state); // Hash by id
                             // If the metabolite has an associated compartment, also hash by that
        if let Some(ref compartment) = self.compartment {
            compartment.hash(state)
        };
    }
}

impl Metabolite {
    /// Create a new metabolite with only an id
    pub fn new(id: &str) -> Metabolite {
        Metabolite {
            id: id.to_string(),
            name: None,
            compartment: None,
            charge: 0,
            formula: None,
            notes: None,
            annotation: None,
        }
    }

    /// Element counts of the metabolite's formula
    ///
    /// Returns None if the metabolite has no formula, or the formula can't be parsed.
    ///
    /// # Examples
    /// ```rust
    /// use cbm_core::metabolic_model::metabolite::MetaboliteBuilder;
    /// let glucose = MetaboliteBuilder::default()
    ///     .id("glc__D_c")
    ///     .formula(Some("C6H12O6".to_string()))
    ///     .build()
    ///     .unwrap();
    /// let elements = glucose.elements().unwrap();
    /// assert_eq!(elements["C"], 6.);
    /// assert_eq!(elements["H"], 12.);
    /// ```
    pub fn elements(&self) -> Option<IndexMap<String, f64>> {
        parse_formula(self.formula.as_deref()?)
    }
}

/// Parse a chemical formula such as `C6H12O6` into element counts
///
/// A formula is a sequence of element symbols (an upper case letter followed by lower case
/// letters), each optionally followed by a count. A `*` marks an adduct and ends the formula,
/// matching the way curated models write hydrates.
fn parse_formula(formula: &str) -> Option<IndexMap<String, f64>> {
    let formula = formula.split('*').next().unwrap_or("");
    let chars: Vec<char> = formula.chars().collect();
    let mut elements: IndexMap<String, f64> = IndexMap::new();
    let mut position = 0;
    while position < chars.len() {
        if !chars[position].is_ascii_uppercase() {
            return None;
        }
        let start = position;
        position += 1;
        while position < chars.len() && chars[position].is_ascii_lowercase() {
            position += 1;
        }
        let symbol: String = chars[start..position].iter().collect();
        let count_start = position;
        while position < chars.len() && (chars[position].is_ascii_digit() || chars[position] == '.')
        {
            position += 1;
        }
        let count = if count_start == position {
            1.
        } else {
            chars[count_start..position]
                .iter()
                .collect::<String>()
                .parse::<f64>()
                .ok()?
        };
        *elements.entry(symbol).or_insert(0.) += count;
    }
    Some(elements)
}
