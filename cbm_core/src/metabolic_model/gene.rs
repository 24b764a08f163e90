//! This module provides the Gene struct, representing a gene
use std::fmt::{Display, Formatter};
use std::hash::Hash;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Structure Representing a Gene
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    /// Used to identify the gene
    #[builder(setter(into))]
    pub id: String,
    /// Human Readable Gene Name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Whether this gene is currently functional (see [`GeneActivity`])
    #[builder(default = "GeneActivity::Active")]
    pub activity: GeneActivity,
    /// Notes about the gene
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Gene Annotations
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl Gene {
    /// Create a new functional gene with only an id
    pub fn new(id: &str) -> Gene {
        Gene {
            id: id.to_string(),
            name: None,
            activity: GeneActivity::Active,
            notes: None,
            annotation: None,
        }
    }

    /// Whether the gene is currently functional
    pub fn is_functional(&self) -> bool {
        self.activity == GeneActivity::Active
    }
}

impl Display for Gene {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Hash for Gene {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.activity.hash(state);
    }
}

/// Whether a gene is active or not
#[derive(Clone, Debug, Hash, Eq, PartialEq, Copy, Serialize, Deserialize)]
pub enum GeneActivity {
    /// Gene is considered active
    Active,
    /// Gene is considered inactive (knocked out)
    Inactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let gene = GeneBuilder::default().id("b0001").build().unwrap();
        assert_eq!(gene, Gene::new("b0001"));
        assert!(gene.is_functional());
        assert_eq!(format!("{}", gene), "b0001");
    }

    #[test]
    fn builder_requires_id() {
        assert!(GeneBuilder::default().build().is_err());
    }
}
