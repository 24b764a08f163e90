//! Gene Protein Reaction rules: the [`Gpr`] expression tree, its evaluation, and the parser
//! converting rule strings such as `(b0001 or b0002) and b0003` into trees
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lexer::{Lexer, LexerError};
use parser::{GprParser, ParseError};

pub mod lexer;
pub mod parser;
mod token;

/// Representation of a Gene Protein Reaction Rule as an AST
///
/// Nodes built through [`Gpr::and`] and [`Gpr::or`] are normalized: an operation never holds
/// a single operand, and never directly holds an operation of the same kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Gpr {
    /// A terminal gene node, holding the gene id
    Gene(String),
    /// Active only if every operand is active (e.g. an enzyme complex)
    And(Vec<Gpr>),
    /// Active if any operand is active (e.g. isozymes)
    Or(Vec<Gpr>),
}

impl Gpr {
    /// Create a conjunction of `operands`
    pub fn and(operands: Vec<Gpr>) -> Gpr {
        Gpr::normalize(operands, true)
    }

    /// Create a disjunction of `operands`
    pub fn or(operands: Vec<Gpr>) -> Gpr {
        Gpr::normalize(operands, false)
    }

    fn normalize(operands: Vec<Gpr>, conjunction: bool) -> Gpr {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Gpr::And(inner) if conjunction => flat.extend(inner),
                Gpr::Or(inner) if !conjunction => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.pop().unwrap_or_else(|| Gpr::Or(Vec::new()));
        }
        if conjunction {
            Gpr::And(flat)
        } else {
            Gpr::Or(flat)
        }
    }

    /// Evaluate the rule, using `gene_active` to decide whether each gene is functional
    pub fn eval_with<F>(&self, gene_active: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match self {
            Gpr::Gene(id) => gene_active(id),
            Gpr::And(operands) => operands.iter().all(|op| op.eval_with(gene_active)),
            Gpr::Or(operands) => operands.iter().any(|op| op.eval_with(gene_active)),
        }
    }

    /// Evaluate whether the reaction governed by this rule is still functional when the genes
    /// in `inactive_genes` are knocked out
    pub fn eval(&self, inactive_genes: &HashSet<String>) -> bool {
        self.eval_with(&|gene: &str| !inactive_genes.contains(gene))
    }

    /// Ids of every gene in the rule, in order of first appearance
    pub fn genes(&self) -> IndexSet<&str> {
        let mut genes = IndexSet::new();
        self.collect_genes(&mut genes);
        genes
    }

    fn collect_genes<'a>(&'a self, genes: &mut IndexSet<&'a str>) {
        match self {
            Gpr::Gene(id) => {
                genes.insert(id.as_str());
            }
            Gpr::And(operands) | Gpr::Or(operands) => {
                operands.iter().for_each(|op| op.collect_genes(genes));
            }
        }
    }

    /// Whether the gene `gene_id` appears in the rule
    pub fn contains_gene(&self, gene_id: &str) -> bool {
        match self {
            Gpr::Gene(id) => id == gene_id,
            Gpr::And(operands) | Gpr::Or(operands) => {
                operands.iter().any(|op| op.contains_gene(gene_id))
            }
        }
    }

    /// Create a copy of the rule as if `gene_id` had never been part of it
    ///
    /// Returns None if nothing is left of the rule.
    pub fn without_gene(&self, gene_id: &str) -> Option<Gpr> {
        match self {
            Gpr::Gene(id) if id == gene_id => None,
            Gpr::Gene(_) => Some(self.clone()),
            Gpr::And(operands) | Gpr::Or(operands) => {
                let remaining: Vec<Gpr> = operands
                    .iter()
                    .filter_map(|op| op.without_gene(gene_id))
                    .collect();
                if remaining.is_empty() {
                    return None;
                }
                Some(match self {
                    Gpr::And(_) => Gpr::and(remaining),
                    _ => Gpr::or(remaining),
                })
            }
        }
    }

    fn fmt_operands(f: &mut Formatter<'_>, operands: &[Gpr], separator: &str) -> std::fmt::Result {
        for (position, operand) in operands.iter().enumerate() {
            if position > 0 {
                f.write_str(separator)?;
            }
            match operand {
                Gpr::Gene(id) => f.write_str(id)?,
                _ => write!(f, "({})", operand)?,
            }
        }
        Ok(())
    }
}

impl Display for Gpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Gpr::Gene(id) => f.write_str(id),
            Gpr::And(operands) => Gpr::fmt_operands(f, operands, " and "),
            Gpr::Or(operands) => Gpr::fmt_operands(f, operands, " or "),
        }
    }
}

impl From<Gpr> for String {
    fn from(gpr: Gpr) -> Self {
        gpr.to_string()
    }
}

impl TryFrom<String> for Gpr {
    type Error = GprParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_gpr(&value)?.ok_or(GprParseError::Empty)
    }
}

/// Parse a Gene Protein Reaction string into a GPR Tree
///
/// # Parameters
/// - `input`: &str representing the gene protein reaction rule
///
/// # Returns
/// - `Ok(Some(gpr))`: the root node of the GPR tree
/// - `Ok(None)`: the rule was blank, meaning the reaction is always active
/// - `Err`: the GprParseError describing the issue with the rule
///
/// # Examples
/// ```rust
/// use cbm_core::metabolic_model::gpr::{parse_gpr, Gpr};
/// let gpr = parse_gpr("Rv0001 and Rv0002").unwrap().unwrap();
/// assert_eq!(gpr.to_string(), "Rv0001 and Rv0002");
/// assert!(parse_gpr("  ").unwrap().is_none());
/// ```
pub fn parse_gpr(input: &str) -> Result<Option<Gpr>, GprParseError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    let tokens = Lexer::new(input).lex()?;
    let gpr = GprParser::new(tokens).parse()?;
    Ok(Some(gpr))
}

/// Enum representing possible lex and parse errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GprParseError {
    /// Lexing Error
    #[error("Error occurred during lexing (conversion of GPR string to tokens): {0}")]
    LexingError(#[from] LexerError),
    /// Parsing Error
    #[error("Error occurred during parsing (conversion of tokens to GPR tree): {0}")]
    ParsingError(#[from] ParseError),
    /// A rule was required but the string was blank
    #[error("Expected a GPR rule but found an empty string")]
    Empty,
}
