//! Constraint based metabolic modeling
//!
//! A [`Model`](metabolic_model::model::Model) holds metabolites, reactions, and genes. It is
//! compiled into a solver independent optimization [`Problem`](optimize::problem::Problem),
//! solved by one of the backends in [`optimize::solvers`], and analysed with the algorithms
//! in [`flux_analysis`]. Temporary edits go through a
//! [`ModelScope`](metabolic_model::context::ModelScope) which reverts them when dropped.

pub mod configuration;
pub mod flux_analysis;
pub mod metabolic_model;
pub mod optimize;
pub mod solution;
#[cfg(test)]
mod test_models;
mod utils;
