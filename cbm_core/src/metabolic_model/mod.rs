//! Entities of a metabolic model and the Model container holding them

pub mod context;
pub mod gene;
pub mod gpr;
pub mod metabolite;
pub mod model;
pub mod reaction;
