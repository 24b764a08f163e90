//! Process wide defaults used when building reactions, problems, and running analyses
use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Default lower flux bound for new reactions
    pub lower_bound: f64,
    /// Default upper flux bound for new reactions
    pub upper_bound: f64,
    /// Numerical tolerance used when comparing fluxes and objective values
    pub tolerance: f64,
    /// Backend used for newly compiled problems
    pub solver: SolverChoice,
    /// Number of worker threads used by batch analyses
    pub processes: usize,
    /// Wall clock limit for a single solve, in seconds
    pub time_limit: Option<f64>,
    /// Iteration limit for a single solve
    pub max_iterations: Option<u32>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-07,
            solver: SolverChoice::Clarabel,
            processes: 1,
            time_limit: None,
            max_iterations: None,
        }
    }
}

impl Configuration {
    /// Get a copy of the current configuration
    ///
    /// A poisoned lock still holds a valid configuration, so it is read anyway.
    pub fn current() -> Configuration {
        match CONFIGURATION.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the current configuration
    pub fn set(configuration: Configuration) {
        match CONFIGURATION.write() {
            Ok(mut config) => *config = configuration,
            Err(poisoned) => *poisoned.into_inner() = configuration,
        }
    }

    /// Default bounds as a `(lower, upper)` pair
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }
}

/// Enum used to specify the default solver to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverChoice {
    /// Use the Clarabel interior point solver
    Clarabel,
    /// Use the microlp simplex solver, requires the microlp feature to be enabled
    Microlp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds() {
        let config = Configuration::default();
        assert_eq!(config.bounds(), (-1000., 1000.));
        assert_eq!(config.solver, SolverChoice::Clarabel);
        assert_eq!(config.processes, 1);
    }
}
