//! Small helpers shared by the analysis modules
pub(crate) mod hashing;
pub(crate) mod parallel;
