//! Calculation policy and resolver configuration.

pub mod v1;
pub mod resolver;

pub use v1::{CalculationPolicyV1, NadiTableVersion};
pub use resolver::ResolverConfig;
