//! Candidate domain models and repository contract.

mod candidate_model;

pub use candidate_model::*;
