//! SQLite persistence for the candidate roster.

mod model;
mod repository;

pub use model::{CandidateDB, NewCandidateDB};
pub use repository::CandidateRepository;
