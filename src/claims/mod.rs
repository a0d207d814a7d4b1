pub mod book;
pub mod domain;
pub mod workflow;

pub use book::ClaimBook;
pub use domain::{answer_matches, ClaimDetail, ClaimRole, Decision, TransitionError};
pub use workflow::{watch_my_claims, ClaimWorkflow, DynClaimWorkflow, SqliteClaimWorkflow};
