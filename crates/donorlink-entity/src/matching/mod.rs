//! Match domain entities.

pub mod completion;
pub mod model;
pub mod party;
pub mod status;

pub use completion::CompletionDetails;
pub use model::{GRACE_PERIOD_MINUTES, MatchResult, grace_period};
pub use party::{MatchRole, Party};
pub use status::MatchStatus;
