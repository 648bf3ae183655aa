//! # Transitions
//!
//! Scheduled ACL changes, their persistence, the bounded retry policy and
//! the periodic pass applying them.
//!
//! ```text
//! SCHEDULED --(application date reached)--> APPLYING --> DONE
//!                                              |
//!                                              +--(attempts exhausted)--> ABANDONED
//! ```

mod model;
mod query;
mod retry;
mod scanner;
mod store;

pub use model::{
    EpisodeAclTransition, NewEpisodeTransition, NewSeriesTransition, SeriesAclTransition,
    TransitionId, TransitionResult,
};
pub use query::TransitionQuery;
pub use retry::{RetryPolicy, RetryState};
pub use scanner::{ScanReport, TransitionScanner};
pub use store::{FileTransitionStore, MemTransitionStore, TransitionStore};
