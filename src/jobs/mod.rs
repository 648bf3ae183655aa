//! # Jobs
//!
//! Job snapshots, the registry they are read from and the barrier used to
//! await distribution, retraction and search index jobs.

mod barrier;
pub mod errors;
mod job;

pub use barrier::{BarrierOutcome, BarrierResult, CancellationToken, JobBarrier};
pub use errors::{JobError, JobResult};
pub use job::{Job, JobId, JobRegistry, JobStatus};
