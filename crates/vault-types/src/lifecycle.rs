//! Lifecycle tracker: milestone timestamps to job status.

use chrono::{DateTime, Utc};

use crate::job::{JobResult, JobStatus};

/// Derives a job's status and result from its protocol milestones.
///
/// Precedence: a failure wins over everything, no milestone at all means
/// the other party still has to act, a completion means success, and an
/// approval alone means the run is in progress.
///
/// Used identically for credential (`issued`) and proof (`verified`)
/// completions.
pub fn derive_status(
    approved: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    failed: Option<DateTime<Utc>>,
) -> (JobStatus, JobResult) {
    if failed.is_some() {
        return (JobStatus::Completed, JobResult::Failure);
    }
    match (approved, completed) {
        (None, None) => (JobStatus::Pending, JobResult::None),
        (_, Some(_)) => (JobStatus::Completed, JobResult::Success),
        (Some(_), None) => (JobStatus::Waiting, JobResult::None),
    }
}

/// Status a credential or proof job starts in.
pub fn initial_status(initiated_by_us: bool) -> JobStatus {
    if initiated_by_us {
        JobStatus::Waiting
    } else {
        JobStatus::Pending
    }
}
