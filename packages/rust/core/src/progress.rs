//! Run progress callbacks.

use prospector_shared::{CompanyResult, RunReport};

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// A batch of `size` companies is starting; `completed` finished so far.
    fn batch_started(&self, batch: usize, size: usize, completed: usize, total: usize);
    /// One company finished (any status).
    fn company_finished(&self, result: &CompanyResult, completed: usize, total: usize);
    /// Called once when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn batch_started(&self, _batch: usize, _size: usize, _completed: usize, _total: usize) {}
    fn company_finished(&self, _result: &CompanyResult, _completed: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}
