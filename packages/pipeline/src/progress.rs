//! Progress reporting for pipeline stages.
//!
//! The pipeline only reports through [`ProgressCallback`], so it never
//! depends on a rendering backend. The CLI plugs in an `indicatif` bar;
//! callers that pass nothing get [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from the point join.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of points about to be joined.
    fn set_total(&self, total: u64);

    /// Advances by `delta` points.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the stage complete with a closing message.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
