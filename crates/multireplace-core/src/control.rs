//! Cooperative cancellation and progress reporting.
//!
//! Everything in this crate runs on the caller's thread. Long operations
//! (scanning a huge document, replacing across many matches) are broken into
//! chunks; between chunks the engine reports progress and polls a shared
//! cancel flag. Cancellation stops the remaining work but keeps edits that
//! were already applied; there is no rollback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which phase of a pass is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Delimiter scan of the document.
    Scan,
    /// Match enumeration.
    Match,
    /// Applying replacements.
    Replace,
    /// Reordering lines for a column sort.
    Sort,
}

/// A progress report delivered between work chunks.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// The phase being reported.
    pub stage: Stage,
    /// Units completed so far (lines for [`Stage::Scan`]/[`Stage::Sort`],
    /// matches otherwise).
    pub current: usize,
    /// Total units, if known up front (0 when unknown).
    pub total: usize,
}

/// Shared cancel flag.
///
/// Clone a handle and hand it to whatever drives the UI; calling
/// [`CancelFlag::cancel`] makes the in-progress pass stop at its next chunk
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, un-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`CancelFlag::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag so the session can run another pass.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Number of work units processed between progress/cancel checks.
pub(crate) const CHUNK_SIZE: usize = 1024;

/// Per-pass control block: cancel flag plus an optional progress sink.
pub struct PassControl<'a> {
    /// Cancel flag polled at chunk boundaries.
    pub cancel: CancelFlag,
    /// Progress callback, if the caller wants reports.
    pub progress: Option<&'a mut dyn FnMut(Progress)>,
}

impl Default for PassControl<'_> {
    fn default() -> Self {
        Self {
            cancel: CancelFlag::new(),
            progress: None,
        }
    }
}

impl<'a> PassControl<'a> {
    /// Control block with a caller-held cancel flag and no progress sink.
    pub fn with_cancel(cancel: CancelFlag) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Control block that reports progress to `sink`.
    pub fn with_progress(cancel: CancelFlag, sink: &'a mut dyn FnMut(Progress)) -> Self {
        Self {
            cancel,
            progress: Some(sink),
        }
    }

    /// Returns `true` if the pass should stop at this chunk boundary.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn report(&mut self, stage: Stage, current: usize, total: usize) {
        if let Some(sink) = self.progress.as_mut() {
            sink(Progress {
                stage,
                current,
                total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_progress_sink_receives_reports() {
        let mut seen = Vec::new();
        let mut sink = |p: Progress| seen.push((p.current, p.total));
        let mut ctl = PassControl::with_progress(CancelFlag::new(), &mut sink);
        ctl.report(Stage::Scan, 10, 100);
        ctl.report(Stage::Scan, 20, 100);
        drop(ctl);
        assert_eq!(seen, vec![(10, 100), (20, 100)]);
    }
}
