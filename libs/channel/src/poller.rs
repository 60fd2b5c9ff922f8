//! Idle-cycle event polling.

/// Callback the writer loop runs when the exchanger comes up empty. A poll
/// that performs work (returns `true`) suppresses the backoff pause for that
/// iteration, since the work may have produced new output to drain.
///
/// The channel owns its poller and drops it when the writer loop exits.
pub trait EventPoller: Send {
    fn on_poll(&mut self) -> bool;
}

impl<F: FnMut() -> bool + Send> EventPoller for F {
    fn on_poll(&mut self) -> bool {
        self()
    }
}
