//! # Guarded Stream Transform
//!
//! A pass-through [`futures::Stream`] adapter over an inner chunk stream,
//! driven by the synchronous [`StreamMonitor`](crate::StreamMonitor).
//!
//! ## Concurrency Contract
//!
//! - Chunks exit in the exact order they entered, minus the sliding-window
//!   tail.
//! - The kill switch is a one-way signal: after a terminating violation the
//!   adapter stops polling upstream and yields end-of-stream. No chunk that
//!   arrived at or after the violation is ever emitted, and the retained
//!   tail is discarded.
//! - The violation handler fires exactly once per terminating violation and
//!   once per redacted match.
//! - Backpressure is inherited from poll semantics: when the consumer stops
//!   polling, upstream is not polled and no scanning work happens.
//! - Dropping the adapter before completion (upstream abort) fires no
//!   flush-time violations; the flush scan only runs on clean upstream EOF.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::monitor::{Push, StreamMonitor, StreamViolation};

/// Callback invoked for every observed violation.
pub type ViolationHandler = Box<dyn Fn(&StreamViolation) + Send + Sync>;

/// Pass-through transform with a terminate-on-violation kill switch.
///
/// # Example
///
/// ```rust
/// use aegis_stream::{GuardedStream, StreamConfig, StreamMonitor};
/// use futures::{stream, StreamExt};
///
/// # futures::executor::block_on(async {
/// let config = StreamConfig::default();
/// let inner = stream::iter(vec!["hello ".to_string(), "world".to_string()]);
/// let guarded = GuardedStream::new(inner, StreamMonitor::new(&config));
/// let out: Vec<String> = guarded.collect().await;
/// assert_eq!(out.concat(), "hello world");
/// # });
/// ```
pub struct GuardedStream<S> {
    inner: S,
    monitor: StreamMonitor,
    handlers: Vec<ViolationHandler>,
    done: bool,
}

impl<S> GuardedStream<S> {
    /// Wrap `inner` with the given monitor.
    #[must_use]
    pub fn new(inner: S, monitor: StreamMonitor) -> Self {
        Self {
            inner,
            monitor,
            handlers: Vec::new(),
            done: false,
        }
    }

    /// Register a violation callback (builder style). Multiple handlers are
    /// invoked in registration order.
    #[must_use]
    pub fn on_violation(
        mut self,
        handler: impl Fn(&StreamViolation) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Register a violation callback on an existing adapter.
    pub fn add_violation_handler(
        &mut self,
        handler: impl Fn(&StreamViolation) + Send + Sync + 'static,
    ) {
        self.handlers.push(Box::new(handler));
    }

    /// True once the kill switch has fired.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.monitor.is_terminated()
    }

    fn dispatch(&self, push: &Push) {
        for violation in &push.violations {
            for handler in &self.handlers {
                handler(violation);
            }
        }
    }
}

impl<S> Stream for GuardedStream<S>
where
    S: Stream<Item = String> + Unpin,
{
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(chunk)) => {
                    let push = this.monitor.push(&chunk);
                    this.dispatch(&push);
                    if this.monitor.is_terminated() {
                        this.done = true;
                        return Poll::Ready(None);
                    }
                    if !push.emitted.is_empty() {
                        return Poll::Ready(Some(push.emitted));
                    }
                    // Chunk fully absorbed into the window tail; pull more.
                }
                Poll::Ready(None) => {
                    let push = this.monitor.finish();
                    this.dispatch(&push);
                    this.done = true;
                    if this.monitor.is_terminated() || push.emitted.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(push.emitted));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S> std::fmt::Debug for GuardedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedStream")
            .field("monitor", &self.monitor)
            .field("handlers", &self.handlers.len())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::StreamConfig;
    use futures::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunks(parts: &[&str]) -> impl Stream<Item = String> + Unpin {
        stream::iter(parts.iter().map(|s| (*s).to_string()).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_clean_stream_passes() {
        let guarded = GuardedStream::new(
            chunks(&["hello ", "streaming ", "world"]),
            StreamMonitor::new(&StreamConfig::default()),
        );
        let out: Vec<String> = guarded.collect().await;
        assert_eq!(out.concat(), "hello streaming world");
    }

    #[tokio::test]
    async fn test_kill_switch_ends_stream() {
        let config = StreamConfig {
            canaries: vec!["AEGIS_CANARY_abc123".to_string()],
            ..StreamConfig::default()
        };
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let guarded = GuardedStream::new(
            chunks(&["Sure, ", "the secret is ", "AEGIS_CANARY_abc123", " done"]),
            StreamMonitor::new(&config),
        )
        .on_violation(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let out: Vec<String> = guarded.collect().await;
        assert!(!out.concat().contains("AEGIS_CANARY_abc123"));
        assert_eq!(fired.load(Ordering::SeqCst), 1, "handler fires exactly once");
    }

    #[tokio::test]
    async fn test_redaction_mode_stream_completes() {
        let config = StreamConfig {
            pii_redaction: true,
            ..StreamConfig::default()
        };
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = Arc::clone(&observed);

        let guarded = GuardedStream::new(
            chunks(&["SSN: ", "123-45-6789", " on file"]),
            StreamMonitor::new(&config),
        )
        .on_violation(move |v| {
            assert_eq!(v.label, "SSN");
            observed_clone.fetch_add(1, Ordering::SeqCst);
        });

        let out: Vec<String> = guarded.collect().await;
        let text = out.concat();
        assert_eq!(text, "SSN: [REDACTED-SSN] on file");
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let parts: Vec<String> = (0..50).map(|i| format!("part{i} ")).collect();
        let expected = parts.concat();
        let guarded = GuardedStream::new(
            stream::iter(parts),
            StreamMonitor::new(&StreamConfig::default()),
        );
        let out: Vec<String> = guarded.collect().await;
        assert_eq!(out.concat(), expected);
    }

    #[tokio::test]
    async fn test_abort_fires_no_flush_violations() {
        // Redaction mode with PII that only the clean-EOF flush would
        // report: dropping the adapter before polling is the abort path,
        // and it must fire nothing.
        let config = StreamConfig {
            pii_redaction: true,
            ..StreamConfig::default()
        };
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let guarded = GuardedStream::new(
            chunks(&["tail only 123-45-6789"]),
            StreamMonitor::new(&config),
        )
        .on_violation(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        drop(guarded);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_emitted_count_frozen_after_termination() {
        let config = StreamConfig {
            canaries: vec!["KILL_TOKEN_xyz".to_string()],
            ..StreamConfig::default()
        };
        let mut guarded = GuardedStream::new(
            chunks(&["ok ", "KILL_TOKEN_xyz", " never", " ever"]),
            StreamMonitor::new(&config),
        );
        let mut items = 0;
        while guarded.next().await.is_some() {
            items += 1;
        }
        // Stream ended; further polls stay ended.
        assert!(guarded.next().await.is_none());
        assert!(guarded.is_terminated());
        assert_eq!(items, 0, "everything was inside the retained tail");
    }
}
