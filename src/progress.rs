//! Progress notifications for long-running provider calls.
//!
//! A [`ProgressSink`] is purely observational: the pipeline reports stage
//! transitions and warnings through it, and nothing it does (or fails to
//! do) feeds back into retry or parse decisions.

use std::sync::Arc;
use std::time::Duration;

/// An event emitted by the pipeline for UI feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A provider call or pipeline stage began.
    Started { stage: &'static str },
    /// The stage finished, successfully or not.
    Finished { stage: &'static str },
    /// Periodic "still working" tick while a provider call is in flight.
    Heartbeat {
        stage: &'static str,
        elapsed: Duration,
    },
    /// A non-fatal defect was absorbed (count mismatch, id correction,
    /// bilingual repair, parse retry).
    Warning {
        stage: &'static str,
        message: String,
    },
}

/// Receiver for progress events. No backpressure: implementations must not
/// block.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Default sink that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn notify(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { stage } => tracing::info!(stage, "started"),
            ProgressEvent::Finished { stage } => tracing::info!(stage, "finished"),
            ProgressEvent::Heartbeat { stage, elapsed } => {
                tracing::debug!(stage, ?elapsed, "still waiting on provider")
            }
            ProgressEvent::Warning { stage, message } => tracing::warn!(stage, "{message}"),
        }
    }
}

/// Heartbeat task tied to the scope of a provider call.
///
/// Started before the call, emits a tick every couple of seconds, and is
/// aborted on drop so every exit path (success, failure, timeout) stops
/// the animation.
pub struct HeartbeatGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl HeartbeatGuard {
    const TICK: Duration = Duration::from_secs(2);

    pub fn start(sink: Arc<dyn ProgressSink>, stage: &'static str) -> Self {
        let handle = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut interval = tokio::time::interval(Self::TICK);
            // First tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                sink.notify(ProgressEvent::Heartbeat {
                    stage,
                    elapsed: started.elapsed(),
                });
            }
        });
        Self { handle }
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every event, for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn notify(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_ticks_while_held() {
        let sink = Arc::new(RecordingSink::default());
        let guard = HeartbeatGuard::start(sink.clone(), "generating-tasks");

        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(guard);
        // Give the aborted task a moment to wind down.
        tokio::task::yield_now().await;

        let ticks = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Heartbeat { .. }))
            .count();
        assert!(ticks >= 2, "expected at least 2 heartbeats, got {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_after_drop() {
        let sink = Arc::new(RecordingSink::default());
        let guard = HeartbeatGuard::start(sink.clone(), "expanding-task");
        drop(guard);
        tokio::task::yield_now().await;

        let before = sink.events.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let after = sink.events.lock().unwrap().len();
        assert_eq!(before, after, "heartbeat kept ticking after drop");
    }
}
