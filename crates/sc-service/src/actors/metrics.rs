//! Peer actor metrics and mailbox monitoring.
//!
//! | Mailbox depth | Level    |
//! |---------------|----------|
//! | <= 8          | Normal   |
//! | 9-32          | Warning  |
//! | > 32          | Critical |
//!
//! A deep peer mailbox means one client is issuing joins/leaves faster than
//! the cluster can answer them.

use crate::observability::metrics;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for peer actors.
pub const PEER_MAILBOX_NORMAL: usize = 8;
pub const PEER_MAILBOX_WARNING: usize = 32;

const ACTOR_TYPE: &str = "peer";

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// At or below the normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above the warning threshold.
    Critical,
}

impl MailboxLevel {
    #[must_use]
    pub const fn for_depth(depth: usize) -> Self {
        if depth > PEER_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > PEER_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Tracks the mailbox of one peer actor.
///
/// Owned by the actor; depth is sampled from the channel each time a message
/// is taken off it.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record the number of messages still queued behind the one just received.
    pub fn observe(&self, depth: usize) {
        let previous = self.depth.swap(depth, Ordering::Relaxed);
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
        metrics::set_actor_mailbox_depth(ACTOR_TYPE, depth);

        match MailboxLevel::for_depth(depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "sc.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth,
                    threshold = PEER_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into the warning band
            MailboxLevel::Warning if previous <= PEER_MAILBOX_NORMAL => {
                debug!(
                    target: "sc.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message as fully handled.
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        MailboxLevel::for_depth(self.current_depth())
    }
}

/// Counters shared by every peer actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    active_actors: AtomicUsize,
    actors_spawned: AtomicU64,
    total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn actor_started(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
        let active = self.active_actors.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_peer_actors_active(active);
    }

    pub fn actor_stopped(&self) {
        let active = self
            .active_actors
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        metrics::set_peer_actors_active(active);
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn active_actors(&self) -> usize {
        self.active_actors.load(Ordering::Relaxed)
    }

    /// Actors spawned since start, including respawns after idle exit.
    #[must_use]
    pub fn actors_spawned(&self) -> u64 {
        self.actors_spawned.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_messages_processed(&self) -> u64 {
        self.total_messages_processed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_levels() {
        assert_eq!(MailboxLevel::for_depth(0), MailboxLevel::Normal);
        assert_eq!(MailboxLevel::for_depth(8), MailboxLevel::Normal);
        assert_eq!(MailboxLevel::for_depth(9), MailboxLevel::Warning);
        assert_eq!(MailboxLevel::for_depth(32), MailboxLevel::Warning);
        assert_eq!(MailboxLevel::for_depth(33), MailboxLevel::Critical);
    }

    #[test]
    fn test_mailbox_monitor_tracks_peak() {
        let monitor = MailboxMonitor::new("r1/u1");

        monitor.observe(3);
        monitor.observe(12);
        monitor.observe(1);

        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 12);
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        monitor.observe(40);
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_mailbox_monitor_counts_processed() {
        let monitor = MailboxMonitor::new("r1/u1");
        monitor.record_processed();
        monitor.record_processed();
        assert_eq!(monitor.messages_processed(), 2);
    }

    #[test]
    fn test_actor_metrics_lifecycle() {
        let metrics = ActorMetrics::new();

        metrics.actor_started();
        metrics.actor_started();
        assert_eq!(metrics.active_actors(), 2);

        metrics.actor_stopped();
        assert_eq!(metrics.active_actors(), 1);
        assert_eq!(metrics.actors_spawned(), 2);

        metrics.record_message_processed();
        assert_eq!(metrics.total_messages_processed(), 1);
    }
}
