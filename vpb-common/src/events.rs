//! Event types for the VPB event system
//!
//! Provides the shared `PlayerEvent` definitions and the `EventBus` used by
//! the playback bridge and its host application.
//!
//! # Architecture
//!
//! VPB uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting toward
//!   the host application
//! - **Shared state** (Arc + lock): read-heavy access to catalogs
//!
//! Events originating on the native engine's callback thread are emitted
//! through the bus without blocking; slow subscribers never stall producers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Reconciled playback state derived from the native engine's signals
///
/// A single ordered value computed from the engine's independent pause /
/// idle / end-of-file reports. See the playback state machine for the
/// precedence rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Uninitialized,
    Loading,
    Idle,
    Playing,
    Paused,
    Seeking,
    Ended,
    Error,
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayState::Uninitialized => write!(f, "uninitialized"),
            PlayState::Loading => write!(f, "loading"),
            PlayState::Idle => write!(f, "idle"),
            PlayState::Playing => write!(f, "playing"),
            PlayState::Paused => write!(f, "paused"),
            PlayState::Seeking => write!(f, "seeking"),
            PlayState::Ended => write!(f, "ended"),
            PlayState::Error => write!(f, "error"),
        }
    }
}

/// VPB event types
///
/// Events are broadcast via the EventBus and can be serialized for
/// transmission to out-of-process consumers. All bridge notifications use
/// this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Reconciled playback state changed
    ///
    /// Triggers:
    /// - UI: update transport controls
    /// - Platform integration: update media-session state
    PlayStateChanged {
        /// State before the change
        old_state: PlayState,
        /// State after the change
        new_state: PlayState,
        /// When the state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback became active for the first time for this item
    ///
    /// Fires exactly once per item, on the first transition into the
    /// not-paused and not-idle conjunction, regardless of the order in which
    /// the two underlying signals settle.
    PlaybackPrepared {
        /// Item the session associated with the current load, if any
        item_id: Option<Uuid>,
        /// When playback became active
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current item played to its natural end
    PlaybackCompleted {
        /// Item that completed, if known
        item_id: Option<Uuid>,
        /// When end-of-file was reached
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session-fatal playback error occurred
    ///
    /// No automatic retry is performed; the session requires explicit
    /// reinitialization.
    PlaybackError {
        /// Human-readable error description
        message: String,
        /// When the error was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted periodically by the session's progress poll while a file is
    /// loaded. Not persisted; purely informational.
    PlaybackProgress {
        /// Current playback position (milliseconds)
        position_ms: u64,
        /// Buffered-ahead position (milliseconds)
        buffered_ms: u64,
        /// Total duration (milliseconds, 0 when unknown)
        duration_ms: u64,
        /// When the sample was taken
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The engine reconfigured its video output
    VideoSizeChanged {
        /// New video width in pixels
        width: i64,
        /// New video height in pixels
        height: i64,
        /// When the reconfiguration was reported
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The track catalog was rebuilt from the engine inventory
    TracksChanged {
        /// Number of video tracks in the new catalog
        video_count: usize,
        /// Number of audio tracks in the new catalog
        audio_count: usize,
        /// Number of subtitle tracks in the new catalog
        subtitle_count: usize,
        /// When the catalog was replaced
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current chapter changed
    ChapterChanged {
        /// New chapter index, -1 when unknown/none
        index: i64,
        /// When the change was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A skip-action segment was crossed and playback jumped past it
    SegmentSkipped {
        /// Segment identity
        segment_id: Uuid,
        /// Position playback was moved to (milliseconds)
        skipped_to_ms: u64,
        /// When the skip was performed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An ask-to-skip segment was crossed; the host should prompt the user
    SegmentSkipPrompt {
        /// Segment identity
        segment_id: Uuid,
        /// Segment start (milliseconds)
        start_ms: u64,
        /// Segment end, the position a confirmed skip should seek to
        /// (milliseconds)
        end_ms: u64,
        /// When the prompt became due
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            PlayerEvent::PlayStateChanged { .. } => "PlayStateChanged",
            PlayerEvent::PlaybackPrepared { .. } => "PlaybackPrepared",
            PlayerEvent::PlaybackCompleted { .. } => "PlaybackCompleted",
            PlayerEvent::PlaybackError { .. } => "PlaybackError",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
            PlayerEvent::VideoSizeChanged { .. } => "VideoSizeChanged",
            PlayerEvent::TracksChanged { .. } => "TracksChanged",
            PlayerEvent::ChapterChanged { .. } => "ChapterChanged",
            PlayerEvent::SegmentSkipped { .. } => "SegmentSkipped",
            PlayerEvent::SegmentSkipPrompt { .. } => "SegmentSkipPrompt",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for bridge-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use vpb_common::events::{EventBus, PlayerEvent, PlayState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(PlayerEvent::PlayStateChanged {
///     old_state: PlayState::Paused,
///     new_state: PlayState::Playing,
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Used for notifications where it is acceptable that no component is
    /// currently subscribed (progress updates, chapter ticks).
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);
        let event = PlayerEvent::PlayStateChanged {
            old_state: PlayState::Paused,
            new_state: PlayState::Playing,
            timestamp: chrono::Utc::now(),
        };

        // Should return error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[test]
    fn test_eventbus_emit_with_subscriber() {
        let bus = Arc::new(EventBus::new(100));
        let mut rx = bus.subscribe();

        let event = PlayerEvent::PlayStateChanged {
            old_state: PlayState::Loading,
            new_state: PlayState::Playing,
            timestamp: chrono::Utc::now(),
        };

        assert!(bus.emit(event).is_ok());

        let received = rx.try_recv().expect("Should receive event");
        match received {
            PlayerEvent::PlayStateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlayState::Loading);
                assert_eq!(new_state, PlayState::Playing);
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[test]
    fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(2); // Small capacity
        let mut _rx = bus.subscribe(); // Subscribe but don't receive

        // Overfill the channel; must not panic
        for i in 0..10u64 {
            bus.emit_lossy(PlayerEvent::PlaybackProgress {
                position_ms: i * 1000,
                buffered_ms: i * 1000 + 500,
                duration_ms: 60_000,
                timestamp: chrono::Utc::now(),
            });
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = Arc::new(EventBus::new(10));
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(PlayerEvent::ChapterChanged {
            index: 3,
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        let r1 = rx1.try_recv().expect("rx1 should receive");
        let r2 = rx2.try_recv().expect("rx2 should receive");

        assert_eq!(r1.event_type(), "ChapterChanged");
        assert_eq!(r2.event_type(), "ChapterChanged");
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = PlayerEvent::SegmentSkipPrompt {
            segment_id: Uuid::new_v4(),
            start_ms: 10_000,
            end_ms: 95_000,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"SegmentSkipPrompt\""));

        let back: PlayerEvent = serde_json::from_str(&json).expect("deserialize");
        match back {
            PlayerEvent::SegmentSkipPrompt { start_ms, end_ms, .. } => {
                assert_eq!(start_ms, 10_000);
                assert_eq!(end_ms, 95_000);
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }

    #[test]
    fn test_play_state_display() {
        assert_eq!(PlayState::Playing.to_string(), "playing");
        assert_eq!(PlayState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(PlayState::Ended.to_string(), "ended");
    }

    #[test]
    fn test_event_type_method() {
        let events = vec![
            (
                PlayerEvent::PlaybackPrepared {
                    item_id: Some(Uuid::new_v4()),
                    timestamp: chrono::Utc::now(),
                },
                "PlaybackPrepared",
            ),
            (
                PlayerEvent::PlaybackCompleted {
                    item_id: None,
                    timestamp: chrono::Utc::now(),
                },
                "PlaybackCompleted",
            ),
            (
                PlayerEvent::TracksChanged {
                    video_count: 1,
                    audio_count: 2,
                    subtitle_count: 3,
                    timestamp: chrono::Utc::now(),
                },
                "TracksChanged",
            ),
            (
                PlayerEvent::PlaybackError {
                    message: "load failed".to_string(),
                    timestamp: chrono::Utc::now(),
                },
                "PlaybackError",
            ),
        ];

        for (event, expected_type) in events {
            assert_eq!(event.event_type(), expected_type);
        }
    }
}
