//! Segment scheduler - position-driven skip/prompt actions
//!
//! Segment boundaries come from an external metadata source. A fixed-delay
//! poll loop (it keeps ticking while playback is paused) samples the
//! position through the gateway and fires each entry's action exactly once
//! when the position enters the trigger window beginning at the segment's
//! start. The window must exceed the poll interval so that discrete
//! sampling cannot step over a segment start.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;
use vpb_common::events::{EventBus, PlayerEvent};
use vpb_common::time::{duration_to_millis, secs_to_duration};

use crate::engine::gateway::EngineGateway;
use crate::engine::protocol::props;

/// Recommended handling for a segment, supplied by the metadata source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAction {
    /// Seek directly past the segment
    Skip,
    /// Surface a prompt instead of seeking
    AskToSkip,
    /// Leave the segment alone
    Nothing,
}

/// A time range within a media item (intro, recap, outro)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSegment {
    pub id: Uuid,
    pub start: Duration,
    pub end: Duration,
}

/// A segment with its action and one-way trigger latch
///
/// `triggered` transitions false -> true at most once per playback session
/// and is never reset; entries are destroyed and rebuilt when a new item
/// begins or monitoring is cleared.
#[derive(Debug, Clone)]
struct SegmentActionEntry {
    segment: MediaSegment,
    action: SegmentAction,
    triggered: bool,
}

#[derive(Debug, Default)]
struct SchedulerInner {
    entries: Vec<SegmentActionEntry>,
    /// Bumped on every apply/clear; a running poll loop exits when its
    /// generation is stale (cancellation by ceasing rescheduling)
    generation: u64,
}

/// Position-polling scheduler for segment actions
pub struct SegmentScheduler {
    gateway: Arc<EngineGateway>,
    events: EventBus,
    poll_interval: Duration,
    window: Duration,
    inner: Arc<Mutex<SchedulerInner>>,
}

impl SegmentScheduler {
    /// `window` must exceed `poll_interval`; validated by `BridgeConfig`.
    pub fn new(
        gateway: Arc<EngineGateway>,
        events: EventBus,
        poll_interval: Duration,
        window: Duration,
    ) -> Self {
        if window <= poll_interval {
            warn!(
                "Segment window {:?} does not exceed poll interval {:?}; \
                 segment starts may be missed",
                window, poll_interval
            );
        }
        Self {
            gateway,
            events,
            poll_interval,
            window,
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
        }
    }

    /// Install the segment list for the current item and (re)start polling
    ///
    /// Segments whose action is `Nothing` are dropped. With no remaining
    /// entries this behaves like `clear`. Idempotent under re-entry: a
    /// previous poll loop notices the stale generation and exits.
    pub fn apply(&self, segments: Vec<(MediaSegment, SegmentAction)>) {
        let entries: Vec<SegmentActionEntry> = segments
            .into_iter()
            .filter(|(_, action)| *action != SegmentAction::Nothing)
            .map(|(segment, action)| SegmentActionEntry {
                segment,
                action,
                triggered: false,
            })
            .collect();

        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            inner.entries = entries;
            if inner.entries.is_empty() {
                debug!("No actionable segments; poll loop not started");
                return;
            }
            info!("Segment monitoring started: {} entries", inner.entries.len());
            inner.generation
        };

        self.spawn_poll_loop(generation);
    }

    /// Stop the poll loop and discard pending entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        if !inner.entries.is_empty() {
            debug!("Segment monitoring cleared");
        }
        inner.entries.clear();
    }

    /// Number of entries that have not fired yet
    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| !e.triggered)
            .count()
    }

    fn spawn_poll_loop(&self, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let poll_interval = self.poll_interval;
        let window = self.window;

        tokio::spawn(async move {
            loop {
                // Fixed delay, not fixed rate: tick execution time does not
                // cause compounding drift
                tokio::time::sleep(poll_interval).await;

                let position = secs_to_duration(gateway.get_property_double(props::TIME_POS));

                let due: Vec<(MediaSegment, SegmentAction)> = {
                    let mut guard = inner.lock().unwrap();
                    if guard.generation != generation {
                        break;
                    }
                    if guard.entries.iter().all(|e| e.triggered) {
                        debug!("All segment entries fired; poll loop ending");
                        break;
                    }
                    guard
                        .entries
                        .iter_mut()
                        .filter(|e| {
                            !e.triggered && entry_due(e.segment.start, position, window)
                        })
                        .map(|e| {
                            e.triggered = true;
                            (e.segment.clone(), e.action)
                        })
                        .collect()
                };

                for (segment, action) in due {
                    perform_action(&gateway, &events, &segment, action);
                }
            }
        });
    }
}

/// Whether `position` lies within the trigger window starting at `start`
fn entry_due(start: Duration, position: Duration, window: Duration) -> bool {
    position >= start && position < start + window
}

fn perform_action(
    gateway: &EngineGateway,
    events: &EventBus,
    segment: &MediaSegment,
    action: SegmentAction,
) {
    match action {
        SegmentAction::Skip => {
            let target = format!("{:.3}", segment.end.as_secs_f64());
            info!("Skipping segment to {}s", target);
            if gateway
                .execute_command(&["seek", &target, "absolute"])
                .is_ok()
            {
                events.emit_lossy(PlayerEvent::SegmentSkipped {
                    segment_id: segment.id,
                    skipped_to_ms: duration_to_millis(segment.end),
                    timestamp: vpb_common::time::now(),
                });
            }
        }
        SegmentAction::AskToSkip => {
            events.emit_lossy(PlayerEvent::SegmentSkipPrompt {
                segment_id: segment.id,
                start_ms: duration_to_millis(segment.start),
                end_ms: duration_to_millis(segment.end),
                timestamp: vpb_common::time::now(),
            });
        }
        SegmentAction::Nothing => {}
    }
}
