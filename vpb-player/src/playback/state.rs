//! Playback state machine
//!
//! Reconciles the engine's three independently-arriving boolean signals
//! (paused, idle-active, eof-reached) plus discrete lifecycle events into a
//! single ordered `PlayState`.
//!
//! Precedence: error > explicit seek bracket > idle > eof > paused/playing.
//! The two startup signals can settle in either order, so "became active" is
//! the conjunction of not-paused and not-idle, recomputed after *either*
//! signal changes, and the prepared notification fires at most once per item
//! no matter how often the signals flip in between.

use std::sync::Mutex;

use tracing::{debug, info};
use uuid::Uuid;
use vpb_common::events::{EventBus, PlayState, PlayerEvent};

/// Latest raw signal values, as last reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub paused: bool,
    pub idle_active: bool,
    pub eof_reached: bool,
    pub seeking: bool,
}

#[derive(Debug)]
struct StateInner {
    state: PlayState,
    paused: bool,
    idle_active: bool,
    eof_reached: bool,
    seeking: bool,
    error: Option<String>,
    /// Item the session associated with the current load
    item_id: Option<Uuid>,
    /// True between start-file and end-of-item
    in_item: bool,
    /// One-shot guard for the prepared notification
    prepared_fired: bool,
}

impl StateInner {
    fn initial() -> Self {
        Self {
            state: PlayState::Uninitialized,
            paused: false,
            idle_active: false,
            eof_reached: false,
            seeking: false,
            error: None,
            item_id: None,
            in_item: false,
            prepared_fired: false,
        }
    }

    /// Derive the ordered state from the latest signal values
    fn derive(&self) -> PlayState {
        if self.error.is_some() {
            PlayState::Error
        } else if self.seeking {
            PlayState::Seeking
        } else if self.idle_active {
            PlayState::Idle
        } else if self.eof_reached {
            PlayState::Ended
        } else if self.paused {
            PlayState::Paused
        } else {
            PlayState::Playing
        }
    }
}

/// Single-writer playback state machine
///
/// Inputs arrive from the dispatch hub's callback thread; all mutation
/// happens under an internal lock and events are emitted after the lock is
/// released.
pub struct PlaybackStateMachine {
    inner: Mutex<StateInner>,
    events: EventBus,
}

impl PlaybackStateMachine {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Mutex::new(StateInner::initial()),
            events,
        }
    }

    /// Current reconciled state
    pub fn state(&self) -> PlayState {
        self.inner.lock().unwrap().state
    }

    /// Latest raw signal values
    pub fn signals(&self) -> SignalSnapshot {
        let inner = self.inner.lock().unwrap();
        SignalSnapshot {
            paused: inner.paused,
            idle_active: inner.idle_active,
            eof_reached: inner.eof_reached,
            seeking: inner.seeking,
        }
    }

    /// Associate subsequent notifications with an item
    pub fn set_item(&self, item_id: Option<Uuid>) {
        self.inner.lock().unwrap().item_id = item_id;
    }

    /// The engine started loading a new file
    pub fn on_start_file(&self) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            // ERROR is terminal until explicit reinitialization
            if inner.error.is_some() {
                return;
            }
            inner.in_item = true;
            inner.eof_reached = false;
            inner.seeking = false;
            inner.prepared_fired = false;
            self.transition_to(&mut inner, PlayState::Loading)
        };
        self.emit_all(emissions);
    }

    /// The file's headers were read; recompute from the latest signals
    pub fn on_file_loaded(&self) {
        self.recompute();
    }

    /// Latest pause flag from the engine
    pub fn signal_paused(&self, paused: bool) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            if inner.paused == paused {
                return;
            }
            inner.paused = paused;
            self.recompute_locked(&mut inner)
        };
        self.emit_all(emissions);
    }

    /// Latest idle flag from the engine
    pub fn signal_idle(&self, idle_active: bool) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            if inner.idle_active == idle_active {
                return;
            }
            inner.idle_active = idle_active;
            self.recompute_locked(&mut inner)
        };
        self.emit_all(emissions);
    }

    /// Latest end-of-file flag from the engine
    pub fn signal_eof(&self, eof_reached: bool) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            if inner.eof_reached == eof_reached {
                return;
            }
            inner.eof_reached = eof_reached;
            self.recompute_locked(&mut inner)
        };
        self.emit_all(emissions);
    }

    /// An explicit seek started; forces SEEKING until the matching
    /// playback-restart arrives
    pub fn on_seek_begin(&self) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            if inner.error.is_some() || !inner.in_item {
                return;
            }
            inner.seeking = true;
            self.transition_to(&mut inner, PlayState::Seeking)
        };
        self.emit_all(emissions);
    }

    /// Playback resumed (after a seek or a load); recompute from signals
    pub fn on_playback_restart(&self) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            inner.seeking = false;
            self.recompute_locked(&mut inner)
        };
        self.emit_all(emissions);
    }

    /// A session-fatal failure; terminal until `reset`
    pub fn on_error(&self, message: &str) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            if inner.error.is_some() {
                return;
            }
            inner.error = Some(message.to_string());
            let mut emissions = self.transition_to(&mut inner, PlayState::Error);
            emissions.push(PlayerEvent::PlaybackError {
                message: message.to_string(),
                timestamp: vpb_common::time::now(),
            });
            emissions
        };
        info!("Playback error: terminal until reinitialization");
        self.emit_all(emissions);
    }

    /// The engine is shutting down
    pub fn on_shutdown(&self) {
        self.reset();
    }

    /// Return to the initial state (explicit reinitialization)
    pub fn reset(&self) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            let previous = inner.state;
            *inner = StateInner::initial();
            if previous != PlayState::Uninitialized {
                vec![PlayerEvent::PlayStateChanged {
                    old_state: previous,
                    new_state: PlayState::Uninitialized,
                    timestamp: vpb_common::time::now(),
                }]
            } else {
                Vec::new()
            }
        };
        self.emit_all(emissions);
    }

    fn recompute(&self) {
        let emissions = {
            let mut inner = self.inner.lock().unwrap();
            self.recompute_locked(&mut inner)
        };
        self.emit_all(emissions);
    }

    /// Recompute the derived state and collect notifications
    ///
    /// The prepared notification is keyed on the not-paused and not-idle
    /// conjunction so that signal reordering during startup cannot fire it
    /// twice; the completed notification fires on the transition into ENDED.
    fn recompute_locked(&self, inner: &mut StateInner) -> Vec<PlayerEvent> {
        let new_state = inner.derive();
        let mut emissions = self.transition_to(inner, new_state);

        let became_active = !inner.paused && !inner.idle_active && !inner.eof_reached;
        if became_active && inner.in_item && !inner.seeking && !inner.prepared_fired {
            inner.prepared_fired = true;
            emissions.push(PlayerEvent::PlaybackPrepared {
                item_id: inner.item_id,
                timestamp: vpb_common::time::now(),
            });
        }

        emissions
    }

    fn transition_to(&self, inner: &mut StateInner, new_state: PlayState) -> Vec<PlayerEvent> {
        if inner.state == new_state {
            return Vec::new();
        }

        let old_state = inner.state;
        inner.state = new_state;
        debug!("Play state {} -> {}", old_state, new_state);

        let mut emissions = vec![PlayerEvent::PlayStateChanged {
            old_state,
            new_state,
            timestamp: vpb_common::time::now(),
        }];

        if new_state == PlayState::Ended {
            inner.in_item = false;
            emissions.push(PlayerEvent::PlaybackCompleted {
                item_id: inner.item_id,
                timestamp: vpb_common::time::now(),
            });
        }

        emissions
    }

    fn emit_all(&self, emissions: Vec<PlayerEvent>) {
        for event in emissions {
            self.events.emit_lossy(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::Receiver;

    fn machine() -> (PlaybackStateMachine, Receiver<PlayerEvent>) {
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        (PlaybackStateMachine::new(bus), rx)
    }

    fn drain(rx: &mut Receiver<PlayerEvent>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type().to_string());
        }
        types
    }

    #[test]
    fn test_initial_state() {
        let (sm, _rx) = machine();
        assert_eq!(sm.state(), PlayState::Uninitialized);
    }

    #[test]
    fn test_idle_dominates_all_signals() {
        let (sm, _rx) = machine();
        sm.on_start_file();
        sm.signal_paused(true);
        sm.signal_idle(true);
        assert_eq!(sm.state(), PlayState::Idle);

        // Idle outranks eof as well
        sm.signal_eof(true);
        assert_eq!(sm.state(), PlayState::Idle);
    }

    #[test]
    fn test_eof_dominates_paused() {
        let (sm, _rx) = machine();
        sm.on_start_file();
        sm.signal_idle(false);
        sm.signal_eof(true);
        assert_eq!(sm.state(), PlayState::Ended);

        // ENDED is terminal for the item: pause flips cannot leave it
        sm.signal_paused(true);
        assert_eq!(sm.state(), PlayState::Ended);
        sm.signal_paused(false);
        assert_eq!(sm.state(), PlayState::Ended);
    }

    #[test]
    fn test_paused_and_playing() {
        let (sm, _rx) = machine();
        sm.on_start_file();
        sm.signal_paused(true);
        assert_eq!(sm.state(), PlayState::Paused);
        sm.signal_paused(false);
        assert_eq!(sm.state(), PlayState::Playing);
    }

    #[test]
    fn test_state_is_function_of_latest_signals() {
        // Same final signal values must yield the same state regardless of
        // the order in which the changes arrived.
        let orders: Vec<Vec<(&str, bool)>> = vec![
            vec![("idle", true), ("idle", false)],
            vec![("paused", true), ("paused", false)],
            vec![
                ("paused", true),
                ("idle", true),
                ("idle", false),
                ("paused", false),
            ],
            vec![
                ("idle", true),
                ("paused", true),
                ("paused", false),
                ("idle", false),
            ],
        ];

        for order in orders {
            let (sm, _rx) = machine();
            sm.on_start_file();
            for (signal, value) in &order {
                match *signal {
                    "paused" => sm.signal_paused(*value),
                    "idle" => sm.signal_idle(*value),
                    _ => unreachable!(),
                }
            }
            assert_eq!(
                sm.state(),
                PlayState::Playing,
                "signal order {:?} should still derive PLAYING",
                order
            );
        }
    }

    #[test]
    fn test_prepared_fires_exactly_once_per_item() {
        let (sm, mut rx) = machine();
        sm.set_item(Some(Uuid::new_v4()));
        sm.on_start_file();

        // Signals settle out of order, flipping several times
        sm.signal_idle(true);
        sm.signal_paused(true);
        sm.signal_idle(false);
        sm.signal_paused(false); // first entry into the active conjunction
        sm.signal_paused(true);
        sm.signal_paused(false); // re-entry must not refire

        let types = drain(&mut rx);
        let prepared_count = types.iter().filter(|t| *t == "PlaybackPrepared").count();
        assert_eq!(prepared_count, 1);
    }

    #[test]
    fn test_prepared_fires_again_for_next_item() {
        let (sm, mut rx) = machine();
        sm.on_start_file();
        sm.signal_idle(true);
        sm.signal_idle(false); // first item becomes active

        sm.signal_idle(true); // between files
        sm.on_start_file(); // next item
        sm.signal_idle(false); // second item becomes active

        let types = drain(&mut rx);
        let prepared_count = types.iter().filter(|t| *t == "PlaybackPrepared").count();
        assert_eq!(prepared_count, 2);
    }

    #[test]
    fn test_seek_bracket() {
        let (sm, _rx) = machine();
        sm.on_start_file();
        sm.signal_idle(true);
        sm.signal_idle(false);
        assert_eq!(sm.state(), PlayState::Playing);

        sm.on_seek_begin();
        assert_eq!(sm.state(), PlayState::Seeking);

        // Signals mid-seek do not leave SEEKING
        sm.signal_paused(true);
        assert_eq!(sm.state(), PlayState::Seeking);

        // The matching restart recomputes from the latest signals
        sm.on_playback_restart();
        assert_eq!(sm.state(), PlayState::Paused);
    }

    #[test]
    fn test_error_terminal_until_reset() {
        let (sm, mut rx) = machine();
        sm.on_start_file();
        sm.on_error("demuxer failure");
        assert_eq!(sm.state(), PlayState::Error);

        // No signal leaves ERROR
        sm.signal_idle(true);
        sm.signal_paused(false);
        assert_eq!(sm.state(), PlayState::Error);

        // Nor a new start-file
        sm.on_start_file();
        assert_eq!(sm.state(), PlayState::Error);

        let types = drain(&mut rx);
        assert!(types.contains(&"PlaybackError".to_string()));

        sm.reset();
        assert_eq!(sm.state(), PlayState::Uninitialized);
    }

    #[test]
    fn test_completed_fires_on_ended() {
        let (sm, mut rx) = machine();
        let item = Uuid::new_v4();
        sm.set_item(Some(item));
        sm.on_start_file();
        sm.signal_paused(false);
        sm.signal_idle(false);
        sm.signal_eof(true);

        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            if let PlayerEvent::PlaybackCompleted { item_id, .. } = event {
                assert_eq!(item_id, Some(item));
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_end_to_end_scenario() {
        // Loading with idle+pause reported, then start, play, and finish.
        let (sm, mut rx) = machine();
        sm.on_start_file();
        assert_eq!(sm.state(), PlayState::Loading);

        sm.signal_idle(true);
        sm.signal_paused(true);
        assert_eq!(sm.state(), PlayState::Idle);

        sm.on_start_file();
        sm.signal_idle(false);
        sm.signal_paused(false);
        assert_eq!(sm.state(), PlayState::Playing);

        sm.signal_eof(true);
        assert_eq!(sm.state(), PlayState::Ended);

        let types = drain(&mut rx);
        assert_eq!(
            types.iter().filter(|t| *t == "PlaybackPrepared").count(),
            1
        );
        assert!(types.contains(&"PlaybackCompleted".to_string()));
    }

    #[test]
    fn test_start_file_after_ended_returns_to_loading() {
        let (sm, _rx) = machine();
        sm.on_start_file();
        sm.signal_eof(true);
        assert_eq!(sm.state(), PlayState::Ended);

        sm.on_start_file();
        assert_eq!(sm.state(), PlayState::Loading);
        assert!(!sm.signals().eof_reached);
    }
}
