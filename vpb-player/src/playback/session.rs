//! Player session - component ownership and wiring
//!
//! The session owns the gateway, dispatch hub, state machine, catalogs, and
//! segment scheduler; it registers the hub listener that translates native
//! notifications into state-machine inputs and catalog refreshes, runs the
//! progress poll, and enforces the teardown ordering: stop polls, detach
//! the hub, clear the catalogs, destroy the gateway - in that order, so no
//! late callback can observe a torn-down session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;
use vpb_common::config::BridgeConfig;
use vpb_common::events::{EventBus, PlayState, PlayerEvent};
use vpb_common::time::duration_to_millis;

use crate::chapters::ChapterCatalog;
use crate::engine::dispatch::{EngineEventListener, EventDispatchHub};
use crate::engine::gateway::EngineGateway;
use crate::engine::protocol::{
    props, EndReason, EngineBackend, EngineEvent, PropertyValue, SurfaceHandle,
};
use crate::error::Result;
use crate::playback::position::PositionInfo;
use crate::playback::state::PlaybackStateMachine;
use crate::segments::{MediaSegment, SegmentAction, SegmentScheduler};
use crate::tracks::{StreamDescriptor, TrackCatalog};

/// Hub listener translating native notifications into component updates
///
/// Runs on the engine's callback thread; every component it touches guards
/// its own state, so no marshaling onto the control thread is needed.
struct SessionListener {
    gateway: Arc<EngineGateway>,
    state: Arc<PlaybackStateMachine>,
    tracks: Arc<TrackCatalog>,
    chapters: Arc<ChapterCatalog>,
    events: EventBus,
}

impl EngineEventListener for SessionListener {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::StartFile => self.state.on_start_file(),
            EngineEvent::FileLoaded => {
                self.state.on_file_loaded();
                self.tracks.refresh();
                self.chapters.refresh();
            }
            EngineEvent::Seek => self.state.on_seek_begin(),
            EngineEvent::PlaybackRestart => self.state.on_playback_restart(),
            EngineEvent::Idle => self.state.signal_idle(true),
            EngineEvent::Shutdown => self.state.on_shutdown(),
            EngineEvent::VideoReconfig => {
                let width = self.gateway.get_property_int(props::VIDEO_WIDTH);
                let height = self.gateway.get_property_int(props::VIDEO_HEIGHT);
                if width > 0 && height > 0 {
                    self.events.emit_lossy(PlayerEvent::VideoSizeChanged {
                        width,
                        height,
                        timestamp: vpb_common::time::now(),
                    });
                }
            }
            EngineEvent::AudioReconfig => debug!("Audio output reconfigured"),
            // End-file, property changes and log lines arrive through their
            // dedicated callbacks
            _ => {}
        }
    }

    fn on_property_change(&self, name: &str, value: Option<&PropertyValue>) {
        match name {
            props::PAUSE => {
                if let Some(paused) = value.and_then(PropertyValue::as_flag) {
                    self.state.signal_paused(paused);
                }
            }
            props::IDLE_ACTIVE => {
                if let Some(idle) = value.and_then(PropertyValue::as_flag) {
                    self.state.signal_idle(idle);
                }
            }
            props::EOF_REACHED => {
                if let Some(eof) = value.and_then(PropertyValue::as_flag) {
                    self.state.signal_eof(eof);
                }
            }
            props::TRACK_LIST => self.tracks.refresh(),
            props::CHAPTER_LIST => self.chapters.refresh(),
            props::CHAPTER => self.chapters.update_current_chapter(),
            _ => {}
        }
    }

    fn on_end_file(&self, reason: EndReason, error: Option<&str>) {
        match reason {
            EndReason::Eof => self.state.signal_eof(true),
            EndReason::Error => {
                self.state.on_error(error.unwrap_or("playback failed"));
            }
            EndReason::Stop | EndReason::Quit | EndReason::Redirect => {
                debug!("File ended: {:?}", reason);
            }
        }
    }
}

/// A playback session over the native engine
///
/// Create with a backend and configuration inside a tokio runtime (the
/// session spawns its poll tasks on the ambient runtime). The session is
/// reset, not destroyed, between files; `shutdown` ends it permanently.
pub struct PlayerSession {
    gateway: Arc<EngineGateway>,
    hub: Arc<EventDispatchHub>,
    state: Arc<PlaybackStateMachine>,
    tracks: Arc<TrackCatalog>,
    chapters: Arc<ChapterCatalog>,
    segments: SegmentScheduler,
    events: EventBus,
    current_item: Mutex<Option<Uuid>>,
    /// Bumped to stop the progress poll (cancellation by ceasing
    /// rescheduling)
    progress_generation: Arc<AtomicU64>,
}

impl PlayerSession {
    /// Create a session over the given backend
    ///
    /// Claims the engine, initializes it, attaches the dispatch hub, and
    /// starts the progress poll.
    pub fn new(backend: Box<dyn EngineBackend>, config: BridgeConfig) -> Result<Arc<Self>> {
        let events = EventBus::new(config.event_bus_capacity);
        let gateway = EngineGateway::create(backend)?;
        gateway.initialize_engine()?;

        let hub = EventDispatchHub::new();
        hub.attach(&gateway);

        let state = Arc::new(PlaybackStateMachine::new(events.clone()));
        let tracks = Arc::new(TrackCatalog::new(Arc::clone(&gateway), events.clone()));
        let chapters = Arc::new(ChapterCatalog::new(Arc::clone(&gateway), events.clone()));
        let segments = SegmentScheduler::new(
            Arc::clone(&gateway),
            events.clone(),
            config.segment_poll_interval(),
            config.segment_window(),
        );

        hub.add_listener(Arc::new(SessionListener {
            gateway: Arc::clone(&gateway),
            state: Arc::clone(&state),
            tracks: Arc::clone(&tracks),
            chapters: Arc::clone(&chapters),
            events: events.clone(),
        }));

        let session = Arc::new(Self {
            gateway,
            hub,
            state,
            tracks,
            chapters,
            segments,
            events,
            current_item: Mutex::new(None),
            progress_generation: Arc::new(AtomicU64::new(0)),
        });
        session.spawn_progress_loop(config.progress_poll_interval());

        info!("Player session created");
        Ok(session)
    }

    // ========================================
    // Playback control
    // ========================================

    /// Load a media URL, beginning a new item
    ///
    /// Returns the item id subsequent prepared/completed notifications will
    /// carry.
    pub fn load(&self, url: &str) -> Result<Uuid> {
        let item_id = Uuid::new_v4();
        self.segments.clear();
        self.state.set_item(Some(item_id));
        *self.current_item.lock().unwrap() = Some(item_id);
        self.gateway.execute_command(&["loadfile", url])?;
        info!("Loading media item {}", item_id);
        Ok(item_id)
    }

    /// Stop playback and discard per-item state
    pub fn stop(&self) {
        self.segments.clear();
        let _ = self.gateway.execute_command(&["stop"]);
        *self.current_item.lock().unwrap() = None;
        self.state.set_item(None);
    }

    /// Pause playback
    pub fn pause(&self) {
        self.gateway.set_property_bool(props::PAUSE, true);
    }

    /// Resume playback
    pub fn resume(&self) {
        self.gateway.set_property_bool(props::PAUSE, false);
    }

    /// Seek to an absolute position
    pub fn seek_absolute(&self, position: Duration) {
        self.state.on_seek_begin();
        let target = format!("{:.3}", position.as_secs_f64());
        let _ = self.gateway.execute_command(&["seek", &target, "absolute"]);
    }

    /// Seek relative to the current position
    pub fn seek_relative(&self, offset_secs: f64) {
        self.state.on_seek_begin();
        let offset = format!("{:.3}", offset_secs);
        let _ = self.gateway.execute_command(&["seek", &offset, "relative"]);
    }

    /// Set the output volume (0-100)
    pub fn set_volume(&self, percent: f64) {
        self.gateway
            .set_property_double(props::VOLUME, percent.clamp(0.0, 100.0));
    }

    /// Set the playback speed factor
    pub fn set_speed(&self, factor: f64) {
        if factor > 0.0 && factor.is_finite() {
            self.gateway.set_property_double(props::SPEED, factor);
        }
    }

    /// Sample the current playback position
    pub fn position(&self) -> PositionInfo {
        PositionInfo::read(&self.gateway)
    }

    // ========================================
    // Surfaces, streams, segments
    // ========================================

    /// Attach a rendering surface (before or after engine init)
    pub fn attach_surface(&self, surface: SurfaceHandle) {
        self.gateway.attach_surface(surface);
    }

    /// Detach the rendering surface
    pub fn detach_surface(&self) {
        self.gateway.detach_surface();
    }

    /// Install the external stream descriptors for cross-indexing
    pub fn set_stream_descriptors(&self, descriptors: Vec<StreamDescriptor>) {
        self.tracks.set_stream_descriptors(descriptors);
    }

    /// Install the segment list for the current item and start monitoring
    pub fn apply_media_segments(&self, segments: Vec<(MediaSegment, SegmentAction)>) {
        self.segments.apply(segments);
    }

    /// Stop segment monitoring and discard pending entries
    pub fn clear_media_segments(&self) {
        self.segments.clear();
    }

    // ========================================
    // Accessors
    // ========================================

    /// The bus carrying this session's notifications
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Current reconciled playback state
    pub fn play_state(&self) -> PlayState {
        self.state.state()
    }

    /// Item id of the current load, if any
    pub fn current_item(&self) -> Option<Uuid> {
        *self.current_item.lock().unwrap()
    }

    pub fn tracks(&self) -> &TrackCatalog {
        &self.tracks
    }

    pub fn chapters(&self) -> &ChapterCatalog {
        &self.chapters
    }

    /// The dispatch hub, for hosts that register their own listeners
    pub fn dispatch_hub(&self) -> &Arc<EventDispatchHub> {
        &self.hub
    }

    // ========================================
    // Teardown
    // ========================================

    /// End the session permanently
    ///
    /// Ordering matters: polls stop first, then the hub detaches, then the
    /// catalogs clear, then the engine is destroyed - after this no
    /// asynchronous callback can observe or mutate the session.
    pub fn shutdown(&self) {
        info!("Player session shutting down");
        self.segments.clear();
        self.progress_generation.fetch_add(1, Ordering::AcqRel);
        self.hub.detach(&self.gateway);
        self.hub.clear_listeners();
        self.tracks.clear();
        self.chapters.clear();
        self.state.reset();
        self.gateway.destroy();
    }

    fn spawn_progress_loop(&self, interval: Duration) {
        let generation = Arc::clone(&self.progress_generation);
        let my_generation = generation.load(Ordering::Acquire);
        let gateway = Arc::clone(&self.gateway);
        let chapters = Arc::clone(&self.chapters);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if generation.load(Ordering::Acquire) != my_generation {
                    break;
                }

                match state.state() {
                    PlayState::Playing | PlayState::Paused | PlayState::Seeking => {}
                    _ => continue,
                }

                let info = PositionInfo::read(&gateway);
                events.emit_lossy(PlayerEvent::PlaybackProgress {
                    position_ms: duration_to_millis(info.position),
                    buffered_ms: duration_to_millis(info.buffered),
                    duration_ms: duration_to_millis(info.duration),
                    timestamp: vpb_common::time::now(),
                });

                chapters.update_current_chapter();
            }
        });
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
