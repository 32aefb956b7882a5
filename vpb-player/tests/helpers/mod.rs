//! Test harness for vpb-player integration tests
//!
//! Provides a scripted `MockBackend` implementing the engine protocol:
//! - Records commands, property writes, and observation registrations
//! - Serves property reads from a test-controlled map
//! - Replays engine events through the installed sink, emulating the
//!   native callback thread

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vpb_common::config::BridgeConfig;
use vpb_player::engine::protocol::{
    EngineBackend, EngineError, EngineEvent, EventSink, PropertyFormat, PropertyValue,
    SurfaceHandle,
};

#[derive(Default)]
pub struct MockState {
    pub initialized: bool,
    pub shut_down: bool,
    pub commands: Vec<Vec<String>>,
    pub property_writes: Vec<(String, PropertyValue)>,
    pub observed: Vec<String>,
    pub properties: HashMap<String, PropertyValue>,
    pub surface: Option<SurfaceHandle>,
    pub sink: Option<EventSink>,
    /// When set, every property read fails
    pub fail_reads: bool,
    /// When set, every command is rejected
    pub reject_commands: bool,
}

/// Shared handle for scripting the mock from the test body
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockHandle {
    /// Set a property value served to subsequent reads
    pub fn set_property(&self, name: &str, value: PropertyValue) {
        self.state
            .lock()
            .unwrap()
            .properties
            .insert(name.to_string(), value);
    }

    /// Make all property reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Make all commands be rejected
    pub fn reject_commands(&self, reject: bool) {
        self.state.lock().unwrap().reject_commands = reject;
    }

    /// Deliver an engine event through the installed sink
    pub fn push_event(&self, event: EngineEvent) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    /// Store a property value and deliver its change notification
    pub fn emit_property(&self, name: &str, value: PropertyValue) {
        self.set_property(name, value.clone());
        self.push_event(EngineEvent::PropertyChange {
            name: name.to_string(),
            value: Some(value),
        });
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands whose first token matches `name`
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|c| c.first().map(String::as_str) == Some(name))
            .collect()
    }

    pub fn property_writes(&self) -> Vec<(String, PropertyValue)> {
        self.state.lock().unwrap().property_writes.clone()
    }

    /// Latest write to a property, if any
    pub fn last_write(&self, name: &str) -> Option<PropertyValue> {
        self.property_writes()
            .into_iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn observed(&self) -> Vec<String> {
        self.state.lock().unwrap().observed.clone()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.state.lock().unwrap().surface
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }
}

pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> (Box<dyn EngineBackend>, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = MockHandle {
            state: Arc::clone(&state),
        };
        (Box::new(MockBackend { state }), handle)
    }
}

impl EngineBackend for MockBackend {
    fn initialize(&mut self) -> Result<(), EngineError> {
        self.state.lock().unwrap().initialized = true;
        Ok(())
    }

    fn execute_command(&self, args: &[&str]) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_commands {
            return Err(EngineError::CommandRejected(args.join(" ")));
        }
        state
            .commands
            .push(args.iter().map(|s| s.to_string()).collect());
        Ok(())
    }

    fn get_property(
        &self,
        name: &str,
        _format: PropertyFormat,
    ) -> Result<PropertyValue, EngineError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(EngineError::PropertyUnavailable(name.to_string()));
        }
        state
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::PropertyUnavailable(name.to_string()))
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state
            .property_writes
            .push((name.to_string(), value.clone()));
        state.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn observe_property(&self, name: &str, _format: PropertyFormat) -> Result<(), EngineError> {
        self.state.lock().unwrap().observed.push(name.to_string());
        Ok(())
    }

    fn attach_surface(&self, surface: SurfaceHandle) -> Result<(), EngineError> {
        self.state.lock().unwrap().surface = Some(surface);
        Ok(())
    }

    fn detach_surface(&self) -> Result<(), EngineError> {
        self.state.lock().unwrap().surface = None;
        Ok(())
    }

    fn set_event_sink(&mut self, sink: Option<EventSink>) {
        self.state.lock().unwrap().sink = sink;
    }

    fn shutdown(&mut self) {
        self.state.lock().unwrap().shut_down = true;
    }
}

/// Install a test log subscriber once; later calls are no-ops
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "vpb_player=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Configuration with intervals short enough for tests
#[allow(dead_code)]
pub fn test_config() -> BridgeConfig {
    BridgeConfig::from_toml_str(
        "progress_poll_ms = 20\nsegment_poll_ms = 10\nsegment_window_ms = 200\n",
    )
    .expect("test config parses")
    .validated()
    .expect("test config is valid")
}

/// A realistic track inventory payload
#[allow(dead_code)]
pub const TRACK_INVENTORY: &str = r#"[
    {"id": 1, "type": "video", "codec": "h264", "demux-w": 1920,
     "demux-h": 1080, "demux-fps": 23.976, "default": true, "selected": true},
    {"id": 1, "type": "audio", "title": "English 5.1", "lang": "eng",
     "codec": "eac3", "demux-channel-count": 6, "demux-samplerate": 48000,
     "default": true, "selected": true},
    {"id": 2, "type": "audio", "lang": "jpn", "codec": "aac",
     "demux-channel-count": 2, "demux-samplerate": 48000},
    {"id": 3, "type": "audio", "lang": "fra", "codec": "aac",
     "demux-channel-count": 2, "demux-samplerate": 48000},
    {"id": 1, "type": "sub", "lang": "eng", "codec": "subrip",
     "default": true, "selected": true}
]"#;

/// A realistic chapter inventory payload
#[allow(dead_code)]
pub const CHAPTER_INVENTORY: &str = r#"[
    {"title": "Opening", "time": 0.0},
    {"title": "", "time": 90.0},
    {"title": "Finale", "time": 1260.5}
]"#;
