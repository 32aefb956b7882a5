//! Abstract native-engine protocol surface
//!
//! The native engine is a black box reached through three channels: ordered
//! string-token commands (fire-and-forget), named typed properties (a subset
//! observable), and a closed set of asynchronous events. `EngineBackend` is
//! the seam behind which the real binding lives; everything above it is
//! engine-agnostic.

use std::sync::Arc;
use thiserror::Error;

/// Well-known property names used by the bridge
pub mod props {
    pub const PAUSE: &str = "pause";
    pub const IDLE_ACTIVE: &str = "idle-active";
    pub const EOF_REACHED: &str = "eof-reached";
    pub const TIME_POS: &str = "time-pos";
    pub const DURATION: &str = "duration";
    pub const CACHE_TIME: &str = "demuxer-cache-time";
    pub const TRACK_LIST: &str = "track-list";
    pub const CHAPTER_LIST: &str = "chapter-list";
    pub const CHAPTER: &str = "chapter";
    pub const VIDEO_TRACK: &str = "vid";
    pub const AUDIO_TRACK: &str = "aid";
    pub const SUBTITLE_TRACK: &str = "sid";
    pub const SECONDARY_SUBTITLE_TRACK: &str = "secondary-sid";
    pub const SUBTITLE_VISIBILITY: &str = "sub-visibility";
    pub const SECONDARY_SUBTITLE_VISIBILITY: &str = "secondary-sub-visibility";
    pub const VIDEO_WIDTH: &str = "width";
    pub const VIDEO_HEIGHT: &str = "height";
    pub const VOLUME: &str = "volume";
    pub const SPEED: &str = "speed";
}

/// Errors reported by the native engine binding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine handle has not been initialized yet
    #[error("engine not initialized")]
    NotInitialized,

    /// The engine rejected a command
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// A property read or write failed (unknown name, wrong format, or no
    /// value at this point of playback)
    #[error("property unavailable: {0}")]
    PropertyUnavailable(String),

    /// The native library could not be loaded or crashed
    #[error("native engine failure: {0}")]
    Native(String),
}

/// Requested wire format for a property access or observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFormat {
    String,
    Int,
    Double,
    Flag,
}

/// A typed property value crossing the engine boundary
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Double(f64),
    Flag(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

/// Why the engine finished the current file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Natural end of file
    Eof,
    /// Playback was stopped by command
    Stop,
    /// The engine is shutting down
    Quit,
    /// Loading or decoding failed
    Error,
    /// Playlist redirect to another entry
    Redirect,
}

/// Severity taxonomy for native engine log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineLogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl EngineLogLevel {
    /// Classify an engine-reported level string; unknown strings map to Info
    pub fn from_level_str(level: &str) -> Self {
        match level {
            "fatal" => EngineLogLevel::Fatal,
            "error" => EngineLogLevel::Error,
            "warn" => EngineLogLevel::Warn,
            "info" => EngineLogLevel::Info,
            "v" | "verbose" => EngineLogLevel::Verbose,
            "debug" => EngineLogLevel::Debug,
            "trace" => EngineLogLevel::Trace,
            _ => EngineLogLevel::Info,
        }
    }
}

/// Asynchronous notifications from the native engine (closed set)
///
/// The engine serializes its own callbacks, so variants of this enum arrive
/// single-threaded relative to each other, but on a thread distinct from the
/// control thread.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Engine is shutting down; no further events will arrive
    Shutdown,
    /// A new file started loading
    StartFile,
    /// The file's headers were read; tracks and chapters are available
    FileLoaded,
    /// The current file ended
    EndFile {
        reason: EndReason,
        /// Present when `reason` is `Error`
        error: Option<String>,
    },
    /// The engine entered its idle state
    Idle,
    /// A seek started
    Seek,
    /// Playback resumed after a seek or load
    PlaybackRestart,
    /// Video output was reconfigured (new size or format)
    VideoReconfig,
    /// Audio output was reconfigured
    AudioReconfig,
    /// An observed property changed; `value` is None when the property has
    /// no value at this point of playback
    PropertyChange {
        name: String,
        value: Option<PropertyValue>,
    },
    /// A log line from the native engine
    LogMessage {
        level: EngineLogLevel,
        prefix: String,
        text: String,
    },
}

/// Opaque handle to a native rendering surface
///
/// The integer is whatever the platform layer uses to identify the surface
/// (a window id, an ANativeWindow pointer value). The bridge never
/// dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub usize);

/// Callback through which the backend delivers engine events
///
/// Invoked from the engine's own callback thread. At most one sink is
/// installed at a time; installing a new one replaces the previous.
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// The native engine binding
///
/// Implementations forward each call to the engine's internal queue and
/// return before the corresponding state change is necessarily visible
/// through property reads; completion is confirmed via events, not by
/// immediate re-read.
pub trait EngineBackend: Send {
    /// Initialize the native engine. Called exactly once per handle.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Execute an ordered string-token command
    fn execute_command(&self, args: &[&str]) -> Result<(), EngineError>;

    /// Read a property in the requested format
    fn get_property(&self, name: &str, format: PropertyFormat)
        -> Result<PropertyValue, EngineError>;

    /// Write a property
    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), EngineError>;

    /// Register for asynchronous change notification on a property
    fn observe_property(&self, name: &str, format: PropertyFormat) -> Result<(), EngineError>;

    /// Attach a rendering surface
    fn attach_surface(&self, surface: SurfaceHandle) -> Result<(), EngineError>;

    /// Detach the rendering surface
    fn detach_surface(&self) -> Result<(), EngineError>;

    /// Install (or clear) the event sink. Replaces any previous sink.
    fn set_event_sink(&mut self, sink: Option<EventSink>);

    /// Tear down the native engine. Idempotent.
    fn shutdown(&mut self);
}
