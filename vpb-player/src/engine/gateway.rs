//! Engine gateway - exclusive owner of the native engine handle
//!
//! At most one live gateway may exist process-wide; `create` claims the
//! engine and a second `create` before `destroy` fails. Property reads fail
//! softly (documented defaults), property writes and commands are forwarded
//! to the engine's internal queue and confirmed only via later events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::protocol::{
    props, EngineBackend, EventSink, PropertyFormat, PropertyValue, SurfaceHandle,
};
use crate::error::{Error, Result};

/// Process-wide claim on the native engine. The native binding carries a
/// static dispatch table, so two concurrent instances are forbidden by
/// construction rather than by convention.
static ENGINE_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Properties observed at initialization. Signals feed the state machine;
/// inventory properties trigger catalog refreshes.
const OBSERVED_PROPERTIES: &[(&str, PropertyFormat)] = &[
    (props::PAUSE, PropertyFormat::Flag),
    (props::IDLE_ACTIVE, PropertyFormat::Flag),
    (props::EOF_REACHED, PropertyFormat::Flag),
    (props::TRACK_LIST, PropertyFormat::String),
    (props::CHAPTER_LIST, PropertyFormat::String),
    (props::CHAPTER, PropertyFormat::Int),
    (props::DURATION, PropertyFormat::Double),
];

/// Exclusive owner of the native engine handle
pub struct EngineGateway {
    backend: Mutex<Box<dyn EngineBackend>>,
    initialized: AtomicBool,
    destroyed: AtomicBool,
    /// Surface attached before engine init, replayed at init
    pending_surface: Mutex<Option<SurfaceHandle>>,
    surface_attached: AtomicBool,
}

impl EngineGateway {
    /// Claim the engine and wrap the backend
    ///
    /// Fails with `Error::EngineAlreadyLive` if another gateway is live.
    /// The returned gateway is not initialized yet; call
    /// `initialize_engine` before issuing commands.
    pub fn create(backend: Box<dyn EngineBackend>) -> Result<Arc<Self>> {
        if ENGINE_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::EngineAlreadyLive);
        }

        debug!("Engine gateway created");
        Ok(Arc::new(Self {
            backend: Mutex::new(backend),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            pending_surface: Mutex::new(None),
            surface_attached: AtomicBool::new(false),
        }))
    }

    /// Initialize the native engine and register property observations
    ///
    /// A surface attached before initialization is replayed here.
    pub fn initialize_engine(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("initialize_engine called twice; ignoring");
            return Ok(());
        }

        {
            let mut backend = self.backend.lock().unwrap();
            backend.initialize().map_err(|e| {
                self.initialized.store(false, Ordering::Release);
                Error::Engine(e)
            })?;
        }

        for (name, format) in OBSERVED_PROPERTIES {
            if let Err(e) = self.observe_property(name, *format) {
                warn!("Failed to observe property {}: {}", name, e);
            }
        }

        // Replay a surface attached before init
        let pending = self.pending_surface.lock().unwrap().take();
        if let Some(surface) = pending {
            self.attach_surface(surface);
        }

        debug!("Engine initialized");
        Ok(())
    }

    /// Tear down the native engine and release the process-wide claim
    ///
    /// Idempotent; safe to call on an uninitialized gateway. Any attached
    /// surface is detached first.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.detach_surface();

        let mut backend = self.backend.lock().unwrap();
        backend.set_event_sink(None);
        backend.shutdown();
        drop(backend);

        self.initialized.store(false, Ordering::Release);
        ENGINE_CLAIMED.store(false, Ordering::Release);
        debug!("Engine gateway destroyed");
    }

    /// Whether `initialize_engine` has completed successfully
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire) && !self.destroyed.load(Ordering::Acquire)
    }

    /// Attach a rendering surface
    ///
    /// Before engine init the surface is remembered and replayed at init;
    /// attaching twice replaces the previous surface.
    pub fn attach_surface(&self, surface: SurfaceHandle) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        if !self.initialized.load(Ordering::Acquire) {
            *self.pending_surface.lock().unwrap() = Some(surface);
            debug!("Surface attach deferred until engine init");
            return;
        }

        let backend = self.backend.lock().unwrap();
        match backend.attach_surface(surface) {
            Ok(()) => {
                self.surface_attached.store(true, Ordering::Release);
            }
            Err(e) => warn!("Surface attach failed: {}", e),
        }
    }

    /// Detach the rendering surface; a no-op when none is attached
    pub fn detach_surface(&self) {
        *self.pending_surface.lock().unwrap() = None;
        if !self.surface_attached.swap(false, Ordering::AcqRel) {
            return;
        }

        let backend = self.backend.lock().unwrap();
        if let Err(e) = backend.detach_surface() {
            warn!("Surface detach failed: {}", e);
        }
    }

    /// Execute an ordered string-token command
    ///
    /// Forwarded synchronously to the engine's internal queue; the outcome
    /// is observed only via subsequent events or property reads. Failures
    /// are logged here; callers may additionally inspect the result.
    pub fn execute_command(&self, args: &[&str]) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let backend = self.backend.lock().unwrap();
        backend.execute_command(args).map_err(|e| {
            warn!("Command {:?} rejected: {}", args, e);
            Error::Engine(e)
        })
    }

    /// Register for asynchronous change notification on a property
    pub fn observe_property(&self, name: &str, format: PropertyFormat) -> Result<()> {
        let backend = self.backend.lock().unwrap();
        backend
            .observe_property(name, format)
            .map_err(Error::Engine)
    }

    // ========================================
    // Typed property accessors
    // ========================================
    //
    // Reads fail softly: a failure returns the documented default and is
    // logged at debug level. Callers must not assume success.

    /// Read a string property; `None` on failure
    pub fn get_property_string(&self, name: &str) -> Option<String> {
        match self.read_property(name, PropertyFormat::String) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Read an integer property; `0` on failure
    pub fn get_property_int(&self, name: &str) -> i64 {
        self.read_property(name, PropertyFormat::Int)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
    }

    /// Read a float property; `0.0` on failure
    pub fn get_property_double(&self, name: &str) -> f64 {
        self.read_property(name, PropertyFormat::Double)
            .and_then(|v| v.as_double())
            .unwrap_or(0.0)
    }

    /// Read a boolean property; `false` on failure
    pub fn get_property_bool(&self, name: &str) -> bool {
        self.read_property(name, PropertyFormat::Flag)
            .and_then(|v| v.as_flag())
            .unwrap_or(false)
    }

    fn read_property(&self, name: &str, format: PropertyFormat) -> Option<PropertyValue> {
        if !self.is_initialized() {
            return None;
        }

        let backend = self.backend.lock().unwrap();
        match backend.get_property(name, format) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Property read {} failed: {}", name, e);
                None
            }
        }
    }

    /// Write a string property
    pub fn set_property_string(&self, name: &str, value: &str) {
        self.write_property(name, PropertyValue::String(value.to_string()));
    }

    /// Write an integer property
    pub fn set_property_int(&self, name: &str, value: i64) {
        self.write_property(name, PropertyValue::Int(value));
    }

    /// Write a float property
    pub fn set_property_double(&self, name: &str, value: f64) {
        self.write_property(name, PropertyValue::Double(value));
    }

    /// Write a boolean property
    pub fn set_property_bool(&self, name: &str, value: bool) {
        self.write_property(name, PropertyValue::Flag(value));
    }

    fn write_property(&self, name: &str, value: PropertyValue) {
        if !self.is_initialized() {
            debug!("Property write {} ignored: engine not initialized", name);
            return;
        }

        let backend = self.backend.lock().unwrap();
        if let Err(e) = backend.set_property(name, value) {
            warn!("Property write {} failed: {}", name, e);
        }
    }

    /// Install (or clear) the backend's event sink
    ///
    /// Used by the dispatch hub; a second install silently replaces the
    /// first.
    pub(crate) fn set_event_sink(&self, sink: Option<EventSink>) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let mut backend = self.backend.lock().unwrap();
        backend.set_event_sink(sink);
    }
}

impl Drop for EngineGateway {
    fn drop(&mut self) {
        self.destroy();
    }
}
