//! Event dispatch hub - single entry point for native notifications
//!
//! The native engine serializes its own callbacks, but they arrive on a
//! thread distinct from the control thread. The hub snapshots its listener
//! set under a lock before each dispatch round, so listener mutation during
//! dispatch never corrupts iteration and listener code never runs under the
//! registry lock.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, trace, warn};

use super::gateway::EngineGateway;
use super::protocol::{EndReason, EngineEvent, EngineLogLevel, PropertyValue};

/// Observer interface for native engine notifications
///
/// Every listener receives every event of the generic channel via
/// `on_event`; property-change, end-of-file, and log events are
/// additionally redelivered through their dedicated callbacks.
pub trait EngineEventListener: Send + Sync {
    /// Generic channel: every engine event
    fn on_event(&self, _event: &EngineEvent) {}

    /// An observed property changed
    fn on_property_change(&self, _name: &str, _value: Option<&PropertyValue>) {}

    /// The current file ended
    fn on_end_file(&self, _reason: EndReason, _error: Option<&str>) {}

    /// A native log line, classified by severity
    fn on_log_message(&self, _level: EngineLogLevel, _prefix: &str, _text: &str) {}
}

/// Demultiplexer for the native notification channel
///
/// At most one hub may be attached to the gateway at a time; a second
/// `attach` silently replaces the first.
pub struct EventDispatchHub {
    listeners: Mutex<Vec<Arc<dyn EngineEventListener>>>,
}

impl EventDispatchHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Bind this hub as the sole recipient of the gateway's event channel
    pub fn attach(self: &Arc<Self>, gateway: &EngineGateway) {
        let hub = Arc::clone(self);
        gateway.set_event_sink(Some(Arc::new(move |event| hub.dispatch(event))));
        debug!("Dispatch hub attached");
    }

    /// Unbind this hub from the gateway's event channel
    pub fn detach(&self, gateway: &EngineGateway) {
        gateway.set_event_sink(None);
        debug!("Dispatch hub detached");
    }

    /// Register a listener; adding the same listener twice is a no-op
    pub fn add_listener(&self, listener: Arc<dyn EngineEventListener>) {
        let mut listeners = self.listeners.lock().unwrap();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    /// Remove a listener; removing an unknown listener is a no-op
    pub fn remove_listener(&self, listener: &Arc<dyn EngineEventListener>) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Empty the listener set
    pub fn clear_listeners(&self) {
        self.listeners.lock().unwrap().clear();
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Single native-thread entry point: fan an event out to all listeners
    ///
    /// Listeners observe events in registration order within a round. The
    /// snapshot is taken and the lock released before any listener runs, so
    /// a listener may add or remove listeners (including itself) without
    /// deadlocking; the change takes effect from the next round.
    pub fn dispatch(&self, event: EngineEvent) {
        let snapshot: Vec<Arc<dyn EngineEventListener>> =
            self.listeners.lock().unwrap().clone();

        for listener in &snapshot {
            listener.on_event(&event);
        }

        match &event {
            EngineEvent::PropertyChange { name, value } => {
                for listener in &snapshot {
                    listener.on_property_change(name, value.as_ref());
                }
            }
            EngineEvent::EndFile { reason, error } => {
                for listener in &snapshot {
                    listener.on_end_file(*reason, error.as_deref());
                }
            }
            EngineEvent::LogMessage {
                level,
                prefix,
                text,
            } => {
                forward_log(*level, prefix, text);
                for listener in &snapshot {
                    listener.on_log_message(*level, prefix, text);
                }
            }
            _ => {}
        }
    }
}

/// Re-emit a native log line through tracing at the mapped level
fn forward_log(level: EngineLogLevel, prefix: &str, text: &str) {
    let text = text.trim_end();
    match level {
        EngineLogLevel::Fatal | EngineLogLevel::Error => error!("[{}] {}", prefix, text),
        EngineLogLevel::Warn => warn!("[{}] {}", prefix, text),
        EngineLogLevel::Info => info!("[{}] {}", prefix, text),
        EngineLogLevel::Verbose | EngineLogLevel::Debug => debug!("[{}] {}", prefix, text),
        EngineLogLevel::Trace => trace!("[{}] {}", prefix, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        events: AtomicUsize,
        property_changes: AtomicUsize,
        end_files: AtomicUsize,
        logs: AtomicUsize,
    }

    impl EngineEventListener for CountingListener {
        fn on_event(&self, _event: &EngineEvent) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }

        fn on_property_change(&self, _name: &str, _value: Option<&PropertyValue>) {
            self.property_changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_end_file(&self, _reason: EndReason, _error: Option<&str>) {
            self.end_files.fetch_add(1, Ordering::SeqCst);
        }

        fn on_log_message(&self, _level: EngineLogLevel, _prefix: &str, _text: &str) {
            self.logs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_add_listener_idempotent() {
        let hub = EventDispatchHub::new();
        let listener: Arc<dyn EngineEventListener> = Arc::new(CountingListener::default());

        hub.add_listener(Arc::clone(&listener));
        hub.add_listener(Arc::clone(&listener));
        assert_eq!(hub.listener_count(), 1);

        hub.remove_listener(&listener);
        assert_eq!(hub.listener_count(), 0);

        // Tolerant remove of an unknown listener
        hub.remove_listener(&listener);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_generic_fanout() {
        let hub = EventDispatchHub::new();
        let counting = Arc::new(CountingListener::default());
        hub.add_listener(counting.clone());

        hub.dispatch(EngineEvent::StartFile);
        hub.dispatch(EngineEvent::FileLoaded);

        assert_eq!(counting.events.load(Ordering::SeqCst), 2);
        assert_eq!(counting.property_changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_classified_redelivery() {
        let hub = EventDispatchHub::new();
        let counting = Arc::new(CountingListener::default());
        hub.add_listener(counting.clone());

        hub.dispatch(EngineEvent::PropertyChange {
            name: "pause".to_string(),
            value: Some(PropertyValue::Flag(true)),
        });
        hub.dispatch(EngineEvent::EndFile {
            reason: EndReason::Eof,
            error: None,
        });
        hub.dispatch(EngineEvent::LogMessage {
            level: EngineLogLevel::Info,
            prefix: "cplayer".to_string(),
            text: "playback started".to_string(),
        });

        // Each classified event also went through the generic channel
        assert_eq!(counting.events.load(Ordering::SeqCst), 3);
        assert_eq!(counting.property_changes.load(Ordering::SeqCst), 1);
        assert_eq!(counting.end_files.load(Ordering::SeqCst), 1);
        assert_eq!(counting.logs.load(Ordering::SeqCst), 1);
    }

    struct SelfRemovingListener {
        hub: Arc<EventDispatchHub>,
        this: Mutex<Option<Arc<dyn EngineEventListener>>>,
        fired: AtomicUsize,
    }

    impl EngineEventListener for SelfRemovingListener {
        fn on_event(&self, _event: &EngineEvent) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            if let Some(this) = self.this.lock().unwrap().take() {
                // Removing ourselves mid-dispatch must not deadlock
                self.hub.remove_listener(&this);
            }
        }
    }

    #[test]
    fn test_listener_mutation_during_dispatch() {
        let hub = EventDispatchHub::new();
        let listener = Arc::new(SelfRemovingListener {
            hub: Arc::clone(&hub),
            this: Mutex::new(None),
            fired: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn EngineEventListener> = listener.clone();
        *listener.this.lock().unwrap() = Some(Arc::clone(&as_dyn));
        hub.add_listener(as_dyn);

        hub.dispatch(EngineEvent::Idle);
        assert_eq!(listener.fired.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);

        // Removed listener no longer receives events
        hub.dispatch(EngineEvent::Idle);
        assert_eq!(listener.fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registration_order_preserved() {
        let hub = EventDispatchHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        struct OrderListener {
            tag: usize,
            order: Arc<Mutex<Vec<usize>>>,
        }
        impl EngineEventListener for OrderListener {
            fn on_event(&self, _event: &EngineEvent) {
                self.order.lock().unwrap().push(self.tag);
            }
        }

        for tag in 0..3 {
            hub.add_listener(Arc::new(OrderListener {
                tag,
                order: Arc::clone(&order),
            }));
        }

        hub.dispatch(EngineEvent::Seek);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
