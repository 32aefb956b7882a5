//! Native engine boundary
//!
//! `protocol` defines the abstract command/property/event surface of the
//! native engine; `gateway` owns the live engine handle; `dispatch` is the
//! single entry point for the engine's asynchronous notifications.

pub mod dispatch;
pub mod gateway;
pub mod protocol;

pub use dispatch::{EngineEventListener, EventDispatchHub};
pub use gateway::EngineGateway;
pub use protocol::{
    EndReason, EngineBackend, EngineError, EngineEvent, EngineLogLevel, PropertyFormat,
    PropertyValue, SurfaceHandle,
};
