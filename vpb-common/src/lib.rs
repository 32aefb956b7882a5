//! # VPB Common Library
//!
//! Shared code for the Video Playback Bridge workspace including:
//! - Event types (`PlayerEvent` enum) and the `EventBus`
//! - Configuration loading
//! - Common error types
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use events::{EventBus, PlayState, PlayerEvent};
