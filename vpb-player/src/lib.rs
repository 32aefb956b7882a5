//! # VPB Player Library (vpb-player)
//!
//! Event-dispatch and state-reconciliation layer for an external native
//! media-playback engine.
//!
//! **Purpose:** own the native engine handle, demultiplex its asynchronous
//! notifications, reconcile its independently-arriving playback signals into
//! a single coherent `PlayState`, and maintain stable track / chapter /
//! segment models on top of them.
//!
//! **Architecture:** gateway → dispatch hub → {state machine, track catalog,
//! chapter catalog}; the segment scheduler polls the gateway directly.

pub mod chapters;
pub mod engine;
pub mod error;
pub mod playback;
pub mod segments;
pub mod tracks;

pub use error::{Error, Result};
pub use playback::session::PlayerSession;
