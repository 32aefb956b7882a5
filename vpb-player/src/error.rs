//! Error types for vpb-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Recoverable conditions (property read failures, malformed
//! inventories, rejected commands) are absorbed where they are detected and
//! never surface through this type.

use crate::engine::protocol::EngineError;
use thiserror::Error;

/// Main error type for vpb-player
#[derive(Error, Debug)]
pub enum Error {
    /// Native engine call failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// A live engine instance already exists
    #[error("Engine instance already live; destroy it before creating another")]
    EngineAlreadyLive,

    /// Operation requires an initialized engine
    #[error("Engine not initialized")]
    NotInitialized,

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session lifecycle error
    #[error("Session error: {0}")]
    Session(String),

    /// Shared error from vpb-common
    #[error(transparent)]
    Common(#[from] vpb_common::Error),
}

/// Convenience Result type using vpb-player Error
pub type Result<T> = std::result::Result<T, Error>;
