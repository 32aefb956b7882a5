//! Playback state reconciliation and session orchestration

pub mod position;
pub mod session;
pub mod state;

pub use position::PositionInfo;
pub use session::PlayerSession;
pub use state::PlaybackStateMachine;
