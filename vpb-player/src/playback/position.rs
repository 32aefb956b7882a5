//! Playback position reads

use std::time::Duration;

use crate::engine::gateway::EngineGateway;
use crate::engine::protocol::props;
use vpb_common::time::secs_to_duration;

/// One sample of the engine's playback position
///
/// All fields are non-negative; the buffered position never precedes the
/// active position and never exceeds the duration when one is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionInfo {
    /// Active playback position
    pub position: Duration,
    /// Buffered-ahead position
    pub buffered: Duration,
    /// Total duration; zero when unknown
    pub duration: Duration,
}

impl PositionInfo {
    /// Sample the engine's position properties through the gateway
    ///
    /// Each read fails softly to zero, so a sample taken with no file loaded
    /// is all-zero rather than an error.
    pub fn read(gateway: &EngineGateway) -> Self {
        let position = secs_to_duration(gateway.get_property_double(props::TIME_POS));
        let buffered = secs_to_duration(gateway.get_property_double(props::CACHE_TIME));
        let duration = secs_to_duration(gateway.get_property_double(props::DURATION));
        Self::normalized(position, buffered, duration)
    }

    /// Clamp the raw readings into a coherent sample
    pub fn normalized(position: Duration, buffered: Duration, duration: Duration) -> Self {
        let mut buffered = buffered.max(position);
        if duration > Duration::ZERO {
            buffered = buffered.min(duration);
        }
        let position = if duration > Duration::ZERO {
            position.min(duration)
        } else {
            position
        };
        Self {
            position,
            buffered,
            duration,
        }
    }
}
