//! Boundary to the vendor real-time media engine.
//!
//! The engine delivers notifications on its own internal threads; they are
//! handed off to the app loop as [`EngineEvent`] messages. Calls back into
//! the engine go through [`AudioVideoControl`].

pub mod synthetic;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::video::FrameSink;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("engine unavailable: {0}")]
    Unavailable(&'static str),
}

/// Identity of a participant as the engine reports it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttendeeInfo {
    /// Session-scoped unique id.
    pub attendee_id: String,
    /// Caller-supplied identity, formatted `<uuid>#<display name>`.
    pub external_user_id: String,
}

impl AttendeeInfo {
    pub fn new(attendee_id: impl Into<String>, external_user_id: impl Into<String>) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            external_user_id: external_user_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeLevel {
    Muted,
    NotSpeaking,
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalStrength {
    None,
    Low,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoPauseState {
    Unpaused,
    PausedByUserRequest,
    PausedForPoorConnection,
}

/// Snapshot of one renderable video stream. Supplied by the engine and
/// treated as immutable per event.
#[derive(Clone, Debug)]
pub struct VideoTileState {
    /// Session-scoped unique tile id.
    pub tile_id: u32,
    /// Owning attendee. Empty for tiles the engine has not attributed yet.
    pub attendee_id: String,
    /// Screen/content share rather than camera video.
    pub is_content: bool,
    pub is_local: bool,
    pub pause_state: VideoPauseState,
}

impl VideoTileState {
    pub fn remote(tile_id: u32, attendee_id: impl Into<String>) -> Self {
        Self {
            tile_id,
            attendee_id: attendee_id.into(),
            is_content: false,
            is_local: false,
            pause_state: VideoPauseState::Unpaused,
        }
    }

    pub fn local(tile_id: u32, attendee_id: impl Into<String>) -> Self {
        Self {
            is_local: true,
            ..Self::remote(tile_id, attendee_id)
        }
    }

    pub fn content(tile_id: u32, attendee_id: impl Into<String>) -> Self {
        Self {
            is_content: true,
            ..Self::remote(tile_id, attendee_id)
        }
    }
}

/// Session status the engine attaches to lifecycle notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeetingStatusCode {
    Ok,
    AudioDisconnected,
    VideoAtCapacityViewOnly,
}

/// Notifications from the engine. Batched per event type; no ordering
/// guarantee across event types.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    AttendeesJoined(Vec<AttendeeInfo>),
    AttendeesLeft(Vec<AttendeeInfo>),
    AttendeesDropped(Vec<AttendeeInfo>),
    AttendeesMuted(Vec<AttendeeInfo>),
    AttendeesUnmuted(Vec<AttendeeInfo>),
    VolumeChanged(Vec<(AttendeeInfo, VolumeLevel)>),
    SignalStrengthChanged(Vec<(AttendeeInfo, SignalStrength)>),
    ActiveSpeakersDetected(Vec<AttendeeInfo>),
    ActiveSpeakerScores(HashMap<String, f64>),

    AudioSessionStartedConnecting { reconnecting: bool },
    AudioSessionStarted { reconnecting: bool },
    AudioSessionDropped,
    AudioSessionCancelledReconnect,
    AudioSessionStopped(MeetingStatusCode),
    ConnectionRecovered,
    ConnectionBecamePoor,

    VideoSessionStartedConnecting,
    VideoSessionStarted(MeetingStatusCode),
    VideoSessionStopped(MeetingStatusCode),
    VideoTileAdded(VideoTileState),
    VideoTileRemoved(VideoTileState),
    VideoTilePaused(VideoTileState),
    VideoTileResumed(VideoTileState),

    MetricsReceived(HashMap<String, f64>),
}

/// Calls the app makes back into the engine.
///
/// Implementations must be callable from any thread; the engine owns the
/// actual media work and reports outcomes through [`EngineEvent`]s.
pub trait AudioVideoControl: Send + Sync {
    fn local_mute(&self) -> EngineResult<()>;
    fn local_unmute(&self) -> EngineResult<()>;

    fn start_local_video(&self) -> EngineResult<()>;
    fn stop_local_video(&self) -> EngineResult<()>;

    fn start_remote_video(&self);
    fn stop_remote_video(&self);

    /// Attach a tile's decoded frames to a render surface.
    fn bind_video_view(&self, tile_id: u32, sink: Arc<FrameSink>);
    fn unbind_video_view(&self, tile_id: u32);
}
