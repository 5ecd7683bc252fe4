//! In-meeting state: roster and tile bookkeeping driven by engine events.
//!
//! All derived-state mutation happens under one lock; the engine may
//! deliver callbacks from any of its internal threads. View layers are
//! told about changes through coarse [`ViewUpdate`] signals, whole
//! collections at a time.

pub mod roster;
pub mod tiles;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::engine::{
    AudioVideoControl, EngineError, EngineEvent, MeetingStatusCode, VideoPauseState,
    VideoTileState,
};
use crate::video::FrameSink;
use roster::{RosterAttendee, RosterTracker};
use tiles::{Admission, SlotKind, TileRegistry};

/// Re-render signals and transient user-facing notices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewUpdate {
    Roster,
    VideoTiles,
    ScreenTiles,
    Notice(String),
}

/// What the app loop should do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Leave,
}

/// A displayed tile with its owner's roster name resolved.
#[derive(Clone, Debug)]
pub struct VideoCollectionTile {
    pub attendee_name: String,
    pub state: VideoTileState,
}

struct MeetingState {
    roster: RosterTracker,
    tiles: TileRegistry,
    /// Render surfaces for admitted tiles, keyed by tile id.
    sinks: HashMap<u32, Arc<FrameSink>>,
    muted: bool,
    camera_on: bool,
}

pub struct MeetingSession {
    state: Mutex<MeetingState>,
    control: Arc<dyn AudioVideoControl>,
    updates: UnboundedSender<ViewUpdate>,
}

impl MeetingSession {
    pub fn new(
        control: Arc<dyn AudioVideoControl>,
        max_video_tiles: usize,
        updates: UnboundedSender<ViewUpdate>,
    ) -> Self {
        Self {
            state: Mutex::new(MeetingState {
                roster: RosterTracker::new(),
                tiles: TileRegistry::new(max_video_tiles),
                sinks: HashMap::new(),
                muted: false,
                camera_on: false,
            }),
            control,
            updates,
        }
    }

    /// Dispatch one engine notification.
    pub fn handle_event(&self, event: EngineEvent) -> Flow {
        match event {
            EngineEvent::AttendeesJoined(infos) => {
                self.state.lock().roster.attendees_joined(&infos);
                self.push(ViewUpdate::Roster);
            }
            EngineEvent::AttendeesLeft(infos) => {
                self.state.lock().roster.attendees_removed(&infos);
                self.push(ViewUpdate::Roster);
            }
            EngineEvent::AttendeesDropped(infos) => {
                for info in &infos {
                    self.notify(format!("{} dropped", info.external_user_id));
                }
                self.state.lock().roster.attendees_removed(&infos);
                self.push(ViewUpdate::Roster);
            }
            EngineEvent::AttendeesMuted(infos) => {
                for info in infos {
                    info!(attendee = %info.attendee_id, "attendee muted");
                }
            }
            EngineEvent::AttendeesUnmuted(infos) => {
                for info in infos {
                    info!(attendee = %info.attendee_id, "attendee unmuted");
                }
            }
            EngineEvent::VolumeChanged(updates) => {
                self.state.lock().roster.volumes_changed(&updates);
                self.push(ViewUpdate::Roster);
            }
            EngineEvent::SignalStrengthChanged(updates) => {
                self.state.lock().roster.signals_changed(&updates);
                self.push(ViewUpdate::Roster);
            }
            EngineEvent::ActiveSpeakersDetected(speakers) => {
                let changed = self.state.lock().roster.active_speakers_detected(&speakers);
                if changed {
                    self.push(ViewUpdate::Roster);
                }
            }
            EngineEvent::ActiveSpeakerScores(scores) => {
                debug!(?scores, "active speaker scores");
            }

            EngineEvent::AudioSessionStartedConnecting { reconnecting } => {
                self.notify(format!(
                    "Audio started connecting. reconnecting: {reconnecting}"
                ));
            }
            EngineEvent::AudioSessionStarted { reconnecting } => {
                self.notify(format!(
                    "Audio successfully started. reconnecting: {reconnecting}"
                ));
            }
            EngineEvent::AudioSessionDropped => self.notify("Audio session dropped"),
            EngineEvent::AudioSessionCancelledReconnect => {
                self.notify("Audio cancelled reconnecting")
            }
            EngineEvent::AudioSessionStopped(code) => {
                self.notify(format!("Audio stopped for reason: {code:?}"));
                if code != MeetingStatusCode::Ok {
                    return Flow::Leave;
                }
            }
            EngineEvent::ConnectionRecovered => self.notify("Connection quality has recovered"),
            EngineEvent::ConnectionBecamePoor => self.notify("Connection quality has become poor"),

            EngineEvent::VideoSessionStartedConnecting => self.notify("Video started connecting."),
            EngineEvent::VideoSessionStarted(code) => {
                if code == MeetingStatusCode::VideoAtCapacityViewOnly {
                    self.notify(format!("Video encountered an error: {code:?}"));
                } else {
                    self.notify(format!("Video successfully started: {code:?}"));
                }
            }
            EngineEvent::VideoSessionStopped(code) => {
                self.notify(format!("Video stopped for reason: {code:?}"));
            }

            EngineEvent::VideoTileAdded(tile) => self.on_tile_added(tile),
            EngineEvent::VideoTileRemoved(tile) => self.on_tile_removed(tile),
            EngineEvent::VideoTilePaused(tile) => {
                if tile.pause_state == VideoPauseState::PausedForPoorConnection {
                    let name = self.state.lock().roster.display_name(&tile.attendee_id);
                    self.notify(format!(
                        "Video for attendee {name} has been paused for poor network connection, \
                         video will automatically resume when connection improves"
                    ));
                }
            }
            EngineEvent::VideoTileResumed(tile) => {
                let name = self.state.lock().roster.display_name(&tile.attendee_id);
                self.notify(format!("Video for attendee {name} has been unpaused"));
            }

            EngineEvent::MetricsReceived(metrics) => {
                debug!(?metrics, "media metrics received");
            }
        }
        Flow::Continue
    }

    fn on_tile_added(&self, tile: VideoTileState) {
        info!(
            tile = tile.tile_id,
            attendee = %tile.attendee_id,
            content = tile.is_content,
            "video tile added"
        );

        let (admission, sink) = {
            let mut st = self.state.lock();
            let admission = st.tiles.add(tile.clone());
            let sink = match admission {
                Admission::Active | Admission::Screen => {
                    let sink = Arc::new(FrameSink::new());
                    st.sinks.insert(tile.tile_id, sink.clone());
                    Some(sink)
                }
                Admission::Queued | Admission::Dropped => None,
            };
            (admission, sink)
        };

        // Bind outside the state lock; the engine owns its own locking.
        if let Some(sink) = sink {
            self.control.bind_video_view(tile.tile_id, sink);
        }
        match admission {
            Admission::Active => self.push(ViewUpdate::VideoTiles),
            Admission::Screen => self.push(ViewUpdate::ScreenTiles),
            Admission::Queued => debug!(tile = tile.tile_id, "video tile queued"),
            Admission::Dropped => debug!(tile = tile.tile_id, "video tile dropped"),
        }
    }

    fn on_tile_removed(&self, tile: VideoTileState) {
        info!(tile = tile.tile_id, attendee = %tile.attendee_id, "video tile removed");
        self.control.unbind_video_view(tile.tile_id);

        let (removal, promoted_sink) = {
            let mut st = self.state.lock();
            st.sinks.remove(&tile.tile_id);
            let removal = st.tiles.remove(tile.tile_id);
            let promoted_sink = removal.promoted.as_ref().map(|next| {
                let sink = Arc::new(FrameSink::new());
                st.sinks.insert(next.tile_id, sink.clone());
                sink
            });
            (removal, promoted_sink)
        };

        if let (Some(next), Some(sink)) = (&removal.promoted, promoted_sink) {
            self.control.bind_video_view(next.tile_id, sink);
        }
        match removal.removed {
            Some(SlotKind::Active) => self.push(ViewUpdate::VideoTiles),
            Some(SlotKind::Screen) => self.push(ViewUpdate::ScreenTiles),
            Some(SlotKind::Pending) | None => {}
        }
    }

    /// Flip the local mute state. Engine errors surface as a notice and
    /// leave the state unchanged.
    pub fn toggle_mute(&self) {
        let muted = self.state.lock().muted;
        let res = if muted {
            self.control.local_unmute()
        } else {
            self.control.local_mute()
        };
        match res {
            Ok(()) => self.state.lock().muted = !muted,
            Err(e) => self.engine_error("mute", e),
        }
    }

    /// Flip the local camera. A permission denial is surfaced once and not
    /// retried.
    pub fn toggle_camera(&self) {
        let camera_on = self.state.lock().camera_on;
        let res = if camera_on {
            self.control.stop_local_video()
        } else {
            self.control.start_local_video()
        };
        match res {
            Ok(()) => self.state.lock().camera_on = !camera_on,
            Err(e) => self.engine_error("camera", e),
        }
    }

    /// Start or stop rendering of remote streams (tab switches in the
    /// original demo).
    pub fn set_remote_video(&self, enabled: bool) {
        if enabled {
            self.control.start_remote_video();
        } else {
            self.control.stop_remote_video();
        }
    }

    fn engine_error(&self, what: &str, e: EngineError) {
        match e {
            EngineError::PermissionDenied(_) => {
                self.notify(format!("Permission to use the {what} was denied"));
            }
            other => warn!(error = %other, "{what} request failed"),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn is_camera_on(&self) -> bool {
        self.state.lock().camera_on
    }

    /// Render surface of the displayed local tile, if the camera is up.
    pub fn local_frame_sink(&self) -> Option<Arc<FrameSink>> {
        let st = self.state.lock();
        let local_id = st
            .tiles
            .active_tiles()
            .iter()
            .find(|t| t.is_local)
            .map(|t| t.tile_id)?;
        st.sinks.get(&local_id).cloned()
    }

    pub fn roster_snapshot(&self) -> Vec<RosterAttendee> {
        self.state.lock().roster.attendees().cloned().collect()
    }

    pub fn video_tiles_snapshot(&self) -> Vec<VideoCollectionTile> {
        let st = self.state.lock();
        st.tiles
            .active_tiles()
            .into_iter()
            .map(|t| VideoCollectionTile {
                attendee_name: st.roster.display_name(&t.attendee_id),
                state: t.clone(),
            })
            .collect()
    }

    pub fn screen_tiles_snapshot(&self) -> Vec<VideoCollectionTile> {
        let st = self.state.lock();
        st.tiles
            .screen_tile()
            .map(|t| VideoCollectionTile {
                attendee_name: st.roster.display_name(&t.attendee_id),
                state: t.clone(),
            })
            .into_iter()
            .collect()
    }

    /// Transient user-facing message (the toast of the original demo).
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push(ViewUpdate::Notice(message));
    }

    fn push(&self, update: ViewUpdate) {
        // The view side hanging up is not an error worth surfacing.
        let _ = self.updates.send(update);
    }
}
