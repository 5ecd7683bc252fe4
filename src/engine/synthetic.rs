//! Scripted stand-in for the real media engine.
//!
//! Emits a canned timeline of attendee/volume/tile events and pushes
//! synthetic frames into bound render sinks, so the client runs end to end
//! without a device media stack.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    AttendeeInfo, AudioVideoControl, EngineError, EngineEvent, EngineResult, MeetingStatusCode,
    SignalStrength, VideoTileState, VolumeLevel,
};
use crate::video::{FrameSink, VideoFrame};

const LOCAL_TILE_ID: u32 = 0;
const REMOTE_NAMES: [&str; 5] = ["Ana", "Badri", "Chiyo", "Dmitri", "Eitan"];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const STEP: Duration = Duration::from_millis(400);

pub struct SyntheticEngine {
    events: UnboundedSender<EngineEvent>,
    sinks: Mutex<HashMap<u32, Arc<FrameSink>>>,
    local: AttendeeInfo,
}

impl SyntheticEngine {
    pub fn new(events: UnboundedSender<EngineEvent>, display_name: &str) -> Arc<Self> {
        let id = Uuid::new_v4();
        Arc::new(Self {
            events,
            sinks: Mutex::new(HashMap::new()),
            local: AttendeeInfo::new(id.to_string(), format!("{id}#{display_name}")),
        })
    }

    /// Start the event script and the frame pump. The opaque join payload
    /// stands in for the session configuration a real engine would parse.
    pub fn start(self: &Arc<Self>, meeting_response: &str) {
        debug!(bytes = meeting_response.len(), "synthetic engine configured");
        tokio::spawn(self.clone().run_script());
        tokio::spawn(self.clone().pump_frames());
    }

    fn emit(&self, event: EngineEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn try_emit(&self, event: EngineEvent) -> EngineResult<()> {
        if self.emit(event) {
            Ok(())
        } else {
            Err(EngineError::Unavailable("engine stopped"))
        }
    }

    async fn run_script(self: Arc<Self>) {
        macro_rules! step {
            ($ev:expr) => {
                if !self.emit($ev) {
                    return;
                }
                sleep(STEP).await;
            };
        }

        step!(EngineEvent::AudioSessionStartedConnecting { reconnecting: false });
        step!(EngineEvent::AudioSessionStarted { reconnecting: false });
        step!(EngineEvent::AttendeesJoined(vec![self.local.clone()]));

        let remotes: Vec<AttendeeInfo> = REMOTE_NAMES
            .iter()
            .map(|name| {
                let id = Uuid::new_v4();
                AttendeeInfo::new(id.to_string(), format!("{id}#{name}"))
            })
            .collect();
        step!(EngineEvent::AttendeesJoined(remotes.clone()));
        step!(EngineEvent::VideoSessionStartedConnecting);
        step!(EngineEvent::VideoSessionStarted(MeetingStatusCode::Ok));

        // One camera tile per remote; more than the default capacity.
        for (i, remote) in remotes.iter().enumerate() {
            step!(EngineEvent::VideoTileAdded(VideoTileState::remote(
                100 + i as u32,
                &remote.attendee_id,
            )));
        }

        // A content share from the first remote, joining the roster with
        // the reserved suffix.
        let share = AttendeeInfo::new(
            format!("{}#content", remotes[0].attendee_id),
            remotes[0].external_user_id.clone(),
        );
        step!(EngineEvent::AttendeesJoined(vec![share.clone()]));
        step!(EngineEvent::VideoTileAdded(VideoTileState::content(
            200,
            &share.attendee_id,
        )));

        for round in 0..4u32 {
            let volumes = remotes
                .iter()
                .map(|r| (r.clone(), random_volume()))
                .collect();
            step!(EngineEvent::VolumeChanged(volumes));

            let speaker = remotes[round as usize % remotes.len()].clone();
            if !self.emit(EngineEvent::ActiveSpeakerScores(HashMap::from([(
                speaker.attendee_id.clone(),
                0.9,
            )]))) {
                return;
            }
            step!(EngineEvent::ActiveSpeakersDetected(vec![speaker]));

            if round == 1 {
                let weak = remotes[2].clone();
                step!(EngineEvent::SignalStrengthChanged(vec![(
                    weak,
                    SignalStrength::Low
                )]));
            }
        }

        // Drop a shown tile so a queued one gets promoted.
        step!(EngineEvent::VideoTileRemoved(VideoTileState::remote(
            101,
            &remotes[1].attendee_id,
        )));

        step!(EngineEvent::ConnectionBecamePoor);
        step!(EngineEvent::AudioSessionDropped);
        step!(EngineEvent::AudioSessionStartedConnecting { reconnecting: true });
        step!(EngineEvent::AudioSessionCancelledReconnect);
        step!(EngineEvent::AudioSessionStartedConnecting { reconnecting: true });
        step!(EngineEvent::AudioSessionStarted { reconnecting: true });
        let mut paused = VideoTileState::remote(100, &remotes[0].attendee_id);
        paused.pause_state = super::VideoPauseState::PausedForPoorConnection;
        step!(EngineEvent::VideoTilePaused(paused.clone()));
        step!(EngineEvent::ConnectionRecovered);
        step!(EngineEvent::VideoTileResumed(paused));

        step!(EngineEvent::AttendeesLeft(vec![remotes[3].clone()]));
        step!(EngineEvent::AttendeesDropped(vec![remotes[4].clone()]));
        step!(EngineEvent::MetricsReceived(HashMap::from([
            ("audioSendBitrate".to_string(), 32_000.0),
            ("videoReceiveBitrate".to_string(), 512_000.0),
        ])));
        step!(EngineEvent::VideoSessionStopped(MeetingStatusCode::Ok));

        info!("synthetic script finished; engine stays idle");
    }

    /// Push a frame into every bound sink at a steady rate.
    async fn pump_frames(self: Arc<Self>) {
        let mut luma = 0u8;
        loop {
            sleep(FRAME_INTERVAL).await;
            if self.events.is_closed() {
                return;
            }
            luma = luma.wrapping_add(8);
            let frame = VideoFrame::solid(320, 240, 64 + luma / 2, 128, 128);
            for sink in self.sinks.lock().values() {
                sink.render_frame(frame.clone());
            }
        }
    }
}

impl AudioVideoControl for SyntheticEngine {
    fn local_mute(&self) -> EngineResult<()> {
        self.try_emit(EngineEvent::AttendeesMuted(vec![self.local.clone()]))
    }

    fn local_unmute(&self) -> EngineResult<()> {
        self.try_emit(EngineEvent::AttendeesUnmuted(vec![self.local.clone()]))
    }

    fn start_local_video(&self) -> EngineResult<()> {
        self.try_emit(EngineEvent::VideoTileAdded(VideoTileState::local(
            LOCAL_TILE_ID,
            &self.local.attendee_id,
        )))
    }

    fn stop_local_video(&self) -> EngineResult<()> {
        self.try_emit(EngineEvent::VideoTileRemoved(VideoTileState::local(
            LOCAL_TILE_ID,
            &self.local.attendee_id,
        )))
    }

    fn start_remote_video(&self) {
        debug!("remote video rendering enabled");
    }

    fn stop_remote_video(&self) {
        debug!("remote video rendering disabled");
    }

    fn bind_video_view(&self, tile_id: u32, sink: Arc<FrameSink>) {
        self.sinks.lock().insert(tile_id, sink);
    }

    fn unbind_video_view(&self, tile_id: u32) {
        self.sinks.lock().remove(&tile_id);
    }
}

fn random_volume() -> VolumeLevel {
    match rand::random::<u8>() % 5 {
        0 => VolumeLevel::Muted,
        1 => VolumeLevel::NotSpeaking,
        2 => VolumeLevel::Low,
        3 => VolumeLevel::Medium,
        _ => VolumeLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn local_video_toggle_emits_tile_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = SyntheticEngine::new(tx, "me");

        engine.start_local_video().unwrap();
        engine.stop_local_video().unwrap();

        match rx.try_recv().unwrap() {
            EngineEvent::VideoTileAdded(tile) => {
                assert!(tile.is_local);
                assert_eq!(tile.tile_id, LOCAL_TILE_ID);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::VideoTileRemoved(_)
        ));
    }

    #[tokio::test]
    async fn bound_sinks_receive_pumped_frames() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = SyntheticEngine::new(tx, "me");
        let sink = Arc::new(FrameSink::new());
        engine.bind_video_view(7, sink.clone());

        tokio::spawn(engine.clone().pump_frames());
        tokio::time::sleep(FRAME_INTERVAL * 3).await;
        assert!(sink.has_frame());

        engine.unbind_video_view(7);
        assert!(engine.sinks.lock().is_empty());
    }
}
