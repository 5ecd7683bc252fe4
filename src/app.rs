//! App event loop.
//!
//! One task owns all meeting-state mutation: engine notifications and user
//! commands funnel into it as messages, and long-running network work
//! (the identity upload chain) is spawned onto the runtime with its
//! outcome marshaled back as a notice.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::engine::EngineEvent;
use crate::meeting::{Flow, MeetingSession};
use crate::verify::{self, IdentityApi};
use crate::video;

#[derive(Clone, Copy, Debug)]
pub enum AppCommand {
    ToggleMute,
    ToggleCamera,
    Capture,
    Leave,
}

pub struct App {
    session: Arc<MeetingSession>,
    /// `None` when identity init failed; the capture flow is then disabled
    /// for the session.
    api: Option<Arc<dyn IdentityApi>>,
    card_type: String,
}

impl App {
    pub fn new(
        session: Arc<MeetingSession>,
        api: Option<Arc<dyn IdentityApi>>,
        card_type: String,
    ) -> Self {
        Self {
            session,
            api,
            card_type,
        }
    }

    /// Run until the meeting ends or a leave command arrives. A left
    /// meeting simply stops consuming engine callbacks.
    pub async fn run(
        &self,
        mut events: UnboundedReceiver<EngineEvent>,
        mut commands: UnboundedReceiver<AppCommand>,
    ) {
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    None => break,
                    Some(ev) => {
                        if self.session.handle_event(ev) == Flow::Leave {
                            break;
                        }
                    }
                },
                cmd = commands.recv() => match cmd {
                    None | Some(AppCommand::Leave) => break,
                    Some(AppCommand::ToggleMute) => self.session.toggle_mute(),
                    Some(AppCommand::ToggleCamera) => self.session.toggle_camera(),
                    Some(AppCommand::Capture) => self.capture_and_verify(),
                },
            }
        }
        info!("left meeting");
    }

    /// Capture the latest local frame and run the identity check in the
    /// background. Every failure short of the upload itself is surfaced as
    /// a notice and dropped; nothing here is fatal.
    fn capture_and_verify(&self) {
        let Some(api) = self.api.clone() else {
            self.session.notify("Identity service is not available");
            return;
        };
        let Some(sink) = self.session.local_frame_sink() else {
            self.session.notify("Turn on your camera before capturing");
            return;
        };
        // Empty capture (no frame yet, or conversion failed) is not an error.
        let Some(img) = sink.capture() else {
            self.session.notify("No video frame available to capture");
            return;
        };
        info!(width = img.width(), height = img.height(), "captured local frame");

        let png = match video::encode_png(&img) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("png encode failed: {e:#}");
                return;
            }
        };

        let session = self.session.clone();
        let card_type = self.card_type.clone();
        let label = format!("id_card.{card_type}.front");
        tokio::spawn(async move {
            match verify::run_id_check(api.as_ref(), png, &label, &card_type).await {
                Ok(_card) => session.notify("Identity check completed"),
                Err(e) => error!("identity check failed: {}", e.first_message()),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioVideoControl, EngineResult, MeetingStatusCode};
    use crate::meeting::ViewUpdate;
    use crate::video::FrameSink;
    use tokio::sync::mpsc;

    struct NullControl;

    impl AudioVideoControl for NullControl {
        fn local_mute(&self) -> EngineResult<()> {
            Ok(())
        }
        fn local_unmute(&self) -> EngineResult<()> {
            Ok(())
        }
        fn start_local_video(&self) -> EngineResult<()> {
            Ok(())
        }
        fn stop_local_video(&self) -> EngineResult<()> {
            Ok(())
        }
        fn start_remote_video(&self) {}
        fn stop_remote_video(&self) {}
        fn bind_video_view(&self, _tile_id: u32, _sink: std::sync::Arc<FrameSink>) {}
        fn unbind_video_view(&self, _tile_id: u32) {}
    }

    fn app() -> (App, mpsc::UnboundedReceiver<ViewUpdate>) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let session = Arc::new(MeetingSession::new(Arc::new(NullControl), 4, updates_tx));
        (App::new(session, None, "vn.national_id".into()), updates_rx)
    }

    #[tokio::test]
    async fn leave_command_stops_the_loop() {
        let (app, _updates) = app();
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        commands_tx.send(AppCommand::Leave).unwrap();
        app.run(events_rx, commands_rx).await;
    }

    #[tokio::test]
    async fn fatal_audio_stop_ends_the_loop() {
        let (app, _updates) = app();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (_commands_tx, commands_rx) = mpsc::unbounded_channel();

        events_tx
            .send(EngineEvent::AudioSessionStopped(
                MeetingStatusCode::AudioDisconnected,
            ))
            .unwrap();
        app.run(events_rx, commands_rx).await;
    }

    #[tokio::test]
    async fn capture_without_identity_service_yields_a_notice() {
        let (app, mut updates) = app();
        app.capture_and_verify();
        assert!(matches!(
            updates.try_recv().unwrap(),
            ViewUpdate::Notice(m) if m.contains("not available")
        ));
    }
}
