//! Headless view: re-renders whole collections on each coarse
//! invalidation signal, to the log instead of a widget tree.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::engine::{SignalStrength, VolumeLevel};
use crate::meeting::roster::RosterAttendee;
use crate::meeting::{MeetingSession, VideoCollectionTile, ViewUpdate};

pub async fn run_view(session: Arc<MeetingSession>, mut updates: UnboundedReceiver<ViewUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            ViewUpdate::Roster => {
                let roster = session.roster_snapshot();
                info!(count = roster.len(), "roster");
                for attendee in &roster {
                    info!("  {}", roster_line(attendee));
                }
            }
            ViewUpdate::VideoTiles => {
                let tiles = session.video_tiles_snapshot();
                info!(count = tiles.len(), "video tiles");
                for tile in &tiles {
                    info!("  {}", tile_line(tile));
                }
            }
            ViewUpdate::ScreenTiles => {
                let tiles = session.screen_tiles_snapshot();
                info!(count = tiles.len(), "screen tiles");
                for tile in &tiles {
                    info!("  {}", tile_line(tile));
                }
            }
            ViewUpdate::Notice(message) => info!("notice: {message}"),
        }
    }
}

fn roster_line(a: &RosterAttendee) -> String {
    let speaker = if a.is_active_speaker { " *" } else { "" };
    format!(
        "{} [vol={} sig={}]{}",
        a.attendee_name,
        volume_label(a.volume_level),
        signal_label(a.signal_strength),
        speaker
    )
}

fn tile_line(t: &VideoCollectionTile) -> String {
    let kind = if t.state.is_content {
        "screen"
    } else if t.state.is_local {
        "local"
    } else {
        "remote"
    };
    format!("tile {} ({kind}) {}", t.state.tile_id, t.attendee_name)
}

fn volume_label(v: VolumeLevel) -> &'static str {
    match v {
        VolumeLevel::Muted => "muted",
        VolumeLevel::NotSpeaking => "quiet",
        VolumeLevel::Low => "low",
        VolumeLevel::Medium => "medium",
        VolumeLevel::High => "high",
    }
}

fn signal_label(s: SignalStrength) -> &'static str {
    match s {
        SignalStrength::None => "none",
        SignalStrength::Low => "low",
        SignalStrength::High => "high",
    }
}
