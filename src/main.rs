mod app;
mod config;
mod engine;
mod meeting;
mod net;
mod verify;
mod video;
mod view;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use url::Url;

use app::{App, AppCommand};
use config::Config;
use engine::synthetic::SyntheticEngine;
use meeting::MeetingSession;
use verify::{HttpIdentityApi, IdentityApi};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::parse();
    if !cfg.synthetic {
        bail!("no device media stack is wired up yet; run with --synthetic");
    }

    let http = reqwest::Client::new();

    // Identity service init. A failure disables the capture flow for this
    // session but does not block the meeting.
    let verify_base = Url::parse(&cfg.verify_url)?;
    let api: Arc<dyn IdentityApi> = Arc::new(HttpIdentityApi::new(verify_base, http.clone()));
    let api = match api.initialize().await {
        Ok(()) => Some(api),
        Err(e) => {
            warn!("identity service init failed: {}", e.first_message());
            None
        }
    };

    let join_base = Url::parse(&cfg.join_url)?;
    let Some(meeting_response) =
        net::join::request_join(&http, &join_base, &cfg.meeting, &cfg.name, &cfg.region).await
    else {
        // User-facing failure; join aborted, no automatic retry.
        error!("unable to start the meeting, check the join URL and try again");
        return Ok(());
    };
    info!(meeting = %cfg.meeting, "joined meeting");
    debug!(bytes = meeting_response.len(), "join response payload");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let engine = SyntheticEngine::new(events_tx, &cfg.name);
    engine.start(&meeting_response);

    let session = Arc::new(MeetingSession::new(
        engine.clone(),
        cfg.max_video_tiles,
        updates_tx,
    ));
    session.set_remote_video(true);

    tokio::spawn(view::run_view(session.clone(), updates_rx));
    tokio::spawn(demo_driver(commands_tx.clone()));
    tokio::spawn(leave_on_ctrl_c(commands_tx));

    App::new(session, api, cfg.card_type.clone())
        .run(events_rx, commands_rx)
        .await;
    Ok(())
}

/// Scripted user driving the demo meeting.
async fn demo_driver(commands: UnboundedSender<AppCommand>) {
    let script = [
        (Duration::from_secs(1), AppCommand::ToggleCamera),
        (Duration::from_secs(2), AppCommand::ToggleMute),
        (Duration::from_secs(1), AppCommand::ToggleMute),
        (Duration::from_secs(2), AppCommand::Capture),
        (Duration::from_secs(6), AppCommand::Leave),
    ];
    for (delay, cmd) in script {
        sleep(delay).await;
        if commands.send(cmd).is_err() {
            return;
        }
    }
}

async fn leave_on_ctrl_c(commands: UnboundedSender<AppCommand>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = commands.send(AppCommand::Leave);
    }
}
