use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "huddle-client", about = "Meeting demo client")]
pub struct Config {
    /// Base URL of the serverless join endpoint (POST <base>join?...).
    #[arg(long, env = "HUDDLE_JOIN_URL", default_value = "http://127.0.0.1:8080/Prod/")]
    pub join_url: String,

    /// Meeting title to join or create.
    #[arg(long, default_value = "huddle-demo")]
    pub meeting: String,

    /// Your display name in the roster.
    #[arg(long, default_value = "guest")]
    pub name: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Maximum displayed video tiles, one slot reserved for the local tile.
    #[arg(long, default_value_t = 4)]
    pub max_video_tiles: usize,

    /// Base URL of the identity-verification API.
    #[arg(long, env = "HUDDLE_VERIFY_URL", default_value = "http://127.0.0.1:8090/v1/")]
    pub verify_url: String,

    /// Card type for the capture-and-verify flow.
    #[arg(long, default_value = "vn.national_id")]
    pub card_type: String,

    /// Run against the built-in scripted engine instead of a device media
    /// stack.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub synthetic: bool,
}
