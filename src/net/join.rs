//! Join request against the meeting-serverless demo endpoint.

use anyhow::{Context, Result};
use tracing::{error, info};
use url::Url;

/// The demo endpoint expects blanks collapsed to `+` before url-encoding.
pub fn normalize_param(s: &str) -> String {
    s.trim().split_whitespace().collect::<Vec<_>>().join("+")
}

pub fn build_join_url(base: &Url, title: &str, name: &str, region: &str) -> Result<Url> {
    let mut url = base.join("join").context("building join url")?;
    url.query_pairs_mut()
        .append_pair("title", &normalize_param(title))
        .append_pair("name", &normalize_param(name))
        .append_pair("region", &normalize_param(region));
    Ok(url)
}

/// POST the join request. HTTP 200 yields the opaque response body,
/// forwarded verbatim to the in-meeting screen; any other status or a
/// transport failure yields `None`. No retry.
pub async fn request_join(
    http: &reqwest::Client,
    base: &Url,
    title: &str,
    name: &str,
    region: &str,
) -> Option<String> {
    let url = match build_join_url(base, title, name, region) {
        Ok(url) => url,
        Err(e) => {
            error!("bad join url: {e:#}");
            return None;
        }
    };

    info!(%url, "joining meeting");
    match http.post(url).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => match resp.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                error!("reading join response failed: {e}");
                None
            }
        },
        Ok(resp) => {
            error!(status = %resp.status(), "unable to join meeting");
            None
        }
        Err(e) => {
            error!("there was an exception while joining the meeting: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_collapse_whitespace_runs_to_plus() {
        assert_eq!(normalize_param("  weekly sync  "), "weekly+sync");
        assert_eq!(normalize_param("a \t b\nc"), "a+b+c");
        assert_eq!(normalize_param("plain"), "plain");
        assert_eq!(normalize_param("   "), "");
    }

    #[test]
    fn join_url_carries_encoded_query() {
        let base = Url::parse("https://meet.example.com/Prod/").unwrap();
        let url = build_join_url(&base, "my room", "Jo Doe", "us-east-1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://meet.example.com/Prod/join?title=my%2Broom&name=Jo%2BDoe&region=us-east-1"
        );
    }
}
