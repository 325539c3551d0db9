use std::net::IpAddr;
use std::time::Duration;

use reqwest::header::SERVER;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http::{ClientSettings, RequestTemplate, build_client};

pub const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);
pub const NOT_DETECTED: &str = "not detected";

/// What a single request learned about the target before the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteSample {
    pub server: Option<String>,
    pub http_version: Option<String>,
    pub remote_ip: Option<IpAddr>,
}

impl RemoteSample {
    #[must_use]
    pub const fn ip_family(&self) -> Option<&'static str> {
        match self.remote_ip {
            Some(IpAddr::V4(_)) => Some("IPV4"),
            Some(IpAddr::V6(_)) => Some("IPV6"),
            None => None,
        }
    }

    #[must_use]
    pub fn server_label(&self) -> &str {
        self.server.as_deref().unwrap_or(NOT_DETECTED)
    }

    #[must_use]
    pub fn version_label(&self) -> &str {
        self.http_version.as_deref().unwrap_or(NOT_DETECTED)
    }

    #[must_use]
    pub fn remote_label(&self) -> String {
        match (self.remote_ip, self.ip_family()) {
            (Some(ip), Some(family)) => format!("{} ({})", ip, family),
            _ => NOT_DETECTED.to_owned(),
        }
    }
}

/// Sends one request through a dedicated client and records what came back.
///
/// Gives up after [`PREFLIGHT_TIMEOUT`] or when `cancel` fires; any failure
/// yields an empty sample.
pub async fn sample_remote(
    template: &RequestTemplate,
    settings: &ClientSettings,
    cancel: CancellationToken,
) -> RemoteSample {
    tokio::select! {
        () = cancel.cancelled() => {
            debug!("Preflight sample cancelled");
            RemoteSample::default()
        }
        sample = tokio::time::timeout(PREFLIGHT_TIMEOUT, probe_once(template, settings)) => {
            sample.unwrap_or_else(|_elapsed| {
                debug!("Preflight sample timed out after {:?}", PREFLIGHT_TIMEOUT);
                RemoteSample::default()
            })
        }
    }
}

async fn probe_once(template: &RequestTemplate, settings: &ClientSettings) -> RemoteSample {
    let client = match build_client(settings) {
        Ok(client) => client,
        Err(err) => {
            debug!("Preflight client unavailable: {}", err);
            return RemoteSample::default();
        }
    };
    let request = match template.materialize(&client) {
        Ok(request) => request,
        Err(err) => {
            debug!("Preflight request unavailable: {}", err);
            return RemoteSample::default();
        }
    };
    match client.execute(request).await {
        Ok(response) => RemoteSample {
            server: response
                .headers()
                .get(SERVER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            http_version: Some(format!("{:?}", response.version())),
            remote_ip: response.remote_addr().map(|addr| addr.ip()),
        },
        Err(err) => {
            debug!("Preflight request failed: {}", err);
            RemoteSample::default()
        }
    }
}
