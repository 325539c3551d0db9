use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{ByteUnits, HttpMethod, HttpVersion};
use crate::engine::LoadPlan;
use crate::http::{ClientSettings, RequestTemplate};

/// On-disk configuration (`.toml` or `.json`).
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub req: Option<RequestSection>,
    pub res: Option<ResponseSection>,
    pub exec: Option<ExecSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestSection {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    /// `Key: Value` entries.
    pub headers: Option<Vec<String>>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    /// `name=value` or `@name=path` entries.
    pub form: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseSection {
    pub code: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecSection {
    pub concurrency: Option<usize>,
    pub duration_seconds: Option<u64>,
    pub ramp_seconds: Option<u64>,
    pub dial_timeout_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub http_version: Option<HttpVersion>,
    pub spacing_millis: Option<u64>,
    pub log_sampling: Option<f64>,
    pub byte_units: Option<ByteUnits>,
    pub skip_preflight: Option<bool>,
}

/// Fully validated run parameters handed to the engine and its collaborators.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub template: RequestTemplate,
    pub plan: LoadPlan,
    pub client: ClientSettings,
    pub output: Option<PathBuf>,
    pub log_sampling: f64,
    pub byte_units: ByteUnits,
    pub skip_preflight: bool,
    pub progress: bool,
}

impl RunConfig {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.plan.duration
    }
}
