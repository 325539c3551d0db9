use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::args::{ByteUnits, DEFAULT_LOG_SAMPLING, SurgeArgs};
use crate::engine::LoadPlan;
use crate::error::{AppError, AppResult, HttpError, ValidationError};
use crate::http::{ClientSettings, RequestTemplate, TemplateBody};

use super::types::RunConfig;

const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";
const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Validates merged arguments and freezes them into a [`RunConfig`].
///
/// # Errors
///
/// Returns an error when the URL is missing or unusable, the ramp does not fit
/// the duration, the request template is malformed, or a form file cannot be
/// read.
pub fn build_run_config(args: &SurgeArgs) -> AppResult<RunConfig> {
    let url = parse_target_url(args.url.as_deref())?;

    let concurrency = args.concurrency.get();
    if u32::try_from(concurrency).is_err() {
        return Err(AppError::validation(ValidationError::ConcurrencyTooLarge {
            value: concurrency,
            max: usize::try_from(u32::MAX).unwrap_or(usize::MAX),
        }));
    }

    let duration_secs = args.duration.get();
    if args.ramp.saturating_mul(2) > duration_secs {
        return Err(AppError::validation(ValidationError::RampTooLong {
            ramp_secs: args.ramp,
            duration_secs,
        }));
    }

    let log_sampling = normalize_sampling(args.log_sampling);
    let body = resolve_body(args)?;
    let template = RequestTemplate::new(
        args.method,
        url,
        &args.headers,
        args.content_type.as_deref(),
        body,
    )?;

    let plan = LoadPlan {
        concurrency,
        duration: Duration::from_secs(duration_secs),
        ramp: Duration::from_secs(args.ramp),
        spacing: (args.spacing_ms > 0).then(|| Duration::from_millis(args.spacing_ms)),
        target_status: args.status,
    };

    let client = ClientSettings {
        http_version: args.http_version,
        dial_timeout: Duration::from_secs(args.dial_timeout.get()),
        request_timeout: args
            .timeout
            .map(|timeout| Duration::from_secs(timeout.get())),
    };

    Ok(RunConfig {
        template,
        plan,
        client,
        output: args.output.clone(),
        log_sampling,
        byte_units: if args.binary_units {
            ByteUnits::Iec
        } else {
            ByteUnits::Si
        },
        skip_preflight: args.skip_preflight,
        progress: !args.no_progress,
    })
}

fn parse_target_url(raw: Option<&str>) -> AppResult<Url> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation(ValidationError::MissingUrl))?;
    let url = Url::parse(raw).map_err(|err| {
        AppError::http(HttpError::InvalidUrl {
            url: raw.to_owned(),
            source: err,
        })
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::validation(ValidationError::UnsupportedScheme {
            url: raw.to_owned(),
        }));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::validation(ValidationError::MissingHost {
            url: raw.to_owned(),
        }));
    }
    Ok(url)
}

fn normalize_sampling(value: f64) -> f64 {
    if value > 0.0 && value <= 1.0 {
        return value;
    }
    warn!(
        "Log sampling {} is outside (0, 1]; using {}.",
        value, DEFAULT_LOG_SAMPLING
    );
    DEFAULT_LOG_SAMPLING
}

fn resolve_body(args: &SurgeArgs) -> AppResult<TemplateBody> {
    let content_type = args
        .content_type
        .as_deref()
        .map(|value| value.trim().to_ascii_lowercase());
    let wants_multipart = content_type
        .as_deref()
        .is_some_and(|value| value.starts_with(MULTIPART_CONTENT_TYPE));
    let wants_urlencoded = content_type
        .as_deref()
        .is_some_and(|value| value.starts_with(URLENCODED_CONTENT_TYPE));

    if args.form.is_empty() {
        if wants_multipart {
            return Err(AppError::validation(ValidationError::MultipartWithoutForm));
        }
        return Ok(TemplateBody::text(&args.data));
    }

    if wants_urlencoded {
        TemplateBody::url_encoded(&args.form)
    } else {
        TemplateBody::multipart(&args.form)
    }
}
