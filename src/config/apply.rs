use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{
    ByteUnits, FormField, PositiveU64, PositiveUsize, SurgeArgs, parse_form_field, parse_header,
};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, ExecSection, RequestSection};

/// Applies config file values to CLI arguments.
///
/// A value given on the command line always wins; a file value replaces only
/// the clap default.
///
/// # Errors
///
/// Returns an error when a config value is malformed or out of range.
pub fn apply_config(
    args: &mut SurgeArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if let Some(req) = config.req.as_ref() {
        apply_request_section(args, matches, req)?;
    }

    if !is_cli(matches, "status")
        && let Some(code) = config.res.as_ref().and_then(|res| res.code)
    {
        args.status = code;
    }

    if let Some(exec) = config.exec.as_ref() {
        apply_exec_section(args, matches, exec)?;
    }

    Ok(())
}

fn apply_request_section(
    args: &mut SurgeArgs,
    matches: &ArgMatches,
    req: &RequestSection,
) -> AppResult<()> {
    if !is_cli(matches, "method")
        && let Some(method) = req.method
    {
        args.method = method;
    }

    if !is_cli(matches, "url")
        && let Some(url) = req.url.clone()
    {
        args.url = Some(url);
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = req.headers.as_ref()
    {
        args.headers = parse_headers(headers)?;
    }

    if !is_cli(matches, "data")
        && !is_cli(matches, "form")
        && let Some(body) = req.body.clone()
    {
        args.data = body;
    }

    if !is_cli(matches, "content_type")
        && let Some(content_type) = req.content_type.clone()
    {
        args.content_type = Some(content_type);
    }

    if !is_cli(matches, "form")
        && !is_cli(matches, "data")
        && let Some(form) = req.form.as_ref()
    {
        args.form = parse_form_fields(form)?;
    }

    Ok(())
}

fn apply_exec_section(
    args: &mut SurgeArgs,
    matches: &ArgMatches,
    exec: &ExecSection,
) -> AppResult<()> {
    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = exec.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "exec.concurrency")?;
    }

    if !is_cli(matches, "duration")
        && let Some(duration) = exec.duration_seconds
    {
        args.duration = ensure_positive_u64(duration, "exec.duration_seconds")?;
    }

    if !is_cli(matches, "ramp")
        && let Some(ramp) = exec.ramp_seconds
    {
        args.ramp = ramp;
    }

    if !is_cli(matches, "dial_timeout")
        && let Some(timeout) = exec.dial_timeout_seconds
    {
        args.dial_timeout = ensure_positive_u64(timeout, "exec.dial_timeout_seconds")?;
    }

    if !is_cli(matches, "timeout")
        && let Some(timeout) = exec.timeout_seconds
    {
        args.timeout = Some(ensure_positive_u64(timeout, "exec.timeout_seconds")?);
    }

    if !is_cli(matches, "http_version")
        && let Some(version) = exec.http_version
    {
        args.http_version = version;
    }

    if !is_cli(matches, "spacing_ms")
        && let Some(spacing) = exec.spacing_millis
    {
        args.spacing_ms = spacing;
    }

    if !is_cli(matches, "log_sampling")
        && let Some(sampling) = exec.log_sampling
    {
        args.log_sampling = sampling;
    }

    if !is_cli(matches, "binary_units")
        && let Some(units) = exec.byte_units
    {
        args.binary_units = units == ByteUnits::Iec;
    }

    if !is_cli(matches, "skip_preflight")
        && let Some(skip) = exec.skip_preflight
    {
        args.skip_preflight = skip;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(headers.len());
    for header in headers {
        parsed.push(
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
        );
    }
    Ok(parsed)
}

fn parse_form_fields(fields: &[String]) -> AppResult<Vec<FormField>> {
    let mut parsed = Vec::with_capacity(fields.len());
    for field in fields {
        parsed.push(
            parse_form_field(field)
                .map_err(|err| AppError::config(ConfigError::InvalidFormField { source: err }))?,
        );
    }
    Ok(parsed)
}
