use super::test_support::parse_test_args;
use super::*;
use crate::error::{AppError, AppResult};
use std::path::PathBuf;

#[test]
fn parse_header_valid() -> AppResult<()> {
    let (key, value) = parse_header("Content-Type: application/json")
        .map_err(|err| AppError::validation(format!("Expected Ok, got Err: {}", err)))?;
    if key != "Content-Type" {
        return Err(AppError::validation(format!("Unexpected key: {}", key)));
    }
    if value != "application/json" {
        return Err(AppError::validation(format!("Unexpected value: {}", value)));
    }
    Ok(())
}

#[test]
fn parse_header_keeps_colons_in_value() -> AppResult<()> {
    let (key, value) = parse_header("Referer: http://localhost:8080/a")
        .map_err(|err| AppError::validation(format!("Expected Ok, got Err: {}", err)))?;
    if key != "Referer" || value != "http://localhost:8080/a" {
        return Err(AppError::validation(format!(
            "Unexpected header: {}={}",
            key, value
        )));
    }
    Ok(())
}

#[test]
fn parse_header_invalid() -> AppResult<()> {
    if parse_header("MissingDelimiter").is_ok() {
        return Err(AppError::validation("Expected Err for invalid header"));
    }
    if parse_header(": value").is_ok() {
        return Err(AppError::validation("Expected Err for empty header name"));
    }
    Ok(())
}

#[test]
fn parse_form_field_text_and_file() -> AppResult<()> {
    let text = parse_form_field("user=alice")
        .map_err(|err| AppError::validation(format!("Expected text field: {}", err)))?;
    if text
        != (FormField::Text {
            name: "user".to_owned(),
            value: "alice".to_owned(),
        })
    {
        return Err(AppError::validation(format!("Unexpected field: {:?}", text)));
    }

    let file = parse_form_field("@upload=/tmp/data.bin")
        .map_err(|err| AppError::validation(format!("Expected file field: {}", err)))?;
    if file
        != (FormField::File {
            name: "upload".to_owned(),
            path: PathBuf::from("/tmp/data.bin"),
        })
    {
        return Err(AppError::validation(format!("Unexpected field: {:?}", file)));
    }
    if file.name() != "upload" {
        return Err(AppError::validation("Unexpected form field name"));
    }
    Ok(())
}

#[test]
fn parse_form_field_rejects_missing_parts() -> AppResult<()> {
    for raw in ["novalue", "=value", "@=path", "@file="] {
        if parse_form_field(raw).is_ok() {
            return Err(AppError::validation(format!("Expected Err for '{}'", raw)));
        }
    }
    Ok(())
}

#[test]
fn parse_args_defaults() -> AppResult<()> {
    let args = parse_test_args(["surge", "-u", "http://localhost"])?;
    if args.method != HttpMethod::Get {
        return Err(AppError::validation("Expected GET by default"));
    }
    if args.concurrency.get() != 1 {
        return Err(AppError::validation("Expected concurrency 1"));
    }
    if args.duration.get() != 10 {
        return Err(AppError::validation("Expected duration 10"));
    }
    if args.ramp != 0 {
        return Err(AppError::validation("Expected ramp 0"));
    }
    if args.dial_timeout.get() != 3 {
        return Err(AppError::validation("Expected dial timeout 3"));
    }
    if args.timeout.is_some() {
        return Err(AppError::validation("Expected no request timeout"));
    }
    if args.http_version != HttpVersion::V1_1 {
        return Err(AppError::validation("Expected HTTP/1.1"));
    }
    if args.status != 200 {
        return Err(AppError::validation("Expected status 200"));
    }
    if args.spacing_ms != 0 {
        return Err(AppError::validation("Expected no spacing"));
    }
    if (args.log_sampling - 1.0).abs() > f64::EPSILON {
        return Err(AppError::validation("Expected sampling 1.0"));
    }
    if args.binary_units || args.skip_preflight || args.no_progress {
        return Err(AppError::validation("Expected flags to default to false"));
    }
    Ok(())
}

#[test]
fn parse_args_run_options() -> AppResult<()> {
    let args = parse_test_args([
        "surge",
        "-u",
        "http://localhost:8080/",
        "-X",
        "POST",
        "-c",
        "64",
        "-d",
        "120",
        "-r",
        "30",
        "--http-version",
        "2",
        "--status",
        "204",
        "--spacing-ms",
        "25",
        "--timeout",
        "5",
        "-H",
        "X-Trace: abc",
        "-O",
        "out.json",
        "--log-sampling",
        "0.25",
    ])?;
    if args.method != HttpMethod::Post {
        return Err(AppError::validation("Expected POST"));
    }
    if args.concurrency.get() != 64 || args.duration.get() != 120 || args.ramp != 30 {
        return Err(AppError::validation("Unexpected timing options"));
    }
    if args.http_version != HttpVersion::V2 {
        return Err(AppError::validation("Expected HTTP/2"));
    }
    if args.status != 204 || args.spacing_ms != 25 {
        return Err(AppError::validation("Unexpected status/spacing"));
    }
    if args.timeout.map(PositiveU64::get) != Some(5) {
        return Err(AppError::validation("Unexpected timeout"));
    }
    if args.headers != vec![("X-Trace".to_owned(), "abc".to_owned())] {
        return Err(AppError::validation(format!(
            "Unexpected headers: {:?}",
            args.headers
        )));
    }
    if args.output.as_deref() != Some(std::path::Path::new("out.json")) {
        return Err(AppError::validation("Unexpected output path"));
    }
    if (args.log_sampling - 0.25).abs() > f64::EPSILON {
        return Err(AppError::validation("Unexpected sampling"));
    }
    Ok(())
}

#[test]
fn parse_args_rejects_zero_concurrency() -> AppResult<()> {
    if parse_test_args(["surge", "-u", "http://localhost", "-c", "0"]).is_ok() {
        return Err(AppError::validation("Expected Err for zero concurrency"));
    }
    Ok(())
}

#[test]
fn parse_args_rejects_unknown_http_version() -> AppResult<()> {
    if parse_test_args(["surge", "-u", "http://localhost", "--http-version", "3"]).is_ok() {
        return Err(AppError::validation("Expected Err for HTTP/3"));
    }
    Ok(())
}

#[test]
fn parse_args_form_conflicts_with_data() -> AppResult<()> {
    let result = parse_test_args([
        "surge",
        "-u",
        "http://localhost",
        "--data",
        "x",
        "-F",
        "a=b",
    ]);
    if result.is_ok() {
        return Err(AppError::validation("Expected --form/--data conflict"));
    }
    Ok(())
}

#[test]
fn http_version_from_str() -> AppResult<()> {
    let parsed: HttpVersion = "2".parse()?;
    if parsed != HttpVersion::V2 {
        return Err(AppError::validation("Expected HTTP/2"));
    }
    if "0.9".parse::<HttpVersion>().is_ok() {
        return Err(AppError::validation("Expected Err for 0.9"));
    }
    Ok(())
}

#[test]
fn positive_values_reject_zero() -> AppResult<()> {
    if PositiveU64::try_from(0).is_ok() || PositiveUsize::try_from(0).is_ok() {
        return Err(AppError::validation("Expected Err for zero"));
    }
    let parsed: PositiveU64 = "42".parse()?;
    if parsed.get() != 42 {
        return Err(AppError::validation("Expected 42"));
    }
    Ok(())
}
