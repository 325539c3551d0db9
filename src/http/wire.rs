use reqwest::header::{CONTENT_LENGTH, HOST, HeaderMap};
use reqwest::{Request, StatusCode, Version};

const CRLF: u64 = 2;
const HEADER_SEPARATOR: u64 = 2;

/// Approximate HTTP/1.x serialisation size of `request`: request line, headers
/// (including the implied `Host`), blank line, and body.
///
/// Streaming bodies (multipart) are counted through their `Content-Length`.
#[must_use]
pub fn request_wire_size(request: &Request) -> u64 {
    let url = request.url();
    let target_len = url
        .path()
        .len()
        .saturating_add(url.query().map_or(0, |query| query.len().saturating_add(1)));
    let request_line = len_u64(request.method().as_str().len())
        .saturating_add(1)
        .saturating_add(len_u64(target_len))
        .saturating_add(1)
        .saturating_add(len_u64(version_label(request.version()).len()))
        .saturating_add(CRLF);

    let mut headers = headers_size(request.headers());
    if !request.headers().contains_key(HOST) {
        let host_len = url.host_str().map_or(0, str::len).saturating_add(
            url.port()
                .map_or(0, |port| port.to_string().len().saturating_add(1)),
        );
        headers = headers
            .saturating_add(len_u64("host".len()))
            .saturating_add(HEADER_SEPARATOR)
            .saturating_add(len_u64(host_len))
            .saturating_add(CRLF);
    }

    let body = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(|bytes| len_u64(bytes.len()))
        .or_else(|| content_length(request.headers()))
        .unwrap_or(0);

    request_line
        .saturating_add(headers)
        .saturating_add(CRLF)
        .saturating_add(body)
}

/// Size of the status line, headers, and blank line of a response.
#[must_use]
pub fn response_head_size(version: Version, status: StatusCode, headers: &HeaderMap) -> u64 {
    let reason = status.canonical_reason().unwrap_or("");
    len_u64(version_label(version).len())
        .saturating_add(1)
        .saturating_add(3)
        .saturating_add(1)
        .saturating_add(len_u64(reason.len()))
        .saturating_add(CRLF)
        .saturating_add(headers_size(headers))
        .saturating_add(CRLF)
}

fn headers_size(headers: &HeaderMap) -> u64 {
    headers.iter().fold(0_u64, |total, (name, value)| {
        total
            .saturating_add(len_u64(name.as_str().len()))
            .saturating_add(HEADER_SEPARATOR)
            .saturating_add(len_u64(value.len()))
            .saturating_add(CRLF)
    })
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
