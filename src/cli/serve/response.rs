//! HTTP response handlers.

use crate::core::ServerState;
use crate::utils::mime::types::{HTML, JSON, PLAIN};
use anyhow::{Context, Result};
use std::io::Read;
use std::{fs, path::Path};
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// Header carrying the generation a response was served from.
pub const GENERATION_HEADER: &str = "X-Kiln-Generation";

/// Respond with a static file of the last good build.
pub fn respond_file(request: Request, path: &Path, generation: u64) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type, generation);
    }

    // Check for Range header (video/audio seeking)
    if let Some(range) = get_range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body, generation)
}

/// Handle Range request for media files (video/audio seeking).
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    use std::io::{Seek, SeekFrom};

    let file_size = fs::metadata(path)?.len();
    if file_size == 0 {
        return send_body(request, 200, content_type, Vec::new(), 0);
    }

    // Parse "bytes=start-end" format
    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let (start, end) = parse_range(range, file_size);
    if start > end {
        let response = Response::empty(StatusCode(416));
        let response = with_headers(response, &[("Content-Range", &format!("bytes */{file_size}"))]);
        return request.respond(response).map_err(Into::into);
    }
    let length = end - start + 1;

    // Stream the requested range
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    let content_range = format!("bytes {start}-{end}/{file_size}");
    let response = Response::new(StatusCode(206), Vec::new(), reader, usize::try_from(length).ok(), None);
    let response = with_headers(
        response,
        &[
            ("Content-Type", content_type),
            ("Content-Range", &content_range),
            ("Accept-Ranges", "bytes"),
        ],
    );

    request.respond(response)?;
    Ok(())
}

/// Parse Range header value "start-end" into inclusive (start, end) bytes.
fn parse_range(range: &str, file_size: u64) -> (u64, u64) {
    let last = file_size - 1;
    let Some((start, end)) = range.trim().split_once('-') else {
        return (0, last);
    };
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // "0-499" - specific range
        (false, false) => {
            let start = start.parse().unwrap_or(0);
            let end: u64 = end.parse().unwrap_or(last);
            (start, end.min(last))
        }
        // "500-" - from start to end
        (false, true) => (start.parse().unwrap_or(0), last),
        // "-500" - last 500 bytes
        (true, false) => {
            let suffix: u64 = end.parse().unwrap_or(0);
            (file_size.saturating_sub(suffix), last)
        }
        (true, true) => (0, last),
    }
}

/// Extract Range header from request.
fn get_range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("range"))
        .map(|h| h.value.to_string())
}

/// Respond with the generated 404 page, or a plain one if there is none.
pub fn respond_not_found(request: Request, output_root: &Path, generation: u64) -> Result<()> {
    let custom_404 = output_root.join("404.html");
    let has_custom = custom_404.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { HTML } else { PLAIN };
        return send_head(request, 404, mime, generation);
    }

    if has_custom && let Ok(body) = fs::read(&custom_404) {
        return send_body(request, 404, HTML, body, generation);
    }

    send_body(request, 404, PLAIN, b"404 Not Found".to_vec(), generation)
}

/// Respond with 503 Service Unavailable (first build pending, or shutting down).
pub fn respond_unavailable(request: Request, reason: &str) -> Result<()> {
    let response = Response::from_string(format!("503 Service Unavailable: {reason}"))
        .with_status_code(StatusCode(503));
    let response = with_headers(response, &[("Content-Type", PLAIN), ("Retry-After", "1")]);
    request.respond(response)?;
    Ok(())
}

/// Respond with a JSON snapshot of the server state.
pub fn respond_status(request: Request, state: &ServerState) -> Result<()> {
    let body = serde_json::json!({
        "generation": state.last_good_generation,
        "ok": state.current_error.is_none(),
        "error": state.current_error,
        "ready": state.ready,
        "running": state.running,
    });
    let body = serde_json::to_vec(&body)?;

    if is_head_request(&request) {
        return send_head(request, 200, JSON, state.last_good_generation);
    }
    send_body(request, 200, JSON, body, state.last_good_generation)
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str, generation: u64) -> Result<()> {
    let response = Response::empty(StatusCode(status));
    let response = with_headers(
        response,
        &[
            ("Content-Type", content_type),
            (GENERATION_HEADER, &generation.to_string()),
        ],
    );
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    generation: u64,
) -> Result<()> {
    let response = Response::from_data(body).with_status_code(StatusCode(status));
    let response = with_headers(
        response,
        &[
            ("Content-Type", content_type),
            (GENERATION_HEADER, &generation.to_string()),
        ],
    );
    request.respond(response)?;
    Ok(())
}

/// Attach headers, skipping any tiny_http rejects.
fn with_headers<R: Read>(mut response: Response<R>, headers: &[(&str, &str)]) -> Response<R> {
    for (key, value) in headers {
        if let Ok(header) = Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0-499", 1000), (0, 499));
        assert_eq!(parse_range("500-", 1000), (500, 999));
        assert_eq!(parse_range("-100", 1000), (900, 999));
        assert_eq!(parse_range("0-5000", 1000), (0, 999));
        assert_eq!(parse_range("garbage", 1000), (0, 999));
        assert_eq!(parse_range("2000-", 1000), (2000, 999));
    }
}
