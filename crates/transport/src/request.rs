//! Hand-built HTTP/1.1 request heads

use tcp1620_common::HttpMethod;

/// Build the request line and headers for `method`.
///
/// `Host` is only emitted when a value is given (an empty value is still
/// sent as `Host: `). `Content-Length` always reflects the body, HEAD
/// included, and the connection is always closed after the response.
#[must_use]
pub fn build_request_head(method: HttpMethod, host_header: Option<&str>, content_len: usize) -> Vec<u8> {
    let mut head = Vec::with_capacity(96);
    head.extend_from_slice(method.as_str().as_bytes());
    head.extend_from_slice(b" / HTTP/1.1\r\n");
    if let Some(host) = host_header {
        head.extend_from_slice(b"Host: ");
        head.extend_from_slice(host.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(format!("Content-Length: {}\r\n", content_len).as_bytes());
    head.extend_from_slice(b"Connection: close\r\n\r\n");
    head
}
