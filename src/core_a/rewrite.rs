//! Request header rewrite.
//!
//! Locating `\r\n\r\n` is the one piece of HTTP awareness this proxy needs,
//! so header search uses `memchr::memmem` for the multi-byte needle rather
//! than a hand-rolled scan.

use memchr::memmem;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";

/// Returns the byte offset of the start of `\r\n\r\n` in `buf`, if present.
pub fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    memmem::find(buf, HEADER_TERMINATOR)
}

/// Drops any `Proxy-Connection:` line, replaces any `Connection:` line with
/// `Connection: close`, and appends one if none was present, so a slot can
/// never be pinned open by a backend honoring client keep-alive. Malformed
/// input (no header terminator) passes through unchanged.
pub fn rewrite_request(buf: &[u8]) -> Vec<u8> {
    let Some(terminator_start) = find_header_terminator(buf) else {
        return buf.to_vec();
    };

    let head = &buf[..terminator_start];
    let tail = &buf[terminator_start + HEADER_TERMINATOR.len()..];

    let mut lines: Vec<&[u8]> = head.split(|&b| b == b'\n').map(strip_trailing_cr).collect();

    // First element is the request line (`GET / HTTP/1.1`); header matching
    // only applies to the lines after it.
    let Some((request_line, header_lines)) = lines.split_first_mut() else {
        return buf.to_vec();
    };

    let mut rewritten_headers: Vec<&[u8]> = Vec::with_capacity(header_lines.len() + 1);
    let mut saw_connection = false;

    for &line in header_lines.iter() {
        if has_ci_prefix(line, b"proxy-connection:") {
            continue;
        }
        if has_ci_prefix(line, b"connection:") {
            saw_connection = true;
            rewritten_headers.push(b"Connection: close");
            continue;
        }
        rewritten_headers.push(line);
    }

    if !saw_connection {
        rewritten_headers.push(b"Connection: close");
    }

    let mut out = Vec::with_capacity(buf.len() + 16);
    out.extend_from_slice(request_line);
    out.extend_from_slice(CRLF);
    for line in &rewritten_headers {
        out.extend_from_slice(line);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
    out.extend_from_slice(tail);

    out
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Case-insensitive ASCII prefix match, avoiding an allocation for the
/// common case of a short header name.
fn has_ci_prefix(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}
