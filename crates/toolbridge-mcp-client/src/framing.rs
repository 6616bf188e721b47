//! Incremental frame decoding for the stdio transport.
//!
//! Servers in the wild emit either newline-delimited JSON or LSP-style
//! `Content-Length` headers; the decoder accepts both. Outgoing traffic is
//! always newline-delimited.

const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Accumulates raw bytes from the server's stdout and yields complete
/// message payloads.
#[derive(Debug, Default)]
pub(crate) struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, or `None` if more input is needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            while matches!(self.buf.first(), Some(b'\n' | b'\r')) {
                self.buf.remove(0);
            }

            if self.buf.is_empty() {
                return None;
            }

            if self.starts_with_content_length() {
                return self.next_header_frame();
            }

            let newline = self.buf.iter().position(|b| *b == b'\n')?;
            let mut line = self.buf[..newline].to_vec();
            self.buf.drain(..=newline);

            while matches!(line.last(), Some(b'\r')) {
                line.pop();
            }

            if line.is_empty() {
                continue;
            }

            return Some(line);
        }
    }

    fn next_header_frame(&mut self) -> Option<Vec<u8>> {
        let (header_end, delimiter_len) = find_header_end(&self.buf)?;
        let headers = String::from_utf8_lossy(&self.buf[..header_end]);

        let mut content_length = None;
        for line in headers.lines() {
            let lower = line.to_ascii_lowercase();
            if let Some(rest) = lower.strip_prefix("content-length:") {
                content_length = rest.trim().parse::<usize>().ok();
                break;
            }
        }

        let content_length = content_length?;
        if content_length > MAX_FRAME_SIZE {
            // Oversized frame: drop everything rather than buffer forever.
            tracing::warn!(
                content_length,
                limit = MAX_FRAME_SIZE,
                "oversized frame announced; discarding buffered input"
            );
            self.buf.clear();
            return None;
        }

        let body_start = header_end + delimiter_len;
        if self.buf.len() < body_start + content_length {
            return None;
        }

        let body = self.buf[body_start..body_start + content_length].to_vec();
        self.buf.drain(..body_start + content_length);
        Some(body)
    }

    fn starts_with_content_length(&self) -> bool {
        let prefix = b"content-length:";
        if self.buf.len() < prefix.len() {
            return false;
        }

        self.buf[..prefix.len()]
            .iter()
            .zip(prefix.iter())
            .all(|(a, b)| a.to_ascii_lowercase() == *b)
    }
}

/// Serialize `message` as a single newline-terminated frame.
pub(crate) fn encode_frame(message: &serde_json::Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut payload = serde_json::to_vec(message)?;
    payload.push(b'\n');
    Ok(payload)
}

fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = find_subsequence(buf, b"\r\n\r\n") {
        return Some((pos, 4));
    }
    if let Some(pos) = find_subsequence(buf, b"\n\n") {
        return Some((pos, 2));
    }
    None
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_newline_delimited_frame() {
        let mut frames = FrameBuffer::new();
        frames.push(b"{\"jsonrpc\":\"2.0\",\"id\":1}\n");

        let frame = frames.next_frame().unwrap();
        assert_eq!(frame, b"{\"jsonrpc\":\"2.0\",\"id\":1}".to_vec());
        assert!(frames.next_frame().is_none());
    }

    #[test]
    fn decodes_content_length_frame() {
        let body = b"{\"jsonrpc\":\"2.0\",\"id\":2}";
        let mut frames = FrameBuffer::new();
        frames.push(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        frames.push(body);

        assert_eq!(frames.next_frame().unwrap(), body.to_vec());
        assert!(frames.next_frame().is_none());
    }

    #[test]
    fn waits_for_full_body() {
        let mut frames = FrameBuffer::new();
        frames.push(b"Content-Length: 10\r\n\r\n12345");
        assert!(frames.next_frame().is_none());

        frames.push(b"67890");
        assert_eq!(frames.next_frame().unwrap(), b"1234567890".to_vec());
    }

    #[test]
    fn splits_multiple_lines_in_one_push() {
        let mut frames = FrameBuffer::new();
        frames.push(b"{\"id\":1}\r\n{\"id\":2}\n");

        assert_eq!(frames.next_frame().unwrap(), b"{\"id\":1}".to_vec());
        assert_eq!(frames.next_frame().unwrap(), b"{\"id\":2}".to_vec());
        assert!(frames.next_frame().is_none());
    }

    #[test]
    fn skips_blank_lines() {
        let mut frames = FrameBuffer::new();
        frames.push(b"\r\n\n{\"id\":3}\n");
        assert_eq!(frames.next_frame().unwrap(), b"{\"id\":3}".to_vec());
    }

    #[test]
    fn discards_oversized_announced_frame() {
        let mut frames = FrameBuffer::new();
        frames.push(b"Content-Length: 9000000\r\n\r\n{\"id\":1}");
        assert!(frames.next_frame().is_none());

        // The decoder recovers for subsequent well-formed traffic.
        frames.push(b"{\"id\":2}\n");
        assert_eq!(frames.next_frame().unwrap(), b"{\"id\":2}".to_vec());
    }

    #[test]
    fn encodes_newline_terminated_frame() {
        let payload = encode_frame(&json!({"jsonrpc": "2.0", "id": 7})).unwrap();
        assert_eq!(payload.last(), Some(&b'\n'));
        let parsed: serde_json::Value = serde_json::from_slice(&payload[..payload.len() - 1]).unwrap();
        assert_eq!(parsed["id"], 7);
    }
}
