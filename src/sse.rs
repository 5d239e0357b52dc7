//! Server-Sent Events (SSE) decoding.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Only `data` fields are surfaced. The `[DONE]` sentinel is passed through
//! untouched so the stream aggregator can tell it apart from a plain close.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::client::ClientError;

/// The end-of-stream marker sent by OpenAI-compatible providers.
pub const DONE_MARKER: &str = "[DONE]";

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use chatline::sse::SSEResponseExt;
/// use futures::StreamExt;
///
/// let response = client.post(url).send().await?;
/// let mut stream = response.sse();
/// while let Some(data) = stream.next().await {
///     println!("SSE data: {}", data?);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response into a stream of raw SSE data payloads.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        sse_data(self.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)))
    }
}

/// Decode a byte stream into SSE data payloads.
///
/// Lines are split on raw bytes so multi-byte characters cut across chunk
/// boundaries survive. A trailing line without a newline is flushed when
/// the byte stream ends.
pub fn sse_data<S>(bytes: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, ClientError>> + Send,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(data) = decode_line(&line) {
                    yield Ok(data);
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(data) = decode_line(&buffer) {
                yield Ok(data);
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    parse_sse_line(line.trim_end_matches(['\r', '\n'])).map(str::to_string)
}

/// Parse an SSE line to extract the data portion.
///
/// Accepts `data:` with or without the optional space. Comments (`:`) and
/// other fields yield `None`.
///
/// # Example
/// ```
/// use chatline::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "event: ping";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream marker.
///
/// # Example
/// ```
/// use chatline::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(is_done_marker(" [done] "));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data.trim().eq_ignore_ascii_case(DONE_MARKER)
}
