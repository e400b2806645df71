//! Shared SSE buffering for the upstream's turn-response stream.
//!
//! The upstream emits one JSON object per Server-Sent-Event chunk.
//! This module owns the part that's the same regardless of what the
//! JSON decodes to: receive a `reqwest::Response`, buffer chunks, split
//! on `\n\n`, extract `data:` payloads. Decoding a payload into
//! [`UpstreamChunk`] and deciding what SSE event to emit for it is the
//! gateway streaming handler's job (§4.J).

use gw_domain::error::{GatewayError, Result};
use gw_domain::stream::{BoxStream, UpstreamChunk};

/// Extract complete `data:` payloads from an SSE buffer, draining the
/// buffer in-place. A trailing partial event is left for the next call.
pub fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Turn a `reqwest::Response` streaming the upstream's turn events into
/// a [`BoxStream`] of decoded [`UpstreamChunk`]s. Decode failures are
/// surfaced as an error item rather than silently dropped, since a
/// chunk the gateway can't understand is exactly the case the client
/// needs to know about.
pub fn upstream_chunk_stream(response: reqwest::Response) -> BoxStream<'static, Result<UpstreamChunk>> {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        yield decode_chunk(&data);
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            yield decode_chunk(&data);
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

fn decode_chunk(data: &str) -> Result<UpstreamChunk> {
    serde_json::from_str(data)
        .map_err(|e| GatewayError::UpstreamUnavailable(format!("malformed turn-stream chunk: {e}")))
}

pub fn from_reqwest(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::UpstreamUnavailable(format!("upstream timed out: {e}"))
    } else {
        GatewayError::UpstreamUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_event() {
        let mut buf = String::from("event: message\ndata: {\"event_type\":\"turn_start\"}\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"event_type\":\"turn_start\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_events() {
        let mut buf = String::from("data: first\n\ndata: second\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn drain_partial_event_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn drain_empty_buffer() {
        let mut buf = String::new();
        assert!(drain_data_lines(&mut buf).is_empty());
    }

    #[test]
    fn drain_ignores_non_data_lines() {
        let mut buf = String::from("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
    }

    #[test]
    fn decode_chunk_parses_turn_start() {
        let chunk = decode_chunk(r#"{"event_type":"turn_start"}"#).unwrap();
        assert!(matches!(chunk, UpstreamChunk::TurnStart));
    }

    #[test]
    fn decode_chunk_rejects_garbage() {
        let result = decode_chunk("not json");
        assert!(matches!(result, Err(GatewayError::UpstreamUnavailable(_))));
    }
}
