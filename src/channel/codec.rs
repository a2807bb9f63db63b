//! Newline-delimited JSON framing.
//!
//! A frame is one compact JSON document followed by `\n`. Compact
//! `serde_json` output never contains a raw newline, so the terminator is
//! unambiguous. Frames are size-checked before they are parsed.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::errors::ChannelError;
use super::types::{ChannelRequest, ChannelResponse};

/// Default upper bound on a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Serialize a request into a complete frame.
pub fn encode_request(channel: &str, request: &ChannelRequest) -> Result<Vec<u8>, ChannelError> {
    let mut bytes = serde_json::to_vec(request)
        .map_err(|e| ChannelError::protocol(channel, format!("failed to serialize request: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serialize a response into a complete frame.
pub fn encode_response(channel: &str, response: &ChannelResponse) -> Result<Vec<u8>, ChannelError> {
    let mut bytes = serde_json::to_vec(&response.to_value())
        .map_err(|e| ChannelError::protocol(channel, format!("failed to serialize response: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write a frame completely and flush it.
///
/// `write_all` loops over short writes, so a frame is either fully handed
/// to the OS or the call fails.
pub async fn write_frame<W>(writer: &mut W, channel: &str, frame: &[u8]) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer
        .write_all(frame)
        .await
        .map_err(|e| ChannelError::disconnected(channel, format!("failed to write request: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ChannelError::disconnected(channel, format!("failed to flush request: {e}")))?;
    Ok(())
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Read one complete frame, without its terminator.
///
/// Blank lines are skipped. EOF before a terminator is a disconnect; more
/// than `max_bytes` without a terminator is a protocol violation.
pub async fn read_frame<R>(
    reader: &mut R,
    channel: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, ChannelError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);

    loop {
        let mut buf = Vec::new();
        let read = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ChannelError::disconnected(channel, format!("failed to read reply: {e}")))?;

        if read == 0 {
            return Err(ChannelError::disconnected(
                channel,
                "channel closed before a reply was received",
            ));
        }

        if buf.last() != Some(&b'\n') {
            if buf.len() > max_bytes {
                return Err(ChannelError::protocol(
                    channel,
                    format!("reply exceeds the {max_bytes}-byte frame limit"),
                ));
            }
            return Err(ChannelError::disconnected(
                channel,
                format!("channel closed mid-frame after {} bytes", buf.len()),
            ));
        }

        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(buf);
    }
}

/// Parse and shape-check a reply frame.
pub fn decode_response(channel: &str, frame: &[u8]) -> Result<ChannelResponse, ChannelError> {
    let value: serde_json::Value = serde_json::from_slice(frame)
        .map_err(|e| ChannelError::protocol(channel, format!("reply is not valid JSON: {e}")))?;
    ChannelResponse::from_value(channel, value)
}

/// Parse a request frame (the target side of the exchange).
pub fn decode_request(channel: &str, frame: &[u8]) -> Result<ChannelRequest, ChannelError> {
    serde_json::from_slice(frame)
        .map_err(|e| ChannelError::protocol(channel, format!("malformed request: {e}")))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::errors::ChannelErrorKind;
    use serde_json::json;
    use tokio::io::BufReader;

    const CH: &str = "test";

    #[tokio::test]
    async fn test_read_single_frame() {
        let data: &[u8] = b"{\"result\":1}\n";
        let mut reader = BufReader::new(data);
        let frame = read_frame(&mut reader, CH, 1024).await.unwrap();
        assert_eq!(frame, b"{\"result\":1}");
    }

    #[tokio::test]
    async fn test_read_skips_blank_lines_and_crlf() {
        let data: &[u8] = b"\n\r\n{\"result\":2}\r\n";
        let mut reader = BufReader::new(data);
        let frame = read_frame(&mut reader, CH, 1024).await.unwrap();
        assert_eq!(frame, b"{\"result\":2}");
    }

    #[tokio::test]
    async fn test_read_eof_before_reply_is_disconnect() {
        let data: &[u8] = b"";
        let mut reader = BufReader::new(data);
        let err = read_frame(&mut reader, CH, 1024).await.unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Disconnected);
    }

    #[tokio::test]
    async fn test_read_eof_mid_frame_is_disconnect() {
        let data: &[u8] = b"{\"result\":";
        let mut reader = BufReader::new(data);
        let err = read_frame(&mut reader, CH, 1024).await.unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Disconnected);
    }

    #[tokio::test]
    async fn test_read_oversized_frame_is_protocol() {
        let mut data = vec![b'x'; 64];
        data.push(b'\n');
        let mut reader = BufReader::new(data.as_slice());
        let err = read_frame(&mut reader, CH, 16).await.unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_frame_at_exact_limit_accepted() {
        let mut data = vec![b'7'; 16];
        data.push(b'\n');
        let mut reader = BufReader::new(data.as_slice());
        let frame = read_frame(&mut reader, CH, 16).await.unwrap();
        assert_eq!(frame.len(), 16);
    }

    #[tokio::test]
    async fn test_write_then_read_request() {
        let req = ChannelRequest::new("list-tools", json!({}));
        let frame = encode_request(CH, &req).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));

        let mut sink = Vec::new();
        write_frame(&mut sink, CH, &frame).await.unwrap();

        let mut reader = BufReader::new(sink.as_slice());
        let raw = read_frame(&mut reader, CH, 1024).await.unwrap();
        let decoded = decode_request(CH, &raw).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_decode_response_rejects_garbage() {
        let err = decode_response(CH, b"not json at all").unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[test]
    fn test_decode_response_checks_invariant() {
        let err = decode_response(CH, br#"{"result":1,"error":{"code":1,"message":"x"}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }
}
