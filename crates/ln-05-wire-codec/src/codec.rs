//! Framing and unframing.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

use crate::config::WireConfig;
use crate::error::{Result, WireError};
use crate::HEADER_LEN;

/// Rendering of [`Frame::Timeout`].
pub const TIMEOUT_SENTINEL: &str = "*";

/// One received message.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// A decoded payload.
    Payload(Value),
    /// No header arrived within the header timeout.
    Timeout,
}

impl Frame {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Payload, with a timeout rendered as the `"*"` string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Payload(value) => value,
            Self::Timeout => Value::String(TIMEOUT_SENTINEL.to_string()),
        }
    }

    /// Payload as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Payload(value) => value.as_str(),
            Self::Timeout => Some(TIMEOUT_SENTINEL),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(value) => write!(f, "{}", value),
            Self::Timeout => f.write_str(TIMEOUT_SENTINEL),
        }
    }
}

/// Frame `value` as header plus JSON payload.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(format!("{:0width$}", payload.len(), width = HEADER_LEN).as_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read one frame, waiting at most `wait` for the header and again for the payload.
pub async fn decode<R>(reader: &mut R, wait: Duration) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader, wait, wait, WireConfig::default().max_payload_bytes).await
}

/// Read one frame with the limits of `config`.
pub async fn receive<R>(reader: &mut R, config: &WireConfig) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    read_frame(
        reader,
        config.header_timeout(),
        config.payload_timeout(),
        config.max_payload_bytes,
    )
    .await
}

/// Encode and write one frame.
pub async fn send<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let frame = encode(value)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame<R>(
    reader: &mut R,
    header_timeout: Duration,
    payload_timeout: Duration,
    max_payload: usize,
) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0usize;
    let outcome = timeout(header_timeout, async {
        while filled < HEADER_LEN {
            let n = reader.read(&mut header[filled..]).await?;
            if n == 0 {
                return Err(WireError::ConnectionClosed);
            }
            filled += n;
        }
        Ok::<(), WireError>(())
    })
    .await;
    match outcome {
        // only an untouched stream may report idleness
        Err(_) if filled == 0 => return Ok(Frame::Timeout),
        Err(_) => return Err(WireError::HeaderTimeout { received: filled }),
        Ok(result) => result?,
    }

    let expected = parse_header(&header)?;
    if expected > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: expected,
            limit: max_payload,
        });
    }

    let mut payload = vec![0u8; expected];
    let mut received = 0usize;
    let outcome = timeout(payload_timeout, async {
        while received < expected {
            let n = reader.read(&mut payload[received..]).await?;
            if n == 0 {
                return Err(WireError::ConnectionClosed);
            }
            trace!("[ln-05] read {} payload bytes", n);
            received += n;
        }
        Ok::<(), WireError>(())
    })
    .await;

    match outcome {
        Err(_) => Err(WireError::PayloadTimeout { received, expected }),
        Ok(result) => {
            result?;
            Ok(Frame::Payload(serde_json::from_slice(&payload)?))
        }
    }
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize> {
    let invalid = || WireError::InvalidHeader(String::from_utf8_lossy(header).into_owned());
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Serves one queued chunk per read call.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.chunks.push_front(chunk.split_off(n));
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    const WAIT: Duration = Duration::from_millis(200);

    // =========================================================================
    // ENCODING
    // =========================================================================

    #[test]
    fn test_encode_header_is_zero_padded() {
        let frame = encode(&json!("hello")).unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"0000000007");
        assert_eq!(&frame[HEADER_LEN..], b"\"hello\"");
    }

    #[test]
    fn test_timeout_renders_as_sentinel() {
        assert_eq!(Frame::Timeout.to_string(), "*");
        assert_eq!(Frame::Timeout.into_value(), json!("*"));
        assert_eq!(Frame::Payload(json!("*")).to_string(), "\"*\"");
    }

    // =========================================================================
    // DECODING
    // =========================================================================

    #[tokio::test]
    async fn test_payload_split_across_reads() {
        let mut split = ChunkedReader::new(&[b"0000000007", b"\"he", b"llo\""]);
        let mut whole = ChunkedReader::new(&[b"0000000007\"hello\""]);

        let a = decode(&mut split, WAIT).await.unwrap();
        let b = decode(&mut whole, WAIT).await.unwrap();
        assert_eq!(a, Frame::Payload(json!("hello")));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_idle_connection_yields_timeout() {
        let (mut client, _server) = tokio::io::duplex(64);
        let frame = decode(&mut client, Duration::from_millis(20)).await.unwrap();
        assert!(frame.is_timeout());
    }

    #[tokio::test]
    async fn test_partial_header_timeout_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(b"0000").await.unwrap();
        let outcome = decode(&mut client, Duration::from_millis(20)).await;
        assert!(matches!(outcome, Err(WireError::HeaderTimeout { received: 4 })));
    }

    #[tokio::test]
    async fn test_send_then_receive_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        send(&mut client, &json!(["getversion"])).await.unwrap();
        let frame = receive(&mut server, &WireConfig::for_testing()).await.unwrap();
        assert_eq!(frame, Frame::Payload(json!(["getversion"])));
    }

    #[tokio::test]
    async fn test_rejects_non_digit_header() {
        let mut reader = ChunkedReader::new(&[b"00000x0007\"hello\""]);
        assert!(matches!(
            decode(&mut reader, WAIT).await,
            Err(WireError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_oversized_payload() {
        let mut reader = ChunkedReader::new(&[b"9999999999"]);
        let config = WireConfig::for_testing();
        assert!(matches!(
            receive(&mut reader, &config).await,
            Err(WireError::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let mut reader = ChunkedReader::new(&[b"00000"]);
        assert!(matches!(
            decode(&mut reader, WAIT).await,
            Err(WireError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mut reader = ChunkedReader::new(&[b"0000000003", b"{{{"]);
        assert!(matches!(
            decode(&mut reader, WAIT).await,
            Err(WireError::Malformed(_))
        ));
    }
}
