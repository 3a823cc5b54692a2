//! Framed I/O adapter.
//!
//! Puts a byte stream (plain or TLS) and a WebSocket behind one interface so
//! the send and receive pipelines never branch on the transport.
//!
//! # Framing
//!
//! | Mode | Inbound unit | Outbound unit |
//! |------|--------------|---------------|
//! | Stream | Whatever one read returned, decoded | Encoded bytes, no delimiter |
//! | Message | One complete WebSocket message | One Text (UTF-8) or Binary frame |
//!
//! After [`FramedIo::split`], the [`FramedReader`] belongs to the receive
//! pipeline and the [`FramedWriter`] to the send pipeline.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tracing::{debug, trace};

use crate::config::{ConnectionDescriptor, TextDecoder, TextEncoding};
use crate::error::{Error, Result};

use super::websocket::WsStream;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on a graceful close once shutdown has started.
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

// ============================================================================
// Types
// ============================================================================

/// Duplex byte stream (plain TCP or TLS over TCP).
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Boxed byte stream so plain and TLS connections share one type.
pub type BoxedStream = Box<dyn ByteStream>;

// ============================================================================
// Inbound
// ============================================================================

/// One unit read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded text.
    Data(String),
    /// Peer ended the stream.
    End,
    /// Peer sent a WebSocket close frame, with its code and reason.
    Closed(Option<String>),
}

// ============================================================================
// FramedIo
// ============================================================================

/// Established transport, before splitting.
pub enum FramedIo {
    /// Byte stream transport.
    Stream(BoxedStream),
    /// WebSocket transport.
    Message(WsStream),
}

impl FramedIo {
    /// Splits into independently owned read and write sides.
    #[must_use]
    pub fn split(self, descriptor: &ConnectionDescriptor) -> (FramedReader, FramedWriter) {
        let encoding = descriptor.encoding();
        match self {
            Self::Stream(stream) => {
                let (read, write) = tokio::io::split(stream);
                let reader = FramedReader::Stream {
                    half: read,
                    decoder: encoding.decoder(),
                    chunk: vec![0; descriptor.read_chunk_size()],
                    ended: false,
                };
                (reader, FramedWriter::Stream { half: write, encoding })
            }
            Self::Message(ws) => {
                let (sink, stream) = ws.split();
                let reader = FramedReader::Message {
                    stream,
                    max_message_size: descriptor.max_message_size(),
                };
                (reader, FramedWriter::Message { sink, encoding })
            }
        }
    }
}

impl fmt::Debug for FramedIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stream(_) => "FramedIo::Stream",
            Self::Message(_) => "FramedIo::Message",
        })
    }
}

// ============================================================================
// FramedReader
// ============================================================================

/// Read side of a framed transport.
pub enum FramedReader {
    /// Byte stream read half with its decoder.
    Stream {
        /// Read half of the stream.
        half: ReadHalf<BoxedStream>,
        /// Stateful decoder carrying partial sequences between reads.
        decoder: TextDecoder,
        /// Read buffer.
        chunk: Vec<u8>,
        /// End of stream already observed.
        ended: bool,
    },
    /// WebSocket read half.
    Message {
        /// Inbound message stream.
        stream: SplitStream<WsStream>,
        /// Largest accepted message.
        max_message_size: usize,
    },
}

impl FramedReader {
    /// Returns the next inbound unit.
    ///
    /// Cancel-safe: dropping the future loses no data already received.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] for stream read failures
    /// - [`Error::MessageTooLarge`] if a WebSocket message exceeds the limit
    /// - [`Error::WebSocket`] for other WebSocket protocol errors
    pub async fn next_unit(&mut self) -> Result<Inbound> {
        match self {
            Self::Stream { .. } => self.read_next().await,
            Self::Message { .. } => self.receive_next().await,
        }
    }

    /// Reads the next decoded chunk from a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a WebSocket, otherwise as [`next_unit`](Self::next_unit).
    pub async fn read_next(&mut self) -> Result<Inbound> {
        let Self::Stream {
            half,
            decoder,
            chunk,
            ended,
        } = self
        else {
            return Err(Error::config("read_next requires a stream transport"));
        };

        loop {
            if *ended {
                return Ok(Inbound::End);
            }

            let read = half.read(chunk).await?;
            if read == 0 {
                *ended = true;
                let tail = decoder.finish();
                if !tail.is_empty() {
                    return Ok(Inbound::Data(tail));
                }
                continue;
            }

            trace!(bytes = read, "Stream chunk received");
            let text = decoder.decode_chunk(&chunk[..read]);
            if !text.is_empty() {
                return Ok(Inbound::Data(text));
            }
        }
    }

    /// Receives the next complete WebSocket message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a byte stream, otherwise as [`next_unit`](Self::next_unit).
    pub async fn receive_next(&mut self) -> Result<Inbound> {
        let Self::Message {
            stream,
            max_message_size,
        } = self
        else {
            return Err(Error::config("receive_next requires a message transport"));
        };
        let max_size = *max_message_size;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return match Error::from_websocket(e, max_size) {
                        Error::ConnectionClosed => Ok(Inbound::End),
                        other => Err(other),
                    };
                }
                None => return Ok(Inbound::End),
            };

            match message {
                Message::Text(text) => {
                    ensure_within(text.len(), max_size)?;
                    return Ok(Inbound::Data(text.as_str().to_owned()));
                }
                Message::Binary(bytes) => {
                    ensure_within(bytes.len(), max_size)?;
                    return Ok(Inbound::Data(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket close frame received");
                    return Ok(Inbound::Closed(
                        frame.map(|f| {
                            let code = u16::from(f.code);
                            if f.reason.is_empty() {
                                code.to_string()
                            } else {
                                format!("{code} {}", f.reason)
                            }
                        }),
                    ));
                }
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

impl fmt::Debug for FramedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { ended, .. } => f
                .debug_struct("FramedReader::Stream")
                .field("ended", ended)
                .finish_non_exhaustive(),
            Self::Message {
                max_message_size, ..
            } => f
                .debug_struct("FramedReader::Message")
                .field("max_message_size", max_message_size)
                .finish_non_exhaustive(),
        }
    }
}

/// Rejects payloads above `max_size`.
fn ensure_within(len: usize, max_size: usize) -> Result<()> {
    if len > max_size {
        return Err(Error::message_too_large(max_size));
    }
    Ok(())
}

// ============================================================================
// FramedWriter
// ============================================================================

/// Write side of a framed transport.
///
/// Owned by exactly one send pipeline, so calls are never concurrent.
pub enum FramedWriter {
    /// Byte stream write half.
    Stream {
        /// Write half of the stream.
        half: WriteHalf<BoxedStream>,
        /// Outbound text encoding.
        encoding: TextEncoding,
    },
    /// WebSocket write half.
    Message {
        /// Outbound message sink.
        sink: SplitSink<WsStream, Message>,
        /// Outbound text encoding.
        encoding: TextEncoding,
    },
}

impl FramedWriter {
    /// Encodes and sends one text unit.
    ///
    /// `scratch` receives the encoded bytes when encoding is needed; callers
    /// pass a pooled buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::WebSocket`] if the write fails.
    pub async fn send_text(&mut self, text: &str, scratch: &mut Vec<u8>) -> Result<()> {
        let encoding = self.encoding();
        if encoding.is_utf8() && matches!(self, Self::Message { .. }) {
            return self.send_message(text).await;
        }

        scratch.clear();
        encoding.encode_into(text, scratch);
        self.write(scratch).await
    }

    /// Returns the outbound text encoding.
    #[inline]
    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        match self {
            Self::Stream { encoding, .. } | Self::Message { encoding, .. } => *encoding,
        }
    }

    /// Writes raw bytes.
    ///
    /// On a WebSocket the bytes go out as one Binary message.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Stream { half, .. } => {
                half.write_all(bytes).await?;
                half.flush().await?;
            }
            Self::Message { sink, .. } => {
                sink.send(Message::binary(bytes.to_vec()))
                    .await
                    .map_err(|e| Error::from_websocket(e, usize::MAX))?;
            }
        }
        trace!(bytes = bytes.len(), "Outbound unit written");
        Ok(())
    }

    /// Sends one WebSocket Text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a byte stream, which has no message
    /// framing.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let Self::Message { sink, .. } = self else {
            return Err(Error::config(
                "message framing is not available on a byte stream",
            ));
        };
        sink.send(Message::text(text.to_owned()))
            .await
            .map_err(|e| Error::from_websocket(e, usize::MAX))?;
        trace!(chars = text.len(), "Outbound message sent");
        Ok(())
    }

    /// Half-closes the write direction.
    ///
    /// Streams shut down their write side (TLS sends `close_notify` first);
    /// WebSockets send a Normal close frame and keep reading until the
    /// peer's close arrives.
    pub async fn shutdown_write(&mut self) -> Result<()> {
        match self {
            Self::Stream { half, .. } => half.shutdown().await?,
            Self::Message { sink, .. } => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static(""),
                };
                sink.send(Message::Close(Some(frame)))
                    .await
                    .map_err(|e| Error::from_websocket(e, usize::MAX))?;
            }
        }
        debug!("Write direction shut down");
        Ok(())
    }

    /// Closes the write side gracefully, bounded by [`CLOSE_GRACE_PERIOD`].
    ///
    /// Failures are logged and swallowed; the handle is released either way.
    pub async fn close(self) {
        let result = match self {
            Self::Stream { mut half, .. } => timeout(CLOSE_GRACE_PERIOD, half.shutdown())
                .await
                .map(|r| r.map_err(Error::from)),
            Self::Message { mut sink, .. } => timeout(CLOSE_GRACE_PERIOD, sink.close())
                .await
                .map(|r| r.map_err(|e| Error::from_websocket(e, usize::MAX))),
        };

        match result {
            Ok(Ok(())) => debug!("Transport closed"),
            Ok(Err(e)) => debug!(error = %e, "Transport close failed"),
            Err(_) => debug!("Transport close timed out"),
        }
    }
}

impl fmt::Debug for FramedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mode, encoding) = match self {
            Self::Stream { encoding, .. } => ("Stream", encoding),
            Self::Message { encoding, .. } => ("Message", encoding),
        };
        f.debug_struct("FramedWriter")
            .field("mode", &mode)
            .field("encoding", encoding)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::duplex;

    fn stream_descriptor(encoding: &str, chunk: usize) -> ConnectionDescriptor {
        ConnectionDescriptor::stream("localhost", 7)
            .encoding(encoding)
            .read_chunk_size(chunk)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_write_and_read() {
        let (local, mut remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (mut reader, mut writer) =
            FramedIo::Stream(Box::new(local)).split(&descriptor);

        let mut scratch = Vec::new();
        writer.send_text("ping\n", &mut scratch).await.unwrap();

        let mut received = [0u8; 5];
        remote.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"ping\n");

        remote.write_all(b"pong").await.unwrap();
        assert_eq!(
            reader.next_unit().await.unwrap(),
            Inbound::Data("pong".to_owned())
        );
    }

    #[tokio::test]
    async fn test_stream_encodes_with_codepage() {
        let (local, mut remote) = duplex(64);
        let descriptor = stream_descriptor("windows-1252", 16);
        let (_reader, mut writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        let mut scratch = Vec::new();
        writer.send_text("\u{e9}", &mut scratch).await.unwrap();

        let mut received = [0u8; 1];
        remote.read_exact(&mut received).await.unwrap();
        assert_eq!(received, [0xe9]);
    }

    #[tokio::test]
    async fn test_stream_split_sequence_across_reads() {
        let (local, mut remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 1);
        let (mut reader, _writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        remote.write_all("\u{e9}".as_bytes()).await.unwrap();
        assert_eq!(
            reader.next_unit().await.unwrap(),
            Inbound::Data("\u{e9}".to_owned())
        );
    }

    #[tokio::test]
    async fn test_stream_end_of_stream() {
        let (local, remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (mut reader, _writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        drop(remote);
        assert_eq!(reader.next_unit().await.unwrap(), Inbound::End);
        assert_eq!(reader.next_unit().await.unwrap(), Inbound::End);
    }

    #[tokio::test]
    async fn test_stream_end_flushes_partial_sequence() {
        let (local, mut remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (mut reader, _writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        remote.write_all(&[0xc3]).await.unwrap();
        drop(remote);
        assert_eq!(
            reader.next_unit().await.unwrap(),
            Inbound::Data("\u{fffd}".to_owned())
        );
        assert_eq!(reader.next_unit().await.unwrap(), Inbound::End);
    }

    #[tokio::test]
    async fn test_stream_shutdown_write_is_half_close() {
        let (local, mut remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (mut reader, mut writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        writer.shutdown_write().await.unwrap();

        let mut buf = Vec::new();
        remote.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());

        remote.write_all(b"still open").await.unwrap();
        assert_eq!(
            reader.next_unit().await.unwrap(),
            Inbound::Data("still open".to_owned())
        );
    }

    #[tokio::test]
    async fn test_send_message_rejected_on_stream() {
        let (local, _remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (_reader, mut writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        let err = writer.send_message("hi").await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_receive_next_rejected_on_stream() {
        let (local, _remote) = duplex(64);
        let descriptor = stream_descriptor("utf-8", 16);
        let (mut reader, _writer) = FramedIo::Stream(Box::new(local)).split(&descriptor);

        let err = reader.receive_next().await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_ensure_within() {
        assert!(ensure_within(10, 10).is_ok());
        assert!(matches!(
            ensure_within(11, 10),
            Err(Error::MessageTooLarge { max_size: 10 })
        ));
    }
}
