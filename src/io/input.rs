//! Polymorphic input bindings, resolved to a single [`tokio::io::AsyncRead`] view.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// A value that can be bound as a process's stdin.
pub enum InputSource {
    Text(String),
    Bytes(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    /// A snapshot of a buffer's contents at bind time.
    Buffer(Vec<u8>),
    TextQueue(mpsc::Receiver<String>),
    ByteQueue(mpsc::Receiver<Vec<u8>>),
}

#[cfg(feature = "serde")]
impl InputSource {
    /// Parses a stdin binding out of a loosely-typed modifier description,
    /// e.g. a pipeline step read from configuration. Only the kinds that
    /// can be spelled in static JSON — `text` and `bytes` — are recognized;
    /// a reader, buffer, or queue is a live Rust value with no JSON
    /// representation, so any other tag (including those) fails with
    /// `UnsupportedBinding`, naming the offending tag.
    pub fn from_json(value: &serde_json::Value) -> crate::error::Result<InputSource> {
        use crate::error::Error;

        let Some(obj) = value.as_object() else {
            return Err(Error::UnsupportedBinding {
                kind_name: "non-object stdin binding".to_string(),
            });
        };

        match obj.get("kind").and_then(|v| v.as_str()) {
            Some("text") => match obj.get("value").and_then(|v| v.as_str()) {
                Some(s) => Ok(InputSource::Text(s.to_string())),
                None => Err(Error::UnsupportedBinding {
                    kind_name: "text (missing string value)".to_string(),
                }),
            },
            Some("bytes") => match obj.get("value").and_then(|v| v.as_array()) {
                Some(items) => {
                    let mut bytes = Vec::with_capacity(items.len());
                    for item in items {
                        match item.as_u64().and_then(|n| u8::try_from(n).ok()) {
                            Some(b) => bytes.push(b),
                            None => {
                                return Err(Error::UnsupportedBinding {
                                    kind_name: "bytes (element out of u8 range)".to_string(),
                                });
                            }
                        }
                    }
                    Ok(InputSource::Bytes(bytes))
                }
                None => Err(Error::UnsupportedBinding {
                    kind_name: "bytes (missing array value)".to_string(),
                }),
            },
            Some(other) => Err(Error::UnsupportedBinding {
                kind_name: other.to_string(),
            }),
            None => Err(Error::UnsupportedBinding {
                kind_name: "stdin binding with no \"kind\" tag".to_string(),
            }),
        }
    }
}

impl InputSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            InputSource::Text(_) => "text",
            InputSource::Bytes(_) => "bytes",
            InputSource::Reader(_) => "reader",
            InputSource::Buffer(_) => "buffer",
            InputSource::TextQueue(_) => "text queue",
            InputSource::ByteQueue(_) => "byte queue",
        }
    }

    /// Resolve this source to a single uniform byte-stream reader.
    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Unpin> {
        match self {
            InputSource::Text(s) => Box::new(std::io::Cursor::new(s.into_bytes())),
            InputSource::Bytes(b) => Box::new(std::io::Cursor::new(b)),
            InputSource::Reader(r) => r,
            InputSource::Buffer(b) => Box::new(std::io::Cursor::new(b)),
            InputSource::TextQueue(rx) => Box::new(QueueReader::Text {
                rx,
                remainder: Vec::new(),
            }),
            InputSource::ByteQueue(rx) => Box::new(QueueReader::Bytes {
                rx,
                remainder: Vec::new(),
            }),
        }
    }
}

/// A streaming reader over a bounded queue of text or byte chunks.
///
/// Buffers any partial remainder across calls; reports end-of-stream only
/// once the queue is closed and the remainder has been fully drained.
enum QueueReader {
    Text {
        rx: mpsc::Receiver<String>,
        remainder: Vec<u8>,
    },
    Bytes {
        rx: mpsc::Receiver<Vec<u8>>,
        remainder: Vec<u8>,
    },
}

impl QueueReader {
    fn drain_remainder(remainder: &mut Vec<u8>, out: &mut ReadBuf<'_>) -> bool {
        if remainder.is_empty() {
            return false;
        }
        let take = remainder.len().min(out.remaining());
        out.put_slice(&remainder[..take]);
        remainder.drain(..take);
        true
    }

    fn stash(remainder: &mut Vec<u8>, chunk: Vec<u8>, out: &mut ReadBuf<'_>) {
        let take = chunk.len().min(out.remaining());
        out.put_slice(&chunk[..take]);
        if take < chunk.len() {
            remainder.extend_from_slice(&chunk[take..]);
        }
    }
}

impl AsyncRead for QueueReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        match this {
            QueueReader::Text { rx, remainder } => {
                if Self::drain_remainder(remainder, out) {
                    return Poll::Ready(Ok(()));
                }
                match rx.poll_recv(cx) {
                    Poll::Ready(Some(chunk)) => {
                        Self::stash(remainder, chunk.into_bytes(), out);
                        Poll::Ready(Ok(()))
                    }
                    Poll::Ready(None) => Poll::Ready(Ok(())),
                    Poll::Pending => Poll::Pending,
                }
            }
            QueueReader::Bytes { rx, remainder } => {
                if Self::drain_remainder(remainder, out) {
                    return Poll::Ready(Ok(()));
                }
                match rx.poll_recv(cx) {
                    Poll::Ready(Some(chunk)) => {
                        Self::stash(remainder, chunk, out);
                        Poll::Ready(Ok(()))
                    }
                    Poll::Ready(None) => Poll::Ready(Ok(())),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn queue_reader_buffers_residual_across_reads() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(4);
        tx.send(b"abcdef".to_vec()).await.unwrap();
        drop(tx);

        let mut reader = InputSource::ByteQueue(rx).into_reader();
        let mut small = [0u8; 3];
        let n = reader.read(&mut small).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&small, b"abc");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"def");
    }

    #[tokio::test]
    async fn queue_reader_reports_eof_only_when_closed_and_drained() {
        let (tx, rx) = mpsc::channel::<String>(4);
        tx.send("bees\n".to_string()).await.unwrap();
        drop(tx);

        let mut reader = InputSource::TextQueue(rx).into_reader();
        let mut collected = Vec::new();
        reader.read_to_end(&mut collected).await.unwrap();
        assert_eq!(collected, b"bees\n");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn from_json_parses_text_and_bytes() {
        let text = InputSource::from_json(&serde_json::json!({"kind": "text", "value": "hi"}))
            .unwrap();
        assert!(matches!(text, InputSource::Text(s) if s == "hi"));

        let bytes =
            InputSource::from_json(&serde_json::json!({"kind": "bytes", "value": [1, 2, 3]}))
                .unwrap();
        assert!(matches!(bytes, InputSource::Bytes(b) if b == vec![1, 2, 3]));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn from_json_rejects_a_kind_with_no_json_representation() {
        let err = InputSource::from_json(&serde_json::json!({"kind": "reader"})).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::UnsupportedBinding { .. }
        ));
    }
}
