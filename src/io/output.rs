//! Polymorphic output bindings, resolved to a single [`tokio::io::AsyncWrite`] view.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// A value that can be bound as a process's stdout/stderr.
pub enum OutputSink {
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
    Buffer(Arc<Mutex<Vec<u8>>>),
    TextQueue(mpsc::Sender<String>),
    ByteQueue(mpsc::Sender<Vec<u8>>),
}

impl OutputSink {
    pub fn kind_name(&self) -> &'static str {
        match self {
            OutputSink::Writer(_) => "writer",
            OutputSink::Buffer(_) => "buffer",
            OutputSink::TextQueue(_) => "text queue",
            OutputSink::ByteQueue(_) => "byte queue",
        }
    }

    pub fn into_writer(self) -> Box<dyn AsyncWrite + Send + Unpin> {
        match self {
            OutputSink::Writer(w) => w,
            OutputSink::Buffer(buf) => Box::new(BufferWriter { buf }),
            OutputSink::TextQueue(tx) => Box::new(QueueWriter::Text {
                tx: PollSender::new(tx),
            }),
            OutputSink::ByteQueue(tx) => Box::new(QueueWriter::Bytes {
                tx: PollSender::new(tx),
            }),
        }
    }
}

/// Appends every write to a shared buffer the caller retains a handle to.
struct BufferWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl AsyncWrite for BufferWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut guard = self
            .buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Each write enqueues one chunk on a bounded queue; once the downstream
/// receiver is dropped, further writes report the stream as closed. Uses
/// `PollSender` so a full queue applies real backpressure (registers a
/// waker) rather than busy-spinning.
enum QueueWriter {
    Text { tx: PollSender<String> },
    Bytes { tx: PollSender<Vec<u8>> },
}

fn closed_io_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "downstream queue closed")
}

impl AsyncWrite for QueueWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            QueueWriter::Text { tx } => {
                match tx.poll_reserve(cx) {
                    Poll::Ready(Ok(())) => {}
                    Poll::Ready(Err(_)) => return Poll::Ready(Err(closed_io_error())),
                    Poll::Pending => return Poll::Pending,
                }
                let text = String::from_utf8_lossy(data).into_owned();
                match tx.send_item(text) {
                    Ok(()) => Poll::Ready(Ok(data.len())),
                    Err(_) => Poll::Ready(Err(closed_io_error())),
                }
            }
            QueueWriter::Bytes { tx } => {
                match tx.poll_reserve(cx) {
                    Poll::Ready(Ok(())) => {}
                    Poll::Ready(Err(_)) => return Poll::Ready(Err(closed_io_error())),
                    Poll::Pending => return Poll::Pending,
                }
                match tx.send_item(data.to_vec()) {
                    Ok(()) => Poll::Ready(Ok(data.len())),
                    Err(_) => Poll::Ready(Err(closed_io_error())),
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
