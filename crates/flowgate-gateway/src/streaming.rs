//! Bridges the core pipeline's [`tokio::io::AsyncWrite`]-based output to an
//! actix-web streaming response body.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_web::web::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

type PendingSend = Pin<Box<dyn Future<Output = Result<(), mpsc::error::SendError<Bytes>>> + Send>>;

/// An [`AsyncWrite`] that forwards every chunk to an `mpsc::Sender<Bytes>`,
/// whose receiving end is turned into the actix response body via
/// `tokio_stream::wrappers::ReceiverStream`.
pub struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
    pending: Option<PendingSend>,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx, pending: None }
    }
}

impl AsyncWrite for ChannelWriter {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.pending.is_none() {
            let tx = self.tx.clone();
            let chunk = Bytes::copy_from_slice(buf);
            self.pending = Some(Box::pin(async move { tx.send(chunk).await }));
        }
        let result = self.pending.as_mut().unwrap().as_mut().poll(cx);
        match result {
            Poll::Ready(Ok(())) => {
                self.pending = None;
                Poll::Ready(Ok(buf.len()))
            }
            Poll::Ready(Err(_)) => {
                self.pending = None;
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
