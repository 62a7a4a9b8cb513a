//! A writer decorator that bounds how long written-but-unflushed bytes can
//! sit before the underlying writer is flushed, mirroring the
//! `maxLatencyWriter` used to keep a reverse proxy's streamed response
//! responsive even when the upstream trickles data slowly.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

type BoxedIoResult<T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send>>;

/// How eagerly a [`FlushWriter`] pushes buffered bytes to its destination.
///
/// Mirrors the source's overloaded `time.Duration` flush-interval parameter:
/// zero means no periodic flushing, negative means flush synchronously after
/// every write, positive is a periodic flush interval.
#[derive(Debug, Clone, Copy)]
pub enum FlushInterval {
    Never,
    Immediate,
    Periodic(Duration),
}

impl From<i64> for FlushInterval {
    fn from(millis: i64) -> Self {
        match millis.cmp(&0) {
            std::cmp::Ordering::Equal => FlushInterval::Never,
            std::cmp::Ordering::Less => FlushInterval::Immediate,
            std::cmp::Ordering::Greater => FlushInterval::Periodic(Duration::from_millis(millis as u64)),
        }
    }
}

struct Shared<W> {
    inner: Mutex<W>,
    dirty: AtomicBool,
}

/// Wraps `W`, flushing it according to a [`FlushInterval`]. Safe to clone via
/// [`FlushWriter::handle`] so a background timer task can share the same
/// underlying writer without the caller holding a `&mut` reference.
pub struct FlushWriter<W> {
    shared: Arc<Shared<W>>,
    interval: FlushInterval,
    stop: Arc<Notify>,
    timer: Option<JoinHandle<()>>,
    write_fut: Option<BoxedIoResult<usize>>,
    flush_fut: Option<BoxedIoResult<()>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> FlushWriter<W> {
    pub fn new(inner: W, interval: FlushInterval) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            dirty: AtomicBool::new(false),
        });
        let stop = Arc::new(Notify::new());

        let timer = if let FlushInterval::Periodic(period) = interval {
            let shared = shared.clone();
            let stop = stop.clone();
            Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(period) => {
                            if shared.dirty.swap(false, Ordering::AcqRel) {
                                let mut guard = shared.inner.lock().await;
                                let _ = guard.flush().await;
                            }
                        }
                        _ = stop.notified() => break,
                    }
                }
            }))
        } else {
            None
        };

        Self {
            shared,
            interval,
            stop,
            timer,
            write_fut: None,
            flush_fut: None,
        }
    }

    /// Stops the background timer (if any) and performs one last flush.
    pub async fn stop(mut self) -> io::Result<()> {
        self.stop.notify_waiters();
        if let Some(handle) = self.timer.take() {
            let _ = handle.await;
        }
        let mut guard = self.shared.inner.lock().await;
        guard.flush().await
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> AsyncWrite for FlushWriter<W> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.write_fut.is_none() {
            let shared = self.shared.clone();
            let owned = buf.to_vec();
            let immediate = matches!(self.interval, FlushInterval::Immediate);
            self.write_fut = Some(Box::pin(async move {
                let mut guard = shared.inner.lock().await;
                guard.write_all(&owned).await?;
                if immediate {
                    guard.flush().await?;
                } else {
                    shared.dirty.store(true, Ordering::Release);
                }
                Ok(owned.len())
            }));
        }
        let result = self.write_fut.as_mut().unwrap().as_mut().poll(cx);
        if result.is_ready() {
            self.write_fut = None;
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.flush_fut.is_none() {
            let shared = self.shared.clone();
            self.flush_fut = Some(Box::pin(async move {
                let mut guard = shared.inner.lock().await;
                guard.flush().await
            }));
        }
        let result = self.flush_fut.as_mut().unwrap().as_mut().poll(cx);
        if result.is_ready() {
            self.flush_fut = None;
        }
        result
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
