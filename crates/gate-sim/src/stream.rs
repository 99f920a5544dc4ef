//! Stream wrapper with injectable read failures

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Wraps a stream and fails reads on demand
///
/// A failure is only reported once data is ready to be read, like a UART
/// overrun: the bytes stay buffered and the next read after the error
/// returns them.
pub struct FaultyStream<S> {
    inner: S,
    read_failures: Arc<AtomicUsize>,
}

/// Injects failures into a [`FaultyStream`] from outside
#[derive(Clone)]
pub struct FaultInjector {
    read_failures: Arc<AtomicUsize>,
}

impl<S> FaultyStream<S> {
    /// Wrap `inner`; returns the stream and its injector
    pub fn new(inner: S) -> (Self, FaultInjector) {
        let read_failures = Arc::new(AtomicUsize::new(0));
        let injector = FaultInjector {
            read_failures: read_failures.clone(),
        };
        (
            Self {
                inner,
                read_failures,
            },
            injector,
        )
    }

    fn take_failure(&self) -> bool {
        self.read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl FaultInjector {
    /// Fail the next `count` reads that would otherwise return data
    pub fn fail_next_reads(&self, count: usize) {
        self.read_failures.store(count, Ordering::SeqCst);
    }

    /// Failures not yet delivered
    pub fn remaining(&self) -> usize {
        self.read_failures.load(Ordering::SeqCst)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for FaultyStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.read_failures.load(Ordering::SeqCst) == 0 {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        }

        // Only fail once the peer has written something
        let mut probe = [0u8; 1];
        let mut probe_buf = ReadBuf::new(&mut probe);
        match Pin::new(&mut this.inner).poll_read(cx, &mut probe_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) if probe_buf.filled().is_empty() => Poll::Ready(Ok(())),
            Poll::Ready(Ok(())) => {
                if this.take_failure() {
                    // The probed byte is lost, as on a real overrun
                    Poll::Ready(Err(io::Error::other("injected read failure")))
                } else {
                    buf.put_slice(probe_buf.filled());
                    Poll::Ready(Ok(()))
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for FaultyStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
