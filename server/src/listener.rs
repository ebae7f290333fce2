use std::{future::Future, io, net::SocketAddr, time::Duration};

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tracing::Instrument;
use uuid::Uuid;
use vaultline_common::{Error, Result};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// TCP listener that hands every accepted connection to its own task.
///
/// There is no admission control: each accepted connection is spawned
/// immediately, so concurrency is bounded only by the operating system.
#[derive(Debug)]
pub struct ConnectionListener {
    inner: TcpListener,
}

impl ConnectionListener {
    /// Resolve `addr`, bind and start listening with the given backlog.
    ///
    /// Every resolved address is tried in order; the first that binds wins.
    /// Failure is reported as [`Error::Bind`].
    pub async fn bind(addr: &str, backlog: u32) -> Result<Self> {
        let bind_error = |source: io::Error| Error::Bind {
            addr: addr.to_string(),
            source,
        };

        let mut last_error = None;
        for candidate in lookup_host(addr).await.map_err(bind_error)? {
            match Self::bind_one(candidate, backlog) {
                Ok(inner) => {
                    tracing::info!(%candidate, backlog, "Listener bound");
                    return Ok(Self { inner });
                }
                Err(e) => {
                    tracing::debug!(%candidate, error = %e, "Bind attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(bind_error(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        })))
    }

    fn bind_one(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        #[cfg(unix)]
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(backlog)
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept connections forever, spawning `on_accept` for each one.
    ///
    /// A failed accept is logged and the loop carries on. Each spawned task
    /// runs inside a `connection` span carrying a fresh id and the peer
    /// address. Runs until the process exits.
    pub async fn serve<F, Fut>(self, on_accept: F)
    where
        F: Fn(TcpStream, SocketAddr) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let local = self
            .inner
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        tracing::info!(address = %local, "Accepting connections");

        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    let span = tracing::info_span!("connection", id = %Uuid::new_v4(), %peer);
                    span.in_scope(|| tracing::debug!("New connection received"));
                    tokio::spawn(on_accept(stream, peer).instrument(span));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Connection error");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = ConnectionListener::bind("127.0.0.1:0", 16).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let first = ConnectionListener::bind("127.0.0.1:0", 16).await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        match ConnectionListener::bind(&taken, 16).await {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_host_is_bind_error() {
        let result = ConnectionListener::bind("no-such-host.invalid:9999", 16).await;
        assert!(matches!(result, Err(Error::Bind { .. })));
    }

    #[tokio::test]
    async fn dispatches_every_connection() {
        let listener = ConnectionListener::bind("127.0.0.1:0", 16).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        let counter = Arc::clone(&seen);
        tokio::spawn(listener.serve(move |_stream, _peer| {
            let counter = Arc::clone(&counter);
            let done = done_tx.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done.send(());
            }
        }));

        for _ in 0..5 {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        for _ in 0..5 {
            done_rx.recv().await.unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
