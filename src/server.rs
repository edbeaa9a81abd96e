use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{dial::Dial, socks5::Socks5Server};

/// Pause after a failed `accept`, so a persistent error (EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts SOCKS5 clients until `shutdown` is cancelled, one task per client.
///
/// The token is handed to every connection so that cancelling it also aborts
/// dials that are still in flight.
pub async fn serve<D: Dial>(
    listener: TcpListener,
    front: Arc<Socks5Server<D>>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("No longer accepting connections on {}", listener.local_addr()?);
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Unable to accept connection: {}", e);
                    backoff(&shutdown, ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };
        debug!("New connection from {}", peer);
        let front = front.clone();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = front.serve(&cancel, stream).await {
                debug!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn backoff(shutdown: &CancellationToken, delay: Duration) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn backoff_waits_between_accept_failures() {
        let started = Instant::now();
        backoff(&CancellationToken::new(), ACCEPT_BACKOFF).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn backoff_ends_on_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let started = Instant::now();
        backoff(&shutdown, Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
