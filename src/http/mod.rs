mod codec;
pub mod config;
mod tunnel;

use std::{fmt::Debug, future::Future, io, sync::Arc};

use async_trait::async_trait;
use hyper::StatusCode;
use log::{debug, warn};
use socket2::{SockRef, TcpKeepalive};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;

pub use codec::{ConnectRequest, MAX_RESPONSE_HEAD};
pub use config::{Config as HttpConfig, Credentials, UpstreamProxy};
pub use tunnel::Tunnel;

use crate::{
    address::ToSocketDestination,
    dial::{Dial, Network},
    error::TunnelError,
};

/// Opens the raw TCP connection to the upstream proxy.
#[async_trait]
pub trait Connector: Debug + Send + Sync {
    async fn connect(&self, addr: &str) -> io::Result<TcpStream>;
}

/// Plain `TcpStream::connect`, resolving `addr` through the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}

/// Dials targets by asking an upstream HTTP proxy to CONNECT to them.
///
/// Every call opens a fresh upstream connection; nothing is pooled. The
/// dialer is cheap to clone and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct HttpConnectDialer {
    upstream: Arc<UpstreamProxy>,
    config: HttpConfig,
    connector: Arc<dyn Connector>,
}

impl HttpConnectDialer {
    pub fn new(upstream: UpstreamProxy, config: HttpConfig) -> Self {
        HttpConnectDialer {
            upstream: Arc::new(upstream),
            config,
            connector: Arc::new(TcpConnector),
        }
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Opens a tunnel to `addr` (`host:port`) through the upstream proxy.
    ///
    /// Single attempt, no retries. On any error the upstream socket has been
    /// closed by the time this returns.
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        network: Network,
        addr: &str,
    ) -> Result<Tunnel, TunnelError> {
        addr.to_destination_address()
            .map_err(|_| TunnelError::InvalidTarget(addr.to_owned()))?;
        debug!("Dialing {} {} via {}", network, addr, self.upstream);

        let stream = self.connect(cancel).await?;

        let request = ConnectRequest::new(addr)
            .basic_auth(self.upstream.basic_auth())
            .encode();
        let mut reader = BufReader::new(stream);
        until_cancelled(cancel, reader.get_mut().write_all(&request))
            .await
            .map_err(TunnelError::RequestWrite)?;

        let reading = async {
            let read = codec::read_response_head(&mut reader);
            tokio::time::timeout(self.config.response_timeout, read)
                .await
                .unwrap_or_else(|_| Err(TunnelError::timed_out()))
        };
        let head = until_cancelled(cancel, reading)
            .await
            .map_err(TunnelError::ResponseRead)?;

        if head.status != StatusCode::OK {
            // dropping the reader closes the upstream socket
            return Err(TunnelError::UpstreamRejected {
                status: head.status,
                reason: head.reason,
            });
        }

        let early = reader.buffer().to_vec();
        debug!("Tunnel to {} established via {}", addr, self.upstream);
        Ok(Tunnel::new(reader.into_inner(), early))
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<TcpStream, TunnelError> {
        let upstream = self.upstream.addr();
        let connecting = async {
            let connect = self.connector.connect(&upstream);
            tokio::time::timeout(self.config.connect_timeout, connect)
                .await
                .unwrap_or_else(|_| Err(TunnelError::timed_out()))
        };
        let stream = until_cancelled(cancel, connecting)
            .await
            .map_err(|source| TunnelError::Connect {
                upstream: upstream.clone(),
                source,
            })?;

        let keepalive = TcpKeepalive::new().with_time(self.config.keepalive);
        #[cfg(any(
            target_os = "android",
            target_os = "freebsd",
            target_os = "ios",
            target_os = "linux",
            target_os = "macos",
            target_os = "netbsd",
            target_os = "windows",
        ))]
        let keepalive = keepalive.with_interval(self.config.keepalive);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            warn!("Unable to enable keep-alive towards {}: {}", upstream, e);
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Unable to set TCP_NODELAY towards {}: {}", upstream, e);
        }
        Ok(stream)
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TunnelError::cancelled()),
        res = fut => res,
    }
}

#[async_trait]
impl Dial for HttpConnectDialer {
    type Conn = Tunnel;

    async fn dial(
        &self,
        cancel: &CancellationToken,
        network: Network,
        addr: &str,
    ) -> Result<Tunnel, TunnelError> {
        HttpConnectDialer::dial(self, cancel, network, addr).await
    }
}
