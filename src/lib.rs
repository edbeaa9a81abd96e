pub mod address;
pub mod config;
pub mod dial;
mod error;
pub mod http;
pub mod server;
pub mod socks5;

pub use address::{DestinationAddress, ToSocketDestination};
pub use config::Config;
pub use dial::{Dial, Network};
pub use error::{AddrError, ConfigError, ProxyError, SocksError, TunnelError};
pub use http::{Connector, HttpConfig, HttpConnectDialer, TcpConnector, Tunnel, UpstreamProxy};
pub use socks5::Socks5Server;
use tokio::io::{AsyncRead, AsyncWrite};

pub trait AsyncSocket: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T> AsyncSocket for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
