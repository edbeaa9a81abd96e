use thiserror::Error;
pub(crate) mod address;
pub(crate) mod config;
pub(crate) mod http;
pub(crate) mod socks;

pub use address::AddrError;
pub use config::ConfigError;
pub use http::TunnelError;
pub use socks::SocksError;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("TunnelError: {0}")]
    Tunnel(#[from] http::TunnelError),
    #[error("SocksError: {0}")]
    Socks(#[from] socks::SocksError),
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
}
