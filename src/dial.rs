use std::fmt::Display;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{error::TunnelError, AsyncSocket};

/// Transport requested by the front. Only TCP is ever tunneled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
        }
    }
}

/// Opens an outbound connection for a proxied request.
///
/// The SOCKS5 front only knows about this trait, so any dialer (the HTTP
/// CONNECT one, a direct one, a test double) can be plugged in. Cancelling
/// `cancel` must abort the attempt and release whatever it opened.
#[async_trait]
pub trait Dial: Send + Sync + 'static {
    type Conn: AsyncSocket;

    async fn dial(
        &self,
        cancel: &CancellationToken,
        network: Network,
        addr: &str,
    ) -> Result<Self::Conn, TunnelError>;
}
