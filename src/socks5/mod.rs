use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use hyper::StatusCode;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::{
    address::DestinationAddress,
    dial::{Dial, Network},
    error::{ProxyError, SocksError, TunnelError},
    AsyncSocket,
};

/// Bind address reported to clients; the tunnel's real local end is not theirs to use.
const UNSPECIFIED_BIND: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// SOCKS5 front: negotiates with the client, hands the requested target to a
/// [`Dial`] implementation and splices the two streams.
///
/// Only the "no authentication" method and the CONNECT command are served.
pub struct Socks5Server<D> {
    dialer: D,
}

impl<D: Dial> Socks5Server<D> {
    pub fn new(dialer: D) -> Self {
        Socks5Server { dialer }
    }

    /// Serves one client connection until the tunnel is closed by either side.
    pub async fn serve(
        &self,
        cancel: &CancellationToken,
        mut socket_stream: impl AsyncSocket,
    ) -> Result<(), ProxyError> {
        let auth_request = AuthRequest::read(&mut socket_stream).await?;
        if !auth_request.methods.contains(&AuthMethod::NoAuth) {
            AuthResponse::new(AuthMethod::NoAcceptableMethod)
                .write(&mut socket_stream)
                .await?;
            return Err(SocksError::MethodNotSupported.into());
        }
        AuthResponse::new(AuthMethod::NoAuth)
            .write(&mut socket_stream)
            .await?;

        let request = match CommandRequest::read(&mut socket_stream).await {
            Ok(request) => request,
            Err(e) => {
                let reply = match e {
                    SocksError::CommandNotSupported => Some(Reply::CommandNotSupported),
                    SocksError::AddressTypeNotSupported => Some(Reply::AddressTypeNotSupported),
                    SocksError::AddressError(_) => Some(Reply::GeneralSocksServerFailure),
                    _ => None,
                };
                if let Some(reply) = reply {
                    reply_error(&mut socket_stream, reply).await;
                }
                return Err(e.into());
            }
        };
        if !matches!(request.command, Command::Connect) {
            reply_error(&mut socket_stream, Reply::CommandNotSupported).await;
            return Err(SocksError::CommandNotSupported.into());
        }

        let target = request.addr.to_string();
        let mut conn = match self.dialer.dial(cancel, Network::Tcp, &target).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Unable to open tunnel to {}: {}", target, e);
                reply_error(&mut socket_stream, Reply::from(&e)).await;
                return Err(e.into());
            }
        };

        CommandResponse::new(Reply::Succeeded, UNSPECIFIED_BIND)
            .write(&mut socket_stream)
            .await?;
        let (up, down) = tokio::io::copy_bidirectional(&mut socket_stream, &mut conn).await?;
        debug!("Tunnel to {} closed ({} bytes up, {} bytes down)", target, up, down);
        Ok(())
    }
}

async fn reply_error(socket: impl AsyncWrite + Unpin, reply: Reply) {
    if let Err(e) = CommandResponse::new(reply, UNSPECIFIED_BIND)
        .write(socket)
        .await
    {
        debug!("Unable to send SOCKS5 failure reply: {}", e);
    }
}

#[derive(PartialEq, Clone, Copy)]
pub enum Version {
    V5 = 5,
}

impl Version {
    pub async fn read(mut reader: impl AsyncRead + Unpin) -> Result<Self, SocksError> {
        match reader.read_u8().await? {
            5 => Ok(Version::V5),
            _ => Err(SocksError::InvalidVersion),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default)]
pub enum AuthMethod {
    #[default]
    NoAuth,
    GssApi,
    UsernamePassword,
    NoAcceptableMethod,
    Other(u8),
}

impl From<&AuthMethod> for u8 {
    fn from(v: &AuthMethod) -> Self {
        match *v {
            AuthMethod::NoAuth => 0,
            AuthMethod::GssApi => 1,
            AuthMethod::UsernamePassword => 2,
            AuthMethod::NoAcceptableMethod => 0xff,
            AuthMethod::Other(v) => v,
        }
    }
}

impl From<u8> for AuthMethod {
    fn from(v: u8) -> Self {
        match v {
            0 => AuthMethod::NoAuth,
            1 => AuthMethod::GssApi,
            2 => AuthMethod::UsernamePassword,
            0xff => AuthMethod::NoAcceptableMethod,
            v => AuthMethod::Other(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Connect = 1,
    Bind = 2,
    UdpAssociate = 3,
}

impl TryFrom<u8> for Command {
    type Error = SocksError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Command::Connect),
            2 => Ok(Command::Bind),
            3 => Ok(Command::UdpAssociate),
            _ => Err(SocksError::CommandNotSupported),
        }
    }
}

pub struct Address {
    pub addr: DestinationAddress,
}

impl Address {
    pub async fn read(mut reader: impl AsyncRead + Unpin) -> Result<Self, SocksError> {
        let addr = match reader.read_u8().await? {
            1 => {
                let mut buf = [0u8; 6];
                reader.read_exact(&mut buf).await?;
                DestinationAddress::from_bytes(&buf, true)?
            }
            3 => {
                let mut buf = vec![0u8; reader.read_u8().await? as usize + 2];
                reader.read_exact(&mut buf).await?;
                DestinationAddress::from_bytes(&buf, false)?
            }
            4 => {
                let mut buf = [0u8; 18];
                reader.read_exact(&mut buf).await?;
                DestinationAddress::from_bytes(&buf, true)?
            }
            _ => return Err(SocksError::AddressTypeNotSupported),
        };
        Ok(Self { addr })
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Reply {
    Succeeded,
    GeneralSocksServerFailure,
    ConnectionNotAllowedByRuleset,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
}

impl From<Reply> for u8 {
    fn from(v: Reply) -> Self {
        match v {
            Reply::Succeeded => 0,
            Reply::GeneralSocksServerFailure => 1,
            Reply::ConnectionNotAllowedByRuleset => 2,
            Reply::NetworkUnreachable => 3,
            Reply::HostUnreachable => 4,
            Reply::ConnectionRefused => 5,
            Reply::TtlExpired => 6,
            Reply::CommandNotSupported => 7,
            Reply::AddressTypeNotSupported => 8,
        }
    }
}

/// What a SOCKS5 client is told when its tunnel could not be opened. The
/// upstream's HTTP details stay in the logs.
impl From<&TunnelError> for Reply {
    fn from(e: &TunnelError) -> Self {
        match e {
            TunnelError::Connect { source, .. } => match source.kind() {
                std::io::ErrorKind::ConnectionRefused => Reply::ConnectionRefused,
                std::io::ErrorKind::Interrupted => Reply::GeneralSocksServerFailure,
                _ => Reply::HostUnreachable,
            },
            TunnelError::UpstreamRejected { status, .. } => match *status {
                StatusCode::FORBIDDEN => Reply::ConnectionNotAllowedByRuleset,
                StatusCode::BAD_GATEWAY => Reply::HostUnreachable,
                StatusCode::GATEWAY_TIMEOUT => Reply::TtlExpired,
                _ => Reply::GeneralSocksServerFailure,
            },
            TunnelError::InvalidTarget(_)
            | TunnelError::RequestWrite(_)
            | TunnelError::ResponseRead(_) => Reply::GeneralSocksServerFailure,
        }
    }
}

struct AuthRequest {
    methods: Vec<AuthMethod>,
}

impl AuthRequest {
    pub async fn read(mut reader: impl AsyncRead + Unpin) -> Result<Self, SocksError> {
        Version::read(&mut reader).await?;
        let mut methods = vec![0u8; reader.read_u8().await? as usize];
        reader.read_exact(&mut methods).await?;
        Ok(AuthRequest {
            methods: methods.into_iter().map(AuthMethod::from).collect(),
        })
    }
}

struct AuthResponse {
    method: AuthMethod,
}

impl AuthResponse {
    pub fn new(method: AuthMethod) -> Self {
        AuthResponse { method }
    }

    pub async fn write(&self, mut writer: impl AsyncWrite + Unpin) -> Result<(), SocksError> {
        writer
            .write_all(&[Version::V5 as u8, (&self.method).into()])
            .await
            .map_err(|e| e.into())
    }
}

struct CommandRequest {
    command: Command,
    addr: DestinationAddress,
}

impl CommandRequest {
    pub async fn read(mut reader: impl AsyncRead + Unpin) -> Result<Self, SocksError> {
        Version::read(&mut reader).await?;
        let command = Command::try_from(reader.read_u8().await?)?;
        reader.read_u8().await?;
        let addr = Address::read(&mut reader).await?;
        Ok(CommandRequest {
            command,
            addr: addr.addr,
        })
    }
}

struct CommandResponse {
    reply: Reply,
    bind: SocketAddr,
}

impl CommandResponse {
    pub fn new(reply: Reply, bind: SocketAddr) -> Self {
        CommandResponse { reply, bind }
    }

    pub async fn write(&self, mut writer: impl AsyncWrite + Unpin) -> Result<(), SocksError> {
        let atyp = match self.bind {
            SocketAddr::V4(_) => 1u8,
            SocketAddr::V6(_) => 4u8,
        };
        let header = [Version::V5 as u8, self.reply.into(), 0, atyp];
        let bytes = DestinationAddress::Ip(self.bind).to_bytes();
        writer
            .write_all(&[header.as_ref(), bytes.as_ref()].concat())
            .await
            .map_err(|e| e.into())
    }
}
