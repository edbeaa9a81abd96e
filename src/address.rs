use std::{
    fmt::Display,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    str::FromStr,
};

use crate::error::AddrError;

/// Target of a tunnel: either a literal socket address or an unresolved
/// domain name that the upstream proxy resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationAddress {
    Domain(String, u16),
    Ip(SocketAddr),
}

impl DestinationAddress {
    pub fn port(&self) -> u16 {
        match self {
            DestinationAddress::Domain(_, port) => *port,
            DestinationAddress::Ip(addr) => addr.port(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            DestinationAddress::Domain(domain, port) => {
                [domain.as_bytes(), port.to_be_bytes().as_ref()].concat()
            }
            DestinationAddress::Ip(SocketAddr::V4(addr)) => {
                [&addr.ip().octets(), addr.port().to_be_bytes().as_ref()].concat()
            }
            DestinationAddress::Ip(SocketAddr::V6(addr)) => {
                [&addr.ip().octets(), addr.port().to_be_bytes().as_ref()].concat()
            }
        }
    }

    pub fn from_bytes(buf: &[u8], ip: bool) -> Result<Self, AddrError> {
        if buf.len() < 3 {
            return Err(AddrError::InvalidAddress);
        }
        let (host, port) = buf.split_at(buf.len() - 2);
        let port = u16::from_be_bytes([port[0], port[1]]);
        if !ip {
            let domain = String::from_utf8(host.to_vec())
                .map_err(|e| AddrError::InvalidDomain(String::from_utf8_lossy(e.as_bytes()).into()))?;
            return Self::domain(domain, port);
        }
        let addr = match host.len() {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(host);
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(host);
                SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(octets), port, 0, 0))
            }
            _ => return Err(AddrError::InvalidAddress),
        };
        Ok(DestinationAddress::Ip(addr))
    }

    /// Builds a domain destination, rejecting names that cannot be carried
    /// verbatim in an HTTP request line.
    pub fn domain(domain: impl Into<String>, port: u16) -> Result<Self, AddrError> {
        let domain = domain.into();
        if domain.is_empty()
            || domain.len() > 255
            || !domain.bytes().all(|b| b.is_ascii_graphic() && b != b':')
        {
            return Err(AddrError::InvalidDomain(domain));
        }
        Ok(DestinationAddress::Domain(domain, port))
    }
}

impl Display for DestinationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationAddress::Domain(domain, port) => write!(f, "{}:{}", domain, port),
            DestinationAddress::Ip(addr) => write!(f, "{}", addr),
        }
    }
}

impl FromStr for DestinationAddress {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_destination_address()
    }
}

pub trait ToSocketDestination {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError>;
}

impl ToSocketDestination for SocketAddr {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        Ok(DestinationAddress::Ip(*self))
    }
}

impl ToSocketDestination for DestinationAddress {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        Ok(self.clone())
    }
}

impl ToSocketDestination for &str {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        if let Ok(ip) = self.parse::<SocketAddr>() {
            return Ok(DestinationAddress::Ip(ip));
        }
        let (domain, port) = self.rsplit_once(':').ok_or(AddrError::InvalidAddress)?;
        let port = port.parse::<u16>().or(Err(AddrError::InvalidAddress))?;
        DestinationAddress::domain(domain, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_domain_and_ip_targets() {
        assert_eq!(
            "example.com:443".parse::<DestinationAddress>().unwrap(),
            DestinationAddress::Domain("example.com".into(), 443)
        );
        assert_eq!(
            "10.0.0.5:80".parse::<DestinationAddress>().unwrap(),
            DestinationAddress::Ip("10.0.0.5:80".parse().unwrap())
        );
        let v6 = "[2001:db8::1]:8443".parse::<DestinationAddress>().unwrap();
        assert_eq!(v6.to_string(), "[2001:db8::1]:8443");
        assert_eq!(v6.port(), 8443);
    }

    #[test]
    fn rejects_malformed_targets() {
        assert_eq!(
            "example.com".parse::<DestinationAddress>(),
            Err(AddrError::InvalidAddress)
        );
        assert_eq!(
            "example.com:99999".parse::<DestinationAddress>(),
            Err(AddrError::InvalidAddress)
        );
        assert!(":80".parse::<DestinationAddress>().is_err());
        assert!("2001:db8::1:80".parse::<DestinationAddress>().is_err());
        assert!("evil.com\r\nX-Injected: 1:80"
            .parse::<DestinationAddress>()
            .is_err());
    }

    #[test]
    fn decodes_socks_domain_bytes() {
        let buf = [b"example.org".as_ref(), &443u16.to_be_bytes()].concat();
        assert_eq!(
            DestinationAddress::from_bytes(&buf, false).unwrap(),
            DestinationAddress::Domain("example.org".into(), 443)
        );
        let ip = DestinationAddress::Ip("192.168.1.2:8080".parse().unwrap());
        assert_eq!(DestinationAddress::from_bytes(&ip.to_bytes(), true).unwrap(), ip);
        assert_eq!(
            DestinationAddress::from_bytes(&[1, 2, 3, 4, 5], true),
            Err(AddrError::InvalidAddress)
        );
    }
}
