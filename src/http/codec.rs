use std::io;

use hyper::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, HOST, PROXY_AUTHORIZATION, USER_AGENT},
    Method, StatusCode,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub const MAX_RESPONSE_HEAD: usize = 16 * 1024;
pub const MAX_RESPONSE_HEADERS: usize = 64;

const USER_AGENT_VALUE: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A CONNECT request for `target`, the literal `host:port` used both as
/// request-target and `Host`.
pub struct ConnectRequest<'a> {
    target: &'a str,
    headers: HeaderMap,
}

impl<'a> ConnectRequest<'a> {
    pub fn new(target: &'a str) -> Self {
        ConnectRequest {
            target,
            headers: HeaderMap::new(),
        }
    }

    pub fn basic_auth(mut self, value: Option<&HeaderValue>) -> Self {
        if let Some(value) = value {
            self.headers.insert(AUTHORIZATION, value.clone());
            self.headers.insert(PROXY_AUTHORIZATION, value.clone());
        }
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(
            format!(
                "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\n",
                Method::CONNECT,
                self.target,
                self.target,
                USER_AGENT_VALUE
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            if name == HOST || name == USER_AGENT {
                continue;
            }
            buf.extend_from_slice(title_case(name.as_str()).as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

fn title_case(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let c = if upper { c.to_ascii_uppercase() } else { c };
            upper = c == '-';
            c
        })
        .collect()
}

#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub reason: String,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Reads the status line and headers of the proxy's answer, consuming
/// exactly the head and nothing that follows it.
pub async fn read_response_head<R>(reader: &mut R) -> io::Result<ResponseHead>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = (&mut *reader).take(MAX_RESPONSE_HEAD as u64);
    let mut head = Vec::new();
    loop {
        let start = head.len();
        if limited.read_until(b'\n', &mut head).await? == 0 {
            return Err(if head.len() >= MAX_RESPONSE_HEAD || limited.limit() == 0 {
                invalid("response head too large")
            } else {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response head completed",
                )
            });
        }
        let line = &head[start..];
        if !line.ends_with(b"\n") {
            // limit hit mid-line; the next iteration reports it
            continue;
        }
        if line == b"\r\n" || line == b"\n" {
            if start == 0 {
                head.clear();
                continue;
            }
            break;
        }
    }

    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err(invalid("incomplete response head")),
        Err(e) => return Err(invalid(format!("malformed response head: {}", e))),
    }
    let code = response.code.ok_or_else(|| invalid("missing status code"))?;
    let status = StatusCode::from_u16(code).map_err(|e| invalid(e.to_string()))?;
    Ok(ResponseHead {
        status,
        reason: response.reason.unwrap_or_default().to_owned(),
    })
}
