use thiserror::Error;
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid upstream proxy URL: {0}")]
    InvalidUpstreamUrl(#[from] url::ParseError),
    #[error("Unsupported upstream proxy scheme {0:?} (use http://)")]
    UnsupportedScheme(String),
    #[error("Upstream proxy URL has no host")]
    MissingHost,
    #[error("Upstream proxy credentials are not valid UTF-8: {0}")]
    InvalidCredentials(#[from] std::string::FromUtf8Error),
}
