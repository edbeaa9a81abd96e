use thiserror::Error;
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddrError {
    #[error("InvalidAddress")]
    InvalidAddress,
    #[error("Invalid domain {0:?}")]
    InvalidDomain(String),
}
