//! Address-string parsing and resolution.
//!
//! Both binaries take one `host:port` argument; IPv6 literals use the
//! bracketed form `[addr]:port`.  Splitting is done here so a malformed
//! argument fails with a clear diagnostic before any socket is created.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddrError {
    #[error("invalid address '{0}': expected host:port or [host]:port")]
    Invalid(String),
    #[error("invalid port in '{0}'")]
    BadPort(String),
    #[error("could not resolve '{0}'")]
    Unresolved(String),
    #[error("resolution failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Split `host:port` / `[host]:port` into its two parts.
///
/// The last `:` separates the port, so un-bracketed IPv6 text is rejected
/// as a bad port rather than mis-split.
pub fn split_host_port(input: &str) -> Result<(&str, &str), AddrError> {
    if input.is_empty() {
        return Err(AddrError::Invalid(input.to_string()));
    }

    if let Some(rest) = input.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| AddrError::Invalid(input.to_string()))?;
        if host.is_empty() || port.is_empty() {
            return Err(AddrError::Invalid(input.to_string()));
        }
        return Ok((host, port));
    }

    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| AddrError::Invalid(input.to_string()))?;
    if host.is_empty() || port.is_empty() {
        return Err(AddrError::Invalid(input.to_string()));
    }
    Ok((host, port))
}

/// Resolve `host:port` to the first usable socket address (IPv4 or IPv6).
pub async fn resolve(input: &str) -> Result<SocketAddr, AddrError> {
    let (host, port) = split_host_port(input)?;
    let port: u16 = port
        .parse()
        .map_err(|_| AddrError::BadPort(input.to_string()))?;

    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| AddrError::Unresolved(input.to_string()))
}
