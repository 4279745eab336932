//! The transport primitive: send one request to one node, get one response.
//!
//! The engine only sees [`Transport`]. It never pools connections or manages
//! channels; an implementation is free to do either.
//!
//! [`TcpTransport`] is the bundled implementation: one TCP connection per
//! request, one length-prefixed frame each way.
//!
//! ```text
//! u32 big-endian length | payload
//! ```

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::config::MAX_ENVELOPE_SIZE;
use crate::network::NodeAddress;

/// Failures below the application layer. All of them are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("node {0} is unreachable")]
    Unreachable(String),

    #[error("request timed out")]
    TimedOut,

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("transport i/o error: {0}")]
    Io(String),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NotFound => Self::Unreachable(e.to_string()),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::ConnectionReset(e.to_string()),
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Sends a request to a node and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        address: &NodeAddress,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Reads one length-prefixed frame, refusing anything over the envelope
/// size limit.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if u64::from(len) > MAX_ENVELOPE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// One connection per request over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn exchange(address: &NodeAddress, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut stream = TcpStream::connect((socket_host(address.host()), address.port()))
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => TransportError::TimedOut,
                _ => TransportError::Unreachable(format!("{address}: {e}")),
            })?;
        stream.set_nodelay(true)?;

        write_frame(&mut stream, request).await?;
        let response = read_frame(&mut stream).await?;
        trace!(%address, request_len = request.len(), response_len = response.len(), "frame exchanged");
        Ok(response)
    }
}

/// `[::1]` -> `::1`; resolvers want IPv6 literals without brackets.
fn socket_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(
        &self,
        address: &NodeAddress,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        tokio::time::timeout(timeout, Self::exchange(address, request))
            .await
            .map_err(|_| TransportError::TimedOut)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_roundtrip_through_a_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, b"hello").await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn oversized_frame_header_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn bracketed_ipv6_hosts_are_unwrapped() {
        let addr = NodeAddress::parse("[::1]:50211").unwrap();
        assert_eq!(socket_host(addr.host()), "::1");
        assert_eq!(socket_host("10.0.0.1"), "10.0.0.1");
        assert_eq!(socket_host("node.example"), "node.example");
        assert_eq!(socket_host("[::1"), "[::1");
    }

    #[test]
    fn io_errors_map_to_transport_errors() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            TransportError::from(refused),
            TransportError::Unreachable(_)
        ));
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            TransportError::from(eof),
            TransportError::ConnectionReset(_)
        ));
        assert_eq!(
            TransportError::from(io::Error::from(io::ErrorKind::TimedOut)),
            TransportError::TimedOut
        );
    }
}
