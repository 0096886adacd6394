//! Error types for the sealgram transport.

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors produced by the transport layer.
///
/// Variants fall into two classes. Fatal errors mean the connection cannot
/// continue and should be torn down by the caller. Recoverable errors are
/// per-datagram conditions caused by hostile or malformed network traffic;
/// [`Connection::recv`](crate::Connection::recv) handles them internally by
/// discarding the offending datagram, so callers only see them when using
/// the codec types directly.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Socket creation, bind, connect, send, or receive failed.
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
    /// The OS accepted fewer bytes than the datagram size.
    #[error("short send: wrote {sent} of {len} bytes")]
    ShortSend {
        /// Bytes the OS reported as sent
        sent: usize,
        /// Size of the datagram
        len: usize,
    },
    /// An inbound datagram exceeded the receive capacity.
    #[error("oversize datagram: {len} bytes, limit is {limit}")]
    OversizeDatagram {
        /// Received datagram length
        len: usize,
        /// Configured receive ceiling
        limit: usize,
    },
    /// Querying the discovered path MTU from the OS failed.
    #[error("path MTU query failed: {0}")]
    MtuQuery(#[source] io::Error),
    /// The 63-bit sequence number space is spent; the session must re-key.
    #[error("sequence number space exhausted")]
    SequenceExhausted,
    /// A session key was not valid base64 or had the wrong length.
    #[error("invalid session key")]
    InvalidKey,
    /// Ciphertext failed authentication or decryption.
    #[error("decryption failed")]
    Decrypt,
    /// An authenticated packet carried the wrong direction bit.
    #[error("wrongly-directed packet")]
    DirectionMismatch,
    /// The decrypted payload bytes did not deserialize.
    #[error("payload decode failed")]
    PayloadDecode,
}

impl NetworkError {
    /// True if the connection cannot continue after this error.
    ///
    /// Decryption failures, direction mismatches, and payload decode
    /// failures are attacker-reachable from the open internet and must
    /// never kill a long-lived session; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            NetworkError::Decrypt | NetworkError::DirectionMismatch | NetworkError::PayloadDecode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostile_traffic_errors_are_recoverable() {
        assert!(!NetworkError::Decrypt.is_fatal());
        assert!(!NetworkError::DirectionMismatch.is_fatal());
        assert!(!NetworkError::PayloadDecode.is_fatal());
    }

    #[test]
    fn transport_faults_are_fatal() {
        assert!(NetworkError::SequenceExhausted.is_fatal());
        assert!(NetworkError::ShortSend { sent: 1, len: 2 }.is_fatal());
        assert!(NetworkError::OversizeDatagram { len: 4096, limit: 2048 }.is_fatal());
        assert!(NetworkError::Socket(io::Error::new(io::ErrorKind::Other, "boom")).is_fatal());
    }
}
