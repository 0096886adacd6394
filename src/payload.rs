//! Payload contract: the transport is generic over anything that can
//! serialize itself to bytes and back.

use crate::error::NetworkError;

/// Two-method serialization capability required of transported payloads.
///
/// The transport never inspects payload bytes; it only moves them. A
/// deserialization failure is surfaced as [`NetworkError::PayloadDecode`],
/// distinct from an authentication failure.
pub trait Payload: Sized {
    /// Serialize into a byte string.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserialize from a byte string.
    fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError>;
}

impl Payload for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        Ok(bytes.to_vec())
    }
}

impl Payload for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| NetworkError::PayloadDecode)
    }
}
