//! Session key handling and the AEAD envelope.
//!
//! A [`Session`] is bound to one shared 256-bit key and seals/opens
//! [`Message`] values with AES-256-GCM. The 64-bit message nonce is not
//! random: the packet layer constructs it from the sender's direction bit
//! and sequence number, and its uniqueness for the lifetime of the key is
//! the integrity anchor the AEAD relies on.
//!
//! Wire form of a sealed message:
//!
//! ```text
//! [nonce word: u64 BE][ciphertext + 16-byte tag]
//! ```
//!
//! The nonce word travels in the clear but is implicitly authenticated:
//! the AEAD nonce is derived from it, so altering the prefix changes the
//! nonce and the tag check fails.

use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::NetworkError;

/// Session key length in bytes.
pub const KEY_LEN: usize = 32;

/// Clear nonce-word prefix on every sealed datagram.
pub(crate) const WIRE_NONCE_LEN: usize = 8;

/// AES-GCM authentication tag length.
pub(crate) const TAG_LEN: usize = 16;

/// Smallest possible sealed datagram (empty plaintext).
pub(crate) const MIN_WIRE_LEN: usize = WIRE_NONCE_LEN + TAG_LEN;

/// Shared secret for one session.
///
/// The server generates a fresh key at construction and advertises it out
/// of band (e.g. over SSH) in base64 form alongside its port; the client
/// decodes that text back into a key.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its URL-safe base64 text form.
    pub fn from_base64(text: &str) -> Result<Self, NetworkError> {
        let raw = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|_| NetworkError::InvalidKey)?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|_| NetworkError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Printable form for out-of-band transfer.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

// Key material stays out of logs and panic messages.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Plaintext AEAD envelope: a 64-bit nonce word and an opaque byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Direction-and-sequence word, unique per key (see [`crate::packet`]).
    pub nonce: u64,
    /// Serialized payload bytes.
    pub text: Vec<u8>,
}

impl Message {
    /// Construct an envelope.
    pub fn new(nonce: u64, text: Vec<u8>) -> Self {
        Self { nonce, text }
    }
}

/// Stateful AEAD wrapper bound to one shared key.
pub struct Session {
    cipher: Aes256Gcm,
}

impl Session {
    /// Create a session from a shared key.
    pub fn new(key: &SessionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(&key.0.into()),
        }
    }

    /// Seal a message into ciphertext datagram bytes.
    pub fn encrypt(&self, message: &Message) -> Result<Vec<u8>, NetworkError> {
        let nonce = aead_nonce(message.nonce);
        let ciphertext = self
            .cipher
            .encrypt(&nonce.into(), message.text.as_slice())
            .map_err(|_| NetworkError::Decrypt)?;

        let mut wire = Vec::with_capacity(WIRE_NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&message.nonce.to_be_bytes());
        wire.extend_from_slice(&ciphertext);
        Ok(wire)
    }

    /// Open ciphertext datagram bytes back into a message.
    ///
    /// Fails with [`NetworkError::Decrypt`] on truncated input or any
    /// authentication failure; tampering never yields corrupted plaintext.
    pub fn decrypt(&self, wire: &[u8]) -> Result<Message, NetworkError> {
        if wire.len() < MIN_WIRE_LEN {
            return Err(NetworkError::Decrypt);
        }

        let word = u64::from_be_bytes(wire[..WIRE_NONCE_LEN].try_into().unwrap());
        let nonce = aead_nonce(word);
        let text = self
            .cipher
            .decrypt(&nonce.into(), &wire[WIRE_NONCE_LEN..])
            .map_err(|_| NetworkError::Decrypt)?;

        Ok(Message { nonce: word, text })
    }
}

// 96-bit GCM nonce: four zero bytes then the nonce word, big-endian.
fn aead_nonce(word: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&word.to_be_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(&SessionKey::from_bytes([7u8; KEY_LEN]))
    }

    #[test]
    fn seal_open_roundtrip() {
        let s = session();
        let message = Message::new(42, b"terminal frame".to_vec());
        let wire = s.encrypt(&message).unwrap();
        assert_eq!(s.decrypt(&wire).unwrap(), message);
    }

    #[test]
    fn wrong_key_fails() {
        let wire = session()
            .encrypt(&Message::new(1, b"secret".to_vec()))
            .unwrap();
        let other = Session::new(&SessionKey::from_bytes([8u8; KEY_LEN]));
        assert!(matches!(other.decrypt(&wire), Err(NetworkError::Decrypt)));
    }

    #[test]
    fn any_flipped_bit_is_detected() {
        let s = session();
        let wire = s.encrypt(&Message::new(9, b"payload".to_vec())).unwrap();

        for i in 0..wire.len() {
            let mut tampered = wire.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(s.decrypt(&tampered), Err(NetworkError::Decrypt)),
                "bit flip at byte {} went undetected",
                i
            );
        }
    }

    #[test]
    fn truncated_wire_fails() {
        let s = session();
        assert!(s.decrypt(&[0u8; MIN_WIRE_LEN - 1]).is_err());
        assert!(s.decrypt(&[]).is_err());
    }

    #[test]
    fn empty_text_roundtrip() {
        let s = session();
        let wire = s.encrypt(&Message::new(0, Vec::new())).unwrap();
        assert_eq!(wire.len(), MIN_WIRE_LEN);
        assert_eq!(s.decrypt(&wire).unwrap().text, Vec::<u8>::new());
    }

    #[test]
    fn key_base64_roundtrip() {
        let key = SessionKey::random();
        let text = key.to_base64();
        assert_eq!(SessionKey::from_base64(&text).unwrap(), key);
    }

    #[test]
    fn bad_key_text_rejected() {
        assert!(matches!(
            SessionKey::from_base64("not base64!!"),
            Err(NetworkError::InvalidKey)
        ));
        // Valid base64, wrong length
        assert!(matches!(
            SessionKey::from_base64("AAAA"),
            Err(NetworkError::InvalidKey)
        ));
    }
}
