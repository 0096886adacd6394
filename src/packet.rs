//! Packet framing: direction, nonce packing, and the wire codec.
//!
//! One logical datagram is a [`Packet`]: a 63-bit sequence number, a
//! [`Direction`], and a payload. Direction and sequence number are packed
//! into the 64-bit AEAD nonce word rather than sent as a plaintext header,
//! so both are covered by the authentication tag. An attacker cannot flip
//! the direction bit or alter the sequence number without invalidating the
//! tag, which is what defeats reflection of an endpoint's own ciphertext
//! back at it.

use crate::error::NetworkError;
use crate::payload::Payload;
use crate::session::{Message, Session};

/// Largest assignable sequence number (low 63 bits of the nonce word).
pub const MAX_SEQ: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Sender of a datagram relative to the session's fixed roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the server toward the client.
    ToClient,
    /// Sent by the client toward the server.
    ToServer,
}

impl Direction {
    /// The other direction; what an endpoint expects from its peer.
    pub fn opposite(self) -> Self {
        match self {
            Direction::ToClient => Direction::ToServer,
            Direction::ToServer => Direction::ToClient,
        }
    }
}

/// Pack direction and sequence number into the nonce word.
///
/// `ToClient` occupies the top bit; the sequence number fills the low
/// 63 bits.
pub fn pack_nonce(direction: Direction, seq: u64) -> u64 {
    let direction_bit = u64::from(direction == Direction::ToClient);
    (direction_bit << 63) | (seq & MAX_SEQ)
}

/// Invert [`pack_nonce`] exactly.
pub fn unpack_nonce(nonce: u64) -> (Direction, u64) {
    let direction = if nonce >> 63 == 1 {
        Direction::ToClient
    } else {
        Direction::ToServer
    };
    (direction, nonce & MAX_SEQ)
}

/// One logical datagram's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<P> {
    /// Sequence number, monotonically increasing per (key, direction).
    pub seq: u64,
    /// Which party sent this packet.
    pub direction: Direction,
    /// Application payload.
    pub payload: P,
}

impl<P: Payload> Packet<P> {
    /// Assemble a packet. Sequence numbers are normally allocated by a
    /// [`Flow`](crate::Flow), never chosen by callers.
    pub fn new(seq: u64, direction: Direction, payload: P) -> Self {
        Self {
            seq,
            direction,
            payload,
        }
    }

    /// Seal this packet into ciphertext datagram bytes.
    pub fn to_wire(&self, session: &Session) -> Result<Vec<u8>, NetworkError> {
        let nonce = pack_nonce(self.direction, self.seq);
        session.encrypt(&Message::new(nonce, self.payload.to_bytes()))
    }

    /// Open ciphertext datagram bytes into a packet.
    ///
    /// Authentication failure surfaces as [`NetworkError::Decrypt`];
    /// a payload that fails to deserialize surfaces separately as
    /// [`NetworkError::PayloadDecode`].
    pub fn from_wire(wire: &[u8], session: &Session) -> Result<Self, NetworkError> {
        let message = session.decrypt(wire)?;
        let (direction, seq) = unpack_nonce(message.nonce);
        let payload = P::from_bytes(&message.text)?;
        Ok(Self {
            seq,
            direction,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionKey;

    #[test]
    fn nonce_roundtrip() {
        for direction in [Direction::ToClient, Direction::ToServer] {
            for seq in [0u64, 1, 500, MAX_SEQ - 1, MAX_SEQ] {
                assert_eq!(unpack_nonce(pack_nonce(direction, seq)), (direction, seq));
            }
        }
    }

    #[test]
    fn direction_occupies_top_bit() {
        assert_eq!(pack_nonce(Direction::ToClient, 0), 1u64 << 63);
        assert_eq!(pack_nonce(Direction::ToServer, 0), 0);
        assert_eq!(pack_nonce(Direction::ToServer, MAX_SEQ), MAX_SEQ);
    }

    #[test]
    fn opposite_is_an_involution() {
        assert_eq!(Direction::ToClient.opposite(), Direction::ToServer);
        assert_eq!(Direction::ToServer.opposite().opposite(), Direction::ToServer);
    }

    #[test]
    fn packet_roundtrip() {
        let session = Session::new(&SessionKey::from_bytes([3u8; 32]));
        let packet = Packet::new(77, Direction::ToServer, b"keystrokes".to_vec());
        let wire = packet.to_wire(&session).unwrap();
        let decoded: Packet<Vec<u8>> = Packet::from_wire(&wire, &session).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn payload_decode_failure_is_distinct_from_decrypt() {
        let session = Session::new(&SessionKey::from_bytes([3u8; 32]));
        let wire = Packet::new(0, Direction::ToClient, vec![0xFF, 0xFE])
            .to_wire(&session)
            .unwrap();

        // Same bytes, decoded as a String payload: authentication passes,
        // deserialization does not.
        let result: Result<Packet<String>, _> = Packet::from_wire(&wire, &session);
        assert!(matches!(result, Err(NetworkError::PayloadDecode)));

        let mut tampered = wire;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x80;
        let result: Result<Packet<Vec<u8>>, _> = Packet::from_wire(&tampered, &session);
        assert!(matches!(result, Err(NetworkError::Decrypt)));
    }
}
