//! Per-direction sequencing authority.

use crate::error::NetworkError;
use crate::packet::{Direction, Packet, MAX_SEQ};
use crate::payload::Payload;

/// Allocator of strictly increasing sequence numbers for one direction.
///
/// A `Flow` is owned by exactly one [`Connection`](crate::Connection) and
/// is the only place sequence numbers are assigned. Exclusive access is
/// enforced at compile time through `&mut self`; duplicate allocation would
/// repeat an AEAD nonce under the session key, which must never happen.
#[derive(Debug)]
pub struct Flow {
    direction: Direction,
    next_seq: u64,
}

impl Flow {
    /// Create a flow sending in the given direction, starting at seq 0.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            next_seq: 0,
        }
    }

    /// The fixed direction this endpoint sends as.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Stamp a payload with the next sequence number and this flow's
    /// direction.
    ///
    /// Fails with [`NetworkError::SequenceExhausted`] once the 63-bit
    /// space is spent; the sequence never wraps, the session must re-key.
    pub fn new_packet<P: Payload>(&mut self, payload: P) -> Result<Packet<P>, NetworkError> {
        if self.next_seq > MAX_SEQ {
            return Err(NetworkError::SequenceExhausted);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Packet::new(seq, self.direction, payload))
    }
}
