#![doc = include_str!("../README.md")]
#![deny(unsafe_code, missing_docs)]

pub mod connection;
pub mod error;
pub mod flow;
mod mtu;
pub mod packet;
pub mod payload;
pub mod session;

pub use connection::{Connection, RECEIVE_MTU};
pub use error::{NetworkError, Result};
pub use flow::Flow;
pub use packet::{pack_nonce, unpack_nonce, Direction, Packet, MAX_SEQ};
pub use payload::Payload;
pub use session::{Message, Session, SessionKey, KEY_LEN};
