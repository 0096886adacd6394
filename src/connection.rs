//! Connection management: socket ownership, roles, and the send/recv
//! surface.
//!
//! A [`Connection`] owns one UDP socket, one [`Session`], and one
//! [`Flow`]. The model is single-threaded blocking I/O: `send` and `recv`
//! each perform one blocking system call, and the caller drives the loop.
//! There are no background threads or timers here; receive timeouts are
//! the caller's concern via [`Connection::set_recv_timeout`].

use std::marker::PhantomData;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{NetworkError, Result};
use crate::flow::Flow;
use crate::mtu;
use crate::packet::{Direction, Packet};
use crate::payload::Payload;
use crate::session::{Session, SessionKey};

/// Largest inbound datagram the connection will accept, and the
/// conservative initial MTU estimate before the path has taught us better.
pub const RECEIVE_MTU: usize = 2048;

/// One endpoint of a secure datagram session.
///
/// Generic over the outgoing payload type `O` and the incoming payload
/// type `I`. A server is constructed with [`Connection::server`] before
/// any peer is known and attaches to the first client address that proves
/// possession of the key; a client is constructed with
/// [`Connection::client`] and is attached from the start.
///
/// Not designed for concurrent use from multiple threads: sequence
/// allocation in the owned [`Flow`] relies on the exclusive `&mut self`
/// borrow, and interleaved sends would risk AEAD nonce reuse.
pub struct Connection<O, I> {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    server: bool,
    attached: bool,
    mtu: usize,
    key: SessionKey,
    session: Session,
    flow: Flow,
    marker: PhantomData<(O, I)>,
}

impl<O: Payload, I: Payload> Connection<O, I> {
    /// Construct the server endpoint with a freshly generated session key.
    ///
    /// Binds an OS-assigned ephemeral port and enables path-MTU discovery.
    /// The key and port are advertised to the client out of band (see
    /// [`Connection::key`] and [`Connection::port`]). No peer is attached
    /// until the first validated datagram arrives.
    pub fn server() -> Result<Self> {
        Self::server_with_key(SessionKey::random())
    }

    /// Construct the server endpoint with a caller-supplied key.
    pub fn server_with_key(key: SessionKey) -> Result<Self> {
        let socket = setup_socket()?;
        Ok(Self {
            socket,
            remote_addr: None,
            server: true,
            attached: false,
            mtu: RECEIVE_MTU,
            session: Session::new(&key),
            key,
            flow: Flow::new(Direction::ToClient),
            marker: PhantomData,
        })
    }

    /// Construct the client endpoint.
    ///
    /// Resolves `remote`, associates the socket with it so sends and the
    /// kernel's per-route MTU state are scoped to that peer, and attaches
    /// immediately. The client's peer address stays fixed for the life of
    /// the connection.
    pub fn client<A: ToSocketAddrs>(key: SessionKey, remote: A) -> Result<Self> {
        let remote_addr = remote
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                NetworkError::Socket(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "remote address did not resolve",
                ))
            })?;

        let socket = setup_socket()?;
        socket.connect(remote_addr)?;

        Ok(Self {
            socket,
            remote_addr: Some(remote_addr),
            server: false,
            attached: true,
            mtu: RECEIVE_MTU,
            session: Session::new(&key),
            key,
            flow: Flow::new(Direction::ToServer),
            marker: PhantomData,
        })
    }

    /// Send one payload as a sealed datagram.
    ///
    /// Returns `Ok(true)` on full transmission. Returns `Ok(false)` if the
    /// datagram exceeded the path MTU; the stored estimate is refreshed
    /// from the kernel and the caller is expected to retry with a smaller
    /// payload. Any other transmit failure, including a short send, is
    /// fatal.
    ///
    /// # Panics
    ///
    /// Panics if no peer is attached: a server must receive at least one
    /// validated datagram before it can send. Calling `send` earlier is a
    /// programming error, not a runtime condition.
    pub fn send(&mut self, payload: O) -> Result<bool> {
        assert!(self.attached, "send on a connection with no attached peer");
        let remote = self
            .remote_addr
            .expect("attached connection must have a peer address");

        let wire = self.flow.new_packet(payload)?.to_wire(&self.session)?;

        // The client socket is connected; the server's is not, since its
        // peer may roam.
        let outcome = if self.server {
            self.socket.send_to(&wire, remote)
        } else {
            self.socket.send(&wire)
        };

        match outcome {
            Ok(sent) if sent == wire.len() => Ok(true),
            Ok(sent) => Err(NetworkError::ShortSend {
                sent,
                len: wire.len(),
            }),
            Err(err) if err.raw_os_error() == Some(libc::EMSGSIZE) => {
                self.update_mtu()?;
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Block until a validated datagram from the peer direction arrives
    /// and return its payload.
    ///
    /// Datagrams that fail decryption, carry the wrong direction bit
    /// (reflected traffic), or hold an undecodable payload are logged and
    /// discarded without disturbing the connection; garbage from the open
    /// internet is routine, not exceptional. On the server, every
    /// validated datagram attaches (or re-attaches) the peer to its source
    /// address, supporting client roaming.
    pub fn recv(&mut self) -> Result<I> {
        let mut buf = [0u8; RECEIVE_MTU];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf)?;
            if len > RECEIVE_MTU {
                return Err(NetworkError::OversizeDatagram {
                    len,
                    limit: RECEIVE_MTU,
                });
            }

            let packet = match Packet::<I>::from_wire(&buf[..len], &self.session) {
                Ok(packet) => packet,
                Err(err) if !err.is_fatal() => {
                    debug!(%from, len, %err, "dropping undecodable datagram");
                    continue;
                }
                Err(err) => return Err(err),
            };

            // Reflection guard: our own outgoing ciphertext played back at
            // us authenticates but carries our direction bit, not the
            // peer's.
            if packet.direction != self.flow.direction().opposite() {
                warn!(%from, seq = packet.seq, "dropping wrongly-directed datagram");
                continue;
            }

            if self.server {
                self.attached = true;
                if self.remote_addr != Some(from) {
                    self.remote_addr = Some(from);
                    info!(peer = %from, "server attached to client");
                }
            }

            return Ok(packet.payload);
        }
    }

    /// Refresh the stored MTU estimate from the kernel's discovered value.
    fn update_mtu(&mut self) -> Result<()> {
        self.mtu = mtu::query(&self.socket).map_err(NetworkError::MtuQuery)?;
        info!(mtu = self.mtu, "path MTU updated");
        Ok(())
    }

    /// Locally bound UDP port, for out-of-band rendezvous.
    pub fn port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Current best-known path MTU estimate, for sizing payload batches.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// The session key, for out-of-band transfer to the peer.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Whether a peer address is attached (always true for clients).
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// The currently attached peer address, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Configure a socket-level receive timeout.
    ///
    /// With a timeout set, [`Connection::recv`] returns a fatal
    /// [`NetworkError::Socket`] when it expires; cancellation is the
    /// caller's concern, this layer imposes none of its own.
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }
}

fn setup_socket() -> Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    mtu::enable_discovery(&socket)?;
    Ok(socket)
}
