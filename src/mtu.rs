//! Path-MTU discovery sockopts that `std` does not expose.
//!
//! Fragmentation is deliberately disabled on every socket: a datagram
//! larger than the path MTU then fails locally with `EMSGSIZE` instead of
//! being silently fragmented (or silently dropped somewhere on the path),
//! and the kernel's discovered `IP_MTU` value tells us how much room the
//! path actually has. This is the only module in the crate that needs
//! unsafe code.
#![allow(unsafe_code)]

use std::io;
use std::net::UdpSocket;

#[cfg(target_os = "linux")]
use std::mem;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Put the socket in path-MTU-discovery mode (don't-fragment on every
/// datagram).
#[cfg(target_os = "linux")]
pub(crate) fn enable_discovery(socket: &UdpSocket) -> io::Result<()> {
    let flag: libc::c_int = libc::IP_PMTUDISC_DO;
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_MTU_DISCOVER,
            &flag as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read back the path MTU the kernel has discovered for this socket's
/// route. Only meaningful on a connected socket or after traffic has
/// flowed.
#[cfg(target_os = "linux")]
pub(crate) fn query(socket: &UdpSocket) -> io::Result<usize> {
    let mut mtu: libc::c_int = 0;
    let mut optlen = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_MTU,
            &mut mtu as *mut libc::c_int as *mut libc::c_void,
            &mut optlen,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    if optlen != mem::size_of::<libc::c_int>() as libc::socklen_t || mtu <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unexpected IP_MTU option value",
        ));
    }
    Ok(mtu as usize)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn enable_discovery(_socket: &UdpSocket) -> io::Result<()> {
    // No portable equivalent of IP_MTU_DISCOVER; oversize sends will be
    // fragmented by the OS instead of reported.
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn query(_socket: &UdpSocket) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "IP_MTU query is not available on this platform",
    ))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn discovery_mode_applies_to_a_fresh_socket() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        enable_discovery(&socket).unwrap();
    }

    #[test]
    fn query_reports_loopback_mtu_once_connected() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        enable_discovery(&socket).unwrap();
        socket.connect(peer.local_addr().unwrap()).unwrap();

        let mtu = query(&socket).unwrap();
        // Loopback MTU is large; any sane value clears the IPv6 floor.
        assert!(mtu >= 1280, "implausible loopback MTU {}", mtu);
    }
}
