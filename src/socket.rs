//! Socket utilities.
//!
//! The engine itself is sans-I/O; this module is a convenience builder for
//! callers that drive it over a real UDP socket.
//!
//! # Example
//!
//! ```rust,ignore
//! use zeroconf_sd::MulticastSocket;
//!
//! let std_socket = MulticastSocket::new().into_std()?;
//! let socket = tokio::net::UdpSocket::from_std(std_socket)?;
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::proto::{MDNS_MULTICAST_IPV4, MDNS_PORT};

/// Builder for a UDP socket configured for mDNS.
///
/// The resulting socket is:
///
/// - Bound to port 5353 with `SO_REUSEADDR` (and `SO_REUSEPORT` where
///   supported), so it can share the port with other mDNS stacks
/// - Joined to the 224.0.0.251 multicast group
/// - Sending multicast with TTL 255 (RFC 6762 §11)
/// - Non-blocking, for async integration
#[derive(Debug, Clone)]
pub struct MulticastSocket {
    local_ipv4: Option<Ipv4Addr>,
    local_port: Option<u16>,
    interface: Option<Ipv4Addr>,
    loopback: bool,
}

impl Default for MulticastSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl MulticastSocket {
    pub fn new() -> Self {
        Self {
            local_ipv4: None,
            local_port: None,
            interface: None,
            loopback: false,
        }
    }

    /// Override the bind address (defaults to the multicast group on Linux,
    /// `0.0.0.0` elsewhere).
    pub fn with_local_ipv4(mut self, local_ipv4: Ipv4Addr) -> Self {
        self.local_ipv4 = Some(local_ipv4);
        self
    }

    /// Override the bind port (defaults to 5353).
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = Some(local_port);
        self
    }

    /// Join the multicast group on a specific interface instead of
    /// `INADDR_ANY`.
    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Receive copies of our own multicast sends. Useful when several
    /// engines on one host should see each other.
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Build the configured `std::net::UdpSocket`.
    ///
    /// # Errors
    ///
    /// Any socket-option, bind, or group-join failure from the OS.
    pub fn into_std(self) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        let local_ip = if let Some(local_ipv4) = self.local_ipv4 {
            IpAddr::V4(local_ipv4)
        } else if cfg!(target_os = "linux") {
            IpAddr::V4(MDNS_MULTICAST_IPV4)
        } else {
            // Binding the group address doesn't work on Mac/Windows; only
            // 0.0.0.0 does.
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        let local_port = self.local_port.unwrap_or(MDNS_PORT);
        socket.bind(&SocketAddr::new(local_ip, local_port).into())?;

        let iface = self.interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &iface)?;
        socket.set_multicast_ttl_v4(255)?;
        socket.set_multicast_loop_v4(self.loopback)?;

        Ok(socket.into())
    }
}
