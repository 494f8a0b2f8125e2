//! DNS-SD Register Example
//!
//! This example demonstrates how to use the sans-I/O zeroconf-sd library
//! to advertise a service instance and answer queries for it.
//!
//! # Usage
//!
//! ```
//! cargo run --example register
//! cargo run --example register -- --instance myprinter --service-type _ipp._tcp.local. --port 631
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use clap::Parser;
use sansio::Protocol;
use tokio::net::UdpSocket;
use zeroconf_sd::{
    MulticastSocket, ServiceRegistration, TaggedBytesMut, TransportContext, TransportProtocol,
    Zeroconf, ZeroconfConfig, ZeroconfEvent,
};

#[derive(Parser, Debug)]
#[command(name = "DNS-SD Register")]
#[command(version = "0.1.0")]
#[command(about = "An example of DNS-SD service advertising using sans-I/O zeroconf-sd")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0:5353")]
    server: String,

    /// Service type
    #[arg(long, default_value = "_http._tcp.local.")]
    service_type: String,

    /// Instance name
    #[arg(long, default_value = "zeroconf-sd-demo")]
    instance: String,

    /// Service port
    #[arg(long, default_value = "8080")]
    port: u16,

    /// IP address to advertise (if not specified, auto-detected)
    #[arg(long)]
    local_ip: Option<String>,
}

fn get_local_ip() -> Option<Ipv4Addr> {
    // Connect to a public address to determine the local interface; no
    // packets are actually sent.
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr: SocketAddr = args.server.parse()?;

    let local_ip = if let Some(ip_str) = &args.local_ip {
        ip_str.parse::<Ipv4Addr>()?
    } else {
        get_local_ip().unwrap_or(Ipv4Addr::new(127, 0, 0, 1))
    };

    log::info!("Advertising {}.{}", args.instance, args.service_type);
    log::info!("  Bind address: {}", bind_addr);
    log::info!("  Advertised IP: {}", local_ip);

    let multicast_local_ip = match bind_addr.ip() {
        IpAddr::V4(local_ip) => local_ip,
        IpAddr::V6(_) => return Ok(()),
    };
    let std_socket = MulticastSocket::new()
        .with_local_ipv4(multicast_local_ip)
        .with_local_port(bind_addr.port())
        .into_std()?;
    let socket = UdpSocket::from_std(std_socket)?;

    let mut conn = Zeroconf::new(ZeroconfConfig::default().with_local_addr(bind_addr));
    let service = ServiceRegistration::new(&args.service_type, &args.instance, args.port)
        .with_addresses(vec![IpAddr::V4(local_ip)]);
    conn.register_service(service, true, Instant::now())?;

    println!("Advertising. Press Ctrl+C to stop.");

    let mut buf = vec![0u8; 9000];

    loop {
        while let Some(packet) = conn.poll_write() {
            log::trace!(
                "Sending {} bytes to {}",
                packet.message.len(),
                packet.transport.peer_addr
            );
            socket
                .send_to(&packet.message, packet.transport.peer_addr)
                .await?;
        }

        let wait_duration = conn
            .poll_timeout()
            .map(|t| t.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(100));

        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        log::trace!("Received {} bytes from {}", len, src);
                        let msg = TaggedBytesMut {
                            now: Instant::now(),
                            transport: TransportContext {
                                local_addr: bind_addr,
                                peer_addr: src,
                                transport_protocol: TransportProtocol::UDP,
                            },
                            message: BytesMut::from(&buf[..len]),
                        };
                        if let Err(e) = conn.handle_read(msg) {
                            log::warn!("Failed to handle packet: {}", e);
                        }
                    }
                    Err(e) => {
                        log::warn!("Socket recv error: {}", e);
                    }
                }
            }
            _ = tokio::time::sleep(wait_duration) => {
                if let Err(e) = conn.handle_timeout(Instant::now()) {
                    log::warn!("Failed to handle timeout: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl+C, sending goodbye");
                break;
            }
        }

        while let Some(event) = conn.poll_event() {
            if let ZeroconfEvent::ServiceRegistered { name } = event {
                log::info!("Registered as {}", name);
            }
        }
    }

    // Broadcast goodbyes before closing.
    conn.unregister_all_services(Instant::now())?;
    while let Some(packet) = conn.poll_write() {
        socket
            .send_to(&packet.message, packet.transport.peer_addr)
            .await?;
    }
    conn.close()?;
    Ok(())
}
