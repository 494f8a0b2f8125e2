//! DNS-SD Browse Example
//!
//! This example demonstrates how to use the sans-I/O zeroconf-sd library
//! to browse for service instances of one or more service types.
//!
//! # Usage
//!
//! ```
//! cargo run --example browse
//! cargo run --example browse -- --service-type _ipp._tcp.local. --qu
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use clap::Parser;
use sansio::Protocol;
use tokio::net::UdpSocket;
use zeroconf_sd::{
    MulticastSocket, QuestionType, TaggedBytesMut, TransportContext, TransportProtocol, Zeroconf,
    ZeroconfConfig, ZeroconfEvent,
};

#[derive(Parser, Debug)]
#[command(name = "DNS-SD Browser")]
#[command(version = "0.1.0")]
#[command(about = "An example of DNS-SD browsing using sans-I/O zeroconf-sd")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0:5353")]
    server: String,

    /// Service type(s) to browse for
    #[arg(long = "service-type", default_value = "_http._tcp.local.")]
    service_types: Vec<String>,

    /// Request unicast responses (QU questions)
    #[arg(long)]
    qu: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr: SocketAddr = args.server.parse()?;

    let multicast_local_ip = match bind_addr.ip() {
        IpAddr::V4(local_ip) => local_ip,
        IpAddr::V6(_) => return Ok(()),
    };
    let std_socket = MulticastSocket::new()
        .with_local_ipv4(multicast_local_ip)
        .with_local_port(bind_addr.port())
        .into_std()?;
    let socket = UdpSocket::from_std(std_socket)?;

    let question_type = args.qu.then_some(QuestionType::QU);
    let mut conn = Zeroconf::new(ZeroconfConfig::default().with_local_addr(bind_addr));
    let browser = conn.browse(args.service_types.clone(), question_type, Instant::now())?;
    log::info!(
        "Browsing for {:?} (browser={})",
        args.service_types,
        browser
    );

    println!("Browsing. Press Ctrl+C to stop.");

    let mut buf = vec![0u8; 9000];

    loop {
        // Send any queued packets
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
                log::info!("Received Ctrl+C, shutting down");
                break;
            }
        }

        while let Some(event) = conn.poll_event() {
            let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
            match event {
                ZeroconfEvent::ServiceFound { service_type, name, .. } => {
                    println!("[{stamp}] + {name} ({service_type})");
                }
                ZeroconfEvent::ServiceRemoved { service_type, name, .. } => {
                    println!("[{stamp}] - {name} ({service_type})");
                }
                _ => {}
            }
        }
    }

    conn.close()?;
    Ok(())
}
