//! Skeleton relay example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:8080
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example relay_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Broker and camera table come from the environment:
//!
//!   BROKER_HOST, BROKER_PORT (8084), BROKER_PATH (/mqtt),
//!   BROKER_USERNAME, BROKER_PASSCODE
//!   CAMERAS="SERIAL:CAMERA_ID:GROUP_ID,..."
//!
//! ## Streaming
//!
//! Open ws://localhost:8080/ws/skeleton and send:
//!   {"action": "connect", "cameraSerialNumber": "CAM123"}
//!
//! Each skeleton message arrives as {"type": "skeleton_data", "data": "<base64>"}.
//! Set DECODE=1 to receive decoded frames ({"type": "skeleton_frames"}) instead.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use skeleton_relay::broker::MqttConnector;
use skeleton_relay::codec::LiveLayout;
use skeleton_relay::server::{ForwardMode, RelayServer, ServerConfig, SessionConfig};
use skeleton_relay::upstream::{BrokerCredentials, StaticCredentials};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skeleton_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let credentials = load_credentials()?;

    let forward_mode = if std::env::var("DECODE").is_ok_and(|v| v == "1") {
        ForwardMode::Decoded(LiveLayout::default())
    } else {
        ForwardMode::Raw
    };
    let config = ServerConfig::with_addr(bind_addr)
        .session(SessionConfig::default().forward_mode(forward_mode));

    println!("Starting skeleton relay on {}", config.bind_addr);
    println!("WebSocket: ws://{}{}", config.bind_addr, config.ws_path);
    println!("Health:    http://{}/health", config.bind_addr);
    println!();

    let server = RelayServer::new(
        config,
        Arc::new(credentials),
        Arc::new(MqttConnector::default()),
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}

fn load_credentials() -> Result<StaticCredentials, String> {
    let var = |name: &str| std::env::var(name).map_err(|_| format!("{} is not set", name));

    let port = match std::env::var("BROKER_PORT") {
        Ok(port) => port
            .parse()
            .map_err(|_| format!("Invalid BROKER_PORT: {}", port))?,
        Err(_) => 8084,
    };

    let mut credentials = StaticCredentials::new(BrokerCredentials {
        host: var("BROKER_HOST")?,
        port,
        path: std::env::var("BROKER_PATH").unwrap_or_else(|_| "/mqtt".to_string()),
        username: var("BROKER_USERNAME")?,
        passcode: var("BROKER_PASSCODE")?,
        expires_at: 0,
    });

    for entry in var("CAMERAS")?.split(',').filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').collect();
        let [serial, camera_id, group_id] = parts[..] else {
            return Err(format!("Invalid camera entry: {}", entry));
        };
        let camera_id = camera_id
            .parse()
            .map_err(|_| format!("Invalid camera id in: {}", entry))?;
        let group_id = group_id
            .parse()
            .map_err(|_| format!("Invalid group id in: {}", entry))?;
        credentials = credentials.camera(serial, camera_id, group_id);
    }

    Ok(credentials)
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("BIND_ADDR formats:");
    eprintln!("  localhost          -> 127.0.0.1:{}", DEFAULT_PORT);
    eprintln!("  localhost:PORT     -> 127.0.0.1:PORT");
    eprintln!("  IP                 -> IP:{}", DEFAULT_PORT);
    eprintln!("  IP:PORT            -> IP:PORT");
}

/// Parse a bind address
///
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let (host, port) = match arg.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("Invalid port: {}", port))?;
            (host, port)
        }
        None => (arg, DEFAULT_PORT),
    };

    let ip = if host.eq_ignore_ascii_case("localhost") {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        host.parse::<IpAddr>()
            .map_err(|_| format!("Invalid address: {}", host))?
    };

    Ok(SocketAddr::new(ip, port))
}
