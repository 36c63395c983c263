//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use portal_gate::config::GateConfig;
use portal_gate::http::{HttpServer, SecretSource};
use portal_gate::lifecycle::Shutdown;
use portal_gate::security::Secret;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

/// Start an upstream that answers every request with 200 and the request
/// head (request line plus headers, names lowercased) as the body.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            head.len(),
                            head
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let text = String::from_utf8_lossy(&buf);
    let head = text.split("\r\n\r\n").next().unwrap_or_default();
    head.lines()
        .enumerate()
        .map(|(i, line)| match (i, line.split_once(':')) {
            (0, _) | (_, None) => line.to_string(),
            (_, Some((name, value))) => format!("{}:{}", name.to_ascii_lowercase(), value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Send `GET <target>` byte for byte, bypassing client-side URL cleanup,
/// and return the whole response as text.
pub async fn raw_get(addr: SocketAddr, target: &str, cookie: Option<&str>) -> String {
    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let cookie = cookie
        .map(|c| format!("Cookie: {}\r\n", c))
        .unwrap_or_default();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\n{}Connection: close\r\n\r\n",
        target, addr, cookie
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    socket.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn gate_config(upstream: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.upstream.url = format!("http://{}", upstream);
    config.observability.metrics_enabled = false;
    config
}

/// Start the gate on an ephemeral port. Keep the returned `Shutdown` alive
/// for the duration of the test.
pub async fn start_gate(config: GateConfig, secret: Secret) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = tokio::sync::mpsc::unbounded_channel();
    let server = HttpServer::with_secret_source(config, SecretSource::Fixed(secret)).unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

pub async fn start_default_gate() -> (SocketAddr, Shutdown) {
    let upstream = start_echo_upstream().await;
    start_gate(gate_config(upstream), Secret::new(SECRET)).await
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dashboard: Option<&'a str>,
    exp: u64,
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn mint_with(secret: &str, sub: &str, role: &str, dashboard: Option<&str>, exp: u64) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &Claims { sub, role, dashboard, exp },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// A token for `role` valid for the next hour.
pub fn mint(sub: &str, role: &str) -> String {
    mint_with(SECRET, sub, role, None, now() + 3600)
}

pub fn session_cookie(token: &str) -> String {
    format!("session={}", token)
}
