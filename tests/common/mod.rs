//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use herald::config::parse_config;
use herald::lifecycle::{Agent, ShutdownCoordinator, StartupOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Start a programmable mock HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

/// Connect like a load balancer's agent check and return everything sent.
pub async fn read_agent_token(addr: SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

/// A running agent on an ephemeral port.
pub struct RunningAgent {
    pub addr: SocketAddr,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub handle: JoinHandle<()>,
}

/// Parse `toml`, prepare the agent on 127.0.0.1:0 and serve it in the background.
pub async fn start_agent(toml: &str) -> RunningAgent {
    let config = parse_config(toml).unwrap();
    let options = StartupOptions {
        config_path: "inline.toml".into(),
        bind: "127.0.0.1".into(),
        port: 0,
        plugin: None,
    };

    let agent = Agent::prepare(&config, &options).await.unwrap();
    let addr = agent.local_addr().unwrap();
    let coordinator = agent.coordinator();
    let handle = tokio::spawn(agent.run());

    RunningAgent {
        addr,
        coordinator,
        handle,
    }
}
