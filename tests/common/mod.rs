//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cluster_proxy::config::{ProxyConfig, RuleConfig, ServerConfig, UpstreamConfig};
use cluster_proxy::coordinator::{Coordinator, CoordinatorOptions, WorkerMode};
use cluster_proxy::http::HttpServer;
use cluster_proxy::lifecycle::Shutdown;

/// Read an HTTP/1.1 request head and return it as text.
async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a backend whose answer is computed from the request head.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(head).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line(status),
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

/// Start a backend that streams `chunks` as a chunked body, one write per chunk.
pub async fn start_chunked_backend(chunks: &'static [&'static str]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for chunk in chunks {
                    let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    if socket.write_all(frame.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                }
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that always answers 200 with `response`.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// Start a backend answering `response` and reporting each request line.
pub async fn start_recording_backend(
    response: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let addr = start_programmable_backend(move |head| {
        let tx = tx.clone();
        async move {
            let request_line = head.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);
            (200, response.to_string())
        }
    })
    .await;
    (addr, rx)
}

/// An address nothing is listening on.
pub async fn dead_address() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap()
}

/// Build a config from `(prefix, upstream ids)` rules and `(id, address)` upstreams.
pub fn config(rules: &[(&str, &[&str])], upstreams: &[(&str, String)]) -> ProxyConfig {
    ProxyConfig {
        server: ServerConfig {
            rules: rules
                .iter()
                .map(|(path, ids)| RuleConfig {
                    path: path.to_string(),
                    upstreams: ids.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            upstreams: upstreams
                .iter()
                .map(|(id, url)| UpstreamConfig {
                    id: id.to_string(),
                    url: url.clone(),
                })
                .collect(),
            ..ServerConfig::default()
        },
        ..ProxyConfig::default()
    }
}

/// Start a coordinator with `workers` workers and serve it on a free port.
pub async fn start_proxy(
    config: ProxyConfig,
    workers: usize,
    mode: WorkerMode,
) -> (SocketAddr, Shutdown) {
    let coordinator = Coordinator::start(
        &CoordinatorOptions {
            worker_count: workers,
            mode,
        },
        &config,
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = HttpServer::new(Arc::new(coordinator))
            .run(listener, server_shutdown)
            .await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
