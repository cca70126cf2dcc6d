//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a scripted mock upstream. The closure sees the request method
/// and target and decides the response status and body.
pub async fn start_scripted_upstream<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Read the request head, then drain the body
                        // (if Content-Length says there is one) so the
                        // client finishes its write cleanly.
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        let head_end = loop {
                            match socket.read(&mut chunk).await {
                                Ok(0) => break None,
                                Ok(n) => {
                                    buf.extend_from_slice(&chunk[..n]);
                                    if let Some(pos) =
                                        buf.windows(4).position(|w| w == b"\r\n\r\n")
                                    {
                                        break Some(pos + 4);
                                    }
                                    if buf.len() > 64 * 1024 {
                                        break None;
                                    }
                                }
                                Err(_) => return,
                            }
                        };

                        let head = String::from_utf8_lossy(&buf[..head_end.unwrap_or(buf.len())])
                            .into_owned();
                        let mut line = head.split_whitespace();
                        let method = line.next().unwrap_or("").to_string();
                        let target = line.next().unwrap_or("/").to_string();

                        let content_length = head
                            .lines()
                            .find_map(|l| {
                                let (name, value) = l.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if let Some(head_end) = head_end {
                            let mut body_read = buf.len() - head_end;
                            while body_read < content_length {
                                match socket.read(&mut chunk).await {
                                    Ok(0) | Err(_) => break,
                                    Ok(n) => body_read += n,
                                }
                            }
                        }

                        let (status, body) = f(method, target).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start an upstream that echoes the request target back, for
/// asserting what the gate actually forwarded.
#[allow(dead_code)]
pub async fn start_echo_upstream(addr: SocketAddr) {
    start_scripted_upstream(addr, |_method, target| async move {
        (200, format!("upstream:{}", target))
    })
    .await;
}
