//! Local HTTP tracker for tests

use serde_bencode::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Bencoded announce body with fixed complete/incomplete counts of 3/4
pub(crate) fn announce_body(peers: &[u8], interval: i64) -> Vec<u8> {
    let mut dict = HashMap::new();
    dict.insert(b"interval".to_vec(), Value::Int(interval));
    dict.insert(b"complete".to_vec(), Value::Int(3));
    dict.insert(b"incomplete".to_vec(), Value::Int(4));
    dict.insert(b"peers".to_vec(), Value::Bytes(peers.to_vec()));
    serde_bencode::to_bytes(&Value::Dict(dict)).unwrap()
}

/// An announce URL on a port nothing listens on
pub(crate) async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/announce", addr)
}

/// Serves the same response to every request and records request lines
pub(crate) struct MockTracker {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTracker {
    pub async fn serve(body: Vec<u8>) -> Self {
        Self::serve_status("200 OK", body).await
    }

    pub async fn serve_status(status: &'static str, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/announce", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = seen.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request).into_owned();
                    if let Some(line) = request.lines().next() {
                        seen.lock().await.push(line.to_string());
                    }

                    let head = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { url, requests }
    }

    /// Accepts connections and never answers, holding every socket open
    pub async fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/announce", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                seen.lock().await.push("<held>".to_string());
                held.push(socket);
            }
        });

        Self { url, requests }
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}
