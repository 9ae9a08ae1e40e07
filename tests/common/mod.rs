//! Shared utilities for the integration suite: mock backends on ephemeral
//! ports and a gateway harness wired to an in-memory rule store.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use routing_gateway::config::GatewayConfig;
use routing_gateway::store::model::{Endpoint, HttpMethod, RoutingRule, Strategy};
use routing_gateway::store::snapshot::RulesFile;
use routing_gateway::{HttpServer, Shutdown, SnapshotStore};

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request line and headers, raw.
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn has_header(&self, name: &str, value: &str) -> bool {
        let needle = format!("{name}: {value}");
        self.head
            .lines()
            .any(|line| line.eq_ignore_ascii_case(&needle))
    }
}

/// Start a mock backend. The handler receives the parsed request and
/// returns (status, response body). Responses are served as JSON.
pub async fn start_backend<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let (status, body) = handler(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
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

/// Backend that always serves the same response.
pub async fn start_json_backend(status: u16, body: &'static str) -> SocketAddr {
    start_backend(move |_| async move { (status, body.to_string()) }).await
}

/// An address nothing is listening on (connection refused).
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => {
                return RecordedRequest {
                    head: String::new(),
                    body: String::new(),
                }
            }
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);

            let body_start = header_end + 4;
            while buf.len() < body_start + content_length {
                let n = match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);
            }
            let end = (body_start + content_length).min(buf.len());
            let body = String::from_utf8_lossy(&buf[body_start..end]).into_owned();
            return RecordedRequest { head, body };
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub store: Arc<SnapshotStore>,
    // Dropping the coordinator would close the channel and stop the server.
    _shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a gateway serving the given rule tables.
pub async fn start_gateway(rules: RulesFile) -> TestGateway {
    let store = Arc::new(SnapshotStore::from_rules(rules).expect("test rules should validate"));

    let mut config = GatewayConfig::default();
    config.rules.watch = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(config, store.clone());
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway {
        addr,
        store,
        _shutdown: shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Endpoint pointing at a mock backend.
pub fn endpoint(id: i64, addr: SocketAddr, method: HttpMethod) -> Endpoint {
    Endpoint {
        id,
        name: format!("backend-{id}"),
        base_url: format!("http://{addr}"),
        path: None,
        method,
        timeout_ms: 5_000,
        retry_count: 0,
        headers: Default::default(),
        active: true,
    }
}

/// Direct routing rule for a path+method.
pub fn direct_rule(id: i64, endpoint_id: i64, path: &str, method: HttpMethod) -> RoutingRule {
    RoutingRule {
        id,
        endpoint_id,
        path: path.into(),
        method,
        strategy: Strategy::Direct,
        priority: 0,
        active: true,
        shadow_endpoint_id: None,
        ab_split_percent: None,
    }
}

/// Comparison rule dispatching to an old and a new endpoint.
pub fn comparison_rule(
    id: i64,
    old_endpoint: i64,
    new_endpoint: i64,
    path: &str,
    method: HttpMethod,
) -> RoutingRule {
    RoutingRule {
        id,
        endpoint_id: old_endpoint,
        path: path.into(),
        method,
        strategy: Strategy::Comparison,
        priority: 0,
        active: true,
        shadow_endpoint_id: Some(new_endpoint),
        ab_split_percent: None,
    }
}
