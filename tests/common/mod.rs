#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bookscrap::config::ScraperParams;
use bookscrap::limiter::RequestLimiter;
use bookscrap::request::Fetcher;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SEARCH_PATH: &str = "/search/api/search/";

pub fn params(server: &MockServer, root: &Path) -> ScraperParams {
    ScraperParams {
        entries_per_page: 2,
        json_dir: root.join("data"),
        cover_img_dir: root.join("covers"),
        concurrency: 4,
        timeout: Duration::from_secs(5),
        base_url: format!("{}{SEARCH_PATH}", server.uri()),
        ..ScraperParams::default()
    }
}

pub fn fetcher(params: ScraperParams) -> Fetcher {
    let client = params.build_client().unwrap();
    let limiter = RequestLimiter::new(params.concurrency).unwrap();
    Fetcher::new(client, Arc::new(params), limiter)
}

pub fn product(server: &MockServer, isbn: &str) -> Value {
    json!({
        "product_id": format!("urn:orm:book:{isbn}"),
        "title": format!("Book {isbn}"),
        "authors": ["Someone"],
        "language": "en",
        "cover_image": format!("{}/covers/{isbn}/", server.uri()),
        "custom_attributes": {
            "publication_date": "2020-01-01",
            "publishers": ["No Starch Press"],
            "page_count": 300,
            "average_rating": 4.0
        }
    })
}

pub fn page_body(total: u64, products: Vec<Value>) -> Value {
    json!({ "data": { "total": total, "products": products } })
}

pub async fn mount_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Page answers 500 for its first `times` requests, then falls through to lower priority mocks.
pub async fn mount_page_failures(server: &MockServer, page: u32, times: u64) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(times)
        .with_priority(1)
        .mount(server)
        .await;
}

pub async fn mount_cover(server: &MockServer, isbn: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/covers/{isbn}/500w")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("jpeg {isbn}").into_bytes()))
        .mount(server)
        .await;
}

pub fn titles(content: &[u8]) -> Vec<String> {
    let records: Vec<Value> = serde_json::from_slice(content).unwrap();
    records
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect()
}

/// Bare HTTP server that records how many requests it is answering at the same time.
///
/// Search pages return two products whose covers point back at this server. Every request is
/// held for `delay` before the answer is written.
pub struct CountingServer {
    pub addr: std::net::SocketAddr,
    max_seen: Arc<std::sync::atomic::AtomicUsize>,
}

impl CountingServer {
    pub async fn start(delay: Duration) -> Self {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        tokio::spawn({
            let max_seen = Arc::clone(&max_seen);
            async move {
                loop {
                    let Ok((mut stream, _)) = listener.accept().await else {
                        return;
                    };
                    let current = Arc::clone(&current);
                    let max_seen = Arc::clone(&max_seen);
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match stream.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(delay).await;
                        // Leave before answering, the client holds its slot until the body arrives.
                        current.fetch_sub(1, Ordering::SeqCst);

                        let head = String::from_utf8_lossy(&buf);
                        let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                        let body = answer(addr, &target);
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        );
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.write_all(&body).await;
                        let _ = stream.shutdown().await;
                    });
                }
            }
        });

        Self { addr, max_seen }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{SEARCH_PATH}", self.addr)
    }

    /// Most requests the server was answering at once.
    pub fn max_seen(&self) -> usize {
        self.max_seen.load(std::sync::atomic::Ordering::SeqCst)
    }
}

fn answer(addr: std::net::SocketAddr, target: &str) -> Vec<u8> {
    if !target.starts_with(SEARCH_PATH) {
        return b"jpeg".to_vec();
    }
    let page = target
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("page="))
        .unwrap_or("0");
    let products: Vec<Value> = ["a", "b"]
        .iter()
        .map(|suffix| {
            json!({
                "product_id": format!("{page}{suffix}"),
                "title": format!("Book {page}{suffix}"),
                "cover_image": format!("http://{addr}/covers/{page}{suffix}/"),
            })
        })
        .collect();
    serde_json::to_vec(&page_body(10, products)).unwrap()
}
