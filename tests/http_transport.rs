mod common;

use serde_json::json;
use shimdb::ShimClient;
use shimdb::config::ShimConfig;
use shimdb::query::executor::HealthStatus;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accepts one connection, answers it with `status` and `body`, and hands
/// back the raw request text.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}/api/db/query"), handle)
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}

fn client_for(url: &str) -> ShimClient {
    common::init_tracing();
    ShimClient::connect(ShimConfig::new(url).with_bearer_token("tok-123")).expect("client")
}

#[tokio::test]
async fn posts_statement_and_decodes_rows() {
    let body = json!({"rows": [{"id": 1, "name": "scout"}], "rowCount": 1, "command": "SELECT"});
    let (url, server) = serve_once("200 OK", body.to_string()).await;
    let client = client_for(&url);

    let env = client.from("agents").eq("id", 1_i64).await;
    assert!(env.error.is_none(), "{:?}", env.error);
    assert_eq!(env.data.expect("rows").rows().len(), 1);

    let raw = server.await.expect("server");
    assert!(raw.starts_with("POST /api/db/query HTTP/1.1"), "{raw}");
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer tok-123"));
    let body_start = raw.find("\r\n\r\n").expect("body") + 4;
    let sent: serde_json::Value = serde_json::from_str(&raw[body_start..]).expect("json body");
    assert_eq!(
        sent,
        json!({"sql": "SELECT * FROM agents WHERE id = $1", "params": [1]})
    );
}

#[tokio::test]
async fn server_errors_keep_details_and_drop_sql() {
    let body = json!({
        "error": "Database query failed",
        "details": "column \"nme\" does not exist",
        "sql": "SELECT nme FROM agents"
    });
    let (url, server) = serve_once("500 Internal Server Error", body.to_string()).await;
    let client = client_for(&url);

    let env = client.from("agents").select("nme").await;
    let err = env.error.expect("error");
    assert_eq!(err.code, "backend");
    assert_eq!(err.message, "database error (500): column \"nme\" does not exist");
    assert!(!err.message.contains("SELECT"));
    server.await.expect("server");
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let (url, server) = serve_once("200 OK", "not json".to_string()).await;
    let client = client_for(&url);
    let env = client.query("select 1", &[]).await;
    assert_eq!(env.error.expect("error").code, "decode");
    server.await.expect("server");
}

#[tokio::test]
async fn health_issues_get_on_the_same_route() {
    let body = json!({"status": "healthy", "timestamp": "2026-01-01T00:00:00.000Z"});
    let (url, server) = serve_once("200 OK", body.to_string()).await;
    let client = client_for(&url);
    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    let raw = server.await.expect("server");
    assert!(raw.starts_with("GET /api/db/query HTTP/1.1"), "{raw}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = client_for(&format!("http://{addr}/api/db/query"));

    let env = client.from("agents").await;
    let err = env.error.expect("error");
    assert_eq!(err.code, "transport");
    assert!(!err.message.contains(&addr.to_string()), "{}", err.message);

    let report = client.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
}
