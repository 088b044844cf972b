//! End-to-end tests over a real TCP socket.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{StubModel, generator};
use landing_forge::{Request, Server, api};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_app(model: &Arc<StubModel>) -> SocketAddr {
    let router = Arc::new(api::router(generator(model)));
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();

    tokio::spawn(async move {
        server
            .run(move |req: Request| {
                let router = Arc::clone(&router);
                async move { router.route(req).await }
            })
            .await
    });

    addr
}

/// Reads until `marker` has been seen or the peer closes.
async fn read_until(stream: &mut TcpStream, marker: &str) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
        if String::from_utf8_lossy(&received).contains(marker) {
            break;
        }
    }
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn event_stream_is_chunked_end_to_end() {
    let model = Arc::new(StubModel::streaming(&["<h1>", "Hi\n"]));
    let addr = spawn_app(&model).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /api/ai/generate-landing-page-stream?prompt=cafe HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await
        .unwrap();

    let response = read_until(&mut stream, "0\r\n\r\n").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("Content-Type: text/event-stream\r\n"));
    assert!(response.contains("Transfer-Encoding: chunked\r\n"));
    assert!(response.contains("Connection: close\r\n"));

    let first = "data: {\"content\": \"<h1>\"}\n\n";
    let second = "data: {\"content\": \"Hi\\n\"}\n\n";
    assert!(
        response.contains(&format!("{:x}\r\n{first}\r\n", first.len())),
        "{response}"
    );
    assert!(
        response.contains(&format!("{:x}\r\n{second}\r\n", second.len())),
        "{response}"
    );
    assert!(response.find(first) < response.find(second));
    assert!(response.ends_with("0\r\n\r\n"));
}

#[tokio::test]
async fn buffered_responses_keep_the_connection_alive() {
    let model = Arc::new(StubModel::replying("Hello"));
    let addr = spawn_app(&model).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for _ in 0..2 {
        stream
            .write_all(
                b"POST /api/ai/generate HTTP/1.1\r\nHost: localhost\r\nContent-Length: 6\r\n\r\nSay hi",
            )
            .await
            .unwrap();
        let response = read_until(&mut stream, "\r\n\r\nHello").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Connection: keep-alive\r\n"));
    }

    assert_eq!(model.prompts(), vec!["Say hi".to_string(), "Say hi".to_string()]);
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let model = Arc::new(StubModel::replying("unused"));
    let addr = spawn_app(&model).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"NOT A REQUEST\r\n\r\n").await.unwrap();

    let response = read_until(&mut stream, "Bad Request").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
}

#[tokio::test]
async fn client_disconnect_abandons_the_upstream_stream() {
    let model = Arc::new(StubModel::streaming(&["<html>"]).then_hang());
    let dropped = model.stream_dropped();
    let addr = spawn_app(&model).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /api/ai/generate-stream HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\n\r\npage")
        .await
        .unwrap();

    let response = read_until(&mut stream, "<html>").await;
    assert!(response.contains("data: {\"content\": \"<html>\"}"), "{response}");
    assert!(!dropped.load(Ordering::SeqCst));

    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !dropped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upstream stream should be dropped after the client leaves");
}

#[tokio::test]
async fn oversized_content_length_gets_413_without_buffering() {
    let model = Arc::new(StubModel::replying("unused"));
    let addr = spawn_app(&model).await;

    for declared in [u64::MAX.to_string(), (9 * 1024 * 1024).to_string()] {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!(
                    "POST /api/ai/generate HTTP/1.1\r\nHost: localhost\r\nContent-Length: {declared}\r\n\r\n"
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let response = read_until(&mut stream, "Request entity too large").await;
        assert!(
            response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"),
            "{declared}: {response}"
        );
        assert!(response.contains("Connection: close\r\n"));
    }

    assert_eq!(model.total_calls(), 0);
}
