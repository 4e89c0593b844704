//! Scripted HTTP server for in-crate tests: one connection per canned response.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

#[derive(Clone)]
pub(crate) struct TestHttpResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
}

impl TestHttpResponse {
    pub(crate) fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub(crate) fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    fn render(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n",
            self.status,
            self.body.len()
        );
        for (key, value) in &self.headers {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        format!("{head}\r\n{}", self.body)
    }
}

/// Raw text of every request the server accepted, in arrival order.
#[derive(Clone, Default)]
pub(crate) struct Recorded(Arc<Mutex<Vec<String>>>);

impl Recorded {
    pub(crate) fn hits(&self) -> usize {
        self.0.lock().len()
    }

    pub(crate) fn request(&self, index: usize) -> String {
        self.0.lock()[index].clone()
    }
}

/// Head lines up to the blank line, then exactly `content-length` body bytes.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut raw = String::new();
    let mut body_len = 0usize;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(raw);
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            body_len = value.trim().parse().unwrap_or(0);
        }
        let end_of_head = line == "\r\n";
        raw.push_str(&line);
        if end_of_head {
            break;
        }
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    raw.push_str(&String::from_utf8_lossy(&body));
    Ok(raw)
}

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, Url::parse(&format!("http://{addr}")).expect("url"))
}

/// Serve `responses` in order, one per accepted connection, then stop.
pub(crate) async fn spawn_http_sequence_server(
    responses: Vec<TestHttpResponse>,
) -> (Url, Recorded, JoinHandle<std::io::Result<()>>) {
    let (listener, origin) = bind().await;
    let recorded = Recorded::default();
    let log = recorded.clone();

    let task = tokio::spawn(async move {
        for response in responses {
            let (mut stream, _) = listener.accept().await?;
            let raw = read_request(&mut stream).await?;
            log.0.lock().push(raw);
            stream.write_all(response.render().as_bytes()).await?;
            stream.shutdown().await?;
        }
        Ok(())
    });

    (origin, recorded, task)
}

/// Accept one connection, read the request and never answer. Abort the handle when done.
pub(crate) async fn spawn_silent_server() -> (Url, JoinHandle<std::io::Result<()>>) {
    let (listener, origin) = bind().await;
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        read_request(&mut stream).await?;
        std::future::pending::<()>().await;
        Ok(())
    });
    (origin, task)
}
