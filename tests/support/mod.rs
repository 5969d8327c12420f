//! In-process stand-in for the debate service, speaking just enough HTTP/1.1
//! for reqwest: one request per connection, `Connection: close` replies, and
//! close-delimited event-stream bodies written chunk by chunk.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use debate_stream::Frame;

/// How `POST /api/debate/start` answers.
#[derive(Debug, Clone)]
pub enum StartReply {
    /// 200 with `{"debate_id":"<n>"}`, n counting from 1.
    Ok,
    Status(u16),
    Body(String),
}

/// How `GET /api/debate/{id}/stream` answers.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub status: u16,
    pub chunks: Vec<Vec<u8>>,
    pub chunk_delay: Duration,
    /// Keep the socket open after the last chunk instead of closing it.
    pub hold_open: bool,
    /// Close the socket without answering.
    pub hang_up: bool,
    /// Announce a longer `Content-Length` than is sent, so the body read
    /// fails when the socket closes.
    pub truncated: bool,
}

impl StreamPlan {
    pub fn frames(frames: &[Frame]) -> Self {
        let wire: String = frames.iter().map(Frame::to_sse).collect();
        Self::raw(wire.into_bytes())
    }

    pub fn raw(bytes: Vec<u8>) -> Self {
        StreamPlan {
            status: 200,
            chunks: vec![bytes],
            chunk_delay: Duration::ZERO,
            hold_open: false,
            hang_up: false,
            truncated: false,
        }
    }

    /// Re-cut the body into pieces of `size` bytes.
    pub fn chunked(mut self, size: usize, delay: Duration) -> Self {
        let all: Vec<u8> = self.chunks.concat();
        self.chunks = all.chunks(size.max(1)).map(<[u8]>::to_vec).collect();
        self.chunk_delay = delay;
        self
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn status(status: u16) -> Self {
        StreamPlan {
            status,
            chunks: Vec::new(),
            chunk_delay: Duration::ZERO,
            hold_open: false,
            hang_up: false,
            truncated: false,
        }
    }

    pub fn hang_up() -> Self {
        StreamPlan {
            hang_up: true,
            ..Self::status(200)
        }
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockDebateServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockDebateServer {
    pub async fn start(start: StartReply, stream: StreamPlan) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let ids = Arc::new(AtomicU64::new(1));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&log);
                let ids = Arc::clone(&ids);
                let start = start.clone();
                let stream = stream.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, log, ids, start, stream).await;
                });
            }
        });

        MockDebateServer {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stream_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.ends_with("/stream"))
            .count()
    }
}

/// A base URL nothing is listening on.
pub async fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&tmp[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        let status = req
            .parse(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let httparse::Status::Complete(head_len) = status else {
            continue;
        };

        let headers: Vec<(String, String)> = req
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();
        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let method = req.method.unwrap_or("").to_string();
        let path = req.path.unwrap_or("").to_string();

        let mut body = buf[head_len..].to_vec();
        while body.len() < content_length {
            let n = socket.read(&mut tmp).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&tmp[..n]);
        }
        return Ok(Recorded {
            method,
            path,
            headers,
            body,
        });
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len(),
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

async fn serve(
    mut socket: TcpStream,
    log: Arc<Mutex<Vec<Recorded>>>,
    ids: Arc<AtomicU64>,
    start: StartReply,
    stream: StreamPlan,
) -> std::io::Result<()> {
    let request = read_request(&mut socket).await?;
    let path = request.path.clone();
    log.lock().unwrap().push(request);

    if path == "/api/debate/start" {
        return match start {
            StartReply::Ok => {
                let id = ids.fetch_add(1, Ordering::SeqCst);
                respond(&mut socket, 200, &format!(r#"{{"debate_id":"{id}"}}"#)).await
            }
            StartReply::Status(code) => {
                respond(&mut socket, code, r#"{"detail":"API key is required"}"#).await
            }
            StartReply::Body(body) => respond(&mut socket, 200, &body).await,
        };
    }

    if path.starts_with("/api/debate/") && path.ends_with("/stream") {
        if stream.hang_up {
            return Ok(());
        }
        if stream.status != 200 {
            return respond(&mut socket, stream.status, r#"{"error":"Debate not found"}"#).await;
        }
        let length = if stream.truncated {
            let sent: usize = stream.chunks.iter().map(Vec::len).sum();
            format!("Content-Length: {}\r\n", sent + 4096)
        } else {
            String::new()
        };
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\n{length}Connection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await?;
        for chunk in &stream.chunks {
            socket.write_all(chunk).await?;
            socket.flush().await?;
            if !stream.chunk_delay.is_zero() {
                tokio::time::sleep(stream.chunk_delay).await;
            }
        }
        if stream.hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        return socket.shutdown().await;
    }

    if path == "/api/health" {
        return respond(&mut socket, 200, r#"{"status":"ok"}"#).await;
    }

    if path.ends_with("/judge/llm") {
        return respond(&mut socket, 200, r#"{"finalRanking":["debater_2","debater_1"]}"#).await;
    }

    respond(&mut socket, 404, r#"{"error":"no route"}"#).await
}

/// A two-debater, one-round debate as the service emits it.
pub fn one_round_debate() -> Vec<Frame> {
    vec![
        Frame::StartDebate {
            label: Some("Starting debate".into()),
        },
        Frame::RoundStart {
            label: Some("Round 1".into()),
        },
        Frame::message_start(),
        Frame::token("Cars "),
        Frame::token("pollute."),
        Frame::TokenEnd { label: None },
        Frame::message_complete(),
        Frame::message_start(),
        Frame::token("Buses "),
        Frame::token("too."),
        Frame::TokenEnd { label: None },
        Frame::message_complete(),
        Frame::round_complete(),
        Frame::debate_complete(),
    ]
}
