#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use pushcrab::config::RedisConfig;
use pushcrab::gateway::{Dialer, SessionPool};
use pushcrab::queue::{QueueError, WorkQueue};
use pushcrab::wire::NotificationFrame;

pub const TOKEN: &str = "71c12814d8f7095df0bc4881fcd9163c81aede02c1ebc176a548e03a3943cb14";

pub fn record(identifier: u32) -> String {
    format!(
        r#"{{"token": "{TOKEN}", "identifier": {identifier}, "expiry": 3600, "data": {{"aps": {{"alert": "hi", "badge": {identifier}}}}}}}"#
    )
}

// -----------------------------------------------------------------------------
// ----- MemoryQueue -----------------------------------------------------------

/// In-process stand-in for the redis list.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
    pushed: Mutex<Vec<String>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn with_items<I, S>(items: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = Self::default();
        queue.items.lock().extend(items.into_iter().map(Into::into));
        Arc::new(queue)
    }

    pub fn items(&self) -> Vec<String> {
        self.items.lock().iter().cloned().collect()
    }

    /// Everything pushed back by the dispatcher, in order.
    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }

    pub fn take_front(&self) -> Option<String> {
        self.items.lock().pop_front()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn pop(&self) -> Result<Vec<u8>, QueueError> {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.items.lock().pop_front() {
                return Ok(item.into_bytes());
            }
            notified.await;
        }
    }

    async fn push(&self, item: String) -> Result<(), QueueError> {
        self.pushed.lock().push(item.clone());
        self.items.lock().push_back(item);
        self.notify.notify_one();
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- FakeGateway -----------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Read frames and never answer.
    Silent,
    /// Answer every frame with this status byte and hang up.
    Status(u8),
}

/// Plain-TCP gateway that records every frame it receives.
pub struct FakeGateway {
    pub addr: String,
    frames: Arc<Mutex<Vec<NotificationFrame>>>,
}

impl FakeGateway {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let seen = frames.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve(socket, reply, seen.clone()));
            }
        });

        Self { addr, frames }
    }

    pub fn frames(&self) -> Vec<NotificationFrame> {
        self.frames.lock().clone()
    }

    pub fn pool(&self, size: usize) -> Arc<SessionPool> {
        SessionPool::init(size, &self.addr, Dialer::Plain).unwrap()
    }
}

/// An address nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn serve(mut socket: TcpStream, reply: Reply, seen: Arc<Mutex<Vec<NotificationFrame>>>) {
    while let Some(frame) = read_frame(&mut socket).await {
        let identifier = frame.identifier;
        seen.lock().push(frame);

        if let Reply::Status(status) = reply {
            let mut response = vec![8, status];
            response.extend_from_slice(&identifier.to_be_bytes());
            let _ = socket.write_all(&response).await;
            return;
        }
    }
}

async fn read_frame(socket: &mut TcpStream) -> Option<NotificationFrame> {
    let mut buf = BytesMut::new();

    let mut header = [0u8; 9];
    socket.read_exact(&mut header).await.ok()?;
    buf.put_slice(&header);

    for _ in 0..2 {
        let len = socket.read_u16().await.ok()?;
        let mut body = vec![0u8; len as usize];
        socket.read_exact(&mut body).await.ok()?;
        buf.put_u16(len);
        buf.put_slice(&body);
    }

    NotificationFrame::from_bytes(buf.freeze()).ok()
}

// -----------------------------------------------------------------------------
// ----- FakeRedis -------------------------------------------------------------

/// Minimal RESP server holding a single list. `BLPOP` on an empty list never
/// answers; any command it does not model gets `+OK`.
pub struct FakeRedis {
    pub config: RedisConfig,
    items: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl FakeRedis {
    pub async fn start<I>(queue_key: &str, items: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let items = Arc::new(Mutex::new(items.into_iter().collect::<VecDeque<_>>()));

        let list = items.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve_resp(socket, list.clone()));
            }
        });

        Self {
            config: RedisConfig {
                host: "127.0.0.1".to_string(),
                port,
                db: 0,
                queue_key: queue_key.to_string(),
            },
            items,
        }
    }

    pub fn items(&self) -> Vec<Vec<u8>> {
        self.items.lock().iter().cloned().collect()
    }
}

async fn serve_resp(socket: TcpStream, list: Arc<Mutex<VecDeque<Vec<u8>>>>) {
    let mut socket = BufReader::new(socket);

    while let Some(command) = read_command(&mut socket).await {
        let name = String::from_utf8_lossy(&command[0]).to_ascii_uppercase();
        let reply = match name.as_str() {
            "BLPOP" => {
                let popped = list.lock().pop_front();
                let Some(item) = popped else {
                    std::future::pending::<()>().await;
                    return;
                };
                let mut reply = BytesMut::new();
                reply.put_slice(b"*2\r\n");
                put_bulk(&mut reply, &command[1]);
                put_bulk(&mut reply, &item);
                reply.to_vec()
            }
            "RPUSH" => {
                let mut list = list.lock();
                list.extend(command[2..].iter().cloned());
                format!(":{}\r\n", list.len()).into_bytes()
            }
            _ => b"+OK\r\n".to_vec(),
        };

        if socket.get_mut().write_all(&reply).await.is_err() {
            return;
        }
    }
}

async fn read_command(socket: &mut BufReader<TcpStream>) -> Option<Vec<Vec<u8>>> {
    let mut line = String::new();
    socket.read_line(&mut line).await.ok()?;
    let argc: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        line.clear();
        socket.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;

        let mut arg = vec![0u8; len + 2];
        socket.read_exact(&mut arg).await.ok()?;
        arg.truncate(len);
        args.push(arg);
    }

    (!args.is_empty()).then_some(args)
}

fn put_bulk(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_slice(format!("${}\r\n", bytes.len()).as_bytes());
    buf.put_slice(bytes);
    buf.put_slice(b"\r\n");
}
