/*
 *  remote.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	HTTP preview stream and remote control
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::app::{FrameSink, InputEvent, InputHandle, SinkError};
use crate::frame::{Frame, PanelSize};

/// Preview PNGs are upscaled so a 64px panel is readable in a browser.
pub const PREVIEW_SCALE: u32 = 4;

// request line plus headers
const MAX_HEAD_BYTES: u64 = 8 * 1024;
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>LyMatrix</title>
<style>
body { background: #111; color: #ccc; font-family: sans-serif; text-align: center; }
img { image-rendering: pixelated; width: 256px; border: 1px solid #333; margin: 1em; }
button { font-size: 1.5em; margin: 0.3em; min-width: 3em; }
</style>
</head>
<body>
<img src="/preview" alt="panel preview">
<div>
<button onclick="act('counterclockwise')">&#8630;</button>
<button onclick="act('press')">&#9679;</button>
<button onclick="act('clockwise')">&#8631;</button>
</div>
<script>
function act(name) { fetch('/actions/' + name, { method: 'POST' }); }
</script>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("cannot bind port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no request within {0:?}")]
    Timeout(Duration),
}

/// Latest frame as PNG, fanned out to every preview viewer.
#[derive(Debug, Clone)]
pub struct PreviewHub {
    tx: Arc<watch::Sender<Option<Arc<Vec<u8>>>>>,
    size: PanelSize,
    scale: u32,
}

impl PreviewHub {
    pub fn new(size: PanelSize, scale: u32) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx), size, scale }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Vec<u8>>>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<Vec<u8>>> {
        self.tx.borrow().clone()
    }

    fn publish(&self, frame: &Frame) -> Result<(), SinkError> {
        let png = frame.encode_png(self.scale).map_err(SinkError::Encode)?;
        self.tx.send_replace(Some(Arc::new(png)));
        Ok(())
    }
}

impl FrameSink for PreviewHub {
    fn name(&self) -> &str {
        "preview"
    }

    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.publish(frame)
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        self.publish(&Frame::new(self.size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Preview,
    Action(InputEvent),
    NotFound,
    MethodNotAllowed,
}

/// `GET /path HTTP/1.1` -> (method, path without query).
pub fn parse_request_line(line: &str) -> Result<(&str, &str), RemoteError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RemoteError::BadRequest(format!("request line '{}'", line.trim_end())));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(RemoteError::BadRequest(format!("version {}", version)));
    }
    let path = target.split(['?', '#']).next().unwrap_or(target);
    Ok((method, path))
}

pub fn route(method: &str, path: &str) -> Route {
    let action = match path {
        "/actions/clockwise" => Some(InputEvent::Clockwise),
        "/actions/counterclockwise" => Some(InputEvent::CounterClockwise),
        "/actions/press" => Some(InputEvent::Press),
        _ => None,
    };
    match (method, path, action) {
        ("POST", _, Some(event)) => Route::Action(event),
        (_, _, Some(_)) => Route::MethodNotAllowed,
        ("GET", "/", _) | ("GET", "/index.html", _) => Route::Index,
        ("GET", "/preview", _) => Route::Preview,
        (_, "/", _) | (_, "/preview", _) => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

/// Listen on every interface.
pub async fn bind(port: u16) -> Result<TcpListener, RemoteError> {
    TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| RemoteError::Bind { port, source })
}

/// Accept connections until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    input: InputHandle,
    hub: PreviewHub,
    shutdown: CancellationToken,
) -> Result<(), RemoteError> {
    info!("remote listening on http://{}/", listener.local_addr()?);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (input, hub, shutdown) = (input.clone(), hub.clone(), shutdown.clone());
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, input, hub, shutdown).await {
                            debug!("{}: {}", peer, e);
                        }
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            }
        }
    }
    info!("remote stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    input: InputHandle,
    hub: PreviewHub,
    shutdown: CancellationToken,
) -> Result<(), RemoteError> {
    let (read, mut write) = stream.into_split();
    let mut head = BufReader::new(read).take(MAX_HEAD_BYTES);

    let (request_line, user_agent) = tokio::time::timeout(HEAD_TIMEOUT, read_head(&mut head))
        .await
        .map_err(|_| RemoteError::Timeout(HEAD_TIMEOUT))??;
    let (method, path) = parse_request_line(&request_line)?;

    match route(method, path) {
        Route::Index => {
            info!("new connection from {} via '{}'", peer, user_agent);
            respond(&mut write, "200 OK", Some("text/html; charset=utf-8"), INDEX_HTML.as_bytes()).await
        }
        Route::Preview => stream_preview(&mut write, hub.subscribe(), shutdown).await,
        Route::Action(event) => {
            input.send(event);
            respond(&mut write, "204 No Content", None, b"").await
        }
        Route::MethodNotAllowed => respond(&mut write, "405 Method Not Allowed", None, b"").await,
        Route::NotFound => respond(&mut write, "404 Not Found", Some("text/plain"), b"not found\n").await,
    }
}

/// Request line and user agent; the rest of the headers are ignored.
async fn read_head<R: AsyncBufRead + Unpin>(head: &mut R) -> Result<(String, String), RemoteError> {
    let mut request_line = String::new();
    head.read_line(&mut request_line).await?;

    let mut user_agent = String::new();
    loop {
        let mut header = String::new();
        if head.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent = value.trim().to_string();
            }
        }
    }
    Ok((request_line, user_agent))
}

async fn respond<W: AsyncWrite + Unpin>(
    w: &mut W,
    status: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(), RemoteError> {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
    if let Some(ct) = content_type {
        head.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    head.push_str("\r\n");
    w.write_all(head.as_bytes()).await?;
    w.write_all(body).await?;
    w.flush().await?;
    Ok(())
}

async fn stream_preview<W: AsyncWrite + Unpin>(
    w: &mut W,
    mut frames: watch::Receiver<Option<Arc<Vec<u8>>>>,
    shutdown: CancellationToken,
) -> Result<(), RemoteError> {
    w.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=frame\r\n\
          Cache-Control: no-cache\r\nConnection: close\r\n\r\n",
    )
    .await?;

    loop {
        let png = frames.borrow_and_update().clone();
        if let Some(png) = png {
            let part = format!("--frame\r\nContent-Type: image/png\r\nContent-Length: {}\r\n\r\n", png.len());
            w.write_all(part.as_bytes()).await?;
            w.write_all(&png).await?;
            w.write_all(b"\r\n").await?;
            w.flush().await?;
        }
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
