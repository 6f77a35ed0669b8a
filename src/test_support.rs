//! Loopback HTTP server and fixtures shared by the unit tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

/// Build a raw HTTP/1.1 response with an exact `Content-Length`.
pub fn http_response(status: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Build a response that promises `declared` bytes but only carries `body`.
pub fn truncated_response(declared: usize, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Accept one connection on an ephemeral port, reply with `response`, and
/// resolve to the request head the client sent.
pub async fn serve_once(response: Vec<u8>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        socket.write_all(&response).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{addr}"), handle)
}

/// Wrap a `__NEXT_DATA__` JSON document in a minimal story page.
pub fn story_page(next_data: &serde_json::Value) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Story</title></head><body>\
         <div id=\"__next\"></div>\
         <script id=\"__NEXT_DATA__\" type=\"application/json\">{next_data}</script>\
         </body></html>"
    )
}

/// A snap entry shaped like the upstream payload.
pub fn snap(id: &str, media_type: i64, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "snapIndex": 0,
        "snapId": { "value": id },
        "snapMediaType": media_type,
        "snapUrls": {
            "mediaUrl": format!("https://cf-st.sc-cdn.net/d/{id}"),
            "mediaPreviewUrl": { "value": format!("https://cf-st.sc-cdn.net/p/{id}") }
        },
        "timestampInSec": { "value": timestamp }
    })
}

/// A full `__NEXT_DATA__` document for a public profile with the given snaps.
pub fn next_data(snaps: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "props": {
            "pageProps": {
                "userProfile": {
                    "$case": "publicProfileInfo",
                    "publicProfileInfo": {
                        "username": "alice",
                        "title": "Alice",
                        "subscriberCount": "1200"
                    }
                },
                "story": {
                    "storyType": { "value": "STORY_TYPE_PUBLIC" },
                    "snapList": snaps
                }
            }
        },
        "page": "/[profile]",
        "buildId": "test"
    })
}

/// List every file under `root`, recursively.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    out.sort();
    out
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route events on the current thread into this buffer until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
