//! A blocking HTTP server for an [`HttpDir`].

use std::io::Cursor;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use packfs_core::Reader;

use crate::{Error, HttpDir};

const DEFAULT_THREADS: usize = 4;

/// Serves an [`HttpDir`] on a local socket from background threads.
///
/// The server stops accepting requests and joins its threads when dropped.
///
/// ```rust,no_run
/// use packfs_core::{Namespace, Reference};
/// use packfs_http::{HttpDir, HttpServer};
/// use packfs_stores::DiskStore;
///
/// let store = DiskStore::new(Namespace::new("site", "./public")?)?;
/// let server = HttpServer::bind("127.0.0.1:8080", HttpDir::new(store, Reference::root()))?;
/// println!("serving on {}", server.url());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct HttpServer {
    server: Arc<tiny_http::Server>,
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl HttpServer {
    /// Listen on `addr` with a small pool of worker threads.
    pub fn bind<S>(addr: impl ToSocketAddrs, dir: HttpDir<S>) -> Result<Self, Error>
    where
        S: Reader + 'static,
    {
        Self::bind_with_threads(addr, dir, DEFAULT_THREADS)
    }

    pub fn bind_with_threads<S>(
        addr: impl ToSocketAddrs,
        dir: HttpDir<S>,
        threads: usize,
    ) -> Result<Self, Error>
    where
        S: Reader + 'static,
    {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        let server = tiny_http::Server::http(addrs.as_slice()).map_err(|e| Error::Bind {
            addr: format!("{addrs:?}"),
            message: e.to_string(),
        })?;
        let addr = server.server_addr().to_ip().ok_or_else(|| Error::Bind {
            addr: format!("{addrs:?}"),
            message: "not an IP listener".to_string(),
        })?;
        log::debug!("Serving {} on http://{}", dir.root(), addr);

        let server = Arc::new(server);
        let dir = Arc::new(dir);
        let stopping = Arc::new(AtomicBool::new(false));
        let workers = (0..threads.max(1))
            .map(|_| {
                let server = Arc::clone(&server);
                let dir = Arc::clone(&dir);
                let stopping = Arc::clone(&stopping);
                thread::spawn(move || serve_loop(&server, &dir, &stopping))
            })
            .collect();

        Ok(Self {
            server,
            addr,
            stopping,
            workers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("HTTP worker panicked");
            }
        }
        log::debug!("Stopped serving on http://{}", self.addr);
    }
}

fn serve_loop<S: Reader>(server: &tiny_http::Server, dir: &HttpDir<S>, stopping: &AtomicBool) {
    loop {
        let request = match server.recv() {
            Ok(request) => request,
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    return;
                }
                log::warn!("Failed to receive request: {}", e);
                continue;
            }
        };
        if stopping.load(Ordering::SeqCst) {
            return;
        }

        let response = match to_http(&request) {
            Ok(http_request) => dir.handle(&http_request),
            Err(e) => {
                log::debug!("Rejecting malformed request {}: {}", request.url(), e);
                let mut response = http::Response::new(b"400 Bad Request\n".to_vec());
                *response.status_mut() = http::StatusCode::BAD_REQUEST;
                response
            }
        };
        if let Err(e) = request.respond(from_http(response)) {
            log::debug!("Failed to send response: {}", e);
        }
    }
}

fn to_http(request: &tiny_http::Request) -> Result<http::Request<()>, http::Error> {
    let method = request.method().to_string();
    let mut builder = http::Request::builder()
        .method(method.as_str())
        .uri(request.url());
    for h in request.headers() {
        builder = builder.header(h.field.as_str().as_str(), h.value.as_str());
    }
    builder.body(())
}

fn from_http(response: http::Response<Vec<u8>>) -> tiny_http::Response<Cursor<Vec<u8>>> {
    let (parts, body) = response.into_parts();
    // HEAD bodies are stripped, but the length of the entity is still sent.
    let length = parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(body.len());

    let mut converted = tiny_http::Response::new(
        tiny_http::StatusCode(parts.status.as_u16()),
        Vec::new(),
        Cursor::new(body),
        Some(length),
        None,
    );
    for (name, value) in &parts.headers {
        if name == http::header::CONTENT_LENGTH {
            continue;
        }
        match tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()) {
            Ok(header) => converted.add_header(header),
            Err(()) => log::warn!("Dropping unrepresentable header {}", name),
        }
    }
    converted
}
