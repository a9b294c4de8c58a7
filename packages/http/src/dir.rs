//! A backend subtree served as a static file server serves a directory.

use std::io::{Read, Seek, SeekFrom};

use chrono::{DateTime, SubsecRound, Utc};
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;

use packfs_core::path::clean;
use packfs_core::{FileInfo, Reader, Reference};

use crate::listing::{escape_path, render};
use crate::range::{self, ByteRange, RangeError};
use crate::{date, mime, Error};

/// Index document served for a directory unless configured otherwise.
pub const INDEX_PAGE: &str = "index.html";

/// Serves the subtree at `root` of a backend over HTTP.
///
/// Requests map onto entries by their decoded, cleaned URL path. The
/// observable behavior follows a native-directory static file server:
///
/// * a directory requested without a trailing slash redirects to the
///   slashed form, and a leaf requested with one redirects back;
/// * a directory answers with its index document if it has one, an HTML
///   listing otherwise;
/// * leaves honor a single `Range`, `If-Modified-Since` and `HEAD`.
///
/// # Example
///
/// ```rust
/// use http::{Request, StatusCode};
/// use packfs_core::{FileMode, Namespace, Reference, Writer};
/// use packfs_http::HttpDir;
/// use packfs_stores::MemStore;
///
/// let store = MemStore::new(Namespace::new("app", "/src/app").unwrap());
/// store.mkdir_all(&Reference::parse("/images").unwrap(), FileMode::dir(0o755)).unwrap();
///
/// let dir = HttpDir::new(store, Reference::root());
/// let response = dir.handle(&Request::get("/images").body(()).unwrap());
/// assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
/// assert_eq!(response.headers()["location"], "images/");
/// ```
#[derive(Debug)]
pub struct HttpDir<S> {
    store: S,
    root: Reference,
    index: String,
}

impl<S: Reader> HttpDir<S> {
    pub fn new(store: S, root: Reference) -> Self {
        Self {
            store,
            root,
            index: INDEX_PAGE.to_string(),
        }
    }

    /// Serve `name` instead of `index.html` for directories that contain it.
    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn root(&self) -> &Reference {
        &self.root
    }

    /// Answer one request. Failures become the matching error page.
    pub fn handle<B>(&self, request: &Request<B>) -> Response<Vec<u8>> {
        let mut response = match self.serve(request) {
            Ok(response) => response,
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    log::warn!("{} {}: {}", request.method(), request.uri(), e);
                } else {
                    log::debug!("{} {}: {}", request.method(), request.uri(), e);
                }
                error_page(status)
            }
        };
        if request.method() == Method::HEAD {
            response.body_mut().clear();
        }
        response
    }

    fn serve<B>(&self, request: &Request<B>) -> Result<Response<Vec<u8>>, Error> {
        let mut url = percent_decode_str(request.uri().path())
            .decode_utf8_lossy()
            .into_owned();
        if !url.starts_with('/') {
            url.insert(0, '/');
        }
        let query = request.uri().query();

        if url.ends_with(&format!("/{}", self.index)) {
            return redirect("./", query);
        }

        let mut target = self.locate(&clean(&url))?;
        let mut info = self.store.stat(&target)?;
        if info.is_dir() && !url.ends_with('/') {
            return redirect(&format!("{}/", base(&url)), query);
        }
        if !info.is_dir() && url.ends_with('/') {
            return redirect(&format!("../{}", base(&url)), query);
        }

        if info.is_dir() {
            let index = target.join(&self.index)?;
            match self.store.stat(&index) {
                Ok(index_info) if !index_info.is_dir() => {
                    target = index;
                    info = index_info;
                }
                _ => {}
            }
        }

        if info.is_dir() {
            if not_modified(request, info.mod_time()) {
                return Ok(empty(StatusCode::NOT_MODIFIED));
            }
            return self.list(&target, &info);
        }
        self.content(request, &target, &info)
    }

    fn locate(&self, name: &str) -> Result<Reference, Error> {
        match name.strip_prefix('/') {
            Some("") | None => Ok(self.root.clone()),
            Some(rel) => Ok(self.root.join(rel)?),
        }
    }

    fn list(&self, target: &Reference, info: &FileInfo) -> Result<Response<Vec<u8>>, Error> {
        let dir = self.store.open(target)?;
        let body = render(dir.read_dir()?).into_bytes();

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        set_last_modified(headers, info.mod_time())?;
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Ok(response)
    }

    fn content<B>(
        &self,
        request: &Request<B>,
        target: &Reference,
        info: &FileInfo,
    ) -> Result<Response<Vec<u8>>, Error> {
        let size = info.size();
        let mut last_modified = HeaderMap::new();
        set_last_modified(&mut last_modified, info.mod_time())?;

        if not_modified(request, info.mod_time()) {
            let mut response = empty(StatusCode::NOT_MODIFIED);
            response.headers_mut().extend(last_modified);
            return Ok(response);
        }

        let mut file = self.store.open(target)?;
        let content_type = match mime::by_extension(info.name()) {
            Some(ty) => ty,
            None => {
                let mut head = Vec::with_capacity(mime::SNIFF_LEN);
                (&mut file)
                    .take(mime::SNIFF_LEN as u64)
                    .read_to_end(&mut head)?;
                file.seek(SeekFrom::Start(0))?;
                mime::sniff(&head)
            }
        };

        let range_header = request
            .headers()
            .get(header::RANGE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        let ranges = match range::parse(range_header, size) {
            Err(e) => {
                let mut response = text(StatusCode::RANGE_NOT_SATISFIABLE, e.message());
                let headers = response.headers_mut();
                headers.extend(last_modified);
                if e == RangeError::NoOverlap {
                    headers.insert(
                        header::CONTENT_RANGE,
                        HeaderValue::from_str(&format!("bytes */{size}"))?,
                    );
                }
                return Ok(response);
            }
            // Spans adding up to more than the entity get the whole entity.
            Ok(ranges) if range::total_length(&ranges) > size => Vec::new(),
            Ok(ranges) => ranges,
        };

        let mut response = match ranges.as_slice() {
            [] => {
                let whole = ByteRange {
                    start: 0,
                    length: size,
                };
                let mut response = Response::new(read_span(request, &mut file, whole)?);
                response
                    .headers_mut()
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(size));
                response
            }
            [span] => {
                let mut response = Response::new(read_span(request, &mut file, *span)?);
                *response.status_mut() = StatusCode::PARTIAL_CONTENT;
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(span.length));
                headers.insert(
                    header::CONTENT_RANGE,
                    HeaderValue::from_str(&span.content_range(size))?,
                );
                response
            }
            spans => {
                let boundary = range::boundary();
                let body = range::write_multipart(&mut file, spans, content_type, size, &boundary)?;
                let length = body.len() as u64;
                let mut response = Response::new(body);
                *response.status_mut() = StatusCode::PARTIAL_CONTENT;
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(&format!("multipart/byteranges; boundary={boundary}"))?,
                );
                response
            }
        };

        let headers = response.headers_mut();
        headers.extend(last_modified);
        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        Ok(response)
    }
}

/// Bytes of `span`, or nothing for a HEAD request.
fn read_span<B, R: Read + Seek>(
    request: &Request<B>,
    file: &mut R,
    span: ByteRange,
) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    if request.method() != Method::HEAD {
        body.reserve(span.length as usize);
        file.seek(SeekFrom::Start(span.start))?;
        file.take(span.length).read_to_end(&mut body)?;
    }
    Ok(body)
}

/// Final element of a URL path, ignoring trailing slashes.
fn base(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        return if url.is_empty() { "." } else { "/" };
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

fn redirect(location: &str, query: Option<&str>) -> Result<Response<Vec<u8>>, Error> {
    let mut location = escape_path(location);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(query);
    }
    let mut response = empty(StatusCode::MOVED_PERMANENTLY);
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_str(&location)?);
    Ok(response)
}

fn not_modified<B>(request: &Request<B>, mod_time: DateTime<Utc>) -> bool {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return false;
    }
    if date::is_unset(mod_time) {
        return false;
    }
    let Some(since) = request
        .headers()
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(date::parse)
    else {
        return false;
    };
    mod_time.trunc_subsecs(0) <= since
}

fn set_last_modified(headers: &mut HeaderMap, mod_time: DateTime<Utc>) -> Result<(), Error> {
    if !date::is_unset(mod_time) {
        headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&date::format(mod_time))?,
        );
    }
    Ok(())
}

fn empty(status: StatusCode) -> Response<Vec<u8>> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = status;
    response
}

/// A plain-text response in the style of the standard error pages.
fn text(status: StatusCode, message: &str) -> Response<Vec<u8>> {
    let mut response = Response::new(format!("{message}\n").into_bytes());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

fn error_page(status: StatusCode) -> Response<Vec<u8>> {
    let message = match status {
        StatusCode::NOT_FOUND => "404 page not found".to_string(),
        _ => format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        ),
    };
    text(status, &message)
}
