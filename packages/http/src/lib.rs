//! # packfs-http
//!
//! Expose any packfs backend over HTTP with the observable behavior of a
//! static file server pointed at a native directory: index documents,
//! generated listings, trailing-slash redirects, byte ranges and
//! conditional requests.
//!
//! [`HttpDir`] turns `http::Request`s into `http::Response`s and can be
//! mounted in any server; [`HttpServer`] runs one on a local socket.
//!
//! ```ignore
//! use packfs_http::{HttpDir, HttpServer};
//! use packfs_core::Reference;
//!
//! let server = HttpServer::bind("127.0.0.1:0", HttpDir::new(store, Reference::root()))?;
//! let body = reqwest::blocking::get(format!("{}/", server.url()))?.text()?;
//! ```

pub mod date;
pub mod dir;
pub mod error;
pub mod listing;
pub mod mime;
pub mod range;
pub mod server;

pub use dir::{HttpDir, INDEX_PAGE};
pub use error::Error;
pub use server::HttpServer;
