//! End-to-end: a real socket, a real client, every backend.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::StatusCode;

use packfs_codec::TreeCodec;
use packfs_core::{FileInfo, FileMode, Namespace, Reference, Writer};
use packfs_http::{HttpDir, HttpServer};
use packfs_stores::{Backend, CompiledStore, DiskStore, MemStore};
use tempfile::TempDir;

const INDEX: &[u8] = b"<!doctype html><title>home</title>\n";
const MARK: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR0123456789";

fn populate(store: &dyn Writer) {
    let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    store
        .mkdir_all(&Reference::parse("/images").unwrap(), FileMode::dir(0o755))
        .unwrap();
    for (path, body) in [("/index.html", INDEX), ("/images/mark.png", MARK)] {
        store
            .add(
                &Reference::parse(path).unwrap(),
                FileInfo::new("", 0, FileMode::file(0o644), t0),
                Bytes::from_static(body),
            )
            .unwrap();
    }
}

fn servers() -> (TempDir, Vec<(&'static str, HttpServer)>) {
    let dir = tempfile::tempdir().unwrap();
    let ns = Namespace::new("example.com/site", dir.path()).unwrap();

    let memory = MemStore::new(ns.clone());
    populate(&memory);
    let disk = DiskStore::new(ns).unwrap();
    populate(&disk);
    let compiled = CompiledStore::from_blob(TreeCodec::new().encode(&memory.snapshot()).unwrap())
        .unwrap();

    let backends: Vec<Backend> = vec![memory.into(), disk.into(), compiled.into()];
    let servers = backends
        .into_iter()
        .map(|backend| {
            let kind = backend.kind();
            let server =
                HttpServer::bind("127.0.0.1:0", HttpDir::new(backend, Reference::root())).unwrap();
            (kind, server)
        })
        .collect();
    (dir, servers)
}

fn client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

#[test]
fn root_serves_the_index_document() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client().get(format!("{}/", server.url())).send().unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{kind}");
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8",
            "{kind}"
        );
        assert_eq!(response.bytes().unwrap().as_ref(), INDEX, "{kind}");
    }
}

#[test]
fn directory_without_slash_redirects() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client().get(format!("{}/images", server.url())).send().unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY, "{kind}");
        assert_eq!(response.headers()["location"], "images/", "{kind}");
    }
}

#[test]
fn directory_listing_links_children() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client().get(format!("{}/images/", server.url())).send().unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{kind}");
        let body = response.text().unwrap();
        assert!(body.contains("<a href=\"mark.png\">mark.png</a>"), "{kind}: {body}");
    }
}

#[test]
fn missing_paths_are_404() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client()
            .get(format!("{}/does-not-exist", server.url()))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{kind}");
        assert_eq!(response.text().unwrap(), "404 page not found\n", "{kind}");
    }
}

#[test]
fn byte_ranges() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client()
            .get(format!("{}/images/mark.png", server.url()))
            .header("Range", "bytes=8-15")
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{kind}");
        assert_eq!(
            response.headers()["content-range"],
            format!("bytes 8-15/{}", MARK.len()).as_str(),
            "{kind}"
        );
        assert_eq!(response.bytes().unwrap().as_ref(), &MARK[8..16], "{kind}");
    }
}

#[test]
fn head_reports_length_without_body() {
    let (_dir, servers) = servers();
    for (kind, server) in &servers {
        let response = client()
            .head(format!("{}/images/mark.png", server.url()))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{kind}");
        assert_eq!(
            response.headers()["content-length"],
            MARK.len().to_string().as_str(),
            "{kind}"
        );
        assert_eq!(response.headers()["content-type"], "image/png", "{kind}");
    }
}
