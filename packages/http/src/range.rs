//! `Range: bytes=...` request headers and `multipart/byteranges` bodies.

use std::io::{self, Read, Seek, SeekFrom};

/// A satisfiable byte span of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    /// Value of the `Content-Range` header for this span.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.start + self.length - 1, size)
    }
}

/// Why a `Range` header cannot be honored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    /// Well formed, but every span lies past the end of the resource.
    NoOverlap,
}

impl RangeError {
    pub fn message(self) -> &'static str {
        match self {
            RangeError::Invalid => "invalid range",
            RangeError::NoOverlap => "invalid range: failed to overlap",
        }
    }
}

/// Parse a `Range` header against a resource of `size` bytes.
///
/// Spans are clamped to the resource; spans that start past its end are
/// dropped, and only if all of them are is [`RangeError::NoOverlap`]
/// returned. An empty header yields no spans.
pub fn parse(header: &str, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    if header.is_empty() {
        return Ok(Vec::new());
    }
    let specs = header.strip_prefix("bytes=").ok_or(RangeError::Invalid)?;

    let mut ranges = Vec::new();
    let mut no_overlap = false;
    for part in specs.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        let (start, end) = part.split_once('-').ok_or(RangeError::Invalid)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            // Suffix form: the last `end` bytes.
            if end.is_empty() || end.starts_with('-') {
                return Err(RangeError::Invalid);
            }
            let suffix: u64 = end.parse().map_err(|_| RangeError::Invalid)?;
            if suffix == 0 || size == 0 {
                no_overlap = true;
                continue;
            }
            let suffix = suffix.min(size);
            ranges.push(ByteRange {
                start: size - suffix,
                length: suffix,
            });
            continue;
        }

        let first: u64 = start.parse().map_err(|_| RangeError::Invalid)?;
        if first >= size {
            no_overlap = true;
            continue;
        }
        let length = if end.is_empty() {
            size - first
        } else {
            let last: u64 = end.parse().map_err(|_| RangeError::Invalid)?;
            if first > last {
                return Err(RangeError::Invalid);
            }
            last.min(size - 1) - first + 1
        };
        ranges.push(ByteRange {
            start: first,
            length,
        });
    }

    if no_overlap && ranges.is_empty() {
        return Err(RangeError::NoOverlap);
    }
    Ok(ranges)
}

/// Total bytes covered by `ranges`, counting overlaps twice.
pub fn total_length(ranges: &[ByteRange]) -> u64 {
    ranges.iter().map(|r| r.length).sum()
}

/// A fresh multipart boundary: 30 random bytes, hex encoded.
pub fn boundary() -> String {
    rand::random::<[u8; 30]>()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Write the `multipart/byteranges` body for `ranges` of `source`.
///
/// Each part carries `Content-Range` and `Content-Type` headers, in that
/// order, followed by the span's bytes.
pub fn write_multipart<R: Read + Seek>(
    source: &mut R,
    ranges: &[ByteRange],
    content_type: &str,
    size: u64,
    boundary: &str,
) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    for (i, span) in ranges.iter().enumerate() {
        if i > 0 {
            body.extend_from_slice(b"\r\n");
        }
        let head = format!(
            "--{boundary}\r\nContent-Range: {}\r\nContent-Type: {content_type}\r\n\r\n",
            span.content_range(size)
        );
        body.extend_from_slice(head.as_bytes());
        source.seek(SeekFrom::Start(span.start))?;
        let read = source.by_ref().take(span.length).read_to_end(&mut body)?;
        if (read as u64) < span.length {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}
