//! HTML directory listings.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write;

use packfs_core::FileInfo;

/// Bytes left alone when a name is used as a relative URL path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Percent-escape `name` for use as a relative URL path.
pub fn escape_path(name: &str) -> String {
    let escaped = utf8_percent_encode(name, PATH_SEGMENT).to_string();
    // A colon before the first slash would read as a URL scheme.
    let first = escaped.split('/').next().unwrap_or_default();
    if first.contains(':') {
        format!("./{escaped}")
    } else {
        escaped
    }
}

/// Escape text for HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render a listing of `children`, sorted by name, directories marked with
/// a trailing `/`.
pub fn render(children: &[FileInfo]) -> String {
    let mut sorted: Vec<&FileInfo> = children.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for info in sorted {
        let mut name = info.name().to_string();
        if info.is_dir() {
            name.push('/');
        }
        let _ = writeln!(
            html,
            "<a href=\"{}\">{}</a>",
            escape_html(&escape_path(&name)),
            escape_html(&name)
        );
    }
    html.push_str("</pre>\n");
    html
}
