//! Incremental HTML parsing of a response body in its declared character encoding.

use crate::crawler::error::CrawlError;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use html5ever::tendril::{StrTendril, TendrilSink};
use reqwest::Url;
use scraper::Html;
use std::io::{ErrorKind, Read};
use tracing::debug;

/// Bytes inspected for a `<meta charset>` declaration before parsing starts.
const PRESCAN_LEN: usize = 1024;
const CHUNK_LEN: usize = 8 * 1024;

type HtmlParser = html5ever::Parser<Html>;

/// Pick the body encoding: byte order mark, then the `Content-Type` charset, then a
/// `<meta>` declaration within the first bytes, then UTF-8.
pub fn detect_encoding(head: &[u8], content_type_charset: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(head) {
        return encoding;
    }
    content_type_charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| meta_charset(head))
        .unwrap_or(UTF_8)
}

/// Find `charset=` inside a `<meta` tag of the prescan window.
fn meta_charset(head: &[u8]) -> Option<&'static Encoding> {
    let window = &head[..head.len().min(PRESCAN_LEN)];
    let lower = window.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = find(&lower[from..], b"<meta") {
        let tag_start = from + pos;
        let tag_end = find(&lower[tag_start..], b">").map_or(lower.len(), |e| tag_start + e);
        let tag = &lower[tag_start..tag_end];
        if let Some(at) = find(tag, b"charset=") {
            let value = &tag[at + b"charset=".len()..];
            let value = value
                .strip_prefix(b"\"")
                .or_else(|| value.strip_prefix(b"'"))
                .unwrap_or(value);
            let len = value
                .iter()
                .position(|b| matches!(b, b'"' | b'\'' | b';' | b'/' | b' ' | b'\t' | b'\n' | b'\r'))
                .unwrap_or(value.len());
            // UTF-16 labels in a meta tag mean UTF-8.
            return Encoding::for_label(&value[..len]).map(|e| e.output_encoding());
        }
        from = tag_end;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
fn fill<R: Read>(body: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match body.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decode `bytes` and hand the text to the parser. `last` flushes the decoder.
fn feed(decoder: &mut Decoder, parser: &mut HtmlParser, mut bytes: &[u8], last: bool) {
    loop {
        let capacity = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(CHUNK_LEN * 4);
        let mut text = String::with_capacity(capacity.max(4));
        let (result, read, _) = decoder.decode_to_string(bytes, &mut text, last);
        if !text.is_empty() {
            parser.process(StrTendril::from_slice(&text));
        }
        bytes = &bytes[read..];
        if let CoderResult::InputEmpty = result {
            return;
        }
    }
}

/// Parse a response body stream as an HTML document, chunk by chunk.
///
/// `content_type_charset` is the `charset` parameter of the response's `Content-Type`
/// header, if any. Malformed byte sequences decode to U+FFFD.
pub fn parse_document<R: Read>(
    mut body: R,
    content_type_charset: Option<&str>,
    url: &Url,
) -> Result<Html, CrawlError> {
    let body_read = |e| CrawlError::BodyRead {
        url: url.to_string(),
        source: e,
    };

    let mut head = vec![0u8; PRESCAN_LEN];
    let n = fill(&mut body, &mut head).map_err(body_read)?;
    head.truncate(n);

    let encoding = detect_encoding(&head, content_type_charset);
    debug!(encoding = encoding.name(), "Decoding page body");
    let mut decoder = encoding.new_decoder();
    let mut parser = html5ever::parse_document(Html::new_document(), Default::default());

    feed(&mut decoder, &mut parser, &head, false);
    let mut chunk = vec![0u8; CHUNK_LEN];
    loop {
        let n = match body.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(body_read(e)),
        };
        feed(&mut decoder, &mut parser, &chunk[..n], false);
    }
    feed(&mut decoder, &mut parser, &[], true);
    Ok(parser.finish())
}
