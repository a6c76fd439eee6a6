//! Text reconstruction for extracted pages: normalization, heading reconciliation and
//! filename derivation.

/// Line separator used when joining content nodes and writing output.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

const HEADING_MARKER: &str = "## ";

/// Best-effort ASCII transliteration (accented letters fold to their base letter).
/// Characters with no ASCII form are dropped.
pub fn transliterate(s: &str) -> String {
    deunicode::deunicode_with_tofu(s, "")
}

/// Join content nodes into one plain-text block.
///
/// Each node is followed by a line separator, literal `\n` / `\r` escape sequences left
/// in the page text are turned back into real control characters, the result is
/// transliterated to ASCII and finally trimmed.
pub fn normalize<S: AsRef<str>>(nodes: &[S]) -> String {
    let mut joined = String::new();
    for node in nodes {
        joined.push_str(node.as_ref());
        joined.push_str(LINE_SEPARATOR);
    }
    let unescaped = joined.replace("\\n", "\n").replace("\\r", "\r");
    transliterate(&unescaped).trim().to_string()
}

/// Lower-cased, trimmed text of the first raw content node. Feeds the heading decision.
pub fn heading_probe(first_node: &str) -> String {
    first_node.to_lowercase().trim().to_string()
}

/// True when the page text already opens with a chapter heading of its own.
pub fn has_own_heading(title: &str, first_line: &str) -> bool {
    first_line.starts_with("chapter") || first_line.contains(&title.to_lowercase())
}

/// Prefix the normalized content with a `## ` heading line.
///
/// `first_line` comes from [heading_probe] on the raw first node; `normalized` is the
/// output of [normalize]. If the content already carries its own heading the marker
/// goes straight onto the content, otherwise a `## {title}` line is inserted above it.
pub fn reconcile_heading(title: &str, first_line: &str, normalized: &str) -> String {
    if has_own_heading(title, first_line) {
        format!("{}{}", HEADING_MARKER, normalized)
    } else {
        format!("{}{}{}{}", HEADING_MARKER, title, LINE_SEPARATOR, normalized)
    }
}

/// Filesystem-safe slug: ASCII, every whitespace or non-word character becomes `_`,
/// and runs of `_` collapse to one.
pub fn derive_filename(title: &str) -> String {
    let ascii = transliterate(title);
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }
    slug
}
