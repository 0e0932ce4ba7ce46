// src/ingest/text.rs
// Helpers shared by extractors: HTML -> plain text, snippets, durations, hashing.
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static RE_SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>").unwrap());
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").unwrap());

/// Hex SHA-256 of the body text, used for change detection.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Visible text of an HTML document on one line.
pub fn html_to_text(html: &str) -> String {
    let out = RE_SCRIPT_STYLE.replace_all(html, " ");
    let out = RE_COMMENT.replace_all(&out, " ");
    // Tags become separators so adjacent cells don't run together.
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out);
    let out = out.replace('\u{00A0}', " ");
    collapse_ws(&out)
}

/// Contents of `<title>`, decoded and trimmed; `None` if absent or blank.
pub fn html_title(html: &str) -> Option<String> {
    let raw = RE_TITLE.captures(html)?.get(1)?.as_str();
    let t = collapse_ws(&html_escape::decode_html_entities(raw));
    (!t.is_empty()).then_some(t)
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Window of about `len` bytes centred on byte offset `at`, whitespace collapsed.
pub fn snippet(text: &str, at: usize, len: usize) -> String {
    let half = len / 2;
    let start = floor_boundary(text, at.saturating_sub(half));
    let end = ceil_boundary(text, at.saturating_add(half));
    collapse_ws(&text[start..end])
}

/// Evidence snippet with the default width.
pub fn evidence(text: &str, at: usize) -> String {
    snippet(text, at, 220)
}

static RE_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:(?P<hours>\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr|h))?\s*(?P<minutes>\d+(?:\.\d+)?)?\s*(?:minutes|minute|mins|min|m)?",
    )
    .unwrap()
});

/// Parse "2h 15min", "1 hr 30 min", "45 minutes", "3 hours" into minutes.
/// A bare number counts as minutes. Zero or no number gives `None`.
pub fn parse_duration_minutes(text: &str) -> Option<f64> {
    let caps = RE_DURATION
        .captures_iter(text)
        .find(|c| c.name("hours").is_some() || c.name("minutes").is_some())?;

    let mut total = 0.0;
    if let Some(h) = caps.name("hours") {
        total += h.as_str().parse::<f64>().ok()? * 60.0;
    }
    if let Some(m) = caps.name("minutes") {
        total += m.as_str().parse::<f64>().ok()?;
    }
    (total > 0.0).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_markup_and_entities() {
        let html = "<html><head><style>p{}</style><script>var x=1;</script></head>\
                    <body><p>Hello&nbsp;&amp;</p><td>50%</td><td>2h</td></body></html>";
        assert_eq!(html_to_text(html), "Hello & 50% 2h");
    }

    #[test]
    fn title_is_extracted_and_trimmed() {
        let html = "<head><title>\n  Details about METR&#39;s evaluation  </title></head>";
        assert_eq!(
            html_title(html).as_deref(),
            Some("Details about METR's evaluation")
        );
        assert_eq!(html_title("<title>   </title>"), None);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration_minutes("2h 15min"), Some(135.0));
        assert_eq!(parse_duration_minutes("2h15min"), Some(135.0));
        assert_eq!(parse_duration_minutes("1 hr 30 min"), Some(90.0));
        assert_eq!(parse_duration_minutes("45 minutes"), Some(45.0));
        assert_eq!(parse_duration_minutes("3 hours"), Some(180.0));
        assert_eq!(parse_duration_minutes("1.5 hours"), Some(90.0));
        assert_eq!(parse_duration_minutes("0 min"), None);
        assert_eq!(parse_duration_minutes("about"), None);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "ääääääääää 50% ääääääää";
        let at = text.find("50%").unwrap();
        let s = snippet(text, at, 7);
        assert!(s.contains('5'));
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
