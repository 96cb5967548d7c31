//! Text-level HTML helpers.
//!
//! Pages are edited as text, not as a DOM. The helpers here cover the few
//! places where plain regexes are not enough: quote-aware tag scanning and
//! `<div>` nesting, so an atom can be cut out of a page with its children.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};

use crate::lazy_regex;

/// Strip tags, decode entities and collapse whitespace
pub fn clean_text(html: &str) -> String {
    let without_tags = lazy_regex!(r"<[^>]+>").replace_all(html, "");
    let decoded = decode_html_entities(&without_tags);
    collapse_whitespace(&decoded)
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for an element body
pub fn escape_text(text: &str) -> String {
    encode_text(text).into_owned()
}

/// Escape text for a double-quoted attribute value
pub fn escape_attr(text: &str) -> String {
    encode_double_quoted_attribute(text).into_owned()
}

/// Escape text for a single-quoted JavaScript string literal
pub fn js_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Insert `snippet` right before the first occurrence of `marker`
pub fn insert_before_first(content: &str, marker: &str, snippet: &str) -> Option<String> {
    let pos = content.find(marker)?;
    Some(splice(content, pos, snippet))
}

/// Insert `snippet` right before the last occurrence of `marker`
pub fn insert_before_last(content: &str, marker: &str, snippet: &str) -> Option<String> {
    let pos = content.rfind(marker)?;
    Some(splice(content, pos, snippet))
}

/// Insert `snippet` right after the first occurrence of `marker`
pub fn insert_after_first(content: &str, marker: &str, snippet: &str) -> Option<String> {
    let pos = content.find(marker)? + marker.len();
    Some(splice(content, pos, snippet))
}

/// Insert `snippet` at byte offset `pos`
pub fn splice(content: &str, pos: usize, snippet: &str) -> String {
    let mut out = String::with_capacity(content.len() + snippet.len());
    out.push_str(&content[..pos]);
    out.push_str(snippet);
    out.push_str(&content[pos..]);
    out
}

/// Byte offsets of an element in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    /// Offset of the `<` opening the element
    pub start: usize,
    /// Offset just past the opening tag's `>`
    pub open_end: usize,
    /// Offset of the `<` of the closing tag
    pub close_start: usize,
    /// Offset just past the closing tag's `>`
    pub end: usize,
}

impl ElementSpan {
    /// Opening tag text
    pub fn open_tag<'a>(&self, html: &'a str) -> &'a str {
        &html[self.start..self.open_end]
    }

    /// Content between the opening and closing tags
    pub fn inner<'a>(&self, html: &'a str) -> &'a str {
        &html[self.open_end..self.close_start]
    }

    /// Whole element including its tags
    pub fn outer<'a>(&self, html: &'a str) -> &'a str {
        &html[self.start..self.end]
    }
}

fn starts_with_tag(html: &str, pos: usize, tag: &str) -> bool {
    let bytes = html.as_bytes();
    let end = pos + tag.len();
    if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(tag.as_bytes()) {
        return false;
    }
    match bytes.get(end) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
    }
}

/// Offset just past the `>` closing the tag that starts at `start`.
/// Quoted attribute values may contain `>`.
pub fn tag_end(html: &str, start: usize) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut quote: Option<u8> = None;
    let mut last_significant = b'<';
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' if last_significant == b'=' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
        if quote.is_none() && !b.is_ascii_whitespace() {
            last_significant = b;
        }
        i += 1;
    }
    None
}

/// Given the end of an opening `<div>` tag, find the matching `</div>`.
/// Returns `(close_start, end)`. Comments and scripts are skipped.
fn matching_div_close(html: &str, open_end: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut i = open_end;
    while let Some(offset) = html[i..].find('<') {
        let pos = i + offset;
        if html[pos..].starts_with("<!--") {
            i = html[pos..].find("-->").map(|e| pos + e + 3)?;
        } else if starts_with_tag(html, pos, "<script") {
            let close = find_ascii_ci(html, pos, "</script")?;
            i = tag_end(html, close)?;
        } else if starts_with_tag(html, pos, "<div") {
            depth += 1;
            i = tag_end(html, pos)?;
        } else if starts_with_tag(html, pos, "</div") {
            depth -= 1;
            let end = tag_end(html, pos)?;
            if depth == 0 {
                return Some((pos, end));
            }
            i = end;
        } else {
            i = pos + 1;
        }
    }
    None
}

fn find_ascii_ci(html: &str, from: usize, needle: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let n = needle.as_bytes();
    (from..bytes.len().saturating_sub(n.len() - 1))
        .find(|&i| bytes[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// All outermost `<div>` elements for which `predicate(open_tag)` holds,
/// in document order. Matches nested inside a match are not reported.
pub fn find_divs<F>(html: &str, predicate: F) -> Vec<ElementSpan>
where
    F: Fn(&str) -> bool,
{
    let mut spans = Vec::new();
    let mut i = 0;
    while let Some(offset) = html[i..].find('<') {
        let pos = i + offset;
        if html[pos..].starts_with("<!--") {
            match html[pos..].find("-->") {
                Some(e) => {
                    i = pos + e + 3;
                    continue;
                }
                None => break,
            }
        }
        if !starts_with_tag(html, pos, "<div") {
            i = pos + 1;
            continue;
        }
        let Some(open_end) = tag_end(html, pos) else {
            break;
        };
        if predicate(&html[pos..open_end]) {
            if let Some((close_start, end)) = matching_div_close(html, open_end) {
                spans.push(ElementSpan {
                    start: pos,
                    open_end,
                    close_start,
                    end,
                });
                i = end;
                continue;
            }
        }
        i = open_end;
    }
    spans
}

/// Outermost `<div>` elements carrying `class` in their class list
pub fn find_divs_with_class(html: &str, class: &str) -> Vec<ElementSpan> {
    find_divs(html, |tag| has_class(tag, class))
}

/// Whether an opening tag's class list contains `class`
pub fn has_class(open_tag: &str, class: &str) -> bool {
    attribute(open_tag, "class")
        .map(|value| value.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// Raw (undecoded) value of attribute `name` in an opening tag
pub fn attribute(open_tag: &str, name: &str) -> Option<String> {
    let bytes = open_tag.as_bytes();
    let mut i = 1;
    // tag name
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
        i += 1;
    }
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' {
            return None;
        }
        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
        {
            i += 1;
        }
        let attr_name = &open_tag[name_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = None;
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let q = bytes[i];
                let v_start = i + 1;
                let v_end = open_tag[v_start..]
                    .bytes()
                    .position(|b| b == q)
                    .map(|p| v_start + p)
                    .unwrap_or(open_tag.len());
                value = Some(&open_tag[v_start..v_end]);
                i = (v_end + 1).min(open_tag.len());
            } else {
                let v_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = Some(&open_tag[v_start..i]);
            }
        }
        if attr_name.eq_ignore_ascii_case(name) {
            return Some(value.unwrap_or("").to_string());
        }
    }
}

/// Text of the `<title>` element
pub fn page_title(html: &str) -> Option<String> {
    lazy_regex!(r"(?is)<title[^>]*>(.*?)</title>")
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("<p>Salut &amp; <b>bun\n venit</b></p>"),
            "Salut & bun venit"
        );
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_escape_helpers() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(js_string("it's"), "it\\'s");
    }

    #[test]
    fn test_insert_helpers() {
        let html = "<head></head><body><p>x</p></body>";
        assert_eq!(
            insert_before_first(html, "</head>", "<link>").unwrap(),
            "<head><link></head><body><p>x</p></body>"
        );
        assert_eq!(
            insert_after_first(html, "<body>", "<a>").unwrap(),
            "<head></head><body><a><p>x</p></body>"
        );
        assert!(insert_before_last(html, "</html>", "x").is_none());
    }

    #[test]
    fn test_tag_end_respects_quotes() {
        let html = r#"<div data-quiz='[{"q":"a > b"}]' class="atom">body</div>"#;
        let end = tag_end(html, 0).unwrap();
        assert_eq!(&html[end..end + 4], "body");
    }

    #[test]
    fn test_find_nested_divs() {
        let html = r#"<main>
<div class="atom" id="atom-1"><div class="atom-body"><div>deep</div></div></div>
<!-- <div class="atom"> commented out -->
<div class="atom done" id="atom-2">second</div>
<div class="atomic">not me</div>
</main>"#;
        let spans = find_divs_with_class(html, "atom");
        assert_eq!(spans.len(), 2);
        assert!(spans[0].outer(html).ends_with("</div></div></div>"));
        assert_eq!(spans[1].inner(html), "second");
        assert_eq!(
            attribute(spans[1].open_tag(html), "id").as_deref(),
            Some("atom-2")
        );
    }

    #[test]
    fn test_scripts_inside_div_are_skipped() {
        let html = r#"<div class="atom"><script>el.innerHTML = '</div>';</script>x</div>tail"#;
        let spans = find_divs_with_class(html, "atom");
        assert_eq!(spans.len(), 1);
        assert_eq!(&html[spans[0].end..], "tail");
    }

    #[test]
    fn test_attribute_parsing() {
        let tag = r#"<div id=atom-3 hidden data-quiz='[{"a":1}]' CLASS="x y">"#;
        assert_eq!(attribute(tag, "id").as_deref(), Some("atom-3"));
        assert_eq!(attribute(tag, "hidden").as_deref(), Some(""));
        assert_eq!(attribute(tag, "data-quiz").as_deref(), Some(r#"[{"a":1}]"#));
        assert!(has_class(tag, "y"));
        assert!(!has_class(tag, "z"));
        assert_eq!(attribute(tag, "missing"), None);
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><title> Lectia 1 | TIC </title></html>").as_deref(),
            Some("Lectia 1 | TIC")
        );
        assert_eq!(page_title("<html></html>"), None);
    }
}
