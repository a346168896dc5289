//! Tolerant HTML reading and writing for [`Document`].
//!
//! Good enough for real listing pages: void and self-closing elements,
//! quoted or bare attributes, comments and doctypes (dropped), raw `script`
//! and `style` bodies, and unbalanced close tags.

use super::{Document, NodeId, NodeKind, RAW_TEXT_TAGS};
use crate::errors::MarkupError;

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parses `html` into a new document. Content without a `body` element
/// hangs directly off the root.
pub fn parse(html: &str) -> Result<Document, MarkupError> {
    let mut doc = Document::empty();
    let mut stack: Vec<NodeId> = vec![doc.root()];
    let bytes = html.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let parent = *stack.last().unwrap_or(&doc.root());
        let rest = &html[pos..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").ok_or(MarkupError::Unterminated("comment", pos))?;
            pos += end + 3;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').ok_or(MarkupError::Unterminated("declaration", pos))?;
            pos += end + 1;
        } else if rest.starts_with("</") {
            let end = rest.find('>').ok_or(MarkupError::Unterminated("close tag", pos))?;
            let name = rest[2..end].trim().to_ascii_lowercase();
            // pop back to the matching open element; stray closes are ignored
            if let Some(depth) = stack.iter().rposition(|&id| doc.tag(id) == Some(name.as_str())) {
                stack.truncate(depth);
            }
            pos += end + 1;
        } else if rest.starts_with('<') && bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic) {
            let tag = read_tag(html, pos)?;
            let el = doc.create_element(&tag.name);
            for (name, value) in &tag.attrs {
                doc.set_attribute(el, name, value);
            }
            doc.append_child(parent, el);
            pos = tag.end;

            let name = tag.name;
            if RAW_TEXT_TAGS.contains(&name.as_str()) && !tag.self_closing {
                let close = format!("</{name}");
                let body_len = find_ci(&html[pos..], &close)
                    .ok_or(MarkupError::Unterminated("raw text element", pos))?;
                if body_len > 0 {
                    let text = doc.create_text(&html[pos..pos + body_len]);
                    doc.append_child(el, text);
                }
                let after = pos + body_len;
                let gt = html[after..]
                    .find('>')
                    .ok_or(MarkupError::Unterminated("close tag", after))?;
                pos = after + gt + 1;
            } else if !is_void(&name) && !tag.self_closing {
                stack.push(el);
            }
        } else {
            // text runs to the next '<' that is not the first character
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let next = rest[first..].find('<').map_or(rest.len(), |i| i + first);
            let raw = &rest[..next];
            if !raw.is_empty() {
                let text = doc.create_text(&decode_entities(raw));
                doc.append_child(parent, text);
            }
            pos += next;
        }
    }

    Ok(doc)
}

struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    /// Byte offset just past the closing '>'.
    end: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':')
}

fn read_tag(html: &str, start: usize) -> Result<Tag, MarkupError> {
    let bytes = html.as_bytes();
    let mut pos = start + 1;

    // callers only enter on an ASCII letter, so the name is never empty
    let name_start = pos;
    while pos < bytes.len() && is_name_byte(bytes[pos]) {
        pos += 1;
    }
    let name = html[name_start..pos].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Err(MarkupError::Unterminated("tag", start)),
            Some(b'>') => {
                return Ok(Tag {
                    name,
                    attrs,
                    self_closing: false,
                    end: pos + 1,
                });
            }
            Some(b'/') if bytes.get(pos + 1) == Some(&b'>') => {
                return Ok(Tag {
                    name,
                    attrs,
                    self_closing: true,
                    end: pos + 2,
                });
            }
            Some(b'/') => {
                pos += 1;
                continue;
            }
            Some(_) => {}
        }

        let attr_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let attr_name = html[attr_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = String::new();
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let close = html[pos + 1..]
                        .find(quote as char)
                        .ok_or(MarkupError::Unterminated("attribute value", pos))?;
                    value = decode_entities(&html[pos + 1..pos + 1 + close]);
                    pos += close + 2;
                }
                _ => {
                    let value_start = pos;
                    while pos < bytes.len()
                        && !bytes[pos].is_ascii_whitespace()
                        && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    value = decode_entities(&html[value_start..pos]);
                }
            }
        }

        if !attr_name.is_empty() {
            attrs.push((attr_name, value));
        }
    }
}

/// Byte offset of `needle` in `haystack`, ASCII case-insensitively.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity(&tail[1..semi]).map(|c| (c, semi + 1)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn escape_text(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    write_node(doc, doc.root(), false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw: bool, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Root => {
            for &child in doc.children(id) {
                write_node(doc, child, false, out);
            }
        }
        NodeKind::Text(text) if raw => out.push_str(text),
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');

            if is_void(tag) {
                return;
            }

            let raw_children = RAW_TEXT_TAGS.contains(&tag.as_str());
            for &child in doc.children(id) {
                write_node(doc, child, raw_children, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_fragment() {
        let doc = parse(
            r#"<div class="classified-price-container"><span>1.250,50&nbsp;TL</span></div>"#,
        )
        .unwrap();

        let containers = doc.query_class(doc.root(), "classified-price-container");
        assert_eq!(containers.len(), 1);
        assert_eq!(doc.inner_text(containers[0]), "1.250,50 TL");
    }

    #[test]
    fn fragments_are_scanned_from_the_root() {
        let html = r#"<div class="classified-price-container">₺1.000</div>"#;
        let doc = parse(html).unwrap();

        assert_eq!(doc.body(), doc.root());
        assert_eq!(doc.query_class(doc.body(), "classified-price-container").len(), 1);
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn body_is_found_in_full_pages() {
        let doc = parse(
            "<!DOCTYPE html><html><head><title>İlan</title><script>if (a < b) {}</script></head>\
             <body class=\"page\"><p>ok<br>line</p></body></html>",
        )
        .unwrap();

        let body = doc.body();
        assert_eq!(doc.tag(body), Some("body"));
        assert_eq!(doc.attribute(body, "class"), Some("page"));
        assert_eq!(doc.inner_text(body), "ok line");
    }

    #[test]
    fn reads_every_attribute_form() {
        let doc =
            parse(r#"<input type=checkbox checked data-x='a "b"' title="x &amp; y"/>"#).unwrap();
        let input = doc.children(doc.root())[0];
        assert_eq!(doc.attribute(input, "type"), Some("checkbox"));
        assert_eq!(doc.attribute(input, "checked"), Some(""));
        assert_eq!(doc.attribute(input, "data-x"), Some(r#"a "b""#));
        assert_eq!(doc.attribute(input, "title"), Some("x & y"));
    }

    #[test]
    fn stray_close_tags_and_unclosed_elements_are_tolerated() {
        let doc = parse("<div><p>one</span></div><div>two").unwrap();
        assert_eq!(doc.to_html(), "<div><p>one</p></div><div>two</div>");
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let doc = parse("<p>1 < 2</p>").unwrap();
        assert_eq!(doc.to_html(), "<p>1 &lt; 2</p>");
    }

    #[test]
    fn serialization_keeps_structure() {
        let html = r#"<ul class="list"><li><img src="a.png"><b>₺1.000</b></li></ul><script>x<y</script>"#;
        assert_eq!(parse(html).unwrap().to_html(), html);
    }

    #[test]
    fn unterminated_constructs_are_errors() {
        assert_eq!(
            parse("<div class=\"x").unwrap_err(),
            MarkupError::Unterminated("attribute value", 11)
        );
        assert!(matches!(parse("<!-- never closed"), Err(MarkupError::Unterminated("comment", 0))));
        assert!(matches!(parse("<div"), Err(MarkupError::Unterminated("tag", 0))));
    }

    #[test]
    fn text_may_start_with_multibyte_characters() {
        let doc = parse("₺1.000<b>x</b>").unwrap();
        assert_eq!(doc.to_html(), "₺1.000<b>x</b>");
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(decode_entities("&#8378;1&#x2e;000 &bogus; &"), "₺1.000 &bogus; &");
    }
}
