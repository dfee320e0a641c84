//! Mermaid diagram extraction.
//!
//! The renderer emits a ```` ```mermaid ```` fence as escaped code. The
//! client-side mermaid runtime wants the raw diagram source inside a
//! `<div class="mermaid">`, so those blocks are unwrapped and unescaped.

use std::sync::LazyLock;

use regex::Regex;

use crate::postprocess::Degradation;

const CODE_CLOSE: &str = "</code></pre>";

static DIAGRAM_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<pre(?:\s[^>]*)?><code\s+class\s*=\s*(?:"(?:language-)?mermaid"|'(?:language-)?mermaid')\s*>"#)
        .expect("Invalid diagram regex")
});

/// Replace every mermaid code block in `html` with a diagram container.
///
/// Blocks are handled left to right; anything between them, malformed
/// markup included, is copied as is. A block without a closing
/// `</code></pre>` stops extraction and the rest of the document is kept as
/// rendered.
pub fn extract_diagrams(html: &str) -> (String, Option<Degradation>) {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(open) = DIAGRAM_OPEN_RE.find_at(html, cursor) {
        out.push_str(&html[cursor..open.start()]);

        let body_start = open.end();
        let Some(body_len) = html[body_start..].find(CODE_CLOSE) else {
            out.push_str(&html[open.start()..]);
            return (
                out,
                Some(Degradation::UnclosedDiagram {
                    offset: open.start(),
                }),
            );
        };

        let body = &html[body_start..body_start + body_len];
        out.push_str(r#"<div class="mermaid">"#);
        out.push_str(&decode_entities(body));
        out.push_str("</div>");

        cursor = body_start + body_len + CODE_CLOSE.len();
    }

    out.push_str(&html[cursor..]);
    (out, None)
}

/// Undo the renderer's escaping of diagram source and trim it.
fn decode_entities(body: &str) -> String {
    body.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(html: &str) -> String {
        let (out, degradation) = extract_diagrams(html);
        assert_eq!(degradation, None);
        out
    }

    #[test]
    fn unwraps_language_mermaid_block() {
        let out = extract("<pre><code class=\"language-mermaid\">A --&gt; B\n</code></pre>\n");

        assert_eq!(out, "<div class=\"mermaid\">A --> B</div>\n");
    }

    #[test]
    fn unwraps_bare_mermaid_class() {
        let out = extract("<pre><code class=\"mermaid\">\n  graph TD\n</code></pre>");

        assert_eq!(out, "<div class=\"mermaid\">graph TD</div>");
    }

    #[test]
    fn decodes_entities_in_order() {
        let out = extract(
            "<pre><code class=\"language-mermaid\">a &amp;lt; b &lt;br&gt; &amp;</code></pre>",
        );

        assert_eq!(out, "<div class=\"mermaid\">a &lt; b <br> &</div>");
    }

    #[test]
    fn leaves_other_code_blocks() {
        let html = "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>\n<pre>plain</pre>";

        assert_eq!(extract(html), html);
    }

    #[test]
    fn handles_multiple_blocks_left_to_right() {
        let html = concat!(
            "<p>x</p>",
            "<pre><code class=\"mermaid\">one</code></pre>",
            "<pre><code class=\"language-mermaid\">two</code></pre>",
            "<p>y</p>"
        );

        assert_eq!(
            extract(html),
            "<p>x</p><div class=\"mermaid\">one</div><div class=\"mermaid\">two</div><p>y</p>"
        );
    }

    #[test]
    fn unclosed_block_stops_extraction() {
        let html = concat!(
            "<pre><code class=\"mermaid\">one</code></pre>",
            "<pre><code class=\"mermaid\">two",
        );

        let (out, degradation) = extract_diagrams(html);

        assert_eq!(
            out,
            "<div class=\"mermaid\">one</div><pre><code class=\"mermaid\">two"
        );
        assert_eq!(degradation, Some(Degradation::UnclosedDiagram { offset: 43 }));
    }

    #[test]
    fn extraction_is_idempotent() {
        let once = extract("<pre><code class=\"mermaid\">A --&gt; B</code></pre>");

        assert_eq!(extract(&once), once);
    }

    #[test]
    fn malformed_markup_does_not_stop_extraction() {
        let out = extract(concat!(
            "<div title='it>\n",
            "<pre><code class=\"language-mermaid\">A --&gt; B</code></pre>\n",
        ));

        assert_eq!(out, "<div title='it>\n<div class=\"mermaid\">A --> B</div>\n");
    }
}
