//! Image reference rewriting.
//!
//! Rendered notes reference images relative to the note itself
//! (`![](img/a.png)` inside `notes/sub/page.md`). The artifact lives at the
//! vault root, so every relative reference is re-expressed relative to the
//! root, and every image gets the lightbox hook the artifact's viewer
//! script listens for.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::postprocess::Degradation;

/// Upper bound on images rewritten in one document.
pub const MAX_IMAGE_REWRITES: usize = 1000;

/// Class added to every previewed image.
pub const PREVIEW_IMAGE_CLASS: &str = "preview-image";

/// Click handler that opens the artifact's image lightbox.
pub const LIGHTBOX_ONCLICK: &str = "openImageModal(this.src)";

const IMG_OPEN: &str = "<img";

// Comments are skipped whole so commented-out images stay untouched.
static SCAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!--.*?-->|<img\b").expect("Invalid scan regex"));

// Quoted values may contain `>`.
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\A<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("Invalid image tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("Invalid attribute regex")
});

/// Rewrite all `<img>` elements in `html` for a document at `source_path`.
///
/// An `<img` that never closes stops the pass and the remaining input is
/// copied verbatim. If the document holds more than [`MAX_IMAGE_REWRITES`]
/// images the original HTML is returned untouched.
pub fn rewrite_images(html: &str, source_path: &str) -> (String, Option<Degradation>) {
    let base_dir = parent_dir(source_path);
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let mut cursor = 0;
    let mut rewritten = 0;

    while let Some(found) = SCAN_RE.find_at(html, cursor) {
        out.push_str(&html[cursor..found.start()]);
        cursor = found.end();

        if found.as_str().starts_with("<!--") {
            out.push_str(found.as_str());
            continue;
        }

        let start = found.start();
        let Some(raw) = IMG_TAG_RE.find(&html[start..]) else {
            out.push_str(&html[start..]);
            return (out, Some(Degradation::MalformedTag { offset: start }));
        };
        let tag = ImageTag::parse(raw.as_str());
        cursor = start + tag.raw.len();

        if tag.is_finalized() {
            out.push_str(tag.raw);
            continue;
        }
        if rewritten == MAX_IMAGE_REWRITES {
            return (
                html.to_string(),
                Some(Degradation::IterationLimit {
                    limit: MAX_IMAGE_REWRITES,
                }),
            );
        }
        out.push_str(&finalize_image(&tag, base_dir));
        rewritten += 1;
    }

    out.push_str(&html[cursor..]);
    (out, None)
}

/// Resolve an image `src` against the directory of the referencing note.
///
/// Returns `None` for references that are left alone: absolute paths
/// (including protocol-relative `//host/...`), `http(s)://` URLs and data
/// URIs.
pub fn resolve_image_path(src: &str, base_dir: &str) -> Option<String> {
    if src.starts_with('/')
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
    {
        return None;
    }

    let normalized = normalize_join(base_dir, src);
    Some(normalized.trim_start_matches('/').to_string())
}

/// Directory part of a root-relative path (`""` for top-level files).
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join `reference` onto `base` and collapse `.` and `..` segments.
///
/// `..` segments that climb past the start are kept, so the result never
/// silently points somewhere else.
fn normalize_join(base: &str, reference: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in base.split('/').chain(reference.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

/// One attribute of an image tag; spans index into the tag text.
struct Attribute<'a> {
    name: &'a str,
    span: Range<usize>,
    value: Option<&'a str>,
    value_span: Option<Range<usize>>,
}

/// A complete `<img ...>` tag and its attributes.
struct ImageTag<'a> {
    raw: &'a str,
    attributes: Vec<Attribute<'a>>,
}

impl<'a> ImageTag<'a> {
    fn parse(raw: &'a str) -> Self {
        let shift = IMG_OPEN.len();
        let body = &raw[shift..raw.len() - 1];

        let attributes = ATTR_RE
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?;
                let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
                Some(Attribute {
                    name: name.as_str(),
                    span: whole.start() + shift..whole.end() + shift,
                    value: value.map(|m| m.as_str()),
                    value_span: value.map(|m| m.start() + shift..m.end() + shift),
                })
            })
            .collect();

        Self { raw, attributes }
    }

    fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    fn is_finalized(&self) -> bool {
        self.attribute("onclick")
            .and_then(|attr| attr.value)
            .is_some_and(|handler| handler.starts_with("openImageModal"))
    }
}

/// Produce the rewritten tag text.
fn finalize_image(tag: &ImageTag<'_>, base_dir: &str) -> String {
    // (start, end, replacement) within tag.raw; applied in order.
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    let src = tag.attribute("src");
    let insert_at = src.map_or(IMG_OPEN.len(), |attr| attr.span.end);

    if let Some(attr) = src {
        if let (Some(value), Some(range)) = (attr.value, attr.value_span.clone()) {
            if let Some(resolved) = resolve_image_path(value, base_dir) {
                edits.push((range.start, range.end, resolved));
            }
        }
    }

    match tag.attribute("class") {
        Some(attr) => {
            let has_class = attr
                .value
                .is_some_and(|v| v.split_whitespace().any(|c| c == PREVIEW_IMAGE_CLASS));
            if !has_class {
                match (&attr.value_span, attr.value) {
                    (Some(range), Some(value)) if !value.trim().is_empty() => {
                        edits.push((range.end, range.end, format!(" {PREVIEW_IMAGE_CLASS}")));
                    }
                    _ => edits.push((
                        attr.span.start,
                        attr.span.end,
                        format!(r#"class="{PREVIEW_IMAGE_CLASS}""#),
                    )),
                }
            }
        }
        None => edits.push((insert_at, insert_at, format!(r#" class="{PREVIEW_IMAGE_CLASS}""#))),
    }

    match tag.attribute("onclick") {
        Some(attr) => edits.push((
            attr.span.start,
            attr.span.end,
            format!(r#"onclick="{LIGHTBOX_ONCLICK}""#),
        )),
        None => edits.push((insert_at, insert_at, format!(r#" onclick="{LIGHTBOX_ONCLICK}""#))),
    }

    // Stable: edits at the same position keep their push order.
    edits.sort_by_key(|(start, _, _)| *start);

    let mut out = String::with_capacity(tag.raw.len() + 64);
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        out.push_str(&tag.raw[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&tag.raw[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewrite(html: &str, path: &str) -> String {
        let (out, degradation) = rewrite_images(html, path);
        assert_eq!(degradation, None);
        out
    }

    #[test]
    fn resolves_relative_to_note_directory() {
        assert_eq!(
            resolve_image_path("img/a.png", "notes/sub"),
            Some("notes/sub/img/a.png".to_string())
        );
        assert_eq!(
            resolve_image_path("../img/a.png", "notes/sub"),
            Some("notes/img/a.png".to_string())
        );
        assert_eq!(
            resolve_image_path("./img/./a.png", "notes"),
            Some("notes/img/a.png".to_string())
        );
        assert_eq!(
            resolve_image_path("img/a.png", ""),
            Some("img/a.png".to_string())
        );
    }

    #[test]
    fn keeps_leading_parent_segments_above_root() {
        assert_eq!(
            resolve_image_path("../../x.png", "notes"),
            Some("../x.png".to_string())
        );
    }

    #[test]
    fn leaves_absolute_and_remote_references() {
        assert_eq!(resolve_image_path("/assets/a.png", "notes"), None);
        assert_eq!(resolve_image_path("//cdn.example.com/a.png", "notes"), None);
        assert_eq!(resolve_image_path("https://x/a.png", "notes"), None);
        assert_eq!(resolve_image_path("http://x/a.png", "notes"), None);
        assert_eq!(resolve_image_path("data:image/png;base64,AAAA", "notes"), None);
    }

    #[test]
    fn rewrites_relative_image() {
        let out = rewrite(
            r#"<p><img src="img/a.png" alt="A" /></p>"#,
            "notes/sub/page.md",
        );

        assert_eq!(
            out,
            r#"<p><img src="notes/sub/img/a.png" class="preview-image" onclick="openImageModal(this.src)" alt="A" /></p>"#
        );
    }

    #[test]
    fn rewrites_parent_relative_image() {
        let out = rewrite(r#"<img src="../img/a.png" alt="" />"#, "notes/sub/page.md");

        assert!(out.starts_with(r#"<img src="notes/img/a.png" class="preview-image""#));
    }

    #[test]
    fn absolute_and_remote_images_only_gain_affordance() {
        let out = rewrite(
            r#"<img src="/assets/a.png" alt="" /><img src="https://x/a.png" alt="" />"#,
            "notes/sub/page.md",
        );

        assert_eq!(
            out,
            concat!(
                r#"<img src="/assets/a.png" class="preview-image" onclick="openImageModal(this.src)" alt="" />"#,
                r#"<img src="https://x/a.png" class="preview-image" onclick="openImageModal(this.src)" alt="" />"#
            )
        );
    }

    #[test]
    fn finalized_images_pass_through() {
        let once = rewrite(r#"<img src="img/a.png" alt="" />"#, "notes/page.md");
        let twice = rewrite(&once, "notes/page.md");

        assert_eq!(once, twice);
    }

    #[test]
    fn appends_to_existing_class() {
        let out = rewrite(r#"<img class="wide" src="a.png">"#, "page.md");

        assert_eq!(
            out,
            r#"<img class="wide preview-image" src="a.png" onclick="openImageModal(this.src)">"#
        );
    }

    #[test]
    fn image_without_src_gains_affordance() {
        let out = rewrite("<img alt=\"x\">", "page.md");

        assert_eq!(
            out,
            r#"<img class="preview-image" onclick="openImageModal(this.src)" alt="x">"#
        );
    }

    #[test]
    fn malformed_tag_keeps_remaining_content() {
        let html = r#"<img src="a.png"><p>ok</p><img src="b.png alt="x"#;

        let (out, degradation) = rewrite_images(html, "n/page.md");

        assert_eq!(
            out,
            concat!(
                r#"<img src="n/a.png" class="preview-image" onclick="openImageModal(this.src)">"#,
                r#"<p>ok</p><img src="b.png alt="x"#
            )
        );
        assert_eq!(degradation, Some(Degradation::MalformedTag { offset: 26 }));
    }

    #[test]
    fn falls_back_to_original_past_rewrite_limit() {
        let html = r#"<img src="a.png">"#.repeat(MAX_IMAGE_REWRITES + 1);

        let (out, degradation) = rewrite_images(&html, "page.md");

        assert_eq!(out, html);
        assert_eq!(
            degradation,
            Some(Degradation::IterationLimit {
                limit: MAX_IMAGE_REWRITES
            })
        );
    }

    #[test]
    fn rewrites_exactly_at_limit() {
        let html = r#"<img src="a.png">"#.repeat(MAX_IMAGE_REWRITES);

        let (out, degradation) = rewrite_images(&html, "page.md");

        assert_eq!(degradation, None);
        assert_eq!(out.matches(PREVIEW_IMAGE_CLASS).count(), MAX_IMAGE_REWRITES);
    }

    #[test]
    fn quoted_values_may_contain_angle_brackets() {
        let out = rewrite(r#"<img alt="a > b" src='x.png'>"#, "n/page.md");

        assert_eq!(
            out,
            r#"<img alt="a > b" src='n/x.png' class="preview-image" onclick="openImageModal(this.src)">"#
        );
    }

    #[test]
    fn commented_out_images_are_left_alone() {
        let html = r#"<!-- <img src="old.png"> --><IMG SRC="new.png">"#;

        let out = rewrite(html, "n/page.md");

        assert_eq!(
            out,
            r#"<!-- <img src="old.png"> --><IMG SRC="n/new.png" class="preview-image" onclick="openImageModal(this.src)">"#
        );
    }

    #[test]
    fn similar_tag_names_are_not_images() {
        let html = r#"<imgx src="a.png"><p>text</p>"#;

        assert_eq!(rewrite(html, "n/page.md"), html);
    }
}
