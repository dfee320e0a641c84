//! Markdown to HTML rendering.

use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::frontmatter::extract_frontmatter;

/// Placeholder emitted in place of raw HTML when it is not allowed through.
pub const RAW_HTML_OMITTED: &str = "<!-- raw HTML omitted -->";

/// Errors that can occur when rendering a single document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Note is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Converts markdown source into an HTML fragment.
///
/// This is the seam between the build pipeline and the markdown grammar; the
/// pipeline only relies on the fragment shape pulldown-cmark produces for
/// images (`<img src="...">`) and fenced code (`<pre><code class="language-x">`).
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str) -> Result<String, RenderError>;

    /// Render a note as read from disk.
    fn render_bytes(&self, source: &[u8]) -> Result<String, RenderError> {
        self.render(std::str::from_utf8(source)?)
    }
}

/// Rendering options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Pass raw HTML in the markdown through instead of omitting it
    pub allow_raw_html: bool,

    /// Render soft line breaks as `<br />`
    pub hard_wraps: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            allow_raw_html: false,
            hard_wraps: true,
        }
    }
}

/// pulldown-cmark backed renderer with table, strikethrough, task list and
/// footnote extensions.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    /// Create a renderer with the given options.
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    fn parser_options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        // A leading block that is not a YAML mapping is ordinary markdown,
        // usually a thematic break.
        let content = match extract_frontmatter(source) {
            Ok((_frontmatter, content)) => content,
            Err(e) => {
                tracing::debug!("Rendering leading block as markdown: {}", e);
                source
            }
        };

        let mut events: Vec<Event<'_>> =
            Parser::new_ext(content, Self::parser_options()).collect();
        assign_heading_ids(&mut events);

        let mut in_html_block = false;
        let mut omitted_in_block = false;
        let allow_raw_html = self.options.allow_raw_html;
        let hard_wraps = self.options.hard_wraps;

        let events = events.into_iter().filter_map(|event| match event {
            Event::Start(Tag::HtmlBlock) => {
                in_html_block = true;
                omitted_in_block = false;
                Some(event)
            }
            Event::End(TagEnd::HtmlBlock) => {
                in_html_block = false;
                Some(event)
            }
            Event::Html(_) if !allow_raw_html => {
                // A block arrives as one event per line; one marker per block.
                if in_html_block && omitted_in_block {
                    None
                } else {
                    omitted_in_block = true;
                    Some(Event::Html(CowStr::from(format!("{RAW_HTML_OMITTED}\n"))))
                }
            }
            Event::InlineHtml(_) if !allow_raw_html => {
                Some(Event::InlineHtml(CowStr::Borrowed(RAW_HTML_OMITTED)))
            }
            Event::SoftBreak if hard_wraps => Some(Event::HardBreak),
            other => Some(other),
        });

        let mut html_output = String::with_capacity(content.len() * 3 / 2);
        html::push_html(&mut html_output, events);

        Ok(html_output)
    }
}

/// Give every heading without an explicit `{#id}` a slug id, unique within
/// the document.
fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut i = 0;

    while i < events.len() {
        let needs_id = matches!(&events[i], Event::Start(Tag::Heading { id: None, .. }));
        if let Event::Start(Tag::Heading { id: Some(existing), .. }) = &events[i] {
            seen.entry(existing.to_string()).or_insert(0);
        }
        if !needs_id {
            i += 1;
            continue;
        }

        let mut title = String::new();
        let mut j = i + 1;
        while j < events.len() {
            match &events[j] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(text) | Event::Code(text) => title.push_str(text),
                _ => {}
            }
            j += 1;
        }

        let slug = unique_slug(slugify(&title), &mut seen);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
        i = j;
    }
}

fn unique_slug(base: String, seen: &mut HashMap<String, usize>) -> String {
    let base = if base.is_empty() {
        "heading".to_string()
    } else {
        base
    };

    let Some(&last) = seen.get(&base) else {
        seen.insert(base.clone(), 0);
        return base;
    };

    let mut count = last;
    loop {
        count += 1;
        let candidate = format!("{}-{}", base, count);
        if !seen.contains_key(&candidate) {
            seen.insert(base, count);
            seen.insert(candidate.clone(), 0);
            return candidate;
        }
    }
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
