//! Frontmatter detection and stripping.
//!
//! Notes frequently open with a YAML block (`title`, `tags`, `aliases`, ...).
//! The preview does not display it, but it must not leak into the rendered
//! body as a stray thematic break and paragraph.

use serde_yaml::Mapping;

/// Split a leading YAML frontmatter block off a markdown source.
///
/// Returns the parsed mapping (if a block was present) and the remaining
/// content. A document whose first line is `---` but which never closes the
/// block is treated as plain markdown, since a lone thematic break is valid
/// content.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Mapping>, &str), FrontmatterError> {
    let source_no_bom = source.strip_prefix('\u{feff}').unwrap_or(source);

    let Some(after_open) = strip_delimiter_line(source_no_bom) else {
        return Ok((None, source));
    };

    // Find the closing ---
    let Some((yaml_content, remaining)) = split_at_closing(after_open) else {
        return Ok((None, source));
    };

    let value: serde_yaml::Value = serde_yaml::from_str(yaml_content)
        .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => Mapping::new(),
        _ => return Err(FrontmatterError::NotAMapping),
    };

    Ok((Some(mapping), remaining.trim_start_matches(['\r', '\n'])))
}

/// Strip an opening `---` line, returning what follows it.
fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Locate the closing `---` line; returns (yaml, content after the block).
fn split_at_closing(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&text[..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),

    #[error("Frontmatter must be a YAML mapping")]
    NotAMapping,
}
