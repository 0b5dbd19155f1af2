use serde::Serialize;

/// Segment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Literal template text between delimiters.
    Text,
    /// `{{ ... }}`
    Output,
    /// `{% ... %}`
    Tag,
}

/// A chunk of template source produced by the scanner.
///
/// For text segments `content` equals `raw`. For output and tag segments
/// `content` is the trimmed markup between the delimiters (and trim markers),
/// and `content_offset` is its byte position in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub kind: SegmentKind,
    pub raw: String,
    pub content: String,
    pub offset: usize,
    pub content_offset: usize,
    pub trim_left: bool,
    pub trim_right: bool,
}

impl Segment {
    pub fn text(raw: &str, offset: usize) -> Self {
        Self {
            kind: SegmentKind::Text,
            raw: raw.to_string(),
            content: raw.to_string(),
            offset,
            content_offset: offset,
            trim_left: false,
            trim_right: false,
        }
    }

    /// Byte offset one past the end of the raw segment.
    pub fn end(&self) -> usize {
        self.offset + self.raw.len()
    }

    pub fn is_tag(&self) -> bool {
        self.kind == SegmentKind::Tag
    }

    /// The tag name: the first word of a tag's content.
    ///
    /// Inline comments (`{% # note %}`) report `#` regardless of spacing.
    /// Returns `None` for non-tag segments and empty tags.
    pub fn tag_name(&self) -> Option<&str> {
        if self.kind != SegmentKind::Tag {
            return None;
        }
        if self.content.starts_with('#') {
            return Some("#");
        }
        self.content.split_whitespace().next()
    }

    /// Everything after the tag name, trimmed.
    pub fn markup(&self) -> &str {
        match self.tag_name() {
            Some(name) => self.content[name.len()..].trim(),
            None => "",
        }
    }

    /// Byte position of [`Segment::markup`] in the source.
    pub fn markup_offset(&self) -> usize {
        let name_len = self.tag_name().map_or(0, str::len);
        let rest = &self.content[name_len..];
        self.content_offset + name_len + (rest.len() - rest.trim_start().len())
    }
}

/// Tags whose body is captured verbatim, without Liquid-aware scanning.
pub const RAW_CONTENT_TAGS: &[&str] = &[
    "raw",
    "comment",
    "schema",
    "style",
    "javascript",
    "stylesheet",
];

/// Check if a tag name opens a raw-content block.
pub fn is_raw_content_tag(name: &str) -> bool {
    RAW_CONTENT_TAGS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(content: &str, content_offset: usize) -> Segment {
        Segment {
            kind: SegmentKind::Tag,
            raw: format!("{{% {content} %}}"),
            content: content.to_string(),
            offset: content_offset - 3,
            content_offset,
            trim_left: false,
            trim_right: false,
        }
    }

    #[test]
    fn test_tag_name_and_markup() {
        let seg = tag("assign x = 1", 3);
        assert_eq!(seg.tag_name(), Some("assign"));
        assert_eq!(seg.markup(), "x = 1");
        assert_eq!(seg.markup_offset(), 10);
    }

    #[test]
    fn test_inline_comment_name() {
        assert_eq!(tag("# a note", 3).tag_name(), Some("#"));
        assert_eq!(tag("#note", 3).tag_name(), Some("#"));
    }

    #[test]
    fn test_text_has_no_tag_name() {
        assert_eq!(Segment::text("hello", 0).tag_name(), None);
        assert_eq!(Segment::text("hello", 0).markup(), "");
    }

    #[test]
    fn test_raw_content_tags() {
        assert!(is_raw_content_tag("raw"));
        assert!(is_raw_content_tag("schema"));
        assert!(!is_raw_content_tag("if"));
    }
}
