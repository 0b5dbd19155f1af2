use crate::segment::{is_raw_content_tag, Segment, SegmentKind};

/// Liquid template scanner.
///
/// Splits template source into an ordered list of text, output (`{{ }}`) and
/// tag (`{% %}`) segments. The scanner never fails: an unterminated delimiter
/// turns the rest of the input into one trailing text segment.
///
/// - Byte-indexed navigation (all delimiters are ASCII)
/// - Quote-aware closer search, so `"%}"` inside a string argument does not end a tag
/// - Raw-content tags capture their body verbatim up to the matching end tag
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    segments: Vec<Segment>,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            segments: Vec::new(),
        }
    }

    /// Scan the entire source into segments.
    pub fn scan(source: &str) -> Vec<Segment> {
        let mut scanner = Scanner::new(source);
        scanner.scan_segments();
        tracing::debug!(
            segments = scanner.segments.len(),
            bytes = source.len(),
            "scanned template"
        );
        scanner.segments
    }

    fn scan_segments(&mut self) {
        while self.pos < self.source.len() {
            let Some(open) = self.find_open(self.pos) else {
                self.push_text(self.pos, self.source.len());
                self.pos = self.source.len();
                break;
            };

            self.push_text(self.pos, open);

            match self.scan_delimited(open) {
                Some(segment) => {
                    self.pos = segment.end();
                    let raw_body = segment
                        .tag_name()
                        .filter(|name| is_raw_content_tag(name))
                        .map(str::to_string);
                    self.segments.push(segment);

                    if let Some(name) = raw_body {
                        self.scan_raw_body(&name);
                    }
                }
                None => {
                    // Unterminated delimiter: degrade to trailing text
                    self.push_text(open, self.source.len());
                    self.pos = self.source.len();
                }
            }
        }
    }

    // --- Delimited segments ---

    /// Scan an output or tag starting at `open` (which points at `{{` or `{%`).
    fn scan_delimited(&self, open: usize) -> Option<Segment> {
        let bytes = self.source.as_bytes();
        let kind = if bytes[open + 1] == b'{' {
            SegmentKind::Output
        } else {
            SegmentKind::Tag
        };
        let closer: &[u8] = match kind {
            SegmentKind::Output => b"}}",
            _ => b"%}",
        };

        let mut start = open + 2;
        let trim_left = bytes.get(start) == Some(&b'-');
        if trim_left {
            start += 1;
        }

        let close = self.find_closer(start, closer)?;

        let mut end = close;
        let trim_right = end > start && bytes[end - 1] == b'-';
        if trim_right {
            end -= 1;
        }

        let inner = &self.source[start..end];
        let content_offset = start + (inner.len() - inner.trim_start().len());

        Some(Segment {
            kind,
            raw: self.source[open..close + 2].to_string(),
            content: inner.trim().to_string(),
            offset: open,
            content_offset,
            trim_left,
            trim_right,
        })
    }

    /// Find `closer` from `from`, skipping the contents of quoted strings.
    /// Strings do not span lines: a quote with no partner before the next
    /// newline is treated as an ordinary character.
    fn find_closer(&self, from: usize, closer: &[u8]) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut i = from;

        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\'' || b == b'"' {
                if let Some(rel) = bytes[i + 1..]
                    .iter()
                    .take_while(|&&c| c != b'\n')
                    .position(|&c| c == b)
                {
                    i += rel + 2;
                    continue;
                }
            } else if bytes[i..].starts_with(closer) {
                return Some(i);
            }
            i += 1;
        }

        None
    }

    // --- Raw-content bodies ---

    /// Capture everything up to `{% end<name> %}` as one text segment.
    /// The end tag itself is left for the main loop.
    fn scan_raw_body(&mut self, name: &str) {
        let end_name = format!("end{name}");
        let mut search = self.pos;

        while let Some(at) = self.find_tag_open(search) {
            if self.tag_name_at(at) == Some(end_name.as_str()) {
                self.push_text(self.pos, at);
                self.pos = at;
                return;
            }
            search = at + 2;
        }

        // No matching end tag: the remainder is one final text segment
        self.push_text(self.pos, self.source.len());
        self.pos = self.source.len();
    }

    /// Read the identifier following `{%` (and an optional `-`) at `at`.
    fn tag_name_at(&self, at: usize) -> Option<&str> {
        let rest = self.source[at + 2..].strip_prefix('-').unwrap_or(&self.source[at + 2..]);
        let rest = rest.trim_start();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            None
        } else {
            Some(&rest[..len])
        }
    }

    // --- Helpers ---

    fn find_open(&self, from: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        (from..bytes.len().saturating_sub(1))
            .find(|&i| bytes[i] == b'{' && (bytes[i + 1] == b'{' || bytes[i + 1] == b'%'))
    }

    fn find_tag_open(&self, from: usize) -> Option<usize> {
        self.source.get(from..)?.find("{%").map(|i| from + i)
    }

    fn push_text(&mut self, start: usize, end: usize) {
        if end > start {
            self.segments
                .push(Segment::text(&self.source[start..end], start));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: scan and return `(kind, content)` pairs.
    fn contents(source: &str) -> Vec<(SegmentKind, String)> {
        Scanner::scan(source)
            .into_iter()
            .map(|s| (s.kind, s.content))
            .collect()
    }

    fn text(s: &str) -> (SegmentKind, String) {
        (SegmentKind::Text, s.to_string())
    }

    fn output(s: &str) -> (SegmentKind, String) {
        (SegmentKind::Output, s.to_string())
    }

    fn tag(s: &str) -> (SegmentKind, String) {
        (SegmentKind::Tag, s.to_string())
    }

    // =========================================================================
    // Basic splitting
    // =========================================================================

    #[test]
    fn test_empty_source() {
        assert!(Scanner::scan("").is_empty());
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(contents("hello world"), vec![text("hello world")]);
    }

    #[test]
    fn test_output_between_text() {
        assert_eq!(
            contents("Hi {{ name }}!"),
            vec![text("Hi "), output("name"), text("!")]
        );
    }

    #[test]
    fn test_tags_and_outputs() {
        assert_eq!(
            contents("{% if a %}{{ b }}{% endif %}"),
            vec![tag("if a"), output("b"), tag("endif")]
        );
    }

    #[test]
    fn test_offsets() {
        let segs = Scanner::scan("ab{{ x }}cd");
        assert_eq!(segs[1].offset, 2);
        assert_eq!(segs[1].content_offset, 5);
        assert_eq!(segs[1].raw, "{{ x }}");
        assert_eq!(segs[2].offset, 9);
    }

    #[test]
    fn test_single_brace_is_text() {
        assert_eq!(contents("a { b } c"), vec![text("a { b } c")]);
    }

    // =========================================================================
    // Trim markers
    // =========================================================================

    #[test]
    fn test_trim_markers() {
        let segs = Scanner::scan("{{- x -}}{%- if y -%}");
        assert!(segs[0].trim_left && segs[0].trim_right);
        assert_eq!(segs[0].content, "x");
        assert!(segs[1].trim_left && segs[1].trim_right);
        assert_eq!(segs[1].content, "if y");
    }

    #[test]
    fn test_no_trim_markers() {
        let segs = Scanner::scan("{{ x }}");
        assert!(!segs[0].trim_left);
        assert!(!segs[0].trim_right);
    }

    // =========================================================================
    // Quote-aware closers
    // =========================================================================

    #[test]
    fn test_closer_inside_string() {
        assert_eq!(
            contents("{% assign x = \"50%}\" %}after"),
            vec![tag("assign x = \"50%}\""), text("after")]
        );
    }

    #[test]
    fn test_output_closer_inside_string() {
        assert_eq!(
            contents("{{ 'a}}b' | upcase }}"),
            vec![output("'a}}b' | upcase")]
        );
    }

    #[test]
    fn test_unpaired_quote_is_ordinary() {
        assert_eq!(contents("{{ it's }}"), vec![output("it's")]);
    }

    #[test]
    fn test_unpaired_quote_does_not_reach_next_line() {
        assert_eq!(
            contents("{% if x == 'a %}\n{{ 'b' }}"),
            vec![tag("if x == 'a"), text("\n"), output("'b'")]
        );
    }

    // =========================================================================
    // Graceful degradation
    // =========================================================================

    #[test]
    fn test_unterminated_output() {
        assert_eq!(
            contents("a {{ b c"),
            vec![text("a "), text("{{ b c")]
        );
    }

    #[test]
    fn test_unterminated_tag() {
        assert_eq!(
            contents("{{ x }} {% if"),
            vec![output("x"), text(" "), text("{% if")]
        );
    }

    #[test]
    fn test_lone_open_brace_at_end() {
        assert_eq!(contents("abc{"), vec![text("abc{")]);
    }

    // =========================================================================
    // Raw-content tags
    // =========================================================================

    #[test]
    fn test_raw_preserves_delimiters() {
        assert_eq!(
            contents("{% raw %}{{ not_parsed }}{% endraw %}"),
            vec![tag("raw"), text("{{ not_parsed }}"), tag("endraw")]
        );
    }

    #[test]
    fn test_comment_body_verbatim() {
        assert_eq!(
            contents("{% comment %}{% if x %}{% endcomment %}done"),
            vec![
                tag("comment"),
                text("{% if x %}"),
                tag("endcomment"),
                text("done"),
            ]
        );
    }

    #[test]
    fn test_schema_with_trim_end_tag() {
        assert_eq!(
            contents("{% schema %}{\"name\": \"x\"}{%- endschema -%}"),
            vec![tag("schema"), text("{\"name\": \"x\"}"), tag("endschema")]
        );
    }

    #[test]
    fn test_raw_ignores_other_end_tags() {
        assert_eq!(
            contents("{% raw %}{% endif %}{% endraw %}"),
            vec![tag("raw"), text("{% endif %}"), tag("endraw")]
        );
    }

    #[test]
    fn test_raw_without_end_tag() {
        assert_eq!(
            contents("{% style %}a { color: red }"),
            vec![tag("style"), text("a { color: red }")]
        );
    }

    #[test]
    fn test_empty_raw_body() {
        assert_eq!(
            contents("{% javascript %}{% endjavascript %}"),
            vec![tag("javascript"), tag("endjavascript")]
        );
    }

    #[test]
    fn test_end_tag_prefix_is_not_a_match() {
        // `endrawx` must not close a `raw` block
        assert_eq!(
            contents("{% raw %}{% endrawx %}{% endraw %}"),
            vec![tag("raw"), text("{% endrawx %}"), tag("endraw")]
        );
    }
}
