//! inline emphasis markup for assistant replies.
//!
//! backends are asked to wrap emphasized words in a marker pair (`{{` … `}}`
//! by default). [`parse`] turns a reply into plain/emphasized runs that the
//! presentation layer can style. the scanner borrows from the input and never
//! allocates the text itself, so it is cheap to re-run on every render pass.
//!
//! - matching is non-greedy: the first close marker after an open marker ends the span.
//! - whitespace just inside the markers is trimmed.
//! - an open marker with no close marker is literal text.
//! - a span that is empty after trimming (`{{}}`, `{{  }}`) is dropped.

/// open/close marker pair for an emphasized span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiters<'d> {
    pub open: &'d str,
    pub close: &'d str,
}

impl Delimiters<'static> {
    pub const BRACES: Self = Self { open: "{{", close: "}}" };
}

impl Default for Delimiters<'static> {
    fn default() -> Self {
        Self::BRACES
    }
}

/// a contiguous run of text, either plain or emphasized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub content: &'a str,
    pub emphasized: bool,
}

impl<'a> Segment<'a> {
    pub fn plain(content: &'a str) -> Self {
        Self { content, emphasized: false }
    }

    pub fn emphasized(content: &'a str) -> Self {
        Self { content, emphasized: true }
    }
}

/// parse with the default `{{` / `}}` markers.
pub fn parse(text: &str) -> Vec<Segment<'_>> {
    parse_with(text, Delimiters::BRACES)
}

pub fn parse_with<'a>(text: &'a str, delimiters: Delimiters<'_>) -> Vec<Segment<'a>> {
    Segments::new(text, delimiters).collect()
}

/// lazy left-to-right scanner behind [`parse`].
#[derive(Clone, Debug)]
pub struct Segments<'a, 'd> {
    rest: &'a str,
    delimiters: Delimiters<'d>,
    // emphasized interior found while emitting the plain text before it
    queued: Option<&'a str>,
}

impl<'a, 'd> Segments<'a, 'd> {
    pub fn new(text: &'a str, delimiters: Delimiters<'d>) -> Self {
        Self { rest: text, delimiters, queued: None }
    }

    /// locate the next complete span in `rest`.
    /// returns (text before the open marker, trimmed interior, text after the close marker).
    fn next_span(&self) -> Option<(&'a str, &'a str, &'a str)> {
        let Delimiters { open, close } = self.delimiters;
        if open.is_empty() || close.is_empty() {
            return None;
        }
        let rest = self.rest;
        let start = rest.find(open)?;
        let inner_start = start + open.len();
        let inner_end = inner_start + rest[inner_start..].find(close)?;
        Some((
            &rest[..start],
            rest[inner_start..inner_end].trim(),
            &rest[inner_end + close.len()..],
        ))
    }
}

impl<'a> Iterator for Segments<'a, '_> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.queued.take() {
                if inner.is_empty() {
                    continue;
                }
                return Some(Segment::emphasized(inner));
            }

            if self.rest.is_empty() {
                return None;
            }

            match self.next_span() {
                Some((before, inner, after)) => {
                    self.rest = after;
                    self.queued = Some(inner);
                    if !before.is_empty() {
                        return Some(Segment::plain(before));
                    }
                }
                None => {
                    let tail = std::mem::take(&mut self.rest);
                    return Some(Segment::plain(tail));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_without_markers_is_one_plain_segment() {
        for input in ["hello", "a { b } c", "}} only close", "multi\nline text"] {
            assert_eq!(parse(input), vec![Segment::plain(input)]);
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn emphasis_between_plain_runs() {
        assert_eq!(
            parse("a{{b}}c"),
            vec![Segment::plain("a"), Segment::emphasized("b"), Segment::plain("c")]
        );
    }

    #[test]
    fn adjacent_spans_have_nothing_between_them() {
        assert_eq!(
            parse("{{x}}{{y}}"),
            vec![Segment::emphasized("x"), Segment::emphasized("y")]
        );
    }

    #[test]
    fn interior_whitespace_is_trimmed() {
        assert_eq!(
            parse("well, {{  obviously\n }} yes"),
            vec![
                Segment::plain("well, "),
                Segment::emphasized("obviously"),
                Segment::plain(" yes"),
            ]
        );
    }

    #[test]
    fn empty_interior_is_dropped() {
        assert_eq!(parse("a{{}}b"), vec![Segment::plain("a"), Segment::plain("b")]);
        assert!(parse("{{   }}").is_empty());
    }

    #[test]
    fn unterminated_open_marker_is_literal() {
        assert_eq!(parse("oops {{ never closed"), vec![Segment::plain("oops {{ never closed")]);
        assert_eq!(
            parse("{{a}} then {{b"),
            vec![Segment::emphasized("a"), Segment::plain(" then {{b")]
        );
    }

    #[test]
    fn match_is_non_greedy() {
        assert_eq!(
            parse("{{a}} and {{b}}"),
            vec![Segment::emphasized("a"), Segment::plain(" and "), Segment::emphasized("b")]
        );
        // the first close marker wins, even across a nested open marker
        assert_eq!(
            parse("{{a {{b}} c}}"),
            vec![Segment::emphasized("a {{b"), Segment::plain(" c}}")]
        );
    }

    #[test]
    fn custom_delimiters() {
        let stars = Delimiters { open: "**", close: "**" };
        assert_eq!(
            parse_with("so **very** nice", stars),
            vec![Segment::plain("so "), Segment::emphasized("very"), Segment::plain(" nice")]
        );
        // default markers are literal under other delimiters
        assert_eq!(parse_with("{{x}}", stars), vec![Segment::plain("{{x}}")]);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        assert_eq!(
            parse("héllo {{wörld}} ✓"),
            vec![Segment::plain("héllo "), Segment::emphasized("wörld"), Segment::plain(" ✓")]
        );
    }

    #[test]
    fn reparsing_is_stable() {
        let reply = "it's {{fine}}, {{really}}.";
        let first = parse(reply);
        for _ in 0..100 {
            assert_eq!(parse(reply), first);
        }
    }
}
