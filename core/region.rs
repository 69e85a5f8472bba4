use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Start,
    End,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("found <{tag}> without a closing </{tag}>")]
pub struct UnterminatedRegion {
    pub tag: &'static str,
}

/// A generated region delimited by `<tag>` and `</tag>` inside a document
/// that is otherwise owned by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedRegion {
    tag: &'static str,
}

pub const PROJECT_STRUCTURE: TaggedRegion = TaggedRegion::new("project_structure");
pub const SYSTEM_PROMPT: TaggedRegion = TaggedRegion::new("system_prompt");

impl TaggedRegion {
    pub const fn new(tag: &'static str) -> Self {
        Self { tag }
    }

    pub fn open(&self) -> String {
        format!("<{}>", self.tag)
    }

    pub fn close(&self) -> String {
        format!("</{}>", self.tag)
    }

    /// `<tag>\nbody\n</tag>`; trailing newlines of `body` are not doubled.
    pub fn render(&self, body: &str) -> String {
        let body = body.trim_end_matches('\n');
        if body.is_empty() {
            format!("{}\n{}", self.open(), self.close())
        } else {
            format!("{}\n{}\n{}", self.open(), body, self.close())
        }
    }

    /// Byte range of the first complete region, markers included. Markers
    /// only count at the start of a line.
    pub fn find(&self, document: &str) -> Result<Option<Range<usize>>, UnterminatedRegion> {
        self.find_outside(document, None)
    }

    /// Like [`find`](Self::find), ignoring markers inside `reserved`.
    pub fn find_outside(
        &self,
        document: &str,
        reserved: Option<&Range<usize>>,
    ) -> Result<Option<Range<usize>>, UnterminatedRegion> {
        let open = self.open();
        let close = self.close();
        let usable = |at: &usize| reserved.is_none_or(|r| !r.contains(at));
        let Some(start) = line_start_matches(document, &open).find(usable) else {
            return Ok(None);
        };
        let after_open = start + open.len();
        match line_start_matches(document, &close)
            .filter(|&at| at >= after_open)
            .find(usable)
        {
            Some(end) => Ok(Some(start..end + close.len())),
            None => Err(UnterminatedRegion { tag: self.tag }),
        }
    }

    /// Replaces the region in place, or inserts it at `placement` when absent.
    /// Text outside the region is preserved byte for byte.
    pub fn splice(
        &self,
        document: &str,
        body: &str,
        placement: Placement,
    ) -> Result<String, UnterminatedRegion> {
        self.splice_outside(document, body, placement, None)
    }

    /// [`splice`](Self::splice) that leaves the `reserved` byte range alone.
    pub fn splice_outside(
        &self,
        document: &str,
        body: &str,
        placement: Placement,
        reserved: Option<&Range<usize>>,
    ) -> Result<String, UnterminatedRegion> {
        let block = self.render(body);
        if let Some(range) = self.find_outside(document, reserved)? {
            let mut out = String::with_capacity(document.len() + block.len());
            out.push_str(&document[..range.start]);
            out.push_str(&block);
            out.push_str(&document[range.end..]);
            return Ok(out);
        }

        if document.trim().is_empty() {
            return Ok(format!("{}\n", block));
        }
        Ok(match placement {
            Placement::Start => format!("{}\n\n{}", block, document),
            Placement::End if document.ends_with('\n') => format!("{}\n{}\n", document, block),
            Placement::End => format!("{}\n\n{}\n", document, block),
        })
    }
}

fn line_start_matches<'a>(
    document: &'a str,
    marker: &'a str,
) -> impl Iterator<Item = usize> + 'a {
    document
        .match_indices(marker)
        .map(|(at, _)| at)
        .filter(|&at| at == 0 || document.as_bytes()[at - 1] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: TaggedRegion = TaggedRegion::new("demo");

    #[test]
    fn render_handles_empty_and_trailing_newlines() {
        assert_eq!(REGION.render(""), "<demo>\n</demo>");
        assert_eq!(REGION.render("a\nb\n"), "<demo>\na\nb\n</demo>");
    }

    #[test]
    fn replaces_in_place_preserving_surroundings() {
        let doc = "intro\n<demo>\nold\n</demo>\noutro  \n";
        let out = REGION.splice(doc, "new", Placement::End).unwrap();
        assert_eq!(out, "intro\n<demo>\nnew\n</demo>\noutro  \n");
    }

    #[test]
    fn inserts_at_requested_placement() {
        assert_eq!(
            REGION.splice("notes", "x", Placement::Start).unwrap(),
            "<demo>\nx\n</demo>\n\nnotes"
        );
        assert_eq!(
            REGION.splice("notes\n", "x", Placement::End).unwrap(),
            "notes\n\n<demo>\nx\n</demo>\n"
        );
        assert_eq!(
            REGION.splice("notes", "x", Placement::End).unwrap(),
            "notes\n\n<demo>\nx\n</demo>\n"
        );
        assert_eq!(REGION.splice("", "x", Placement::End).unwrap(), "<demo>\nx\n</demo>\n");
    }

    #[test]
    fn splice_is_idempotent() {
        let once = REGION.splice("hand written\n", "body", Placement::End).unwrap();
        let twice = REGION.splice(&once, "body", Placement::End).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn inline_tag_mentions_are_not_markers() {
        let doc = "see the <demo> block\n<demo>\nold\n</demo>\n";
        assert_eq!(REGION.find(doc).unwrap(), Some(21..39));
        assert_eq!(REGION.find("mention <demo> only").unwrap(), None);
    }

    #[test]
    fn reserved_range_is_skipped() {
        let doc = "<other>\n<demo>\n</other>\n";
        let reserved = 0..doc.len() - 1;
        assert_eq!(REGION.find_outside(doc, Some(&reserved)).unwrap(), None);
        assert_eq!(
            REGION
                .splice_outside(doc, "x", Placement::End, Some(&reserved))
                .unwrap(),
            "<other>\n<demo>\n</other>\n\n<demo>\nx\n</demo>\n"
        );
    }

    #[test]
    fn unterminated_region_is_rejected() {
        let err = REGION.splice("<demo>\nno end", "x", Placement::End).unwrap_err();
        assert_eq!(err.tag, "demo");
    }
}
