//! The document body: a segmented sequence of immutable-content runs.
//!
//! A linked list of chunks is the reference representation, but a `Vec<Segment>`
//! gives the same O(segments) search/split/removal complexity without the
//! `Option<Box<Segment>>` traversal ceremony a structure that's never shared or
//! aliased doesn't need.

/// A contiguous, non-empty run of bytes within the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    content: String,
}

impl Segment {
    fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }
}

/// The live Markdown text as an ordered sequence of segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceList {
    segments: Vec<Segment>,
    total_length: usize,
}

/// A position or range fell outside `[0, total_length]`, or `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange;

impl PieceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenates every segment's content in order.
    pub fn flatten(&self) -> String {
        let mut out = String::with_capacity(self.total_length);
        for segment in &self.segments {
            out.push_str(segment.as_str());
        }
        out
    }

    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        if pos >= self.total_length {
            return None;
        }
        let (idx, offset) = self.locate(pos)?;
        self.segments[idx].as_str().as_bytes().get(offset).copied()
    }

    /// Finds the segment index and in-segment byte offset containing byte `pos`.
    /// `pos == total_length` is a valid "end of document" position with no segment.
    fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        let mut base = 0;
        for (idx, segment) in self.segments.iter().enumerate() {
            if base + segment.len() > pos {
                return Some((idx, pos - base));
            }
            base += segment.len();
        }
        None
    }

    pub fn insert(&mut self, pos: usize, s: &str) -> Result<(), OutOfRange> {
        if pos > self.total_length {
            return Err(OutOfRange);
        }
        if s.is_empty() {
            return Ok(());
        }

        match self.locate(pos) {
            None => {
                // pos == total_length: append at the very end.
                self.segments.push(Segment::new(s));
            }
            Some((idx, offset)) => {
                // `locate` always yields an in-bounds offset (0 <= offset < segment
                // length), never the boundary at the *end* of a segment: a position
                // exactly between two segments resolves to offset 0 of the next one.
                // So only "prepend" and "split" are reachable here.
                if offset == 0 {
                    self.segments.insert(idx, Segment::new(s));
                } else {
                    let target = self.segments[idx].as_str();
                    let (before, after) = (target[..offset].to_string(), target[offset..].to_string());
                    self.segments
                        .splice(idx..=idx, [Segment::new(before), Segment::new(s), Segment::new(after)]);
                }
            }
        }
        self.total_length += s.len();
        Ok(())
    }

    pub fn delete(&mut self, pos: usize, n: usize) -> Result<(), OutOfRange> {
        if n == 0 {
            return if pos <= self.total_length {
                Ok(())
            } else {
                Err(OutOfRange)
            };
        }
        let end = pos.checked_add(n).ok_or(OutOfRange)?;
        if end > self.total_length {
            return Err(OutOfRange);
        }

        let (start_idx, start_off) = self.locate(pos).expect("pos < total_length was checked");
        // `end` may land exactly at total_length, which `locate` reports as None.
        let (end_idx, end_off) = match self.locate(end) {
            Some(v) => v,
            None => (self.segments.len() - 1, self.segments[self.segments.len() - 1].len()),
        };

        if start_idx == end_idx {
            let content = self.segments[start_idx].as_str();
            let mut rebuilt = String::with_capacity(content.len() - n);
            rebuilt.push_str(&content[..start_off]);
            rebuilt.push_str(&content[end_off..]);
            if rebuilt.is_empty() {
                self.segments.remove(start_idx);
            } else {
                self.segments[start_idx] = Segment::new(rebuilt);
            }
        } else {
            let start_whole = start_off == 0;
            let end_whole = end_off == self.segments[end_idx].len();

            let start_remainder = (!start_whole)
                .then(|| self.segments[start_idx].as_str()[..start_off].to_string());
            let end_remainder =
                (!end_whole).then(|| self.segments[end_idx].as_str()[end_off..].to_string());

            let mut replacement = Vec::new();
            if let Some(s) = start_remainder {
                replacement.push(Segment::new(s));
            }
            if let Some(s) = end_remainder {
                replacement.push(Segment::new(s));
            }
            self.segments.splice(start_idx..=end_idx, replacement);
        }

        self.total_length -= n;
        Ok(())
    }
}
