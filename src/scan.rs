//! # Scan
//!
//! Linear signature search over a [`Span`].

use std::slice;

use crate::span::Span;

/// Iterator over the offsets where `pattern` starts inside a span.
///
/// Matches never overlap: after a hit at `j` the search resumes at `j + pattern.len()`, so a range that is about to
/// be rewritten is never reported twice. Offsets come out in ascending order.
///
/// The iterator only borrows the bytes of one candidate window at a time, so the caller may rewrite a match before
/// asking for the next one.
pub struct Matches<'p> {
    /// Region being searched
    span: Span,
    /// Exact bytes to look for
    pattern: &'p [u8],
    /// Next candidate offset
    next: usize,
}
impl<'p> Matches<'p> {
    /// Creates a search for `pattern` over `span`. An empty pattern matches nothing.
    ///
    /// # Safety
    ///
    /// `span` must be readable for its full length while the iterator is in use
    pub unsafe fn new(span: Span, pattern: &'p [u8]) -> Self {
        Self {
            span,
            pattern,
            next: 0,
        }
    }

    /// Compares the window at `offset` with the pattern
    fn is_match(&self, offset: usize) -> bool {
        // Safety: callers only pass offsets where `offset + pattern.len() <= span.len()`, and the span is readable
        let window = unsafe { slice::from_raw_parts(self.span.as_ptr().add(offset), self.pattern.len()) };
        window == self.pattern
    }
}

impl<'p> Iterator for Matches<'p> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.pattern.len();
        if len == 0 || self.span.len() < len {
            return None;
        }
        let last = self.span.len() - len;

        while self.next <= last {
            let offset = self.next;
            if self.is_match(offset) {
                self.next = offset + len;
                return Some(offset);
            }
            self.next += 1;
        }
        None
    }
}

/// Searches `span` for `pattern`.
///
/// # Safety
///
/// See [`Matches::new`].
pub unsafe fn matches(span: Span, pattern: &[u8]) -> Matches<'_> {
    Matches::new(span, pattern)
}

#[cfg(test)]
mod tests {
    use super::matches;
    use crate::signature::X86_64_512;
    use crate::span::Span;

    /// Runs a search over `data`
    fn find(data: &mut [u8], pattern: &[u8]) -> Vec<usize> {
        unsafe { matches(Span::from_raw(data.as_mut_ptr(), data.len()), pattern).collect() }
    }

    #[test]
    /// Back-to-back matches are all found, in order
    fn test_adjacent() {
        let p = X86_64_512.len();
        let mut data = vec![0x90u8; 40 + 2 * p + 16];
        for at in [5, 40, 40 + p] {
            data[at..at + p].copy_from_slice(&X86_64_512);
        }

        assert_eq!(find(&mut data, &X86_64_512), [5, 40, 40 + p]);
    }

    #[test]
    /// A repeat starting inside an earlier match is not reported
    fn test_no_overlap() {
        let pattern = [0xaa, 0xaa, 0xaa];
        let mut data = vec![0u8, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0, 0xaa, 0xaa, 0xaa];

        // an overlapping search would also report 2 and 3
        assert_eq!(find(&mut data, &pattern), [1, 7]);
    }

    #[test]
    /// Matches at the very start and very end of the span
    fn test_edges() {
        let pattern = [1u8, 2, 3];
        let mut data = vec![1u8, 2, 3, 0, 0, 1, 2, 3];
        assert_eq!(find(&mut data, &pattern), [0, 5]);

        let mut exact = vec![1u8, 2, 3];
        assert_eq!(find(&mut exact, &pattern), [0]);
    }

    #[test]
    /// Short spans, empty spans and empty patterns yield nothing
    fn test_nothing() {
        let mut data = vec![1u8, 2];
        assert!(find(&mut data, &[1, 2, 3]).is_empty());
        assert!(find(&mut data, &[]).is_empty());
        assert!(unsafe { matches(Span::empty(), &[1]) }.next().is_none());

        // a near miss in the last byte
        let mut data = X86_64_512.to_vec();
        *data.last_mut().unwrap() = 0x01;
        assert!(find(&mut data, &X86_64_512).is_empty());
    }

    #[test]
    /// Rewriting a match between calls doesn't disturb the search
    fn test_rewrite_between_matches() {
        let pattern = [7u8, 7];
        let mut data = vec![7u8, 7, 7, 7, 0, 7, 7];
        let span = unsafe { Span::from_raw(data.as_mut_ptr(), data.len()) };

        let mut found = Vec::new();
        for offset in unsafe { matches(span, &pattern) } {
            unsafe { span.write(offset, &[8, 8]).unwrap() };
            found.push(offset);
        }

        assert_eq!(found, [0, 2, 5]);
        assert_eq!(data, [8, 8, 8, 8, 0, 8, 8]);
    }
}
