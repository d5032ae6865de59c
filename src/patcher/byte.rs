//! This module contains a byte patcher

use super::Patcher;
use crate::span::{Span, SpanError};

/// Patcher for overwriting a whole match with a byte array.
pub struct BytePatcher<'a> {
    /// Bytes written over the match
    replacement: &'a [u8],
}
impl<'a> BytePatcher<'a> {
    /// Creates a new [`BytePatcher`]
    pub fn new(replacement: &'a [u8]) -> Self {
        Self { replacement }
    }
}
unsafe impl<'a> Patcher for BytePatcher<'a> {
    type Error = SpanError;

    fn len(&self) -> usize {
        self.replacement.len()
    }

    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error> {
        // Safety: caller must ensure that `site` is writable
        site.write(0, self.replacement)
    }
}

#[cfg(test)]
mod tests {
    use crate::patcher::byte::BytePatcher;
    use crate::patcher::Patcher;
    use crate::signature::{X86_64_512, X86_64_8192};
    use crate::span::Span;

    #[test]
    /// Test that every byte of the match is replaced
    fn test_patch() {
        let mut data = vec![0x90u8; 2];
        data.extend_from_slice(&X86_64_512);
        data.extend_from_slice(&[0x90, 0xc3]);

        // get our patcher to test
        let patcher = BytePatcher::new(&X86_64_8192);

        // patch the match in the middle of the buffer
        unsafe {
            let span = Span::from_raw(data.as_mut_ptr(), data.len());
            patcher.patch(span.subspan(2, patcher.len()).unwrap()).unwrap();
        }

        // make sure the match was fully replaced
        assert_eq!(data[2..13], X86_64_8192);

        // make sure nothing around it changed
        assert_eq!(data[..2], [0x90, 0x90]);
        assert_eq!(data[13..], [0x90, 0xc3]);
    }

    #[test]
    /// Tests a site that's too small for the patch, which must be rejected without writing
    fn test_short_site() {
        let mut data = vec![1u8, 2, 3, 4];

        let patcher = BytePatcher::new(&[5, 5, 5, 5, 5]);
        let result = unsafe { patcher.patch(Span::from_raw(data.as_mut_ptr(), data.len())) };

        assert!(result.is_err());
        assert_eq!(data, [1, 2, 3, 4]);
    }
}
