//! Zero-copy iteration over the `[%key value]` annotations Lichess embeds in
//! move comments.

use std::iter::Zip;

use memchr::{memchr_iter, Memchr};

/// Clock annotation key.
pub const CLK: &[u8] = b"%clk";
/// Engine evaluation annotation key.
pub const EVAL: &[u8] = b"%eval";

/// Iterator over the `(key, value)` pairs of a move comment.
pub struct CommentTags<'c> {
    comment: &'c [u8],
    spaces: Memchr<'c>,
    brackets: Zip<Memchr<'c>, Memchr<'c>>,
}

impl<'c> CommentTags<'c> {
    pub fn new(comment: &'c [u8]) -> Self {
        Self {
            comment,
            spaces: memchr_iter(b' ', comment),
            brackets: memchr_iter(b'[', comment).zip(memchr_iter(b']', comment)),
        }
    }
}

impl<'c> Iterator for CommentTags<'c> {
    type Item = (&'c [u8], &'c [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        // Each annotation is one bracket pair with a single space splitting
        // key from value; free-text comments have no brackets and yield
        // nothing.
        let (open, close) = self.brackets.next()?;
        for space in self.spaces.by_ref() {
            if (open..close).contains(&space) {
                return Some((&self.comment[open + 1..space], &self.comment[space + 1..close]));
            }
        }
        None
    }
}
