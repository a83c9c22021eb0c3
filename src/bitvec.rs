//! A fixed-size, thread-safe bitvector supporting only `set` and `test`.
//!
//! The cut-node bitmap is written concurrently by many path-bootstrap tasks
//! and only ever monotonically set (never cleared), so a relaxed
//! read-test/write-set pair over `AtomicU64` words is sufficient; there is no
//! need for a full read-modify-write `fetch_or`.

use std::sync::atomic::{AtomicU64, Ordering};

const BITS_PER_WORD: usize = 64;

pub struct AtomicBitVec {
    words: Vec<AtomicU64>,
}

impl AtomicBitVec {
    pub fn new(len: usize) -> Self {
        let word_count = (len + BITS_PER_WORD - 1) / BITS_PER_WORD;
        let mut words = Vec::with_capacity(word_count);
        words.resize_with(word_count, || AtomicU64::new(0));
        AtomicBitVec { words }
    }

    pub fn set(&self, index: usize) {
        let word = index / BITS_PER_WORD;
        let bit = index % BITS_PER_WORD;
        self.words[word].fetch_or(1u64 << bit, Ordering::Relaxed);
    }

    pub fn test(&self, index: usize) -> bool {
        let word = index / BITS_PER_WORD;
        let bit = index % BITS_PER_WORD;
        (self.words[word].load(Ordering::Relaxed) & (1u64 << bit)) != 0
    }
}
