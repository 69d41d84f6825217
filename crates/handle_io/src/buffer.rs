// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Buffered streams over a [`FileView`][crate::FileView].
//!
//! Both stream types keep a window `begin..end` into a fixed-capacity byte store. The window
//! holds bytes read ahead of the caller ([`InputBuffer`]) or bytes waiting to be written
//! ([`OutputBuffer`]). A single buffered call issues at most one host read, or at most one
//! buffered flush plus one direct write, so callers that need a byte goal use the `*_all` and
//! `*_least` helpers, which loop.
//!
//! The store is either inline (`[u8; N]`) or on the heap (`Box<[u8]>`); see [`Storage`].

mod input;
mod output;

pub use input::*;
pub use output::*;

/// The capacity used when none is given.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Fixed-capacity backing memory for a buffered stream.
///
/// The capacity is the length of the slice and must not change over the store's lifetime.
pub trait Storage {
    /// The whole store.
    fn bytes(&self) -> &[u8];

    /// The whole store, mutably.
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl<const N: usize> Storage for [u8; N] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl Storage for Box<[u8]> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

fn inline_storage<const N: usize>() -> [u8; N] {
    const { assert!(N > 0, "a buffered stream needs a non-zero capacity") };
    [0; N]
}

fn heap_storage(capacity: std::num::NonZeroUsize) -> Box<[u8]> {
    vec![0; capacity.get()].into_boxed_slice()
}
