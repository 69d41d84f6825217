// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Portable flag vocabularies.
//!
//! The bit values here are this crate's own and carry no meaning to any host. The platform
//! layer translates them into native flags, rejecting combinations the host cannot express
//! with [`Errno::EINVAL`][crate::Errno::EINVAL].

use derive_more::{BitAnd, BitOr, BitOrAssign};

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(BitAnd, BitOr, BitOrAssign, Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
        pub struct $name(u32);

        impl $name {
            /// The empty set.
            pub const NONE: Self = Self(0);

            /// Whether every flag in `other` is also set in `self`.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any flag in `other` is also set in `self`.
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// The raw bits.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }
        }
    };
}

flag_set!(
    /// Flags accepted by [`File::open`][crate::file::File::open] and friends.
    ///
    /// [`READ_WRITE`][Self::READ_WRITE] is exactly the union of
    /// [`READ_ONLY`][Self::READ_ONLY] and [`WRITE_ONLY`][Self::WRITE_ONLY].
    OpenFlags
);

impl OpenFlags {
    /// Open for reading.
    pub const READ_ONLY: Self = Self(0b1);
    /// Open for writing.
    pub const WRITE_ONLY: Self = Self(0b10);
    /// Open for reading and writing.
    pub const READ_WRITE: Self = Self(0b11);
    /// Create the file if it does not exist.
    pub const CREATE: Self = Self(0b100);
    /// Truncate the file to zero length on open.
    pub const TRUNCATE: Self = Self(0b1000);
    /// Position every write at the end of the file.
    pub const APPEND: Self = Self(0b1_0000);
    /// Fail if [`CREATE`][Self::CREATE] is set and the file exists.
    pub const EXCLUSIVE: Self = Self(0b10_0000);
    /// Create an unnamed temporary file that disappears when closed.
    pub const TEMPORARY: Self = Self(0b100_0000);
    /// Bypass the host page cache.
    pub const DIRECT: Self = Self(0b1000_0000);
    /// Complete writes only once data and metadata are durable.
    pub const SYNC: Self = Self(0b1_0000_0000);
    /// Complete writes only once data is durable.
    pub const DSYNC: Self = Self(0b10_0000_0000);
}

/// Permission bits for newly created files.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Mode(u32);

impl Mode {
    /// `rw-rw----`, the mode used when the caller has no opinion.
    pub const DEFAULT: Self = Self(0o660);

    /// Wraps raw permission bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for Mode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Reference point for [`File::lseek`][crate::file::File::lseek].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Whence {
    /// Relative to the start of the file.
    Set,
    /// Relative to the current position.
    Cur,
    /// Relative to the end of the file.
    End,
}

flag_set!(
    /// Access protection of a memory mapping.
    MemProt
);

impl MemProt {
    /// Pages may be read.
    pub const READ: Self = Self(0b1);
    /// Pages may be written.
    pub const WRITE: Self = Self(0b10);
    /// Pages may be executed.
    pub const EXEC: Self = Self(0b100);
}

flag_set!(
    /// Sharing behavior of a memory mapping.
    MemMapFlags
);

impl MemMapFlags {
    /// Changes are visible to other mappings of the same file and are carried to the file.
    pub const SHARED: Self = Self(0b1);
    /// Changes are private copy-on-write pages.
    pub const PRIVATE: Self = Self(0b10);
    /// Place the mapping exactly at the address hint.
    pub const FIXED: Self = Self(0b100);
}

flag_set!(
    /// Behavior of [`MemMapping::msync`][crate::mapping::MemMapping::msync].
    MemSync
);

impl MemSync {
    /// Schedule the write-back and return immediately.
    pub const ASYNC: Self = Self(0b1);
    /// Wait for the write-back to complete.
    pub const SYNC: Self = Self(0b10);
    /// Invalidate other mappings of the same file.
    pub const INVALIDATE: Self = Self(0b100);
}
