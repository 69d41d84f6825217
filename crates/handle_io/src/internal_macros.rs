// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Creates a `NonZero` value from a constant expression, failing the build if it is zero.
macro_rules! nz {
    ($x:expr) => {
        const { ::std::num::NonZero::new($x).expect("constant must have non-zero value") }
    };
}

/// Declares the set of type aliases that bind every public type to one error policy.
macro_rules! policy_aliases {
    ($policy:ty) => {
        /// An owned handle. See [`file::File`][crate::file::File].
        pub type File = crate::file::File<$policy>;

        /// A borrowed handle. See [`view::FileView`][crate::view::FileView].
        pub type FileView<'a> = crate::view::FileView<'a, $policy>;

        /// An anonymous pipe. See [`pipe::Pipe`][crate::pipe::Pipe].
        pub type Pipe = crate::pipe::Pipe<$policy>;

        /// A memory mapping. See [`mapping::MemMapping`][crate::mapping::MemMapping].
        pub type MemMapping = crate::mapping::MemMapping<$policy>;

        /// A read buffer with heap storage. See [`buffer::InputBuffer`][crate::buffer::InputBuffer].
        pub type InputBuffer<'a> = crate::buffer::InputBuffer<'a, Box<[u8]>, $policy>;

        /// A read buffer with `N` bytes of inline storage.
        pub type ArrayInputBuffer<'a, const N: usize = { crate::buffer::DEFAULT_CAPACITY }> =
            crate::buffer::InputBuffer<'a, [u8; N], $policy>;

        /// A write buffer with heap storage. See [`buffer::OutputBuffer`][crate::buffer::OutputBuffer].
        pub type OutputBuffer<'a> = crate::buffer::OutputBuffer<'a, Box<[u8]>, $policy>;

        /// A write buffer with `N` bytes of inline storage.
        pub type ArrayOutputBuffer<'a, const N: usize = { crate::buffer::DEFAULT_CAPACITY }> =
            crate::buffer::OutputBuffer<'a, [u8; N], $policy>;
    };
}

pub(crate) use {nz, policy_aliases};
