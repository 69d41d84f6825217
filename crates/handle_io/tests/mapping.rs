// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(missing_docs, reason = "Tests")]

//! Memory mappings of real files.

use std::fs;

use handle_io::typed::File;
use handle_io::{MemMapFlags, MemProt, MemSync, Mode, OpenFlags};
use tempfile::TempDir;
use testing_aids::PayloadSource;

const PAYLOAD_SIZE: usize = 8192;

#[test]
fn shared_mapping_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mapped.bin");
    let payload = PayloadSource::with_seed(3).next_payload(PAYLOAD_SIZE);

    {
        let flags = OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        let file = File::open(&path, flags, Mode::DEFAULT).unwrap();
        file.ftruncate(PAYLOAD_SIZE as u64).unwrap();

        let mut mapping = file.mmap(PAYLOAD_SIZE, MemProt::READ | MemProt::WRITE, MemMapFlags::SHARED).unwrap();
        assert_eq!(mapping.size(), PAYLOAD_SIZE);
        assert!(!mapping.get::<u8>().is_null());

        // SAFETY: The mapping is writable and nothing else touches the file meanwhile.
        unsafe { mapping.as_mut_slice() }.copy_from_slice(&payload);
        mapping.msync(MemSync::SYNC).unwrap();
    }

    let file = File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mapping = file.mmap(PAYLOAD_SIZE, MemProt::READ, MemMapFlags::SHARED).unwrap();

    // SAFETY: The mapping is readable and nothing writes to the file meanwhile.
    assert_eq!(unsafe { mapping.as_slice() }, payload.as_slice());
    assert_eq!(fs::read(&path).unwrap(), payload);
}

#[test]
fn mapping_outlives_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outlive.bin");
    fs::write(&path, b"still mapped").unwrap();

    let file = File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mapping = file.mmap(12, MemProt::READ, MemMapFlags::PRIVATE).unwrap();
    drop(file);

    // SAFETY: The mapping is private and read-only.
    assert_eq!(unsafe { mapping.as_slice() }, b"still mapped");
}

#[test]
fn explicit_unmap_empties_mapping() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unmap.bin");
    fs::write(&path, [1_u8; 4096]).unwrap();

    let file = File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mut mapping = file.mmap(4096, MemProt::READ, MemMapFlags::SHARED).unwrap();

    mapping.munmap().unwrap();

    assert!(mapping.is_empty());
    assert!(mapping.get::<u8>().is_null());
    mapping.munmap().unwrap();
}

#[test]
fn zero_length_mapping_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.bin");
    fs::write(&path, b"").unwrap();

    let file = File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mapping = file.mmap(0, MemProt::READ, MemMapFlags::SHARED).unwrap();

    assert!(mapping.is_empty());
    assert_eq!(mapping.size(), 0);
}

#[cfg(unix)]
#[test]
fn mapping_without_sharing_mode_is_einval() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flags.bin");
    fs::write(&path, [0_u8; 16]).unwrap();

    let file = File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let error = file.mmap(16, MemProt::READ, MemMapFlags::NONE).unwrap_err();

    assert_eq!(error.errno(), handle_io::Errno::EINVAL);
}
