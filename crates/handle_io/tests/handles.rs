// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(missing_docs, reason = "Tests")]

//! Owned and borrowed handles, pipes and both error policies against the real host.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use handle_io::{Errno, Mode, OpenFlags, Whence, by_value, clear_last_error, last_error, typed};
use tempfile::TempDir;
use testing_aids::{PayloadSource, execute_or_abandon};

// Win32 reports a handle opened without the needed access as access denied.
#[cfg(unix)]
const WRONG_ACCESS: Errno = Errno::EBADF;
#[cfg(windows)]
const WRONG_ACCESS: Errno = Errno::EACCES;

fn scratch() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handle.bin");
    (dir, path)
}

fn read_write(path: &Path) -> typed::File {
    typed::File::open(path, OpenFlags::READ_WRITE | OpenFlags::CREATE, Mode::DEFAULT).unwrap()
}

#[test]
fn write_then_read_back() {
    let (_dir, path) = scratch();
    let payload = PayloadSource::new().next_payload(1000);

    let file = typed::File::creat(&path, Mode::DEFAULT).unwrap();
    assert_eq!(handle_io::transfer::write_all(file.view(), &payload).unwrap(), payload.len());
    drop(file);

    let file = typed::File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mut read_back = vec![0; payload.len() + 10];
    let read = handle_io::transfer::read_all(file.view(), &mut read_back).unwrap();

    assert_eq!(read, payload.len());
    assert_eq!(&read_back[..read], payload);
}

#[test]
fn explicit_close_invalidates() {
    let (_dir, path) = scratch();
    let mut file = read_write(&path);

    file.close().unwrap();

    assert!(!file.is_valid());
    assert_eq!(file.write(b"x").unwrap_err().errno(), Errno::EBADF);
}

#[test]
fn missing_file_is_enoent() {
    let (_dir, path) = scratch();

    let error = typed::File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap_err();
    assert_eq!(error.errno(), Errno::ENOENT);

    clear_last_error();
    let file = by_value::File::open(&path, OpenFlags::READ_ONLY, Mode::DEFAULT);
    assert!(!file.is_valid());
    assert_eq!(last_error(), Errno::ENOENT);
}

#[test]
fn exclusive_create_rejects_existing_file() {
    let (_dir, path) = scratch();
    fs::write(&path, b"present").unwrap();

    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
    let error = typed::File::open(&path, flags, Mode::DEFAULT).unwrap_err();

    assert_eq!(error.errno(), Errno::EEXIST);
}

#[test]
fn writing_read_only_handle_fails_in_both_policies() {
    let (_dir, path) = scratch();
    let flags = OpenFlags::READ_ONLY | OpenFlags::CREATE;

    let file = typed::File::open(&path, flags, Mode::DEFAULT).unwrap();
    let error = file.write(b"x").unwrap_err();
    assert_eq!(error.errno(), WRONG_ACCESS);
    assert_eq!(error.fd(), file.fd());

    clear_last_error();
    let file = by_value::File::open(&path, flags, Mode::DEFAULT);
    assert!(file.is_valid());
    assert_eq!(file.write(b"x"), -1);
    assert_eq!(last_error(), WRONG_ACCESS);
}

#[test]
fn scanning_write_only_handle_fails_in_both_policies() {
    let (_dir, path) = scratch();
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE;
    let one = std::num::NonZeroUsize::MIN;

    let file = typed::File::open(&path, flags, Mode::DEFAULT).unwrap();
    let mut input = typed::InputBuffer::with_capacity(file.view(), one);
    assert_eq!(input.fwd().unwrap_err().errno(), WRONG_ACCESS);

    clear_last_error();
    let file = by_value::File::open(&path, flags, Mode::DEFAULT);
    let mut input = by_value::InputBuffer::with_capacity(file.view(), one);
    assert_eq!(input.fwd(), -1);
    assert_eq!(last_error(), WRONG_ACCESS);
}

#[test]
fn clone_shares_file_position_and_content() {
    let (_dir, path) = scratch();
    let payload = PayloadSource::new().next_payload(100);
    let (first_half, second_half) = payload.split_at(50);

    let original = read_write(&path);
    let duplicate = original.clone();
    assert!(duplicate.is_valid());
    assert_ne!(duplicate.fd(), original.fd());

    assert_eq!(original.lseek(0, Whence::Set).unwrap(), 0);
    assert_eq!(original.write(first_half).unwrap(), 50);
    assert_eq!(duplicate.lseek(50, Whence::Set).unwrap(), 50);
    assert_eq!(duplicate.write(second_half).unwrap(), 50);

    // The position is shared, so the original now sits at the end too.
    assert_eq!(original.lseek(0, Whence::Cur).unwrap(), 100);

    assert_eq!(original.lseek(0, Whence::Set).unwrap(), 0);
    let mut read_back = vec![0; 100];
    assert_eq!(handle_io::transfer::read_all(duplicate.view(), &mut read_back).unwrap(), 100);
    assert_eq!(read_back, payload);
}

#[test]
fn views_operate_without_owning() {
    let (_dir, path) = scratch();
    let file = read_write(&path);

    {
        let mut view = file.view();
        assert_eq!(view.write(b"viewed").unwrap(), 6);
        view.close().unwrap();
        assert!(!view.is_valid());
    }

    assert!(file.is_valid());
    assert_eq!(file.lseek(0, Whence::Set).unwrap(), 0);

    let mut buf = [0; 6];
    assert_eq!(file.view().read(&mut buf).unwrap(), 6);
    assert_eq!(&buf, b"viewed");
}

#[test]
fn ftruncate_keeps_position() {
    let (_dir, path) = scratch();
    let file = read_write(&path);

    assert_eq!(file.write(&[7; 64]).unwrap(), 64);
    file.ftruncate(10).unwrap();

    assert_eq!(file.lseek(0, Whence::Cur).unwrap(), 64);
    assert_eq!(file.lseek(0, Whence::End).unwrap(), 10);

    file.ftruncate(4096).unwrap();
    file.fsync().unwrap();
    file.fdatasync().unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
}

#[test]
fn seek_past_start_is_einval() {
    let (_dir, path) = scratch();
    let file = read_write(&path);

    assert_eq!(file.lseek(-1, Whence::Set).unwrap_err().errno(), Errno::EINVAL);
}

#[test]
fn openat_resolves_relative_to_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("inner.txt"), b"relative").unwrap();

    let directory = typed::File::open(dir.path(), OpenFlags::READ_ONLY, Mode::DEFAULT);

    // Win32 cannot open a directory without backup semantics, which the portable flags lack.
    #[cfg(windows)]
    let Ok(directory) = directory else {
        return;
    };
    #[cfg(unix)]
    let directory = directory.unwrap();

    let file = typed::File::openat(directory.view(), "inner.txt", OpenFlags::READ_ONLY, Mode::DEFAULT).unwrap();
    let mut buf = [0; 8];

    assert_eq!(file.read(&mut buf).unwrap(), 8);
    assert_eq!(&buf, b"relative");
}

#[test]
fn pipe_carries_bytes() {
    let received = execute_or_abandon(|| {
        let pipe = typed::Pipe::create().unwrap();
        assert!(pipe.is_valid());

        assert_eq!(pipe.write(b"hello").unwrap(), 5);

        let mut buf = [0; 5];
        let read = handle_io::transfer::read_all(pipe.rd.view(), &mut buf).unwrap();
        (read, buf)
    })
    .expect("pipe transfer timed out");

    assert_eq!(received, (5, *b"hello"));
}

#[test]
fn pipe_reports_end_of_data_after_writer_closes() {
    let received = execute_or_abandon(|| {
        let mut pipe = typed::Pipe::create().unwrap();
        pipe.write(b"bye").unwrap();
        pipe.wr.close().unwrap();

        let mut buf = [0; 16];
        handle_io::transfer::read_all(pipe.rd.view(), &mut buf).unwrap()
    })
    .expect("pipe transfer timed out");

    assert_eq!(received, 3);
}

#[test]
fn std_io_traits_on_files() {
    let (_dir, path) = scratch();
    let mut file = read_write(&path);

    file.write_all(b"0123456789").unwrap();
    assert_eq!(file.seek(SeekFrom::Start(4)).unwrap(), 4);

    let mut rest = String::new();
    file.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "456789");

    let error = file.seek(SeekFrom::Current(-100)).unwrap_err();
    assert_eq!(error.kind(), std::io::ErrorKind::InvalidInput);
}

#[cfg(unix)]
#[test]
fn dup2_replaces_target_handle() {
    let (_dir, path) = scratch();
    let source = read_write(&path);
    let mut target = read_write(&path.with_extension("other"));

    let target_fd = target.disown();
    let replaced = source.dup2(target_fd).unwrap();

    assert_eq!(replaced.fd(), target_fd);
    assert_eq!(replaced.write(b"via dup2").unwrap(), 8);
    drop(replaced);

    assert_eq!(fs::read(&path).unwrap(), b"via dup2");
}

#[cfg(unix)]
#[test]
fn owned_fd_round_trip() {
    use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd};

    let (_dir, path) = scratch();
    let std_file = fs::File::create(&path).unwrap();
    let raw = std_file.as_raw_fd();

    let file = typed::File::from(OwnedFd::from(std_file));
    assert_eq!(file.as_raw_fd(), raw);
    assert_eq!(file.write(b"owned").unwrap(), 5);

    let raw_again = file.into_raw_fd();
    assert_eq!(raw_again, raw);

    // SAFETY: The descriptor was just released by the `File` and nothing else owns it.
    drop(unsafe { <fs::File as std::os::fd::FromRawFd>::from_raw_fd(raw_again) });
    assert_eq!(fs::read(&path).unwrap(), b"owned");
}
