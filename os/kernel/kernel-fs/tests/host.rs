#![cfg(feature = "host")]

use kernel_fs::{FileSystem, HostFileSystem};
use std::path::PathBuf;
use std::{env, fs, process};

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("kernel-fs-{tag}-{}", process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn round_trips_through_the_host() {
    let dir = scratch_dir("roundtrip");
    let hfs = HostFileSystem::new(&dir);

    let mut f = hfs.open("swap", true).unwrap();
    assert_eq!(f.write_at(8, b"page"), 4);
    assert_eq!(f.length(), 12);

    let mut buf = [0u8; 4];
    assert_eq!(f.read_at(8, &mut buf), 4);
    assert_eq!(&buf, b"page");
    f.close();
    assert_eq!(f.read_at(8, &mut buf), 0);

    assert!(hfs.remove("swap"));
    assert!(hfs.open("swap", false).is_none());
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn rejects_names_outside_the_root() {
    let dir = scratch_dir("escape");
    let hfs = HostFileSystem::new(&dir);
    assert!(hfs.open("../escape", true).is_none());
    assert!(hfs.open("", true).is_none());
    assert!(!hfs.remove(".."));
    fs::remove_dir_all(dir).unwrap();
}
