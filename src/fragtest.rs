//! Fragmentation walkthrough: fill the volume, punch holes, defragment.

use crate::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use tinyfs::TinyFs;

/// The size of the scratch volume in bytes.
const DISK_SIZE: u64 = 20 * 1024;

pub fn main(mut args: ArgsOs) {
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("defragTestDisk"));

    if let Err(e) = TinyFs::mkfs(&path, DISK_SIZE) {
        error(
            "tinyfs",
            format_args!("cannot create the filesystem ({})", e.code()),
        );
    }
    let mut fs = TinyFs::new();
    if let Err(e) = fs.mount(&path) {
        error(
            "tinyfs",
            format_args!("cannot mount the filesystem ({})", e.code()),
        );
    }

    // Nine small files, then two holes in the middle.
    let names = [
        "fileA", "fileB", "fileC", "fileD", "fileE", "fileF", "fileG", "fileH", "fileI",
    ];
    let mut fds = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let fd = fs.open(name).unwrap_or_else(|e| {
            error("tinyfs", format_args!("cannot open `{name}` ({})", e.code()));
        });
        let content = vec![b'A' + i as u8; 20 + 5 * i];
        if let Err(e) = fs.write(fd, &content) {
            error(
                "tinyfs",
                format_args!("cannot write `{name}` ({})", e.code()),
            );
        }
        fds.push(fd);
    }

    println!("\n--- Before deleting ---");
    let _ = fs.display_fragments();

    for fd in [fds[1], fds[2]] {
        if let Err(e) = fs.delete(fd) {
            error("tinyfs", format_args!("cannot delete ({})", e.code()));
        }
    }

    println!("\n--- Before defragmentation ---");
    let _ = fs.display_fragments();

    println!("Running defragmentation...");
    if let Err(e) = fs.defrag() {
        error("tinyfs", format_args!("defragmentation failed ({})", e.code()));
    }
    println!("Defragmentation complete.");

    println!("\n--- After defragmentation ---");
    let _ = fs.display_fragments();

    if let Err(e) = fs.unmount() {
        error("tinyfs", format_args!("cannot unmount ({})", e.code()));
    }
    println!("Filesystem unmounted successfully.");
}
