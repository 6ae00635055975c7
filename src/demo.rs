//! Walkthrough of the TinyFS operations, including the failure cases.

use crate::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use tinyfs::Error;
use tinyfs::TinyFs;

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[1;33m";
const BLUE: &str = "\x1b[1;34m";
const MAGENTA: &str = "\x1b[1;35m";
const CYAN: &str = "\x1b[1;36m";
const RESET: &str = "\x1b[0m";

/// The size of the demo volume in bytes.
const DISK_SIZE: u64 = 10 * 1024;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// The path of the disk image to work on.
    disk_path: Option<PathBuf>,
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        res.disk_path = Some(PathBuf::from(arg));
    }
    res
}

/// Prints the outcome of one operation.
fn status(operation: &str, result: &Result<(), Error>) {
    match result {
        Ok(()) => println!("{GREEN}[SUCCESS]{RESET} {operation}"),
        Err(e) => println!("{RED}[ERROR {}]{RESET} {operation}", e.code()),
    }
}

/// Prints the outcome of one operation and aborts the demo on failure.
fn require(operation: &str, result: Result<(), Error>) {
    status(operation, &result);
    if result.is_err() {
        error("tinyfs", format_args!("{operation} failed"));
    }
}

/// Prints the outcome of an operation expected to fail.
fn expect_failure(operation: &str, result: Result<(), Error>) {
    match result {
        Ok(()) => println!("{RED}unexpectedly succeeded: {operation}{RESET}"),
        Err(e) => println!("{GREEN}correctly failed ({}): {operation}{RESET}", e.code()),
    }
}

pub fn main(args: ArgsOs) {
    let args = parse_args(args);
    let path = args.disk_path.unwrap_or_else(|| PathBuf::from("tinyFSDisk"));

    println!("{BLUE}Starting TinyFS operations demo...{RESET}");

    println!(
        "{YELLOW}\n[Basic demo] Creating a filesystem on `{}` ({DISK_SIZE} bytes)...{RESET}",
        path.display()
    );
    require("creating the filesystem", TinyFs::mkfs(&path, DISK_SIZE));

    let mut fs = TinyFs::new();
    println!("{YELLOW}\nMounting the filesystem...{RESET}");
    require("mounting the filesystem", fs.mount(&path));

    println!("{YELLOW}\nOpening file `testfile`...{RESET}");
    let fd = fs.open("testfile").unwrap_or_else(|e| {
        status("opening `testfile`", &Err(e));
        error("tinyfs", "cannot continue without the demo file");
    });
    status("opening `testfile`", &Ok(()));

    let data = b"Hello, TinyFS!";
    println!("{YELLOW}\nWriting to `testfile`: \"Hello, TinyFS!\"{RESET}");
    require("writing `testfile`", fs.write(fd, data));

    println!("{YELLOW}\nFile info for `testfile`:{RESET}");
    match fs.read_file_info(fd) {
        Ok(info) => {
            println!("  Name: {}", info.name);
            println!("  Size: {} bytes", info.size);
            println!("  Created: {}", info.ctime);
            println!("  Modified: {}", info.mtime);
            println!("  Last accessed: {}", info.atime);
            println!("  Read-only: {}", if info.read_only { "Yes" } else { "No" });
        }
        Err(e) => status("reading file info", &Err(e)),
    }

    println!("{YELLOW}\nOverwriting byte 7 of `testfile` with `X`...{RESET}");
    require("overwriting one byte", fs.write_byte(fd, 7, b'X'));

    println!("{YELLOW}\nReading `testfile` byte by byte:{RESET}");
    require("seeking to the beginning", fs.seek(fd, 0));
    let mut content = Vec::new();
    for _ in 0..data.len() {
        match fs.read_byte(fd) {
            Ok(byte) => content.push(byte),
            Err(e) => {
                status("reading one byte", &Err(e));
                break;
            }
        }
    }
    println!("{}", String::from_utf8_lossy(&content));

    println!("{YELLOW}\nRenaming `testfile` to `newname`...{RESET}");
    status("renaming the file", &fs.rename(fd, "newname"));

    println!("{YELLOW}\nDirectory listing:{RESET}");
    match fs.readdir() {
        Ok(entries) if entries.is_empty() => println!("  (no files found)"),
        Ok(entries) => {
            for entry in entries {
                println!("  {entry}");
            }
        }
        Err(e) => status("listing the directory", &Err(e)),
    }

    println!("{YELLOW}\nWrite-protecting `newname`...{RESET}");
    status("write-protecting the file", &fs.make_ro("newname"));

    println!("{YELLOW}\nWriting to the read-only `newname` (should fail)...{RESET}");
    expect_failure("writing a read-only file", fs.write(fd, b"Another text"));

    println!("{YELLOW}\nLifting the write protection of `newname`...{RESET}");
    status("lifting the protection", &fs.make_rw("newname"));

    println!("{YELLOW}\nWriting new content to `newname`...{RESET}");
    status("writing new content", &fs.write(fd, b"New Content"));

    println!("{YELLOW}\nUnmounting the filesystem...{RESET}");
    require("unmounting the filesystem", fs.unmount());

    println!("{MAGENTA}\nTinyFS basic demo completed successfully!{RESET}");

    println!("{CYAN}\n============================================{RESET}");
    println!("{CYAN}            EDGE CASE TESTS{RESET}");
    println!("{CYAN}============================================{RESET}");

    println!("{YELLOW}\n[1] Filesystem size not a multiple of the block size{RESET}");
    expect_failure(
        "mkfs with 257 bytes",
        TinyFs::mkfs(&PathBuf::from("edge_nonmultiple.bin"), 257),
    );

    println!("{YELLOW}\n[2] Filesystem of size zero{RESET}");
    expect_failure(
        "mkfs with 0 bytes",
        TinyFs::mkfs(&PathBuf::from("edge_zero.bin"), 0),
    );

    println!("{YELLOW}\n[3] Opening a file with a name over 8 bytes{RESET}");
    expect_failure(
        "opening `TooLongFileName`",
        fs.open("TooLongFileName").map(|_| ()),
    );

    println!("{YELLOW}\n[Setup] Remounting `{}`...{RESET}", path.display());
    require("remounting the filesystem", fs.mount(&path));

    println!("{YELLOW}\n[4] Writing to a closed file{RESET}");
    match fs.open("tempfile") {
        Ok(fd) => {
            status("closing `tempfile`", &fs.close(fd));
            expect_failure("writing a closed descriptor", fs.write(fd, b"Data"));
        }
        Err(e) => status("opening `tempfile`", &Err(e)),
    }

    println!("{YELLOW}\n[5] Seeking beyond the end of a file{RESET}");
    match fs.open("seekTest") {
        Ok(fd) => {
            status("writing `seekTest`", &fs.write(fd, b"Short"));
            expect_failure("seeking to offset 1000", fs.seek(fd, 1000));
        }
        Err(e) => status("opening `seekTest`", &Err(e)),
    }

    println!("{YELLOW}\n[6] Overwriting a byte out of range{RESET}");
    match fs.open("byteTest") {
        Ok(fd) => {
            status("writing `byteTest`", &fs.write(fd, b"12345"));
            expect_failure(
                "overwriting byte 5 of a 5-byte file",
                fs.write_byte(fd, 5, b'Z'),
            );
        }
        Err(e) => status("opening `byteTest`", &Err(e)),
    }

    println!("{YELLOW}\n[7] Mounting a missing image{RESET}");
    let mut other = TinyFs::new();
    expect_failure(
        "mounting `nonexistent.bin`",
        other.mount(&PathBuf::from("nonexistent.bin")),
    );

    println!("{YELLOW}\n[8] Unmounting twice{RESET}");
    status("first unmount", &fs.unmount());
    expect_failure("second unmount", fs.unmount());

    println!("{MAGENTA}\nTinyFS demo completed. Goodbye!{RESET}");
}
