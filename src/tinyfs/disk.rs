//! Block-level access to a filesystem image backed by a host file.
//!
//! The backing store is usually a regular file, but a block device node
//! works too: its length is then queried with the `BLKGETSIZE64` ioctl.

use crate::block::BLOCK_SIZE;
use crate::block::Block;
use libc::ioctl;
use std::ffi::c_long;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use thiserror::Error;

/// ioctl macro: Command.
macro_rules! ioc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        (($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
    };
}

/// ioctl macro: Read command.
macro_rules! ior {
    ($a:expr, $b:expr, $c:ty) => {
        ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
    };
}

/// ioctl command: Get size of a block device in bytes.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);

/// An error from the block device.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The backing store could not be accessed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A block index or device size outside the valid range.
    #[error("invalid argument")]
    InvalidArgument,
}

impl DiskError {
    /// Returns the legacy numeric code of the error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => -1,
            Self::InvalidArgument => -2,
        }
    }
}

/// A virtual disk of [`BLOCK_SIZE`]-byte blocks backed by a host file.
///
/// The value is the device handle; dropping it closes the backing file.
#[derive(Debug)]
pub struct Disk {
    /// The backing file.
    file: File,
    /// The size of the device in bytes, a multiple of the block size.
    size: u64,
}

impl Disk {
    /// Opens a virtual disk at `path`.
    ///
    /// If `size` is zero, the existing backing store is opened read/write
    /// and its current length is taken; the length must be a positive
    /// multiple of the block size. Otherwise the file is created or
    /// truncated to the largest multiple of the block size not above
    /// `size`, zero-filled; `size` must be at least one block.
    pub fn open(path: &Path, size: u64) -> Result<Self, DiskError> {
        if size == 0 {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            let size = backing_len(&file)?;
            if size < BLOCK_SIZE as u64 || size % BLOCK_SIZE as u64 != 0 {
                return Err(DiskError::InvalidArgument);
            }
            return Ok(Self { file, size });
        }
        if size < BLOCK_SIZE as u64 {
            return Err(DiskError::InvalidArgument);
        }
        let size = size - size % BLOCK_SIZE as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self { file, size })
    }

    /// Returns the number of blocks on the device.
    pub fn block_count(&self) -> u32 {
        (self.size / BLOCK_SIZE as u64) as u32
    }

    /// Reads the block at `index` into `block`.
    pub fn read_block(&mut self, index: u32, block: &mut Block) -> Result<(), DiskError> {
        let off = self.block_offset(index)?;
        self.file.seek(SeekFrom::Start(off))?;
        self.file.read_exact(block.as_bytes_mut())?;
        Ok(())
    }

    /// Writes `block` at `index`.
    ///
    /// The write has reached the backing store when the call returns.
    pub fn write_block(&mut self, index: u32, block: &Block) -> Result<(), DiskError> {
        let off = self.block_offset(index)?;
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(block.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn block_offset(&self, index: u32) -> Result<u64, DiskError> {
        let off = index as u64 * BLOCK_SIZE as u64;
        if off + BLOCK_SIZE as u64 > self.size {
            return Err(DiskError::InvalidArgument);
        }
        Ok(off)
    }
}

/// Returns the length in bytes of the backing store behind `file`.
///
/// Regular files report their metadata length; block and character device
/// nodes are queried with the `BLKGETSIZE64` ioctl.
fn backing_len(file: &File) -> io::Result<u64> {
    let metadata = file.metadata()?;
    let file_type = metadata.file_type();
    if file_type.is_block_device() || file_type.is_char_device() {
        let mut size: u64 = 0;
        let ret = unsafe { ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size)
    } else {
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;
    use std::process;

    fn scratch(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("tinyfs-disk-{}-{name}", process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn create_rounds_down_to_block_size() {
        let path = scratch("round");
        let disk = Disk::open(&path, 1000).unwrap();
        assert_eq!(disk.block_count(), 3);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 768);
    }

    #[test]
    fn create_rejects_undersized() {
        let path = scratch("small");
        assert_eq!(Disk::open(&path, 255).unwrap_err().code(), -2);
    }

    #[test]
    fn blocks_round_trip() {
        let path = scratch("rw");
        let mut disk = Disk::open(&path, 1024).unwrap();

        let mut block = Block::zeroed();
        block.as_bytes_mut()[0] = 0xab;
        block.as_bytes_mut()[BLOCK_SIZE - 1] = 0xcd;
        disk.write_block(2, &block).unwrap();

        let mut read = Block::zeroed();
        disk.read_block(2, &mut read).unwrap();
        assert_eq!(read.as_bytes(), block.as_bytes());

        // Untouched blocks come back zeroed.
        disk.read_block(1, &mut read).unwrap();
        assert!(read.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_range_blocks_rejected() {
        let path = scratch("range");
        let mut disk = Disk::open(&path, 1024).unwrap();
        let mut block = Block::zeroed();
        assert_eq!(disk.read_block(4, &mut block).unwrap_err().code(), -2);
        assert_eq!(disk.write_block(4, &block).unwrap_err().code(), -2);
        assert!(disk.read_block(3, &mut block).is_ok());
    }

    #[test]
    fn open_existing_takes_current_length() {
        let path = scratch("existing");
        {
            let mut disk = Disk::open(&path, 2048).unwrap();
            let mut block = Block::zeroed();
            block.as_bytes_mut()[3] = 7;
            disk.write_block(5, &block).unwrap();
        }
        let mut disk = Disk::open(&path, 0).unwrap();
        assert_eq!(disk.block_count(), 8);
        let mut block = Block::zeroed();
        disk.read_block(5, &mut block).unwrap();
        assert_eq!(block.as_bytes()[3], 7);
    }

    #[test]
    fn open_existing_rejects_bad_lengths() {
        let path = scratch("badlen");
        std::fs::write(&path, vec![0; 300]).unwrap();
        assert_eq!(Disk::open(&path, 0).unwrap_err().code(), -2);

        let missing = scratch("missing");
        assert_eq!(Disk::open(&missing, 0).unwrap_err().code(), -1);
    }
}
