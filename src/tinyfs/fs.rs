//! The filesystem proper: mount state, free-list allocator, inodes, extent
//! chains, the open-file table and the public operations.

use crate::block::BLOCK_SIZE;
use crate::block::Block;
use crate::block::BlockKind;
use crate::block::NAME_LEN;
use crate::block::PAYLOAD_SIZE;
use crate::disk::Disk;
use crate::disk::DiskError;
use crate::error::Error;
use rand_core::OsRng;
use rand_core::RngCore;
use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// The maximum number of simultaneously open files.
pub const MAX_OPEN_FILES: usize = 20;

/// Returns the current wall-clock time in seconds since the Unix epoch.
fn timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as u32
}

/// Pads a filename to the fixed on-disk field.
///
/// Returns `None` if the name does not fit.
fn pad_name(name: &str) -> Option<[u8; NAME_LEN]> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_LEN {
        return None;
    }
    let mut padded = [0; NAME_LEN];
    padded[..bytes.len()].copy_from_slice(bytes);
    Some(padded)
}

/// Restores a display name from the padded on-disk field.
pub(crate) fn unpad_name(field: &[u8; NAME_LEN]) -> String {
    let len = field.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&field[..len]).into_owned()
}

/// One slot of the open-file table.
///
/// A file descriptor is the index of its slot; the `used` flag is
/// authoritative, a cleared slot rejects every operation even if the same
/// integer is presented again.
#[derive(Clone, Copy, Default)]
struct OpenFile {
    /// Whether the slot currently backs a descriptor.
    used: bool,
    /// The block holding the file's inode.
    inode_block: u32,
    /// The current byte offset into the file.
    offset: u32,
}

/// A cached view of one inode.
///
/// Derived from the disk and rebuilt on mount; the fragmentation map is
/// colored from it and the defragmenter remaps it. The on-disk inode stays
/// authoritative.
#[derive(Clone)]
pub(crate) struct InodeMeta {
    /// The padded filename.
    pub(crate) name: [u8; NAME_LEN],
    /// The block holding the inode.
    pub(crate) inode_block: u32,
    /// The file's first data block, 0 if none.
    pub(crate) first_data: u32,
    /// The advisory display color.
    pub(crate) color: [u8; 3],
}

/// The metadata of one file, as reported by [`TinyFs::readdir`] and
/// [`TinyFs::read_file_info`].
#[derive(Clone, Debug)]
pub struct FileInfo {
    /// The file's name.
    pub name: String,
    /// The file's size in bytes.
    pub size: u32,
    /// Creation time, in seconds since the Unix epoch.
    pub ctime: u32,
    /// Last content modification, same clock.
    pub mtime: u32,
    /// Last access, same clock.
    pub atime: u32,
    /// Whether the file is write-protected.
    pub read_only: bool,
}

impl FileInfo {
    fn from_inode(inode: &Block) -> Self {
        Self {
            name: unpad_name(&inode.name()),
            size: inode.size(),
            ctime: inode.ctime(),
            mtime: inode.mtime(),
            atime: inode.atime(),
            read_only: inode.read_only(),
        }
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "Name: {}, Size: {} bytes, Read-Only: {}",
            self.name,
            self.size,
            if self.read_only { "Yes" } else { "No" }
        )
    }
}

/// A TinyFS instance.
///
/// The value owns the whole state machine: nothing is mounted initially,
/// [`TinyFs::mount`] attaches a device and [`TinyFs::unmount`] detaches it,
/// dropping every open descriptor.
#[derive(Default)]
pub struct TinyFs {
    /// The mounted filesystem, if any.
    pub(crate) mounted: Option<Mounted>,
}

/// The state owned while a filesystem is mounted.
pub(crate) struct Mounted {
    /// The block device.
    pub(crate) disk: Disk,
    /// The total block count, as recorded in the superblock.
    pub(crate) total_blocks: u32,
    /// The open-file table.
    open_files: [OpenFile; MAX_OPEN_FILES],
    /// The inode metadata cache.
    pub(crate) inodes: Vec<InodeMeta>,
}

impl TinyFs {
    /// Creates an instance with nothing mounted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats a TinyFS image of `size` bytes at `path`.
    ///
    /// `size` must be a positive multiple of the block size. Block 0
    /// becomes the superblock and every other block is chained into the
    /// free list. The device is closed once formatted; mounting is a
    /// separate step.
    pub fn mkfs(path: &Path, size: u64) -> Result<(), Error> {
        if size == 0 || size % BLOCK_SIZE as u64 != 0 {
            return Err(Error::Mkfs);
        }
        let mut disk = Disk::open(path, size).map_err(|_| Error::Mkfs)?;
        let total_blocks = disk.block_count();

        let mut superblock = Block::new(BlockKind::Superblock);
        superblock.set_first_free(if total_blocks > 1 { 1 } else { 0 });
        superblock.set_total_blocks(total_blocks);
        disk.write_block(0, &superblock).map_err(|_| Error::Mkfs)?;

        for i in 1..total_blocks {
            let mut free = Block::new(BlockKind::Free);
            free.set_next(if i == total_blocks - 1 { 0 } else { i + 1 });
            disk.write_block(i, &free).map_err(|_| Error::Mkfs)?;
        }
        Ok(())
    }

    /// Mounts the TinyFS image at `path`.
    ///
    /// Fails if something is already mounted or if block 0 is not a valid
    /// superblock. The inode metadata cache is rebuilt by scanning the
    /// device.
    pub fn mount(&mut self, path: &Path) -> Result<(), Error> {
        if self.mounted.is_some() {
            return Err(Error::Mount);
        }
        let mut disk = Disk::open(path, 0).map_err(|_| Error::Mount)?;
        let mut superblock = Block::zeroed();
        disk.read_block(0, &mut superblock).map_err(|_| Error::Mount)?;
        if superblock.kind() != Some(BlockKind::Superblock) || !superblock.has_magic() {
            return Err(Error::Mount);
        }

        let mut mounted = Mounted {
            disk,
            total_blocks: superblock.total_blocks(),
            open_files: [OpenFile::default(); MAX_OPEN_FILES],
            inodes: Vec::new(),
        };
        mounted.rebuild_inode_cache().map_err(|_| Error::Mount)?;
        self.mounted = Some(mounted);
        Ok(())
    }

    /// Unmounts the filesystem, closing the device and dropping every open
    /// descriptor.
    pub fn unmount(&mut self) -> Result<(), Error> {
        self.mounted.take().map(|_| ()).ok_or(Error::Unmount)
    }

    /// Opens the file `name`, creating it if absent, and returns its
    /// descriptor.
    ///
    /// Names longer than the on-disk field are rejected.
    pub fn open(&mut self, name: &str) -> Result<usize, Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Open)?;
        let padded = pad_name(name).ok_or(Error::Open)?;
        let inode_block = match fs.find_inode(&padded) {
            Some(block) => block,
            None => fs
                .create_inode(&padded)
                .map_err(|_| Error::Open)?
                .ok_or(Error::Open)?,
        };
        let slot = fs
            .open_files
            .iter()
            .position(|f| !f.used)
            .ok_or(Error::Open)?;
        fs.open_files[slot] = OpenFile {
            used: true,
            inode_block,
            offset: 0,
        };
        Ok(slot)
    }

    /// Closes the descriptor `fd`.
    pub fn close(&mut self, fd: usize) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Close)?;
        let slot = fs.slot_mut(fd).ok_or(Error::Close)?;
        *slot = OpenFile::default();
        Ok(())
    }

    /// Replaces the whole content of the file behind `fd` with `buf`.
    ///
    /// The new chain must fit in the current free list, counted before the
    /// old chain is released. On success the file pointer is reset to 0.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Write)?;
        let inode_block = fs.slot(fd).ok_or(Error::Write)?.inode_block;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Write)?;
        if inode.read_only() {
            return Err(Error::Write);
        }
        let size = u32::try_from(buf.len()).map_err(|_| Error::Write)?;

        if size == 0 {
            fs.truncate_chain(inode.first_data())
                .map_err(|_| Error::Write)?;
            inode.set_size(0);
            inode.set_first_data(0);
            inode.set_mtime(timestamp());
            fs.disk
                .write_block(inode_block, &inode)
                .map_err(|_| Error::Write)?;
            fs.set_cached_first_data(inode_block, 0);
            fs.open_files[fd].offset = 0;
            return Ok(());
        }

        let need = size.div_ceil(PAYLOAD_SIZE as u32);
        if fs.free_count().map_err(|_| Error::Write)? < need {
            return Err(Error::Write);
        }
        fs.truncate_chain(inode.first_data())
            .map_err(|_| Error::Write)?;
        let head = fs
            .write_chain(buf)
            .map_err(|_| Error::Write)?
            .ok_or(Error::Write)?;

        inode.set_size(size);
        inode.set_first_data(head);
        inode.set_mtime(timestamp());
        fs.disk
            .write_block(inode_block, &inode)
            .map_err(|_| Error::Write)?;
        fs.set_cached_first_data(inode_block, head);
        fs.open_files[fd].offset = 0;
        Ok(())
    }

    /// Reads the byte at the current file pointer and advances it.
    ///
    /// Fails once the pointer reaches the end of the file.
    pub fn read_byte(&mut self, fd: usize) -> Result<u8, Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Read)?;
        let file = fs.slot(fd).ok_or(Error::Read)?;
        let (inode_block, offset) = (file.inode_block, file.offset);

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Read)?;
        if offset >= inode.size() {
            return Err(Error::Read);
        }

        let byte = fs
            .chain_byte(inode.first_data(), offset)
            .map_err(|_| Error::Read)?;
        fs.open_files[fd].offset += 1;

        inode.set_atime(timestamp());
        let _ = fs.disk.write_block(inode_block, &inode);
        Ok(byte)
    }

    /// Moves the file pointer of `fd` to `offset`.
    ///
    /// Any position from 0 to the file size inclusive is valid; reading at
    /// the size itself then fails.
    pub fn seek(&mut self, fd: usize, offset: u32) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Seek)?;
        let inode_block = fs.slot(fd).ok_or(Error::Seek)?.inode_block;
        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Seek)?;
        if offset > inode.size() {
            return Err(Error::Seek);
        }
        fs.open_files[fd].offset = offset;
        Ok(())
    }

    /// Overwrites the byte at `offset` in place.
    ///
    /// The offset must fall inside the current file content; the in-place
    /// write never grows the file.
    pub fn write_byte(&mut self, fd: usize, offset: u32, byte: u8) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Write)?;
        let inode_block = fs.slot(fd).ok_or(Error::Write)?.inode_block;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Write)?;
        if inode.read_only() || offset >= inode.size() {
            return Err(Error::Write);
        }

        let (block, within) = fs
            .chain_seek(inode.first_data(), offset)
            .map_err(|_| Error::Write)?;
        let mut data = Block::zeroed();
        fs.disk.read_block(block, &mut data).map_err(|_| Error::Write)?;
        data.payload_mut()[within] = byte;
        fs.disk.write_block(block, &data).map_err(|_| Error::Write)?;

        inode.set_mtime(timestamp());
        fs.disk
            .write_block(inode_block, &inode)
            .map_err(|_| Error::Write)?;
        Ok(())
    }

    /// Deletes the file behind `fd`, releasing its inode and data chain and
    /// closing the descriptor.
    pub fn delete(&mut self, fd: usize) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Delete)?;
        let inode_block = fs.slot(fd).ok_or(Error::Delete)?.inode_block;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Delete)?;
        if inode.read_only() {
            return Err(Error::Delete);
        }

        fs.truncate_chain(inode.first_data())
            .map_err(|_| Error::Delete)?;
        fs.destroy_inode(inode_block).map_err(|_| Error::Delete)?;
        fs.open_files[fd] = OpenFile::default();
        Ok(())
    }

    /// Renames the file behind `fd`.
    ///
    /// The new name obeys the same length limit as [`TinyFs::open`].
    pub fn rename(&mut self, fd: usize, new_name: &str) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Rename)?;
        let padded = pad_name(new_name).ok_or(Error::Rename)?;
        let inode_block = fs.slot(fd).ok_or(Error::Rename)?.inode_block;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::Rename)?;
        inode.set_name(&padded);
        inode.set_mtime(timestamp());
        fs.disk
            .write_block(inode_block, &inode)
            .map_err(|_| Error::Rename)?;

        if let Some(meta) = fs.inodes.iter_mut().find(|m| m.inode_block == inode_block) {
            meta.name = padded;
        }
        Ok(())
    }

    /// Write-protects the file `name`.
    pub fn make_ro(&mut self, name: &str) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::MakeRo)?;
        let padded = pad_name(name).ok_or(Error::MakeRo)?;
        let inode_block = fs.find_inode(&padded).ok_or(Error::MakeRo)?;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::MakeRo)?;
        inode.set_read_only(true);
        fs.disk
            .write_block(inode_block, &inode)
            .map_err(|_| Error::MakeRo)?;
        Ok(())
    }

    /// Lifts the write protection of the file `name`.
    pub fn make_rw(&mut self, name: &str) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::MakeRw)?;
        let padded = pad_name(name).ok_or(Error::MakeRw)?;
        let inode_block = fs.find_inode(&padded).ok_or(Error::MakeRw)?;

        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::MakeRw)?;
        inode.set_read_only(false);
        fs.disk
            .write_block(inode_block, &inode)
            .map_err(|_| Error::MakeRw)?;
        Ok(())
    }

    /// Lists every file on the volume, in block order.
    pub fn readdir(&mut self) -> Result<Vec<FileInfo>, Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Readdir)?;
        let mut entries = Vec::new();
        let mut block = Block::zeroed();
        for i in 1..fs.total_blocks {
            if fs.disk.read_block(i, &mut block).is_err() {
                continue;
            }
            if block.kind() == Some(BlockKind::Inode) && block.has_magic() {
                entries.push(FileInfo::from_inode(&block));
            }
        }
        Ok(entries)
    }

    /// Returns the metadata of the file behind `fd`.
    pub fn read_file_info(&mut self, fd: usize) -> Result<FileInfo, Error> {
        let fs = self.mounted.as_mut().ok_or(Error::ReadInfo)?;
        let inode_block = fs.slot(fd).ok_or(Error::ReadInfo)?.inode_block;
        let mut inode = Block::zeroed();
        fs.disk
            .read_block(inode_block, &mut inode)
            .map_err(|_| Error::ReadInfo)?;
        Ok(FileInfo::from_inode(&inode))
    }
}

impl Mounted {
    /// Returns the open-file entry behind a descriptor, if valid and in
    /// use.
    fn slot(&self, fd: usize) -> Option<&OpenFile> {
        self.open_files.get(fd).filter(|f| f.used)
    }

    /// Same as [`Mounted::slot`], mutably.
    fn slot_mut(&mut self, fd: usize) -> Option<&mut OpenFile> {
        self.open_files.get_mut(fd).filter(|f| f.used)
    }

    /// Rebuilds the inode metadata cache by scanning the device.
    fn rebuild_inode_cache(&mut self) -> Result<(), DiskError> {
        self.inodes.clear();
        let mut block = Block::zeroed();
        for i in 1..self.total_blocks {
            self.disk.read_block(i, &mut block)?;
            if block.kind() == Some(BlockKind::Inode) && block.has_magic() {
                self.inodes.push(InodeMeta {
                    name: block.name(),
                    inode_block: i,
                    first_data: block.first_data(),
                    color: block.color(),
                });
            }
        }
        Ok(())
    }

    /// Takes the head of the free list, or `None` if it is empty.
    ///
    /// The caller owns the returned block and must overwrite it with its
    /// new typed content.
    fn alloc(&mut self) -> Result<Option<u32>, DiskError> {
        let mut superblock = Block::zeroed();
        self.disk.read_block(0, &mut superblock)?;
        let head = superblock.first_free();
        if head == 0 {
            return Ok(None);
        }
        let mut free = Block::zeroed();
        self.disk.read_block(head, &mut free)?;
        superblock.set_first_free(free.next());
        self.disk.write_block(0, &superblock)?;
        Ok(Some(head))
    }

    /// Puts `block` back at the head of the free list.
    fn release(&mut self, block: u32) -> Result<(), DiskError> {
        let mut superblock = Block::zeroed();
        self.disk.read_block(0, &mut superblock)?;
        let mut free = Block::new(BlockKind::Free);
        free.set_next(superblock.first_free());
        self.disk.write_block(block, &free)?;
        superblock.set_first_free(block);
        self.disk.write_block(0, &superblock)?;
        Ok(())
    }

    /// Counts the free blocks on the device.
    fn free_count(&mut self) -> Result<u32, DiskError> {
        let mut count = 0;
        let mut block = Block::zeroed();
        for i in 0..self.total_blocks {
            self.disk.read_block(i, &mut block)?;
            if block.kind() == Some(BlockKind::Free) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Returns the block of the first inode whose name matches, scanning
    /// the device linearly.
    fn find_inode(&mut self, name: &[u8; NAME_LEN]) -> Option<u32> {
        let mut block = Block::zeroed();
        for i in 1..self.total_blocks {
            if self.disk.read_block(i, &mut block).is_err() {
                continue;
            }
            if block.kind() == Some(BlockKind::Inode) && block.has_magic() && block.name() == *name
            {
                return Some(i);
            }
        }
        None
    }

    /// Creates a fresh, empty inode for `name` and returns its block, or
    /// `None` if the volume is full.
    fn create_inode(&mut self, name: &[u8; NAME_LEN]) -> Result<Option<u32>, DiskError> {
        let Some(block) = self.alloc()? else {
            return Ok(None);
        };
        let now = timestamp();
        let mut color = [0; 3];
        OsRng.fill_bytes(&mut color);

        let mut inode = Block::new(BlockKind::Inode);
        inode.set_name(name);
        inode.set_ctime(now);
        inode.set_mtime(now);
        inode.set_atime(now);
        inode.set_color(&color);
        self.disk.write_block(block, &inode)?;

        if !self.inodes.iter().any(|m| m.inode_block == block) {
            self.inodes.push(InodeMeta {
                name: *name,
                inode_block: block,
                first_data: 0,
                color,
            });
        }
        Ok(Some(block))
    }

    /// Releases an inode block and drops its cache entry.
    fn destroy_inode(&mut self, block: u32) -> Result<(), DiskError> {
        self.release(block)?;
        self.inodes.retain(|m| m.inode_block != block);
        Ok(())
    }

    /// Releases every block of the chain starting at `head`.
    fn truncate_chain(&mut self, head: u32) -> Result<(), DiskError> {
        let mut current = head;
        let mut block = Block::zeroed();
        while current != 0 {
            self.disk.read_block(current, &mut block)?;
            let next = block.next();
            self.release(current)?;
            current = next;
        }
        Ok(())
    }

    /// Writes `buf` into a fresh chain of data blocks and returns its head,
    /// or `None` if the free list ran dry.
    ///
    /// On any failure every block allocated so far is released again.
    fn write_chain(&mut self, buf: &[u8]) -> Result<Option<u32>, DiskError> {
        let mut allocated = Vec::new();
        let res = self.fill_chain(buf, &mut allocated);
        if !matches!(res, Ok(Some(_))) {
            for block in allocated {
                let _ = self.release(block);
            }
        }
        res
    }

    fn fill_chain(
        &mut self,
        buf: &[u8],
        allocated: &mut Vec<u32>,
    ) -> Result<Option<u32>, DiskError> {
        let mut head = 0;
        let mut prev = 0;
        for slice in buf.chunks(PAYLOAD_SIZE) {
            let Some(current) = self.alloc()? else {
                return Ok(None);
            };
            allocated.push(current);

            let mut data = Block::new(BlockKind::Data);
            data.payload_mut()[..slice.len()].copy_from_slice(slice);
            self.disk.write_block(current, &data)?;

            if head == 0 {
                head = current;
            }
            if prev != 0 {
                // Patch the previous extent to point here.
                let mut prev_block = Block::zeroed();
                self.disk.read_block(prev, &mut prev_block)?;
                prev_block.set_next(current);
                self.disk.write_block(prev, &prev_block)?;
            }
            prev = current;
        }
        Ok(Some(head))
    }

    /// Resolves a file offset to the data block holding it and the offset
    /// inside that block's payload.
    fn chain_seek(&mut self, head: u32, offset: u32) -> Result<(u32, usize), DiskError> {
        let links = offset / PAYLOAD_SIZE as u32;
        let within = (offset % PAYLOAD_SIZE as u32) as usize;
        let mut current = head;
        let mut block = Block::zeroed();
        for _ in 0..links {
            self.disk.read_block(current, &mut block)?;
            current = block.next();
            if current == 0 {
                return Err(DiskError::InvalidArgument);
            }
        }
        Ok((current, within))
    }

    /// Returns the payload byte at file offset `offset` in the chain
    /// starting at `head`.
    fn chain_byte(&mut self, head: u32, offset: u32) -> Result<u8, DiskError> {
        let (block, within) = self.chain_seek(head, offset)?;
        let mut data = Block::zeroed();
        self.disk.read_block(block, &mut data)?;
        Ok(data.payload()[within])
    }

    /// Updates the cached first-data pointer of an inode.
    fn set_cached_first_data(&mut self, inode_block: u32, first_data: u32) {
        if let Some(meta) = self.inodes.iter_mut().find(|m| m.inode_block == inode_block) {
            meta.first_data = first_data;
        }
    }

    /// Remaps the open-file table through a defragmentation relocation.
    pub(crate) fn remap_open_files(&mut self, mapping: &[u32]) {
        for file in &mut self.open_files {
            if file.used {
                file.inode_block = mapping[file.inode_block as usize];
            }
        }
    }
}

/// Walks the whole device and asserts the on-disk invariants: one
/// superblock, magic bytes everywhere, the free list visiting exactly the
/// free blocks, and extent chains of the right length, disjoint from each
/// other and from the free list.
#[cfg(test)]
pub(crate) fn check_invariants(fs: &mut TinyFs) {
    use std::collections::HashSet;

    let m = fs.mounted.as_mut().expect("nothing mounted");
    let total = m.total_blocks;
    let mut kinds = Vec::new();
    let mut block = Block::zeroed();
    for i in 0..total {
        m.disk.read_block(i, &mut block).unwrap();
        assert!(block.has_magic(), "block {i} missing magic");
        kinds.push(block.kind().unwrap_or_else(|| panic!("block {i} has an invalid tag")));
    }
    assert_eq!(kinds[0], BlockKind::Superblock);
    assert_eq!(
        kinds.iter().filter(|k| **k == BlockKind::Superblock).count(),
        1
    );

    m.disk.read_block(0, &mut block).unwrap();
    assert_eq!(block.total_blocks(), total);

    // The free list visits exactly the free blocks, without duplicates.
    let mut free_seen = HashSet::new();
    let mut current = block.first_free();
    let mut walk = Block::zeroed();
    while current != 0 {
        assert!(free_seen.insert(current), "block {current} freed twice");
        assert_eq!(kinds[current as usize], BlockKind::Free);
        m.disk.read_block(current, &mut walk).unwrap();
        current = walk.next();
    }
    let free_total = kinds.iter().filter(|k| **k == BlockKind::Free).count();
    assert_eq!(free_seen.len(), free_total);

    // Every inode chain holds ceil(size / payload) data blocks, disjoint
    // from every other chain and from the free list.
    let mut owned = HashSet::new();
    for i in 1..total {
        if kinds[i as usize] != BlockKind::Inode {
            continue;
        }
        m.disk.read_block(i, &mut block).unwrap();
        let mut len = 0u32;
        let mut cur = block.first_data();
        while cur != 0 {
            assert_eq!(kinds[cur as usize], BlockKind::Data);
            assert!(owned.insert(cur), "data block {cur} owned twice");
            assert!(!free_seen.contains(&cur), "data block {cur} also free");
            m.disk.read_block(cur, &mut walk).unwrap();
            cur = walk.next();
            len += 1;
        }
        assert_eq!(len, block.size().div_ceil(PAYLOAD_SIZE as u32));
    }
}
