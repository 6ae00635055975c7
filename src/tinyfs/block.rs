//! On-disk block layout and the big-endian field codec.
//!
//! Every field of the four block kinds lives at a fixed byte offset inside a
//! 256-byte block; this module owns those offsets so the rest of the crate
//! never touches raw positions.

/// The size of a block in bytes.
pub const BLOCK_SIZE: usize = 256;
/// The magic number present at byte 1 of every formatted block.
pub const MAGIC: u8 = 0x44;
/// The length of the filename field in bytes.
pub const NAME_LEN: usize = 8;

/// Offset of the type tag.
const TAG_OFF: usize = 0;
/// Offset of the magic number.
const MAGIC_OFF: usize = 1;
/// Superblock: offset of the first-free-block pointer.
const FIRST_FREE_OFF: usize = 4;
/// Superblock: offset of the total block count.
const TOTAL_BLOCKS_OFF: usize = 8;
/// Inode: offset of the filename field.
const NAME_OFF: usize = 4;
/// Inode: offset of the file size.
const SIZE_OFF: usize = 12;
/// Inode: offset of the first-data-block pointer.
const FIRST_DATA_OFF: usize = 16;
/// Inode: offset of the creation timestamp.
const CTIME_OFF: usize = 20;
/// Inode: offset of the modification timestamp.
const MTIME_OFF: usize = 24;
/// Inode: offset of the access timestamp.
const ATIME_OFF: usize = 28;
/// Inode: offset of the read-only flag.
const RO_OFF: usize = 32;
/// Inode: offset of the R,G,B color triple.
const COLOR_OFF: usize = 33;
/// Data and free blocks: offset of the next-block pointer.
const NEXT_OFF: usize = 4;
/// Data block: offset of the payload.
const PAYLOAD_OFF: usize = 8;

/// The payload capacity of one data block in bytes.
pub const PAYLOAD_SIZE: usize = BLOCK_SIZE - PAYLOAD_OFF;

/// Encodes a 32-bit integer into its 4-byte big-endian form.
pub fn encode_int(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Decodes 4 big-endian bytes into a 32-bit integer.
pub fn decode_int(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// The type tag of a block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum BlockKind {
    /// Block 0, holding the free-list head and the total block count.
    Superblock = 1,
    /// A file's metadata block.
    Inode = 2,
    /// A data extent holding up to [`PAYLOAD_SIZE`] bytes of file content.
    Data = 3,
    /// A member of the free list.
    Free = 4,
}

impl BlockKind {
    /// Returns the kind matching the given tag, if valid.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Superblock),
            2 => Some(Self::Inode),
            3 => Some(Self::Data),
            4 => Some(Self::Free),
            _ => None,
        }
    }
}

/// One 256-byte block.
#[derive(Clone)]
pub struct Block([u8; BLOCK_SIZE]);

impl Block {
    /// Returns a zero-filled block.
    pub fn zeroed() -> Self {
        Self([0; BLOCK_SIZE])
    }

    /// Returns a zero-filled block carrying the given tag and the magic
    /// number.
    pub fn new(kind: BlockKind) -> Self {
        let mut block = Self::zeroed();
        block.0[TAG_OFF] = kind as u8;
        block.0[MAGIC_OFF] = MAGIC;
        block
    }

    /// Returns the block's kind, if its tag is valid.
    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_tag(self.0[TAG_OFF])
    }

    /// Tells whether the block carries the magic number.
    pub fn has_magic(&self) -> bool {
        self.0[MAGIC_OFF] == MAGIC
    }

    /// Returns the raw bytes of the block.
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Returns the raw bytes of the block, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.0
    }

    fn get_int(&self, off: usize) -> u32 {
        let b = &self.0[off..off + 4];
        decode_int([b[0], b[1], b[2], b[3]])
    }

    fn set_int(&mut self, off: usize, value: u32) {
        self.0[off..off + 4].copy_from_slice(&encode_int(value));
    }

    // Superblock fields

    /// Returns the head of the free list, 0 if empty.
    pub fn first_free(&self) -> u32 {
        self.get_int(FIRST_FREE_OFF)
    }

    /// Sets the head of the free list.
    pub fn set_first_free(&mut self, block: u32) {
        self.set_int(FIRST_FREE_OFF, block);
    }

    /// Returns the total number of blocks on the device.
    pub fn total_blocks(&self) -> u32 {
        self.get_int(TOTAL_BLOCKS_OFF)
    }

    /// Sets the total number of blocks on the device.
    pub fn set_total_blocks(&mut self, count: u32) {
        self.set_int(TOTAL_BLOCKS_OFF, count);
    }

    // Inode fields

    /// Returns the zero-padded filename field.
    pub fn name(&self) -> [u8; NAME_LEN] {
        let mut name = [0; NAME_LEN];
        name.copy_from_slice(&self.0[NAME_OFF..NAME_OFF + NAME_LEN]);
        name
    }

    /// Sets the filename field.
    pub fn set_name(&mut self, name: &[u8; NAME_LEN]) {
        self.0[NAME_OFF..NAME_OFF + NAME_LEN].copy_from_slice(name);
    }

    /// Returns the file size in bytes.
    pub fn size(&self) -> u32 {
        self.get_int(SIZE_OFF)
    }

    /// Sets the file size in bytes.
    pub fn set_size(&mut self, size: u32) {
        self.set_int(SIZE_OFF, size);
    }

    /// Returns the first data block of the file, 0 if none.
    pub fn first_data(&self) -> u32 {
        self.get_int(FIRST_DATA_OFF)
    }

    /// Sets the first data block of the file.
    pub fn set_first_data(&mut self, block: u32) {
        self.set_int(FIRST_DATA_OFF, block);
    }

    /// Returns the creation timestamp in seconds since the Unix epoch.
    pub fn ctime(&self) -> u32 {
        self.get_int(CTIME_OFF)
    }

    /// Sets the creation timestamp.
    pub fn set_ctime(&mut self, time: u32) {
        self.set_int(CTIME_OFF, time);
    }

    /// Returns the modification timestamp.
    pub fn mtime(&self) -> u32 {
        self.get_int(MTIME_OFF)
    }

    /// Sets the modification timestamp.
    pub fn set_mtime(&mut self, time: u32) {
        self.set_int(MTIME_OFF, time);
    }

    /// Returns the access timestamp.
    pub fn atime(&self) -> u32 {
        self.get_int(ATIME_OFF)
    }

    /// Sets the access timestamp.
    pub fn set_atime(&mut self, time: u32) {
        self.set_int(ATIME_OFF, time);
    }

    /// Tells whether the file is write-protected.
    pub fn read_only(&self) -> bool {
        self.0[RO_OFF] == 1
    }

    /// Sets or clears the write protection.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.0[RO_OFF] = read_only as u8;
    }

    /// Returns the advisory R,G,B color triple.
    pub fn color(&self) -> [u8; 3] {
        [self.0[COLOR_OFF], self.0[COLOR_OFF + 1], self.0[COLOR_OFF + 2]]
    }

    /// Sets the advisory color triple.
    pub fn set_color(&mut self, color: &[u8; 3]) {
        self.0[COLOR_OFF..COLOR_OFF + 3].copy_from_slice(color);
    }

    // Data and free block fields

    /// Returns the next block of the chain, 0 at the end.
    pub fn next(&self) -> u32 {
        self.get_int(NEXT_OFF)
    }

    /// Sets the next block of the chain.
    pub fn set_next(&mut self, block: u32) {
        self.set_int(NEXT_OFF, block);
    }

    /// Returns the payload of a data block.
    pub fn payload(&self) -> &[u8] {
        &self.0[PAYLOAD_OFF..]
    }

    /// Returns the payload of a data block, mutably.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.0[PAYLOAD_OFF..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_codec() {
        assert_eq!(encode_int(0), [0, 0, 0, 0]);
        assert_eq!(encode_int(1), [0, 0, 0, 1]);
        assert_eq!(encode_int(0x01020304), [1, 2, 3, 4]);
        assert_eq!(decode_int([1, 2, 3, 4]), 0x01020304);
        for value in [0, 1, 255, 256, 0x44444444, u32::MAX] {
            assert_eq!(decode_int(encode_int(value)), value);
        }
    }

    #[test]
    fn new_block_is_tagged() {
        let block = Block::new(BlockKind::Free);
        assert_eq!(block.kind(), Some(BlockKind::Free));
        assert!(block.has_magic());
        assert_eq!(block.next(), 0);

        let block = Block::zeroed();
        assert_eq!(block.kind(), None);
        assert!(!block.has_magic());
    }

    #[test]
    fn inode_fields() {
        let mut inode = Block::new(BlockKind::Inode);
        inode.set_name(b"file.txt");
        inode.set_size(1234);
        inode.set_first_data(7);
        inode.set_ctime(100);
        inode.set_mtime(200);
        inode.set_atime(300);
        inode.set_read_only(true);
        inode.set_color(&[10, 20, 30]);

        assert_eq!(&inode.name(), b"file.txt");
        assert_eq!(inode.size(), 1234);
        assert_eq!(inode.first_data(), 7);
        assert_eq!(inode.ctime(), 100);
        assert_eq!(inode.mtime(), 200);
        assert_eq!(inode.atime(), 300);
        assert!(inode.read_only());
        assert_eq!(inode.color(), [10, 20, 30]);

        inode.set_read_only(false);
        assert!(!inode.read_only());
    }

    #[test]
    fn fields_are_big_endian() {
        let mut superblock = Block::new(BlockKind::Superblock);
        superblock.set_first_free(0x0A0B0C0D);
        superblock.set_total_blocks(40);
        assert_eq!(&superblock.as_bytes()[4..8], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&superblock.as_bytes()[8..12], &[0, 0, 0, 40]);
    }

    #[test]
    fn payload_capacity() {
        let mut data = Block::new(BlockKind::Data);
        assert_eq!(data.payload().len(), PAYLOAD_SIZE);
        data.payload_mut()[0] = b'a';
        data.payload_mut()[PAYLOAD_SIZE - 1] = b'z';
        assert_eq!(data.as_bytes()[8], b'a');
        assert_eq!(data.as_bytes()[BLOCK_SIZE - 1], b'z');
    }
}
