//! Defragmentation and the fragmentation map.

use crate::block::Block;
use crate::block::BlockKind;
use crate::disk::DiskError;
use crate::error::Error;
use crate::fs::Mounted;
use crate::fs::TinyFs;
use crate::fs::unpad_name;

impl TinyFs {
    /// Compacts every allocated block toward the front of the device and
    /// rebuilds the free list over the remaining suffix.
    ///
    /// Every chain pointer, the superblock, the metadata cache and the
    /// open-file table are rewritten through the relocation mapping.
    /// Best-effort: a device failure mid-way leaves the volume
    /// inconsistent.
    pub fn defrag(&mut self) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Generic)?;
        fs.defrag().map_err(|_| Error::Generic)
    }

    /// Prints the color-coded per-block map of the device to stdout.
    pub fn display_fragments(&mut self) -> Result<(), Error> {
        let fs = self.mounted.as_mut().ok_or(Error::Generic)?;
        fs.display_fragments().map_err(|_| Error::Generic)
    }
}

impl Mounted {
    fn defrag(&mut self) -> Result<(), DiskError> {
        let total = self.total_blocks;
        let mut mapping: Vec<u32> = (0..total).collect();
        let mut block = Block::zeroed();

        // Slide every allocated block down to the next compact slot. Moved
        // blocks keep their old content in the vacated slot; the free-list
        // rebuild below overwrites the whole suffix anyway.
        let mut next_slot = 1;
        for i in 1..total {
            self.disk.read_block(i, &mut block)?;
            if block.kind() != Some(BlockKind::Free) {
                if i != next_slot {
                    self.disk.write_block(next_slot, &block)?;
                }
                mapping[i as usize] = next_slot;
                next_slot += 1;
            }
        }

        // Remap chain pointers through the relocation table. Every live
        // block moved to an index at most its old one, so the mapping is
        // complete before any pointer is rewritten.
        for i in 1..next_slot {
            self.disk.read_block(i, &mut block)?;
            match block.kind() {
                Some(BlockKind::Inode) => {
                    let first = block.first_data();
                    if first != 0 {
                        block.set_first_data(mapping[first as usize]);
                    }
                    self.disk.write_block(i, &block)?;
                }
                Some(BlockKind::Data) => {
                    let next = block.next();
                    if next != 0 {
                        block.set_next(mapping[next as usize]);
                    }
                    self.disk.write_block(i, &block)?;
                }
                _ => {}
            }
        }

        // One free chain over the whole suffix.
        for i in next_slot..total {
            let mut free = Block::new(BlockKind::Free);
            free.set_next(if i == total - 1 { 0 } else { i + 1 });
            self.disk.write_block(i, &free)?;
        }

        let mut superblock = Block::zeroed();
        self.disk.read_block(0, &mut superblock)?;
        superblock.set_first_free(if next_slot < total { next_slot } else { 0 });
        self.disk.write_block(0, &superblock)?;

        // The in-memory views follow the relocation.
        for meta in &mut self.inodes {
            meta.inode_block = mapping[meta.inode_block as usize];
            if meta.first_data != 0 {
                meta.first_data = mapping[meta.first_data as usize];
            }
        }
        self.remap_open_files(&mapping);
        Ok(())
    }

    fn display_fragments(&mut self) -> Result<(), DiskError> {
        println!("--- File color mapping ---");
        for meta in &self.inodes {
            let [r, g, b] = meta.color;
            println!("  \x1b[1;38;2;{r};{g};{b}m{}\x1b[0m", unpad_name(&meta.name));
        }

        println!();
        println!("--- Disk fragmentation map ---");
        let mut block = Block::zeroed();
        for i in 0..self.total_blocks {
            self.disk.read_block(i, &mut block)?;
            if i == 0 {
                print!("\x1b[1m[SUPERBLOCK]\x1b[0m ");
            } else {
                match block.kind() {
                    Some(BlockKind::Inode) => {
                        match self.inodes.iter().find(|m| m.inode_block == i) {
                            Some(meta) => {
                                let [r, g, b] = meta.color;
                                print!("\x1b[3;38;2;{r};{g};{b}m[INODE]\x1b[0m ");
                            }
                            None => print!("\x1b[3m[UNKNOWN INODE]\x1b[0m "),
                        }
                    }
                    Some(BlockKind::Data) => match self.data_block_owner(i) {
                        Some([r, g, b]) => print!("\x1b[1;38;2;{r};{g};{b}m[DATA]\x1b[0m "),
                        None => print!("\x1b[1;36m[DATA]\x1b[0m "),
                    },
                    Some(BlockKind::Free) => print!("\x1b[1;31m[FREE]\x1b[0m "),
                    _ => print!("\x1b[1;33m[UNKNOWN]\x1b[0m "),
                }
            }
            if (i + 1) % 10 == 0 {
                println!();
            }
        }
        println!();
        Ok(())
    }

    /// Finds the color of the file owning a given data block by walking
    /// each cached file's chain.
    fn data_block_owner(&mut self, data_block: u32) -> Option<[u8; 3]> {
        let files: Vec<([u8; 3], u32)> =
            self.inodes.iter().map(|m| (m.color, m.first_data)).collect();
        let mut block = Block::zeroed();
        for (color, head) in files {
            let mut current = head;
            while current != 0 {
                if current == data_block {
                    return Some(color);
                }
                if self.disk.read_block(current, &mut block).is_err() {
                    break;
                }
                current = block.next();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::check_invariants;
    use std::env;
    use std::path::PathBuf;
    use std::process;

    fn scratch(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("tinyfs-defrag-{}-{name}", process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn read_all(fs: &mut TinyFs, fd: usize, len: usize) -> Vec<u8> {
        fs.seek(fd, 0).unwrap();
        (0..len).map(|_| fs.read_byte(fd).unwrap()).collect()
    }

    /// Opens three files and deletes the middle one, leaving holes.
    fn fragmented(path: &std::path::Path) -> (TinyFs, usize, usize) {
        TinyFs::mkfs(path, 256 * 40).unwrap();
        let mut fs = TinyFs::new();
        fs.mount(path).unwrap();

        let fd_a = fs.open("a").unwrap();
        let fd_b = fs.open("b").unwrap();
        let fd_c = fs.open("c").unwrap();
        fs.write(fd_a, &vec![b'a'; 600]).unwrap();
        fs.write(fd_b, &vec![b'b'; 35]).unwrap();
        fs.write(fd_c, &vec![b'c'; 600]).unwrap();
        fs.delete(fd_b).unwrap();
        (fs, fd_a, fd_c)
    }

    #[test]
    fn defrag_requires_a_mount() {
        let mut fs = TinyFs::new();
        assert_eq!(fs.defrag().unwrap_err().code(), -1);
        assert_eq!(fs.display_fragments().unwrap_err().code(), -1);
    }

    #[test]
    fn defrag_compacts_live_blocks() {
        let path = scratch("compact");
        let (mut fs, fd_a, fd_c) = fragmented(&path);
        fs.defrag().unwrap();
        check_invariants(&mut fs);

        // Live blocks form a prefix, free blocks the whole suffix.
        let m = fs.mounted.as_mut().unwrap();
        let total = m.total_blocks;
        let mut block = Block::zeroed();
        let mut first_free = None;
        for i in 1..total {
            m.disk.read_block(i, &mut block).unwrap();
            match block.kind().unwrap() {
                BlockKind::Free => first_free = first_free.or(Some(i)),
                _ => assert!(
                    first_free.is_none(),
                    "allocated block {i} after free block {first_free:?}"
                ),
            }
        }
        // 2 inodes + 3 + 3 data blocks survive.
        assert_eq!(first_free, Some(9));

        // Content is reachable through the remapped chains, both via the
        // unmoved inode and via a descriptor whose inode was relocated.
        assert_eq!(read_all(&mut fs, fd_a, 600), vec![b'a'; 600]);
        assert_eq!(read_all(&mut fs, fd_c, 600), vec![b'c'; 600]);
    }

    #[test]
    fn display_map_covers_the_device() {
        let path = scratch("display");
        let (mut fs, _, _) = fragmented(&path);
        fs.display_fragments().unwrap();
    }

    #[test]
    fn defrag_is_idempotent() {
        let path = scratch("idempotent");
        let (mut fs, _, _) = fragmented(&path);
        fs.defrag().unwrap();
        fs.unmount().unwrap();
        let once = std::fs::read(&path).unwrap();

        fs.mount(&path).unwrap();
        fs.defrag().unwrap();
        fs.unmount().unwrap();
        let twice = std::fs::read(&path).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn defrag_on_a_clean_volume_changes_nothing() {
        let path = scratch("noop");
        TinyFs::mkfs(&path, 2560).unwrap();
        let mut fs = TinyFs::new();
        fs.mount(&path).unwrap();
        let fd = fs.open("a").unwrap();
        fs.write(fd, b"contiguous").unwrap();
        fs.unmount().unwrap();
        let before = std::fs::read(&path).unwrap();

        fs.mount(&path).unwrap();
        fs.defrag().unwrap();
        fs.unmount().unwrap();
        // Already compact: only the free chain is rewritten, to the same
        // ascending order mkfs produced.
        assert_eq!(before, std::fs::read(&path).unwrap());
    }

    #[test]
    fn defrag_survives_a_remount() {
        let path = scratch("remount");
        let (mut fs, _, _) = fragmented(&path);
        fs.defrag().unwrap();
        fs.unmount().unwrap();

        fs.mount(&path).unwrap();
        check_invariants(&mut fs);
        let fd = fs.open("a").unwrap();
        assert_eq!(read_all(&mut fs, fd, 600), vec![b'a'; 600]);
    }
}
