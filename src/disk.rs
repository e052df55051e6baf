//! Paging disk: the fixed-block backing store for page contents.
//!
//! Block `i` always holds the image of virtual page `i`. Transfers are whole
//! blocks; an out-of-range block or a short transfer aborts.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{VmError, VmResult};

/// Fixed-size block device.
pub trait BlockStore {
    fn nblocks(&self) -> usize;

    /// Read exactly `BLOCK_SIZE` bytes of `block` into `data`
    fn read_block(&mut self, block: usize, data: &mut [u8]);

    /// Write exactly `BLOCK_SIZE` bytes from `data` to `block`
    fn write_block(&mut self, block: usize, data: &[u8]);
}

fn check_transfer(op: &str, block: usize, nblocks: usize, len: usize) {
    if block >= nblocks {
        panic!("{}: invalid block #{}", op, block);
    }
    if len != BLOCK_SIZE {
        panic!("{}: block #{} transfer of {} bytes, expected {}", op, block, len, BLOCK_SIZE);
    }
}

/// A virtual disk emulated by a regular file.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    path: PathBuf,
    nblocks: usize,
}

impl FileDisk {
    /// Create or open `path` and size it to exactly `nblocks` blocks
    pub fn open<P: AsRef<Path>>(path: P, nblocks: usize) -> VmResult<Self> {
        let path = path.as_ref().to_path_buf();
        let disk_open = |source| VmError::DiskOpen {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(disk_open)?;
        file.set_len((nblocks * BLOCK_SIZE) as u64)
            .map_err(disk_open)?;

        log::debug!("opened disk {} with {} blocks", path.display(), nblocks);
        Ok(FileDisk { file, path, nblocks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileDisk {
    fn nblocks(&self) -> usize {
        self.nblocks
    }

    fn read_block(&mut self, block: usize, data: &mut [u8]) {
        check_transfer("disk_read", block, self.nblocks, data.len());
        if let Err(e) = self.file.read_exact_at(data, (block * BLOCK_SIZE) as u64) {
            panic!("disk_read: failed to read block #{}: {}", block, e);
        }
    }

    fn write_block(&mut self, block: usize, data: &[u8]) {
        check_transfer("disk_write", block, self.nblocks, data.len());
        if let Err(e) = self.file.write_all_at(data, (block * BLOCK_SIZE) as u64) {
            panic!("disk_write: failed to write block #{}: {}", block, e);
        }
    }
}

/// In-memory disk, zeroed at creation.
pub struct RamDisk {
    data: Vec<[u8; BLOCK_SIZE]>,
}

impl RamDisk {
    pub fn new(nblocks: usize) -> Self {
        RamDisk {
            data: vec![[0u8; BLOCK_SIZE]; nblocks],
        }
    }

    /// Direct access to a block (for seeding and inspection)
    pub fn block(&self, block: usize) -> &[u8; BLOCK_SIZE] {
        &self.data[block]
    }

    pub fn block_mut(&mut self, block: usize) -> &mut [u8; BLOCK_SIZE] {
        &mut self.data[block]
    }
}

impl BlockStore for RamDisk {
    fn nblocks(&self) -> usize {
        self.data.len()
    }

    fn read_block(&mut self, block: usize, data: &mut [u8]) {
        check_transfer("disk_read", block, self.data.len(), data.len());
        data.copy_from_slice(&self.data[block]);
    }

    fn write_block(&mut self, block: usize, data: &[u8]) {
        check_transfer("disk_write", block, self.data.len(), data.len());
        self.data[block].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("virtmem-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_ram_disk_initialization() {
        let mut disk = RamDisk::new(4);
        let mut buf = [1u8; BLOCK_SIZE];
        disk.read_block(3, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.nblocks(), 4);
    }

    #[test]
    fn test_ram_disk_blocks_are_independent() {
        let mut disk = RamDisk::new(3);
        disk.write_block(1, &[7u8; BLOCK_SIZE]);

        assert_eq!(disk.block(1)[0], 7);
        assert_eq!(disk.block(0)[0], 0);
        assert_eq!(disk.block(2)[BLOCK_SIZE - 1], 0);
    }

    #[test]
    #[should_panic(expected = "disk_read: invalid block #4")]
    fn test_ram_disk_read_out_of_range_panics() {
        let mut disk = RamDisk::new(4);
        let mut buf = [0u8; BLOCK_SIZE];
        disk.read_block(4, &mut buf);
    }

    #[test]
    #[should_panic(expected = "expected 4096")]
    fn test_partial_transfer_panics() {
        let mut disk = RamDisk::new(1);
        disk.write_block(0, &[0u8; 100]);
    }

    #[test]
    fn test_file_disk_sized_to_nblocks() {
        let path = scratch_path("sized");
        let disk = FileDisk::open(&path, 5).unwrap();
        let len = std::fs::metadata(disk.path()).unwrap().len();
        assert_eq!(len, (5 * BLOCK_SIZE) as u64);
        drop(disk);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_disk_write_then_read() {
        let path = scratch_path("rw");
        let mut disk = FileDisk::open(&path, 3).unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xab;
        block[BLOCK_SIZE - 1] = 0xcd;
        disk.write_block(2, &block);

        let mut back = [0u8; BLOCK_SIZE];
        disk.read_block(2, &mut back);
        assert_eq!(back[0], 0xab);
        assert_eq!(back[BLOCK_SIZE - 1], 0xcd);

        disk.read_block(1, &mut back);
        assert!(back.iter().all(|&b| b == 0));

        drop(disk);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_disk_open_failure_is_reported() {
        let path = scratch_path("missing-dir").join("disk");
        let err = FileDisk::open(&path, 1).unwrap_err();
        assert!(matches!(err, VmError::DiskOpen { .. }));
        assert!(err.to_string().contains("couldn't create virtual disk"));
    }

    #[test]
    #[should_panic(expected = "disk_write: invalid block #2")]
    fn test_file_disk_write_out_of_range_panics() {
        let path = scratch_path("oob");
        let mut disk = FileDisk::open(&path, 2).unwrap();
        let _ = std::fs::remove_file(&path);
        disk.write_block(2, &[0u8; BLOCK_SIZE]);
    }
}
