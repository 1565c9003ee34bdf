//! Raw block-level I/O over a host file.

use crate::error::FsResult;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

/// Fixed block size, in bytes. All I/O is aligned to this.
pub const BLOCK_SIZE: usize = 4096;

/// A fixed-size, randomly-addressable block device backed by a regular host
/// file.
///
/// There is no caching layer: every `write_block` flushes before returning,
/// so a block written here is durable from the perspective of any other
/// process that opens the same path afterwards.
pub struct BlockDevice {
    file: File,
    block_count: u32,
}

impl BlockDevice {
    /// Creates a new zero-filled device of exactly `size_mb` mebibytes,
    /// truncating any existing file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, size_mb: u32) -> FsResult<Self> {
        let total_size = size_mb as u64 * 1024 * 1024;
        let block_count = (total_size / BLOCK_SIZE as u64) as u32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_size)?;

        log::debug!("created block device: {block_count} blocks ({total_size} bytes)");
        Ok(Self { file, block_count })
    }

    /// Opens an existing device, deriving `block_count` from the file size.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        let block_count = (size / BLOCK_SIZE as u64) as u32;

        log::debug!("opened block device: {block_count} blocks ({size} bytes)");
        Ok(Self { file, block_count })
    }

    /// The number of blocks addressable on this device.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Reads exactly one block.
    pub fn read_block(&mut self, block_num: u32) -> FsResult<[u8; BLOCK_SIZE]> {
        let mut buf = [0u8; BLOCK_SIZE];
        let offset = block_num as u64 * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        log::trace!("read block {block_num}");
        Ok(buf)
    }

    /// Writes exactly one block and flushes it to disk.
    pub fn write_block(&mut self, block_num: u32, data: &[u8; BLOCK_SIZE]) -> FsResult<()> {
        let offset = block_num as u64 * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        log::trace!("wrote block {block_num}");
        Ok(())
    }

    /// Releases the underlying file handle.
    ///
    /// The handle is also released on drop; this exists to make the
    /// end-of-mount lifecycle explicit at call sites.
    pub fn close(self) {
        log::debug!("closed block device");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        temp_dir().join(format!("blockfs-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn create_gives_expected_block_count() {
        let path = tmp_path("create");
        let dev = BlockDevice::create(&path, 1).unwrap();
        assert_eq!(dev.block_count(), 256);
        drop(dev);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let path = tmp_path("rw");
        let mut dev = BlockDevice::create(&path, 1).unwrap();

        let mut data = [0u8; BLOCK_SIZE];
        data[0] = 0xAB;
        data[BLOCK_SIZE - 1] = 0xCD;
        dev.write_block(5, &data).unwrap();

        let read_back = dev.read_block(5).unwrap();
        assert_eq!(read_back, data);
        drop(dev);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_derives_block_count_from_file_size() {
        let path = tmp_path("open");
        {
            let dev = BlockDevice::create(&path, 1).unwrap();
            drop(dev);
        }
        let dev = BlockDevice::open(&path).unwrap();
        assert_eq!(dev.block_count(), 256);
        let _ = std::fs::remove_file(&path);
    }
}
