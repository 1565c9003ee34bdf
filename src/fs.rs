/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Path resolution, file/directory operations, and persistence orchestration.

use crate::allocator::BlockAllocator;
use crate::block_device::BlockDevice;
use crate::block_device::BLOCK_SIZE;
use crate::dirent::DirEntry;
use crate::error::FsError;
use crate::error::FsResult;
use crate::inode::FileType;
use crate::inode::Inode;
use crate::inode::DIRECT_BLOCKS;
use crate::inode::INODE_SIZE;
use crate::inode::MAX_FILE_SIZE;
use crate::superblock::Superblock;
use crate::superblock::DEFAULT_INODE_COUNT;
use crate::superblock::ROOT_INODE;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Size of one packed inode-table record: a 4-byte number plus a 128-byte
/// inode.
const INODE_RECORD_SIZE: usize = 4 + INODE_SIZE;

/// Maximum number of live inodes a single-block inode table can hold
/// (`floor(4096 / 132)`). The superblock's `inode_count` keeps advertising
/// [`DEFAULT_INODE_COUNT`] as a capacity hint, but this is the practical
/// ceiling enforced by the on-disk layout (see SPEC_FULL.md's resolution of
/// the inode-count tension).
pub const INODE_TABLE_CAPACITY: usize = BLOCK_SIZE / INODE_RECORD_SIZE;

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}

/// `{type, size, created, modified, accessed}` snapshot of one inode,
/// returned by [`Filesystem::get_file_info`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FileInfo {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u32,
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
}

/// Filesystem-wide usage counters, returned by [`Filesystem::get_stats`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FsStats {
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub total_inodes: u32,
    pub used_inodes: u32,
}

/// A mounted filesystem image.
///
/// Construct one with [`Filesystem::create`] or [`Filesystem::open`]; every
/// mutating operation syncs the superblock, bitmap, and inode table back to
/// disk before returning. There is no background flushing and no
/// multi-mount coordination — see spec.md §5.
pub struct Filesystem {
    device: BlockDevice,
    allocator: BlockAllocator,
    superblock: Superblock,
    inode_table: BTreeMap<u32, Inode>,
    next_inode: u32,
}

impl Filesystem {
    /// Creates a new image at `path` of exactly `size_mb` mebibytes, with an
    /// empty root directory.
    pub fn create<P: AsRef<Path>>(path: P, size_mb: u32) -> FsResult<Self> {
        let mut device = BlockDevice::create(path, size_mb)?;
        let total_blocks = device.block_count();

        let mut allocator = BlockAllocator::new(total_blocks);
        let superblock = Superblock::new(total_blocks, DEFAULT_INODE_COUNT);

        let root_block = allocator.allocate_block().ok_or(FsError::NoSpace)?;
        device.write_block(root_block, &[0u8; BLOCK_SIZE])?;

        let mut root_inode = Inode::new(FileType::Directory, now());
        root_inode.direct_blocks[0] = root_block;
        root_inode.block_count = 1;

        let mut inode_table = BTreeMap::new();
        inode_table.insert(ROOT_INODE, root_inode);

        let mut fs = Self {
            device,
            allocator,
            superblock,
            inode_table,
            next_inode: 2,
        };
        // Re-syncs the bitmap and superblock too, so the root block's
        // allocation is durable before the device is first closed.
        fs.sync()?;
        log::info!("created filesystem with {total_blocks} blocks");
        Ok(fs)
    }

    /// Mounts an existing image, validating its superblock magic.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let mut device = BlockDevice::open(path)?;

        let sb_bytes = device.read_block(0)?;
        let superblock = Superblock::from_bytes(&sb_bytes);
        superblock.validate()?;

        let bitmap_bytes = device.read_block(1)?;
        let allocator = BlockAllocator::from_bytes(&bitmap_bytes, superblock.total_blocks);

        let inode_table = Self::read_inode_table(&mut device)?;
        let next_inode = inode_table.keys().max().copied().map_or(1, |m| m + 1);

        log::info!(
            "mounted filesystem: {} blocks, {} inodes",
            superblock.total_blocks,
            inode_table.len()
        );
        Ok(Self {
            device,
            allocator,
            superblock,
            inode_table,
            next_inode,
        })
    }

    /// Creates an empty regular file.
    pub fn create_file(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = Self::split_path(path)
            .ok_or_else(|| FsError::UsageError("cannot create the root directory".into()))?;
        let parent_inode = self.resolve(&parent)?;
        if self.lookup_in_directory(parent_inode, &name)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        if self.inode_table.len() >= INODE_TABLE_CAPACITY {
            return Err(FsError::NoSpace);
        }

        let inode_num = self.next_inode;
        self.next_inode += 1;
        self.inode_table
            .insert(inode_num, Inode::new(FileType::Regular, now()));

        if let Err(e) = self.add_dir_entry(parent_inode, &name, inode_num) {
            self.inode_table.remove(&inode_num);
            return Err(e);
        }
        self.sync()?;
        log::info!("created file {path}");
        Ok(())
    }

    /// Creates an empty directory, pre-allocating its single data block.
    pub fn create_directory(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = Self::split_path(path)
            .ok_or_else(|| FsError::UsageError("cannot create the root directory".into()))?;
        let parent_inode = self.resolve(&parent)?;
        if self.lookup_in_directory(parent_inode, &name)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        if self.inode_table.len() >= INODE_TABLE_CAPACITY {
            return Err(FsError::NoSpace);
        }

        let dir_block = self.allocator.allocate_block().ok_or(FsError::NoSpace)?;
        self.device.write_block(dir_block, &[0u8; BLOCK_SIZE])?;

        let inode_num = self.next_inode;
        self.next_inode += 1;
        let mut inode = Inode::new(FileType::Directory, now());
        inode.direct_blocks[0] = dir_block;
        inode.block_count = 1;
        self.inode_table.insert(inode_num, inode);

        if let Err(e) = self.add_dir_entry(parent_inode, &name, inode_num) {
            self.inode_table.remove(&inode_num);
            self.allocator.free_block(dir_block);
            return Err(e);
        }
        self.sync()?;
        log::info!("created directory {path}");
        Ok(())
    }

    /// Overwrites a regular file's content.
    ///
    /// Data beyond [`MAX_FILE_SIZE`] (48 KiB, 12 direct blocks) is silently
    /// truncated. If the allocator runs out of space partway through, the
    /// blocks allocated for this call are freed and the file is left
    /// untouched (the old blocks are only freed once the new ones are
    /// confirmed available).
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> FsResult<()> {
        let inode_num = self.resolve(path)?;
        let mut inode = *self
            .inode_table
            .get(&inode_num)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        if inode.file_type != FileType::Regular {
            return Err(FsError::TypeMismatch(format!("{path} is not a regular file")));
        }

        if data.len() as u64 > MAX_FILE_SIZE {
            log::warn!(
                "write to {path} truncated from {} to {MAX_FILE_SIZE} bytes",
                data.len()
            );
        }
        let blocks_needed = data.len().div_ceil(BLOCK_SIZE).min(DIRECT_BLOCKS);

        let mut new_blocks = Vec::with_capacity(blocks_needed);
        for _ in 0..blocks_needed {
            match self.allocator.allocate_block() {
                Some(b) => new_blocks.push(b),
                None => {
                    for b in new_blocks {
                        self.allocator.free_block(b);
                    }
                    return Err(FsError::NoSpace);
                }
            }
        }

        for i in 0..(inode.block_count as usize).min(DIRECT_BLOCKS) {
            let b = inode.direct_blocks[i];
            if b != 0 {
                self.allocator.free_block(b);
                inode.direct_blocks[i] = 0;
            }
        }

        let mut written = 0usize;
        for (i, block_num) in new_blocks.iter().enumerate() {
            inode.direct_blocks[i] = *block_num;
            let mut block_data = [0u8; BLOCK_SIZE];
            let to_write = (data.len() - written).min(BLOCK_SIZE);
            block_data[..to_write].copy_from_slice(&data[written..written + to_write]);
            self.device.write_block(*block_num, &block_data)?;
            written += to_write;
        }

        inode.size = data.len().min(blocks_needed * BLOCK_SIZE) as u32;
        inode.block_count = blocks_needed as u32;
        inode.modified = now();
        self.inode_table.insert(inode_num, inode);
        self.sync()?;
        log::info!("wrote {} bytes to {path}", inode.size);
        Ok(())
    }

    /// Reads a regular file's full content.
    pub fn read_file(&mut self, path: &str) -> FsResult<Vec<u8>> {
        let inode_num = self.resolve(path)?;
        let inode = *self
            .inode_table
            .get(&inode_num)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        if inode.file_type != FileType::Regular {
            return Err(FsError::TypeMismatch(format!("{path} is not a regular file")));
        }

        let mut data = Vec::with_capacity(inode.size as usize);
        let mut remaining = inode.size as usize;
        for i in 0..(inode.block_count as usize).min(DIRECT_BLOCKS) {
            let block_num = inode.direct_blocks[i];
            if block_num == 0 {
                break;
            }
            let block = self.device.read_block(block_num)?;
            let to_read = remaining.min(BLOCK_SIZE);
            data.extend_from_slice(&block[..to_read]);
            remaining -= to_read;
            if remaining == 0 {
                break;
            }
        }
        Ok(data)
    }

    /// Deletes a regular file, freeing its blocks and inode-table slot.
    ///
    /// Rejects directories with [`FsError::TypeMismatch`] — deleting a
    /// directory is out of scope (see spec.md §1's Non-goals), and the
    /// source's unchecked version would orphan the directory's contents.
    pub fn delete_file(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = Self::split_path(path)
            .ok_or_else(|| FsError::UsageError("cannot delete the root directory".into()))?;
        let parent_inode = self.resolve(&parent)?;
        let file_inode_num = self
            .lookup_in_directory(parent_inode, &name)?
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        let inode = *self
            .inode_table
            .get(&file_inode_num)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;

        if inode.file_type != FileType::Regular {
            return Err(FsError::TypeMismatch(format!("{path} is a directory")));
        }

        for i in 0..(inode.block_count as usize).min(DIRECT_BLOCKS) {
            let b = inode.direct_blocks[i];
            if b != 0 {
                self.allocator.free_block(b);
            }
        }
        self.inode_table.remove(&file_inode_num);
        self.remove_dir_entry(parent_inode, &name)?;
        self.sync()?;
        log::info!("deleted {path}");
        Ok(())
    }

    /// Lists the names of a directory's entries, in insertion order.
    pub fn list_directory(&mut self, path: &str) -> FsResult<Vec<String>> {
        let inode_num = self.resolve(path)?;
        let inode = *self
            .inode_table
            .get(&inode_num)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        if inode.file_type != FileType::Directory {
            return Err(FsError::TypeMismatch(format!("{path} is not a directory")));
        }
        let entries = self.directory_entries(&inode)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Returns `{type, size, created, modified, accessed}` for `path`, or
    /// `None` if it does not exist.
    pub fn get_file_info(&mut self, path: &str) -> Option<FileInfo> {
        let inode_num = self.find_inode(path).ok().flatten()?;
        let inode = self.inode_table.get(&inode_num)?;
        Some(FileInfo {
            file_type: inode.file_type,
            size: inode.size,
            created: inode.created,
            modified: inode.modified,
            accessed: inode.accessed,
        })
    }

    /// Returns filesystem-wide usage counters.
    pub fn get_stats(&self) -> FsStats {
        FsStats {
            total_blocks: self.superblock.total_blocks,
            free_blocks: self.allocator.free_blocks(),
            total_inodes: self.superblock.inode_count,
            used_inodes: self.inode_table.len() as u32,
        }
    }

    /// Renders a preorder directory tree starting at `path`.
    ///
    /// Cycle detection uses a single mutable visited set pushed on entry and
    /// popped on exit of each branch, rather than cloning the set per
    /// recursive call (see spec.md §9's re-architecture guidance).
    pub fn tree(&mut self, path: &str) -> FsResult<Vec<String>> {
        let mut visited = HashSet::new();
        let mut lines = Vec::new();
        self.tree_inner(path, "", true, &mut visited, &mut lines)?;
        Ok(lines)
    }

    /// Releases the underlying block device. Does not re-sync: every
    /// mutating operation already syncs before returning.
    pub fn close(self) {
        self.device.close();
        log::info!("filesystem closed");
    }

    fn tree_inner(
        &mut self,
        path: &str,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<u32>,
        lines: &mut Vec<String>,
    ) -> FsResult<()> {
        let Some(inode_num) = self.find_inode(path)? else {
            return Ok(());
        };

        if visited.contains(&inode_num) {
            let connector = if is_last { "└── " } else { "├── " };
            lines.push(format!("{prefix}{connector}⚠️  [CYCLE DETECTED]"));
            return Ok(());
        }

        let inode = *self
            .inode_table
            .get(&inode_num)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        let name = if path == "/" {
            "/".to_string()
        } else {
            path.rsplit('/').next().unwrap_or(path).to_string()
        };
        let icon = if inode.file_type == FileType::Directory {
            "📁 "
        } else {
            "📄 "
        };

        if prefix.is_empty() {
            lines.push(format!("{icon}{name}"));
        } else {
            let connector = if is_last { "└── " } else { "├── " };
            lines.push(format!("{prefix}{connector}{icon}{name}"));
        }

        if inode.file_type == FileType::Directory {
            visited.insert(inode_num);
            let entries = self.list_directory(path)?;
            let count = entries.len();
            let child_prefix = format!("{prefix}\t");
            for (i, entry) in entries.iter().enumerate() {
                let child_path = if path == "/" {
                    format!("/{entry}")
                } else {
                    format!("{path}/{entry}")
                };
                self.tree_inner(
                    &child_path,
                    &child_prefix,
                    i == count - 1,
                    visited,
                    lines,
                )?;
            }
            visited.remove(&inode_num);
        }

        Ok(())
    }

    fn resolve(&mut self, path: &str) -> FsResult<u32> {
        self.find_inode(path)?
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))
    }

    /// Resolves an absolute, `/`-separated path to an inode number.
    fn find_inode(&mut self, path: &str) -> FsResult<Option<u32>> {
        if path == "/" {
            return Ok(Some(self.superblock.root_inode));
        }
        let mut current = self.superblock.root_inode;
        for part in path.split('/').filter(|s| !s.is_empty()) {
            match self.lookup_in_directory(current, part)? {
                Some(n) => current = n,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn lookup_in_directory(&mut self, dir_inode_num: u32, name: &str) -> FsResult<Option<u32>> {
        let Some(inode) = self.inode_table.get(&dir_inode_num).copied() else {
            return Ok(None);
        };
        if inode.file_type != FileType::Directory {
            return Ok(None);
        }
        let entries = self.directory_entries(&inode)?;
        Ok(entries
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.inode_num))
    }

    fn directory_entries(&mut self, inode: &Inode) -> FsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for i in 0..(inode.block_count as usize).min(DIRECT_BLOCKS) {
            let block_num = inode.direct_blocks[i];
            if block_num == 0 {
                break;
            }
            let block = self.device.read_block(block_num)?;
            entries.extend(Self::decode_block_entries(&block)?);
        }
        Ok(entries)
    }

    fn decode_block_entries(block: &[u8; BLOCK_SIZE]) -> FsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        while offset < BLOCK_SIZE {
            if block[offset] == 0 {
                break;
            }
            if offset + 8 > BLOCK_SIZE {
                break;
            }
            let (entry, size) = DirEntry::decode(&block[offset..])?;
            entries.push(entry);
            offset += size;
        }
        Ok(entries)
    }

    /// Adds an entry to a directory's single data block, allocating it on
    /// first use. Fails with [`FsError::DirectoryFull`] if the entry does
    /// not fit.
    fn add_dir_entry(&mut self, dir_inode_num: u32, name: &str, inode_num: u32) -> FsResult<()> {
        let entry_bytes = DirEntry::new(inode_num, name).encode()?;

        let block_num = {
            let inode = self
                .inode_table
                .get_mut(&dir_inode_num)
                .ok_or_else(|| FsError::PathNotFound(dir_inode_num.to_string()))?;
            if inode.block_count == 0 {
                let new_block = self.allocator.allocate_block().ok_or(FsError::NoSpace)?;
                inode.direct_blocks[0] = new_block;
                inode.block_count = 1;
                new_block
            } else {
                inode.direct_blocks[0]
            }
        };

        let mut block_data = self.device.read_block(block_num)?;
        let mut offset = 0usize;
        while offset < BLOCK_SIZE {
            if block_data[offset] == 0 {
                break;
            }
            if offset + 8 > BLOCK_SIZE {
                break;
            }
            let (_, size) = DirEntry::decode(&block_data[offset..])?;
            offset += size;
        }

        if offset + entry_bytes.len() > BLOCK_SIZE {
            return Err(FsError::DirectoryFull(name.to_string()));
        }
        block_data[offset..offset + entry_bytes.len()].copy_from_slice(&entry_bytes);
        self.device.write_block(block_num, &block_data)?;
        Ok(())
    }

    /// Rewrites a directory's data block without the named entry.
    fn remove_dir_entry(&mut self, dir_inode_num: u32, name: &str) -> FsResult<()> {
        let inode = *self
            .inode_table
            .get(&dir_inode_num)
            .ok_or_else(|| FsError::PathNotFound(dir_inode_num.to_string()))?;
        if inode.block_count == 0 || inode.direct_blocks[0] == 0 {
            return Ok(());
        }
        let block_num = inode.direct_blocks[0];
        let block_data = self.device.read_block(block_num)?;
        let remaining: Vec<DirEntry> = Self::decode_block_entries(&block_data)?
            .into_iter()
            .filter(|e| e.name != name)
            .collect();

        let mut new_block = [0u8; BLOCK_SIZE];
        let mut offset = 0usize;
        for entry in remaining {
            let bytes = entry.encode()?;
            if offset + bytes.len() > BLOCK_SIZE {
                break;
            }
            new_block[offset..offset + bytes.len()].copy_from_slice(&bytes);
            offset += bytes.len();
        }
        self.device.write_block(block_num, &new_block)?;
        Ok(())
    }

    /// Splits a path into `(parent, name)`. Returns `None` for the root.
    fn split_path(path: &str) -> Option<(String, String)> {
        if path == "/" {
            return None;
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.rfind('/') {
            None => Some(("/".to_string(), trimmed.to_string())),
            Some(0) => Some(("/".to_string(), trimmed[1..].to_string())),
            Some(i) => Some((trimmed[..i].to_string(), trimmed[i + 1..].to_string())),
        }
    }

    fn write_bitmap(device: &mut BlockDevice, allocator: &BlockAllocator) -> FsResult<()> {
        let mut bitmap_block = [0u8; BLOCK_SIZE];
        let bitmap_bytes = allocator.to_bytes();
        let copy_len = bitmap_bytes.len().min(BLOCK_SIZE);
        bitmap_block[..copy_len].copy_from_slice(&bitmap_bytes[..copy_len]);
        device.write_block(1, &bitmap_block)
    }

    fn read_inode_table(device: &mut BlockDevice) -> FsResult<BTreeMap<u32, Inode>> {
        let block = device.read_block(2)?;
        let mut table = BTreeMap::new();
        let mut offset = 0usize;
        while offset + INODE_RECORD_SIZE <= BLOCK_SIZE {
            let inode_num = u32::from_le_bytes(block[offset..offset + 4].try_into().unwrap());
            if inode_num == 0 {
                break;
            }
            let inode_bytes: [u8; INODE_SIZE] = block[offset + 4..offset + 4 + INODE_SIZE]
                .try_into()
                .unwrap();
            table.insert(inode_num, Inode::from_bytes(&inode_bytes));
            offset += INODE_RECORD_SIZE;
        }
        Ok(table)
    }

    fn write_inode_table(&mut self) -> FsResult<()> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut offset = 0usize;
        for (&num, inode) in self.inode_table.iter() {
            if offset + INODE_RECORD_SIZE > BLOCK_SIZE {
                // Guarded by INODE_TABLE_CAPACITY at create_file/create_directory time.
                break;
            }
            block[offset..offset + 4].copy_from_slice(&num.to_le_bytes());
            block[offset + 4..offset + 4 + INODE_SIZE].copy_from_slice(&inode.to_bytes());
            offset += INODE_RECORD_SIZE;
        }
        self.device.write_block(2, &block)
    }

    fn sync(&mut self) -> FsResult<()> {
        self.superblock.free_blocks = self.allocator.free_blocks();
        self.device.write_block(0, &self.superblock.to_bytes())?;
        Self::write_bitmap(&mut self.device, &self.allocator)?;
        self.write_inode_table()?;
        log::debug!("synced filesystem ({} free blocks)", self.superblock.free_blocks);
        Ok(())
    }
}
