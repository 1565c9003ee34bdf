//! On-disk file metadata records.

use serde::Serialize;

/// Size in bytes of one packed inode record.
pub const INODE_SIZE: usize = 128;

/// Number of direct block pointers an inode carries.
pub const DIRECT_BLOCKS: usize = 12;

/// Maximum size, in bytes, of a regular file (no indirect blocks).
pub const MAX_FILE_SIZE: u64 = (DIRECT_BLOCKS as u64) * crate::block_device::BLOCK_SIZE as u64;

/// Type of the file an inode describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
}

impl FileType {
    fn from_byte(b: u8) -> Self {
        match b {
            2 => FileType::Directory,
            // Unknown values fall back to REGULAR, matching the source.
            _ => FileType::Regular,
        }
    }

    fn to_byte(self) -> u8 {
        self as u8
    }
}

impl Serialize for FileType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            FileType::Regular => "REGULAR",
            FileType::Directory => "DIRECTORY",
        })
    }
}

/// A 128-byte on-disk metadata record describing one file or directory.
///
/// `indirect_block` and `double_indirect_block` are carried for on-disk
/// compatibility but are never resolved (see spec's Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub file_type: FileType,
    pub size: u32,
    pub block_count: u32,
    pub direct_blocks: [u32; DIRECT_BLOCKS],
    pub indirect_block: u32,
    pub double_indirect_block: u32,
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
}

impl Inode {
    /// Builds a fresh inode of the given type, stamping all three
    /// timestamps with `now`.
    pub fn new(file_type: FileType, now: u64) -> Self {
        Self {
            file_type,
            size: 0,
            block_count: 0,
            direct_blocks: [0; DIRECT_BLOCKS],
            indirect_block: 0,
            double_indirect_block: 0,
            created: now,
            modified: now,
            accessed: now,
        }
    }

    /// Deserializes an inode from a 128-byte record.
    pub fn from_bytes(data: &[u8; INODE_SIZE]) -> Self {
        let mut direct_blocks = [0u32; DIRECT_BLOCKS];
        for (i, slot) in direct_blocks.iter_mut().enumerate() {
            let off = 12 + i * 4;
            *slot = u32::from_le_bytes(data[off..off + 4].try_into().unwrap());
        }
        Self {
            file_type: FileType::from_byte(data[0]),
            size: u32::from_le_bytes(data[4..8].try_into().unwrap()),
            block_count: u32::from_le_bytes(data[8..12].try_into().unwrap()),
            direct_blocks,
            indirect_block: u32::from_le_bytes(data[60..64].try_into().unwrap()),
            double_indirect_block: u32::from_le_bytes(data[64..68].try_into().unwrap()),
            created: u64::from_le_bytes(data[68..76].try_into().unwrap()),
            modified: u64::from_le_bytes(data[76..84].try_into().unwrap()),
            accessed: u64::from_le_bytes(data[84..92].try_into().unwrap()),
        }
    }

    /// Serializes the inode into a zero-initialized 128-byte record.
    pub fn to_bytes(&self) -> [u8; INODE_SIZE] {
        let mut data = [0u8; INODE_SIZE];
        data[0] = self.file_type.to_byte();
        data[4..8].copy_from_slice(&self.size.to_le_bytes());
        data[8..12].copy_from_slice(&self.block_count.to_le_bytes());
        for (i, block) in self.direct_blocks.iter().enumerate() {
            let off = 12 + i * 4;
            data[off..off + 4].copy_from_slice(&block.to_le_bytes());
        }
        data[60..64].copy_from_slice(&self.indirect_block.to_le_bytes());
        data[64..68].copy_from_slice(&self.double_indirect_block.to_le_bytes());
        data[68..76].copy_from_slice(&self.created.to_le_bytes());
        data[76..84].copy_from_slice(&self.modified.to_le_bytes());
        data[84..92].copy_from_slice(&self.accessed.to_le_bytes());
        data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_preserves_all_fields() {
        let mut inode = Inode::new(FileType::Regular, 1_700_000_000);
        inode.size = 5000;
        inode.block_count = 2;
        inode.direct_blocks[0] = 10;
        inode.direct_blocks[1] = 11;
        inode.modified = 1_700_000_500;

        let bytes = inode.to_bytes();
        let decoded = Inode::from_bytes(&bytes);
        assert_eq!(inode, decoded);
    }

    #[test]
    fn unknown_file_type_byte_decodes_as_regular() {
        let mut bytes = [0u8; INODE_SIZE];
        bytes[0] = 200;
        let inode = Inode::from_bytes(&bytes);
        assert_eq!(inode.file_type, FileType::Regular);
    }

    #[test]
    fn directory_type_roundtrips() {
        let inode = Inode::new(FileType::Directory, 42);
        let decoded = Inode::from_bytes(&inode.to_bytes());
        assert_eq!(decoded.file_type, FileType::Directory);
    }

    #[test]
    fn max_file_size_is_48_kib() {
        assert_eq!(MAX_FILE_SIZE, 48 * 1024);
    }
}
