//! Directory-entry codec.
//!
//! Entries are packed contiguously in a directory's single data block, with
//! a zero byte at the start of a record position marking the end of the
//! list. Names are raw UTF-8 and must not contain an embedded NUL, or the
//! end-of-entries scan would desynchronize (see [`DirEntry::encode`]).

use crate::error::FsError;
use crate::error::FsResult;

/// A single `(inode_num, name)` directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_num: u32,
    pub name: String,
}

impl DirEntry {
    pub fn new(inode_num: u32, name: impl Into<String>) -> Self {
        Self {
            inode_num,
            name: name.into(),
        }
    }

    /// Decodes one entry starting at the beginning of `data`, returning the
    /// entry and the number of bytes it consumed (`8 + name_len`).
    ///
    /// Invalid UTF-8 in the name is replaced per `String::from_utf8_lossy`.
    /// `name_len` is read straight off disk, so a corrupted or
    /// foreign-written block can claim a length that overruns `data`; this
    /// is reported as [`FsError::CorruptImage`] rather than panicking.
    pub fn decode(data: &[u8]) -> FsResult<(Self, usize)> {
        if data.len() < 8 {
            return Err(FsError::CorruptImage(
                "truncated directory entry header".to_string(),
            ));
        }
        let inode_num = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let name_len = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        let available = data.len() - 8;
        if name_len > available {
            return Err(FsError::CorruptImage(format!(
                "directory entry name length {name_len} exceeds {available} available bytes"
            )));
        }
        let name = String::from_utf8_lossy(&data[8..8 + name_len]).into_owned();
        Ok((Self { inode_num, name }, 8 + name_len))
    }

    /// Encodes the entry to its exact byte representation (no padding).
    ///
    /// Rejects names containing a NUL byte: such a name would plant a zero
    /// byte mid-record and be mistaken for the end-of-entries marker on the
    /// next scan. This is a write-path data-integrity guard, not a usage
    /// error — it does not reuse [`FsError::UsageError`], which is reserved
    /// for malformed command dispatch.
    pub fn encode(&self) -> FsResult<Vec<u8>> {
        if self.name.as_bytes().contains(&0) {
            return Err(FsError::InvalidName(format!(
                "name {:?} contains an embedded NUL byte",
                self.name
            )));
        }
        let name_bytes = self.name.as_bytes();
        let mut data = Vec::with_capacity(8 + name_bytes.len());
        data.extend_from_slice(&self.inode_num.to_le_bytes());
        data.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        data.extend_from_slice(name_bytes);
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_preserves_inode_num_and_name() {
        let entry = DirEntry::new(7, "readme.txt");
        let encoded = entry.encode().unwrap();
        let (decoded, consumed) = DirEntry::decode(&encoded).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, 8 + "readme.txt".len());
    }

    #[test]
    fn bytes_consumed_matches_formula() {
        let entry = DirEntry::new(1, "a");
        let encoded = entry.encode().unwrap();
        assert_eq!(encoded.len(), 8 + 1);
    }

    #[test]
    fn invalid_utf8_decodes_with_replacement() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0xFE]);
        let (entry, consumed) = DirEntry::decode(&data).unwrap();
        assert_eq!(consumed, 10);
        assert!(entry.name.contains('\u{FFFD}'));
    }

    #[test]
    fn embedded_nul_is_rejected_at_encode_time() {
        let entry = DirEntry::new(1, "bad\0name");
        assert!(matches!(entry.encode(), Err(FsError::InvalidName(_))));
    }

    #[test]
    fn oversized_name_len_is_reported_as_corrupt_instead_of_panicking() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(b"short");
        assert!(matches!(DirEntry::decode(&data), Err(FsError::CorruptImage(_))));
    }

    #[test]
    fn truncated_header_is_reported_as_corrupt() {
        let data = [1u8, 2, 3];
        assert!(matches!(DirEntry::decode(&data), Err(FsError::CorruptImage(_))));
    }
}
