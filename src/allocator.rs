//! Bitmap-based free block management.

/// Number of blocks reserved for metadata (superblock, bitmap, inode table)
/// and marked used at initialization time.
pub const RESERVED_BLOCKS: u32 = 10;

/// Tracks which blocks are in use via a one-bit-per-block bitmap.
pub struct BlockAllocator {
    total_blocks: u32,
    bitmap: Vec<u8>,
}

impl BlockAllocator {
    /// Builds a fresh allocator with the first [`RESERVED_BLOCKS`] blocks
    /// marked allocated.
    pub fn new(total_blocks: u32) -> Self {
        let bitmap = vec![0u8; Self::bitmap_len(total_blocks)];
        let mut allocator = Self {
            total_blocks,
            bitmap,
        };
        for i in 0..RESERVED_BLOCKS.min(total_blocks) {
            allocator.set_allocated(i, true);
        }
        allocator
    }

    /// Adopts a serialized bitmap as-is.
    pub fn from_bytes(data: &[u8], total_blocks: u32) -> Self {
        let mut bitmap = data.to_vec();
        bitmap.resize(Self::bitmap_len(total_blocks), 0);
        Self {
            total_blocks,
            bitmap,
        }
    }

    fn bitmap_len(total_blocks: u32) -> usize {
        ((total_blocks as usize) + 7) / 8
    }

    /// Scans from block 0 for the lowest-indexed free block, marks it
    /// allocated, and returns it. Returns `None` if the device is full.
    pub fn allocate_block(&mut self) -> Option<u32> {
        for i in 0..self.total_blocks {
            if !self.is_allocated(i) {
                self.set_allocated(i, true);
                log::debug!("allocated block {i}");
                return Some(i);
            }
        }
        log::warn!("no free blocks available ({} total)", self.total_blocks);
        None
    }

    /// Clears the allocation bit for `block_num`. A no-op if out of range.
    pub fn free_block(&mut self, block_num: u32) {
        if block_num >= self.total_blocks {
            return;
        }
        self.set_allocated(block_num, false);
        log::debug!("freed block {block_num}");
    }

    /// Whether `block_num` is currently allocated.
    pub fn is_allocated(&self, block_num: u32) -> bool {
        let byte_idx = (block_num / 8) as usize;
        let bit_idx = block_num % 8;
        match self.bitmap.get(byte_idx) {
            Some(byte) => byte & (1 << bit_idx) != 0,
            None => false,
        }
    }

    fn set_allocated(&mut self, block_num: u32, allocated: bool) {
        let byte_idx = (block_num / 8) as usize;
        let bit_idx = block_num % 8;
        let Some(byte) = self.bitmap.get_mut(byte_idx) else {
            return;
        };
        if allocated {
            *byte |= 1 << bit_idx;
        } else {
            *byte &= !(1 << bit_idx);
        }
    }

    /// Serializes the bitmap as-is (no block-size padding applied here).
    pub fn to_bytes(&self) -> &[u8] {
        &self.bitmap
    }

    /// Counts the free (zero) bits across the full `total_blocks` range.
    pub fn free_blocks(&self) -> u32 {
        (0..self.total_blocks)
            .filter(|&i| !self.is_allocated(i))
            .count() as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_reserves_first_ten_blocks() {
        let alloc = BlockAllocator::new(256);
        for i in 0..10 {
            assert!(alloc.is_allocated(i));
        }
        assert!(!alloc.is_allocated(10));
    }

    #[test]
    fn allocate_returns_lowest_free_block() {
        let mut alloc = BlockAllocator::new(256);
        assert_eq!(alloc.allocate_block(), Some(10));
        assert_eq!(alloc.allocate_block(), Some(11));
    }

    #[test]
    fn free_then_allocate_reuses_the_block() {
        let mut alloc = BlockAllocator::new(256);
        let a = alloc.allocate_block().unwrap();
        let b = alloc.allocate_block().unwrap();
        alloc.free_block(a);
        assert_eq!(alloc.allocate_block(), Some(a));
        assert_ne!(a, b);
    }

    #[test]
    fn allocate_returns_none_when_full() {
        let mut alloc = BlockAllocator::new(12);
        for _ in 0..2 {
            assert!(alloc.allocate_block().is_some());
        }
        assert_eq!(alloc.allocate_block(), None);
    }

    #[test]
    fn free_out_of_range_is_a_no_op() {
        let mut alloc = BlockAllocator::new(16);
        alloc.free_block(1000);
        assert_eq!(alloc.free_blocks(), 6);
    }

    #[test]
    fn free_blocks_matches_bitmap_zero_count() {
        let mut alloc = BlockAllocator::new(256);
        let before = alloc.free_blocks();
        alloc.allocate_block();
        assert_eq!(alloc.free_blocks(), before - 1);
    }

    #[test]
    fn from_bytes_adopts_serialized_bitmap() {
        let mut alloc = BlockAllocator::new(64);
        alloc.allocate_block();
        let bytes = alloc.to_bytes().to_vec();
        let restored = BlockAllocator::from_bytes(&bytes, 64);
        for i in 0..64 {
            assert_eq!(alloc.is_allocated(i), restored.is_allocated(i));
        }
    }
}
