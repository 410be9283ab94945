// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chunked storage for character bitmaps.
//!
//! The arena grows in chunks up to a byte budget. Each chunk is carved into blocks that
//! together cover every byte of the chunk; a rover marks where the next allocation
//! starts. Once the budget is spent, allocation cycles through the chunks, evicting
//! whatever blocks lie in the rover's way.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

/// Allocation granularity in bytes.
pub(crate) const ALIGN: usize = 8;

/// Smallest block worth tracking on its own. Smaller remainders stay attached to the
/// block in front of them.
pub(crate) const MIN_BLOCK: usize = 16;

const fn round_up(size: usize) -> usize {
    (size + ALIGN - 1) & !(ALIGN - 1)
}

/// Where a block lives in an [`Arena`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Location {
    chunk: usize,
    offset: usize,
    len: usize,
}

impl Location {
    /// Index of the chunk holding the block.
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// Byte offset of the block inside its chunk.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the block in bytes, including any absorbed slack.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is empty. Blocks are never empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Memory accounting for an [`Arena`].
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct ArenaStats {
    /// Number of chunks allocated so far.
    pub chunks: usize,
    /// Bytes held by all chunks.
    pub reserved_bytes: usize,
    /// Bytes in blocks that have an owner.
    pub used_bytes: usize,
    /// Bytes in free blocks.
    pub free_bytes: usize,
    /// Number of blocks that have an owner.
    pub live_blocks: usize,
    /// Blocks reclaimed from their owner to make room.
    pub evictions: u64,
}

#[derive(Clone, Debug)]
struct Block<T> {
    len: usize,
    owner: Option<T>,
}

struct Chunk<T> {
    data: Vec<u8>,
    /// Blocks keyed by their offset. Contiguous, starting at zero, ending at capacity.
    blocks: BTreeMap<usize, Block<T>>,
}

impl<T> Chunk<T> {
    fn new(len: usize) -> Self {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, Block { len, owner: None });
        Self {
            data: vec![0; len],
            blocks,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn reset(&mut self) {
        self.blocks.clear();
        self.blocks.insert(
            0,
            Block {
                len: self.capacity(),
                owner: None,
            },
        );
    }
}

/// A byte budgeted, chunked block allocator with in-place eviction.
///
/// Blocks are tagged with an owner of type `T`. When allocation needs space held by an
/// owned block, the owner is handed to the caller's eviction callback and the block is
/// reused.
pub struct Arena<T> {
    chunks: Vec<Chunk<T>>,
    /// Chunk allocations are made from.
    current: usize,
    /// Next allocation offset inside the current chunk.
    rover: usize,
    max_bytes: usize,
    reserved: usize,
    evictions: u64,
}

impl<T: Copy + Debug> Arena<T> {
    /// Creates an empty arena that will grow up to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            chunks: Vec::new(),
            current: 0,
            rover: 0,
            max_bytes,
            reserved: 0,
            evictions: 0,
        }
    }

    /// Size of each new chunk, before capping by the remaining budget.
    fn chunk_size(&self) -> usize {
        round_up(self.max_bytes / 5 + 1)
    }

    /// Allocates a zeroed block of at least `size` bytes owned by `owner`.
    ///
    /// Owners of blocks reclaimed to make room are passed to `on_evict`, in storage
    /// order. Returns `None` if no chunk, even fully evicted, can hold the request.
    pub fn allocate(
        &mut self,
        size: usize,
        owner: T,
        mut on_evict: impl FnMut(T),
    ) -> Option<Location> {
        let size = round_up(size.max(1));
        if !self.chunks.is_empty() {
            if let Some(loc) = self.allocate_in_current(size, owner, &mut on_evict) {
                return Some(loc);
            }
        }
        if self.reserved < self.max_bytes {
            let len = self
                .chunk_size()
                .min(self.max_bytes - self.reserved)
                & !(ALIGN - 1);
            if size > len {
                log::debug!("{size} bytes exceed a fresh {len} byte chunk");
            } else {
                let index = self.chunks.len();
                log::debug!("adding arena chunk {index} of {len} bytes");
                self.chunks.push(Chunk::new(len));
                self.reserved += len;
                self.current = index;
                self.rover = 0;
                return self.allocate_in_current(size, owner, &mut on_evict);
            }
        }
        // Cycle through the chunks, ending with the one we started from.
        for _ in 0..self.chunks.len() {
            self.current = (self.current + 1) % self.chunks.len();
            self.rover = 0;
            log::trace!("cycling to arena chunk {}", self.current);
            if let Some(loc) = self.allocate_in_current(size, owner, &mut on_evict) {
                return Some(loc);
            }
        }
        None
    }

    /// Allocates at the rover of the current chunk, evicting blocks in the way.
    fn allocate_in_current(
        &mut self,
        size: usize,
        owner: T,
        on_evict: &mut impl FnMut(T),
    ) -> Option<Location> {
        let chunk = &mut self.chunks[self.current];
        let start = self.rover;
        if chunk.capacity() - start < size {
            return None;
        }
        // Gather blocks from the rover until the run is long enough.
        let mut len = 0;
        while len < size {
            let Some(block) = chunk.blocks.remove(&(start + len)) else {
                debug_assert!(false, "blocks must tile the chunk");
                return None;
            };
            if let Some(victim) = block.owner {
                log::trace!("evicting {victim:?} at {}:{}", self.current, start + len);
                self.evictions += 1;
                on_evict(victim);
            }
            len += block.len;
        }
        let remainder = len - size;
        let len = if remainder < MIN_BLOCK {
            len
        } else {
            chunk.blocks.insert(
                start + size,
                Block {
                    len: remainder,
                    owner: None,
                },
            );
            size
        };
        chunk.blocks.insert(
            start,
            Block {
                len,
                owner: Some(owner),
            },
        );
        chunk.data[start..start + len].fill(0);
        self.rover = start + len;
        Some(Location {
            chunk: self.current,
            offset: start,
            len,
        })
    }

    /// Frees a block, returning its owner.
    ///
    /// A block that ends at the rover pulls the rover back to its start.
    pub fn free(&mut self, loc: Location) -> Option<T> {
        let chunk = self.chunks.get_mut(loc.chunk)?;
        let block = chunk.blocks.get_mut(&loc.offset)?;
        debug_assert_eq!(block.len, loc.len, "stale location {loc:?}");
        let owner = block.owner.take();
        if loc.chunk == self.current && loc.offset + loc.len == self.rover {
            self.rover = loc.offset;
            self.coalesce_at_rover();
        }
        owner
    }

    /// Merges the free blocks starting at the rover into one.
    fn coalesce_at_rover(&mut self) {
        let chunk = &mut self.chunks[self.current];
        let start = self.rover;
        let Some(Block { len, owner: None }) = chunk.blocks.get(&start).cloned() else {
            return;
        };
        let mut len = len;
        while let Some(Block { len: next, owner: None }) =
            chunk.blocks.get(&(start + len)).cloned()
        {
            chunk.blocks.remove(&(start + len));
            len += next;
        }
        if let Some(block) = chunk.blocks.get_mut(&start) {
            block.len = len;
        }
    }

    /// Shrinks a block in place to `new_size` bytes, keeping its leading bytes.
    ///
    /// The tail is released only if it is at least [`MIN_BLOCK`] bytes after rounding;
    /// otherwise the block keeps its slack. Returns the updated location.
    pub fn shorten(&mut self, loc: Location, new_size: usize) -> Location {
        let new_len = round_up(new_size.max(1));
        if new_len > loc.len || loc.len - new_len < MIN_BLOCK {
            return loc;
        }
        let Some(chunk) = self.chunks.get_mut(loc.chunk) else {
            return loc;
        };
        let Some(block) = chunk.blocks.get_mut(&loc.offset) else {
            return loc;
        };
        block.len = new_len;
        chunk.blocks.insert(
            loc.offset + new_len,
            Block {
                len: loc.len - new_len,
                owner: None,
            },
        );
        if loc.chunk == self.current && loc.offset + loc.len == self.rover {
            self.rover = loc.offset + new_len;
            self.coalesce_at_rover();
        }
        log::trace!("shortened {loc:?} to {new_len} bytes");
        Location {
            len: new_len,
            ..loc
        }
    }

    /// The bytes of a block.
    pub fn data(&self, loc: Location) -> &[u8] {
        &self.chunks[loc.chunk].data[loc.offset..loc.offset + loc.len]
    }

    /// The bytes of a block, mutably.
    pub fn data_mut(&mut self, loc: Location) -> &mut [u8] {
        &mut self.chunks[loc.chunk].data[loc.offset..loc.offset + loc.len]
    }

    /// Frees every block, keeping the chunks. Owners are not reported.
    pub fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.reset();
        }
        self.current = 0;
        self.rover = 0;
    }

    /// Current memory accounting.
    pub fn stats(&self) -> ArenaStats {
        let mut stats = ArenaStats {
            chunks: self.chunks.len(),
            reserved_bytes: self.reserved,
            evictions: self.evictions,
            ..ArenaStats::default()
        };
        for block in self.chunks.iter().flat_map(|c| c.blocks.values()) {
            if block.owner.is_some() {
                stats.used_bytes += block.len;
                stats.live_blocks += 1;
            } else {
                stats.free_bytes += block.len;
            }
        }
        stats
    }

    /// The byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Changes the byte budget.
    ///
    /// While the chunks hold more than `max_bytes`, the newest chunk is released and the
    /// owners of its blocks are passed to `on_evict`. Locations in the remaining chunks
    /// stay valid.
    pub fn set_max_bytes(&mut self, max_bytes: usize, mut on_evict: impl FnMut(T)) {
        self.max_bytes = max_bytes;
        while self.reserved > max_bytes {
            let Some(chunk) = self.chunks.pop() else {
                break;
            };
            self.reserved -= chunk.capacity();
            log::debug!(
                "releasing arena chunk {} of {} bytes",
                self.chunks.len(),
                chunk.capacity()
            );
            for victim in chunk.blocks.into_values().filter_map(|block| block.owner) {
                self.evictions += 1;
                on_evict(victim);
            }
        }
        if self.current >= self.chunks.len() {
            self.current = self.chunks.len().saturating_sub(1);
            self.rover = 0;
        }
    }

    /// Checks that the blocks of every chunk tile it exactly.
    #[cfg(test)]
    pub(crate) fn assert_tiled(&self) {
        for (i, chunk) in self.chunks.iter().enumerate() {
            let mut expected = 0;
            for (&offset, block) in &chunk.blocks {
                assert_eq!(offset, expected, "gap or overlap in chunk {i}");
                assert!(block.len > 0, "empty block in chunk {i}");
                expected += block.len;
            }
            assert_eq!(expected, chunk.capacity(), "chunk {i} not fully tiled");
        }
    }
}

impl<T> Debug for Arena<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("chunks", &self.chunks.len())
            .field("current", &self.current)
            .field("rover", &self.rover)
            .field("reserved", &self.reserved)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn first_chunk_is_a_fifth_of_the_budget() {
        let mut arena = Arena::new(1000);
        let loc = arena.allocate(10, 1_u32, |_| panic!("nothing to evict")).unwrap();
        assert_eq!(loc.offset(), 0);
        assert_eq!(loc.len(), 16);
        let stats = arena.stats();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.reserved_bytes, 208);
        assert_eq!(stats.used_bytes + stats.free_bytes, stats.reserved_bytes);
        arena.assert_tiled();
    }

    #[test]
    fn lowered_budget_releases_newest_chunks() {
        let mut arena = Arena::new(1000);
        let mut locs = Vec::new();
        // Four 208 byte chunks hold five blocks each, the last 168 byte chunk four.
        for owner in 0..24_u32 {
            locs.push(arena.allocate(40, owner, |_| panic!("budget not reached")).unwrap());
        }
        assert_eq!(arena.stats().chunks, 5);
        assert_eq!(arena.stats().reserved_bytes, 1000);

        let mut evicted = Vec::new();
        arena.set_max_bytes(500, |victim| evicted.push(victim));
        let stats = arena.stats();
        assert!(stats.reserved_bytes <= 500, "{stats:?}");
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.live_blocks, 10);
        assert_eq!(evicted.len(), 14);
        assert!(evicted.iter().all(|&owner| locs[owner as usize].chunk() >= 2));
        arena.assert_tiled();

        // The arena keeps working inside the new budget.
        for owner in 30..60_u32 {
            assert!(arena.allocate(40, owner, |_| {}).is_some());
        }
        assert!(arena.stats().reserved_bytes <= 500);
        arena.assert_tiled();
    }

    #[test]
    fn raised_budget_keeps_everything() {
        let mut arena = Arena::new(200);
        arena.allocate(40, 1_u32, |_| {}).unwrap();
        arena.set_max_bytes(2000, |_| panic!("nothing to release"));
        assert_eq!(arena.max_bytes(), 2000);
        assert_eq!(arena.stats().live_blocks, 1);
    }

    #[test]
    fn request_larger_than_a_chunk_fails() {
        let mut arena = Arena::new(1000);
        assert!(arena.allocate(300, 1_u32, |_| {}).is_none());
    }

    #[test]
    fn small_remainder_is_absorbed() {
        let mut arena = Arena::new(100);
        // Chunk of 24 bytes; 16 requested leaves 8, below the minimum block.
        let loc = arena.allocate(16, 1_u32, |_| {}).unwrap();
        assert_eq!(loc.len(), 24);
        arena.assert_tiled();
    }

    #[test]
    fn full_budget_evicts_in_storage_order() {
        let mut arena = Arena::new(200);
        // Chunks are 48 bytes. Four of them leave an 8 byte tail too small to use.
        let mut owners = Vec::new();
        for i in 0..8_u32 {
            owners.push(arena.allocate(24, i, |_| panic!("budget not spent")).unwrap());
        }
        assert_eq!(arena.stats().chunks, 4);
        let mut evicted = Vec::new();
        let loc = arena.allocate(24, 100, |v| evicted.push(v)).unwrap();
        assert_eq!(evicted, [0], "oldest block of the next chunk goes first");
        assert_eq!(loc, owners[0]);
        let mut evicted = Vec::new();
        // No room behind the rover, so the next chunk is recycled from its start.
        let loc = arena.allocate(40, 101, |v| evicted.push(v)).unwrap();
        assert_eq!(evicted, [2, 3]);
        assert_eq!(loc.chunk(), owners[2].chunk());
        assert_eq!(loc.len(), 48, "8 byte remainder is absorbed");
        assert_eq!(arena.stats().chunks, 4);
        arena.assert_tiled();
    }

    #[test]
    fn free_at_rover_pulls_it_back() {
        let mut arena = Arena::new(1000);
        let a = arena.allocate(32, 1_u32, |_| {}).unwrap();
        let b = arena.allocate(32, 2_u32, |_| {}).unwrap();
        assert_eq!(arena.free(b), Some(2));
        let c = arena.allocate(48, 3_u32, |_| panic!("space is free")).unwrap();
        assert_eq!(c.offset(), a.offset() + a.len(), "reuses the freed block");
        arena.assert_tiled();
    }

    #[test]
    fn shorten_keeps_leading_bytes() {
        let mut arena = Arena::new(1000);
        let loc = arena.allocate(96, 1_u32, |_| {}).unwrap();
        for (byte, value) in arena.data_mut(loc).iter_mut().zip(0_u8..) {
            *byte = value;
        }
        let short = arena.shorten(loc, 40);
        assert_eq!(short.len(), 40);
        let expected: Vec<u8> = (0..40).collect();
        assert_eq!(arena.data(short), expected.as_slice());
        // The released tail is reused by the next allocation.
        let next = arena.allocate(8, 2_u32, |_| {}).unwrap();
        assert_eq!(next.offset(), 40);
        arena.assert_tiled();
    }

    #[test]
    fn shorten_below_minimum_keeps_slack() {
        let mut arena = Arena::new(1000);
        let loc = arena.allocate(64, 1_u32, |_| {}).unwrap();
        let same = arena.shorten(loc, 56);
        assert_eq!(same, loc);
        arena.assert_tiled();
    }

    #[test]
    fn conservation_holds_through_churn() {
        let mut arena = Arena::new(2000);
        let mut live: Vec<(u32, Location)> = Vec::new();
        for i in 0..200_u32 {
            let size = 8 + (i as usize * 37) % 150;
            let mut evicted = Vec::new();
            let loc = arena.allocate(size, i, |v| evicted.push(v));
            live.retain(|(owner, _)| !evicted.contains(owner));
            if let Some(loc) = loc {
                live.push((i, loc));
            }
            if i % 3 == 0 {
                if let Some((owner, loc)) = live.pop() {
                    assert_eq!(arena.free(loc), Some(owner));
                }
            }
            let stats = arena.stats();
            assert_eq!(stats.used_bytes + stats.free_bytes, stats.reserved_bytes);
            assert_eq!(stats.live_blocks, live.len());
            assert!(stats.reserved_bytes <= 2000, "budget exceeded");
            arena.assert_tiled();
        }
    }
}
