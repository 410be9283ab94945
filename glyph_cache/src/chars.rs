// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cached characters and the open-addressed directory that finds them.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::arena::Location;
use crate::font::{BitmapId, GlyphId, WritingMode};
use crate::kurbo::Vec2;
use crate::pair::PairRef;
use crate::xfont::XGlyph;

/// Handle to a [`CachedChar`].
///
/// Handles carry a generation, so a handle to an evicted character never resolves to
/// whatever later reuses its slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CharRef {
    index: u32,
    generation: u32,
}

/// A character bitmap held by the cache.
#[derive(Clone, Debug)]
pub struct CachedChar {
    pub(crate) glyph: GlyphId,
    pub(crate) pair: PairRef,
    /// The pair's scramble value, kept so the entry can rehash itself.
    pub(crate) scramble: u32,
    pub(crate) wmode: WritingMode,
    pub(crate) depth: u8,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) raster: usize,
    pub(crate) id: Option<BitmapId>,
    pub(crate) wxy: Vec2,
    pub(crate) offset: Vec2,
    pub(crate) xglyph: Option<XGlyph>,
    pub(crate) location: Option<Location>,
}

impl CachedChar {
    pub(crate) fn new(glyph: GlyphId, pair: PairRef, scramble: u32, wmode: WritingMode) -> Self {
        Self {
            glyph,
            pair,
            scramble,
            wmode,
            depth: 1,
            width: 0,
            height: 0,
            raster: 0,
            id: None,
            wxy: Vec2::ZERO,
            offset: Vec2::ZERO,
            xglyph: None,
            location: None,
        }
    }

    /// The glyph this bitmap renders.
    pub fn glyph(&self) -> GlyphId {
        self.glyph
    }

    /// The font/matrix pair the character belongs to.
    pub fn pair(&self) -> PairRef {
        self.pair
    }

    /// Writing mode the character was rendered for.
    pub fn wmode(&self) -> WritingMode {
        self.wmode
    }

    /// Bits per pixel: 1 for a mask, 2 or 4 for alpha.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Width in device pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in device pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per bitmap row.
    pub fn raster(&self) -> usize {
        self.raster
    }

    /// Identifier of the finished bitmap. `None` until the bits are final.
    pub fn bitmap_id(&self) -> Option<BitmapId> {
        self.id
    }

    /// Whether the cached bitmap is final.
    pub fn has_bits(&self) -> bool {
        self.id.is_some()
    }

    /// Device-space advance.
    pub fn advance(&self) -> Vec2 {
        self.wxy
    }

    /// Device-space vector from the bitmap origin to the glyph origin.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Glyph handle of the pair's external source, if the character came from one.
    pub fn xglyph(&self) -> Option<XGlyph> {
        self.xglyph
    }

    /// Arena block holding the bitmap.
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Whether this entry can serve a lookup at `depth`. One-bit masks serve every depth.
    fn serves_depth(&self, depth: u8) -> bool {
        self.depth == 1 || self.depth == depth
    }
}

struct Slot {
    generation: u32,
    entry: Option<CachedChar>,
}

/// Open-addressed table of cached characters.
///
/// Entries live in a slab addressed by [`CharRef`]. The probe table holds the linked
/// subset; an entry may sit in the slab unlinked while its bitmap is being built.
pub(crate) struct CharDirectory {
    table: Vec<Option<CharRef>>,
    mask: usize,
    slots: Vec<Slot>,
    free: Vec<u32>,
    linked: usize,
}

impl CharDirectory {
    /// Creates a directory sized for about `hint` characters.
    pub(crate) fn new(hint: usize) -> Self {
        let capacity = (((hint + hint / 2) | 31) + 1).next_power_of_two();
        Self {
            table: vec![None; capacity],
            mask: capacity - 1,
            slots: Vec::new(),
            free: Vec::new(),
            linked: 0,
        }
    }

    /// Number of probe slots.
    pub(crate) fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Number of linked characters.
    pub(crate) fn len(&self) -> usize {
        self.linked
    }

    /// Whether linking another character would leave no empty probe slot.
    pub(crate) fn is_full(&self) -> bool {
        self.linked + 1 >= self.table.len()
    }

    fn head(&self, glyph: GlyphId, scramble: u32) -> usize {
        glyph.0.wrapping_mul(0x23).wrapping_add(scramble) as usize & self.mask
    }

    pub(crate) fn get(&self, r: CharRef) -> Option<&CachedChar> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn get_mut(&mut self, r: CharRef) -> Option<&mut CachedChar> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Finds the entry for a glyph of `pair` at `depth`.
    pub(crate) fn lookup(
        &self,
        glyph: GlyphId,
        pair: PairRef,
        scramble: u32,
        wmode: WritingMode,
        depth: u8,
    ) -> Option<CharRef> {
        let mut index = self.head(glyph, scramble);
        while let Some(r) = self.table[index] {
            if let Some(cc) = self.get(r) {
                if cc.glyph == glyph && cc.pair == pair && cc.wmode == wmode && cc.serves_depth(depth)
                {
                    return Some(r);
                }
            }
            log::trace!("probe miss at {index} for {glyph:?}");
            index = (index + 1) & self.mask;
        }
        None
    }

    /// Stores an entry in the slab without linking it.
    pub(crate) fn reserve(&mut self, entry: CachedChar) -> CharRef {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                CharRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                CharRef {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Drops an entry from the slab. It must already be unlinked.
    pub(crate) fn release(&mut self, r: CharRef) -> Option<CachedChar> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(r.index);
        Some(entry)
    }

    /// Links a reserved entry into the probe table at the first empty slot of its chain.
    pub(crate) fn link(&mut self, r: CharRef) {
        let Some(cc) = self.get(r) else {
            return;
        };
        let mut index = self.head(cc.glyph, cc.scramble);
        while self.table[index].is_some() {
            index = (index + 1) & self.mask;
        }
        self.table[index] = Some(r);
        self.linked += 1;
    }

    /// Finds the probe slot holding `r`.
    fn slot_of(&self, r: CharRef) -> Option<usize> {
        let cc = self.get(r)?;
        let mut index = self.head(cc.glyph, cc.scramble);
        while let Some(occupant) = self.table[index] {
            if occupant == r {
                return Some(index);
            }
            index = (index + 1) & self.mask;
        }
        None
    }

    /// Unlinks and drops an entry.
    pub(crate) fn remove(&mut self, r: CharRef) -> Option<CachedChar> {
        if let Some(index) = self.slot_of(r) {
            self.remove_at(index);
        }
        self.release(r)
    }

    /// Clears probe slot `gap` and pulls later members of the chain back so that every
    /// entry stays reachable from its head.
    fn remove_at(&mut self, mut gap: usize) {
        self.table[gap] = None;
        self.linked -= 1;
        let mut from = (gap + 1) & self.mask;
        while let Some(r) = self.table[from] {
            let home = self
                .get(r)
                .map_or(from, |cc| self.head(cc.glyph, cc.scramble));
            // Move the entry if the probe from its head passes the gap before reaching it.
            let displaced = from.wrapping_sub(home) & self.mask;
            let distance = from.wrapping_sub(gap) & self.mask;
            if displaced >= distance {
                log::trace!("relocating char from {from} to {gap}");
                self.table[gap] = Some(r);
                self.table[from] = None;
                gap = from;
            }
            from = (from + 1) & self.mask;
        }
    }

    /// Removes every linked entry selected by `select`, handing each to `on_remove`.
    pub(crate) fn purge_selected(
        &mut self,
        mut select: impl FnMut(&CachedChar) -> bool,
        mut on_remove: impl FnMut(CachedChar),
    ) {
        let mut index = 0;
        while index < self.table.len() {
            let selected = self.table[index]
                .and_then(|r| self.get(r).map(|cc| (r, select(cc))));
            match selected {
                Some((r, true)) => {
                    // Relocation may refill this slot, so look at it again.
                    self.remove_at(index);
                    if let Some(cc) = self.release(r) {
                        on_remove(cc);
                    }
                }
                _ => index += 1,
            }
        }
    }

    /// The linked entry occupying the head slot of `glyph` under `scramble`.
    pub(crate) fn occupant_of_head(&self, glyph: GlyphId, scramble: u32) -> Option<CharRef> {
        self.table[self.head(glyph, scramble)]
    }

    /// Every linked entry, in table order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (CharRef, &CachedChar)> + '_ {
        self.table
            .iter()
            .flatten()
            .filter_map(|&r| self.get(r).map(|cc| (r, cc)))
    }

    /// Drops every entry. Outstanding handles stop resolving.
    pub(crate) fn clear(&mut self) {
        self.table.fill(None);
        self.linked = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(u32::try_from(index).unwrap_or(u32::MAX));
            }
        }
    }

    /// Checks that every linked entry is found by probing from its head.
    #[cfg(test)]
    pub(crate) fn assert_reachable(&self) {
        let mut count = 0;
        for (r, _) in self.iter() {
            assert!(self.slot_of(r).is_some(), "{r:?} unreachable from its head");
            count += 1;
        }
        assert_eq!(count, self.linked, "linked count out of sync");
    }
}

impl Debug for CharDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CharDirectory")
            .field("capacity", &self.table.len())
            .field("linked", &self.linked)
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}
