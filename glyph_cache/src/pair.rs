// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The font/matrix pair directory.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use core::hash::BuildHasher;

use foldhash::fast::FixedState;

use crate::config::EvictionPolicy;
use crate::font::{FontDescriptor, FontId, FontType, Uid};
use crate::kurbo::Affine;
use crate::xfont::ExternalSource;

/// Seed for pair scramble values. Fixed so that layouts are reproducible.
const SCRAMBLE_SEED: u64 = 0x5eed_ca5e;

/// Handle to a [`CachedFmPair`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PairRef {
    index: u32,
    generation: u32,
}

impl PairRef {
    #[cfg(test)]
    pub(crate) const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot of the pair in the directory.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A font (or font UID) paired with the linear part of a character transform.
pub struct CachedFmPair {
    pub(crate) font: Option<FontId>,
    pub(crate) uid: Option<Uid>,
    pub(crate) font_type: FontType,
    /// `xx`, `xy`, `yx` and `yy` of the character transform.
    pub(crate) matrix: [f64; 4],
    pub(crate) scramble: u32,
    pub(crate) num_chars: usize,
    pub(crate) xfont_tried: bool,
    pub(crate) xfont: Option<Box<dyn ExternalSource>>,
}

impl CachedFmPair {
    /// The font the pair currently refers to, if any.
    ///
    /// Pairs keyed by UID drop their font when it is purged and pick up the next font
    /// with the same UID.
    pub fn font(&self) -> Option<FontId> {
        self.font
    }

    /// The persistent identity the pair is keyed by, if any.
    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    /// The font type recorded with the UID.
    pub fn font_type(&self) -> FontType {
        self.font_type
    }

    /// The linear part of the character transform.
    pub fn matrix(&self) -> Affine {
        let [xx, xy, yx, yy] = self.matrix;
        Affine::new([xx, xy, yx, yy, 0.0, 0.0])
    }

    /// Number of cached characters that belong to this pair.
    pub fn num_chars(&self) -> usize {
        self.num_chars
    }

    /// Whether an external glyph source has been looked up for this pair.
    pub fn xfont_tried(&self) -> bool {
        self.xfont_tried
    }

    /// Whether the pair holds an external glyph source.
    pub fn has_xfont(&self) -> bool {
        self.xfont.is_some()
    }

    pub(crate) fn is_keyed_by_uid(&self) -> bool {
        self.uid.is_some()
    }
}

impl Debug for CachedFmPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CachedFmPair")
            .field("font", &self.font)
            .field("uid", &self.uid)
            .field("font_type", &self.font_type)
            .field("matrix", &self.matrix)
            .field("num_chars", &self.num_chars)
            .field("xfont_tried", &self.xfont_tried)
            .field("has_xfont", &self.xfont.is_some())
            .finish_non_exhaustive()
    }
}

/// Returns the four linear coefficients of a transform, in pair order.
pub(crate) fn linear_coeffs(transform: Affine) -> [f64; 4] {
    let [xx, xy, yx, yy, _, _] = transform.as_coeffs();
    [xx, xy, yx, yy]
}

struct PairSlot {
    generation: u32,
    pair: Option<CachedFmPair>,
}

/// Fixed-capacity table of font/matrix pairs with a rotating cursor.
pub(crate) struct PairDirectory {
    slots: Vec<PairSlot>,
    /// Slot after the most recently added pair.
    next: usize,
    len: usize,
    policy: EvictionPolicy,
    hasher: FixedState,
}

impl PairDirectory {
    pub(crate) fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| PairSlot {
                    generation: 0,
                    pair: None,
                })
                .collect(),
            next: 0,
            len: 0,
            policy,
            hasher: FixedState::with_seed(SCRAMBLE_SEED),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn pair_ref(&self, index: usize) -> PairRef {
        PairRef {
            index: u32::try_from(index).unwrap_or(u32::MAX),
            generation: self.slots[index].generation,
        }
    }

    pub(crate) fn get(&self, r: PairRef) -> Option<&CachedFmPair> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.pair.as_ref()
    }

    pub(crate) fn get_mut(&mut self, r: PairRef) -> Option<&mut CachedFmPair> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.pair.as_mut()
    }

    /// Looks for a pair matching `font` under `transform`, scanning backwards from the
    /// cursor so that recently added pairs are found first.
    pub(crate) fn find(&mut self, font: &FontDescriptor, transform: Affine) -> Option<PairRef> {
        let matrix = linear_coeffs(transform);
        let uid = font.cache_uid();
        let capacity = self.slots.len();
        for step in 1..=capacity {
            let index = (self.next + capacity - step) % capacity;
            let Some(pair) = self.slots[index].pair.as_mut() else {
                continue;
            };
            let identity = match uid {
                Some(uid) => pair.uid.as_ref() == Some(uid) && pair.font_type == font.font_type,
                None => !pair.is_keyed_by_uid() && pair.font == Some(font.id),
            };
            if !identity || pair.matrix != matrix {
                continue;
            }
            if pair.font.is_none() {
                log::debug!("re-attaching {:?} to pair {index}", font.id);
                pair.font = Some(font.id);
            }
            return Some(self.pair_ref(index));
        }
        None
    }

    /// Picks the slot for a new pair. If the table is full, the victim is returned so the
    /// caller can purge it first.
    pub(crate) fn choose_slot(&self) -> (usize, Option<PairRef>) {
        let capacity = self.slots.len();
        if self.len < capacity {
            let index = (0..capacity)
                .map(|step| (self.next + step) % capacity)
                .find(|&i| self.slots[i].pair.is_none())
                .unwrap_or(self.next);
            return (index, None);
        }
        let index = match self.policy {
            EvictionPolicy::PreferUnreferenced => (0..capacity)
                .map(|step| (self.next + step) % capacity)
                .find(|&i| {
                    self.slots[i]
                        .pair
                        .as_ref()
                        .is_some_and(|p| p.num_chars == 0)
                })
                .unwrap_or(self.next),
            EvictionPolicy::RoundRobin => self.next,
        };
        (index, Some(self.pair_ref(index)))
    }

    /// Installs a new pair in a free slot chosen by [`Self::choose_slot`].
    pub(crate) fn insert_at(
        &mut self,
        index: usize,
        font: &FontDescriptor,
        transform: Affine,
    ) -> PairRef {
        let uid = font.cache_uid().cloned();
        let slot = &mut self.slots[index];
        debug_assert!(slot.pair.is_none(), "pair slot {index} still in use");
        let scramble = self.hasher.hash_one((index, slot.generation)) % 549;
        slot.pair = Some(CachedFmPair {
            font: Some(font.id),
            uid,
            font_type: font.font_type,
            matrix: linear_coeffs(transform),
            scramble: u32::try_from(scramble).unwrap_or_default(),
            num_chars: 0,
            xfont_tried: false,
            xfont: None,
        });
        self.len += 1;
        self.next = (index + 1) % self.slots.len();
        log::debug!(
            "adding pair {index}: {:?} {:?} {:?}",
            font.id,
            font.cache_uid(),
            linear_coeffs(transform)
        );
        self.pair_ref(index)
    }

    /// Frees a pair slot, returning the pair. Its characters must already be gone.
    pub(crate) fn remove(&mut self, r: PairRef) -> Option<CachedFmPair> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        let pair = slot.pair.take()?;
        debug_assert_eq!(pair.num_chars, 0, "pair freed with characters");
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        Some(pair)
    }

    /// Every live pair.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (PairRef, &CachedFmPair)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.pair.as_ref().map(|pair| {
                (
                    PairRef {
                        index: u32::try_from(index).unwrap_or(u32::MAX),
                        generation: slot.generation,
                    },
                    pair,
                )
            })
        })
    }

    /// Drops every pair. Outstanding handles stop resolving.
    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.pair.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.len = 0;
        self.next = 0;
    }
}

impl Debug for PairDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PairDirectory")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("next", &self.next)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::PaintType;
    use crate::kurbo::Rect;

    fn font(id: u64) -> FontDescriptor {
        FontDescriptor::new(FontId(id), FontType::Type1, Rect::new(0.0, 0.0, 1000.0, 1000.0))
    }

    fn add(dir: &mut PairDirectory, font: &FontDescriptor, transform: Affine) -> PairRef {
        let (index, victim) = dir.choose_slot();
        if let Some(victim) = victim {
            dir.remove(victim);
        }
        dir.insert_at(index, font, transform)
    }

    #[test]
    fn matches_font_and_exact_matrix() {
        let mut dir = PairDirectory::new(4, EvictionPolicy::default());
        let f = font(1);
        let scale = Affine::scale(12.0);
        let r = add(&mut dir, &f, scale);
        assert_eq!(dir.find(&f, scale), Some(r));
        assert_eq!(dir.find(&f, scale.then_translate((5.0, 5.0).into())), Some(r));
        assert_eq!(dir.find(&f, Affine::scale(12.000001)), None);
        assert_eq!(dir.find(&font(2), scale), None);
    }

    #[test]
    fn uid_pairs_outlive_their_font() {
        let mut dir = PairDirectory::new(4, EvictionPolicy::default());
        let mut a = font(1);
        a.uid = Some(Uid::unique_id(42));
        let r = add(&mut dir, &a, Affine::IDENTITY);
        dir.get_mut(r).unwrap().font = None;

        let mut b = font(2);
        b.uid = Some(Uid::unique_id(42));
        assert_eq!(dir.find(&b, Affine::IDENTITY), Some(r));
        assert_eq!(dir.get(r).unwrap().font(), Some(FontId(2)), "font re-attached");

        b.font_type = FontType::Type42;
        assert_eq!(dir.find(&b, Affine::IDENTITY), None, "font type is part of the key");
    }

    #[test]
    fn stroked_fonts_are_keyed_by_identity() {
        let mut dir = PairDirectory::new(4, EvictionPolicy::default());
        let mut a = font(1);
        a.uid = Some(Uid::unique_id(42));
        a.paint_type = PaintType::Stroked;
        let r = add(&mut dir, &a, Affine::IDENTITY);
        assert!(dir.get(r).unwrap().uid().is_none());

        let mut b = font(2);
        b.uid = Some(Uid::unique_id(42));
        b.paint_type = PaintType::Stroked;
        assert_eq!(dir.find(&b, Affine::IDENTITY), None);
    }

    #[test]
    fn full_table_prefers_pairs_without_chars() {
        let mut dir = PairDirectory::new(3, EvictionPolicy::PreferUnreferenced);
        let refs: Vec<_> = (0..3)
            .map(|i| add(&mut dir, &font(i), Affine::IDENTITY))
            .collect();
        dir.get_mut(refs[0]).unwrap().num_chars = 2;
        dir.get_mut(refs[2]).unwrap().num_chars = 1;
        let (index, victim) = dir.choose_slot();
        assert_eq!(victim, Some(refs[1]));
        assert_eq!(index, 1);
    }

    #[test]
    fn round_robin_ignores_char_counts() {
        let mut dir = PairDirectory::new(2, EvictionPolicy::RoundRobin);
        let a = add(&mut dir, &font(1), Affine::IDENTITY);
        let b = add(&mut dir, &font(2), Affine::IDENTITY);
        dir.get_mut(a).unwrap().num_chars = 1;
        // The cursor wrapped to slot 0 after filling slot 1.
        assert_eq!(dir.choose_slot().1, Some(a));
        assert_ne!(a, b);
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut dir = PairDirectory::new(1, EvictionPolicy::default());
        let a = add(&mut dir, &font(1), Affine::IDENTITY);
        let b = add(&mut dir, &font(2), Affine::IDENTITY);
        assert_eq!(a.index(), b.index());
        assert!(dir.get(a).is_none());
        assert!(dir.get(b).is_some());
        assert_eq!(dir.len(), 1);
    }
}
