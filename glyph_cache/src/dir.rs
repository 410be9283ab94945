// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The font directory: one cache context owning pairs, characters and bitmaps.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::arena::{Arena, ArenaStats, Location};
use crate::bits::bitmap_raster;
use crate::blit::{self, Blit, CharDevice, Mask};
use crate::chars::{CachedChar, CharDirectory, CharRef};
use crate::config::{CacheConfig, CacheLimits};
use crate::error::{CacheError, RenderError};
use crate::font::{BitmapId, FontDescriptor, FontId, GlyphId, IntRect, Uid, WritingMode};
use crate::kurbo::{Affine, Point, Vec2};
use crate::pair::{CachedFmPair, PairDirectory, PairRef};
use crate::peniko::Brush;
use crate::render::{
    self, GlyphRasterizer, Log2Scale, RasterStatus, RasterTarget, ShowState,
};
use crate::xfont::{self, ExternalSourceProvider, SourceRequest};

/// Counters describing a [`FontDir`].
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct CacheStats {
    /// Live font/matrix pairs.
    pub pairs: usize,
    /// Pair slots.
    pub max_pairs: usize,
    /// Live characters.
    pub chars: usize,
    /// Character directory slots.
    pub char_capacity: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Largest final bitmap that will be cached, in bytes.
    pub max_single_entry_bytes: usize,
    /// Bitmap storage.
    pub arena: ArenaStats,
    /// Byte budget of the bitmap storage.
    pub max_arena_bytes: usize,
}

/// A character cache context.
///
/// Every cache operation is a method on this type; separate directories share nothing.
pub struct FontDir {
    config: CacheConfig,
    arena: Arena<CharRef>,
    chars: CharDirectory,
    pairs: PairDirectory,
    /// Registered original fonts, keyed by UID, with their key names.
    originals: HashMap<Uid, SmallVec<[(FontId, String); 2]>>,
    next_bitmap_id: u64,
    hits: u64,
    misses: u64,
}

impl FontDir {
    /// Creates an empty directory.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            arena: Arena::new(config.max_arena_bytes),
            chars: CharDirectory::new(config.max_chars_hint),
            pairs: PairDirectory::new(config.max_pairs, config.eviction),
            originals: HashMap::new(),
            next_bitmap_id: 0,
            hits: 0,
            misses: 0,
            config,
        })
    }

    /// The current configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Changes the byte budget and the largest cacheable bitmap.
    ///
    /// Lowering the budget releases bitmap storage, dropping the characters held in it.
    /// Characters already cached above a lowered entry limit stay until evicted.
    pub fn set_limits(&mut self, limits: CacheLimits) -> Result<(), CacheError> {
        let config = CacheConfig {
            max_arena_bytes: limits.max_arena_bytes,
            max_single_entry_bytes: limits.max_single_entry_bytes,
            ..self.config.clone()
        };
        config.validate()?;
        log::debug!("changing cache limits to {limits:?}");
        let Self {
            arena,
            chars,
            pairs,
            ..
        } = self;
        arena.set_max_bytes(limits.max_arena_bytes, |victim| {
            forget_char(chars, pairs, victim);
        });
        self.config = config;
        Ok(())
    }

    /// Finds or creates the pair for `font` under `transform`.
    ///
    /// Only the linear part of `transform` matters. When every slot is in use, a pair is
    /// purged to make room; this never fails.
    pub fn lookup_fm_pair(&mut self, font: &FontDescriptor, transform: Affine) -> PairRef {
        if let Some(pair) = self.pairs.find(font, transform) {
            return pair;
        }
        let (index, victim) = self.pairs.choose_slot();
        if let Some(victim) = victim {
            log::debug!("pair table full, evicting pair {}", victim.index());
            self.purge_pair(victim, false);
        }
        self.pairs.insert_at(index, font, transform)
    }

    /// Looks up a cached character. Mask entries answer lookups at any depth.
    pub fn lookup_cached_char(
        &mut self,
        pair: PairRef,
        glyph: GlyphId,
        wmode: WritingMode,
        alpha_bits: u8,
    ) -> Option<CharRef> {
        let found = self.pairs.get(pair).and_then(|p| {
            let depth = render::normalize_alpha_bits(alpha_bits);
            self.chars.lookup(glyph, pair, p.scramble, wmode, depth)
        });
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Caches a character supplied by the pair's external glyph source, without
    /// rendering it.
    ///
    /// The source is looked up through `provider` the first time a pair needs one.
    /// Returns `None` if the pair has no source or the source doesn't know the glyph.
    pub fn lookup_external_char<P: ExternalSourceProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        font: &FontDescriptor,
        pair: PairRef,
        code: u32,
        glyph: GlyphId,
        wmode: WritingMode,
    ) -> Option<CharRef> {
        let p = self.pairs.get(pair)?;
        if p.font != Some(font.id) {
            return None;
        }
        if !p.xfont_tried {
            self.try_external_source(provider, font, pair);
        }
        let p = self.pairs.get_mut(pair)?;
        let scramble = p.scramble;
        let source = p.xfont.as_mut()?;
        let xglyph = source.char_xglyph(code, font.encoding_index, glyph)?;
        let metrics = source.char_metrics(xglyph, wmode)?;

        let bbox = metrics.bbox;
        let width = u32::try_from(bbox.x1.saturating_sub(bbox.x0)).unwrap_or(0);
        let height = u32::try_from(bbox.y1.saturating_sub(bbox.y0)).unwrap_or(0);
        let raster = bitmap_raster(width as usize);
        let size = raster * height as usize;
        if size > self.config.max_single_entry_bytes {
            log::debug!("external {glyph:?} too large to cache: {width}x{height}");
            return None;
        }
        let mut entry = CachedChar::new(glyph, pair, scramble, wmode);
        entry.width = width;
        entry.height = height;
        entry.raster = raster;
        entry.wxy = metrics.advance;
        entry.offset = Vec2::new(-f64::from(bbox.x0), -f64::from(bbox.y0));
        entry.xglyph = Some(xglyph);
        let r = self.alloc_char(entry, size)?;
        self.link_char(r);
        log::debug!("added external {glyph:?} as {r:?}");
        Some(r)
    }

    /// Asks `provider` for a source for the pair, trying each candidate name in turn.
    fn try_external_source<P: ExternalSourceProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        font: &FontDescriptor,
        pair: PairRef,
    ) {
        let Some(p) = self.pairs.get_mut(pair) else {
            return;
        };
        p.xfont_tried = true;
        if !provider.has_sources() {
            return;
        }
        let originals = font
            .cache_uid()
            .and_then(|uid| self.originals.get(uid))
            .into_iter()
            .flatten()
            .map(|(_, name)| name.as_str());
        let matrix = p.matrix();
        for name in xfont::candidate_names(font, originals) {
            let request = SourceRequest {
                name,
                matrix,
                uid: font.cache_uid(),
                encoding_index: font.encoding_index,
            };
            if let Some(source) = provider.external_glyph_source_for(&request) {
                log::debug!("external source {name:?} for pair {}", pair.index());
                p.xfont = Some(source);
                return;
            }
        }
        log::trace!("no external source for pair {}", pair.index());
    }

    /// Renders a character with `rasterizer` and caches the result.
    ///
    /// [`RenderError::Uncacheable`] means this occurrence should be drawn without the
    /// cache; nothing is left behind. Errors from the rasterizer are passed through.
    pub fn render_and_cache<R, S>(
        &mut self,
        rasterizer: &mut R,
        state: &S,
        font: &FontDescriptor,
        pair: PairRef,
        glyph: GlyphId,
        wmode: WritingMode,
    ) -> Result<CharRef, RenderError<R::Error>>
    where
        R: GlyphRasterizer + ?Sized,
        S: ShowState + ?Sized,
    {
        let [xx, xy, yx, yy, _, _] = state.current_char_transform().as_coeffs();
        let linear = Affine::new([xx, xy, yx, yy, 0.0, 0.0]);
        let pair = match self.pairs.get(pair) {
            Some(_) => pair,
            None => self.lookup_fm_pair(font, linear),
        };
        let scramble = self.pairs.get(pair).map_or(0, |p| p.scramble);
        let depth = render::normalize_alpha_bits(state.alpha_bits());

        let metrics = rasterizer
            .glyph_metrics(glyph, wmode)
            .map_err(RenderError::Rasterizer)?;
        let scale = render::choose_scale(
            linear,
            font.font_bbox,
            font.paint_type,
            depth,
            self.config.oversample,
        );
        // Without oversampling there is nothing to compress to alpha.
        let depth = if scale.is_oversampled() { depth } else { 1 };
        let advance = Vec2::new(
            xx * metrics.advance.x + yx * metrics.advance.y,
            xy * metrics.advance.x + yy * metrics.advance.y,
        );
        let mut compress_threshold = self.config.compress_threshold;
        let (r, loc, plan) = loop {
            let plan = render::plan_char(
                metrics.bbox,
                linear,
                scale,
                depth,
                self.config.max_single_entry_bytes,
                compress_threshold,
            )?;

            let mut entry = CachedChar::new(glyph, pair, scramble, wmode);
            entry.depth = depth;
            entry.width = plan.width;
            entry.height = plan.height;
            entry.raster = plan.raster;
            entry.offset = plan.offset;
            entry.wxy = advance;
            let Some(r) = self.alloc_char(entry, plan.size) else {
                return Err(CacheError::out_of_space(plan.width, plan.height, plan.size).into());
            };
            let Some(loc) = self.chars.get(r).and_then(|cc| cc.location) else {
                self.abandon_char(r);
                return Err(CacheError::out_of_space(plan.width, plan.height, plan.size).into());
            };

            let buf = self.arena.data_mut(loc);
            let (status, complete) = {
                let mut target = if plan.banded {
                    RasterTarget::banded(buf, plan.iwidth, plan.iheight, scale, depth)
                } else {
                    RasterTarget::mono(buf, plan.iwidth, plan.iheight)
                };
                let status =
                    rasterizer.render_outline(glyph, plan.raster_transform(linear), &mut target);
                (status, target.finish())
            };
            match status {
                Ok(RasterStatus::Rendered) if complete => break (r, loc, plan),
                Ok(RasterStatus::Rendered) => {
                    log::debug!("{glyph:?} went back to a finished band, rendering in one pass");
                    self.abandon_char(r);
                    compress_threshold = usize::MAX;
                }
                Ok(RasterStatus::Declined) => {
                    log::debug!("rasterizer declined to cache {glyph:?}");
                    self.abandon_char(r);
                    return Err(CacheError::rasterizer_failure(plan.width, plan.height).into());
                }
                Err(err) => {
                    self.abandon_char(r);
                    return Err(RenderError::Rasterizer(err));
                }
            }
        };

        // Banded characters are already compressed; only trimming is left.
        let scale = if plan.banded { Log2Scale::ONE } else { scale };
        self.add_char_bits(r, loc, scale);
        self.link_char(r);
        log::debug!("added {glyph:?} at depth {depth} as {r:?}");
        Ok(r)
    }

    /// Compresses and trims the bitmap of `r`, then gives it a bitmap id.
    fn add_char_bits(&mut self, r: CharRef, loc: Location, scale: Log2Scale) {
        let Some(cc) = self.chars.get_mut(r) else {
            return;
        };
        let finished = render::finish_bits(
            self.arena.data_mut(loc),
            cc.height,
            cc.raster,
            scale,
            cc.depth,
        );
        cc.width = finished.width;
        cc.height = finished.height;
        cc.raster = finished.raster;
        cc.offset -= finished.trim;
        cc.location = Some(
            self.arena
                .shorten(loc, finished.raster * finished.height as usize),
        );
        cc.id = Some(BitmapId(self.next_bitmap_id));
        self.next_bitmap_id += 1;
    }

    /// Reserves an entry and storage for it, making room in the directory and arena.
    fn alloc_char(&mut self, mut entry: CachedChar, size: usize) -> Option<CharRef> {
        if self.chars.is_full() {
            // The probe table must keep an empty slot to terminate lookups.
            let victim = self
                .chars
                .occupant_of_head(entry.glyph, entry.scramble)
                .or_else(|| self.chars.iter().next().map(|(r, _)| r));
            if let Some(victim) = victim {
                log::debug!("char table full, evicting {victim:?}");
                self.drop_char(victim);
            }
        }
        entry.location = None;
        let Self {
            arena,
            chars,
            pairs,
            ..
        } = self;
        let r = chars.reserve(entry);
        let loc = arena.allocate(size, r, |victim| {
            forget_char(chars, pairs, victim);
        });
        if let Some(loc) = loc {
            if let Some(cc) = chars.get_mut(r) {
                cc.location = Some(loc);
                return Some(r);
            }
            arena.free(loc);
        }
        log::debug!("no arena space for {size} bytes");
        chars.release(r);
        None
    }

    /// Makes a reserved entry visible to lookups.
    fn link_char(&mut self, r: CharRef) {
        let Some(pair) = self.chars.get(r).map(|cc| cc.pair) else {
            return;
        };
        self.chars.link(r);
        if let Some(p) = self.pairs.get_mut(pair) {
            p.num_chars += 1;
        }
    }

    /// Drops a reserved entry that never got linked.
    fn abandon_char(&mut self, r: CharRef) {
        if let Some(cc) = self.chars.release(r) {
            if let Some(loc) = cc.location {
                self.arena.free(loc);
            }
        }
    }

    /// Removes a linked entry and frees its storage.
    fn drop_char(&mut self, r: CharRef) {
        if let Some(loc) = self.chars.get(r).and_then(|cc| cc.location) {
            self.arena.free(loc);
        }
        forget_char(&mut self.chars, &mut self.pairs, r);
    }

    /// Draws a cached character with its origin at `origin`, in device space.
    ///
    /// Characters from an external source are drawn by the source when possible, or
    /// rendered into the cache on first use.
    pub fn blit_cached_char<D, S>(
        &mut self,
        device: &mut D,
        state: &S,
        r: CharRef,
        origin: Point,
    ) -> Result<Blit, D::Error>
    where
        D: CharDevice + ?Sized,
        S: ShowState + ?Sized,
    {
        let Some(mut xglyph) = self.chars.get(r).map(|cc| cc.xglyph) else {
            return Ok(Blit::Fallback);
        };
        let clip = state.effective_clip_bbox();
        let paint = state.paint();
        let (tx, ty) = state.char_translation();
        loop {
            let Some(cc) = self.chars.get(r) else {
                return Ok(Blit::Fallback);
            };
            let x = round_to_pixel(origin.x - cc.offset.x).saturating_add(tx);
            let y = round_to_pixel(origin.y - cc.offset.y).saturating_add(ty);
            let bounds = IntRect::from_origin_size(x, y, cc.width, cc.height);
            if bounds.intersect(&clip).is_empty() {
                return Ok(Blit::Done);
            }
            if let Some(xg) = xglyph {
                let offset = cc.offset;
                let (has_bits, pair, loc) = (cc.has_bits(), cc.pair, cc.location);
                let (width, height) = (cc.width, cc.height);
                if let Some(source) = self.pairs.get_mut(pair).and_then(|p| p.xfont.as_mut()) {
                    if let Brush::Solid(color) = paint {
                        let at = Point::new(f64::from(x) + offset.x, f64::from(y) + offset.y);
                        if source.render_direct(xg, at, *color) {
                            return Ok(Blit::Done);
                        }
                    }
                    if !has_bits {
                        let Some(loc) = loc else {
                            return Ok(Blit::Fallback);
                        };
                        let buf = self.arena.data_mut(loc);
                        buf.fill(0);
                        let mut target = RasterTarget::mono(buf, width, height);
                        if !source.render_mask(xg, offset.to_point(), &mut target) {
                            log::debug!("external source could not render {xg:?}");
                            return Ok(Blit::Fallback);
                        }
                        self.add_char_bits(r, loc, Log2Scale::ONE);
                        xglyph = None;
                        continue;
                    }
                }
            }
            let Some(mask) = self.mask(cc) else {
                return Ok(Blit::Fallback);
            };
            blit::draw_mask(device, paint, mask, x, y, clip)?;
            return Ok(Blit::Done);
        }
    }

    fn mask<'a>(&'a self, cc: &CachedChar) -> Option<Mask<'a>> {
        if !cc.has_bits() {
            return None;
        }
        let data = self.arena.data(cc.location?);
        Some(Mask::new(
            data,
            cc.raster,
            cc.depth,
            cc.width,
            cc.height,
            cc.id,
        ))
    }

    /// Purges everything cached for a font that is going away.
    ///
    /// Pairs keyed by UID survive without their font reference, so a later font with the
    /// same UID reuses them.
    pub fn purge_font(&mut self, font: FontId) {
        let pairs: Vec<_> = self
            .pairs
            .iter()
            .filter(|(_, p)| p.font == Some(font))
            .map(|(r, p)| (r, p.is_keyed_by_uid()))
            .collect();
        for (r, keyed_by_uid) in pairs {
            if keyed_by_uid {
                if let Some(p) = self.pairs.get_mut(r) {
                    log::debug!("detaching {font:?} from pair {}", r.index());
                    p.font = None;
                }
            } else {
                self.purge_pair(r, false);
            }
        }
    }

    /// Purges a pair.
    ///
    /// The external source is always released. With `xfont_only`, only characters that
    /// depend on it (those without bits) are removed and the pair stays; otherwise every
    /// character goes and the slot is freed.
    pub fn purge_pair(&mut self, pair: PairRef, xfont_only: bool) {
        let Some(p) = self.pairs.get_mut(pair) else {
            return;
        };
        log::debug!("purging pair {} (xfont only: {xfont_only})", pair.index());
        p.xfont = None;
        p.xfont_tried = false;
        self.purge_selected_chars(|cc| cc.pair == pair && (!xfont_only || !cc.has_bits()));
        if !xfont_only {
            self.pairs.remove(pair);
        }
    }

    /// Removes every character selected by `select`. Returns how many were removed.
    pub fn purge_selected_chars(&mut self, select: impl FnMut(&CachedChar) -> bool) -> usize {
        let Self {
            arena,
            chars,
            pairs,
            ..
        } = self;
        let mut removed = 0;
        chars.purge_selected(select, |cc| {
            if let Some(loc) = cc.location {
                arena.free(loc);
            }
            if let Some(p) = pairs.get_mut(cc.pair) {
                p.num_chars = p.num_chars.saturating_sub(1);
            }
            removed += 1;
        });
        removed
    }

    /// Records an original font, making its key name available to fonts sharing its UID
    /// when they look for an external source. Fonts without a usable UID are ignored.
    pub fn register_font(&mut self, font: &FontDescriptor) {
        let Some(uid) = font.cache_uid() else {
            return;
        };
        let entries = self.originals.entry(uid.clone()).or_default();
        if !entries.iter().any(|(id, _)| *id == font.id) {
            entries.push((font.id, font.key_name.clone()));
        }
    }

    /// Forgets an original font recorded by [`Self::register_font`].
    pub fn unregister_font(&mut self, font: &FontDescriptor) {
        let Some(uid) = font.cache_uid() else {
            return;
        };
        if let Some(entries) = self.originals.get_mut(uid) {
            entries.retain(|(id, _)| *id != font.id);
            if entries.is_empty() {
                self.originals.remove(uid);
            }
        }
    }

    /// Returns a cached character.
    pub fn char_info(&self, r: CharRef) -> Option<&CachedChar> {
        self.chars.get(r)
    }

    /// Returns the bitmap of a cached character, if it has one.
    pub fn char_bits(&self, r: CharRef) -> Option<Mask<'_>> {
        self.mask(self.chars.get(r)?)
    }

    /// Returns a pair.
    pub fn pair_info(&self, pair: PairRef) -> Option<&CachedFmPair> {
        self.pairs.get(pair)
    }

    /// Every live pair.
    pub fn pairs(&self) -> impl Iterator<Item = (PairRef, &CachedFmPair)> + '_ {
        self.pairs.iter()
    }

    /// Every live character.
    pub fn chars(&self) -> impl Iterator<Item = (CharRef, &CachedChar)> + '_ {
        self.chars.iter()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pairs: self.pairs.len(),
            max_pairs: self.pairs.capacity(),
            chars: self.chars.len(),
            char_capacity: self.chars.capacity(),
            hits: self.hits,
            misses: self.misses,
            max_single_entry_bytes: self.config.max_single_entry_bytes,
            arena: self.arena.stats(),
            max_arena_bytes: self.arena.max_bytes(),
        }
    }

    /// Drops every pair and character, releasing external sources. Registered fonts,
    /// counters and arena chunks are kept.
    pub fn clear(&mut self) {
        log::debug!("clearing font directory");
        self.chars.clear();
        self.pairs.clear();
        self.arena.clear();
    }
}

/// Unlinks an entry whose storage is already gone.
fn forget_char(chars: &mut CharDirectory, pairs: &mut PairDirectory, r: CharRef) {
    if let Some(cc) = chars.remove(r) {
        log::trace!("forgetting {:?} of pair {}", cc.glyph, cc.pair.index());
        if let Some(p) = pairs.get_mut(cc.pair) {
            p.num_chars = p.num_chars.saturating_sub(1);
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "device coordinates are far inside the i32 range"
)]
fn round_to_pixel(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

impl Debug for FontDir {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let stats = self.stats();
        f.debug_struct("FontDir")
            .field("config", &self.config)
            .field("pairs", &stats.pairs)
            .field("chars", &stats.chars)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .field("arena", &self.arena)
            .finish_non_exhaustive()
    }
}
