// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering characters into the cache.
//!
//! A character is rasterized into scratch storage inside its own arena block, possibly
//! oversampled, then compressed to its final depth and trimmed to the set pixels before
//! it becomes visible to lookups.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::bits::{self, BitBox, Compress, Plane, bitmap_raster};
use crate::error::CacheError;
use crate::font::{GlyphId, IntRect, PaintType, WritingMode};
use crate::kurbo::{Affine, Point, Rect, Vec2};
use crate::peniko::Brush;

/// Oversampling factors, as powers of two.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct Log2Scale {
    /// Horizontal factor.
    pub x: u8,
    /// Vertical factor.
    pub y: u8,
}

impl Log2Scale {
    /// No oversampling.
    pub const ONE: Self = Self { x: 0, y: 0 };

    /// Whether either axis is oversampled.
    pub fn is_oversampled(&self) -> bool {
        self.x != 0 || self.y != 0
    }
}

/// Graphics state of the current show operation.
pub trait ShowState {
    /// Device-space clip box. Characters outside it are not drawn.
    fn effective_clip_bbox(&self) -> IntRect;

    /// The transform from character space to device space.
    fn current_char_transform(&self) -> Affine;

    /// Bits of alpha the device wants for text: 1, 2 or 4.
    fn alpha_bits(&self) -> u8;

    /// The current paint.
    fn paint(&self) -> &Brush;

    /// Integer translation applied to every character position.
    fn char_translation(&self) -> (i32, i32) {
        (0, 0)
    }
}

/// Metrics a glyph program reports before it is rendered.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GlyphMetrics {
    /// Advance in character space.
    pub advance: Vec2,
    /// Ink bounds in character space.
    pub bbox: Rect,
}

/// Outcome of [`GlyphRasterizer::render_outline`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RasterStatus {
    /// The glyph was drawn into the target.
    Rendered,
    /// The glyph can't be cached, for example because it sets colors itself.
    Declined,
}

/// The glyph-building side of a font: produces metrics and draws outlines.
pub trait GlyphRasterizer {
    /// Error raised by the glyph program.
    type Error;

    /// Returns the metrics of a glyph.
    fn glyph_metrics(
        &mut self,
        glyph: GlyphId,
        wmode: WritingMode,
    ) -> Result<GlyphMetrics, Self::Error>;

    /// Draws a glyph into `target` using `transform`, which maps character space onto
    /// the target's pixels.
    fn render_outline(
        &mut self,
        glyph: GlyphId,
        transform: Affine,
        target: &mut RasterTarget<'_>,
    ) -> Result<RasterStatus, Self::Error>;
}

/// A one-bit drawing surface handed to rasterizers.
///
/// Pixels are set by filling spans; drawing outside the target is clipped.
pub struct RasterTarget<'a> {
    buf: &'a mut [u8],
    width: u32,
    height: u32,
    kind: TargetKind,
    /// A band was drawn into again after it was compressed.
    revisited: bool,
}

enum TargetKind {
    /// A full bitmap at the start of the buffer.
    Mono { raster: usize },
    /// A band of oversampled rows that is compressed into an alpha bitmap as the
    /// rasterizer moves down the glyph.
    Banded {
        alpha: Plane,
        band: Plane,
        band_rows: usize,
        band_y: Option<usize>,
        /// Bands already compressed, by index.
        flushed: Vec<bool>,
        scale: Log2Scale,
        depth: u8,
    },
}

impl<'a> RasterTarget<'a> {
    pub(crate) fn mono(buf: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            buf,
            width,
            height,
            kind: TargetKind::Mono {
                raster: bitmap_raster(width as usize),
            },
            revisited: false,
        }
    }

    pub(crate) fn banded(
        buf: &'a mut [u8],
        width: u32,
        height: u32,
        scale: Log2Scale,
        depth: u8,
    ) -> Self {
        let alpha_raster = bitmap_raster(((width >> scale.x) as usize) << log2_depth(depth));
        let alpha_rows = (height >> scale.y) as usize;
        let band_rows = 2_usize << scale.y;
        Self {
            buf,
            width,
            height,
            kind: TargetKind::Banded {
                alpha: Plane {
                    offset: 0,
                    raster: alpha_raster,
                },
                band: Plane {
                    offset: alpha_raster * alpha_rows,
                    raster: bitmap_raster(width as usize),
                },
                band_rows,
                band_y: None,
                flushed: vec![false; (height as usize).div_ceil(band_rows)],
                scale,
                depth,
            },
            revisited: false,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sets pixels `x0..x1` of row `y`.
    pub fn fill_span(&mut self, y: i32, x0: i32, x1: i32) {
        let clamp = |x: i32| usize::try_from(x).unwrap_or(0).min(self.width as usize);
        let (x0, x1) = (clamp(x0), clamp(x1));
        let Ok(y) = usize::try_from(y) else {
            return;
        };
        if y >= self.height as usize || x0 >= x1 {
            return;
        }
        let (offset, raster) = match self.kind {
            TargetKind::Mono { raster } => (y * raster, raster),
            TargetKind::Banded { band, .. } => {
                let Some(band_row) = self.select_band(y) else {
                    return;
                };
                (band.offset + band_row * band.raster, band.raster)
            }
        };
        bits::fill_bits(&mut self.buf[offset..offset + raster], x0, x1);
    }

    /// Sets every pixel of `rect`, given in pixels with exclusive upper bounds.
    pub fn fill_rect(&mut self, rect: IntRect) {
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        for y in rect.y0.max(0)..rect.y1.min(height) {
            self.fill_span(y, rect.x0, rect.x1);
        }
    }

    /// Makes `y` part of the current band, flushing the previous band if needed.
    /// Returns the row within the band, or `None` once the target has been spoiled by
    /// drawing into a band that was already compressed.
    fn select_band(&mut self, y: usize) -> Option<usize> {
        let TargetKind::Banded {
            band_rows, band_y, ..
        } = self.kind
        else {
            return Some(y);
        };
        if self.revisited {
            return None;
        }
        let start = y / band_rows * band_rows;
        if band_y != Some(start) {
            self.flush_band();
            if let TargetKind::Banded { band_y, flushed, .. } = &mut self.kind {
                if flushed[start / band_rows] {
                    // Compressed coverage can't be added to; the samples are gone.
                    self.revisited = true;
                    return None;
                }
                *band_y = Some(start);
            }
        }
        Some(y - start)
    }

    /// Compresses the current band into the alpha bitmap and clears it.
    fn flush_band(&mut self) {
        let TargetKind::Banded {
            alpha,
            band,
            band_rows,
            band_y: Some(start),
            scale,
            depth,
            ..
        } = self.kind
        else {
            return;
        };
        let rows = band_rows.min(self.height as usize - start);
        bits::compress_scaled(
            self.buf,
            &Compress {
                src: band,
                src_x: 0,
                width: self.width as usize,
                height: rows,
                dst: Plane {
                    offset: alpha.offset + (start >> scale.y) * alpha.raster,
                    raster: alpha.raster,
                },
                scale,
                depth,
            },
        );
        self.buf[band.offset..band.offset + band.raster * band_rows].fill(0);
        if let TargetKind::Banded {
            band_y, flushed, ..
        } = &mut self.kind
        {
            *band_y = None;
            flushed[start / band_rows] = true;
        }
    }

    /// Flushes any pending band.
    ///
    /// Returns `false` if the rasterizer drew into a band after it was compressed, in
    /// which case the output is incomplete and the character has to be drawn in one pass.
    pub(crate) fn finish(&mut self) -> bool {
        if !self.revisited {
            self.flush_band();
        }
        !self.revisited
    }
}

impl Debug for RasterTarget<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let kind = match self.kind {
            TargetKind::Mono { .. } => "mono",
            TargetKind::Banded { .. } => "banded",
        };
        f.debug_struct("RasterTarget")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("kind", &kind)
            .field("revisited", &self.revisited)
            .finish_non_exhaustive()
    }
}

/// `log2` of a depth of 1, 2 or 4 bits.
pub(crate) fn log2_depth(depth: u8) -> u8 {
    depth >> 1
}

/// Clamps a device's alpha request to a depth the cache can store.
pub(crate) fn normalize_alpha_bits(alpha_bits: u8) -> u8 {
    match alpha_bits {
        0 | 1 => 1,
        2 | 3 => 2,
        _ => 4,
    }
}

/// Suggests oversampling factors from the size of the font bounding box on the device.
///
/// Rotated and skewed transforms get no suggestion.
pub(crate) fn suggested_scale(transform: Affine, font_bbox: Rect) -> Result<Log2Scale, CacheError> {
    let [xx, xy, yx, yy, _, _] = transform.as_coeffs();
    let axis_aligned = (xy == 0.0 && yx == 0.0) || (xx == 0.0 && yy == 0.0);
    if !axis_aligned {
        return Err(CacheError::unsupported_geometry());
    }
    let (w, h) = (font_bbox.width(), font_bbox.height());
    let extent = Vec2::new(xx * w + yx * h, xy * w + yy * h);
    let factor = |e: f64| match e.abs() {
        e if e == 0.0 => 0,
        e if e < 25.0 => 2,
        e if e < 60.0 => 1,
        _ => 0,
    };
    let mut scale = Log2Scale {
        x: factor(extent.x),
        y: factor(extent.y),
    };
    // Oversample both axes or neither.
    if scale.x == 0 && scale.y != 0 {
        scale.x = 1;
    } else if scale.y == 0 && scale.x != 0 {
        scale.y = 1;
    }
    Ok(scale)
}

/// Picks the oversampling for one character.
pub(crate) fn choose_scale(
    transform: Affine,
    font_bbox: Rect,
    paint_type: PaintType,
    alpha_bits: u8,
    oversample: bool,
) -> Log2Scale {
    let mut scale = if oversample {
        suggested_scale(transform, font_bbox).unwrap_or_else(|err| {
            log::debug!("not oversampling: {err}");
            Log2Scale::ONE
        })
    } else {
        Log2Scale::ONE
    };
    if alpha_bits > 1 {
        // Produce at least 2^alpha_bits samples per pixel, favoring the smaller axis.
        let more = alpha_bits.saturating_sub(scale.x + scale.y);
        if more > 0 {
            if scale.x <= scale.y {
                scale.x += more.div_ceil(2);
                scale.y += more / 2;
            } else {
                scale.x += more / 2;
                scale.y += more.div_ceil(2);
            }
        }
    } else if paint_type == PaintType::Stroked || !oversample {
        // Stroked outlines leave their bounding box.
        scale = Log2Scale::ONE;
    }
    if scale.is_oversampled() && !bits::can_compress(scale, alpha_bits) {
        log::debug!("no compression from {scale:?} to depth {alpha_bits}");
        scale = Log2Scale::ONE;
    }
    scale
}

/// Everything decided about a character before its storage is allocated.
#[derive(Copy, Clone, PartialEq, Debug)]
pub(crate) struct CharPlan {
    pub(crate) scale: Log2Scale,
    pub(crate) depth: u8,
    /// Scratch size in (possibly oversampled) pixels.
    pub(crate) iwidth: u32,
    pub(crate) iheight: u32,
    /// Device-space offset of the glyph origin inside the final bitmap.
    pub(crate) offset: Vec2,
    pub(crate) banded: bool,
    /// Bytes to allocate.
    pub(crate) size: usize,
    /// Width, height and raster of the entry while it is being built.
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) raster: usize,
}

impl CharPlan {
    /// Transform handed to the rasterizer: scales the character onto the scratch
    /// target with its origin at the offset.
    pub(crate) fn raster_transform(&self, linear: Affine) -> Affine {
        Affine::scale_non_uniform(
            f64::from(1_u32 << self.scale.x),
            f64::from(1_u32 << self.scale.y),
        ) * Affine::translate(self.offset)
            * linear
    }
}

/// Largest device extent, in pixels, representable at each oversampling level.
fn max_cdim(log2: u8) -> f64 {
    f64::from(1_u32 << (16 - log2)) - 3.0 / f64::from(1_u32 << log2)
}

/// Sizes a character and its scratch storage.
pub(crate) fn plan_char(
    char_bbox: Rect,
    linear: Affine,
    scale: Log2Scale,
    depth: u8,
    max_entry_bytes: usize,
    compress_threshold: usize,
) -> Result<CharPlan, CacheError> {
    let corners = [
        Point::new(char_bbox.x0, char_bbox.y0),
        Point::new(char_bbox.x0, char_bbox.y1),
        Point::new(char_bbox.x1, char_bbox.y0),
        Point::new(char_bbox.x1, char_bbox.y1),
    ]
    .map(|p| linear * p);
    let device = corners
        .iter()
        .skip(1)
        .fold(Rect::from_points(corners[0], corners[0]), |r, &p| r.union_pt(p));
    let (cw, ch) = (device.width(), device.height());
    if !(cw <= max_cdim(scale.x) && ch <= max_cdim(scale.y)) {
        return Err(CacheError::coordinate_overflow(
            saturate(cw),
            saturate(ch),
        ));
    }
    let iwidth = (saturate(cw.floor()) + 2) << scale.x;
    let iheight = (saturate(ch.floor()) + 2) << scale.y;

    let out_width = iwidth >> scale.x;
    let out_height = iheight >> scale.y;
    let out_raster = bitmap_raster((out_width as usize) << log2_depth(depth));
    if out_raster != 0 && out_height as usize > max_entry_bytes / out_raster {
        return Err(CacheError::out_of_space(
            out_width,
            out_height,
            out_raster * out_height as usize,
        ));
    }

    let banded = iwidth as usize > compress_threshold / iheight as usize
        && (1_u32 << (scale.x + scale.y)) > u32::from(depth);
    let mono_raster = bitmap_raster(iwidth as usize);
    let (size, width, height, raster) = if banded {
        let band = mono_raster * (2_usize << scale.y);
        (
            out_raster * out_height as usize + band,
            out_width,
            out_height,
            out_raster,
        )
    } else {
        (mono_raster * iheight as usize, iwidth, iheight, mono_raster)
    };
    Ok(CharPlan {
        scale,
        depth,
        iwidth,
        iheight,
        offset: Vec2::new((-device.x0).ceil(), (-device.y0).ceil()),
        banded,
        size,
        width,
        height,
        raster,
    })
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is checked against the u32 range first"
)]
fn saturate(v: f64) -> u32 {
    if v >= f64::from(u32::MAX) {
        u32::MAX
    } else if v > 0.0 {
        v as u32
    } else {
        0
    }
}

/// Result of finishing a character bitmap.
#[derive(Copy, Clone, PartialEq, Debug)]
pub(crate) struct Finished {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) raster: usize,
    /// Pixels trimmed from the left and top.
    pub(crate) trim: Vec2,
}

/// Compresses (if oversampled) and trims a freshly rendered bitmap in place.
///
/// `buf` holds `height` rows of `raster` bytes at the given scale and depth. On return
/// the final bitmap starts at the beginning of `buf`.
pub(crate) fn finish_bits(
    buf: &mut [u8],
    height: u32,
    raster: usize,
    scale: Log2Scale,
    depth: u8,
) -> Finished {
    let BitBox { x0, y0, x1, y1 } = bits::bounding_box(buf, raster, height as usize);
    let log2_depth = log2_depth(depth);
    let (width, rows, nraster, px, py) = if scale.is_oversampled() {
        let xs = 1_usize << scale.x;
        let ys = 1_usize << scale.y;
        let (x0, x1) = (x0 & !(xs - 1), (x1 + xs - 1) & !(xs - 1));
        let (y0, y1) = (y0 & !(ys - 1), (y1 + ys - 1) & !(ys - 1));
        let out_width = (x1 - x0) >> scale.x;
        let out_rows = (y1 - y0) >> scale.y;
        let nraster = bitmap_raster(out_width << log2_depth);
        if out_rows > 0 {
            bits::compress_scaled(
                buf,
                &Compress {
                    src: Plane {
                        offset: raster * y0,
                        raster,
                    },
                    src_x: x0,
                    width: out_width << scale.x,
                    height: out_rows << scale.y,
                    dst: Plane {
                        offset: 0,
                        raster: nraster,
                    },
                    scale,
                    depth,
                },
            );
        }
        (out_width, out_rows, nraster, x0 >> scale.x, y0 >> scale.y)
    } else {
        let rows = y1 - y0;
        // Trim whole bytes on the left; bits within the first byte stay.
        let x0 = x0 & !7;
        let px = x0 >> log2_depth;
        let pq = (x1 + usize::from(depth) - 1) >> log2_depth;
        let out_width = pq.saturating_sub(px);
        let nraster = bitmap_raster(out_width << log2_depth);
        if px != 0 || nraster != raster {
            bits::move_rows(buf, raster * y0, raster, x0 / 8, nraster, rows);
        } else if y0 != 0 {
            buf.copy_within(raster * y0..raster * (y0 + rows), 0);
        }
        (out_width, rows, nraster, px, y0)
    };
    Finished {
        width: u32::try_from(width).unwrap_or(u32::MAX),
        height: u32::try_from(rows).unwrap_or(u32::MAX),
        raster: nraster,
        trim: Vec2::new(px as f64, py as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> Rect {
        Rect::new(0.0, -200.0, 1000.0, 800.0)
    }

    #[test]
    fn small_glyphs_oversample_four_times() {
        let scale = suggested_scale(Affine::scale(0.01), bbox()).unwrap();
        assert_eq!(scale, Log2Scale { x: 2, y: 2 });
        let scale = suggested_scale(Affine::scale(0.04), bbox()).unwrap();
        assert_eq!(scale, Log2Scale { x: 1, y: 1 });
        let scale = suggested_scale(Affine::scale(0.1), bbox()).unwrap();
        assert_eq!(scale, Log2Scale::ONE);
    }

    #[test]
    fn oversampling_covers_both_axes() {
        let tall = Affine::scale_non_uniform(0.1, 0.01);
        assert_eq!(
            suggested_scale(tall, bbox()).unwrap(),
            Log2Scale { x: 1, y: 2 }
        );
    }

    #[test]
    fn rotation_gets_no_suggestion() {
        let rotated = Affine::rotate(0.3) * Affine::scale(0.01);
        let err = suggested_scale(rotated, bbox()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedGeometry);
        // A quarter turn keeps the axes aligned.
        let quarter = Affine::new([0.0, 0.01, -0.01, 0.0, 0.0, 0.0]);
        assert!(suggested_scale(quarter, bbox()).is_ok());
    }

    #[test]
    fn alpha_raises_the_smaller_axis_first() {
        let big = Affine::scale(1.0);
        let s = choose_scale(big, bbox(), PaintType::Filled, 4, true);
        assert_eq!(s, Log2Scale { x: 2, y: 2 });
        let s = choose_scale(big, bbox(), PaintType::Filled, 2, true);
        assert_eq!(s, Log2Scale { x: 1, y: 1 });
        let wide = Affine::scale_non_uniform(0.01, 0.04);
        let s = choose_scale(wide, bbox(), PaintType::Filled, 4, true);
        assert_eq!(s, Log2Scale { x: 2, y: 2 });
    }

    #[test]
    fn mono_stroked_or_disabled_is_not_oversampled() {
        let small = Affine::scale(0.01);
        assert!(choose_scale(small, bbox(), PaintType::Filled, 1, true).is_oversampled());
        assert!(!choose_scale(small, bbox(), PaintType::Stroked, 1, true).is_oversampled());
        assert!(!choose_scale(small, bbox(), PaintType::Filled, 1, false).is_oversampled());
        // Alpha output still oversamples when the global switch is off.
        assert!(choose_scale(small, bbox(), PaintType::Filled, 2, false).is_oversampled());
    }

    #[test]
    fn plan_sizes_scratch_with_margin() {
        let linear = Affine::new([0.01, 0.0, 0.0, -0.01, 0.0, 0.0]);
        let glyph = Rect::new(0.0, 0.0, 500.0, 700.0);
        let plan = plan_char(glyph, linear, Log2Scale { x: 2, y: 2 }, 1, 2500, 80_000).unwrap();
        assert_eq!((plan.iwidth, plan.iheight), ((5 + 2) << 2, (7 + 2) << 2));
        assert_eq!(plan.offset, Vec2::new(0.0, 7.0));
        assert!(!plan.banded);
        assert_eq!(plan.size, 4 * plan.iheight as usize);
    }

    #[test]
    fn oversized_characters_are_rejected() {
        let linear = Affine::scale(100.0);
        let glyph = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        let err = plan_char(glyph, linear, Log2Scale::ONE, 1, 2500, 80_000).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::CoordinateOverflow);
        let err = plan_char(glyph, Affine::scale(0.2), Log2Scale::ONE, 1, 100, 80_000)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::OutOfArenaSpace);
    }

    #[test]
    fn wide_oversampled_characters_use_bands() {
        let glyph = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        let plan = plan_char(glyph, Affine::scale(0.2), Log2Scale { x: 2, y: 2 }, 1, 100_000, 800)
            .unwrap();
        assert!(plan.banded);
        assert_eq!(plan.width, plan.iwidth >> 2);
        assert_eq!(plan.raster, bitmap_raster(plan.width as usize));
    }

    #[test]
    fn banded_target_matches_full_compression() {
        let (w, h) = (32_u32, 24_u32);
        let scale = Log2Scale { x: 2, y: 2 };
        let shape = IntRect::new(5, 6, 29, 21);

        let full_len = bitmap_raster(w as usize) * h as usize;
        let mut full = alloc::vec![0_u8; full_len];
        RasterTarget::mono(&mut full, w, h).fill_rect(shape);
        let done = finish_bits(&mut full, h, bitmap_raster(w as usize), scale, 2);
        assert_eq!(done.trim, Vec2::new(1.0, 1.0));

        let out_raster = bitmap_raster(((w >> 2) as usize) << 1);
        let banded_len = out_raster * (h >> 2) as usize + bitmap_raster(w as usize) * 8;
        let mut banded = alloc::vec![0_u8; banded_len];
        {
            let mut target = RasterTarget::banded(&mut banded, w, h, scale, 2);
            target.fill_rect(shape);
            target.finish();
        }

        for y in 0..done.height as usize {
            for x in 0..done.width as usize {
                assert_eq!(
                    bits::get_pixel(&full[y * done.raster..], x, 2),
                    bits::get_pixel(&banded[(y + 1) * out_raster..], x + 1, 2),
                    "pixel {x},{y}"
                );
            }
        }
        assert_ne!(bits::get_pixel(&banded[2 * out_raster..], 3, 2), 0);
    }

    #[test]
    fn banded_target_reports_revisited_bands() {
        let (w, h) = (32_u32, 24_u32);
        let scale = Log2Scale { x: 2, y: 2 };
        let len = bitmap_raster(16) * 6 + bitmap_raster(w as usize) * 8;

        let mut buf = alloc::vec![0_u8; len];
        let mut target = RasterTarget::banded(&mut buf, w, h, scale, 2);
        target.fill_rect(IntRect::new(0, 0, 5, 24));
        target.fill_rect(IntRect::new(5, 0, 10, 24));
        assert!(!target.finish(), "the second fill went back to the first band");

        let mut buf = alloc::vec![0_u8; len];
        let mut target = RasterTarget::banded(&mut buf, w, h, scale, 2);
        target.fill_rect(IntRect::new(0, 0, 5, 8));
        target.fill_rect(IntRect::new(5, 0, 10, 8));
        assert!(target.finish(), "both fills stayed inside the current band");
    }

    #[test]
    fn trimming_keeps_byte_aligned_left_edge() {
        let (w, h) = (40_u32, 6_u32);
        let raster = bitmap_raster(w as usize);
        let mut buf = alloc::vec![0_u8; raster * h as usize];
        RasterTarget::mono(&mut buf, w, h).fill_rect(IntRect::new(11, 2, 20, 4));
        let done = finish_bits(&mut buf, h, raster, Log2Scale::ONE, 1);
        assert_eq!(done.trim, Vec2::new(8.0, 2.0));
        assert_eq!((done.width, done.height), (12, 2));
        assert_eq!(bits::get_pixel(&buf, 2, 1), 0);
        assert_eq!(bits::get_pixel(&buf, 3, 1), 1);
        assert_eq!(bits::get_pixel(&buf[done.raster..], 11, 1), 1);
    }

    #[test]
    fn blank_glyph_finishes_empty() {
        let mut buf = alloc::vec![0_u8; 64];
        let done = finish_bits(&mut buf, 16, 4, Log2Scale { x: 1, y: 1 }, 1);
        assert_eq!((done.width, done.height, done.raster), (0, 0, 0));
    }
}
