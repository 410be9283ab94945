// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use glyph_cache::kurbo::{Affine, Rect, Vec2};
use glyph_cache::{
    GlyphId, GlyphMetrics, GlyphRasterizer, IntRect, RasterStatus, RasterTarget, WritingMode,
};

/// The outline of every test glyph: a square whose side in character units is the
/// glyph id.
pub(crate) fn glyph_box(glyph: GlyphId) -> Rect {
    let side = f64::from(glyph.0);
    Rect::new(0.0, 0.0, side, side)
}

/// A rasterizer that draws each glyph as a filled square.
#[derive(Default, Debug)]
pub(crate) struct BoxRasterizer {
    /// Number of outlines drawn.
    pub(crate) renders: usize,
    /// Glyphs the rasterizer refuses to cache.
    pub(crate) decline: Vec<GlyphId>,
    /// Glyphs whose program fails.
    pub(crate) fail: Vec<GlyphId>,
    /// Fill the left and right halves of each square in separate top-to-bottom passes,
    /// splitting at an odd column.
    pub(crate) halves: bool,
}

impl GlyphRasterizer for BoxRasterizer {
    type Error = String;

    fn glyph_metrics(&mut self, glyph: GlyphId, wmode: WritingMode) -> Result<GlyphMetrics, String> {
        let bbox = glyph_box(glyph);
        let advance = match wmode {
            WritingMode::Horizontal => Vec2::new(bbox.width(), 0.0),
            WritingMode::Vertical => Vec2::new(0.0, bbox.height()),
        };
        Ok(GlyphMetrics { advance, bbox })
    }

    fn render_outline(
        &mut self,
        glyph: GlyphId,
        transform: Affine,
        target: &mut RasterTarget<'_>,
    ) -> Result<RasterStatus, String> {
        if self.fail.contains(&glyph) {
            return Err(format!("glyph {} has a broken program", glyph.0));
        }
        if self.decline.contains(&glyph) {
            return Ok(RasterStatus::Declined);
        }
        self.renders += 1;
        let rect = transform.transform_rect_bbox(glyph_box(glyph));
        let (x0, y0) = (rect.x0.round() as i32, rect.y0.round() as i32);
        let (x1, y1) = (rect.x1.round() as i32, rect.y1.round() as i32);
        if self.halves {
            let mid = ((x0 + x1) / 2) | 1;
            target.fill_rect(IntRect::new(x0, y0, mid, y1));
            target.fill_rect(IntRect::new(mid, y0, x1, y1));
        } else {
            target.fill_rect(IntRect::new(x0, y0, x1, y1));
        }
        Ok(RasterStatus::Rendered)
    }
}
