// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glue for external glyph sources.
//!
//! Some devices can render glyphs themselves, for example from a platform font with the
//! same name and metrics. The cache asks the device's [`ExternalSourceProvider`] for such
//! a source once per font/matrix pair, and records characters that come from it without
//! rasterizing their outlines.

use alloc::boxed::Box;
use smallvec::SmallVec;

use crate::font::{FontDescriptor, GlyphId, IntRect, PaintType, Uid, WritingMode};
use crate::kurbo::{Affine, Point, Vec2};
use crate::peniko::Color;
use crate::render::RasterTarget;

/// A glyph handle understood by one [`ExternalSource`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct XGlyph(pub u64);

/// Metrics of an external glyph.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ExternalMetrics {
    /// Device-space advance.
    pub advance: Vec2,
    /// Ink box in device pixels, relative to the glyph origin.
    pub bbox: IntRect,
}

/// What an [`ExternalSourceProvider`] is asked for.
#[derive(Clone, Copy, Debug)]
pub struct SourceRequest<'a> {
    /// Font name to look up.
    pub name: &'a str,
    /// Linear part of the character transform.
    pub matrix: Affine,
    /// Persistent identity of the font, if it has one.
    pub uid: Option<&'a Uid>,
    /// Index of the standard encoding closest to the font's encoding.
    pub encoding_index: Option<u32>,
}

/// Supplies external glyph sources, typically implemented by a device.
pub trait ExternalSourceProvider {
    /// Whether this provider offers external sources at all.
    fn has_sources(&self) -> bool {
        true
    }

    /// Returns a source for the named font at the requested transform, if one exists.
    fn external_glyph_source_for(
        &mut self,
        request: &SourceRequest<'_>,
    ) -> Option<Box<dyn ExternalSource>>;
}

/// A font that can render glyphs without outline rasterization.
///
/// Sources are released by dropping them.
pub trait ExternalSource {
    /// Maps a character code to a glyph of this source.
    ///
    /// `encoding_index` is the standard encoding the code is in, or `None` if the font
    /// was re-encoded. `glyph` is the glyph the interpreter resolved the code to.
    fn char_xglyph(
        &mut self,
        code: u32,
        encoding_index: Option<u32>,
        glyph: GlyphId,
    ) -> Option<XGlyph>;

    /// Returns the metrics of a glyph.
    fn char_metrics(&mut self, xglyph: XGlyph, wmode: WritingMode) -> Option<ExternalMetrics>;

    /// Draws a glyph straight onto the device with its origin at `origin`.
    ///
    /// Returns `false` if the source can't draw this glyph directly.
    fn render_direct(&mut self, xglyph: XGlyph, origin: Point, color: Color) -> bool;

    /// Renders a glyph into a one-bit mask with its origin at `origin`.
    ///
    /// Returns `false` if the source can't produce a mask.
    fn render_mask(
        &mut self,
        xglyph: XGlyph,
        origin: Point,
        target: &mut RasterTarget<'_>,
    ) -> bool;
}

/// Names to try, in order, when looking up an external source for `font`.
///
/// The font's key name comes first, then its `FontName` if different, then the key names
/// of registered original fonts that share its UID.
pub(crate) fn candidate_names<'a>(
    font: &'a FontDescriptor,
    originals: impl IntoIterator<Item = &'a str>,
) -> SmallVec<[&'a str; 4]> {
    let mut names = SmallVec::new();
    if font.paint_type != PaintType::Filled {
        return names;
    }
    if !font.key_name.is_empty() {
        names.push(font.key_name.as_str());
    }
    if !font.font_name.is_empty() && font.font_name != font.key_name {
        names.push(font.font_name.as_str());
    }
    if font.cache_uid().is_some() {
        for name in originals {
            if !name.is_empty() && name != font.key_name && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
