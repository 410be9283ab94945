// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copying cached characters onto a device.

use alloc::borrow::Cow;

use crate::bits::{self, get_pixel};
use crate::font::{BitmapId, IntRect};
use crate::peniko::{Brush, Color};

/// Outcome of drawing a cached character.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Blit {
    /// The character was drawn, or was entirely clipped out.
    Done,
    /// The character can't be drawn from the cache. The caller should render it
    /// uncached.
    Fallback,
}

/// A rectangle of a cached bitmap handed to a [`CharDevice`].
#[derive(Clone, Copy, Debug)]
pub struct Mask<'a> {
    data: &'a [u8],
    raster: usize,
    depth: u8,
    source_x: u32,
    width: u32,
    height: u32,
    id: Option<BitmapId>,
}

impl<'a> Mask<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        raster: usize,
        depth: u8,
        width: u32,
        height: u32,
        id: Option<BitmapId>,
    ) -> Self {
        Self {
            data,
            raster,
            depth,
            source_x: 0,
            width,
            height,
            id,
        }
    }

    /// Packed rows, most significant bit first. The first row of the mask starts here.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Bytes per row.
    pub fn raster(&self) -> usize {
        self.raster
    }

    /// Bits per pixel: 1, 2 or 4.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Pixel column within each row at which the mask starts.
    pub fn source_x(&self) -> u32 {
        self.source_x
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Identity of the cached bitmap, which devices may use to cache it on their side.
    ///
    /// `None` for masks that were converted on the fly.
    pub fn id(&self) -> Option<BitmapId> {
        self.id
    }

    /// Returns the value of the pixel at (`x`, `y`), relative to the mask.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        let row = &self.data[y as usize * self.raster..];
        get_pixel(row, (self.source_x + x) as usize, self.depth)
    }

    /// Restricts the mask to `clip`, given relative to the mask origin.
    fn clipped(mut self, clip: IntRect) -> Self {
        let non_negative = |v: i32| v.max(0).unsigned_abs();
        let (dx, dy) = (non_negative(clip.x0), non_negative(clip.y0));
        self.data = &self.data[dy as usize * self.raster..];
        self.source_x += dx;
        self.width = non_negative(clip.x1).min(self.width).saturating_sub(dx);
        self.height = non_negative(clip.y1).min(self.height).saturating_sub(dy);
        self
    }
}

/// A device that can draw cached characters.
///
/// Positions are device pixels of the top left corner of the mask.
pub trait CharDevice {
    /// Error reported by the device.
    type Error;

    /// Paints the set pixels of a one-bit mask with `color`.
    fn copy_mono(&mut self, mask: &Mask<'_>, x: i32, y: i32, color: Color)
    -> Result<(), Self::Error>;

    /// Blends `color` through an alpha mask.
    ///
    /// Returns `Ok(false)` if the device has no alpha support, in which case the cache
    /// falls back to a one-bit mask.
    fn copy_alpha(
        &mut self,
        mask: &Mask<'_>,
        x: i32,
        y: i32,
        color: Color,
    ) -> Result<bool, Self::Error> {
        let _ = (mask, x, y, color);
        Ok(false)
    }

    /// Fills the set pixels of a one-bit mask with an arbitrary paint.
    fn fill_mask(&mut self, mask: &Mask<'_>, x: i32, y: i32, paint: &Brush)
    -> Result<(), Self::Error>;
}

/// Draws `mask` at (`x`, `y`) clipped to `clip`.
pub(crate) fn draw_mask<D: CharDevice + ?Sized>(
    device: &mut D,
    paint: &Brush,
    mask: Mask<'_>,
    x: i32,
    y: i32,
    clip: IntRect,
) -> Result<(), D::Error> {
    let bounds = IntRect::from_origin_size(x, y, mask.width, mask.height);
    let visible = bounds.intersect(&clip);
    if visible.is_empty() {
        log::trace!("{bounds:?} entirely outside {clip:?}");
        return Ok(());
    }
    let relative = IntRect::new(
        visible.x0 - x,
        visible.y0 - y,
        visible.x1 - x,
        visible.y1 - y,
    );
    let (cx, cy) = (visible.x0, visible.y0);
    match paint {
        Brush::Solid(color) if mask.depth > 1 => {
            let clipped = mask.clipped(relative);
            if device.copy_alpha(&clipped, cx, cy, *color)? {
                return Ok(());
            }
            let mono = to_mono(&mask);
            let mono = mono_mask(&mono, &mask).clipped(relative);
            device.copy_mono(&mono, cx, cy, *color)
        }
        Brush::Solid(color) => device.copy_mono(&mask.clipped(relative), cx, cy, *color),
        _ => {
            let mono = to_mono(&mask);
            let mono = mono_mask(&mono, &mask).clipped(relative);
            device.fill_mask(&mono, cx, cy, paint)
        }
    }
}

fn to_mono<'a>(mask: &Mask<'a>) -> (Cow<'a, [u8]>, usize) {
    if mask.depth == 1 {
        return (Cow::Borrowed(mask.data), mask.raster);
    }
    let (data, raster) = bits::alpha_to_mono(
        mask.data,
        mask.raster,
        mask.width as usize,
        mask.height as usize,
        mask.depth,
    );
    (Cow::Owned(data), raster)
}

fn mono_mask<'a>(mono: &'a (Cow<'_, [u8]>, usize), mask: &Mask<'_>) -> Mask<'a> {
    let id = if mask.depth == 1 { mask.id } else { None };
    Mask::new(&mono.0, mono.1, 1, mask.width, mask.height, id)
}
