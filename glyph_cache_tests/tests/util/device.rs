// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use glyph_cache::peniko::{Brush, Color};
use glyph_cache::{CharDevice, Mask};

/// One drawing call seen by a [`RecordingDevice`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct DeviceCall {
    pub(crate) op: &'static str,
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: u8,
    /// Coordinates of every nonzero pixel, relative to the mask.
    pub(crate) pixels: Vec<(u32, u32)>,
}

/// A device that remembers what it was asked to draw.
#[derive(Default, Debug)]
pub(crate) struct RecordingDevice {
    pub(crate) alpha: bool,
    pub(crate) calls: Vec<DeviceCall>,
}

impl RecordingDevice {
    fn record(&mut self, op: &'static str, mask: &Mask<'_>, x: i32, y: i32) {
        let mut pixels = Vec::new();
        for py in 0..mask.height() {
            for px in 0..mask.width() {
                if mask.pixel(px, py) != 0 {
                    pixels.push((px, py));
                }
            }
        }
        self.calls.push(DeviceCall {
            op,
            x,
            y,
            width: mask.width(),
            height: mask.height(),
            depth: mask.depth(),
            pixels,
        });
    }
}

impl CharDevice for RecordingDevice {
    type Error = String;

    fn copy_mono(&mut self, mask: &Mask<'_>, x: i32, y: i32, _: Color) -> Result<(), String> {
        self.record("copy_mono", mask, x, y);
        Ok(())
    }

    fn copy_alpha(
        &mut self,
        mask: &Mask<'_>,
        x: i32,
        y: i32,
        _: Color,
    ) -> Result<bool, String> {
        if self.alpha {
            self.record("copy_alpha", mask, x, y);
        }
        Ok(self.alpha)
    }

    fn fill_mask(&mut self, mask: &Mask<'_>, x: i32, y: i32, _: &Brush) -> Result<(), String> {
        self.record("fill_mask", mask, x, y);
        Ok(())
    }
}
