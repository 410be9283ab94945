// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use glyph_cache::kurbo::Affine;
use glyph_cache::peniko::Brush;
use glyph_cache::peniko::color::palette;
use glyph_cache::{IntRect, ShowState};

/// A show state with a fixed transform and a large clip box.
#[derive(Clone, Debug)]
pub(crate) struct TestState {
    pub(crate) transform: Affine,
    pub(crate) alpha_bits: u8,
    pub(crate) clip: IntRect,
    pub(crate) paint: Brush,
    pub(crate) translation: (i32, i32),
}

impl TestState {
    pub(crate) fn new(transform: Affine) -> Self {
        Self {
            transform,
            alpha_bits: 1,
            clip: IntRect::new(0, 0, 1000, 1000),
            paint: Brush::Solid(palette::css::BLACK),
            translation: (0, 0),
        }
    }

    pub(crate) fn with_alpha(mut self, alpha_bits: u8) -> Self {
        self.alpha_bits = alpha_bits;
        self
    }
}

impl ShowState for TestState {
    fn effective_clip_bbox(&self) -> IntRect {
        self.clip
    }

    fn current_char_transform(&self) -> Affine {
        self.transform
    }

    fn alpha_bits(&self) -> u8 {
        self.alpha_bits
    }

    fn paint(&self) -> &Brush {
        &self.paint
    }

    fn char_translation(&self) -> (i32, i32) {
        self.translation
    }
}
