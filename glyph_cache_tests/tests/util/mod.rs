// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Utility functions and types shared across tests.

mod device;
mod rasterizer;
mod source;
mod state;

pub(crate) use device::RecordingDevice;
pub(crate) use rasterizer::{BoxRasterizer, glyph_box};
pub(crate) use source::{EXTERNAL_BBOX, FakeProvider};
pub(crate) use state::TestState;

use glyph_cache::kurbo::Rect;
use glyph_cache::{CacheConfig, FontDescriptor, FontDir, FontId, FontType};

/// A Type 1 font with a 1000 unit em square.
pub(crate) fn type1_font(id: u64) -> FontDescriptor {
    let mut font = FontDescriptor::new(
        FontId(id),
        FontType::Type1,
        Rect::new(0.0, 0.0, 1000.0, 1000.0),
    );
    font.key_name = format!("Font{id}");
    font.font_name = format!("Font{id}-Regular");
    font
}

/// A directory with default limits.
pub(crate) fn font_dir() -> FontDir {
    FontDir::new(CacheConfig::default()).unwrap()
}

/// Checks the arena bookkeeping of `dir`.
pub(crate) fn assert_arena_consistent(dir: &FontDir) {
    let stats = dir.stats();
    assert_eq!(
        stats.arena.used_bytes + stats.arena.free_bytes,
        stats.arena.reserved_bytes,
        "arena bytes don't add up: {:?}",
        stats.arena
    );
    assert!(
        stats.arena.reserved_bytes <= dir.config().max_arena_bytes,
        "arena over budget: {:?}",
        stats.arena
    );
    assert_eq!(
        stats.arena.live_blocks, stats.chars,
        "every live character owns exactly one block"
    );
}
