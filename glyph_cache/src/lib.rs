// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph Cache memoizes rendered character bitmaps for PostScript-style text rendering.
//!
//! Rasterizing a glyph outline is expensive, and the same glyph is usually painted many
//! times at the same size. This crate keeps rendered bitmaps keyed by glyph, font/matrix
//! pair, writing mode and alpha depth, inside a fixed memory budget:
//!
//! - a font/matrix pair directory ([`FontDir::lookup_fm_pair`]) with a fixed number of
//!   slots, evicting pairs that no longer own characters first;
//! - an open-addressed character directory ([`FontDir::lookup_cached_char`]) whose
//!   removals relocate entries instead of leaving tombstones;
//! - a chunked bitmap arena that grows up to a byte budget and then recycles its chunks,
//!   evicting the oldest characters stored in them;
//! - a render pipeline ([`FontDir::render_and_cache`]) that picks an oversampling factor,
//!   drives a [`GlyphRasterizer`] into scratch storage, compresses the result to the
//!   requested alpha depth and trims blank space before committing it;
//! - a blit path ([`FontDir::blit_cached_char`]) that copies cached bitmaps onto a
//!   [`CharDevice`], optionally through a device supplied [`ExternalSource`].
//!
//! Everything lives in one [`FontDir`] context. There is no global state, and nothing is
//! shared between contexts.
//!
//! ## Features
//!
//! - `std` (enabled by default): Get floating point functions from the standard library
//!   (likely using your target's libc). Currently required.

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
compile_error!("glyph_cache requires the `std` feature to be enabled");

extern crate alloc;

pub use peniko;
pub use peniko::kurbo;

mod arena;
mod bits;
mod blit;
mod chars;
mod config;
mod dir;
mod error;
mod font;
mod pair;
mod render;
mod xfont;

pub use arena::{Arena, ArenaStats, Location};
pub use bits::bitmap_raster;
pub use blit::{Blit, CharDevice, Mask};
pub use chars::{CachedChar, CharRef};
pub use config::{CacheConfig, CacheLimits, EvictionPolicy};
pub use dir::{CacheStats, FontDir};
pub use error::{CacheError, ErrorKind, RenderError};
pub use font::{
    BitmapId, FontDescriptor, FontId, FontType, GlyphId, IntRect, PaintType, Uid, WritingMode,
};
pub use pair::{CachedFmPair, PairRef};
pub use render::{
    GlyphMetrics, GlyphRasterizer, Log2Scale, RasterStatus, RasterTarget, ShowState,
};
pub use xfont::{
    ExternalMetrics, ExternalSource, ExternalSourceProvider, SourceRequest, XGlyph,
};
