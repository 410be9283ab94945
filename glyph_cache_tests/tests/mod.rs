// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate contains the integration test suite for `glyph_cache`.
//!
//! - The `util` module contains the fake rasterizer, device, show state and external
//!   glyph sources shared by the tests.
//! - We do not use the default Rust test harness, but instead use this `mod.rs` file as the
//!   entry point to run all other tests, so that every module can share `util`.
//! - Put the "topic" of a test at the start of its name, e.g. `pairs_evict_unreferenced`
//!   rather than `evict_unreferenced_pairs`.

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(clippy::cast_possible_truncation, reason = "not critical for testing")]

mod util;
