// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cache sizing and behavior knobs.

use crate::error::CacheError;

/// Number of scratch bits above which rendering goes through a band buffer.
pub(crate) const DEFAULT_COMPRESS_THRESHOLD: usize = 80_000;

/// How a full pair directory picks the pair to evict.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum EvictionPolicy {
    /// Prefer the first pair with no cached characters, scanning forward from the
    /// rotating cursor. Fall back to the cursor's slot.
    #[default]
    PreferUnreferenced,
    /// Always evict the cursor's slot.
    RoundRobin,
}

/// The limits of a [`FontDir`](crate::FontDir) that can change after it is built.
///
/// See [`FontDir::set_limits`](crate::FontDir::set_limits).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CacheLimits {
    /// Total bytes the bitmap arena may hold.
    pub max_arena_bytes: usize,
    /// Largest final bitmap, in bytes, that will be cached.
    pub max_single_entry_bytes: usize,
}

/// Configuration for a [`FontDir`](crate::FontDir).
///
/// The defaults match a "large" interpreter configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total bytes the bitmap arena may grow to.
    pub max_arena_bytes: usize,
    /// Number of font/matrix pair slots.
    pub max_pairs: usize,
    /// Expected number of cached characters. Sizes the character directory.
    pub max_chars_hint: usize,
    /// Largest final bitmap, in bytes, that will be cached.
    pub max_single_entry_bytes: usize,
    /// Scratch bitmap size, in bits, above which an oversampled render is compressed
    /// band by band.
    pub compress_threshold: usize,
    /// Whether characters may be oversampled for 1-bit output.
    pub oversample: bool,
    /// Pair eviction order.
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_arena_bytes: 500_000,
            max_pairs: 200,
            max_chars_hint: 5_000,
            max_single_entry_bytes: 2_500,
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
            oversample: true,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// A configuration for memory constrained hosts.
    pub fn small() -> Self {
        Self {
            max_arena_bytes: 25_000,
            max_pairs: 40,
            max_chars_hint: 500,
            max_single_entry_bytes: 100,
            ..Self::default()
        }
    }

    /// The runtime adjustable part of this configuration.
    pub fn limits(&self) -> CacheLimits {
        CacheLimits {
            max_arena_bytes: self.max_arena_bytes,
            max_single_entry_bytes: self.max_single_entry_bytes,
        }
    }

    /// Checks that every field is usable.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_arena_bytes < crate::arena::MIN_BLOCK {
            return Err(CacheError::invalid_config("max_arena_bytes"));
        }
        if self.max_pairs == 0 {
            return Err(CacheError::invalid_config("max_pairs"));
        }
        // The character table index must fit comfortably in a `usize` once padded.
        if self.max_chars_hint == 0 || self.max_chars_hint > (1 << 24) {
            return Err(CacheError::invalid_config("max_chars_hint"));
        }
        if self.compress_threshold == 0 {
            return Err(CacheError::invalid_config("compress_threshold"));
        }
        Ok(())
    }
}
