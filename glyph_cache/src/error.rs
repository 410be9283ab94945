// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Error type for cache operations.
///
/// Carries a non-exhaustive [`ErrorKind`] plus the size that was being requested when the
/// operation failed. None of these errors are fatal: the caller is expected to render the
/// affected glyph without the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheError {
    /// The non-exhaustive category describing this error.
    kind: ErrorKind,

    /// Requested width in device pixels, if a bitmap was being sized.
    width: u32,

    /// Requested height in device pixels, if a bitmap was being sized.
    height: u32,

    /// Requested storage in bytes, if any.
    bytes: usize,

    /// Name of the offending configuration field, for [`ErrorKind::InvalidConfig`].
    field: Option<&'static str>,
}

impl CacheError {
    /// The machine-readable category for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Width of the bitmap that was requested, in device pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the bitmap that was requested, in device pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes that were requested.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn out_of_space(width: u32, height: u32, bytes: usize) -> Self {
        Self {
            kind: ErrorKind::OutOfArenaSpace,
            width,
            height,
            bytes,
            field: None,
        }
    }

    pub(crate) fn coordinate_overflow(width: u32, height: u32) -> Self {
        Self {
            kind: ErrorKind::CoordinateOverflow,
            width,
            height,
            bytes: 0,
            field: None,
        }
    }

    pub(crate) fn rasterizer_failure(width: u32, height: u32) -> Self {
        Self {
            kind: ErrorKind::RasterizerFailure,
            width,
            height,
            bytes: 0,
            field: None,
        }
    }

    pub(crate) fn unsupported_geometry() -> Self {
        Self {
            kind: ErrorKind::UnsupportedGeometry,
            width: 0,
            height: 0,
            bytes: 0,
            field: None,
        }
    }

    pub(crate) fn invalid_config(field: &'static str) -> Self {
        Self {
            kind: ErrorKind::InvalidConfig,
            width: 0,
            height: 0,
            bytes: 0,
            field: Some(field),
        }
    }
}

impl core::fmt::Display for CacheError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            ErrorKind::OutOfArenaSpace => write!(
                f,
                "no room for a {}x{} character bitmap ({} bytes)",
                self.width, self.height, self.bytes
            ),
            ErrorKind::RasterizerFailure => write!(
                f,
                "rasterizer declined to render a {}x{} character",
                self.width, self.height
            ),
            ErrorKind::UnsupportedGeometry => {
                write!(f, "character transform is rotated or skewed")
            }
            ErrorKind::CoordinateOverflow => write!(
                f,
                "character of {}x{} pixels exceeds the fixed point range",
                self.width, self.height
            ),
            ErrorKind::InvalidConfig => write!(
                f,
                "invalid cache configuration: `{}`",
                self.field.unwrap_or("?")
            ),
        }
    }
}

impl core::error::Error for CacheError {}

/// The non-exhaustive category of a [`CacheError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Neither the arena nor the per-entry limit could accommodate the bitmap.
    OutOfArenaSpace,

    /// The rasterizer declined to render into the cache.
    RasterizerFailure,

    /// The character transform is rotated or skewed, so no oversampling is suggested.
    UnsupportedGeometry,

    /// The character's device extent exceeds the 16-bit fixed point range.
    CoordinateOverflow,

    /// A [`CacheConfig`](crate::CacheConfig) field is out of range.
    InvalidConfig,
}

/// Error returned by [`FontDir::render_and_cache`](crate::FontDir::render_and_cache).
#[derive(Debug)]
pub enum RenderError<E> {
    /// The glyph can't be cached; render it directly this time.
    Uncacheable(CacheError),
    /// The glyph program itself failed.
    Rasterizer(E),
}

impl<E> RenderError<E> {
    /// The cache error, if this is a recoverable failure.
    pub fn cache_error(&self) -> Option<&CacheError> {
        match self {
            Self::Uncacheable(err) => Some(err),
            Self::Rasterizer(_) => None,
        }
    }
}

impl<E> From<CacheError> for RenderError<E> {
    fn from(err: CacheError) -> Self {
        Self::Uncacheable(err)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for RenderError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Uncacheable(err) => write!(f, "cannot cache character: {err}"),
            Self::Rasterizer(err) => write!(f, "rasterizer error: {err}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for RenderError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Uncacheable(err) => Some(err),
            Self::Rasterizer(err) => Some(err),
        }
    }
}
