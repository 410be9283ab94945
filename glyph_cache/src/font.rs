// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identities of fonts, glyphs and cached bitmaps.

use alloc::string::String;
use core::fmt;
use smallvec::SmallVec;

use crate::kurbo::Rect;

/// An abstract glyph reference used as a cache key.
///
/// This is *not* a character code. Character codes are mapped to glyphs by the font's
/// encoding before the cache is consulted.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct GlyphId(pub u32);

/// Identity of a live font object, supplied by the interpreter.
///
/// The cache holds this as a weak reference: it never keeps a font alive, and forgets
/// the identity when [`FontDir::purge_font`](crate::FontDir::purge_font) is called.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FontId(pub u64);

/// Identifier of a finished cached bitmap.
///
/// Devices may use this to recognize bitmaps they have seen before. Ids are never reused
/// within one [`FontDir`](crate::FontDir).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BitmapId(pub u64);

/// Writing mode of the root font.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug)]
pub enum WritingMode {
    /// Glyph advances run left to right.
    #[default]
    Horizontal,
    /// Glyph advances run top to bottom.
    Vertical,
}

/// The `FontType` of a font dictionary.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FontType {
    /// A composite (Type 0) font. Never identified by UID alone.
    Composite,
    /// A Type 1 font.
    Type1,
    /// A Type 3 (user defined) font.
    Type3,
    /// A Type 42 (TrueType) font.
    Type42,
    /// Any other base font type.
    Other(u8),
}

/// The `PaintType` of a font dictionary.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug)]
pub enum PaintType {
    /// Outlines are filled (PaintType 0).
    #[default]
    Filled,
    /// Outlines are stroked (PaintType 2). Such glyphs can leave their bounding box,
    /// so they are neither oversampled nor handed to external sources.
    Stroked,
}

/// A persistent font identity (`UniqueID` or `XUID`).
///
/// Two fonts with equal UIDs and equal font types render identically, so cached
/// characters keyed by UID outlive the font object that created them.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Uid {
    /// A `UniqueID` value.
    UniqueId(i64),
    /// The values of an `XUID` array. Never equal to a `UniqueId`, even when empty.
    Xuid(SmallVec<[i64; 4]>),
}

impl Uid {
    /// Creates a UID from a `UniqueID` value.
    pub fn unique_id(id: i64) -> Self {
        Self::UniqueId(id)
    }

    /// Creates a UID from the values of an `XUID` array.
    pub fn xuid(values: &[i64]) -> Self {
        Self::Xuid(SmallVec::from_slice(values))
    }

    /// The `UniqueID`, if this is not an `XUID`.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::UniqueId(id) => Some(*id),
            Self::Xuid(_) => None,
        }
    }

    /// The `XUID` values. Empty for a plain `UniqueID`.
    pub fn xvalues(&self) -> &[i64] {
        match self {
            Self::UniqueId(_) => &[],
            Self::Xuid(values) => values,
        }
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniqueId(id) => write!(f, "UID {id}"),
            Self::Xuid(values) => write!(f, "XUID {:?}", values.as_slice()),
        }
    }
}

/// What the cache needs to know about a font.
#[derive(Clone, Debug)]
pub struct FontDescriptor {
    /// Identity of the font object.
    pub id: FontId,
    /// The font's `FontType`.
    pub font_type: FontType,
    /// The font's `PaintType`.
    pub paint_type: PaintType,
    /// The font's `UniqueID` or `XUID`, if it has a valid one.
    pub uid: Option<Uid>,
    /// The `FontBBox`, in character space.
    pub font_bbox: Rect,
    /// The name the font was registered under (`definefont` key).
    pub key_name: String,
    /// The font's `FontName`.
    pub font_name: String,
    /// Index of the standard encoding closest to the font's `Encoding`, if any.
    pub encoding_index: Option<u32>,
}

impl FontDescriptor {
    /// Creates a descriptor for a filled base font with no UID and no names.
    pub fn new(id: FontId, font_type: FontType, font_bbox: Rect) -> Self {
        Self {
            id,
            font_type,
            paint_type: PaintType::Filled,
            uid: None,
            font_bbox,
            key_name: String::new(),
            font_name: String::new(),
            encoding_index: None,
        }
    }

    /// Returns the UID under which characters of this font may be cached.
    ///
    /// Composite and stroked fonts can't be cached by UID alone.
    pub fn cache_uid(&self) -> Option<&Uid> {
        if self.font_type == FontType::Composite || self.paint_type != PaintType::Filled {
            None
        } else {
            self.uid.as_ref()
        }
    }
}

/// An integer device-space rectangle with exclusive upper bounds.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct IntRect {
    /// Left edge.
    pub x0: i32,
    /// Top edge.
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl IntRect {
    /// Creates a rectangle from its edges.
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle from an origin and a size.
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add_unsigned(width),
            y1: y.saturating_add_unsigned(height),
        }
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    /// The overlap of two rectangles, which may be empty.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}
