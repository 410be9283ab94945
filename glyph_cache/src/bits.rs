// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed bitmap helpers.
//!
//! Bitmaps are stored row by row, most significant bit first, with 1, 2 or 4 bits per
//! pixel. Rows are padded to a multiple of four bytes.

use alloc::vec;
use alloc::vec::Vec;
use smallvec::SmallVec;

use crate::render::Log2Scale;

/// Returns the number of bytes in one padded row of `width_bits` bits.
pub fn bitmap_raster(width_bits: usize) -> usize {
    width_bits.div_ceil(32) * 4
}

/// Bounding box of the set bits of a packed bitmap.
///
/// Horizontal coordinates are in bits, not pixels; vertical coordinates are rows. Upper
/// bounds are exclusive. A blank bitmap has an all-zero box.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) struct BitBox {
    /// First column (in bits) containing a set bit.
    pub(crate) x0: usize,
    /// First row containing a set bit.
    pub(crate) y0: usize,
    /// One past the last column (in bits) containing a set bit.
    pub(crate) x1: usize,
    /// One past the last row containing a set bit.
    pub(crate) y1: usize,
}

impl BitBox {
    /// Whether no bits are set.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Computes the bounding box of the set bits in the first `height` rows of `data`.
pub(crate) fn bounding_box(data: &[u8], raster: usize, height: usize) -> BitBox {
    if raster == 0 || height == 0 {
        return BitBox::default();
    }
    let data = &data[..raster * height];
    let blank = |row: &[u8]| row.iter().all(|&b| b == 0);
    let Some(y0) = data.chunks_exact(raster).position(|row| !blank(row)) else {
        return BitBox::default();
    };
    let trailing = data
        .chunks_exact(raster)
        .rev()
        .position(|row| !blank(row))
        .unwrap_or(0);
    let y1 = height - trailing;

    let mut x0 = usize::MAX;
    let mut x1 = 0;
    for row in data[y0 * raster..y1 * raster].chunks_exact(raster) {
        let (Some(first), Some(last)) = (
            row.iter().position(|&b| b != 0),
            row.iter().rposition(|&b| b != 0),
        ) else {
            continue;
        };
        x0 = x0.min(first * 8 + row[first].leading_zeros() as usize);
        x1 = x1.max(last * 8 + 8 - row[last].trailing_zeros() as usize);
    }
    BitBox { x0, y0, x1, y1 }
}

/// Reads the pixel at `x` of a row with `depth` bits per pixel.
#[inline]
pub(crate) fn get_pixel(row: &[u8], x: usize, depth: u8) -> u8 {
    let bit = x * depth as usize;
    let shift = 8 - depth as usize - bit % 8;
    (row[bit / 8] >> shift) & ((1 << depth) - 1)
}

/// Writes the pixel at `x` of a row with `depth` bits per pixel.
#[inline]
pub(crate) fn set_pixel(row: &mut [u8], x: usize, depth: u8, value: u8) {
    let bit = x * depth as usize;
    let shift = 8 - depth as usize - bit % 8;
    let mask = ((1_u8 << depth) - 1) << shift;
    row[bit / 8] = (row[bit / 8] & !mask) | ((value << shift) & mask);
}

/// Sets bits `x0..x1` of a one-bit row.
pub(crate) fn fill_bits(row: &mut [u8], x0: usize, x1: usize) {
    let mut x = x0;
    while x < x1 {
        let byte = x / 8;
        let start = x % 8;
        let end = (x1 - byte * 8).min(8);
        let mask = (0xff_u8 >> start) & (0xff_u8 << (8 - end));
        row[byte] |= mask;
        x = (byte + 1) * 8;
    }
}

// Indexed by the number of set bits in an oversampled cell, giving the output value.
// The name gives log2 of the cell area and the output depth.
const COMPRESS_1_1: [u8; 3] = [0, 1, 1];
const COMPRESS_2_1: [u8; 5] = [0, 0, 1, 1, 1];
const COMPRESS_2_2: [u8; 5] = [0, 1, 2, 2, 3];
const COMPRESS_3_1: [u8; 9] = [0, 0, 0, 0, 1, 1, 1, 1, 1];
const COMPRESS_3_2: [u8; 9] = [0, 0, 1, 1, 2, 2, 2, 3, 3];
const COMPRESS_4_1: [u8; 17] = [0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
const COMPRESS_4_2: [u8; 17] = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2, 3, 3, 3, 3];
const COMPRESS_4_4: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 8, 9, 10, 11, 12, 13, 14, 15];

/// Returns the count table for `2^log2_area` samples per pixel at `depth` output bits.
fn compress_table(depth: u8, log2_area: u8) -> Option<&'static [u8]> {
    Some(match (depth, log2_area) {
        (1, 1) => &COMPRESS_1_1,
        (1, 2) => &COMPRESS_2_1,
        (1, 3) => &COMPRESS_3_1,
        (1, 4) => &COMPRESS_4_1,
        (2, 2) => &COMPRESS_2_2,
        (2, 3) => &COMPRESS_3_2,
        (2, 4) => &COMPRESS_4_2,
        (4, 4) => &COMPRESS_4_4,
        _ => return None,
    })
}

/// Whether an oversampled bitmap at `scale` can be compressed to `depth` bits.
pub(crate) fn can_compress(scale: Log2Scale, depth: u8) -> bool {
    compress_table(depth, scale.x + scale.y).is_some() && depth <= 1 << scale.x
}

/// Where a bitmap lives inside a larger buffer.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Plane {
    /// Byte offset of the first row.
    pub(crate) offset: usize,
    /// Bytes per row.
    pub(crate) raster: usize,
}

/// Describes one box-filter compression.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Compress {
    /// Oversampled source, one bit per sample.
    pub(crate) src: Plane,
    /// First source column, in bits.
    pub(crate) src_x: usize,
    /// Source width in samples. A multiple of the horizontal scale.
    pub(crate) width: usize,
    /// Source height in rows. A multiple of the vertical scale.
    pub(crate) height: usize,
    /// Destination, `depth` bits per pixel.
    pub(crate) dst: Plane,
    /// Oversampling factors.
    pub(crate) scale: Log2Scale,
    /// Output bits per pixel: 1, 2 or 4.
    pub(crate) depth: u8,
}

/// Compresses an oversampled one-bit bitmap by counting set samples per output pixel.
///
/// Source and destination may share `buf`, as long as the destination does not start
/// after the source and its rows are no wider. Each output row is computed before it is
/// stored, so the compression can run in place.
pub(crate) fn compress_scaled(buf: &mut [u8], params: &Compress) {
    let Compress {
        src,
        src_x,
        width,
        height,
        dst,
        scale,
        depth,
    } = *params;
    let Some(table) = compress_table(depth, scale.x + scale.y) else {
        debug_assert!(false, "no compression table for {scale:?} at depth {depth}");
        return;
    };
    let xscale = 1_usize << scale.x;
    let yscale = 1_usize << scale.y;
    let out_width = width >> scale.x;
    let mut row: SmallVec<[u8; 64]> = SmallVec::from_elem(0, dst.raster);

    for out_y in 0..height >> scale.y {
        row.fill(0);
        let band = src.offset + out_y * yscale * src.raster;
        for out_x in 0..out_width {
            let sx = src_x + out_x * xscale;
            let mut count = 0;
            for dy in 0..yscale {
                let line = &buf[band + dy * src.raster..][..src.raster];
                for dx in 0..xscale {
                    count += get_pixel(line, sx + dx, 1) as usize;
                }
            }
            set_pixel(&mut row, out_x, depth, table[count]);
        }
        buf[dst.offset + out_y * dst.raster..][..dst.raster].copy_from_slice(&row);
    }
}

/// Moves `rows` rows to the start of `buf`, dropping `src_skip` leading bytes of each
/// source row and restriding from `src_raster` to `dst_raster`.
///
/// Destination bytes past the end of a source row are zeroed.
pub(crate) fn move_rows(
    buf: &mut [u8],
    src_offset: usize,
    src_raster: usize,
    src_skip: usize,
    dst_raster: usize,
    rows: usize,
) {
    let keep = dst_raster.min(src_raster - src_skip);
    for y in 0..rows {
        let from = src_offset + y * src_raster + src_skip;
        let to = y * dst_raster;
        buf.copy_within(from..from + keep, to);
        buf[to + keep..to + dst_raster].fill(0);
    }
}

/// Reduces an alpha bitmap to one bit per pixel by keeping the high alpha bit.
pub(crate) fn alpha_to_mono(
    data: &[u8],
    raster: usize,
    width: usize,
    height: usize,
    depth: u8,
) -> (Vec<u8>, usize) {
    let mono_raster = bitmap_raster(width);
    let mut mono = vec![0; mono_raster * height];
    if raster == 0 || mono_raster == 0 {
        return (mono, mono_raster);
    }
    if depth == 1 {
        for (src, dst) in data
            .chunks_exact(raster)
            .zip(mono.chunks_exact_mut(mono_raster))
        {
            let n = mono_raster.min(raster);
            dst[..n].copy_from_slice(&src[..n]);
        }
        return (mono, mono_raster);
    }
    let high = 1 << (depth - 1);
    for (src, dst) in data
        .chunks_exact(raster)
        .zip(mono.chunks_exact_mut(mono_raster))
    {
        for x in 0..width {
            if get_pixel(src, x, depth) & high != 0 {
                set_pixel(dst, x, 1, 1);
            }
        }
    }
    (mono, mono_raster)
}
