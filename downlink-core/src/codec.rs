//! 12-bit packed-pixel decoder.
//!
//! Ported from the original `common/raw_to_image.py`. Two layout modes
//! unified behind `decode()`: header-aligned (preferred) and a continuous
//! fallback. Header mode is used iff at least `height` markers are
//! recovered; otherwise continuous mode runs unconditionally, with no
//! partial/hybrid behavior.

use ndarray::Array2;

use crate::config::CodecConfig;
use crate::errors::CodecError;

const BYTES_PER_HEADER_BLOCK: usize = 3072;
const PIXELS_PER_HEADER_BLOCK: usize = 2048;

/// Unpack one 3-byte group into two 12-bit pixels:
/// `p0 = b0 | ((b1 & 0x0F) << 8)`, `p1 = (b2 << 4) | (b1 >> 4)`.
#[inline]
pub fn unpack_triplet(b0: u8, b1: u8, b2: u8) -> (u16, u16) {
    let p0 = (b0 as u16) | (((b1 & 0x0F) as u16) << 8);
    let p1 = ((b2 as u16) << 4) | ((b1 >> 4) as u16);
    (p0, p1)
}

/// Unpack a buffer whose length is a multiple of 3 into `len/3*2` pixels,
/// even columns from `p0`, odd columns from `p1` of each triplet, in order.
fn unpack_packed_12bit(data: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity((data.len() / 3) * 2);
    for triplet in data.chunks_exact(3) {
        let (p0, p1) = unpack_triplet(triplet[0], triplet[1], triplet[2]);
        out.push(p0);
        out.push(p1);
    }
    out
}

/// Find up to `max_blocks` header-delimited data blocks, each
/// `BYTES_PER_HEADER_BLOCK` bytes long, immediately following an occurrence
/// of `marker` in `raw`. Mirrors `find_lines_by_header`'s overlap-tolerant
/// scan (resumes the search right after the marker's first byte, not past
/// the consumed data block).
fn find_header_blocks<'a>(raw: &'a [u8], marker: [u8; 4], max_blocks: usize) -> Vec<&'a [u8]> {
    let mut blocks = Vec::new();
    let mut start = 0usize;

    while let Some(rel_idx) = find_subslice(&raw[start..], &marker) {
        let idx = start + rel_idx;
        let data_start = idx + marker.len();
        let data_end = data_start + BYTES_PER_HEADER_BLOCK;

        if data_end <= raw.len() {
            blocks.push(&raw[data_start..data_end]);
            if blocks.len() >= max_blocks {
                break;
            }
        }
        start = idx + 1;
    }

    blocks
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode a raw byte buffer into a `height x width` grid of 12-bit pixels
/// (stored widened to `u16`). Never panics on malformed input.
pub fn decode(raw: &[u8], width: usize, height: usize, config: &CodecConfig) -> Result<Array2<u16>, CodecError> {
    let marker = config.header_marker.to_be_bytes();
    let blocks = find_header_blocks(raw, marker, height);

    if blocks.len() >= height {
        let mut image = Array2::<u16>::zeros((height, width));
        for (row_idx, block) in blocks.into_iter().take(height).enumerate() {
            let pixels = unpack_packed_12bit(block);
            let take = pixels.len().min(width).min(PIXELS_PER_HEADER_BLOCK);
            for (col, &pixel) in pixels.iter().take(take).enumerate() {
                image[[row_idx, col]] = pixel;
            }
        }
        return Ok(image);
    }

    decode_continuous(raw, width, height)
}

/// Fallback: treat `raw` as a contiguous `width * height * 12 / 8`-byte
/// 12-bit packed stream with no embedded markers.
fn decode_continuous(raw: &[u8], width: usize, height: usize) -> Result<Array2<u16>, CodecError> {
    let need = (width * height * 12) / 8;
    if raw.len() < need {
        return Err(CodecError::TruncatedContinuousStream {
            need,
            got: raw.len(),
        });
    }

    let pixels = unpack_packed_12bit(&raw[..need]);
    Array2::from_shape_vec((height, width), pixels).map_err(|_| CodecError::TruncatedContinuousStream {
        need,
        got: raw.len(),
    })
}

/// Normalize a `u16` image to `u8` via percentile clipping, so a decoded
/// frame can be previewed (e.g. as an ASCII contact sheet) without pulling
/// in a PNG/TIFF encoder.
pub fn normalize_to_u8(image: &Array2<u16>, clip_percent: f64) -> Array2<u8> {
    let mut values: Vec<f64> = image.iter().map(|&v| v as f64).collect();
    if values.is_empty() {
        return Array2::zeros(image.dim());
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let percentile = |p: f64| -> f64 {
        let idx = ((p / 100.0) * (values.len() - 1) as f64).round() as usize;
        values[idx.min(values.len() - 1)]
    };

    let mut lo = percentile(clip_percent);
    let mut hi = percentile(100.0 - clip_percent);
    if hi <= lo {
        lo = *values.first().unwrap();
        hi = *values.last().unwrap();
        if hi <= lo {
            hi = lo + 1.0;
        }
    }

    image.mapv(|v| {
        let x = ((v as f64 - lo) / (hi - lo)).clamp(0.0, 1.0);
        (x * 255.0).round() as u8
    })
}
