//! Bit-packed palette index streams.
//!
//! Index `i` of a chunk occupies bits `[i*b, (i+1)*b)` of a little-endian
//! bit stream, `b = bits_for_palette(count)`. The stream is written either
//! as 32-bit words or as 64-bit words; with little-endian words both
//! produce the same bytes, so a single decoder serves both.
//!
//! ```text
//!  b = 3, 32-bit words
//!  word 0: |..|i10|i9|i8|...|i1|i0|     bits 30..32 hold the low 2 bits of i10
//!  word 1: |...........|i11|hi(i10)|    bit 0 holds the high bit of i10
//! ```
//!
//! Device-side writes splice each value with a compare-and-swap loop per
//! touched word, so concurrent writers of neighbouring indices in the same
//! word never lose each other's bits.

use crate::config::PackWord;
use crate::constants::{bits_for_palette, CHUNK_VOLUME};
use crate::device::GlobalMemory;

/// Replace the bits selected by `mask` in the 32-bit word at `address`.
#[inline]
pub fn splice_u32(memory: &GlobalMemory, address: u64, mask: u32, bits: u32) {
  let mut current = memory.load_u32(address);
  loop {
    let next = (current & !mask) | (bits & mask);
    match memory.compare_exchange_u32(address, current, next) {
      Ok(_) => return,
      Err(actual) => current = actual,
    }
  }
}

#[inline]
pub fn splice_u64(memory: &GlobalMemory, address: u64, mask: u64, bits: u64) {
  let mut current = memory.load_u64(address);
  loop {
    let next = (current & !mask) | (bits & mask);
    match memory.compare_exchange_u64(address, current, next) {
      Ok(_) => return,
      Err(actual) => current = actual,
    }
  }
}

/// Write `value` (`width` bits) at bit `cursor` of the stream at `data`
/// using 32-bit words.
pub fn write_packed_u32(memory: &GlobalMemory, data: u64, cursor: u32, width: u32, value: u32) {
  let word = cursor / 32;
  let shift = cursor % 32;
  let field = low_mask_u32(width);
  let value = value & field;

  splice_u32(memory, data + word as u64 * 4, field << shift, value << shift);
  if shift + width > 32 {
    let spill = 32 - shift;
    splice_u32(
      memory,
      data + (word as u64 + 1) * 4,
      field >> spill,
      value >> spill,
    );
  }
}

/// Same as [`write_packed_u32`] with 64-bit words. `data` must be 8-aligned;
/// the word's byte address is `data + (cursor / 64) * 8`.
pub fn write_packed_u64(memory: &GlobalMemory, data: u64, cursor: u32, width: u32, value: u32) {
  let byte = (cursor as u64 / 64) * 8;
  let shift = cursor % 64;
  let field = low_mask_u64(width);
  let value = value as u64 & field;

  splice_u64(memory, data + byte, field << shift, value << shift);
  if shift + width > 64 {
    let spill = 64 - shift;
    splice_u64(memory, data + byte + 8, field >> spill, value >> spill);
  }
}

pub fn write_packed(
  memory: &GlobalMemory,
  word: PackWord,
  data: u64,
  cursor: u32,
  width: u32,
  value: u32,
) {
  match word {
    PackWord::U32 => write_packed_u32(memory, data, cursor, width, value),
    PackWord::U64 => write_packed_u64(memory, data, cursor, width, value),
  }
}

/// Read a `width`-bit value at bit `cursor` of the stream at `data`.
pub fn read_packed(memory: &GlobalMemory, data: u64, cursor: u32, width: u32) -> u32 {
  let word = cursor / 32;
  let shift = cursor % 32;
  let lo = memory.load_u32(data + word as u64 * 4) as u64;
  let hi = if shift + width > 32 {
    memory.load_u32(data + (word as u64 + 1) * 4) as u64
  } else {
    0
  };
  (((hi << 32 | lo) >> shift) & low_mask_u64(width)) as u32
}

#[inline]
fn low_mask_u32(width: u32) -> u32 {
  if width >= 32 {
    u32::MAX
  } else {
    (1 << width) - 1
  }
}

#[inline]
fn low_mask_u64(width: u32) -> u64 {
  if width >= 64 {
    u64::MAX
  } else {
    (1 << width) - 1
  }
}

// =============================================================================
// CPU side
// =============================================================================

/// Bytes needed for `count` indices of `width` bits, rounded to whole words.
pub fn packed_len(count: usize, width: u32, word: PackWord) -> usize {
  let word_bytes = word.bits() as usize / 8;
  (count * width as usize).div_ceil(word.bits() as usize) * word_bytes
}

/// Extract index `i` from a packed byte stream.
pub fn unpack_index(data: &[u8], index: usize, width: u32) -> u32 {
  let mut value = 0u32;
  let start = index * width as usize;
  for bit in 0..width as usize {
    let at = start + bit;
    let set = data.get(at / 8).is_some_and(|byte| byte >> (at % 8) & 1 == 1);
    value |= (set as u32) << bit;
  }
  value
}

/// Pack `indices` into a byte stream (host reference encoder).
pub fn pack_indices(indices: &[u32], width: u32, word: PackWord) -> Vec<u8> {
  let mut out = vec![0u8; packed_len(indices.len(), width, word)];
  for (i, &value) in indices.iter().enumerate() {
    let start = i * width as usize;
    for bit in 0..width as usize {
      if value >> bit & 1 == 1 {
        let at = start + bit;
        out[at / 8] |= 1 << (at % 8);
      }
    }
  }
  out
}

/// Decode a chunk's packed stream back to block IDs.
///
/// `palette` holds the block IDs (already unpublished, i.e. without the
/// `+1` bias). Indices past the palette decode to the first entry.
pub fn decompress_chunk(palette: &[u32], data: &[u8]) -> Vec<u32> {
  let width = bits_for_palette(palette.len() as u32);
  (0..CHUNK_VOLUME)
    .map(|i| {
      let index = unpack_index(data, i, width) as usize;
      palette
        .get(index)
        .or_else(|| palette.first())
        .copied()
        .unwrap_or(0)
    })
    .collect()
}

/// Size accounting of one compressed chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompressionStats {
  pub palette_entries: u32,
  pub bits_per_voxel: u32,
  pub raw_bytes: usize,
  pub packed_bytes: usize,
}

impl CompressionStats {
  pub fn for_palette(count: u32, word: PackWord) -> Self {
    let bits = bits_for_palette(count);
    Self {
      palette_entries: count,
      bits_per_voxel: bits,
      raw_bytes: CHUNK_VOLUME * 4,
      packed_bytes: packed_len(CHUNK_VOLUME, bits, word) + count as usize * 4,
    }
  }

  /// Raw size over packed size (palette included).
  pub fn ratio(&self) -> f32 {
    if self.packed_bytes == 0 {
      0.0
    } else {
      self.raw_bytes as f32 / self.packed_bytes as f32
    }
  }
}

#[cfg(test)]
#[path = "bitpack_test.rs"]
mod bitpack_test;
