use std::sync::Arc;

use rayon::prelude::*;

use super::*;
use crate::device::MemoryBlock;

const BASE: u64 = 0x1000;

fn memory(size: u64) -> (GlobalMemory, Arc<MemoryBlock>) {
  let block = Arc::new(MemoryBlock::new(size));
  (GlobalMemory::new(vec![(BASE, size, block.clone())]), block)
}

fn bytes(block: &MemoryBlock, len: usize) -> Vec<u8> {
  let mut out = vec![0u8; len];
  block.read_bytes(0, &mut out);
  out
}

fn sample_indices(width: u32) -> Vec<u32> {
  (0..CHUNK_VOLUME as u32)
    .map(|i| (i.wrapping_mul(2654435761) >> 7) & ((1 << width) - 1))
    .collect()
}

#[test]
fn test_straddling_value_splits_across_words() {
  let (mem, block) = memory(16);
  // width 3 at index 10: bits 30..33
  write_packed_u32(&mem, BASE, 30, 3, 0b101);
  assert_eq!(block.load_u32(0), 0b01 << 30);
  assert_eq!(block.load_u32(4), 0b1);
  assert_eq!(read_packed(&mem, BASE, 30, 3), 0b101);
  assert!(mem.fault().is_none());
}

#[test]
fn test_u64_words_straddle_at_64() {
  let (mem, block) = memory(16);
  write_packed_u64(&mem, BASE, 62, 5, 0b10111);
  assert_eq!(block.load_u64(0), 0b11 << 62);
  assert_eq!(block.load_u64(8), 0b101);
  assert_eq!(read_packed(&mem, BASE, 62, 5), 0b10111);
}

#[test]
fn test_splice_keeps_neighbouring_bits() {
  let (mem, block) = memory(8);
  block.store_u32(0, 0xFFFF_FFFF);
  write_packed_u32(&mem, BASE, 4, 4, 0);
  assert_eq!(block.load_u32(0), 0xFFFF_FF0F);
}

#[test]
fn test_concurrent_writes_match_reference_for_every_width() {
  for word in [PackWord::U32, PackWord::U64] {
    for width in 1..=8 {
      let indices = sample_indices(width);
      let len = packed_len(CHUNK_VOLUME, width, word);
      let (mem, block) = memory(len as u64);

      indices.par_iter().enumerate().for_each(|(i, &v)| {
        write_packed(&mem, word, BASE, i as u32 * width, width, v);
      });

      assert_eq!(
        bytes(&block, len),
        pack_indices(&indices, width, word),
        "{word:?} width {width}"
      );
      for (i, &v) in indices.iter().enumerate() {
        assert_eq!(unpack_index(&bytes(&block, len), i, width), v);
      }
    }
  }
}

#[test]
fn test_word_sizes_produce_identical_streams() {
  let indices = sample_indices(5);
  let narrow = pack_indices(&indices, 5, PackWord::U32);
  let wide = pack_indices(&indices, 5, PackWord::U64);
  // 512 * 5 bits = 320 bytes, a whole number of both word sizes
  assert_eq!(narrow, wide);
}

#[test]
fn test_decompress_chunk() {
  let palette = [0, 7, 3];
  let indices: Vec<u32> = (0..CHUNK_VOLUME as u32).map(|i| i % 3).collect();
  let data = pack_indices(&indices, bits_for_palette(3), PackWord::U32);
  let voxels = decompress_chunk(&palette, &data);
  assert_eq!(voxels.len(), CHUNK_VOLUME);
  assert_eq!(&voxels[..4], &[0, 7, 3, 0]);
}

#[test]
fn test_single_entry_palette_uses_one_bit() {
  let data = vec![0u8; packed_len(CHUNK_VOLUME, 1, PackWord::U32)];
  assert_eq!(data.len(), 64);
  assert!(decompress_chunk(&[5], &data).iter().all(|&b| b == 5));
}

#[test]
fn test_compression_stats() {
  let stats = CompressionStats::for_palette(2, PackWord::U32);
  assert_eq!(stats.bits_per_voxel, 1);
  assert_eq!(stats.packed_bytes, 64 + 8);
  assert!(stats.ratio() > 28.0);

  let full = CompressionStats::for_palette(256, PackWord::U64);
  assert_eq!(full.bits_per_voxel, 8);
  assert_eq!(full.packed_bytes, 512 + 1024);
}
