//! Occupancy bitmap kernel: packed chunks → three 64×64 grids of u64 columns.
//!
//! Each invocation decodes one voxel and, when solid, sets its depth bit in
//! the column of every axis with `fetch_or`.

use super::bitpack::read_packed;
use super::layout::{ChunkHeader, PushConstants, RegionHeader, CHUNK_PALETTE_COUNT};
use super::BITMAP_KERNEL;
use crate::constants::{
  bits_for_palette, chunk_voxel_index, column_index, region_chunk_index, voxel_to_column, AIR,
  CHUNK_SIZE, PALETTE_CAPACITY,
};
use crate::device::{ComputeKernel, Workgroup};

/// One workgroup per chunk, like the palette kernel.
pub struct BitmapKernel;

impl ComputeKernel for BitmapKernel {
  fn name(&self) -> &str {
    BITMAP_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [CHUNK_SIZE; 3]
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let region: RegionHeader = memory.read(pc.address(pc.region));

    let c = wg.id();
    let chunk_index = region_chunk_index(c.x, c.y, c.z) as u64;
    let chunk_offset = memory.load_u64(pc.address(region.chunk_table + chunk_index * 8));
    let chunk: ChunkHeader = memory.read(pc.address(chunk_offset));
    let count = memory
      .load_u32(pc.address(chunk_offset + CHUNK_PALETTE_COUNT))
      .min(PALETTE_CAPACITY);
    if count == 0 {
      return;
    }
    let width = bits_for_palette(count);

    wg.invocations(|inv, _| {
      let l = inv.local;
      let voxel = chunk_voxel_index(l.x, l.y, l.z) as u32;
      let index = read_packed(memory, pc.address(chunk.data), voxel * width, width);
      let entry = memory.load_u32(pc.address(chunk.palette + index as u64 * 4));
      if entry == 0 || entry - 1 == AIR {
        return;
      }

      let g = inv.global;
      for axis in 0..3 {
        let (u, v, depth) = voxel_to_column(axis, g.x, g.y, g.z);
        memory.fetch_or_u64(
          pc.address(region.bitmap_column(axis, column_index(u, v))),
          1u64 << depth,
        );
      }
    });
  }
}
