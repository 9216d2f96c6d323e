//! Palette compression kernel, two phases selected by specialization.
//!
//! ```text
//!  phase 0 (build)                        phase 1 (pack)
//!  ┌──────────────────────────────┐       ┌─────────────────────────────┐
//!  │ block = raw[v]               │       │ index = lookup(block)       │
//!  │ loop:                        │       │ b = bits_for_palette(count) │
//!  │   n = count                  │       │ splice index at v*b         │
//!  │   scan palette[0..n]         │       └─────────────────────────────┘
//!  │   found? done                │
//!  │   n == 256? index 0          │
//!  │   CAS count n → n+1          │
//!  │     ok: palette[n] = block+1 │
//!  │     err: retry               │
//!  └──────────────────────────────┘
//! ```
//!
//! A reserved slot reads 0 until its owner publishes `block + 1`; scanners
//! wait for publication so they never skip a slot that is being written.
//!
//! One workgroup per chunk: the workgroup ID is the chunk coordinate and
//! the local ID the voxel inside it.

use super::bitpack::write_packed;
use super::layout::{ChunkHeader, PushConstants, RegionHeader, CHUNK_PALETTE_COUNT};
use super::PALETTE_KERNEL;
use crate::config::PackWord;
use crate::constants::{
  bits_for_palette, chunk_voxel_index, region_chunk_index, CHUNK_SIZE, PALETTE_CAPACITY,
};
use crate::device::{ComputeKernel, GlobalMemory, Workgroup};

/// Specialization constant selecting the phase.
pub const SPEC_PALETTE_PHASE: u32 = 0;
/// Specialization constant selecting the packed word size (32 or 64).
pub const SPEC_PACK_WORD: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PalettePhase {
  Build,
  Pack,
}

/// Wait for a reserved palette slot to be published and return its raw
/// (`block + 1`) value. Gives up with 0 if the slot address faulted.
#[inline]
fn published_entry(memory: &GlobalMemory, address: u64) -> u32 {
  loop {
    let entry = memory.load_u32(address);
    if entry != 0 || memory.fault().is_some() {
      return entry;
    }
    std::hint::spin_loop();
  }
}

/// Lock-free find-or-insert. Returns the palette index of `block`.
///
/// Once the palette holds [`PALETTE_CAPACITY`] entries, unseen blocks map
/// to index 0.
///
/// `block` must not be `u32::MAX`: its tagged form would be the empty-slot
/// marker 0 and readers would wait on it forever. Release builds map it to
/// index 0 without touching the palette; configuration validation rejects
/// it before any kernel runs.
pub fn find_or_insert(memory: &GlobalMemory, count_address: u64, palette: u64, block: u32) -> u32 {
  debug_assert!(block != u32::MAX, "block ID u32::MAX is reserved");
  if block == u32::MAX {
    return 0;
  }
  let tagged = block + 1;
  loop {
    let count = memory.load_u32(count_address);
    let visible = count.min(PALETTE_CAPACITY);
    for i in 0..visible {
      if published_entry(memory, palette + i as u64 * 4) == tagged {
        return i;
      }
    }
    if count >= PALETTE_CAPACITY {
      return 0;
    }
    if memory
      .compare_exchange_u32(count_address, count, count + 1)
      .is_ok()
    {
      memory.store_u32(palette + count as u64 * 4, tagged);
      return count;
    }
  }
}

/// Read-only palette search. Missing blocks map to index 0.
pub fn lookup(memory: &GlobalMemory, count: u32, palette: u64, block: u32) -> u32 {
  let tagged = block.wrapping_add(1);
  (0..count.min(PALETTE_CAPACITY))
    .find(|&i| memory.load_u32(palette + i as u64 * 4) == tagged)
    .unwrap_or(0)
}

pub struct PaletteKernel {
  phase: PalettePhase,
  word: PackWord,
}

impl PaletteKernel {
  pub fn new(phase: PalettePhase, word: PackWord) -> Self {
    Self { phase, word }
  }
}

impl ComputeKernel for PaletteKernel {
  fn name(&self) -> &str {
    PALETTE_KERNEL
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
    let count_address = pc.address(chunk_offset + CHUNK_PALETTE_COUNT);
    let palette = pc.address(chunk.palette);

    match self.phase {
      PalettePhase::Build => wg.invocations(|inv, _| {
        let l = inv.local;
        let voxel = chunk_voxel_index(l.x, l.y, l.z) as u64;
        let block = memory.load_u32(pc.address(chunk.raw + voxel * 4));
        find_or_insert(memory, count_address, palette, block);
      }),
      PalettePhase::Pack => {
        let count = memory.load_u32(count_address).min(PALETTE_CAPACITY);
        let width = bits_for_palette(count);
        let data = pc.address(chunk.data);
        let word = self.word;
        wg.invocations(|inv, _| {
          let l = inv.local;
          let voxel = chunk_voxel_index(l.x, l.y, l.z) as u32;
          let block = memory.load_u32(pc.address(chunk.raw + voxel as u64 * 4));
          let index = lookup(memory, count, palette, block);
          write_packed(memory, word, data, voxel * width, width, index);
        });
      }
    }
  }
}

#[cfg(test)]
#[path = "palette_test.rs"]
mod palette_test;
