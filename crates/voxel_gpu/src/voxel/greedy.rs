//! Binary greedy mesher.
//!
//! One workgroup covers an 8×8 tile of columns for one face direction.
//!
//! ```text
//!  shared[0..64]    face mask of each lane's column
//!  shared[64..128]  bits already handled (processed) per lane
//!
//!  repeat (uniform across the group):
//!    ballot  lanes with face & !processed
//!    none?   done
//!    elect   lowest such lane; it takes its lowest pending depth bit
//!            claim start bit in global tracking
//!            grow along u while face bit set and claim succeeds
//!            grow along v while the whole u-range of the next row is
//!              set and unclaimed, then claim that row
//!            emit one quad
//!    barrier
//! ```
//!
//! Growth may leave the tile. Every absorbed bit is claimed in the global
//! tracking grid (and marked processed when it lies inside the tile), so a
//! neighbouring workgroup that later reaches the same bit skips it. If a
//! row claim loses a race part way, the claimed prefix is emitted as its
//! own quad and growth stops.

use super::layout::{PushConstants, RegionHeader};
use super::quad::{column_quad, emit_quad, face_mask};
use super::GREEDY_MESH_KERNEL;
use crate::constants::{column_index, MESH_TILE, REGION_SIZE};
use crate::device::{ComputeKernel, GlobalMemory, Workgroup};

const LANES: usize = (MESH_TILE * MESH_TILE) as usize;
const MASKS: usize = 0;
const PROCESSED: usize = LANES;

pub struct GreedyMeshKernel;

struct Grower<'m> {
  memory: &'m GlobalMemory,
  pc: PushConstants,
  region: RegionHeader,
  dir: u32,
  negative: bool,
  tile_u: u32,
  tile_v: u32,
}

impl Grower<'_> {
  #[inline]
  fn face_bits(&self, u: u32, v: u32) -> u64 {
    let address = self.region.bitmap_column(self.dir / 2, column_index(u, v));
    face_mask(self.memory.load_u64(self.pc.address(address)), self.negative)
  }

  #[inline]
  fn tracking(&self, u: u32, v: u32) -> u64 {
    self
      .pc
      .address(self.region.tracking_column(self.dir, column_index(u, v)))
  }

  /// Atomically claim `bit`; false if it was already claimed.
  #[inline]
  fn claim(&self, u: u32, v: u32, bit: u64) -> bool {
    self.memory.fetch_or_u64(self.tracking(u, v), bit) & bit == 0
  }

  #[inline]
  fn is_claimed(&self, u: u32, v: u32, bit: u64) -> bool {
    self.memory.load_u64(self.tracking(u, v)) & bit != 0
  }

  fn mark_processed(&self, shared: &mut [u64], u: u32, v: u32, bit: u64) {
    let (du, dv) = (u.wrapping_sub(self.tile_u), v.wrapping_sub(self.tile_v));
    if du < MESH_TILE && dv < MESH_TILE {
      shared[PROCESSED + (dv * MESH_TILE + du) as usize] |= bit;
    }
  }

  fn emit(&self, u: u32, v: u32, depth: u32, w: u32, h: u32) {
    let quad = column_quad(self.dir, u, v, depth, w, h);
    emit_quad(self.memory, &self.pc, &self.region, &quad);
  }

  fn grow(&self, u: u32, v: u32, lane: usize, shared: &mut [u64]) {
    let pending = shared[MASKS + lane] & !shared[PROCESSED + lane];
    let depth = pending.trailing_zeros();
    let bit = 1u64 << depth;
    shared[PROCESSED + lane] |= bit;
    if !self.claim(u, v, bit) {
      return;
    }

    let mut width = 1;
    while u + width < REGION_SIZE {
      let cu = u + width;
      if self.face_bits(cu, v) & bit == 0 || !self.claim(cu, v, bit) {
        break;
      }
      self.mark_processed(shared, cu, v, bit);
      width += 1;
    }

    let mut height = 1;
    'rows: while v + height < REGION_SIZE {
      let row = v + height;
      let open = (u..u + width)
        .all(|cu| self.face_bits(cu, row) & bit != 0 && !self.is_claimed(cu, row, bit));
      if !open {
        break;
      }
      for cu in u..u + width {
        if !self.claim(cu, row, bit) {
          if cu > u {
            self.emit(u, row, depth, cu - u, 1);
          }
          break 'rows;
        }
        self.mark_processed(shared, cu, row, bit);
      }
      height += 1;
    }

    self.emit(u, v, depth, width, height);
  }
}

impl ComputeKernel for GreedyMeshKernel {
  fn name(&self) -> &str {
    GREEDY_MESH_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [MESH_TILE, MESH_TILE, 1]
  }

  fn shared_words(&self) -> usize {
    2 * LANES
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let id = wg.id();
    let dir = id.z;
    let grower = Grower {
      memory,
      pc,
      region: memory.read(pc.address(pc.region)),
      dir,
      negative: dir & 1 == 1,
      tile_u: id.x * MESH_TILE,
      tile_v: id.y * MESH_TILE,
    };

    wg.invocations(|inv, shared| {
      let lane = inv.index as usize;
      shared[MASKS + lane] = grower.face_bits(inv.global.x, inv.global.y);
      shared[PROCESSED + lane] = 0;
    });
    wg.barrier();

    loop {
      let pending = wg.ballot(|inv, shared| {
        let lane = inv.index as usize;
        shared[MASKS + lane] & !shared[PROCESSED + lane] != 0
      });
      if pending == 0 {
        break;
      }
      let leader = pending.trailing_zeros();
      wg.single(leader, |inv, shared| {
        grower.grow(inv.global.x, inv.global.y, inv.index as usize, shared);
      });
      wg.barrier();
    }
  }
}

#[cfg(test)]
#[path = "greedy_test.rs"]
mod greedy_test;
