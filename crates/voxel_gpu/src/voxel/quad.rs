//! Face masks, quad emission and host-side face bookkeeping shared by the
//! two meshers.

use glam::UVec3;

use super::layout::{PushConstants, QuadRecord, RegionHeader};
use crate::constants::{
  column_index, column_to_voxel, voxel_to_column, COLUMNS_PER_AXIS, REGION_SIZE,
};
use crate::device::GlobalMemory;

/// Material written into every quad.
pub const PLACEHOLDER_MATERIAL: u32 = 1;

/// Solid bits whose neighbour in the face direction is empty.
///
/// Positive faces look towards `depth + 1`, negative towards `depth - 1`.
/// Bits past either end of the column count as empty.
#[inline]
pub const fn face_mask(column: u64, negative: bool) -> u64 {
  if negative {
    column & !(column << 1)
  } else {
    column & !(column >> 1)
  }
}

/// Direction code `axis * 2 + negative`.
#[inline]
pub const fn direction(axis: u32, negative: bool) -> u32 {
  axis * 2 + negative as u32
}

/// Reserve a slot and write `quad`. Returns false when the slot is past the
/// region's capacity and the quad was dropped.
#[inline]
pub fn emit_quad(
  memory: &GlobalMemory,
  pc: &PushConstants,
  region: &RegionHeader,
  quad: &QuadRecord,
) -> bool {
  let slot = memory.fetch_add_u32(pc.address(region.mesh), 1);
  if slot >= region.quad_capacity {
    return false;
  }
  memory.write(pc.address(region.quad_record(slot)), quad);
  true
}

/// Quad covering columns `[u, u+w) × [v, v+h)` at `depth` of face `dir`.
pub fn column_quad(dir: u32, u: u32, v: u32, depth: u32, w: u32, h: u32) -> QuadRecord {
  let (x, y, z) = column_to_voxel(dir / 2, u, v, depth);
  QuadRecord::new(UVec3::new(x, y, z), [w, h], dir, PLACEHOLDER_MATERIAL)
}

/// One exposed voxel face: `(direction, u, v, depth)`.
pub type Face = (u32, u32, u32, u32);

/// Faces covered by a quad.
pub fn quad_faces(quad: &QuadRecord) -> impl Iterator<Item = Face> {
  let dir = quad.axis;
  let [x, y, z] = quad.pos;
  let (u0, v0, depth) = voxel_to_column(dir / 2, x, y, z);
  let [w, h] = quad.size;
  (0..h).flat_map(move |dv| (0..w).map(move |du| (dir, u0 + du, v0 + dv, depth)))
}

/// Every exposed face of an occupancy bitmap (`3 × 64×64` columns).
pub fn bitmap_faces(bitmap: &[u64]) -> Vec<Face> {
  let mut faces = Vec::new();
  for dir in 0..6u32 {
    let axis = dir / 2;
    for v in 0..REGION_SIZE {
      for u in 0..REGION_SIZE {
        let column = bitmap[axis as usize * COLUMNS_PER_AXIS + column_index(u, v)];
        let mut mask = face_mask(column, dir & 1 == 1);
        while mask != 0 {
          let depth = mask.trailing_zeros();
          faces.push((dir, u, v, depth));
          mask &= mask - 1;
        }
      }
    }
  }
  faces
}

#[cfg(test)]
#[path = "quad_test.rs"]
mod quad_test;
