//! Region, chunk and column layout constants.
//!
//! # Region Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Region: 8×8×8 chunks = 64³ voxels                                │
//! │                                                                  │
//! │   chunk (cx,cy,cz)  index = cz*64 + cy*8 + cx                    │
//! │   voxel (lx,ly,lz)  index = lz*64 + ly*8 + lx   (X fastest)      │
//! │                                                                  │
//! │ Occupancy: 3 axes × 64×64 columns of u64                         │
//! │                                                                  │
//! │   axis   depth bit   column (u, v)                               │
//! │   X      x           (y, z)                                      │
//! │   Y      y           (x, z)                                      │
//! │   Z      z           (x, y)                                      │
//! │                                                                  │
//! │   column index = v*64 + u                                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Face Directions
//!
//! ```text
//! code = axis*2 + negative
//!
//!   0 = +X    1 = -X
//!   2 = +Y    3 = -Y
//!   4 = +Z    5 = -Z
//! ```

/// Voxels per chunk axis.
pub const CHUNK_SIZE: u32 = 8;

/// Voxels per chunk (8³).
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Chunks per region axis.
pub const REGION_CHUNKS: u32 = 8;

/// Chunks per region (8³).
pub const REGION_CHUNK_COUNT: usize = (REGION_CHUNKS * REGION_CHUNKS * REGION_CHUNKS) as usize;

/// Voxels per region axis. Matches the width of an occupancy column.
pub const REGION_SIZE: u32 = CHUNK_SIZE * REGION_CHUNKS;

/// Voxels per region (64³).
pub const REGION_VOLUME: usize = (REGION_SIZE * REGION_SIZE * REGION_SIZE) as usize;

/// Columns per occupancy axis (64×64).
pub const COLUMNS_PER_AXIS: usize = (REGION_SIZE * REGION_SIZE) as usize;

/// Face directions (±X, ±Y, ±Z).
pub const FACE_DIRECTIONS: usize = 6;

/// Maximum distinct block IDs per chunk palette.
pub const PALETTE_CAPACITY: u32 = 256;

/// Widest packed index (log2 of the palette capacity).
pub const MAX_PACK_BITS: u32 = 8;

/// Block ID of empty space.
pub const AIR: u32 = 0;

/// Columns per side of a greedy-meshing workgroup tile.
pub const MESH_TILE: u32 = 8;

/// Default quad capacity of a region's mesh output.
pub const DEFAULT_QUAD_CAPACITY: u32 = 1 << 16;

/// Linear index in an X-fastest grid: `z*sx*sy + y*sx + x`.
#[inline(always)]
pub const fn grid_index(x: u32, y: u32, z: u32, sx: u32, sy: u32) -> usize {
  (z as usize * sx as usize * sy as usize) + (y as usize * sx as usize) + x as usize
}

/// Voxel index inside a chunk.
#[inline(always)]
pub const fn chunk_voxel_index(x: u32, y: u32, z: u32) -> usize {
  grid_index(x, y, z, CHUNK_SIZE, CHUNK_SIZE)
}

/// Chunk index inside a region.
#[inline(always)]
pub const fn region_chunk_index(cx: u32, cy: u32, cz: u32) -> usize {
  grid_index(cx, cy, cz, REGION_CHUNKS, REGION_CHUNKS)
}

/// Voxel index inside a region-sized grid (noise output).
#[inline(always)]
pub const fn region_voxel_index(x: u32, y: u32, z: u32) -> usize {
  grid_index(x, y, z, REGION_SIZE, REGION_SIZE)
}

/// Column index inside one occupancy axis.
#[inline(always)]
pub const fn column_index(u: u32, v: u32) -> usize {
  (v * REGION_SIZE + u) as usize
}

/// Map a region voxel to `(column u, column v, depth)` for an axis.
#[inline(always)]
pub const fn voxel_to_column(axis: u32, x: u32, y: u32, z: u32) -> (u32, u32, u32) {
  match axis {
    0 => (y, z, x),
    1 => (x, z, y),
    _ => (x, y, z),
  }
}

/// Inverse of [`voxel_to_column`].
#[inline(always)]
pub const fn column_to_voxel(axis: u32, u: u32, v: u32, depth: u32) -> (u32, u32, u32) {
  match axis {
    0 => (depth, u, v),
    1 => (u, depth, v),
    _ => (u, v, depth),
  }
}

/// Bits needed to index a palette of `count` entries: `max(1, ceil(log2 count))`.
#[inline(always)]
pub const fn bits_for_palette(count: u32) -> u32 {
  if count <= 1 {
    1
  } else {
    32 - (count - 1).leading_zeros()
  }
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
