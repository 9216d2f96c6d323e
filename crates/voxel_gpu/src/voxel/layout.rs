//! Heap wire format shared by the CPU allocation code and the kernels.
//!
//! All structs are `#[repr(C)]` with explicit padding. Every offset field is
//! a byte offset from the heap base; kernels add it to the base address from
//! the push constants.
//!
//! ```text
//! RegionHeader ──► chunk table [u64; 512] ──► ChunkHeader ──► palette [u32; 256]
//!      │                                            ├──────► packed indices
//!      │                                            └──────► raw block IDs [u32; 512]
//!      ├──► bitmap     [3][64×64] u64
//!      ├──► tracking   [6][64×64] u64
//!      ├──► MeshHeader { face_count } ─► QuadRecord[quad_capacity]
//!      ├──► DrawArgs
//!      └──► NoiseContext ─► noise [f32; 64³]
//! ```

use bytemuck::{Pod, Zeroable};
use glam::UVec3;

use crate::config::{NoiseSettings, TerrainSettings};
use crate::constants::{CHUNK_VOLUME, COLUMNS_PER_AXIS, PALETTE_CAPACITY, REGION_SIZE};

/// fBm parameters of the noise kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NoiseParams {
  pub seed: i32,
  pub octaves: u32,
  pub scale: f32,
  pub frequency: f32,
  pub lacunarity: f32,
  pub persistence: f32,
  /// Integer offset of the grid origin in world voxels.
  pub offset: [i32; 3],
  pub size: [u32; 3],
}

impl NoiseParams {
  pub fn from_settings(settings: &NoiseSettings, offset: [i32; 3], size: [u32; 3]) -> Self {
    Self {
      seed: settings.seed,
      octaves: settings.octaves,
      scale: settings.scale,
      frequency: settings.frequency,
      lacunarity: settings.lacunarity,
      persistence: settings.persistence,
      offset,
      size,
    }
  }

  pub fn fbm(&self) -> voxel_noise::Fbm {
    voxel_noise::Fbm::default()
      .with_seed(self.seed)
      .with_octaves(self.octaves)
      .with_lacunarity(self.lacunarity)
      .with_persistence(self.persistence)
  }

  pub fn voxel_count(&self) -> usize {
    self.size.iter().map(|&s| s as usize).product()
  }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NoiseContext {
  pub params: NoiseParams,
  /// Byte offset of the `f32` output grid.
  pub output: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainParams {
  pub height_scale: f32,
  pub height_offset: f32,
  pub squish: f32,
  /// [`TerrainMode`](crate::config::TerrainMode) code.
  pub mode: u32,
  pub surface_block: u32,
  pub deep_block: u32,
  pub surface_depth: u32,
  pub _pad: u32,
}

impl TerrainParams {
  pub fn from_settings(settings: &TerrainSettings) -> Self {
    Self {
      height_scale: settings.height_scale,
      height_offset: settings.height_offset,
      squish: settings.squish,
      mode: settings.mode.code(),
      surface_block: settings.surface_block,
      deep_block: settings.deep_block,
      surface_depth: settings.surface_depth,
      _pad: 0,
    }
  }
}

/// Root record of one region.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RegionHeader {
  /// Region coordinate (in regions).
  pub origin: [i32; 3],
  pub quad_capacity: u32,
  pub bitmap: u64,
  pub tracking: u64,
  /// [`MeshHeader`] followed by the quad records.
  pub mesh: u64,
  pub draw_args: u64,
  pub noise: u64,
  /// `[u64; 512]` of [`ChunkHeader`] offsets.
  pub chunk_table: u64,
}

impl RegionHeader {
  /// World voxel position of the region's first voxel.
  pub fn world_origin(&self) -> [i32; 3] {
    self.origin.map(|c| c * REGION_SIZE as i32)
  }

  /// Byte offset of column `column` of occupancy axis `axis`.
  #[inline]
  pub fn bitmap_column(&self, axis: u32, column: usize) -> u64 {
    self.bitmap + ((axis as u64 * COLUMNS_PER_AXIS as u64) + column as u64) * 8
  }

  /// Byte offset of column `column` of the tracking grid for face `direction`.
  #[inline]
  pub fn tracking_column(&self, direction: u32, column: usize) -> u64 {
    self.tracking + ((direction as u64 * COLUMNS_PER_AXIS as u64) + column as u64) * 8
  }

  #[inline]
  pub fn quad_record(&self, slot: u32) -> u64 {
    self.mesh + MESH_HEADER_SIZE + slot as u64 * QUAD_RECORD_SIZE
  }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ChunkHeader {
  /// Atomic palette entry count.
  pub palette_count: u32,
  pub _pad: u32,
  /// `[u32; 256]`; entries are published as `block + 1`.
  pub palette: u64,
  /// Bit-packed palette indices.
  pub data: u64,
  /// `[u32; 512]` raw block IDs.
  pub raw: u64,
}

/// Byte offset of `palette_count` inside [`ChunkHeader`].
pub const CHUNK_PALETTE_COUNT: u64 = 0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshHeader {
  /// Atomic count of reserved slots; may exceed the capacity.
  pub face_count: u32,
  pub _pad: [u32; 3],
}

pub const MESH_HEADER_SIZE: u64 = std::mem::size_of::<MeshHeader>() as u64;

/// One emitted quad.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct QuadRecord {
  /// Region voxel of the quad's minimum corner (the solid voxel).
  pub pos: [u32; 3],
  /// Extent along the column `u` and `v` axes.
  pub size: [u32; 2],
  /// `axis * 2 + negative`.
  pub axis: u32,
  pub material: u32,
}

pub const QUAD_RECORD_SIZE: u64 = std::mem::size_of::<QuadRecord>() as u64;

impl QuadRecord {
  pub fn new(pos: UVec3, size: [u32; 2], direction: u32, material: u32) -> Self {
    Self {
      pos: pos.to_array(),
      size,
      axis: direction,
      material,
    }
  }

  #[inline]
  pub fn normal_axis(&self) -> u32 {
    self.axis / 2
  }

  #[inline]
  pub fn is_negative(&self) -> bool {
    self.axis & 1 == 1
  }

  pub fn area(&self) -> u32 {
    self.size[0] * self.size[1]
  }
}

/// `{vertex_count, instance_count, first_vertex, first_instance}`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawArgs {
  pub vertex_count: u32,
  pub instance_count: u32,
  pub first_vertex: u32,
  pub first_instance: u32,
}

/// Push constants of every voxel kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PushConstants {
  pub heap_base: u64,
  /// Offset of the [`RegionHeader`].
  pub region: u64,
  /// Offset of the stage's parameter block (noise context or terrain params).
  pub params: u64,
}

impl PushConstants {
  #[inline]
  pub fn address(&self, offset: u64) -> u64 {
    self.heap_base + offset
  }
}

/// Sizes of the per-chunk arrays.
pub const PALETTE_BYTES: u64 = PALETTE_CAPACITY as u64 * 4;
pub const RAW_BYTES: u64 = CHUNK_VOLUME as u64 * 4;
/// Packed data at the widest index (8 bits per voxel).
pub const PACKED_BYTES: u64 = CHUNK_VOLUME as u64;

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;
