//! Test utilities for kernel and pipeline tests.
//!
//! [`RegionFixture`] lays out a region header, occupancy bitmap, tracking
//! grids and mesh output in a single memory block so the mesher kernels can
//! run in isolation, without the heap, graph or renderer.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::Zeroable;

use super::renderer::VoxelRenderer;
use crate::config::{MesherKind, RendererConfig, TerrainMode, TerrainSettings};
use crate::constants::{
  column_index, voxel_to_column, COLUMNS_PER_AXIS, FACE_DIRECTIONS, MESH_TILE, REGION_SIZE,
};
use crate::device::{
  run_dispatch, ComputeKernel, GlobalMemory, HostDevice, HostDeviceConfig, MemoryBlock,
};
use crate::voxel::layout::{
  PushConstants, QuadRecord, RegionHeader, MESH_HEADER_SIZE, QUAD_RECORD_SIZE,
};
use crate::voxel::quad::{bitmap_faces, quad_faces, Face};

// =============================================================================
// Solid Shapes
// =============================================================================

/// Axis-aligned box, `min` inclusive, `max` exclusive.
pub fn solid_box(min: [u32; 3], max: [u32; 3]) -> impl Fn(u32, u32, u32) -> bool {
  move |x, y, z| {
    (min[0]..max[0]).contains(&x) && (min[1]..max[1]).contains(&y) && (min[2]..max[2]).contains(&z)
  }
}

pub fn solid_sphere(center: [f32; 3], radius: f32) -> impl Fn(u32, u32, u32) -> bool {
  move |x, y, z| {
    let d = [
      x as f32 + 0.5 - center[0],
      y as f32 + 0.5 - center[1],
      z as f32 + 0.5 - center[2],
    ];
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= radius * radius
  }
}

/// Scattered voxels, roughly `percent`% solid. Deterministic per `seed`.
pub fn solid_noise(seed: u32, percent: u32) -> impl Fn(u32, u32, u32) -> bool {
  move |x, y, z| {
    let mut h = seed
      ^ x.wrapping_mul(0x9E37_79B1)
      ^ y.wrapping_mul(0x85EB_CA6B)
      ^ z.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    h % 100 < percent
  }
}

/// CPU occupancy bitmap (`3 × 64×64` columns) of a solid predicate.
pub fn bitmap_from(solid: impl Fn(u32, u32, u32) -> bool) -> Vec<u64> {
  let mut bitmap = vec![0u64; 3 * COLUMNS_PER_AXIS];
  for z in 0..REGION_SIZE {
    for y in 0..REGION_SIZE {
      for x in 0..REGION_SIZE {
        if !solid(x, y, z) {
          continue;
        }
        for axis in 0..3 {
          let (u, v, depth) = voxel_to_column(axis, x, y, z);
          bitmap[axis as usize * COLUMNS_PER_AXIS + column_index(u, v)] |= 1 << depth;
        }
      }
    }
  }
  bitmap
}

// =============================================================================
// Region Fixture
// =============================================================================

/// Device address the fixture's memory block is mapped at.
pub const FIXTURE_BASE: u64 = 0x10_0000;

/// One region's mesher inputs and outputs in device memory.
pub struct RegionFixture {
  pub memory: GlobalMemory,
  pub block: Arc<MemoryBlock>,
  pub region: RegionHeader,
  pub pc: PushConstants,
  bitmap: Vec<u64>,
}

impl RegionFixture {
  pub fn new(solid: impl Fn(u32, u32, u32) -> bool, quad_capacity: u32) -> Self {
    let bitmap = bitmap_from(solid);

    let bitmap_offset = 64;
    let tracking = bitmap_offset + (3 * COLUMNS_PER_AXIS * 8) as u64;
    let mesh = tracking + (FACE_DIRECTIONS * COLUMNS_PER_AXIS * 8) as u64;
    let draw_args = mesh + MESH_HEADER_SIZE + quad_capacity as u64 * QUAD_RECORD_SIZE;
    let size = draw_args + 16;

    let region = RegionHeader {
      quad_capacity,
      bitmap: bitmap_offset,
      tracking,
      mesh,
      draw_args,
      ..Default::default()
    };

    let block = Arc::new(MemoryBlock::new(size));
    block.write_bytes(0, bytemuck::bytes_of(&region));
    block.write_bytes(bitmap_offset, bytemuck::cast_slice(&bitmap));

    Self {
      memory: GlobalMemory::new(vec![(FIXTURE_BASE, size, block.clone())]),
      block,
      region,
      pc: PushConstants {
        heap_base: FIXTURE_BASE,
        region: 0,
        params: 0,
      },
      bitmap,
    }
  }

  /// Run `kernel` over `groups` with the fixture's push constants.
  pub fn dispatch(&self, kernel: &dyn ComputeKernel, groups: [u32; 3]) {
    run_dispatch(kernel, groups, bytemuck::bytes_of(&self.pc), &self.memory);
    assert_eq!(self.memory.fault(), None, "kernel faulted");
  }

  /// Dispatch a mesher over every tile of every face direction.
  pub fn mesh(&self, kernel: &dyn ComputeKernel) {
    let tiles = REGION_SIZE / MESH_TILE;
    self.dispatch(kernel, [tiles, tiles, FACE_DIRECTIONS as u32]);
  }

  pub fn bitmap(&self) -> &[u64] {
    &self.bitmap
  }

  /// Slots reserved so far, including dropped ones.
  pub fn face_count(&self) -> u32 {
    self.block.load_u32(self.region.mesh)
  }

  /// Quads actually stored.
  pub fn quads(&self) -> Vec<QuadRecord> {
    let stored = self.face_count().min(self.region.quad_capacity);
    (0..stored)
      .map(|slot| {
        let mut quad = QuadRecord::zeroed();
        self
          .block
          .read_bytes(self.region.quad_record(slot), bytemuck::bytes_of_mut(&mut quad));
        quad
      })
      .collect()
  }

  /// Every exposed face of the fixture's bitmap.
  pub fn expected_faces(&self) -> Vec<Face> {
    bitmap_faces(&self.bitmap)
  }

  /// Faces marked in the tracking grids.
  pub fn tracking_faces(&self) -> Vec<Face> {
    let mut faces = Vec::new();
    for dir in 0..FACE_DIRECTIONS as u32 {
      for v in 0..REGION_SIZE {
        for u in 0..REGION_SIZE {
          let mut bits = self
            .block
            .load_u64(self.region.tracking_column(dir, column_index(u, v)));
          while bits != 0 {
            faces.push((dir, u, v, bits.trailing_zeros()));
            bits &= bits - 1;
          }
        }
      }
    }
    faces
  }
}

// =============================================================================
// Assertions
// =============================================================================

/// How often each face is covered by `quads`.
pub fn face_coverage(quads: &[QuadRecord]) -> HashMap<Face, u32> {
  let mut coverage = HashMap::new();
  for quad in quads {
    for face in quad_faces(quad) {
      *coverage.entry(face).or_insert(0) += 1;
    }
  }
  coverage
}

/// Every expected face covered exactly once and nothing else covered.
pub fn assert_exact_cover(quads: &[QuadRecord], expected: &[Face]) {
  let coverage = face_coverage(quads);
  for (face, count) in &coverage {
    assert_eq!(*count, 1, "face {face:?} covered {count} times");
  }
  let mut covered: Vec<Face> = coverage.into_keys().collect();
  let mut expected = expected.to_vec();
  covered.sort_unstable();
  expected.sort_unstable();
  assert_eq!(covered.len(), expected.len(), "covered face count");
  assert_eq!(covered, expected);
}

// =============================================================================
// Renderer Fixtures
// =============================================================================

/// Small, deterministic renderer config: sine-wave terrain, tight heap.
pub fn test_config() -> RendererConfig {
  RendererConfig::default()
    .with_initial_heap_size(1 << 20)
    .with_terrain(TerrainSettings {
      mode: TerrainMode::SineWave,
      ..TerrainSettings::default()
    })
}

/// Renderer on a device that rejects any submission with an unordered access.
pub fn test_renderer(config: RendererConfig) -> VoxelRenderer<HostDevice> {
  let device = HostDeviceConfig::default().with_hazard_validation(true);
  VoxelRenderer::host_with(device, config).expect("renderer should initialize")
}

pub fn simple_renderer() -> VoxelRenderer<HostDevice> {
  test_renderer(test_config().with_mesher(MesherKind::Simple))
}
