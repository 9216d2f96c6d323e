//! Renderer I/O types.
//!
//! ```text
//!  generate_region(coord)
//!        │
//!        ▼
//!  ┌──────────────┐  allocate   ┌────────────────┐  build   ┌────────────┐
//!  │ GpuHeap      ├────────────►│ RegionLayout   ├─────────►│ RenderGraph│
//!  └──────────────┘             └────────────────┘          └─────┬──────┘
//!                                                                 │ submit
//!                                                                 ▼
//!                                                          RegionReport
//! ```

use glam::IVec3;

use crate::voxel::CompressionStats;

/// Outcome of one `generate_region`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionReport {
  pub coord: IVec3,
  /// Quads stored in the mesh buffer.
  pub quads: u32,
  /// Quads the mesher produced past the capacity.
  pub dropped_quads: u32,
  pub barriers: u32,
  pub barrier_batches: u32,
  /// Executed passes, in order.
  pub passes: Vec<String>,
  pub dispatches: u32,
  pub vertices: u64,
  pub heap_grew: bool,
  pub heap_capacity: u64,
  pub uploaded_bytes: u64,

  // Timing (microseconds)
  pub record_us: u64,
  pub submit_us: u64,
  pub total_us: u64,
}

impl RegionReport {
  /// Vertex count the draw should have consumed.
  pub fn expected_vertices(&self) -> u64 {
    self.quads as u64 * crate::voxel::VERTICES_PER_QUAD as u64
  }
}

/// Decoded contents of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkSnapshot {
  /// Block IDs in palette order.
  pub palette: Vec<u32>,
  /// Block ID of every voxel, X fastest.
  pub voxels: Vec<u32>,
  pub stats: CompressionStats,
}

impl ChunkSnapshot {
  /// Voxels that are not air.
  pub fn solid_count(&self) -> usize {
    self
      .voxels
      .iter()
      .filter(|&&b| b != crate::constants::AIR)
      .count()
  }
}
