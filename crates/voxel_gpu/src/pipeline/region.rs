//! Heap layout of one region.
//!
//! ```text
//!  uploaded (staging)             zeroed (one fill_buffer)
//!  ┌──────────────────────┐       ┌──────────────────────────────────────────┐
//!  │ RegionHeader         │       │ noise    f32 × 64³                       │
//!  │ NoiseContext         │       │ bitmap   u64 × 3 × 64²                   │
//!  │ TerrainParams        │       │ tracking u64 × 6 × 64²                   │
//!  │ chunk table u64×512  │       │ palettes 512 × 1 KiB                     │
//!  │ ChunkHeader × 512    │       │ packed   512 × 512 B                     │
//!  └──────────────────────┘       │ raw      512 × 2 KiB                     │
//!                                 │ draw args                                │
//!                                 │ MeshHeader + QuadRecord × capacity       │
//!                                 └──────────────────────────────────────────┘
//! ```

use glam::IVec3;

use crate::config::RendererConfig;
use crate::constants::{
  COLUMNS_PER_AXIS, FACE_DIRECTIONS, REGION_CHUNK_COUNT, REGION_SIZE, REGION_VOLUME,
};
use crate::device::GpuDevice;
use crate::error::HeapError;
use crate::heap::{GpuHeap, HeapOffset, HeapRange};
use crate::staging::StagingBelt;
use crate::voxel::layout::{
  ChunkHeader, DrawArgs, MeshHeader, NoiseContext, NoiseParams, QuadRecord, RegionHeader,
  TerrainParams, MESH_HEADER_SIZE, PACKED_BYTES, PALETTE_BYTES, QUAD_RECORD_SIZE, RAW_BYTES,
};

/// Alignment of every sub-range of the zeroed block.
const RANGE_ALIGN: u64 = 256;

/// Offsets of every structure of the region currently in the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionLayout {
  pub coord: IVec3,
  pub quad_capacity: u32,

  pub header: HeapOffset<RegionHeader>,
  pub noise_context: HeapOffset<NoiseContext>,
  pub terrain: HeapOffset<TerrainParams>,
  pub chunk_table: HeapOffset<u64>,
  pub chunks: HeapOffset<ChunkHeader>,
  /// Read-only uploads: header, noise context, terrain params, chunk table.
  pub params: HeapRange,
  /// The [`ChunkHeader`] array. `palette_count` is written on the device.
  pub chunk_headers: HeapRange,

  /// Everything cleared before the first kernel.
  pub zeroed: HeapRange,
  pub noise: HeapRange,
  pub bitmap: HeapRange,
  pub tracking: HeapRange,
  pub palettes: HeapRange,
  pub packed: HeapRange,
  pub raw: HeapRange,
  pub draw_args: HeapRange,
  /// [`MeshHeader`] followed by the quad records.
  pub mesh: HeapRange,
}

fn carve(cursor: &mut u64, size: u64) -> HeapRange {
  let range = HeapRange {
    offset: *cursor,
    size,
  };
  *cursor = (*cursor + size).next_multiple_of(RANGE_ALIGN);
  range
}

impl RegionLayout {
  /// Bytes of the zeroed block for a given quad capacity.
  pub fn zeroed_size(quad_capacity: u32) -> u64 {
    let mut cursor = 0;
    for size in Self::zeroed_sizes(quad_capacity) {
      carve(&mut cursor, size);
    }
    cursor
  }

  fn zeroed_sizes(quad_capacity: u32) -> [u64; 8] {
    let columns = COLUMNS_PER_AXIS as u64 * 8;
    let chunks = REGION_CHUNK_COUNT as u64;
    [
      REGION_VOLUME as u64 * 4,
      3 * columns,
      FACE_DIRECTIONS as u64 * columns,
      chunks * PALETTE_BYTES,
      chunks * PACKED_BYTES,
      chunks * RAW_BYTES,
      std::mem::size_of::<DrawArgs>() as u64,
      MESH_HEADER_SIZE + quad_capacity as u64 * QUAD_RECORD_SIZE,
    ]
  }

  /// Bump-allocate a region, growing the heap as needed. Growth copies are
  /// recorded into `cmd`.
  pub fn allocate<D: GpuDevice>(
    heap: &mut GpuHeap<D>,
    cmd: &mut D::Commands,
    coord: IVec3,
    quad_capacity: u32,
  ) -> Result<Self, HeapError> {
    let header = heap.allocate_array::<RegionHeader>(1, cmd)?;
    let noise_context = heap.allocate_array::<NoiseContext>(1, cmd)?;
    let terrain = heap.allocate_array::<TerrainParams>(1, cmd)?;
    let chunk_table = heap.allocate_array::<u64>(REGION_CHUNK_COUNT as u64, cmd)?;
    let chunks = heap.allocate_array::<ChunkHeader>(REGION_CHUNK_COUNT as u64, cmd)?;
    let params = HeapRange {
      offset: header.offset(),
      size: chunks.offset() - header.offset(),
    };
    let chunk_headers = HeapRange {
      offset: chunks.offset(),
      size: chunks.element(REGION_CHUNK_COUNT as u64).offset() - chunks.offset(),
    };

    let zeroed = heap.allocate_growing(Self::zeroed_size(quad_capacity), RANGE_ALIGN, cmd)?;
    let mut cursor = zeroed.offset;
    let [noise, bitmap, tracking, palettes, packed, raw, draw_args, mesh] =
      Self::zeroed_sizes(quad_capacity).map(|size| carve(&mut cursor, size));

    Ok(Self {
      coord,
      quad_capacity,
      header,
      noise_context,
      terrain,
      chunk_table,
      chunks,
      params,
      chunk_headers,
      zeroed,
      noise,
      bitmap,
      tracking,
      palettes,
      packed,
      raw,
      draw_args,
      mesh,
    })
  }

  pub fn region_header(&self) -> RegionHeader {
    RegionHeader {
      origin: self.coord.to_array(),
      quad_capacity: self.quad_capacity,
      bitmap: self.bitmap.offset,
      tracking: self.tracking.offset,
      mesh: self.mesh.offset,
      draw_args: self.draw_args.offset,
      noise: self.noise_context.offset(),
      chunk_table: self.chunk_table.offset(),
    }
  }

  pub fn chunk_header(&self, index: usize) -> ChunkHeader {
    let i = index as u64;
    ChunkHeader {
      palette_count: 0,
      _pad: 0,
      palette: self.palettes.offset + i * PALETTE_BYTES,
      data: self.packed.offset + i * PACKED_BYTES,
      raw: self.raw.offset + i * RAW_BYTES,
    }
  }

  pub fn mesh_header(&self) -> HeapOffset<MeshHeader> {
    self.mesh.typed()
  }

  pub fn quads(&self) -> HeapOffset<QuadRecord> {
    HeapOffset::new(self.mesh.offset + MESH_HEADER_SIZE)
  }

  /// Queue the header, parameter blocks and chunk records for upload.
  pub fn upload<D: GpuDevice>(&self, staging: &mut StagingBelt<D>, config: &RendererConfig) {
    let header = self.region_header();
    staging.enqueue_value(self.header, &header);

    let context = NoiseContext {
      params: NoiseParams::from_settings(
        &config.noise,
        header.world_origin(),
        [REGION_SIZE; 3],
      ),
      output: self.noise.offset,
    };
    staging.enqueue_value(self.noise_context, &context);
    staging.enqueue_value(self.terrain, &TerrainParams::from_settings(&config.terrain));

    let table: Vec<u64> = (0..REGION_CHUNK_COUNT as u64)
      .map(|i| self.chunks.element(i).offset())
      .collect();
    staging.enqueue_slice(self.chunk_table, &table);

    let chunks: Vec<ChunkHeader> = (0..REGION_CHUNK_COUNT).map(|i| self.chunk_header(i)).collect();
    staging.enqueue_slice(self.chunks, &chunks);
  }
}

#[cfg(test)]
#[path = "region_test.rs"]
mod region_test;
