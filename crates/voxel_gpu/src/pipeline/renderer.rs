//! Region Renderer
//!
//! Owns the device, heap, staging belt and pipeline cache, and runs the
//! whole voxel pipeline for one region per call.
//!
//! # Usage
//!
//! ```ignore
//! let mut renderer = VoxelRenderer::host(RendererConfig::default())?;
//! let report = renderer.generate_region(IVec3::ZERO)?;
//! let quads = renderer.read_quads()?;
//! ```
//!
//! # Per-Region Sequence
//!
//! ```text
//! heap.reset
//! allocate layout        (may grow: copy old → new recorded first)
//! staging.flush          (copies target the current heap buffer)
//! graph.execute          (barriers + dispatches + draw)
//! submit                 (heap marked in use until completion)
//! collect retired heap buffers, retire staging buffers
//! ```

use std::sync::Arc;

use glam::{IVec3, UVec3};
use web_time::Instant;

use super::passes::{build_region_graph, frame_for, RegionPassInputs, StagePipelines};
use super::region::RegionLayout;
use super::types::{ChunkSnapshot, RegionReport};
use crate::config::{MesherKind, RendererConfig};
use crate::constants::{
  bits_for_palette, region_chunk_index, CHUNK_VOLUME, COLUMNS_PER_AXIS, FACE_DIRECTIONS,
  PALETTE_CAPACITY, REGION_CHUNKS, REGION_VOLUME,
};
use crate::device::{GpuDevice, HostDevice, HostDeviceConfig, ImageHandle, PipelineHandle};
use crate::error::RendererError;
use crate::graph::GraphDesc;
use crate::heap::{GpuHeap, HeapDesc, HeapOffset};
use crate::metrics::PipelineMetrics;
use crate::shader::{
  HostShaderCompiler, PipelineCache, PipelineFactory, ShaderCompiler, ShaderSource, Specialization,
};
use crate::staging::StagingBelt;
use crate::voxel::bitpack::packed_len;
use crate::voxel::layout::{DrawArgs, QuadRecord};
use crate::voxel::{
  decompress_chunk, kernel_library, CompressionStats, BITMAP_KERNEL, FACE_MESH_KERNEL,
  FINALIZE_KERNEL, GREEDY_MESH_KERNEL, NOISE_KERNEL, PALETTE_KERNEL, QUAD_VERTEX,
  SPEC_PACK_WORD, SPEC_PALETTE_PHASE, TERRAIN_KERNEL,
};

/// Voxel terrain renderer over any [`GpuDevice`].
pub struct VoxelRenderer<D: GpuDevice + PipelineFactory> {
  device: Arc<D>,
  config: RendererConfig,
  heap: GpuHeap<D>,
  staging: StagingBelt<D>,
  cache: PipelineCache,
  pipelines: StagePipelines,
  color_target: ImageHandle,
  layout: Option<RegionLayout>,
  frame_index: u64,
  graph_log: Option<String>,
  metrics: PipelineMetrics,
}

impl VoxelRenderer<HostDevice> {
  /// Renderer on a fresh host device with every voxel kernel registered.
  pub fn host(config: RendererConfig) -> Result<Self, RendererError> {
    Self::host_with(HostDeviceConfig::default(), config)
  }

  pub fn host_with(
    device_config: HostDeviceConfig,
    config: RendererConfig,
  ) -> Result<Self, RendererError> {
    let library = Arc::new(kernel_library());
    let device = Arc::new(HostDevice::new(device_config, library.clone()));
    Self::new(device, &HostShaderCompiler::new(library), config)
  }
}

impl<D: GpuDevice + PipelineFactory> VoxelRenderer<D> {
  /// Validate `config`, create the heap and build every pipeline.
  pub fn new(
    device: Arc<D>,
    compiler: &dyn ShaderCompiler,
    config: RendererConfig,
  ) -> Result<Self, RendererError> {
    config.validate()?;

    let heap = GpuHeap::create(device.clone(), HeapDesc::device_local(config.initial_heap_size))?;
    let staging = StagingBelt::new(device.clone());
    let mut cache = PipelineCache::new();

    let word_bits = config.pack_word.bits();
    let none = Specialization::new();
    let palette = |phase: u32| {
      Specialization::new()
        .with(SPEC_PALETTE_PHASE, phase)
        .with(SPEC_PACK_WORD, word_bits)
    };
    let factory: &dyn PipelineFactory = device.as_ref();
    let mut compute = |name: &str, spec: &Specialization| -> Result<PipelineHandle, RendererError> {
      Ok(cache.get_or_create(compiler, factory, &ShaderSource::compute(name), spec)?)
    };

    let pipelines = StagePipelines {
      noise: compute(NOISE_KERNEL, &none)?,
      terrain: compute(TERRAIN_KERNEL, &none)?,
      palette_build: compute(PALETTE_KERNEL, &palette(0))?,
      palette_pack: compute(PALETTE_KERNEL, &palette(1))?,
      bitmap: compute(BITMAP_KERNEL, &none)?,
      face_mesh: compute(FACE_MESH_KERNEL, &none)?,
      greedy_mesh: compute(GREEDY_MESH_KERNEL, &none)?,
      finalize: compute(FINALIZE_KERNEL, &none)?,
      draw: cache.get_or_create(compiler, factory, &ShaderSource::vertex(QUAD_VERTEX), &none)?,
    };

    tracing::info!(
      heap = config.initial_heap_size,
      pipelines = cache.len(),
      mesher = ?config.mesher,
      "voxel renderer ready"
    );

    Ok(Self {
      device,
      config,
      heap,
      staging,
      cache,
      pipelines,
      color_target: ImageHandle(0),
      layout: None,
      frame_index: 0,
      graph_log: None,
      metrics: PipelineMetrics::new(),
    })
  }

  pub fn device(&self) -> &Arc<D> {
    &self.device
  }

  pub fn config(&self) -> &RendererConfig {
    &self.config
  }

  pub fn heap(&self) -> &GpuHeap<D> {
    &self.heap
  }

  pub fn pipelines(&self) -> &StagePipelines {
    &self.pipelines
  }

  /// `(hits, misses)` of the pipeline cache.
  pub fn pipeline_cache_stats(&self) -> (u64, u64) {
    self.cache.stats()
  }

  /// Image the draw pass renders into.
  pub fn set_color_target(&mut self, image: ImageHandle) {
    self.color_target = image;
  }

  /// Layout of the most recently generated region.
  pub fn layout(&self) -> Option<&RegionLayout> {
    self.layout.as_ref()
  }

  /// Barrier log of the last graph, when `record_debug_info` is set.
  pub fn graph_log(&self) -> Option<&str> {
    self.graph_log.as_deref()
  }

  pub fn metrics(&self) -> &PipelineMetrics {
    &self.metrics
  }

  /// Run the full pipeline for region `coord` and submit it.
  ///
  /// Overwrites the previous region's heap contents.
  #[cfg_attr(
    feature = "instrument",
    tracing::instrument(skip_all, name = "renderer::generate_region")
  )]
  pub fn generate_region(&mut self, coord: IVec3) -> Result<RegionReport, RendererError> {
    let start = Instant::now();
    self.layout = None;
    self.heap.reset();

    let mut cmd = self.device.begin_commands();
    let generation = self.heap.generation();
    let layout = RegionLayout::allocate(&mut self.heap, &mut cmd, coord, self.config.quad_capacity)?;
    let heap_grew = self.heap.generation() != generation;

    layout.upload(&mut self.staging, &self.config);
    let upload = self.staging.flush(&self.heap, &mut cmd)?;

    let inputs = RegionPassInputs {
      heap_buffer: self.heap.buffer(),
      heap_base: self.heap.device_address()?,
      color_target: self.color_target,
      pipelines: self.pipelines,
      desc: GraphDesc::default()
        .with_execution_order(self.config.execution_order)
        .with_debug_info(self.config.record_debug_info),
    };
    let frame = frame_for(self.frame_index, self.config.mesher == MesherKind::Greedy);
    self.frame_index += 1;

    let (mut graph, _) = build_region_graph(&layout, &inputs);
    let execution = graph.execute(&mut cmd, &frame)?;
    if self.config.record_debug_info {
      let log = graph.debug_string();
      tracing::debug!("region graph:\n{log}");
      self.graph_log = Some(log);
    }
    drop(graph);

    let submit_start = Instant::now();
    let submitted = {
      let _in_use = self.heap.begin_use();
      self.device.submit(cmd)
    };
    self.staging.retire();
    let submit = submitted?;
    let submit_us = submit_start.elapsed().as_micros() as u64;
    self.heap.collect_retired();

    let face_count = self.heap.read(layout.mesh_header())?.face_count;
    let quads = face_count.min(layout.quad_capacity);
    let dropped_quads = face_count - quads;
    if dropped_quads > 0 {
      tracing::warn!(
        ?coord,
        capacity = layout.quad_capacity,
        dropped = dropped_quads,
        "quad capacity exceeded, quads dropped"
      );
    }
    self.layout = Some(layout);

    let report = RegionReport {
      coord,
      quads,
      dropped_quads,
      barriers: execution.barriers as u32,
      barrier_batches: execution.barrier_batches as u32,
      passes: execution.passes.into_iter().map(|(name, _)| name).collect(),
      dispatches: submit.dispatches,
      vertices: submit.vertices,
      heap_grew,
      heap_capacity: self.heap.capacity(),
      uploaded_bytes: upload.bytes,
      record_us: execution.record_us,
      submit_us,
      total_us: start.elapsed().as_micros() as u64,
    };
    self.metrics.record_region(&report);

    tracing::info!(
      ?coord,
      quads = report.quads,
      barriers = report.barriers,
      heap_grew,
      total_us = report.total_us,
      "region generated"
    );
    Ok(report)
  }

  fn current(&self) -> Result<&RegionLayout, RendererError> {
    self.layout.as_ref().ok_or(RendererError::NoRegion)
  }

  /// Stored quads of the last region.
  pub fn read_quads(&self) -> Result<Vec<QuadRecord>, RendererError> {
    let layout = self.current()?;
    let face_count = self.heap.read(layout.mesh_header())?.face_count;
    let count = face_count.min(layout.quad_capacity) as usize;
    Ok(self.heap.read_array(layout.quads(), count)?)
  }

  pub fn read_draw_args(&self) -> Result<DrawArgs, RendererError> {
    let layout = self.current()?;
    Ok(self.heap.read(layout.draw_args.typed())?)
  }

  /// Palette and decoded voxels of chunk `chunk` (chunk coordinates).
  pub fn read_chunk(&self, chunk: UVec3) -> Result<ChunkSnapshot, RendererError> {
    let layout = self.current()?;
    let c = chunk.min(UVec3::splat(REGION_CHUNKS - 1));
    let index = region_chunk_index(c.x, c.y, c.z) as u64;
    let header = self.heap.read(layout.chunks.element(index))?;

    let count = header.palette_count.min(PALETTE_CAPACITY);
    let palette: Vec<u32> = self
      .heap
      .read_array(HeapOffset::<u32>::new(header.palette), count as usize)?
      .into_iter()
      .map(|entry| entry.saturating_sub(1))
      .collect();

    let word = self.config.pack_word;
    let mut data = vec![0u8; packed_len(CHUNK_VOLUME, bits_for_palette(count), word)];
    self.heap.read_bytes(header.data, &mut data)?;

    Ok(ChunkSnapshot {
      voxels: decompress_chunk(&palette, &data),
      palette,
      stats: CompressionStats::for_palette(count, word),
    })
  }

  /// Raw noise grid of the last region (`64³`, X fastest).
  pub fn read_noise(&self) -> Result<Vec<f32>, RendererError> {
    let layout = self.current()?;
    Ok(self.heap.read_array(layout.noise.typed::<f32>(), REGION_VOLUME)?)
  }

  /// Occupancy columns (`3 × 64×64`).
  pub fn read_bitmap(&self) -> Result<Vec<u64>, RendererError> {
    let layout = self.current()?;
    Ok(self.heap.read_array(layout.bitmap.typed::<u64>(), 3 * COLUMNS_PER_AXIS)?)
  }

  /// Face tracking grids (`6 × 64×64`).
  pub fn read_tracking(&self) -> Result<Vec<u64>, RendererError> {
    let layout = self.current()?;
    Ok(self.heap.read_array(
      layout.tracking.typed::<u64>(),
      FACE_DIRECTIONS * COLUMNS_PER_AXIS,
    )?)
  }
}

impl<D: GpuDevice + PipelineFactory> Drop for VoxelRenderer<D> {
  fn drop(&mut self) {
    self.cache.clear(self.device.as_ref());
  }
}

#[cfg(test)]
#[path = "renderer_test.rs"]
mod renderer_test;
