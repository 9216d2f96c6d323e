//! Region pipeline benchmarks on the host device.
//!
//! - **region**: full `generate_region` per mesher and terrain mode
//! - **record**: graph construction and barrier synthesis only, no submit

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::IVec3;
use voxel_gpu::device::{
  GpuDevice, HostDevice, HostDeviceConfig, ImageHandle, PipelineHandle,
};
use voxel_gpu::graph::GraphDesc;
use voxel_gpu::pipeline::passes::{build_region_graph, frame_for, RegionPassInputs};
use voxel_gpu::pipeline::{RegionLayout, StagePipelines};
use voxel_gpu::shader::KernelLibrary;
use voxel_gpu::{
  GpuHeap, HeapDesc, MesherKind, RendererConfig, TerrainMode, TerrainSettings, VoxelRenderer,
};

// =============================================================================
// Full Pipeline
// =============================================================================

fn config(mesher: MesherKind, mode: TerrainMode) -> RendererConfig {
  RendererConfig::default()
    .with_mesher(mesher)
    .with_terrain(TerrainSettings {
      mode,
      ..TerrainSettings::default()
    })
}

fn bench_generate_region(c: &mut Criterion) {
  let mut group = c.benchmark_group("region");
  group.sample_size(10);

  for mesher in [MesherKind::Simple, MesherKind::Greedy] {
    for mode in [TerrainMode::Heightmap, TerrainMode::Density3d] {
      let Ok(mut renderer) = VoxelRenderer::host(config(mesher, mode)) else {
        continue;
      };
      let id = BenchmarkId::new(format!("{mesher:?}"), format!("{mode:?}"));
      group.bench_function(id, |b| {
        b.iter(|| black_box(renderer.generate_region(IVec3::ZERO).ok()))
      });
    }
  }

  group.finish();
}

// =============================================================================
// Graph Recording
// =============================================================================

fn bench_record_graph(c: &mut Criterion) {
  let device = Arc::new(HostDevice::new(
    HostDeviceConfig::default(),
    Arc::new(KernelLibrary::new()),
  ));
  let Ok(mut heap) = GpuHeap::create(device.clone(), HeapDesc::device_local(16 << 20)) else {
    return;
  };
  let mut setup = device.begin_commands();
  let Ok(layout) = RegionLayout::allocate(&mut heap, &mut setup, IVec3::ZERO, 1 << 16) else {
    return;
  };
  let Ok(heap_base) = heap.device_address() else {
    return;
  };

  let p = |i| PipelineHandle(i);
  let inputs = RegionPassInputs {
    heap_buffer: heap.buffer(),
    heap_base,
    color_target: ImageHandle(0),
    pipelines: StagePipelines {
      noise: p(1),
      terrain: p(2),
      palette_build: p(3),
      palette_pack: p(4),
      bitmap: p(5),
      face_mesh: p(6),
      greedy_mesh: p(7),
      finalize: p(8),
      draw: p(9),
    },
    desc: GraphDesc::default(),
  };

  c.bench_function("record/region_graph", |b| {
    b.iter(|| {
      let mut cmd = device.begin_commands();
      let (mut graph, _) = build_region_graph(&layout, &inputs);
      let report = graph.execute(&mut cmd, &frame_for(0, true));
      black_box((report.ok(), cmd.len()))
    })
  });
}

criterion_group!(pipeline, bench_generate_region, bench_record_graph);
criterion_main!(pipeline);
