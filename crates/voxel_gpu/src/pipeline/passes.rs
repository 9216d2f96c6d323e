//! Region render graph.
//!
//! ```text
//!  clear ─► noise ─► terrain ─► palette_build ─► palette_pack ─► bitmap
//!                                                                  │
//!          draw ◄── finalize ◄── mesh_greedy | mesh_simple ◄───────┘
//! ```
//!
//! Both mesh passes are added; the frame's condition bits pick one.

use crate::constants::{MESH_TILE, REGION_CHUNKS, REGION_SIZE};
use crate::device::{BufferHandle, CommandContext, ImageHandle, PipelineHandle};
use crate::graph::{
  FrameContext, GraphDesc, Pass, RenderGraph, ResourceDesc, ResourceId, ResourceState,
};
use crate::heap::HeapRange;
use crate::voxel::layout::PushConstants;
use crate::voxel::noise_dispatch;
use crate::voxel::terrain::TERRAIN_WORKGROUP;

use super::region::RegionLayout;

/// Condition bit set when the greedy mesher runs.
pub const CONDITION_GREEDY: u32 = 1 << 0;

/// Pipeline handles of every stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePipelines {
  pub noise: PipelineHandle,
  pub terrain: PipelineHandle,
  pub palette_build: PipelineHandle,
  pub palette_pack: PipelineHandle,
  pub bitmap: PipelineHandle,
  pub face_mesh: PipelineHandle,
  pub greedy_mesh: PipelineHandle,
  pub finalize: PipelineHandle,
  pub draw: PipelineHandle,
}

/// Everything the graph needs besides the layout.
#[derive(Clone, Copy, Debug)]
pub struct RegionPassInputs {
  pub heap_buffer: BufferHandle,
  pub heap_base: u64,
  pub color_target: ImageHandle,
  pub pipelines: StagePipelines,
  pub desc: GraphDesc,
}

/// Resources registered for one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionResources {
  pub params: ResourceId,
  pub chunk_headers: ResourceId,
  pub noise: ResourceId,
  pub raw: ResourceId,
  pub palette: ResourceId,
  pub packed: ResourceId,
  pub bitmap: ResourceId,
  pub tracking: ResourceId,
  pub mesh: ResourceId,
  pub draw_args: ResourceId,
  pub color: ResourceId,
}

impl RegionResources {
  /// Ranges covered by the clear pass.
  fn zeroed(&self) -> [ResourceId; 8] {
    [
      self.noise,
      self.raw,
      self.palette,
      self.packed,
      self.bitmap,
      self.tracking,
      self.mesh,
      self.draw_args,
    ]
  }
}

/// Frame condition bits for a mesher choice.
pub fn frame_for(frame_index: u64, greedy: bool) -> FrameContext {
  FrameContext::new(frame_index).with_conditions(if greedy { CONDITION_GREEDY } else { 0 })
}

fn dispatch_pass<'a, C: CommandContext + 'a>(
  name: &str,
  pipeline: PipelineHandle,
  push: PushConstants,
  groups: [u32; 3],
) -> Pass<'a, C> {
  Pass::compute(name).execute(move |cmd: &mut C, _| {
    cmd.bind_pipeline(pipeline);
    cmd.push_constants(bytemuck::bytes_of(&push));
    cmd.dispatch(groups[0], groups[1], groups[2]);
    Ok(())
  })
}

/// Register the region's resources and passes.
pub fn build_region_graph<'a, C: CommandContext + 'a>(
  layout: &RegionLayout,
  inputs: &RegionPassInputs,
) -> (RenderGraph<'a, C>, RegionResources) {
  let mut graph = RenderGraph::new(inputs.desc);
  let heap = inputs.heap_buffer;
  let range = |r: HeapRange| ResourceDesc::buffer(heap, r.offset, r.size);
  let undefined = ResourceState::UNDEFINED;

  let res = RegionResources {
    // Staging copies land before the graph runs.
    params: graph.add_resource("params", range(layout.params), ResourceState::transfer_write()),
    chunk_headers: graph.add_resource(
      "chunk_headers",
      range(layout.chunk_headers),
      ResourceState::transfer_write(),
    ),
    noise: graph.add_resource("noise", range(layout.noise), undefined),
    raw: graph.add_resource("raw", range(layout.raw), undefined),
    palette: graph.add_resource("palette", range(layout.palettes), undefined),
    packed: graph.add_resource("packed", range(layout.packed), undefined),
    bitmap: graph.add_resource("bitmap", range(layout.bitmap), undefined),
    tracking: graph.add_resource("tracking", range(layout.tracking), undefined),
    mesh: graph.add_resource("mesh", range(layout.mesh), undefined),
    draw_args: graph.add_resource("draw_args", range(layout.draw_args), undefined),
    color: graph.add_resource("color", ResourceDesc::image(inputs.color_target), undefined),
  };

  let p = inputs.pipelines;
  let base = PushConstants {
    heap_base: inputs.heap_base,
    region: layout.header.offset(),
    params: 0,
  };
  let read = ResourceState::compute_read();
  let write = ResourceState::compute_write();
  let rmw = ResourceState::compute_read_write();

  let zeroed = layout.zeroed;
  let mut clear = Pass::transfer("clear").execute(move |cmd: &mut C, _| {
    cmd.fill_buffer(heap, zeroed.offset, zeroed.size, 0);
    Ok(())
  });
  for id in res.zeroed() {
    clear = clear.writes(id, ResourceState::transfer_write());
  }
  graph.add_pass(clear);

  let noise_push = PushConstants {
    params: layout.noise_context.offset(),
    ..base
  };
  graph.add_pass(
    dispatch_pass("noise", p.noise, noise_push, noise_dispatch([REGION_SIZE; 3]))
      .reads(res.params, read)
      .writes(res.noise, write),
  );

  let terrain_push = PushConstants {
    params: layout.terrain.offset(),
    ..base
  };
  let terrain_groups = [0, 1, 2].map(|i| REGION_SIZE / TERRAIN_WORKGROUP[i]);
  graph.add_pass(
    dispatch_pass("terrain", p.terrain, terrain_push, terrain_groups)
      .reads(res.params, read)
      .reads(res.chunk_headers, read)
      .reads(res.noise, read)
      .writes(res.raw, write),
  );

  let chunks = [REGION_CHUNKS; 3];
  graph.add_pass(
    dispatch_pass("palette_build", p.palette_build, base, chunks)
      .reads(res.params, read)
      // Bumps `palette_count` in each chunk header.
      .reads_writes(res.chunk_headers, rmw)
      .reads(res.raw, read)
      .reads_writes(res.palette, rmw),
  );
  graph.add_pass(
    dispatch_pass("palette_pack", p.palette_pack, base, chunks)
      .reads(res.params, read)
      .reads(res.chunk_headers, read)
      .reads(res.raw, read)
      .reads(res.palette, read)
      .reads_writes(res.packed, rmw),
  );
  graph.add_pass(
    dispatch_pass("bitmap", p.bitmap, base, chunks)
      .reads(res.params, read)
      .reads(res.chunk_headers, read)
      .reads(res.palette, read)
      .reads(res.packed, read)
      .reads_writes(res.bitmap, rmw),
  );

  let tiles = REGION_SIZE / MESH_TILE;
  let mesh_groups = [tiles, tiles, 6];
  for (name, pipeline, value) in [
    ("mesh_greedy", p.greedy_mesh, CONDITION_GREEDY),
    ("mesh_simple", p.face_mesh, 0),
  ] {
    graph.add_pass(
      dispatch_pass(name, pipeline, base, mesh_groups)
        .reads(res.params, read)
        .reads(res.bitmap, read)
        .reads_writes(res.tracking, rmw)
        .reads_writes(res.mesh, rmw)
        .condition(CONDITION_GREEDY, value),
    );
  }

  graph.add_pass(
    dispatch_pass("finalize", p.finalize, base, [1, 1, 1])
      .reads(res.params, read)
      .reads(res.mesh, read)
      .writes(res.draw_args, write),
  );

  let draw_args = layout.draw_args.offset;
  let draw_pipeline = p.draw;
  graph.add_pass(
    Pass::raster("draw")
      .reads(res.draw_args, ResourceState::indirect_read())
      .reads(res.params, ResourceState::vertex_read())
      .reads(res.mesh, ResourceState::vertex_read())
      .writes(res.color, ResourceState::color_attachment())
      .execute(move |cmd: &mut C, _| {
        cmd.bind_pipeline(draw_pipeline);
        cmd.push_constants(bytemuck::bytes_of(&base));
        cmd.draw_indirect(heap, draw_args);
        Ok(())
      }),
  );

  (graph, res)
}
