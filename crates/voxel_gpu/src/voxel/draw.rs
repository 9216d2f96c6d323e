//! Draw-argument finalize kernel and the procedural quad vertex program.
//!
//! The mesh buffer holds no vertices. The vertex program expands quad
//! `v / 6` into two triangles, corner `v % 6`:
//!
//! ```text
//!  (0,1) ●──────● (1,1)      corners: (0,0) (1,0) (1,1)
//!        │    ╱ │                     (0,0) (1,1) (0,1)
//!        │  ╱   │
//!  (0,0) ●──────● (1,0)      scaled by the quad size along (u, v)
//! ```

use glam::{IVec3, UVec3, Vec3, Vec4};

use super::layout::{DrawArgs, MeshHeader, PushConstants, QuadRecord, RegionHeader};
use super::{FINALIZE_KERNEL, QUAD_VERTEX};
use crate::constants::{column_to_voxel, voxel_to_column};
use crate::device::{ComputeKernel, GlobalMemory, VertexProgram, Workgroup};

pub const VERTICES_PER_QUAD: u32 = 6;

const CORNERS: [(u32, u32); VERTICES_PER_QUAD as usize] =
  [(0, 0), (1, 0), (1, 1), (0, 0), (1, 1), (0, 1)];

/// Clamps the face counter to the quad capacity and writes
/// `{quads * 6, 1, 0, 0}` to the region's draw arguments.
pub struct FinalizeKernel;

impl ComputeKernel for FinalizeKernel {
  fn name(&self) -> &str {
    FINALIZE_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [1, 1, 1]
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let region: RegionHeader = memory.read(pc.address(pc.region));

    wg.invocations(|_, _| {
      let header: MeshHeader = memory.read(pc.address(region.mesh));
      let quads = header.face_count.min(region.quad_capacity);
      let args = DrawArgs {
        vertex_count: quads * VERTICES_PER_QUAD,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
      };
      memory.write(pc.address(region.draw_args), &args);
    });
  }
}

/// World-space corner of `quad`'s face for vertex `corner` (0..6).
pub fn quad_corner(quad: &QuadRecord, world_origin: [i32; 3], corner: u32) -> Vec3 {
  let axis = quad.normal_axis();
  let [x, y, z] = quad.pos;
  let (u0, v0, depth) = voxel_to_column(axis, x, y, z);
  let (cu, cv) = CORNERS[(corner % VERTICES_PER_QUAD) as usize];
  // Positive faces sit on the far side of the voxel.
  let plane = if quad.is_negative() { depth } else { depth + 1 };
  let (px, py, pz) = column_to_voxel(
    axis,
    u0 + cu * quad.size[0],
    v0 + cv * quad.size[1],
    plane,
  );
  UVec3::new(px, py, pz).as_vec3() + IVec3::from_array(world_origin).as_vec3()
}

/// Expands quads into world-space positions (`w = 1`).
///
/// Push constants: `region` is the [`RegionHeader`].
pub struct QuadVertexProgram;

impl VertexProgram for QuadVertexProgram {
  fn name(&self) -> &str {
    QUAD_VERTEX
  }

  fn vertex(&self, memory: &GlobalMemory, push: &[u8], vertex_index: u32) -> Vec4 {
    let mut pc = PushConstants::default();
    let len = push.len().min(std::mem::size_of::<PushConstants>());
    bytemuck::bytes_of_mut(&mut pc)[..len].copy_from_slice(&push[..len]);

    let region: RegionHeader = memory.read(pc.address(pc.region));
    let slot = vertex_index / VERTICES_PER_QUAD;
    let quad: QuadRecord = memory.read(pc.address(region.quad_record(slot)));
    quad_corner(&quad, region.world_origin(), vertex_index % VERTICES_PER_QUAD).extend(1.0)
  }
}

#[cfg(test)]
#[path = "draw_test.rs"]
mod draw_test;
