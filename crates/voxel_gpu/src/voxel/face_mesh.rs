//! Simple face mesher: one 1×1 quad per exposed voxel face.
//!
//! Invocation `(u, v)` of workgroup layer `z = direction` scans one column.
//! Faces are claimed in the direction's tracking grid with `fetch_or`; only
//! bits this invocation flipped from 0 to 1 are emitted, so re-running the
//! kernel (or overlapping dispatches) never duplicates a face.

use super::layout::{PushConstants, RegionHeader};
use super::quad::{column_quad, emit_quad, face_mask};
use super::FACE_MESH_KERNEL;
use crate::constants::{column_index, MESH_TILE};
use crate::device::{ComputeKernel, Workgroup};

pub struct FaceMeshKernel;

impl ComputeKernel for FaceMeshKernel {
  fn name(&self) -> &str {
    FACE_MESH_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    [MESH_TILE, MESH_TILE, 1]
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let region: RegionHeader = memory.read(pc.address(pc.region));
    let dir = wg.id().z;
    let axis = dir / 2;
    let negative = dir & 1 == 1;

    wg.invocations(|inv, _| {
      let (u, v) = (inv.global.x, inv.global.y);
      let column = column_index(u, v);
      let bits = memory.load_u64(pc.address(region.bitmap_column(axis, column)));
      let faces = face_mask(bits, negative);
      if faces == 0 {
        return;
      }

      let previous = memory.fetch_or_u64(pc.address(region.tracking_column(dir, column)), faces);
      let mut claimed = faces & !previous;
      while claimed != 0 {
        let depth = claimed.trailing_zeros();
        emit_quad(memory, &pc, &region, &column_quad(dir, u, v, depth, 1, 1));
        claimed &= claimed - 1;
      }
    });
  }
}

#[cfg(test)]
#[path = "face_mesh_test.rs"]
mod face_mesh_test;
