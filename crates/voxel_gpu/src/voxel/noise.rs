//! Noise kernel: one invocation per voxel of the noise grid.

use glam::{IVec3, UVec3};

use super::layout::{NoiseContext, PushConstants};
use super::NOISE_KERNEL;
use crate::constants::grid_index;
use crate::device::{ComputeKernel, Workgroup};

pub const NOISE_WORKGROUP: [u32; 3] = [4, 4, 4];

/// Writes `fbm((gid + offset) * scale * frequency)` for every grid cell.
///
/// Push constants: `params` is the [`NoiseContext`] offset.
pub struct NoiseKernel;

impl ComputeKernel for NoiseKernel {
  fn name(&self) -> &str {
    NOISE_KERNEL
  }

  fn workgroup_size(&self) -> [u32; 3] {
    NOISE_WORKGROUP
  }

  fn run(&self, wg: &mut Workgroup<'_>) {
    let pc: PushConstants = wg.push_constants();
    let memory = wg.memory();
    let ctx: NoiseContext = memory.read(pc.address(pc.params));
    let params = ctx.params;

    let fbm = params.fbm();
    let step = params.scale * params.frequency;
    let offset = IVec3::from_array(params.offset);
    let size = UVec3::from_array(params.size);

    wg.invocations(|inv, _| {
      let g = inv.global;
      if g.cmpge(size).any() {
        return;
      }
      let p = (g.as_ivec3() + offset).as_vec3() * step;
      let value = fbm.sample(p.x, p.y, p.z);
      let index = grid_index(g.x, g.y, g.z, size.x, size.y) as u64;
      memory.store_f32(pc.address(ctx.output + index * 4), value);
    });
  }
}

/// Workgroups needed to cover a grid of `size`.
pub fn noise_dispatch(size: [u32; 3]) -> [u32; 3] {
  [
    size[0].div_ceil(NOISE_WORKGROUP[0]),
    size[1].div_ceil(NOISE_WORKGROUP[1]),
    size[2].div_ceil(NOISE_WORKGROUP[2]),
  ]
}
